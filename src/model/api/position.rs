use rocket::http::{
    impl_from_uri_param_identity,
    uri::fmt::{Formatter, Query, UriDisplay},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    db::position::{NewPosition, Position},
    mongodb::{serde_hex, Id},
};

fn active_by_default() -> bool {
    true
}

/// A position specification, as created or edited by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Defaults to after every existing position.
    #[serde(default)]
    pub display_order: Option<u32>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

impl PositionSpec {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::bad_request(
                "Position name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Convert into a position, placed at `default_order` unless an order was given.
    pub fn into_position(self, default_order: u32) -> NewPosition {
        NewPosition {
            name: self.name.trim().to_string(),
            description: self.description,
            display_order: self.display_order.unwrap_or(default_order),
            active: self.active,
        }
    }
}

/// An API-friendly position description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDescription {
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub name: String,
    pub description: String,
    pub display_order: u32,
    pub active: bool,
}

impl From<Position> for PositionDescription {
    fn from(position: Position) -> Self {
        let core = position.position;
        Self {
            id: position.id,
            name: core.name,
            description: core.description,
            display_order: core.display_order,
            active: core.active,
        }
    }
}

/// Which way to move a position on the ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromFormField)]
pub enum Direction {
    #[field(value = "up")]
    Up,
    #[field(value = "down")]
    Down,
}

impl UriDisplay<Query> for Direction {
    fn fmt(&self, formatter: &mut Formatter<'_, Query>) -> std::fmt::Result {
        formatter.write_value(match self {
            Self::Up => "up",
            Self::Down => "down",
        })
    }
}

impl_from_uri_param_identity!([Query] Direction);

#[cfg(test)]
mod examples {
    use super::*;

    impl PositionSpec {
        pub fn example() -> Self {
            Self {
                name: "Senior Prefect".to_string(),
                description: "Head of the prefectorial board".to_string(),
                display_order: None,
                active: true,
            }
        }
    }
}
