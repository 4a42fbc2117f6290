use std::collections::HashSet;
use std::ops::{Deref, DerefMut};

use rocket::{futures::TryStreamExt, http::Status};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{AttributeKind, VoterAttributes, VoterCategory},
    mongodb::{Coll, Id},
};

/// A year, class or house the school recognises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntryCore {
    pub kind: AttributeKind,
    /// Unique within its kind. Voters and candidate categories use this.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Display colour, mostly for houses.
    #[serde(default)]
    pub color: Option<String>,
    /// Only active entries may be given to new voters or candidates.
    pub active: bool,
}

/// A registry entry without an ID.
pub type NewRegistryEntry = RegistryEntryCore;

/// A registry entry from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub entry: RegistryEntryCore,
}

impl Deref for RegistryEntry {
    type Target = RegistryEntryCore;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}

impl DerefMut for RegistryEntry {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.entry
    }
}

/// The registered years, classes and houses, as of one read.
///
/// A kind with no entries at all is unrestricted, so schools that never
/// fill in a list are not forced to.
#[derive(Debug, Default)]
pub struct Registry {
    listed: HashSet<AttributeKind>,
    active: HashSet<(AttributeKind, String)>,
}

impl Registry {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a RegistryEntryCore>) -> Self {
        let mut registry = Self::default();
        for entry in entries {
            registry.listed.insert(entry.kind);
            if entry.active {
                registry.active.insert((entry.kind, entry.name.clone()));
            }
        }
        registry
    }

    /// Read the whole registry.
    pub async fn load(entries: &Coll<RegistryEntry>) -> Result<Self> {
        let all: Vec<RegistryEntry> = entries.find(None, None).await?.try_collect().await?;
        Ok(Self::from_entries(all.iter().map(|entry| &entry.entry)))
    }

    /// Is `value` acceptable for a new voter or candidate?
    pub fn check(&self, kind: AttributeKind, value: &str) -> Result<()> {
        if !self.listed.contains(&kind) || self.active.contains(&(kind, value.to_string())) {
            return Ok(());
        }
        Err(Error::Status(
            Status::UnprocessableEntity,
            format!("Unknown {kind}: {value}"),
        ))
    }

    pub fn check_voter(&self, attributes: &VoterAttributes) -> Result<()> {
        attributes
            .by_kind()
            .into_iter()
            .try_for_each(|(kind, value)| self.check(kind, value))
    }

    pub fn check_category(&self, category: &VoterCategory) -> Result<()> {
        match category.restriction() {
            Some((kind, values)) => values.iter().try_for_each(|value| self.check(kind, value)),
            None => Ok(()),
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl RegistryEntryCore {
        pub fn example(kind: AttributeKind, name: &str) -> Self {
            Self {
                kind,
                name: name.to_string(),
                description: String::new(),
                color: None,
                active: true,
            }
        }

        pub fn inactive(kind: AttributeKind, name: &str) -> Self {
            Self {
                active: false,
                ..Self::example(kind, name)
            }
        }
    }
}
