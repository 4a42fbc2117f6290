use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Formatter, Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::AttributeKind,
    db::registry::{NewRegistryEntry, RegistryEntry},
    mongodb::{serde_hex, Id},
};

impl<'a> FromParam<'a> for AttributeKind {
    type Error = String;

    fn from_param(param: &'a str) -> std::result::Result<Self, Self::Error> {
        param.parse()
    }
}

impl UriDisplay<Path> for AttributeKind {
    fn fmt(&self, formatter: &mut Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(self.field())
    }
}

impl_from_uri_param_identity!([Path] AttributeKind);

fn active_by_default() -> bool {
    true
}

/// A year, class or house, as created or edited by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntrySpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

impl RegistryEntrySpec {
    pub fn validate(&self, kind: AttributeKind) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::bad_request(format!(
                "The {kind} name must not be empty"
            )));
        }
        if let Some(color) = &self.color {
            if !is_hex_color(color) {
                return Err(Error::bad_request(format!(
                    "Colour must look like #a1b2c3, not {color}"
                )));
            }
        }
        Ok(())
    }

    pub fn into_entry(self, kind: AttributeKind) -> NewRegistryEntry {
        NewRegistryEntry {
            kind,
            name: self.name.trim().to_string(),
            description: self.description,
            color: self.color,
            active: self.active,
        }
    }
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// An API-friendly registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntryDescription {
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub kind: AttributeKind,
    pub name: String,
    pub description: String,
    pub color: Option<String>,
    pub active: bool,
}

impl From<RegistryEntry> for RegistryEntryDescription {
    fn from(entry: RegistryEntry) -> Self {
        let core = entry.entry;
        Self {
            id: entry.id,
            kind: core.kind,
            name: core.name,
            description: core.description,
            color: core.color,
            active: core.active,
        }
    }
}


#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json::{self, json};

    use super::*;

    #[test]
    fn spec_defaults_to_active() {
        let spec: RegistryEntrySpec = serde_json::from_value(json!({"name": "Form 3A"})).unwrap();
        assert_eq!(spec, RegistryEntrySpec::example("Form 3A"));
    }

    #[test]
    fn names_and_colours_are_checked() {
        let mut spec = RegistryEntrySpec::example("  Red House ");
        spec.color = Some("#ef4444".to_string());
        assert!(spec.validate(AttributeKind::House).is_ok());
        assert_eq!(spec.clone().into_entry(AttributeKind::House).name, "Red House");

        spec.color = Some("red".to_string());
        assert!(spec.validate(AttributeKind::House).is_err());

        let blank = RegistryEntrySpec::example(" ");
        let err = blank.validate(AttributeKind::Year).unwrap_err();
        assert_eq!(err.to_string(), "The year name must not be empty");
    }

    #[test]
    fn kinds_parse_from_path_segments() {
        assert_eq!(AttributeKind::from_param("class"), Ok(AttributeKind::Class));
        assert!(AttributeKind::from_param("Class").is_err());
    }
}
