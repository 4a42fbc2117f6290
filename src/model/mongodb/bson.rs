use std::fmt::{Display, Formatter};
use std::{ops::Deref, str::FromStr};

use mongodb::bson::{doc, oid::ObjectId, Document};
use rocket::{
    form::{self, prelude::ErrorKind, FromFormField, ValueField},
    http::{
        impl_from_uri_param_identity, Status,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};

/// A database document ID.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(ObjectId);

impl Id {
    /// Generate a new random ID.
    pub fn new() -> Self {
        Self(ObjectId::new())
    }

    /// Convert into a document suitable for filtering by `_id`.
    pub fn as_doc(&self) -> Document {
        doc! {
            "_id": self.0,
        }
    }

    /// The hexadecimal form used on the API.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Id {
    type Target = ObjectId;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Id {
    type Err = mongodb::bson::oid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse::<ObjectId>()?))
    }
}

impl From<ObjectId> for Id {
    fn from(id: ObjectId) -> Self {
        Self(id)
    }
}

impl From<Id> for mongodb::bson::Bson {
    fn from(id: Id) -> Self {
        mongodb::bson::Bson::ObjectId(id.0)
    }
}

impl<'a> FromParam<'a> for Id {
    type Error = mongodb::bson::oid::Error;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse::<Id>()
    }
}

#[rocket::async_trait]
impl<'r> FromFormField<'r> for Id {
    fn from_value(field: ValueField<'r>) -> form::Result<'r, Self> {
        field.value.parse::<ObjectId>().map(Id).map_err(|err| {
            let error = ErrorKind::Custom(Status::UnprocessableEntity, Box::new(err));
            error.into()
        })
    }
}

impl UriDisplay<Path> for Id {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(self.to_string())
    }
}

impl_from_uri_param_identity!([Path] Id);

/// Serialise an [`Id`] as its bare hex string, for the API.
pub mod serde_hex {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::Id;

    pub fn serialize<S: Serializer>(id: &Id, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&id.to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Id, D::Error> {
        let hex = String::deserialize(deserializer)?;
        hex.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_form_parses_back() {
        let id = Id::new();
        let parsed: Id = id.to_hex().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn api_form_is_plain_hex() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            #[serde(with = "serde_hex")]
            id: Id,
        }

        let id = Id::new();
        let json = rocket::serde::json::serde_json::to_string(&Wrapper { id }).unwrap();
        assert_eq!(json, format!("{{\"id\":\"{}\"}}", id.to_hex()));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!("not-an-object-id".parse::<Id>().is_err());
        assert!(Id::from_param("1234").is_err());
    }

    #[test]
    fn form_field_rejects_garbage_as_unprocessable() {
        let id = Id::new();
        let parsed = Id::from_value(ValueField::from_value(&id.to_hex())).unwrap();
        assert_eq!(parsed, id);

        let errors = Id::from_value(ValueField::from_value("not-an-object-id")).unwrap_err();
        assert_eq!(errors.status(), Status::UnprocessableEntity);
    }
}
