use serde::{Deserialize, Serialize};

/// The attributes of a voter that candidate eligibility may be restricted by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoterAttributes {
    pub year: String,
    pub class: String,
    pub house: String,
}

impl VoterAttributes {
    /// Each attribute, labelled with its kind.
    pub fn by_kind(&self) -> [(AttributeKind, &str); 3] {
        [
            (AttributeKind::Year, &self.year),
            (AttributeKind::Class, &self.class),
            (AttributeKind::House, &self.house),
        ]
    }
}

/// One of the voter attributes that schools keep a list of.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    Year,
    Class,
    House,
}

impl AttributeKind {
    /// Name of the voter field holding this attribute.
    pub fn field(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Class => "class",
            Self::House => "house",
        }
    }
}

impl std::fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field())
    }
}

impl std::str::FromStr for AttributeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "year" => Ok(Self::Year),
            "class" => Ok(Self::Class),
            "house" => Ok(Self::House),
            _ => Err(format!("unknown voter attribute `{s}`")),
        }
    }
}

/// Which voters may see a candidate on their ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawVoterCategory", into = "RawVoterCategory")]
pub enum VoterCategory {
    /// Every voter.
    All,
    /// Voters whose year is one of these.
    Year(Vec<String>),
    /// Voters whose class or programme is one of these.
    Class(Vec<String>),
    /// Voters whose house is one of these.
    House(Vec<String>),
}

impl VoterCategory {
    /// Is a voter with these attributes eligible?
    pub fn admits(&self, voter: &VoterAttributes) -> bool {
        match self {
            Self::All => true,
            Self::Year(years) => years.contains(&voter.year),
            Self::Class(classes) => classes.contains(&voter.class),
            Self::House(houses) => houses.contains(&voter.house),
        }
    }

    /// The attribute this category restricts by, and the values it allows.
    pub fn restriction(&self) -> Option<(AttributeKind, &[String])> {
        match self {
            Self::All => None,
            Self::Year(values) => Some((AttributeKind::Year, values)),
            Self::Class(values) => Some((AttributeKind::Class, values)),
            Self::House(values) => Some((AttributeKind::House, values)),
        }
    }
}

impl Default for VoterCategory {
    fn default() -> Self {
        Self::All
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum CategoryKind {
    All,
    Year,
    Class,
    House,
}

/// Wire form: `{"type": "class", "values": ["Form 3A"]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawVoterCategory {
    #[serde(rename = "type")]
    kind: CategoryKind,
    #[serde(default)]
    values: Vec<String>,
}

impl TryFrom<RawVoterCategory> for VoterCategory {
    type Error = String;

    fn try_from(raw: RawVoterCategory) -> Result<Self, Self::Error> {
        let restricted = |values: Vec<String>| {
            if values.is_empty() {
                Err(format!(
                    "voter category `{:?}` must list at least one value",
                    raw.kind
                ))
            } else {
                Ok(values)
            }
        };
        Ok(match raw.kind {
            CategoryKind::All => Self::All,
            CategoryKind::Year => Self::Year(restricted(raw.values)?),
            CategoryKind::Class => Self::Class(restricted(raw.values)?),
            CategoryKind::House => Self::House(restricted(raw.values)?),
        })
    }
}

impl From<VoterCategory> for RawVoterCategory {
    fn from(category: VoterCategory) -> Self {
        let (kind, values) = match category {
            VoterCategory::All => (CategoryKind::All, Vec::new()),
            VoterCategory::Year(values) => (CategoryKind::Year, values),
            VoterCategory::Class(values) => (CategoryKind::Class, values),
            VoterCategory::House(values) => (CategoryKind::House, values),
        };
        Self { kind, values }
    }
}

/// Example test data.
#[cfg(test)]
mod examples {
    use super::*;

    impl VoterAttributes {
        pub fn example() -> Self {
            Self {
                year: "2025".to_string(),
                class: "Form 3A".to_string(),
                house: "Red House".to_string(),
            }
        }

        pub fn example2() -> Self {
            Self {
                year: "2024".to_string(),
                class: "Form 3B".to_string(),
                house: "Blue House".to_string(),
            }
        }
    }
}
