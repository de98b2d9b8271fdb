//! Research entity schema and extraction records

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Kind of research entity a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Lab,
    Publication,
    Equipment,
    Institution,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lab => "lab",
            Self::Publication => "publication",
            Self::Equipment => "equipment",
            Self::Institution => "institution",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "lab" => Some(Self::Lab),
            "publication" => Some(Self::Publication),
            "equipment" => Some(Self::Equipment),
            "institution" => Some(Self::Institution),
            _ => None,
        }
    }
}

/// Accepts strings, numbers, booleans, arrays and null as a string
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .into_iter()
            .map(value_to_string)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        other => value_to_string(other),
    })
}

/// Accepts an array, a single string or null as a list of strings
fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let items = match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => vec![other],
    };
    Ok(items
        .into_iter()
        .map(value_to_string)
        .filter(|s| !s.is_empty())
        .collect())
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    #[serde(deserialize_with = "lenient_string")]
    pub country: String,
    #[serde(deserialize_with = "lenient_string")]
    pub city: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Edurank {
    #[serde(deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(deserialize_with = "lenient_string")]
    pub score: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Teams {
    #[serde(deserialize_with = "lenient_list")]
    pub urls: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Department {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub url: String,
    pub teams: Teams,
    #[serde(deserialize_with = "lenient_string")]
    pub focus: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Publications {
    #[serde(deserialize_with = "lenient_string")]
    pub google_scholar_url: String,
    #[serde(deserialize_with = "lenient_string")]
    pub other_url: String,
    #[serde(deserialize_with = "lenient_list")]
    pub contents: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointOfContact {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub first_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub last_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub bio_url: String,
    #[serde(deserialize_with = "lenient_string")]
    pub linked_in: String,
    #[serde(deserialize_with = "lenient_string")]
    pub google_scholar_url: String,
    #[serde(deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(deserialize_with = "lenient_string")]
    pub phone_number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabEquipment {
    #[serde(deserialize_with = "lenient_string")]
    pub overview: String,
    #[serde(deserialize_with = "lenient_list")]
    pub list: Vec<String>,
}

/// Structured description of a research lab, institution or output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchEntity {
    #[serde(deserialize_with = "lenient_string")]
    pub university: String,
    pub location: Location,
    #[serde(deserialize_with = "lenient_string")]
    pub website: String,
    pub edurank: Edurank,
    pub department: Department,
    pub publications: Publications,
    #[serde(deserialize_with = "lenient_string")]
    pub related: String,
    pub point_of_contact: PointOfContact,
    #[serde(deserialize_with = "lenient_list")]
    pub scopes: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub research_abstract: String,
    pub lab_equipment: LabEquipment,
}

impl Publications {
    pub fn is_populated(&self) -> bool {
        !self.google_scholar_url.is_empty()
            || !self.other_url.is_empty()
            || !self.contents.is_empty()
    }
}

impl LabEquipment {
    pub fn is_populated(&self) -> bool {
        !self.overview.is_empty() || !self.list.is_empty()
    }
}

impl ResearchEntity {
    /// Number of populated key fields: publications, scopes, lab equipment and
    /// research abstract (0..=4)
    pub fn quality(&self) -> u8 {
        [
            self.publications.is_populated(),
            !self.scopes.is_empty(),
            self.lab_equipment.is_populated(),
            !self.research_abstract.is_empty(),
        ]
        .iter()
        .filter(|populated| **populated)
        .count() as u8
    }

    /// True if anything beyond the website was recovered
    pub fn has_content(&self) -> bool {
        let blank = Self {
            website: self.website.clone(),
            ..Self::default()
        };
        *self != blank
    }

    /// Classifies the entity by which fields are populated
    pub fn kind(&self) -> EntityKind {
        let has_abstract = !self.research_abstract.is_empty();
        let has_scopes = !self.scopes.is_empty();

        if self.lab_equipment.is_populated() && !has_abstract && !has_scopes {
            EntityKind::Equipment
        } else if self.publications.is_populated() && !has_abstract && !has_scopes {
            EntityKind::Publication
        } else if has_abstract || has_scopes || !self.department.name.is_empty() {
            EntityKind::Lab
        } else {
            EntityKind::Institution
        }
    }
}

/// Extraction output with the quality signal used as a training label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub kind: EntityKind,
    pub entity: ResearchEntity,
    pub quality: u8,
}

impl ExtractionRecord {
    pub fn new(entity: ResearchEntity, kind: Option<EntityKind>) -> Self {
        Self {
            kind: kind.unwrap_or_else(|| entity.kind()),
            quality: entity.quality(),
            entity,
        }
    }
}
