//! Domain model: entity records, keyed tables and the in-memory snapshot.
//!
//! Identity is always an opaque string. Records coming from outside the
//! process go through [`ids::normalize_record`] or the typed
//! [`ids::string_or_number`] deserializer before they reach a [`Table`].

pub mod entities;
pub mod ids;
pub mod settings;
pub mod snapshot;
pub mod table;

pub use entities::*;
pub use settings::{AiProvider, SchoolSettings, SETTINGS_ID};
pub use snapshot::{SkippedRow, Snapshot};
pub use table::{Record, Table};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// External name of a collection, as used by the UI and by the remote
/// adapter's table mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CollectionName {
    #[serde(rename = "classes")]
    Classes,
    #[serde(rename = "students")]
    Students,
    #[serde(rename = "TPs", alias = "tps", alias = "learningObjectives")]
    LearningObjectives,
    #[serde(rename = "assessments")]
    Assessments,
    #[serde(rename = "categoryResults")]
    CategoryResults,
    #[serde(rename = "p5Criteria")]
    P5Criteria,
    #[serde(rename = "p5Assessments")]
    P5Assessments,
    #[serde(rename = "reflections")]
    Reflections,
    #[serde(rename = "reflectionQuestions")]
    ReflectionQuestions,
    #[serde(rename = "reflectionAnswers")]
    ReflectionAnswers,
    #[serde(rename = "notes")]
    Notes,
    #[serde(rename = "attendance")]
    Attendance,
    #[serde(rename = "settings")]
    Settings,
}

impl CollectionName {
    /// Every entity collection, settings excluded.
    pub const ENTITIES: [CollectionName; 12] = [
        CollectionName::Classes,
        CollectionName::Students,
        CollectionName::LearningObjectives,
        CollectionName::Assessments,
        CollectionName::CategoryResults,
        CollectionName::P5Criteria,
        CollectionName::P5Assessments,
        CollectionName::Reflections,
        CollectionName::ReflectionQuestions,
        CollectionName::ReflectionAnswers,
        CollectionName::Notes,
        CollectionName::Attendance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionName::Classes => "classes",
            CollectionName::Students => "students",
            CollectionName::LearningObjectives => "TPs",
            CollectionName::Assessments => "assessments",
            CollectionName::CategoryResults => "categoryResults",
            CollectionName::P5Criteria => "p5Criteria",
            CollectionName::P5Assessments => "p5Assessments",
            CollectionName::Reflections => "reflections",
            CollectionName::ReflectionQuestions => "reflectionQuestions",
            CollectionName::ReflectionAnswers => "reflectionAnswers",
            CollectionName::Notes => "notes",
            CollectionName::Attendance => "attendance",
            CollectionName::Settings => "settings",
        }
    }

    /// Key of the collection inside a snapshot document.
    pub fn document_key(&self) -> &'static str {
        match self {
            CollectionName::LearningObjectives => "tps",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "tps" || s == "learningObjectives" {
            return Ok(CollectionName::LearningObjectives);
        }
        CollectionName::ENTITIES
            .iter()
            .chain(std::iter::once(&CollectionName::Settings))
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown collection: {}", s))
    }
}

/// Role of a logged-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[serde(alias = "guru")]
    Teacher,
    #[serde(alias = "orangtua")]
    Parent,
}

impl Role {
    /// Pass-through write permission for a collection.
    pub fn can_write(&self, collection: CollectionName) -> bool {
        match self {
            Role::Admin => true,
            Role::Teacher => matches!(
                collection,
                CollectionName::Students
                    | CollectionName::Assessments
                    | CollectionName::CategoryResults
                    | CollectionName::P5Assessments
                    | CollectionName::Reflections
                    | CollectionName::ReflectionQuestions
                    | CollectionName::ReflectionAnswers
                    | CollectionName::Notes
                    | CollectionName::Attendance
            ),
            Role::Parent => false,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// The session user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub name: String,
    pub role: Role,
}

impl User {
    pub fn new(username: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            name: name.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_names() {
        assert_eq!(CollectionName::LearningObjectives.as_str(), "TPs");
        assert_eq!("tps".parse::<CollectionName>(), Ok(CollectionName::LearningObjectives));
        assert_eq!("p5Criteria".parse::<CollectionName>(), Ok(CollectionName::P5Criteria));
        assert!("grades".parse::<CollectionName>().is_err());

        let parsed: CollectionName = serde_json::from_str("\"learningObjectives\"").unwrap();
        assert_eq!(parsed, CollectionName::LearningObjectives);
    }

    #[test]
    fn test_role_permissions() {
        assert!(Role::Admin.can_write(CollectionName::Classes));
        assert!(Role::Teacher.can_write(CollectionName::Assessments));
        assert!(!Role::Teacher.can_write(CollectionName::Classes));
        assert!(!Role::Teacher.can_write(CollectionName::Settings));
        assert!(!Role::Parent.can_write(CollectionName::Notes));
    }

    #[test]
    fn test_legacy_role_names() {
        let user: User =
            serde_json::from_str(r#"{"username":"guru","name":"Guru Kelas","role":"guru"}"#).unwrap();
        assert_eq!(user.role, Role::Teacher);
    }
}
