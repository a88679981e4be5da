//! Entity records of the report-card domain.
//!
//! Every identifier and reference field is a string and deserializes through
//! [`string_or_number`], so rows fetched with numeric ids land in the same
//! identity space as rows created locally.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::{composite_id, lenient_number, lenient_string, string_or_number};
use super::table::{Record, Table};
use super::{CollectionName, Snapshot};

/// A class (kelompok) and its teacher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    pub teacher_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub nuptk: String,
}

/// A pupil enrolled in a class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Student {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub nisn: String,
    pub name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub class_id: String,
    /// Place of birth
    pub pob: String,
    /// Date of birth
    pub dob: String,
    pub religion: String,
    #[serde(deserialize_with = "lenient_number")]
    pub child_order: i64,
    /// `L` or `P`
    pub gender: String,
    #[serde(deserialize_with = "lenient_string")]
    pub phone: String,
    pub father_name: String,
    pub mother_name: String,
    pub father_job: String,
    pub mother_job: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// Learning objective (TP) of a class, grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearningObjective {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub class_id: String,
    pub category: String,
    pub description: String,
    pub activity: String,
}

/// Score of one student on one learning objective.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Assessment {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub student_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub tp_id: String,
    #[serde(deserialize_with = "lenient_number")]
    pub score: i32,
    #[serde(deserialize_with = "lenient_string")]
    pub semester: String,
    #[serde(deserialize_with = "lenient_string")]
    pub academic_year: String,
}

/// Per-category narrative for a student.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryResult {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub student_id: String,
    pub category: String,
    pub teacher_note: String,
    pub generated_description: String,
    #[serde(deserialize_with = "lenient_string")]
    pub semester: String,
    #[serde(deserialize_with = "lenient_string")]
    pub academic_year: String,
}

/// Co-curricular (P5) assessment dimension of a class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct P5Criteria {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub class_id: String,
    pub sub_dimension: String,
    /// Sparse map from 1-based level to descriptive text.
    pub level_descriptions: BTreeMap<u32, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc_berkembang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc_cakap: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc_mahir: Option<String>,
}

impl P5Criteria {
    /// Level descriptions. A level with no text in the map falls back to
    /// its legacy field (1 berkembang, 2 cakap, 3 mahir).
    pub fn effective_level_descriptions(&self) -> BTreeMap<u32, String> {
        let mut levels: BTreeMap<u32, String> = [
            (1, &self.desc_berkembang),
            (2, &self.desc_cakap),
            (3, &self.desc_mahir),
        ]
        .into_iter()
        .filter_map(|(level, text)| {
            text.as_ref()
                .filter(|t| !t.is_empty())
                .map(|t| (level, t.clone()))
        })
        .collect();
        levels.extend(
            self.level_descriptions
                .iter()
                .filter(|(_, text)| !text.is_empty())
                .map(|(&level, text)| (level, text.clone())),
        );
        levels
    }

    /// Description for a level on a scale of `label_count` labels. Levels
    /// outside `1..=label_count`, or levels without text, are absent.
    pub fn level_description(&self, level: u32, label_count: usize) -> Option<String> {
        if level == 0 || level as usize > label_count {
            return None;
        }
        self.effective_level_descriptions()
            .remove(&level)
            .filter(|text| !text.is_empty())
    }
}

/// Co-curricular score of one student on one criteria.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct P5Assessment {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub student_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub criteria_id: String,
    #[serde(deserialize_with = "lenient_number")]
    pub score: i32,
    pub teacher_note: String,
    pub generated_description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Reflection {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub student_id: String,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReflectionQuestion {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub class_id: String,
    pub question: String,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReflectionAnswer {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub question_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub student_id: String,
    pub answer: String,
}

/// Teacher's closing note for a student. One per student.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentNote {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub student_id: String,
    pub note: String,
}

/// Absence counts for a student. One per student.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttendanceData {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub student_id: String,
    #[serde(deserialize_with = "lenient_number")]
    pub sick: u32,
    #[serde(deserialize_with = "lenient_number")]
    pub permission: u32,
    #[serde(deserialize_with = "lenient_number")]
    pub alpha: u32,
}

/// A record type held by the snapshot.
pub trait Entity: Record + Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: CollectionName;

    fn table(snapshot: &Snapshot) -> &Table<Self>;
    fn table_mut(snapshot: &mut Snapshot) -> &mut Table<Self>;

    /// Composite id derived from the natural key, for natural-keyed
    /// collections. Plain collections get a timestamp id instead.
    fn natural_id(&self) -> Option<String> {
        None
    }
}

macro_rules! id_keyed {
    ($ty:ty, $collection:expr, $field:ident) => {
        impl Record for $ty {
            type Key = String;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn key(&self) -> String {
                self.id.clone()
            }
        }

        impl Entity for $ty {
            const COLLECTION: CollectionName = $collection;

            fn table(snapshot: &Snapshot) -> &Table<Self> {
                &snapshot.$field
            }

            fn table_mut(snapshot: &mut Snapshot) -> &mut Table<Self> {
                &mut snapshot.$field
            }
        }
    };
}

id_keyed!(ClassRecord, CollectionName::Classes, classes);
id_keyed!(Student, CollectionName::Students, students);
id_keyed!(LearningObjective, CollectionName::LearningObjectives, learning_objectives);
id_keyed!(P5Criteria, CollectionName::P5Criteria, p5_criteria);
id_keyed!(Reflection, CollectionName::Reflections, reflections);
id_keyed!(ReflectionQuestion, CollectionName::ReflectionQuestions, reflection_questions);

macro_rules! natural_keyed {
    ($ty:ty, $collection:expr, $field:ident, $key:ty, |$row:ident| $key_expr:expr, $id_expr:expr) => {
        impl Record for $ty {
            type Key = $key;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn key(&self) -> $key {
                let $row = self;
                $key_expr
            }
        }

        impl Entity for $ty {
            const COLLECTION: CollectionName = $collection;

            fn table(snapshot: &Snapshot) -> &Table<Self> {
                &snapshot.$field
            }

            fn table_mut(snapshot: &mut Snapshot) -> &mut Table<Self> {
                &mut snapshot.$field
            }

            fn natural_id(&self) -> Option<String> {
                let $row = self;
                Some($id_expr)
            }
        }
    };
}

natural_keyed!(
    Assessment,
    CollectionName::Assessments,
    assessments,
    (String, String),
    |a| (a.student_id.clone(), a.tp_id.clone()),
    composite_id(&[&a.student_id, &a.tp_id])
);
natural_keyed!(
    CategoryResult,
    CollectionName::CategoryResults,
    category_results,
    (String, String),
    |r| (r.student_id.clone(), r.category.clone()),
    composite_id(&[&r.student_id, &r.category])
);
natural_keyed!(
    P5Assessment,
    CollectionName::P5Assessments,
    p5_assessments,
    (String, String),
    |a| (a.student_id.clone(), a.criteria_id.clone()),
    composite_id(&[&a.student_id, &a.criteria_id])
);
natural_keyed!(
    ReflectionAnswer,
    CollectionName::ReflectionAnswers,
    reflection_answers,
    (String, String),
    |a| (a.question_id.clone(), a.student_id.clone()),
    composite_id(&[&a.question_id, &a.student_id])
);
natural_keyed!(
    StudentNote,
    CollectionName::Notes,
    notes,
    String,
    |n| n.student_id.clone(),
    composite_id(&[&n.student_id, "note"])
);
natural_keyed!(
    AttendanceData,
    CollectionName::Attendance,
    attendance,
    String,
    |a| a.student_id.clone(),
    composite_id(&[&a.student_id, "att"])
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_ids_deserialize_as_strings() {
        let student: Student =
            serde_json::from_value(json!({ "id": 42, "classId": 7, "name": "Ani" })).unwrap();
        assert_eq!(student.id, "42");
        assert_eq!(student.class_id, "7");
        assert_eq!(student.gender, "");
    }

    #[test]
    fn test_level_descriptions_keys() {
        let crit: P5Criteria = serde_json::from_value(json!({
            "id": "k1",
            "classId": "C1",
            "subDimension": "Mandiri",
            "levelDescriptions": { "1": "x", "2": "y" }
        }))
        .unwrap();

        assert_eq!(crit.level_description(1, 3).as_deref(), Some("x"));
        assert_eq!(crit.level_description(2, 3).as_deref(), Some("y"));
        assert_eq!(crit.level_description(3, 3), None);
        // beyond the label scale
        assert_eq!(crit.level_description(2, 1), None);
        assert_eq!(crit.level_description(0, 3), None);
    }

    #[test]
    fn test_legacy_level_fields_fill_empty_map() {
        let crit = P5Criteria {
            id: "k1".into(),
            desc_berkembang: Some("awal".into()),
            desc_mahir: Some("mahir".into()),
            ..Default::default()
        };

        assert_eq!(crit.level_description(1, 3).as_deref(), Some("awal"));
        assert_eq!(crit.level_description(2, 3), None);
        assert_eq!(crit.level_description(3, 3).as_deref(), Some("mahir"));
    }

    #[test]
    fn test_legacy_fields_fill_missing_levels() {
        let crit: P5Criteria = serde_json::from_value(json!({
            "id": "k1",
            "levelDescriptions": { "1": "x", "2": "" },
            "descCakap": "cakap",
            "descMahir": "z"
        }))
        .unwrap();

        assert_eq!(crit.level_description(1, 3).as_deref(), Some("x"));
        assert_eq!(crit.level_description(2, 3).as_deref(), Some("cakap"));
        assert_eq!(crit.level_description(3, 3).as_deref(), Some("z"));
    }

    #[test]
    fn test_loosely_typed_columns() {
        let student: Student = serde_json::from_value(json!({
            "id": "S1",
            "nisn": 1234567890,
            "phone": 81234,
            "childOrder": "2"
        }))
        .unwrap();
        assert_eq!(student.nisn, "1234567890");
        assert_eq!(student.phone, "81234");
        assert_eq!(student.child_order, 2);

        let a: Assessment =
            serde_json::from_value(json!({ "id": "a", "score": "3", "semester": 2 })).unwrap();
        assert_eq!((a.score, a.semester.as_str()), (3, "2"));
    }

    #[test]
    fn test_natural_ids() {
        let a = Assessment {
            student_id: "S1".into(),
            tp_id: "T1".into(),
            ..Default::default()
        };
        assert_eq!(a.natural_id().as_deref(), Some("S1-T1"));

        let att = AttendanceData {
            student_id: "S9".into(),
            ..Default::default()
        };
        assert_eq!(att.natural_id().as_deref(), Some("S9-att"));

        let class = ClassRecord::default();
        assert!(class.natural_id().is_none());
    }
}
