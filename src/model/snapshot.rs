//! The complete application state held in memory.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

use super::entities::*;
use super::ids::{identifier_string, normalize_record};
use super::settings::SchoolSettings;
use super::table::Table;
use super::{CollectionName, User};

/// All collections plus settings and the session user.
///
/// Serializes to the camelCase document shape the UI and the backup file
/// use. The learning-objective collection is keyed `tps`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub user: Option<User>,
    pub classes: Table<ClassRecord>,
    pub students: Table<Student>,
    #[serde(rename = "tps", alias = "learningObjectives")]
    pub learning_objectives: Table<LearningObjective>,
    pub assessments: Table<Assessment>,
    pub category_results: Table<CategoryResult>,
    pub settings: SchoolSettings,
    pub p5_criteria: Table<P5Criteria>,
    pub p5_assessments: Table<P5Assessment>,
    pub reflections: Table<Reflection>,
    pub reflection_questions: Table<ReflectionQuestion>,
    pub reflection_answers: Table<ReflectionAnswer>,
    pub notes: Table<StudentNote>,
    pub attendance: Table<AttendanceData>,
}

impl Snapshot {
    /// Empty collections keeping the given user and settings.
    pub fn empty_with(user: Option<User>, settings: SchoolSettings) -> Self {
        Self {
            user,
            settings,
            ..Default::default()
        }
    }

    /// Parses a snapshot document, normalizing every identifier first.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(normalize_record(value))
    }

    /// Decodes the collections of a document row by row. A row that does
    /// not decode is left out and reported while the rest of the document
    /// loads. User and settings are not read.
    pub fn from_rows_lenient(document: Value) -> (Self, Vec<SkippedRow>) {
        let mut snapshot = Self::default();
        let mut skipped = Vec::new();
        let Value::Object(mut document) = normalize_record(document) else {
            return (snapshot, skipped);
        };

        fill::<ClassRecord>(&mut snapshot, &mut document, &mut skipped);
        fill::<Student>(&mut snapshot, &mut document, &mut skipped);
        fill::<LearningObjective>(&mut snapshot, &mut document, &mut skipped);
        fill::<Assessment>(&mut snapshot, &mut document, &mut skipped);
        fill::<CategoryResult>(&mut snapshot, &mut document, &mut skipped);
        fill::<P5Criteria>(&mut snapshot, &mut document, &mut skipped);
        fill::<P5Assessment>(&mut snapshot, &mut document, &mut skipped);
        fill::<Reflection>(&mut snapshot, &mut document, &mut skipped);
        fill::<ReflectionQuestion>(&mut snapshot, &mut document, &mut skipped);
        fill::<ReflectionAnswer>(&mut snapshot, &mut document, &mut skipped);
        fill::<StudentNote>(&mut snapshot, &mut document, &mut skipped);
        fill::<AttendanceData>(&mut snapshot, &mut document, &mut skipped);

        (snapshot, skipped)
    }

    /// Equality of every collection and the settings, ignoring the user.
    pub fn same_content(&self, other: &Self) -> bool {
        let mut left = self.clone();
        left.user = other.user.clone();
        left == *other
    }

    /// Rows of one collection as a JSON array. Settings yields the settings
    /// object.
    pub fn collection_value(&self, collection: CollectionName) -> serde_json::Result<Value> {
        match collection {
            CollectionName::Classes => serde_json::to_value(&self.classes),
            CollectionName::Students => serde_json::to_value(&self.students),
            CollectionName::LearningObjectives => serde_json::to_value(&self.learning_objectives),
            CollectionName::Assessments => serde_json::to_value(&self.assessments),
            CollectionName::CategoryResults => serde_json::to_value(&self.category_results),
            CollectionName::P5Criteria => serde_json::to_value(&self.p5_criteria),
            CollectionName::P5Assessments => serde_json::to_value(&self.p5_assessments),
            CollectionName::Reflections => serde_json::to_value(&self.reflections),
            CollectionName::ReflectionQuestions => serde_json::to_value(&self.reflection_questions),
            CollectionName::ReflectionAnswers => serde_json::to_value(&self.reflection_answers),
            CollectionName::Notes => serde_json::to_value(&self.notes),
            CollectionName::Attendance => serde_json::to_value(&self.attendance),
            CollectionName::Settings => serde_json::to_value(&self.settings),
        }
    }

    pub fn collection_len(&self, collection: CollectionName) -> usize {
        match collection {
            CollectionName::Classes => self.classes.len(),
            CollectionName::Students => self.students.len(),
            CollectionName::LearningObjectives => self.learning_objectives.len(),
            CollectionName::Assessments => self.assessments.len(),
            CollectionName::CategoryResults => self.category_results.len(),
            CollectionName::P5Criteria => self.p5_criteria.len(),
            CollectionName::P5Assessments => self.p5_assessments.len(),
            CollectionName::Reflections => self.reflections.len(),
            CollectionName::ReflectionQuestions => self.reflection_questions.len(),
            CollectionName::ReflectionAnswers => self.reflection_answers.len(),
            CollectionName::Notes => self.notes.len(),
            CollectionName::Attendance => self.attendance.len(),
            CollectionName::Settings => 1,
        }
    }

    /// Row count per entity collection.
    pub fn counts(&self) -> BTreeMap<CollectionName, usize> {
        CollectionName::ENTITIES
            .iter()
            .map(|&c| (c, self.collection_len(c)))
            .collect()
    }

    /// Removes the rows with the given ids from one collection. Returns how
    /// many went.
    pub fn remove_ids(&mut self, collection: CollectionName, ids: &HashSet<String>) -> usize {
        match collection {
            CollectionName::Classes => self.classes.remove_ids(ids),
            CollectionName::Students => self.students.remove_ids(ids),
            CollectionName::LearningObjectives => self.learning_objectives.remove_ids(ids),
            CollectionName::Assessments => self.assessments.remove_ids(ids),
            CollectionName::CategoryResults => self.category_results.remove_ids(ids),
            CollectionName::P5Criteria => self.p5_criteria.remove_ids(ids),
            CollectionName::P5Assessments => self.p5_assessments.remove_ids(ids),
            CollectionName::Reflections => self.reflections.remove_ids(ids),
            CollectionName::ReflectionQuestions => self.reflection_questions.remove_ids(ids),
            CollectionName::ReflectionAnswers => self.reflection_answers.remove_ids(ids),
            CollectionName::Notes => self.notes.remove_ids(ids),
            CollectionName::Attendance => self.attendance.remove_ids(ids),
            CollectionName::Settings => 0,
        }
    }
}

/// A row left out of a lenient decode.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub collection: CollectionName,
    pub id: String,
    pub reason: String,
}

fn fill<T: Entity>(snapshot: &mut Snapshot, document: &mut Map<String, Value>, skipped: &mut Vec<SkippedRow>) {
    let Some(Value::Array(values)) = document.remove(T::COLLECTION.document_key()) else {
        return;
    };
    let mut rows = Vec::with_capacity(values.len());
    for value in values {
        let id = value.get("id").map(identifier_string).unwrap_or_default();
        match serde_json::from_value::<T>(value) {
            Ok(row) => rows.push(row),
            Err(e) => skipped.push(SkippedRow {
                collection: T::COLLECTION,
                id,
                reason: e.to_string(),
            }),
        }
    }
    *T::table_mut(snapshot) = Table::from_rows(rows);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_normalizes_ids() {
        let snapshot = Snapshot::from_value(json!({
            "classes": [{ "id": 1, "name": "A" }],
            "students": [{ "id": 2, "classId": 1, "name": "Ani" }],
            "tps": null,
        }))
        .unwrap();

        assert_eq!(snapshot.classes.rows()[0].id, "1");
        assert_eq!(snapshot.students.rows()[0].class_id, "1");
        assert!(snapshot.learning_objectives.is_empty());
        assert!(snapshot.user.is_none());
    }

    #[test]
    fn test_lenient_decode_skips_only_bad_rows() {
        let (snapshot, skipped) = Snapshot::from_rows_lenient(json!({
            "classes": [{ "id": "C1", "name": "A" }],
            "students": [
                { "id": "S1", "classId": "C1", "nisn": 1234567890 },
                { "id": "S2", "classId": "C1", "height": "tinggi" },
                { "id": 3, "classId": "C1" }
            ],
            "tps": [{ "id": "T1", "classId": "C1", "category": ["Quran"] }],
            "notes": null
        }));

        assert_eq!(snapshot.classes.len(), 1);
        assert_eq!(snapshot.students.ids(), HashSet::from(["S1", "3"]));
        assert!(snapshot.learning_objectives.is_empty());
        assert_eq!(
            skipped.iter().map(|r| (r.collection, r.id.as_str())).collect::<Vec<_>>(),
            vec![
                (CollectionName::Students, "S2"),
                (CollectionName::LearningObjectives, "T1")
            ]
        );
    }

    #[test]
    fn test_learning_objectives_alias() {
        let snapshot = Snapshot::from_value(json!({
            "learningObjectives": [{ "id": "T1", "classId": "C1", "category": "Quran" }]
        }))
        .unwrap();
        assert_eq!(snapshot.learning_objectives.len(), 1);

        let out = serde_json::to_value(&snapshot).unwrap();
        assert!(out.get("tps").is_some());
        assert!(out.get("learningObjectives").is_none());
    }

    #[test]
    fn test_same_content_ignores_user() {
        let mut a = Snapshot::default();
        a.classes.upsert(ClassRecord {
            id: "C1".into(),
            ..Default::default()
        });
        let mut b = a.clone();
        b.user = Some(User::new("admin", "Administrator", super::super::Role::Admin));

        assert!(a.same_content(&b));
        b.classes.remove_by_id("C1");
        assert!(!a.same_content(&b));
    }

    #[test]
    fn test_counts_and_remove_ids() {
        let mut s = Snapshot::default();
        for id in ["S1", "S2", "S3"] {
            s.students.upsert(Student {
                id: id.into(),
                ..Default::default()
            });
        }
        assert_eq!(s.counts()[&CollectionName::Students], 3);
        assert_eq!(s.counts().len(), 12);

        let gone: HashSet<String> = ["S1", "S3", "S9"].iter().map(|id| id.to_string()).collect();
        assert_eq!(s.remove_ids(CollectionName::Students, &gone), 2);
        assert_eq!(s.remove_ids(CollectionName::Settings, &gone), 0);
        assert_eq!(s.students.rows()[0].id, "S2");
    }
}
