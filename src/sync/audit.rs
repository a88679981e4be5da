//! Referential integrity auditor.
//!
//! Nothing enforces foreign keys at write time, so deleting a class leaves
//! its students (and their scores) pointing nowhere. The audit finds those
//! rows; the engine's cleanup flow deletes them after confirmation.
//! Empty references are unset, not dangling, and are never reported.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::model::{CollectionName, Record, Snapshot, Table};

/// Orphaned row ids per collection. Collections without orphans are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OrphanReport {
    pub by_collection: BTreeMap<CollectionName, Vec<String>>,
}

impl OrphanReport {
    pub fn total(&self) -> usize {
        self.by_collection.values().map(Vec::len).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    pub fn get(&self, collection: CollectionName) -> &[String] {
        self.by_collection
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn record(&mut self, collection: CollectionName, ids: Vec<String>) {
        if !ids.is_empty() {
            self.by_collection.insert(collection, ids);
        }
    }
}

fn dangling(reference: &str, known: &HashSet<&str>) -> bool {
    !reference.is_empty() && !known.contains(reference)
}

fn orphans_of<T, F>(table: &Table<T>, mut is_orphan: F) -> Vec<String>
where
    T: Record,
    F: FnMut(&T) -> bool,
{
    table
        .iter()
        .filter(|row| is_orphan(row))
        .map(|row| row.id().to_string())
        .collect()
}

/// Every row whose non-empty foreign key does not resolve.
pub fn compute_orphans(snapshot: &Snapshot) -> OrphanReport {
    let class_ids = snapshot.classes.ids();
    let student_ids = snapshot.students.ids();
    let tp_ids = snapshot.learning_objectives.ids();
    let criteria_ids = snapshot.p5_criteria.ids();
    let question_ids = snapshot.reflection_questions.ids();

    let mut report = OrphanReport::default();
    report.record(
        CollectionName::Students,
        orphans_of(&snapshot.students, |s| dangling(&s.class_id, &class_ids)),
    );
    report.record(
        CollectionName::LearningObjectives,
        orphans_of(&snapshot.learning_objectives, |t| dangling(&t.class_id, &class_ids)),
    );
    report.record(
        CollectionName::P5Criteria,
        orphans_of(&snapshot.p5_criteria, |c| dangling(&c.class_id, &class_ids)),
    );
    report.record(
        CollectionName::ReflectionQuestions,
        orphans_of(&snapshot.reflection_questions, |q| dangling(&q.class_id, &class_ids)),
    );
    report.record(
        CollectionName::Assessments,
        orphans_of(&snapshot.assessments, |a| {
            dangling(&a.student_id, &student_ids) || dangling(&a.tp_id, &tp_ids)
        }),
    );
    report.record(
        CollectionName::CategoryResults,
        orphans_of(&snapshot.category_results, |r| dangling(&r.student_id, &student_ids)),
    );
    report.record(
        CollectionName::P5Assessments,
        orphans_of(&snapshot.p5_assessments, |a| {
            dangling(&a.student_id, &student_ids) || dangling(&a.criteria_id, &criteria_ids)
        }),
    );
    report.record(
        CollectionName::Reflections,
        orphans_of(&snapshot.reflections, |r| dangling(&r.student_id, &student_ids)),
    );
    report.record(
        CollectionName::ReflectionAnswers,
        orphans_of(&snapshot.reflection_answers, |a| {
            dangling(&a.student_id, &student_ids) || dangling(&a.question_id, &question_ids)
        }),
    );
    report.record(
        CollectionName::Notes,
        orphans_of(&snapshot.notes, |n| dangling(&n.student_id, &student_ids)),
    );
    report.record(
        CollectionName::Attendance,
        orphans_of(&snapshot.attendance, |a| dangling(&a.student_id, &student_ids)),
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;

    fn consistent() -> Snapshot {
        let mut s = Snapshot::default();
        s.classes.upsert(ClassRecord { id: "C1".into(), ..Default::default() });
        s.students.upsert(Student { id: "S1".into(), class_id: "C1".into(), ..Default::default() });
        s.learning_objectives.upsert(LearningObjective {
            id: "T1".into(),
            class_id: "C1".into(),
            ..Default::default()
        });
        s.p5_criteria.upsert(P5Criteria { id: "K1".into(), class_id: "C1".into(), ..Default::default() });
        s.reflection_questions.upsert(ReflectionQuestion {
            id: "Q1".into(),
            class_id: "C1".into(),
            ..Default::default()
        });
        s.assessments.upsert(Assessment {
            id: "A1".into(),
            student_id: "S1".into(),
            tp_id: "T1".into(),
            score: 2,
            ..Default::default()
        });
        s.p5_assessments.upsert(P5Assessment {
            id: "P1".into(),
            student_id: "S1".into(),
            criteria_id: "K1".into(),
            ..Default::default()
        });
        s.reflection_answers.upsert(ReflectionAnswer {
            id: "R1".into(),
            question_id: "Q1".into(),
            student_id: "S1".into(),
            ..Default::default()
        });
        s.notes.upsert(StudentNote { id: "N1".into(), student_id: "S1".into(), ..Default::default() });
        s.attendance.upsert(AttendanceData { id: "H1".into(), student_id: "S1".into(), ..Default::default() });
        s
    }

    #[test]
    fn test_consistent_snapshot_is_clean() {
        let report = compute_orphans(&consistent());
        assert!(report.is_clean());
        assert_eq!(report.total(), 0);
    }

    #[test]
    fn test_detects_exactly_the_orphans() {
        let mut s = consistent();
        s.students.upsert(Student { id: "S9".into(), class_id: "GONE".into(), ..Default::default() });
        s.assessments.upsert(Assessment {
            id: "A2".into(),
            student_id: "S1".into(),
            tp_id: "T404".into(),
            ..Default::default()
        });
        s.reflections.upsert(Reflection { id: "F1".into(), student_id: "S404".into(), ..Default::default() });
        s.reflection_answers.upsert(ReflectionAnswer {
            id: "R2".into(),
            question_id: "Q404".into(),
            student_id: "S1".into(),
            ..Default::default()
        });

        let report = compute_orphans(&s);
        assert_eq!(report.total(), 4);
        assert_eq!(report.get(CollectionName::Students), &["S9".to_string()]);
        assert_eq!(report.get(CollectionName::Assessments), &["A2".to_string()]);
        assert_eq!(report.get(CollectionName::Reflections), &["F1".to_string()]);
        assert_eq!(report.get(CollectionName::ReflectionAnswers), &["R2".to_string()]);
        assert!(report.get(CollectionName::Notes).is_empty());
    }

    #[test]
    fn test_deleting_a_class_orphans_its_children() {
        let mut s = consistent();
        s.classes.remove_by_id("C1");

        let report = compute_orphans(&s);
        assert_eq!(report.get(CollectionName::Students), &["S1".to_string()]);
        assert_eq!(report.get(CollectionName::LearningObjectives), &["T1".to_string()]);
        assert_eq!(report.get(CollectionName::P5Criteria), &["K1".to_string()]);
        assert_eq!(report.get(CollectionName::ReflectionQuestions), &["Q1".to_string()]);
        // grandchildren still resolve to their student
        assert!(report.get(CollectionName::Assessments).is_empty());
    }

    #[test]
    fn test_empty_reference_is_not_an_orphan() {
        let mut s = consistent();
        s.p5_criteria.upsert(P5Criteria { id: "K2".into(), ..Default::default() });
        assert!(compute_orphans(&s).is_clean());
    }

    #[test]
    fn test_report_serializes_by_collection_name() {
        let mut s = consistent();
        s.learning_objectives.upsert(LearningObjective {
            id: "T2".into(),
            class_id: "X".into(),
            ..Default::default()
        });
        let json = serde_json::to_value(compute_orphans(&s)).unwrap();
        assert_eq!(json, serde_json::json!({ "TPs": ["T2"] }));
    }
}
