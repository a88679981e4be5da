//! Report-card assembly.
//!
//! Pulls everything one student's report shows out of a snapshot. Layout
//! and printing are the UI's business; this only produces the data.

use serde::Serialize;

use crate::model::settings::DEFAULT_P5_LABELS;
use crate::model::{ClassRecord, Snapshot, Student};

/// Display label of an intra-curricular score. Scores outside 1..=3 have
/// none.
pub fn intra_label(score: i32) -> Option<&'static str> {
    match score {
        1 => Some("BERKEMBANG"),
        2 => Some("CAKAP"),
        3 => Some("MAHIR"),
        _ => None,
    }
}

/// Template narrative for a P5 sub-dimension.
pub fn template_description(student_name: &str, label: &str, sub_dimension: &str, teacher_note: &str) -> String {
    let mut text = format!(
        "Ananda {} menunjukkan capaian {} dalam {}.",
        student_name, label, sub_dimension
    );
    if !teacher_note.is_empty() {
        text.push(' ');
        text.push_str(teacher_note);
    }
    text
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportHeader {
    pub school_name: String,
    pub logo_url: Option<String>,
    pub academic_year: String,
    pub semester: String,
    pub headmaster: String,
    pub teacher: String,
    pub report_place: String,
    pub report_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveLine {
    pub tp_id: String,
    pub description: String,
    pub activity: String,
    /// 0 when not assessed.
    pub score: i32,
    pub label: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySection {
    pub category: String,
    pub objectives: Vec<ObjectiveLine>,
    pub narrative: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct P5Line {
    pub criteria_id: String,
    pub sub_dimension: String,
    pub score: i32,
    pub label: Option<String>,
    pub narrative: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AttendanceSummary {
    pub sick: u32,
    pub permission: u32,
    pub alpha: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCard {
    pub header: ReportHeader,
    pub student: Student,
    pub class: Option<ClassRecord>,
    pub categories: Vec<CategorySection>,
    pub p5: Vec<P5Line>,
    pub note: Option<String>,
    pub attendance: AttendanceSummary,
}

impl ReportCard {
    /// Assembles the report for `student_id`, or `None` for an unknown
    /// student.
    pub fn build(snapshot: &Snapshot, student_id: &str) -> Option<Self> {
        let student = snapshot.students.find(student_id)?.clone();
        let settings = &snapshot.settings;
        let class = snapshot.classes.find(&student.class_id).cloned();

        let logo_url = [&settings.report_logo_url, &settings.logo_url]
            .into_iter()
            .flatten()
            .find(|url| !url.is_empty())
            .cloned();
        let header = ReportHeader {
            school_name: settings.name.clone(),
            logo_url,
            academic_year: settings.academic_year.clone(),
            semester: settings.semester.clone(),
            headmaster: settings.headmaster.clone(),
            teacher: class
                .as_ref()
                .map(|c| c.teacher_name.clone())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| settings.teacher.clone()),
            report_place: settings.report_place.clone(),
            report_date: settings.report_date.clone(),
        };

        // Categories without objectives for the class are left out.
        let categories = settings
            .active_categories()
            .into_iter()
            .filter_map(|category| {
                let objectives: Vec<ObjectiveLine> = snapshot
                    .learning_objectives
                    .iter()
                    .filter(|t| t.category == category && t.class_id == student.class_id)
                    .map(|t| {
                        let score = snapshot
                            .assessments
                            .get(&(student.id.clone(), t.id.clone()))
                            .map(|a| a.score)
                            .unwrap_or(0);
                        ObjectiveLine {
                            tp_id: t.id.clone(),
                            description: t.description.clone(),
                            activity: t.activity.clone(),
                            score,
                            label: intra_label(score),
                        }
                    })
                    .collect();
                if objectives.is_empty() {
                    return None;
                }
                let narrative = snapshot
                    .category_results
                    .get(&(student.id.clone(), category.clone()))
                    .map(|r| r.generated_description.clone())
                    .filter(|text| !text.is_empty());
                Some(CategorySection {
                    category,
                    objectives,
                    narrative,
                })
            })
            .collect();

        let label_count = settings.p5_labels().len();
        let p5 = snapshot
            .p5_criteria
            .iter()
            .filter(|c| c.class_id == student.class_id)
            .filter_map(|c| {
                let assessment = snapshot
                    .p5_assessments
                    .get(&(student.id.clone(), c.id.clone()))?;
                let narrative = Some(assessment.generated_description.clone())
                    .filter(|text| !text.is_empty())
                    .or_else(|| {
                        u32::try_from(assessment.score)
                            .ok()
                            .and_then(|level| c.level_description(level, label_count))
                    });
                Some(P5Line {
                    criteria_id: c.id.clone(),
                    sub_dimension: c.sub_dimension.clone(),
                    score: assessment.score,
                    label: settings.p5_label(assessment.score),
                    narrative,
                })
            })
            .collect();

        let note = snapshot
            .notes
            .get(&student.id)
            .map(|n| n.note.clone())
            .filter(|text| !text.is_empty());
        let attendance = snapshot
            .attendance
            .get(&student.id)
            .map(|a| AttendanceSummary {
                sick: a.sick,
                permission: a.permission,
                alpha: a.alpha,
            })
            .unwrap_or_default();

        Some(Self {
            header,
            student,
            class,
            categories,
            p5,
            note,
            attendance,
        })
    }
}

/// Template narrative for a student's P5 score, using the configured label
/// (the first default label when the score has none).
pub fn p5_template(snapshot: &Snapshot, student: &Student, score: i32, sub_dimension: &str, teacher_note: &str) -> String {
    let label = snapshot
        .settings
        .p5_label(score)
        .unwrap_or_else(|| DEFAULT_P5_LABELS[0].to_string());
    template_description(&student.name, &label, sub_dimension, teacher_note)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use std::collections::BTreeMap;

    fn snapshot() -> Snapshot {
        let mut s = Snapshot::default();
        s.settings.name = "TK Harapan".into();
        s.settings.logo_url = Some("https://x/logo.png".into());
        s.classes.upsert(ClassRecord {
            id: "C1".into(),
            name: "Kelompok A".into(),
            teacher_name: "Bu Sari".into(),
            ..Default::default()
        });
        s.students.upsert(Student {
            id: "S1".into(),
            name: "Budi".into(),
            class_id: "C1".into(),
            ..Default::default()
        });
        for (id, category) in [("T1", "Quran"), ("T2", "Quran"), ("T3", "Hafalan")] {
            s.learning_objectives.upsert(LearningObjective {
                id: id.into(),
                class_id: "C1".into(),
                category: category.into(),
                description: format!("Tujuan {}", id),
                ..Default::default()
            });
        }
        s.assessments.upsert(Assessment {
            id: "S1-T1".into(),
            student_id: "S1".into(),
            tp_id: "T1".into(),
            score: 3,
            ..Default::default()
        });
        s.category_results.upsert(CategoryResult {
            id: "S1-Quran".into(),
            student_id: "S1".into(),
            category: "Quran".into(),
            generated_description: "Ananda lancar membaca.".into(),
            ..Default::default()
        });
        s
    }

    #[test]
    fn test_intra_labels() {
        assert_eq!(intra_label(1), Some("BERKEMBANG"));
        assert_eq!(intra_label(2), Some("CAKAP"));
        assert_eq!(intra_label(3), Some("MAHIR"));
        assert_eq!(intra_label(0), None);
        assert_eq!(intra_label(4), None);
    }

    #[test]
    fn test_template_description() {
        assert_eq!(
            template_description("Budi", "BSH", "Mandiri", ""),
            "Ananda Budi menunjukkan capaian BSH dalam Mandiri."
        );
        assert_eq!(
            template_description("Budi", "SB", "Mandiri", "Sangat baik."),
            "Ananda Budi menunjukkan capaian SB dalam Mandiri. Sangat baik."
        );
    }

    #[test]
    fn test_p5_template_falls_back_to_first_label() {
        let s = snapshot();
        let student = s.students.find("S1").unwrap().clone();
        assert_eq!(
            p5_template(&s, &student, 9, "Kreatif", ""),
            "Ananda Budi menunjukkan capaian MB dalam Kreatif."
        );
    }

    #[test]
    fn test_build_intra_sections() {
        let card = ReportCard::build(&snapshot(), "S1").unwrap();
        assert_eq!(card.header.school_name, "TK Harapan");
        assert_eq!(card.header.logo_url.as_deref(), Some("https://x/logo.png"));
        assert_eq!(card.header.teacher, "Bu Sari");
        assert_eq!(card.class.unwrap().name, "Kelompok A");

        let names: Vec<&str> = card.categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["Quran", "Hafalan"]);

        let quran = &card.categories[0];
        assert_eq!(quran.objectives.len(), 2);
        assert_eq!(quran.objectives[0].label, Some("MAHIR"));
        assert_eq!(quran.objectives[1].score, 0);
        assert_eq!(quran.objectives[1].label, None);
        assert_eq!(quran.narrative.as_deref(), Some("Ananda lancar membaca."));
        assert!(card.categories[1].narrative.is_none());

        assert_eq!(card.attendance, AttendanceSummary::default());
        assert!(card.note.is_none());
    }

    #[test]
    fn test_build_unknown_student() {
        assert!(ReportCard::build(&snapshot(), "S404").is_none());
    }

    #[test]
    fn test_p5_rows_with_custom_labels() {
        let mut s = snapshot();
        s.settings.p5_labels = Some(vec!["BB".into(), "MB".into(), "BSH".into(), "BSB".into()]);
        s.p5_criteria.upsert(P5Criteria {
            id: "K1".into(),
            class_id: "C1".into(),
            sub_dimension: "Mandiri".into(),
            level_descriptions: BTreeMap::from([(4, "Sangat mandiri".to_string())]),
            ..Default::default()
        });
        s.p5_criteria.upsert(P5Criteria {
            id: "K2".into(),
            class_id: "C1".into(),
            sub_dimension: "Kreatif".into(),
            ..Default::default()
        });
        s.p5_assessments.upsert(P5Assessment {
            id: "S1-K1".into(),
            student_id: "S1".into(),
            criteria_id: "K1".into(),
            score: 4,
            ..Default::default()
        });

        let card = ReportCard::build(&s, "S1").unwrap();
        // K2 has no assessment and is left out
        assert_eq!(card.p5.len(), 1);
        assert_eq!(card.p5[0].label.as_deref(), Some("BSB"));
        assert_eq!(card.p5[0].narrative.as_deref(), Some("Sangat mandiri"));

        s.settings.p5_labels = Some(vec!["MB".into(), "BSH".into()]);
        let card = ReportCard::build(&s, "S1").unwrap();
        assert_eq!(card.p5[0].label, None);
        assert_eq!(card.p5[0].narrative, None);
    }

    #[test]
    fn test_note_and_attendance() {
        let mut s = snapshot();
        s.notes.upsert(StudentNote {
            id: "S1-note".into(),
            student_id: "S1".into(),
            note: "Rajin".into(),
        });
        s.attendance.upsert(AttendanceData {
            id: "S1-att".into(),
            student_id: "S1".into(),
            sick: 2,
            permission: 1,
            alpha: 0,
        });

        let card = ReportCard::build(&s, "S1").unwrap();
        assert_eq!(card.note.as_deref(), Some("Rajin"));
        assert_eq!(card.attendance.sick, 2);
        assert_eq!(card.attendance.permission, 1);
    }
}
