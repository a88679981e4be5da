//! Mapping from collection names to storage table names.

use crate::model::CollectionName;

use super::case::to_snake;

/// Table name for a collection. The learning-objective collection is
/// addressed as `TPs` but stored in `tps`; everything else is snake_case.
pub fn table_name(collection: CollectionName) -> String {
    match collection {
        CollectionName::LearningObjectives => "tps".to_string(),
        other => to_snake(other.as_str()),
    }
}

/// Tables wiped by a database clear, children before parents.
pub fn clear_order(keep_learning_objectives: bool) -> Vec<CollectionName> {
    let mut order = vec![
        CollectionName::Assessments,
        CollectionName::CategoryResults,
        CollectionName::P5Assessments,
        CollectionName::Reflections,
        CollectionName::ReflectionAnswers,
        CollectionName::Notes,
        CollectionName::Attendance,
        CollectionName::Students,
        CollectionName::P5Criteria,
        CollectionName::ReflectionQuestions,
    ];
    if !keep_learning_objectives {
        order.push(CollectionName::LearningObjectives);
    }
    order.push(CollectionName::Classes);
    order
}

/// Tables written by a restore after settings, parents before children.
pub const RESTORE_ORDER: [CollectionName; 12] = [
    CollectionName::Classes,
    CollectionName::LearningObjectives,
    CollectionName::P5Criteria,
    CollectionName::ReflectionQuestions,
    CollectionName::Students,
    CollectionName::Assessments,
    CollectionName::CategoryResults,
    CollectionName::P5Assessments,
    CollectionName::Reflections,
    CollectionName::ReflectionAnswers,
    CollectionName::Notes,
    CollectionName::Attendance,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        assert_eq!(table_name(CollectionName::LearningObjectives), "tps");
        assert_eq!(table_name(CollectionName::CategoryResults), "category_results");
        assert_eq!(table_name(CollectionName::P5Assessments), "p5_assessments");
        assert_eq!(table_name(CollectionName::ReflectionAnswers), "reflection_answers");
        assert_eq!(table_name(CollectionName::Settings), "settings");
    }

    #[test]
    fn test_clear_order() {
        let names: Vec<String> = clear_order(false).into_iter().map(table_name).collect();
        assert_eq!(
            names,
            vec![
                "assessments",
                "category_results",
                "p5_assessments",
                "reflections",
                "reflection_answers",
                "notes",
                "attendance",
                "students",
                "p5_criteria",
                "reflection_questions",
                "tps",
                "classes"
            ]
        );
        assert!(!clear_order(true).contains(&CollectionName::LearningObjectives));
    }
}
