//! CSV export of the question sheet for auditing.

use std::path::Path;

use survey_model::{Question, Result};

const HEADER: [&str; 8] = [
    "name",
    "question_group",
    "question_type",
    "format",
    "label",
    "choices",
    "contingent_of_name",
    "contingent_of_choice",
];

/// Write one row per question; choice vocabularies are embedded as JSON.
pub fn write_question_sheet(questions: &[Question], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(HEADER)?;
    for question in questions {
        let choices = match &question.choices {
            Some(choices) => serde_json::to_string(choices)?,
            None => String::new(),
        };
        let format = question
            .format
            .map(|format| format.as_str())
            .unwrap_or_default();
        writer.write_record([
            question.name.as_str(),
            question.question_group.as_str(),
            question.question_type.as_str(),
            format,
            question.label.as_str(),
            choices.as_str(),
            question.contingent_of_name.as_deref().unwrap_or_default(),
            question.contingent_of_choice.as_deref().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use survey_model::QuestionType;

    #[test]
    fn sheet_rows_carry_choices_as_json() {
        let questions = vec![Question {
            name: "A6".to_string(),
            question_group: "A6".to_string(),
            question_type: QuestionType::SingleChoice,
            format: None,
            label: "Gender".to_string(),
            choices: Some(BTreeMap::from([("A1".to_string(), "Woman".to_string())])),
            contingent_of_name: None,
            contingent_of_choice: None,
        }];
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("questions.csv");
        write_question_sheet(&questions, &path).expect("write");

        let content = std::fs::read_to_string(&path).expect("read back");
        let mut lines = content.lines();
        assert!(lines.next().expect("header").starts_with("name,"));
        let row = lines.next().expect("row");
        assert!(row.starts_with("A6,A6,single-choice,,Gender,"));
        assert!(row.contains("Woman"));
    }
}
