//! Cross-validation of the response table against the parsed question set.
//!
//! Schema mismatches are not errors. Unknown response columns are dropped
//! and questions without a data column are retained; both lists are logged
//! and returned so callers and tests can inspect them.

use std::collections::BTreeSet;

use polars::prelude::DataFrame;
use tracing::warn;

use survey_model::{Question, Result, SurveyOptions};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct SchemaReport {
    /// Response columns with no matching question, removed from the table.
    pub dropped_columns: Vec<String>,
    /// Question names with no response column; kept in the schema, their
    /// data reads back as all-missing.
    pub missing_questions: Vec<String>,
}

impl SchemaReport {
    pub fn is_clean(&self) -> bool {
        self.dropped_columns.is_empty() && self.missing_questions.is_empty()
    }
}

/// Reconcile the response table with the question set.
///
/// The id column and columns under a configured excluded prefix are outside
/// the check and always survive. Running the pass again on its own output
/// reports nothing and leaves the table unchanged.
pub fn reconcile(
    responses: &mut DataFrame,
    questions: &[Question],
    options: &SurveyOptions,
) -> Result<SchemaReport> {
    let known: BTreeSet<&str> = questions
        .iter()
        .map(|question| question.name.as_str())
        .collect();

    let mut retained: Vec<String> = Vec::new();
    let mut dropped_columns: Vec<String> = Vec::new();
    for column in responses.get_column_names() {
        let name = column.as_str();
        if known.contains(name) || options.is_excluded_column(name) {
            retained.push(name.to_string());
        } else {
            dropped_columns.push(name.to_string());
        }
    }

    let present: BTreeSet<&str> = responses
        .get_column_names()
        .into_iter()
        .map(|column| column.as_str())
        .collect();
    let missing_questions: Vec<String> = questions
        .iter()
        .filter(|question| !present.contains(question.name.as_str()))
        .map(|question| question.name.clone())
        .collect();

    if !dropped_columns.is_empty() {
        warn!(
            columns = ?dropped_columns,
            "dropping response columns not declared in the survey structure"
        );
        *responses = responses.select(retained)?;
    }
    if !missing_questions.is_empty() {
        warn!(
            questions = ?missing_questions,
            "structure declares questions with no response column"
        );
    }

    Ok(SchemaReport {
        dropped_columns,
        missing_questions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{NamedFrom, Series};
    use survey_model::QuestionType;

    fn question(name: &str) -> Question {
        Question {
            name: name.to_string(),
            question_group: name.to_string(),
            question_type: QuestionType::Free,
            format: None,
            label: name.to_string(),
            choices: None,
            contingent_of_name: None,
            contingent_of_choice: None,
        }
    }

    fn frame(names: &[&str]) -> DataFrame {
        let columns = names
            .iter()
            .map(|name| Series::new((*name).into(), &["x"]).into())
            .collect::<Vec<_>>();
        DataFrame::new(columns).expect("frame")
    }

    #[test]
    fn unknown_columns_are_dropped_and_reported() {
        let mut responses = frame(&["id", "A6", "Z99"]);
        let questions = vec![question("A6")];
        let report =
            reconcile(&mut responses, &questions, &SurveyOptions::default()).expect("reconcile");
        assert_eq!(report.dropped_columns, vec!["Z99".to_string()]);
        assert!(report.missing_questions.is_empty());
        assert!(responses.column("Z99").is_err());
        assert!(responses.column("A6").is_ok());
    }

    #[test]
    fn excluded_prefix_escapes_the_check() {
        let mut responses = frame(&["id", "A6", "D11_SQ001"]);
        let questions = vec![question("A6")];
        let report =
            reconcile(&mut responses, &questions, &SurveyOptions::default()).expect("reconcile");
        assert!(report.dropped_columns.is_empty());
        assert!(responses.column("D11_SQ001").is_ok());
    }

    #[test]
    fn missing_questions_are_reported_but_kept() {
        let mut responses = frame(&["id", "A6"]);
        let questions = vec![question("A6"), question("A7")];
        let report =
            reconcile(&mut responses, &questions, &SurveyOptions::default()).expect("reconcile");
        assert_eq!(report.missing_questions, vec!["A7".to_string()]);
        assert_eq!(responses.width(), 2);
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let mut responses = frame(&["id", "A6", "Z99"]);
        let questions = vec![question("A6")];
        reconcile(&mut responses, &questions, &SurveyOptions::default()).expect("first pass");
        let report =
            reconcile(&mut responses, &questions, &SurveyOptions::default()).expect("second pass");
        assert!(report.is_clean());
        assert_eq!(responses.width(), 2);
    }
}
