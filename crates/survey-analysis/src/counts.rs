//! Count and proportion tables for single- and multiple-choice questions.

use std::collections::BTreeMap;

use polars::prelude::{DataFrame, NamedFrom, Series};

use survey_core::{Survey, column_values};
use survey_model::{QuestionType, Result, SurveyError};

/// Presentation knobs for one count table.
#[derive(Debug, Clone, Default)]
pub struct CountOptions {
    /// Explicit answer-label order; answers not listed are appended in
    /// descending count order. Default is descending count, ties by label.
    pub order: Option<Vec<String>>,
    /// Count rows with no answer under the configured missing label.
    pub include_missing: bool,
}

/// One tidy count table: `[answer, count, proportion]` rows plus the
/// respondent base the proportions refer to.
#[derive(Debug, Clone)]
pub struct CountTable {
    pub table: DataFrame,
    pub respondents: usize,
}

fn sort_entries(entries: &mut Vec<(String, u32)>, options: &CountOptions) {
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    if let Some(order) = &options.order {
        let mut ordered: Vec<(String, u32)> = Vec::with_capacity(entries.len());
        for label in order {
            if let Some(position) = entries.iter().position(|(answer, _)| answer == label) {
                ordered.push(entries.remove(position));
            }
        }
        ordered.append(entries);
        *entries = ordered;
    }
}

fn table_from_entries(entries: Vec<(String, u32)>, respondents: usize) -> Result<CountTable> {
    let answers: Vec<String> = entries.iter().map(|(answer, _)| answer.clone()).collect();
    let counts: Vec<u32> = entries.iter().map(|(_, count)| *count).collect();
    let proportions: Vec<f64> = counts
        .iter()
        .map(|count| {
            if respondents == 0 {
                0.0
            } else {
                f64::from(*count) / respondents as f64
            }
        })
        .collect();
    let table = DataFrame::new(vec![
        Series::new("answer".into(), answers).into(),
        Series::new("count".into(), counts).into(),
        Series::new("proportion".into(), proportions).into(),
    ])?;
    Ok(CountTable {
        table,
        respondents,
    })
}

/// Answer distribution of a single-choice (or array subquestion) column.
/// Codes are rendered through the declared choice labels; proportions are
/// relative to respondents who answered (or all rows with
/// `include_missing`). The code must resolve to exactly one column: an
/// array group code spanning several subquestions is rejected rather
/// than silently counting the first one.
pub fn count_single(survey: &Survey, question: &str, options: &CountOptions) -> Result<CountTable> {
    let question_type = survey.get_question_type(question)?;
    if question_type == QuestionType::MultipleChoice {
        return Err(SurveyError::Unsupported(
            "count_single on a multiple-choice question; use count_multiple",
        ));
    }

    let matches = survey.get_question(question, true)?;
    let record = if matches.len() == 1 {
        matches[0]
    } else {
        matches
            .iter()
            .find(|row| row.name == question)
            .copied()
            .ok_or(SurveyError::Unsupported(
                "count_single on a multi-column group; pass one subquestion code",
            ))?
    };
    let frame = survey.get_responses(&record.name, true)?;
    let values = column_values(&frame, &record.name)?;
    let choices = survey.get_choices(&record.name)?;

    let mut tally: BTreeMap<String, u32> = BTreeMap::new();
    let mut answered = 0usize;
    let mut missing = 0usize;
    for value in values {
        match value {
            Some(code) => {
                let label = choices.get(&code).cloned().unwrap_or(code);
                *tally.entry(label).or_default() += 1;
                answered += 1;
            }
            None => missing += 1,
        }
    }
    if options.include_missing && missing > 0 {
        tally.insert(survey.options().na_label.clone(), missing as u32);
    }

    let respondents = if options.include_missing {
        answered + missing
    } else {
        answered
    };
    let mut entries: Vec<(String, u32)> = tally.into_iter().collect();
    sort_entries(&mut entries, options);
    table_from_entries(entries, respondents)
}

/// Per-option selection counts of a multiple-choice group. Proportions are
/// relative to respondents who selected at least one option.
pub fn count_multiple(
    survey: &Survey,
    question: &str,
    options: &CountOptions,
) -> Result<CountTable> {
    if survey.get_question_type(question)? != QuestionType::MultipleChoice {
        return Err(SurveyError::Unsupported(
            "count_multiple on a non-multiple-choice question",
        ));
    }

    let frame = survey.get_responses(question, true)?;
    let labels = survey.get_choices(question)?;

    let mut entries: Vec<(String, u32)> = Vec::new();
    let mut any_selected = vec![false; frame.height()];
    for column in frame.get_columns() {
        let flags = column.as_materialized_series().bool()?.clone();
        let mut count = 0u32;
        for (idx, flag) in flags.into_iter().enumerate() {
            if flag == Some(true) {
                count += 1;
                any_selected[idx] = true;
            }
        }
        let label = labels
            .get(column.name().as_str())
            .cloned()
            .unwrap_or_else(|| column.name().to_string());
        entries.push((label, count));
    }

    let respondents = any_selected.iter().filter(|selected| **selected).count();
    sort_entries(&mut entries, options);
    table_from_entries(entries, respondents)
}
