//! Typed loader for the LimeSurvey response CSV export.
//!
//! The file is read twice: a header-only pass to learn the column names and
//! derive per-column storage types from the questionnaire structure, then a
//! full pass through the polars CSV reader with those types enforced.
//! Coercion failures in the second pass are fatal; silently recovering a
//! malformed numeric or date cell would corrupt every downstream statistic.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::{
    CsvReadOptions, DataFrame, DataType, NamedFrom, PlSmallStr, Schema, SerReader, Series,
    TimeUnit,
};
use tracing::debug;

use survey_model::{Question, QuestionType, ResponseFormat, Result, SurveyError, SurveyOptions};

/// The split output of one response file.
#[derive(Debug, Clone)]
pub struct RawTables {
    /// Question-response columns, keyed by the respondent id column.
    pub responses: DataFrame,
    /// Timing/language/submission metadata of a raw export; empty for an
    /// already-processed file.
    pub system_info: DataFrame,
}

/// Map a CSV header to the question-sheet naming convention:
/// `B1[SQ001]` -> `B1_SQ001`, `B1[other]` -> `B1other`.
pub fn normalize_column_name(raw: &str) -> String {
    raw.replace('[', "_").replace(']', "").replace("_other", "other")
}

/// Storage type assigned to one CSV column before the full read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Fixed answer vocabulary declared in the structure.
    Categorical,
    /// Parsed to a millisecond datetime after the read.
    Date,
    Integer,
    Text,
    /// Respondent key.
    Id,
    /// `lastpage` progress marker.
    Page,
    Seed,
    /// Per-page timing figures.
    Timing,
    /// Left to the reader's own inference.
    Unspecified,
}

impl ColumnKind {
    /// Dtype forced onto the CSV reader; `None` leaves inference alone.
    /// Categorical and date columns are read as strings: the vocabulary
    /// lives on the `Question`, and dates are converted right after the
    /// read.
    fn polars_dtype(self) -> Option<DataType> {
        match self {
            ColumnKind::Categorical | ColumnKind::Date | ColumnKind::Text => {
                Some(DataType::String)
            }
            ColumnKind::Integer => Some(DataType::Int32),
            ColumnKind::Id | ColumnKind::Seed => Some(DataType::UInt32),
            ColumnKind::Page => Some(DataType::Int16),
            ColumnKind::Timing => Some(DataType::Float64),
            ColumnKind::Unspecified => None,
        }
    }
}

/// Infer the storage type of one column, preferring the structure sheet and
/// falling back to well-known LimeSurvey technical fields.
pub fn infer_column_kind(
    renamed: &str,
    question: Option<&Question>,
    options: &SurveyOptions,
) -> ColumnKind {
    if let Some(question) = question {
        if question.choices.is_some() {
            return ColumnKind::Categorical;
        }
        return match question.format {
            Some(ResponseFormat::Date) => ColumnKind::Date,
            Some(ResponseFormat::Integer) => ColumnKind::Integer,
            Some(ResponseFormat::Longtext) => ColumnKind::Text,
            None => ColumnKind::Unspecified,
        };
    }
    if renamed == options.id_column {
        return ColumnKind::Id;
    }
    match renamed {
        "submitdate" | "startdate" | "datestamp" => ColumnKind::Date,
        "lastpage" => ColumnKind::Page,
        "startlanguage" => ColumnKind::Categorical,
        "seed" => ColumnKind::Seed,
        _ if renamed.to_lowercase().contains("time") => ColumnKind::Timing,
        _ => ColumnKind::Unspecified,
    }
}

/// Load the responses file, splitting question responses from system info
/// and repairing the missing contingent-parent columns of a raw export.
pub fn load_responses(
    path: &Path,
    questions: &[Question],
    options: &SurveyOptions,
) -> Result<RawTables> {
    let by_name: BTreeMap<&str, &Question> = questions
        .iter()
        .map(|question| (question.name.as_str(), question))
        .collect();

    // First pass: header only.
    let mut header_reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers: Vec<String> = header_reader.headers()?.iter().map(str::to_string).collect();
    let renamed: Vec<String> = headers.iter().map(|raw| normalize_column_name(raw)).collect();

    let kinds: Vec<ColumnKind> = renamed
        .iter()
        .map(|name| infer_column_kind(name, by_name.get(name.as_str()).copied(), options))
        .collect();
    debug!(columns = headers.len(), "inferred response column types");

    // Second pass: full typed read. The override schema uses the original
    // header names; renaming happens afterwards.
    let overrides: Schema = headers
        .iter()
        .zip(&kinds)
        .filter_map(|(header, kind)| {
            kind.polars_dtype()
                .map(|dtype| (PlSmallStr::from_str(header), dtype))
        })
        .collect();
    let mut frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_schema_overwrite(Some(overrides.into()))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    for (original, new_name) in headers.iter().zip(&renamed) {
        if original != new_name {
            frame.rename(original, PlSmallStr::from_str(new_name))?;
        }
    }
    for (name, kind) in renamed.iter().zip(&kinds) {
        if *kind == ColumnKind::Date {
            convert_date_column(&mut frame, name)?;
        }
    }

    if !renamed.iter().any(|name| *name == options.range_start) {
        // Previously processed file: every column is a question response.
        return Ok(RawTables {
            responses: frame,
            system_info: DataFrame::empty(),
        });
    }

    let (mut responses, system_info) = split_raw_export(&frame, &renamed, options)?;
    synthesize_contingent_parents(&mut responses, questions)?;
    Ok(RawTables {
        responses,
        system_info,
    })
}

/// Resolve the question-column range of a raw export: everything strictly
/// between the two sentinel columns, in original order. Fails loudly when a
/// sentinel is missing instead of slicing on a miscomputed index.
fn split_raw_export(
    frame: &DataFrame,
    renamed: &[String],
    options: &SurveyOptions,
) -> Result<(DataFrame, DataFrame)> {
    let start = renamed
        .iter()
        .position(|name| *name == options.range_start)
        .ok_or_else(|| SurveyError::MissingSentinel(options.range_start.clone()))?;
    let end = renamed
        .iter()
        .position(|name| *name == options.range_end)
        .ok_or_else(|| SurveyError::MissingSentinel(options.range_end.clone()))?;
    if end < start {
        return Err(SurveyError::Structure(format!(
            "sentinel column '{}' appears before '{}'",
            options.range_end, options.range_start
        )));
    }

    let question_columns: Vec<&String> = renamed[start + 1..end].iter().collect();
    let has_id = renamed.iter().any(|name| *name == options.id_column);

    let mut response_names: Vec<String> = Vec::new();
    if has_id {
        response_names.push(options.id_column.clone());
    }
    response_names.extend(question_columns.iter().map(|name| (*name).clone()));

    let mut system_names: Vec<String> = Vec::new();
    for name in renamed {
        if question_columns.iter().any(|question| *question == name) {
            continue;
        }
        system_names.push(name.clone());
    }

    let responses = frame.select(response_names)?;
    let system_info = frame.select(system_names)?;
    Ok((responses, system_info))
}

/// LimeSurvey never exports values for the parent response of a
/// multiple-choice contingent question; rebuild the parent column from the
/// contingent one (`"Y"` wherever free text was entered). A no-op when the
/// parent column is already present, which keeps the repair idempotent.
pub fn synthesize_contingent_parents(
    frame: &mut DataFrame,
    questions: &[Question],
) -> Result<()> {
    for question in questions {
        if question.question_type != QuestionType::MultipleChoice {
            continue;
        }
        let Some(parent) = &question.contingent_of_name else {
            continue;
        };
        if frame.get_column_index(parent).is_some() {
            continue;
        }
        let Some(contingent_index) = frame.get_column_index(&question.name) else {
            continue;
        };
        let mask = frame
            .column(&question.name)?
            .as_materialized_series()
            .is_not_null();
        let values: Vec<Option<&str>> = mask
            .into_iter()
            .map(|present| match present {
                Some(true) => Some("Y"),
                _ => None,
            })
            .collect();
        let parent_column = Series::new(PlSmallStr::from_str(parent), values);
        frame.insert_column(contingent_index, parent_column)?;
    }
    Ok(())
}

fn parse_datetime_ms(value: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .map(|datetime| datetime.and_utc().timestamp_millis())
}

/// Replace a string column with its millisecond-datetime equivalent.
/// A non-empty cell that fails to parse is a fatal coercion error.
fn convert_date_column(frame: &mut DataFrame, name: &str) -> Result<()> {
    let series = frame.column(name)?.as_materialized_series().clone();
    let strings = series.str()?;
    let mut values: Vec<Option<i64>> = Vec::with_capacity(strings.len());
    for value in strings.into_iter() {
        match value.map(str::trim) {
            None | Some("") => values.push(None),
            Some(text) => match parse_datetime_ms(text) {
                Some(timestamp) => values.push(Some(timestamp)),
                None => {
                    return Err(SurveyError::Coercion {
                        column: name.to_string(),
                        value: text.to_string(),
                        expected: "datetime",
                    });
                }
            },
        }
    }
    let converted = Series::new(PlSmallStr::from_str(name), values)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    frame.replace(name, converted)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bracket_and_other_conventions() {
        assert_eq!(normalize_column_name("B1[SQ001]"), "B1_SQ001");
        assert_eq!(normalize_column_name("B1[other]"), "B1other");
        assert_eq!(normalize_column_name("B4[SQ001_1]"), "B4_SQ001_1");
        assert_eq!(normalize_column_name("A6"), "A6");
    }

    #[test]
    fn technical_fields_get_well_known_kinds() {
        let options = SurveyOptions::default();
        assert_eq!(infer_column_kind("id", None, &options), ColumnKind::Id);
        assert_eq!(
            infer_column_kind("submitdate", None, &options),
            ColumnKind::Date
        );
        assert_eq!(infer_column_kind("lastpage", None, &options), ColumnKind::Page);
        assert_eq!(
            infer_column_kind("startlanguage", None, &options),
            ColumnKind::Categorical
        );
        assert_eq!(infer_column_kind("seed", None, &options), ColumnKind::Seed);
        assert_eq!(
            infer_column_kind("groupTime764", None, &options),
            ColumnKind::Timing
        );
        assert_eq!(
            infer_column_kind("Z99", None, &options),
            ColumnKind::Unspecified
        );
    }

    #[test]
    fn structure_formats_beat_well_known_names() {
        let options = SurveyOptions::default();
        let question = Question {
            name: "A4".to_string(),
            question_group: "A4".to_string(),
            question_type: QuestionType::Free,
            format: Some(ResponseFormat::Integer),
            label: "Year of birth".to_string(),
            choices: None,
            contingent_of_name: None,
            contingent_of_choice: None,
        };
        assert_eq!(
            infer_column_kind("A4", Some(&question), &options),
            ColumnKind::Integer
        );

        let mut with_choices = question.clone();
        with_choices.choices = Some(std::collections::BTreeMap::from([(
            "A1".to_string(),
            "Yes".to_string(),
        )]));
        assert_eq!(
            infer_column_kind("A4", Some(&with_choices), &options),
            ColumnKind::Categorical
        );
    }

    #[test]
    fn datetime_parsing_accepts_date_only_values() {
        assert!(parse_datetime_ms("2024-05-17 12:30:00").is_some());
        assert!(parse_datetime_ms("2024-05-17").is_some());
        assert!(parse_datetime_ms("yesterday").is_none());
    }
}
