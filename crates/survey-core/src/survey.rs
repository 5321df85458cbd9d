//! The reconciliation model: one immutable value merging the parsed
//! structure with the typed response table, queried through a small façade.

use std::collections::BTreeMap;
use std::path::Path;

use polars::prelude::{Column, DataFrame, DataType, IntoSeries, PlSmallStr, Series};
use tracing::info;

use survey_ingest::{StructureFixups, fixups_2024, load_responses, parse_structure};
use survey_model::{Question, QuestionType, Result, Section, SurveyError, SurveyOptions};

use crate::export::write_question_sheet;
use crate::query::{apply_filter, parse_expression};
use crate::reconcile::{SchemaReport, reconcile};

/// A loaded survey. Questions, sections and both tables are fixed at
/// construction; every accessor is read-only.
#[derive(Debug, Clone)]
pub struct Survey {
    questions: Vec<Question>,
    sections: Vec<Section>,
    responses: DataFrame,
    system_info: DataFrame,
    report: SchemaReport,
    options: SurveyOptions,
}

impl Survey {
    /// Load with default options and the 2024 structure fixups.
    pub fn load(structure_path: &Path, responses_path: &Path) -> Result<Self> {
        Self::load_with(
            structure_path,
            responses_path,
            SurveyOptions::default(),
            &fixups_2024(),
        )
    }

    pub fn load_with(
        structure_path: &Path,
        responses_path: &Path,
        options: SurveyOptions,
        fixups: &StructureFixups,
    ) -> Result<Self> {
        let structure = parse_structure(structure_path, fixups)?;
        let tables = load_responses(responses_path, &structure.questions, &options)?;
        let mut responses = tables.responses;
        let report = reconcile(&mut responses, &structure.questions, &options)?;
        info!(
            questions = structure.questions.len(),
            sections = structure.sections.len(),
            respondents = responses.height(),
            "survey loaded"
        );
        Ok(Self {
            questions: structure.questions,
            sections: structure.sections,
            responses,
            system_info: tables.system_info,
            report,
            options,
        })
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn responses(&self) -> &DataFrame {
        &self.responses
    }

    pub fn system_info(&self) -> &DataFrame {
        &self.system_info
    }

    pub fn schema_report(&self) -> &SchemaReport {
        &self.report
    }

    pub fn options(&self) -> &SurveyOptions {
        &self.options
    }

    pub fn respondent_count(&self) -> usize {
        self.responses.height()
    }

    /// Resolve a code naming either a question group or a single question
    /// row to all matching rows, in declaration order. An empty match is a
    /// lookup error, never a silent empty set.
    pub fn get_question(&self, code: &str, drop_other: bool) -> Result<Vec<&Question>> {
        let matches: Vec<&Question> = self
            .questions
            .iter()
            .filter(|question| question.question_group == code || question.name == code)
            .filter(|question| !(drop_other && question.is_contingent()))
            .collect();
        if matches.is_empty() {
            return Err(SurveyError::UnknownQuestion(code.to_string()));
        }
        Ok(matches)
    }

    /// The single type shared by the resolved rows. Groups are resolved
    /// dynamically at query time, so the structural invariant is checked
    /// again here rather than trusted.
    pub fn get_question_type(&self, code: &str) -> Result<QuestionType> {
        let matches = self.get_question(code, false)?;
        let mut types: Vec<QuestionType> = Vec::new();
        for question in &matches {
            if !types.contains(&question.question_type) {
                types.push(question.question_type);
            }
        }
        if types.len() > 1 {
            return Err(SurveyError::InconsistentTypes {
                group: code.to_string(),
                types,
            });
        }
        Ok(matches[0].question_type)
    }

    /// Answer-code to label mapping for a question.
    ///
    /// A multiple-choice group spanning several subquestions answers with
    /// the flattened group-level view: subquestion name mapped to its
    /// selected-state label. Everything else answers with the first
    /// non-contingent row's own vocabulary; free questions get an empty map.
    pub fn get_choices(&self, code: &str) -> Result<BTreeMap<String, String>> {
        let matches = self.get_question(code, false)?;
        let plain: Vec<&&Question> = matches
            .iter()
            .filter(|question| !question.is_contingent())
            .collect();

        if matches[0].question_type == QuestionType::MultipleChoice && plain.len() > 1 {
            let mut flattened = BTreeMap::new();
            for question in plain {
                let Some(choices) = &question.choices else {
                    continue;
                };
                let label = choices
                    .get("Y")
                    .or_else(|| choices.values().next())
                    .cloned()
                    .unwrap_or_default();
                flattened.insert(question.name.clone(), label);
            }
            return Ok(flattened);
        }

        let record = plain.first().copied().unwrap_or(&matches[0]);
        Ok(record.choices.clone().unwrap_or_default())
    }

    /// The response columns of the resolved question set.
    ///
    /// Multiple-choice selection columns come back as booleans, true
    /// exactly where the raw cell was non-null; contingent free-text
    /// columns pass through untouched. A question with no data column
    /// yields an all-null column instead of failing the whole frame.
    pub fn get_responses(&self, code: &str, drop_other: bool) -> Result<DataFrame> {
        let matches = self.get_question(code, drop_other)?;
        let question_type = self.get_question_type(code)?;

        let mut columns: Vec<Column> = Vec::with_capacity(matches.len());
        for question in matches {
            let name = PlSmallStr::from_str(&question.name);
            let as_presence =
                question_type == QuestionType::MultipleChoice && !question.is_contingent();
            if self.responses.get_column_index(&question.name).is_none() {
                // Absent columns keep the dtype contract of their slot.
                let dtype = if as_presence {
                    DataType::Boolean
                } else {
                    DataType::String
                };
                columns.push(
                    Series::full_null(name, self.responses.height(), &dtype).into(),
                );
                continue;
            }
            let series = self
                .responses
                .column(&question.name)?
                .as_materialized_series();
            if as_presence {
                let mut presence = series.is_not_null().into_series();
                presence.rename(name);
                columns.push(presence.into());
            } else {
                columns.push(series.clone().into());
            }
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Distinct question-group codes of the given type, first-seen order.
    pub fn get_questions_by_type(&self, question_type: QuestionType) -> Vec<String> {
        let mut groups: Vec<String> = Vec::new();
        for question in &self.questions {
            if question.question_type == question_type
                && !groups.contains(&question.question_group)
            {
                groups.push(question.question_group.clone());
            }
        }
        groups
    }

    /// Filter the response table by a conjunction of column-equality
    /// clauses, e.g. `A6 == 'A1' & C3 != 'B2'`.
    pub fn query(&self, expression: &str) -> Result<DataFrame> {
        let clauses = parse_expression(expression)?;
        apply_filter(&self.responses, &clauses)
    }

    /// Write the question sheet (one audited row per question) as CSV.
    pub fn export_questions_csv(&self, path: &Path) -> Result<()> {
        write_question_sheet(&self.questions, path)
    }

    /// The model is read-only after construction; derived tables must be
    /// built externally.
    pub fn add_responses(&mut self, _rows: &DataFrame) -> Result<()> {
        Err(SurveyError::Unsupported(
            "adding responses after construction",
        ))
    }

    /// See [`Survey::add_responses`].
    pub fn transform_question(&mut self, _code: &str) -> Result<()> {
        Err(SurveyError::Unsupported(
            "transforming response columns in place",
        ))
    }
}
