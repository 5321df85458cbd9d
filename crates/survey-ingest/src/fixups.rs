//! Survey-year specific repairs for questionnaire-structure quirks.
//!
//! The rules live in plain data passed into the parser, so loading two
//! survey years with different quirks in one process stays possible.

use survey_model::{Question, Result, SurveyError};

use crate::structure::ParsedResponse;

/// Disambiguation rule for a `<response>` exported without a `varName`.
///
/// The 2024 survey's B4 group asks ten subquestions along two orthogonal
/// dimensions (kind of contract, contract duration). The export tool emits
/// both dimensions as anonymous responses under one question; the only
/// stable distinguishing feature is the number of declared answer choices.
#[derive(Debug, Clone)]
pub struct UnnamedResponseRule {
    /// Every subquestion of the affected question starts with this prefix.
    pub subquestion_prefix: String,
    /// Declared choice count identifying the dimension.
    pub choice_count: usize,
    /// Name assigned to the anonymous response (becomes the question group).
    pub response_name: String,
    /// Suffix appended to subquestion names owned by this dimension so they
    /// match the CSV column naming convention (e.g. `B4_SQ001_1`).
    pub name_suffix: String,
}

#[derive(Debug, Clone, Default)]
pub struct StructureFixups {
    /// Questions whose second response variable is an optional free-text
    /// comment rather than a real second choice. Counting it would
    /// misclassify the question as multiple-choice.
    pub comment_tail_questions: Vec<String>,
    pub unnamed_responses: Vec<UnnamedResponseRule>,
}

/// The fixups required for the 2024 doctoral-researcher survey.
pub fn fixups_2024() -> StructureFixups {
    StructureFixups {
        comment_tail_questions: vec!["A2".to_string()],
        unnamed_responses: vec![
            UnnamedResponseRule {
                subquestion_prefix: "B4_SQ".to_string(),
                choice_count: 7,
                response_name: "B4a".to_string(),
                name_suffix: "_1".to_string(),
            },
            UnnamedResponseRule {
                subquestion_prefix: "B4_SQ".to_string(),
                choice_count: 8,
                response_name: "B4b".to_string(),
                name_suffix: "_2".to_string(),
            },
        ],
    }
}

impl StructureFixups {
    /// Number of response variables that count towards type classification.
    ///
    /// For a listed question, the trailing comment response is ignored so
    /// the question classifies by its first response alone.
    pub fn effective_response_count(&self, responses: &[(String, ParsedResponse)]) -> usize {
        if responses.len() == 2
            && self
                .comment_tail_questions
                .iter()
                .any(|question| *question == responses[0].0)
        {
            1
        } else {
            responses.len()
        }
    }

    /// Resolve the name of a response, falling back to the choice-count
    /// rules when the export carries no `varName`.
    pub fn response_name(
        &self,
        response: &ParsedResponse,
        subquestion_names: &[String],
    ) -> Result<String> {
        if let Some(name) = &response.name {
            return Ok(name.clone());
        }
        let rule = self.unnamed_responses.iter().find(|rule| {
            rule.choice_count == response.choice_count
                && !subquestion_names.is_empty()
                && subquestion_names
                    .iter()
                    .all(|name| name.starts_with(rule.subquestion_prefix.as_str()))
        });
        match rule {
            Some(rule) => Ok(rule.response_name.clone()),
            None => Err(SurveyError::Structure(format!(
                "response without varName ({} choices, subquestions {:?}) matches no known rule",
                response.choice_count, subquestion_names
            ))),
        }
    }

    /// Apply the name suffixes of the anonymous-response rules so question
    /// names line up with the CSV columns.
    pub fn rename_questions(&self, questions: &mut [Question]) {
        for rule in &self.unnamed_responses {
            for question in questions.iter_mut() {
                if question.question_group == rule.response_name
                    && !question.is_contingent()
                    && !question.name.ends_with(rule.name_suffix.as_str())
                {
                    question.name.push_str(&rule.name_suffix);
                }
            }
        }
    }
}
