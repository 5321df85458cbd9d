//! Parser for the LimeSurvey questionnaire-structure XML export.
//!
//! The document nests `section` / `question` / `subQuestion` / `response`
//! elements; a `response` holds either a `fixed` choice vocabulary or a
//! `free` format declaration, and a fixed `category` may carry a nested
//! `contingentQuestion` ("other, please specify" companion).

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use survey_model::{Question, QuestionType, ResponseFormat, Result, Section, SurveyError};

use crate::fixups::StructureFixups;
use crate::xml::{Element, read_document};

/// Everything extracted from the structure document.
#[derive(Debug, Clone)]
pub struct SurveyStructure {
    pub sections: Vec<Section>,
    pub questions: Vec<Question>,
}

/// A free-text companion declared under a fixed answer category.
#[derive(Debug, Clone)]
pub struct ParsedContingent {
    pub name: String,
    pub text: String,
    /// Answer code of the category that triggers the companion.
    pub of_choice: String,
}

/// One `<response>` element, before classification.
#[derive(Debug, Clone)]
pub struct ParsedResponse {
    /// `varName` attribute; absent in known anomalous exports.
    pub name: Option<String>,
    pub format: Option<ResponseFormat>,
    pub label: Option<String>,
    /// Answer-code to label mapping for fixed responses.
    pub choices: Option<BTreeMap<String, String>>,
    /// Number of declared categories; used to disambiguate anonymous
    /// responses.
    pub choice_count: usize,
    pub contingents: Vec<ParsedContingent>,
}

/// Parse the structure file into section and question records.
///
/// Malformed structure is fatal: there is no sensible partial structure for
/// downstream consumers to operate on.
pub fn parse_structure(path: &Path, fixups: &StructureFixups) -> Result<SurveyStructure> {
    let root = read_document(path)?;
    let mut sections = Vec::new();
    let mut questions = Vec::new();

    for section_el in root.children_named("section") {
        sections.push(parse_section(section_el)?);
        for question_el in section_el.children_named("question") {
            build_question(question_el, fixups, &mut questions)?;
        }
    }

    fixups.rename_questions(&mut questions);
    validate(&questions)?;
    Ok(SurveyStructure {
        sections,
        questions,
    })
}

fn parse_section(section_el: &Element) -> Result<Section> {
    let id = section_el
        .attr("id")
        .ok_or_else(|| SurveyError::Structure("section without id attribute".to_string()))?
        .to_string();
    let mut title = String::new();
    let mut info_parts = Vec::new();
    for info_el in section_el.children_named("sectionInfo") {
        let text = info_el.child_text("text").unwrap_or_default();
        if info_el.child_text("position") == Some("title") {
            title = text.to_string();
        } else if !text.is_empty() {
            info_parts.push(text.to_string());
        }
    }
    Ok(Section {
        id,
        title,
        info: if info_parts.is_empty() {
            None
        } else {
            Some(info_parts.join("\n"))
        },
    })
}

fn parse_response(response_el: &Element) -> Result<ParsedResponse> {
    let name = response_el.attr("varName").map(str::to_string);
    let mut parsed = ParsedResponse {
        name,
        format: None,
        label: None,
        choices: None,
        choice_count: 0,
        contingents: Vec::new(),
    };

    if let Some(fixed_el) = response_el.child("fixed") {
        let mut choices = BTreeMap::new();
        for category_el in fixed_el.children_named("category") {
            let value = category_el.child_text("value").ok_or_else(|| {
                SurveyError::Structure(format!(
                    "category without value in response '{}'",
                    parsed.name.as_deref().unwrap_or("<unnamed>")
                ))
            })?;
            let label = category_el.child_text("label").unwrap_or_default();
            choices.insert(value.to_string(), label.to_string());
            parsed.choice_count += 1;

            if let Some(contingent_el) = category_el.child("contingentQuestion") {
                let contingent_name = contingent_el.attr("varName").ok_or_else(|| {
                    SurveyError::Structure(format!(
                        "contingentQuestion without varName under category '{value}'"
                    ))
                })?;
                parsed.contingents.push(ParsedContingent {
                    name: contingent_name.to_string(),
                    text: contingent_el.child_text("text").unwrap_or_default().to_string(),
                    of_choice: value.to_string(),
                });
            }
        }
        parsed.choices = Some(choices);
    } else if let Some(free_el) = response_el.child("free") {
        parsed.format = free_el
            .child_text("format")
            .and_then(|format| format.parse::<ResponseFormat>().ok());
        parsed.label = free_el.child_text("label").map(str::to_string);
    } else {
        return Err(SurveyError::Structure(format!(
            "response '{}' declares neither fixed choices nor a free format",
            parsed.name.as_deref().unwrap_or("<unnamed>")
        )));
    }

    Ok(parsed)
}

/// Group code shared by a set of multiple-choice response names: the
/// common prefix cut at its first `_`, so `B7_SQ001`/`B7_SQ002` and
/// `B1_SQ001`/`B1T` both resolve to their question code (`B7`, `B1`).
/// Subquestion suffixes always start with `_`, so the raw character-level
/// prefix (`B7_SQ00`) is never the code itself.
fn common_group(names: &[String]) -> String {
    let mut prefix = names.first().cloned().unwrap_or_default();
    for name in &names[1..] {
        let shared = prefix
            .chars()
            .zip(name.chars())
            .take_while(|(a, b)| a == b)
            .count();
        prefix.truncate(
            prefix
                .char_indices()
                .nth(shared)
                .map_or(prefix.len(), |(idx, _)| idx),
        );
    }
    let code = prefix.split('_').next().unwrap_or_default();
    if code.is_empty() {
        names.first().cloned().unwrap_or_default()
    } else {
        code.to_string()
    }
}

fn build_question(
    question_el: &Element,
    fixups: &StructureFixups,
    questions: &mut Vec<Question>,
) -> Result<()> {
    let label = question_el.child_text("text").unwrap_or_default().to_string();

    let mut subquestions: Vec<(String, String)> = Vec::new();
    for subquestion_el in question_el.children_named("subQuestion") {
        let name = subquestion_el.attr("varName").ok_or_else(|| {
            SurveyError::Structure(format!("subQuestion without varName in '{label}'"))
        })?;
        let text = subquestion_el.child_text("text").unwrap_or_default();
        subquestions.push((name.to_string(), text.to_string()));
    }
    let subquestion_names: Vec<String> = subquestions.iter().map(|(name, _)| name.clone()).collect();

    let mut responses: Vec<(String, ParsedResponse)> = Vec::new();
    for response_el in question_el.children_named("response") {
        let response = parse_response(response_el)?;
        let name = fixups.response_name(&response, &subquestion_names)?;
        responses.push((name, response));
    }
    if responses.is_empty() {
        return Err(SurveyError::Structure(format!(
            "question '{label}' has no response declaration"
        )));
    }

    if !subquestions.is_empty() {
        // Array semantics: every subquestion is one column sharing the
        // response's answer scale. Questions with several response
        // dimensions produce one row per (response, subquestion) pair.
        for (response_name, response) in &responses {
            for (subquestion_name, subquestion_text) in &subquestions {
                questions.push(Question {
                    name: subquestion_name.clone(),
                    question_group: response_name.clone(),
                    question_type: QuestionType::Array,
                    format: response.format,
                    label: subquestion_text.clone(),
                    choices: response.choices.clone(),
                    contingent_of_name: None,
                    contingent_of_choice: None,
                });
            }
            push_contingents(questions, response, response_name, response_name, QuestionType::Array);
        }
        return Ok(());
    }

    let response_names: Vec<String> = responses.iter().map(|(name, _)| name.clone()).collect();
    let effective = fixups.effective_response_count(&responses);
    let question_type = if effective > 1 {
        QuestionType::MultipleChoice
    } else if responses[0].1.choices.is_some() {
        QuestionType::SingleChoice
    } else {
        QuestionType::Free
    };
    let group = if effective > 1 {
        common_group(&response_names)
    } else {
        response_names[0].clone()
    };

    for (response_name, response) in &responses {
        questions.push(Question {
            name: response_name.clone(),
            question_group: group.clone(),
            question_type,
            format: response.format,
            label: response.label.clone().unwrap_or_else(|| label.clone()),
            choices: response.choices.clone(),
            contingent_of_name: None,
            contingent_of_choice: None,
        });
        push_contingents(questions, response, response_name, &group, question_type);
    }
    Ok(())
}

fn push_contingents(
    questions: &mut Vec<Question>,
    response: &ParsedResponse,
    response_name: &str,
    group: &str,
    question_type: QuestionType,
) {
    for contingent in &response.contingents {
        questions.push(Question {
            name: contingent.name.clone(),
            question_group: group.to_string(),
            question_type,
            format: Some(ResponseFormat::Longtext),
            label: contingent.text.clone(),
            choices: None,
            contingent_of_name: Some(response_name.to_string()),
            contingent_of_choice: Some(contingent.of_choice.clone()),
        });
    }
}

/// Structural-integrity checks: unique names and one type per group.
fn validate(questions: &[Question]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for question in questions {
        if !seen.insert(question.name.as_str()) {
            return Err(SurveyError::Structure(format!(
                "duplicate question name '{}'",
                question.name
            )));
        }
    }

    let mut group_types: BTreeMap<&str, Vec<QuestionType>> = BTreeMap::new();
    for question in questions {
        let types = group_types.entry(question.question_group.as_str()).or_default();
        if !types.contains(&question.question_type) {
            types.push(question.question_type);
        }
    }
    for (group, types) in group_types {
        if types.len() > 1 {
            return Err(SurveyError::InconsistentTypes {
                group: group.to_string(),
                types,
            });
        }
    }
    Ok(())
}
