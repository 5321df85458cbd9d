//! Question and section records parsed from the questionnaire structure.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The four data formats a question's responses can take.
///
/// Every consumer dispatches on this with an exhaustive match, so adding a
/// variant is a compile-time event rather than a silent fallthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    /// Free text or numeric entry, one column.
    Free,
    /// Several subquestions sharing one answer scale, one column each.
    Array,
    /// One answer code out of a fixed vocabulary.
    SingleChoice,
    /// One `"Y"`/missing column per option.
    MultipleChoice,
}

impl QuestionType {
    /// Canonical wire string, as used in the exported question sheet.
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Free => "free",
            QuestionType::Array => "array",
            QuestionType::SingleChoice => "single-choice",
            QuestionType::MultipleChoice => "multiple-choice",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(QuestionType::Free),
            "array" => Ok(QuestionType::Array),
            "single-choice" | "single_choice" => Ok(QuestionType::SingleChoice),
            "multiple-choice" | "multiple_choice" => Ok(QuestionType::MultipleChoice),
            _ => Err(format!("Unknown question type: {s}")),
        }
    }
}

/// Raw data-format hint declared on a free-text response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseFormat {
    Integer,
    Date,
    Longtext,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFormat::Integer => "integer",
            ResponseFormat::Date => "date",
            ResponseFormat::Longtext => "longtext",
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResponseFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "integer" => Ok(ResponseFormat::Integer),
            "date" => Ok(ResponseFormat::Date),
            "longtext" => Ok(ResponseFormat::Longtext),
            _ => Err(format!("Unknown response format: {s}")),
        }
    }
}

/// One row of the question sheet: a question, subquestion, or contingent
/// free-text companion. `name` matches the response-table column name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier, e.g. `"A2"` or `"F1_SQ001"`.
    pub name: String,
    /// Parent code shared by all rows of the same question, e.g. `"F1"`.
    pub question_group: String,
    pub question_type: QuestionType,
    pub format: Option<ResponseFormat>,
    /// Human-readable prompt text.
    pub label: String,
    /// Answer-code to answer-label mapping; absent for free text.
    /// Declaration order is not preserved (dictionary semantics).
    pub choices: Option<BTreeMap<String, String>>,
    /// The question this one is a free-text companion to, if any.
    pub contingent_of_name: Option<String>,
    /// The answer code that triggers the companion (usually `"Y"` or an
    /// "other" option code).
    pub contingent_of_choice: Option<String>,
}

impl Question {
    pub fn is_contingent(&self) -> bool {
        self.contingent_of_name.is_some()
    }
}

/// A named group of questions; informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub info: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_type_round_trips_wire_strings() {
        for qtype in [
            QuestionType::Free,
            QuestionType::Array,
            QuestionType::SingleChoice,
            QuestionType::MultipleChoice,
        ] {
            assert_eq!(qtype.as_str().parse::<QuestionType>().unwrap(), qtype);
        }
        assert_eq!(
            "Multiple-Choice".parse::<QuestionType>().unwrap(),
            QuestionType::MultipleChoice
        );
        assert!("likert".parse::<QuestionType>().is_err());
    }

    #[test]
    fn response_format_from_str() {
        assert_eq!(
            "integer".parse::<ResponseFormat>().unwrap(),
            ResponseFormat::Integer
        );
        assert_eq!(
            "Date".parse::<ResponseFormat>().unwrap(),
            ResponseFormat::Date
        );
        assert!("colour".parse::<ResponseFormat>().is_err());
    }

    #[test]
    fn contingent_flag_follows_parent_link() {
        let mut question = Question {
            name: "B1other".to_string(),
            question_group: "B1".to_string(),
            question_type: QuestionType::MultipleChoice,
            format: Some(ResponseFormat::Longtext),
            label: "Other".to_string(),
            choices: None,
            contingent_of_name: Some("B1T".to_string()),
            contingent_of_choice: Some("Y".to_string()),
        };
        assert!(question.is_contingent());
        question.contingent_of_name = None;
        assert!(!question.is_contingent());
    }

    #[test]
    fn question_serializes() {
        let question = Question {
            name: "A6".to_string(),
            question_group: "A6".to_string(),
            question_type: QuestionType::SingleChoice,
            format: None,
            label: "Gender".to_string(),
            choices: Some(BTreeMap::from([
                ("A1".to_string(), "Woman".to_string()),
                ("A2".to_string(), "Man".to_string()),
            ])),
            contingent_of_name: None,
            contingent_of_choice: None,
        };
        let json = serde_json::to_string(&question).expect("serialize question");
        let round: Question = serde_json::from_str(&json).expect("deserialize question");
        assert_eq!(round, question);
    }
}
