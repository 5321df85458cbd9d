//! Column-equality filter expressions over the response table.
//!
//! Grammar: one or more clauses joined by `&`, each clause
//! `column == 'value'` or `column != 'value'`. Values may be quoted with
//! single or double quotes or left bare. Matching compares the cell's
//! string rendering; a null cell never satisfies `==` and always satisfies
//! `!=`.

use polars::prelude::{BooleanChunked, DataFrame, NewChunkedArray, PlSmallStr};

use survey_model::{Result, SurveyError};

use crate::frame::column_values;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub column: String,
    pub value: String,
    pub negated: bool,
}

fn unquote(raw: &str) -> &str {
    let raw = raw.trim();
    for quote in ['\'', '"'] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return &raw[1..raw.len() - 1];
        }
    }
    raw
}

/// Parse a conjunction of equality clauses.
pub fn parse_expression(expression: &str) -> Result<Vec<Clause>> {
    let mut clauses = Vec::new();
    for part in expression.split('&') {
        let part = part.trim();
        if part.is_empty() {
            return Err(SurveyError::InvalidExpression(format!(
                "empty clause in '{expression}'"
            )));
        }
        let (negated, operator) = if part.contains("!=") {
            (true, "!=")
        } else if part.contains("==") {
            (false, "==")
        } else {
            return Err(SurveyError::InvalidExpression(format!(
                "clause '{part}' has no == or != operator"
            )));
        };
        let mut sides = part.splitn(2, operator);
        let column = sides.next().unwrap_or_default().trim();
        let value = unquote(sides.next().unwrap_or_default());
        if column.is_empty() || value.is_empty() {
            return Err(SurveyError::InvalidExpression(format!(
                "clause '{part}' is missing a column or value"
            )));
        }
        clauses.push(Clause {
            column: column.to_string(),
            value: value.to_string(),
            negated,
        });
    }
    Ok(clauses)
}

/// Keep the rows satisfying every clause.
pub fn apply_filter(frame: &DataFrame, clauses: &[Clause]) -> Result<DataFrame> {
    let mut keep = vec![true; frame.height()];
    for clause in clauses {
        if frame.get_column_index(&clause.column).is_none() {
            return Err(SurveyError::InvalidExpression(format!(
                "unknown column '{}'",
                clause.column
            )));
        }
        let values = column_values(frame, &clause.column)?;
        for (flag, value) in keep.iter_mut().zip(&values) {
            let equal = value.as_deref() == Some(clause.value.as_str());
            *flag &= if clause.negated { !equal } else { equal };
        }
    }
    let mask = BooleanChunked::from_slice(PlSmallStr::from_static("mask"), &keep);
    Ok(frame.filter(&mask)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{NamedFrom, Series};

    fn frame() -> DataFrame {
        DataFrame::new(vec![
            Series::new("A6".into(), &[Some("A1"), Some("A2"), None]).into(),
            Series::new("A7".into(), &[Some("B1"), Some("B1"), Some("B2")]).into(),
        ])
        .expect("frame")
    }

    #[test]
    fn parses_conjunctions_and_quotes() {
        let clauses = parse_expression("A6 == 'A1' & A7 != \"B2\"").expect("parse");
        assert_eq!(
            clauses,
            vec![
                Clause {
                    column: "A6".to_string(),
                    value: "A1".to_string(),
                    negated: false,
                },
                Clause {
                    column: "A7".to_string(),
                    value: "B2".to_string(),
                    negated: true,
                },
            ]
        );
    }

    #[test]
    fn rejects_malformed_clauses() {
        assert!(parse_expression("A6").is_err());
        assert!(parse_expression("A6 == 'A1' &").is_err());
        assert!(parse_expression("== 'A1'").is_err());
    }

    #[test]
    fn equality_filters_rows_and_ignores_nulls() {
        let clauses = parse_expression("A6 == 'A1'").expect("parse");
        let filtered = apply_filter(&frame(), &clauses).expect("filter");
        assert_eq!(filtered.height(), 1);
    }

    #[test]
    fn negation_keeps_null_cells() {
        let clauses = parse_expression("A6 != 'A1'").expect("parse");
        let filtered = apply_filter(&frame(), &clauses).expect("filter");
        assert_eq!(filtered.height(), 2);
    }

    #[test]
    fn unknown_column_is_fatal() {
        let clauses = parse_expression("NOPE == 'A1'").expect("parse");
        assert!(matches!(
            apply_filter(&frame(), &clauses),
            Err(SurveyError::InvalidExpression(_))
        ));
    }
}
