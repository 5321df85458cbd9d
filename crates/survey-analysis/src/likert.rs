//! Likert-scale scoring over a set of rated items.
//!
//! The scale is plain data passed in by the caller (item score maps,
//! thresholds, class boundaries), so several instruments can coexist in
//! one process.

use std::collections::BTreeMap;

use polars::prelude::DataFrame;
use tracing::debug;

use survey_core::column_values;
use survey_model::{Result, SurveyError};

/// A scoring instrument over `item_scores.len()` answer columns.
#[derive(Debug, Clone)]
pub struct LikertScale {
    pub label: String,
    /// One answer-code to score mapping per item column, in column order.
    pub item_scores: Vec<BTreeMap<String, f64>>,
    /// Rows answering fewer items than this score as missing.
    pub min_answered: usize,
    /// Ascending upper bounds separating adjacent classes; a score falls
    /// into the first class whose bound it does not exceed.
    pub boundaries: Vec<f64>,
    /// Class labels, one more than `boundaries`.
    pub classes: Vec<String>,
}

impl LikertScale {
    /// Score every row of a frame whose columns line up with
    /// `item_scores`. Partial answers are scaled up to the full item
    /// count; rows under the answer threshold yield `None`.
    pub fn score_rows(&self, frame: &DataFrame) -> Result<Vec<Option<f64>>> {
        let names = frame.get_column_names();
        if names.len() != self.item_scores.len() {
            return Err(SurveyError::Unsupported(
                "frame width does not match the scale's item count",
            ));
        }

        let mut per_item: Vec<Vec<Option<f64>>> = Vec::with_capacity(names.len());
        for (name, scores) in names.iter().zip(&self.item_scores) {
            let values = column_values(frame, name.as_str())?;
            per_item.push(
                values
                    .into_iter()
                    .map(|value| value.and_then(|code| scores.get(&code).copied()))
                    .collect(),
            );
        }

        let mut row_scores = Vec::with_capacity(frame.height());
        for row in 0..frame.height() {
            let answered: Vec<f64> = per_item
                .iter()
                .filter_map(|column| column[row])
                .collect();
            if answered.len() < self.min_answered {
                row_scores.push(None);
                continue;
            }
            let mean = answered.iter().sum::<f64>() / answered.len() as f64;
            row_scores.push(Some(mean * self.item_scores.len() as f64));
        }
        debug!(
            scale = %self.label,
            scored = row_scores.iter().filter(|score| score.is_some()).count(),
            rows = row_scores.len(),
            "scored likert rows"
        );
        Ok(row_scores)
    }

    /// Class label for one score; `None` when the scale declares no
    /// classes.
    pub fn classify(&self, score: f64) -> Option<&str> {
        if self.classes.is_empty() {
            return None;
        }
        for (boundary, class) in self.boundaries.iter().zip(&self.classes) {
            if score <= *boundary {
                return Some(class.as_str());
            }
        }
        self.classes.last().map(String::as_str)
    }
}
