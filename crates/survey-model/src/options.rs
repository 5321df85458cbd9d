//! Survey-wide configuration.
//!
//! Everything survey-year specific is carried here as plain data and passed
//! explicitly into construction, so several survey-year instances can
//! coexist in one process without interference.

/// Knobs for response loading and structure/data reconciliation.
#[derive(Debug, Clone)]
pub struct SurveyOptions {
    /// Respondent key column; exempt from schema reconciliation.
    pub id_column: String,
    /// In a raw export, question columns start right after this column.
    pub range_start: String,
    /// In a raw export, question columns end right before this column.
    pub range_end: String,
    /// Column prefixes exempt from the "not in structure" check
    /// (LimeSurvey display-only entries that are not questions).
    pub excluded_column_prefixes: Vec<String>,
    /// Label used for absent answers in report tables.
    pub na_label: String,
}

impl Default for SurveyOptions {
    fn default() -> Self {
        Self {
            id_column: "id".to_string(),
            range_start: "datestamp".to_string(),
            range_end: "interviewtime".to_string(),
            excluded_column_prefixes: vec!["D11".to_string()],
            na_label: "No Answer".to_string(),
        }
    }
}

impl SurveyOptions {
    /// True for columns that are deliberately excluded from the
    /// "columns not in structure" reconciliation check.
    pub fn is_excluded_column(&self, column: &str) -> bool {
        column == self.id_column
            || self
                .excluded_column_prefixes
                .iter()
                .any(|prefix| column.starts_with(prefix.as_str()))
    }
}
