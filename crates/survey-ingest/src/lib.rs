pub mod fixups;
pub mod responses;
pub mod structure;
pub mod xml;

pub use fixups::{StructureFixups, UnnamedResponseRule, fixups_2024};
pub use responses::{
    ColumnKind, RawTables, infer_column_kind, load_responses, normalize_column_name,
    synthesize_contingent_parents,
};
pub use structure::{ParsedContingent, ParsedResponse, SurveyStructure, parse_structure};
