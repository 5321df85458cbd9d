pub mod export;
pub mod frame;
pub mod query;
pub mod reconcile;
pub mod survey;

pub use export::write_question_sheet;
pub use frame::{any_to_string, column_values};
pub use query::{Clause, apply_filter, parse_expression};
pub use reconcile::{SchemaReport, reconcile};
pub use survey::Survey;
