pub mod counts;
pub mod likert;

pub use counts::{CountOptions, CountTable, count_multiple, count_single};
pub use likert::LikertScale;
