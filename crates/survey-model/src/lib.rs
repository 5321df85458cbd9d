pub mod error;
pub mod options;
pub mod question;

pub use error::{Result, SurveyError};
pub use options::SurveyOptions;
pub use question::{Question, QuestionType, ResponseFormat, Section};
