//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use colorchoice_clap::Color;

use survey_model::QuestionType;

#[derive(Parser)]
#[command(
    name = "survey",
    version,
    about = "Load LimeSurvey exports and produce descriptive summaries",
    long_about = "Load a LimeSurvey questionnaire-structure XML file together with a \
                  response CSV export, reconcile the two, and print summaries, \
                  question sheets, or per-question count tables."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for warnings only).
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Respondent, section and per-type question counts.
    Summary(InputArgs),

    /// List question groups with their type and label.
    Questions(QuestionsArgs),

    /// Write the reconciled question sheet as CSV.
    ExportQuestions(ExportArgs),

    /// Answer distribution for one question.
    Counts(CountsArgs),
}

#[derive(Parser)]
pub struct InputArgs {
    /// Questionnaire structure XML export.
    #[arg(value_name = "STRUCTURE_XML")]
    pub structure: PathBuf,

    /// Response CSV export (raw or processed).
    #[arg(value_name = "RESPONSES_CSV")]
    pub responses: PathBuf,
}

#[derive(Parser)]
pub struct QuestionsArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Only list groups of this type.
    #[arg(long = "type", value_enum, value_name = "TYPE")]
    pub question_type: Option<QuestionTypeArg>,
}

#[derive(Parser)]
pub struct ExportArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Directory receiving questions.csv.
    #[arg(long = "output", value_name = "DIR")]
    pub output: PathBuf,
}

#[derive(Parser)]
pub struct CountsArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Question or group code to count.
    #[arg(long = "question", value_name = "CODE")]
    pub question: String,

    /// Count unanswered rows under the missing label.
    #[arg(long = "include-missing")]
    pub include_missing: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum QuestionTypeArg {
    Free,
    Array,
    SingleChoice,
    MultipleChoice,
}

impl From<QuestionTypeArg> for QuestionType {
    fn from(arg: QuestionTypeArg) -> Self {
        match arg {
            QuestionTypeArg::Free => QuestionType::Free,
            QuestionTypeArg::Array => QuestionType::Array,
            QuestionTypeArg::SingleChoice => QuestionType::SingleChoice,
            QuestionTypeArg::MultipleChoice => QuestionType::MultipleChoice,
        }
    }
}
