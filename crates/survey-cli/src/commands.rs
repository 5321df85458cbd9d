//! Subcommand implementations.

use std::collections::BTreeSet;
use std::fs;

use anyhow::{Context, Result};
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};

use survey_analysis::{CountOptions, CountTable, count_multiple, count_single};
use survey_core::Survey;
use survey_model::QuestionType;

use crate::cli::{CountsArgs, ExportArgs, InputArgs, QuestionsArgs};

const TYPES: [QuestionType; 4] = [
    QuestionType::Free,
    QuestionType::Array,
    QuestionType::SingleChoice,
    QuestionType::MultipleChoice,
];

fn load(input: &InputArgs) -> Result<Survey> {
    Survey::load(&input.structure, &input.responses).with_context(|| {
        format!(
            "loading survey from {} and {}",
            input.structure.display(),
            input.responses.display()
        )
    })
}

fn new_table(headers: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(headers);
    table
}

fn align_right(table: &mut Table, index: usize) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(CellAlignment::Right);
    }
}

pub fn run_summary(args: &InputArgs) -> Result<()> {
    let survey = load(args)?;
    let groups: BTreeSet<&str> = survey
        .questions()
        .iter()
        .map(|question| question.question_group.as_str())
        .collect();
    println!("Respondents: {}", survey.respondent_count());
    println!(
        "Questions: {} groups ({} columns)",
        groups.len(),
        survey.questions().len()
    );
    println!("Sections: {}", survey.sections().len());
    let report = survey.schema_report();
    if !report.is_clean() {
        println!(
            "Schema mismatches: {} dropped columns, {} questions without data",
            report.dropped_columns.len(),
            report.missing_questions.len()
        );
    }

    let mut table = new_table(vec!["Type", "Groups"]);
    align_right(&mut table, 1);
    for question_type in TYPES {
        table.add_row(vec![
            Cell::new(question_type.as_str()),
            Cell::new(survey.get_questions_by_type(question_type).len()),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn run_questions(args: &QuestionsArgs) -> Result<()> {
    let survey = load(&args.input)?;
    let wanted: Option<QuestionType> = args.question_type.map(Into::into);

    let mut table = new_table(vec!["Group", "Type", "Columns", "Label"]);
    align_right(&mut table, 2);
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for question in survey.questions() {
        if !seen.insert(question.question_group.as_str()) {
            continue;
        }
        if wanted.is_some_and(|question_type| question_type != question.question_type) {
            continue;
        }
        let columns = survey
            .questions()
            .iter()
            .filter(|other| other.question_group == question.question_group)
            .count();
        table.add_row(vec![
            Cell::new(&question.question_group),
            Cell::new(question.question_type.as_str()),
            Cell::new(columns),
            Cell::new(&question.label),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn run_export_questions(args: &ExportArgs) -> Result<()> {
    let survey = load(&args.input)?;
    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let path = args.output.join("questions.csv");
    survey
        .export_questions_csv(&path)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

pub fn run_counts(args: &CountsArgs) -> Result<()> {
    let survey = load(&args.input)?;
    let options = CountOptions {
        order: None,
        include_missing: args.include_missing,
    };
    let question_type = survey.get_question_type(&args.question)?;
    let counts = if question_type == QuestionType::MultipleChoice {
        count_multiple(&survey, &args.question, &options)?
    } else {
        count_single(&survey, &args.question, &options)?
    };
    print_count_table(&args.question, &counts)?;
    Ok(())
}

fn print_count_table(question: &str, counts: &CountTable) -> Result<()> {
    let answers = counts.table.column("answer")?.as_materialized_series().str()?.clone();
    let tallies = counts.table.column("count")?.as_materialized_series().u32()?.clone();
    let proportions = counts
        .table
        .column("proportion")?
        .as_materialized_series()
        .f64()?
        .clone();

    let mut table = new_table(vec!["Answer", "Count", "Share"]);
    align_right(&mut table, 1);
    align_right(&mut table, 2);
    for idx in 0..counts.table.height() {
        table.add_row(vec![
            Cell::new(answers.get(idx).unwrap_or_default()),
            Cell::new(tallies.get(idx).unwrap_or_default()),
            Cell::new(format!(
                "{:.1}%",
                proportions.get(idx).unwrap_or_default() * 100.0
            )),
        ]);
    }
    println!("{question}: {} respondents", counts.respondents);
    println!("{table}");
    Ok(())
}
