use std::collections::BTreeMap;
use std::io::Write;

use polars::prelude::DataType;
use survey_core::Survey;
use survey_model::{QuestionType, SurveyError};

const STRUCTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<questionnaire>
  <section id="1">
    <sectionInfo><position>title</position><text>A: About you</text></sectionInfo>
    <question>
      <text>What is your gender?</text>
      <response varName="A6">
        <fixed>
          <category><label>Woman</label><value>A1</value></category>
          <category><label>Man</label><value>A2</value></category>
        </fixed>
      </response>
    </question>
    <question>
      <text>How many hours per week do you work?</text>
      <response varName="A8">
        <free><format>integer</format><length>3</length></free>
      </response>
    </question>
  </section>
  <section id="2">
    <sectionInfo><position>title</position><text>B: Your work</text></sectionInfo>
    <question>
      <text>Which benefits do you receive?</text>
      <response varName="B7_SQ001">
        <fixed><category><label>Holiday pay</label><value>Y</value></category></fixed>
      </response>
      <response varName="B7_SQ002">
        <fixed><category><label>Pension contributions</label><value>Y</value></category></fixed>
      </response>
      <response varName="B7_SQ003">
        <fixed><category><label>Travel allowance</label><value>Y</value></category></fixed>
      </response>
    </question>
    <question>
      <text>What is your source of funding?</text>
      <response varName="B1_SQ001">
        <fixed><category><label>Fellowship</label><value>Y</value></category></fixed>
      </response>
      <response varName="B1T">
        <fixed>
          <category>
            <label>Other</label><value>Y</value>
            <contingentQuestion varName="B1other">
              <text>Other funding</text><length>24</length>
            </contingentQuestion>
          </category>
        </fixed>
      </response>
    </question>
    <question>
      <text>How satisfied are you with the following aspects?</text>
      <subQuestion varName="C1_SQ001"><text>Salary</text></subQuestion>
      <subQuestion varName="C1_SQ002"><text>Workload</text></subQuestion>
      <response varName="C1">
        <fixed>
          <category><label>Satisfied</label><value>A1</value></category>
          <category><label>Dissatisfied</label><value>A2</value></category>
        </fixed>
      </response>
    </question>
  </section>
</questionnaire>
"#;

const RESPONSES: &str = "\
id,submitdate,lastpage,startlanguage,seed,datestamp,A6,B7[SQ001],B7[SQ002],B1[SQ001],B1[other],C1[SQ001],C1[SQ002],Z99,interviewtime
1,2024-05-17 10:05:00,3,en,111,2024-05-17 10:00:00,A1,Y,,Y,some text,A1,A2,foo,334.5
2,2024-05-17 11:05:00,3,en,222,2024-05-17 11:00:00,A2,,Y,,,A2,A1,bar,100.0
3,2024-05-17 12:05:00,3,en,333,2024-05-17 12:00:00,A1,Y,Y,,,A1,A1,baz,90.0
4,2024-05-17 13:05:00,1,en,444,2024-05-17 13:00:00,,,,,,,,qux,10.0
";

fn load_survey() -> Survey {
    let mut structure = tempfile::NamedTempFile::new().expect("structure file");
    structure
        .write_all(STRUCTURE.as_bytes())
        .expect("write structure");
    let mut responses = tempfile::NamedTempFile::new().expect("responses file");
    responses
        .write_all(RESPONSES.as_bytes())
        .expect("write responses");
    Survey::load(structure.path(), responses.path()).expect("load survey")
}

#[test]
fn single_choice_passes_through_with_declared_choices() {
    let survey = load_survey();
    let frame = survey.get_responses("A6", false).expect("responses");
    let column = frame.column("A6").expect("A6").as_materialized_series().clone();
    let values = column.str().expect("string column");
    assert_eq!(values.get(0), Some("A1"));
    assert_eq!(values.get(1), Some("A2"));
    assert_eq!(values.get(2), Some("A1"));
    assert_eq!(values.get(3), None);

    let choices = survey.get_choices("A6").expect("choices");
    assert_eq!(
        choices,
        BTreeMap::from([
            ("A1".to_string(), "Woman".to_string()),
            ("A2".to_string(), "Man".to_string()),
        ])
    );
}

#[test]
fn multiple_choice_columns_become_presence_booleans() {
    let survey = load_survey();
    let frame = survey.get_responses("B7", false).expect("responses");
    for name in ["B7_SQ001", "B7_SQ002", "B7_SQ003"] {
        assert_eq!(
            frame.column(name).expect(name).dtype(),
            &DataType::Boolean,
            "{name} not boolean"
        );
    }
    let first = frame
        .column("B7_SQ001")
        .expect("B7_SQ001")
        .as_materialized_series()
        .clone();
    let second = frame
        .column("B7_SQ002")
        .expect("B7_SQ002")
        .as_materialized_series()
        .clone();
    assert_eq!(first.bool().expect("bool").get(0), Some(true));
    assert_eq!(second.bool().expect("bool").get(0), Some(false));

    // declared in the structure, absent from the data: stays boolean
    let absent = frame
        .column("B7_SQ003")
        .expect("B7_SQ003")
        .as_materialized_series()
        .clone();
    assert_eq!(absent.null_count(), survey.respondent_count());
}

#[test]
fn contingent_parent_column_is_synthesized_from_free_text() {
    let survey = load_survey();
    let parent = survey
        .responses()
        .column("B1T")
        .expect("synthesized parent")
        .as_materialized_series()
        .clone();
    let values = parent.str().expect("string column");
    assert_eq!(values.get(0), Some("Y"));
    assert_eq!(values.get(1), None);
    assert_eq!(values.get(3), None);
}

#[test]
fn contingent_text_survives_conversion_when_kept() {
    let survey = load_survey();
    let frame = survey.get_responses("B1", false).expect("responses");
    assert_eq!(
        frame.column("B1_SQ001").expect("flag").dtype(),
        &DataType::Boolean
    );
    let other = frame
        .column("B1other")
        .expect("free text untouched")
        .as_materialized_series()
        .clone();
    assert_eq!(other.str().expect("string").get(0), Some("some text"));

    let without = survey.get_responses("B1", true).expect("responses");
    assert!(without.column("B1other").is_err());
}

#[test]
fn undeclared_column_is_dropped_and_reported_once() {
    let survey = load_survey();
    assert_eq!(
        survey.schema_report().dropped_columns,
        vec!["Z99".to_string()]
    );
    assert!(survey.responses().column("Z99").is_err());
}

#[test]
fn question_without_data_reads_back_all_missing() {
    let survey = load_survey();
    assert_eq!(
        survey.schema_report().missing_questions,
        vec!["A8".to_string(), "B7_SQ003".to_string()]
    );
    let frame = survey.get_responses("A8", false).expect("responses");
    let column = frame.column("A8").expect("A8");
    assert_eq!(column.len(), survey.respondent_count());
    assert_eq!(column.null_count(), survey.respondent_count());
}

#[test]
fn unknown_code_is_a_lookup_error() {
    let survey = load_survey();
    assert!(matches!(
        survey.get_question("NOPE", false),
        Err(SurveyError::UnknownQuestion(code)) if code == "NOPE"
    ));
}

#[test]
fn group_and_row_codes_resolve_to_ordered_records() {
    let survey = load_survey();
    let group = survey.get_question("B1", false).expect("group");
    let names: Vec<&str> = group.iter().map(|question| question.name.as_str()).collect();
    assert_eq!(names, ["B1_SQ001", "B1T", "B1other"]);

    let row = survey.get_question("C1_SQ002", false).expect("row");
    assert_eq!(row.len(), 1);
    assert_eq!(row[0].label, "Workload");

    let no_other = survey.get_question("B1", true).expect("group");
    assert!(no_other.iter().all(|question| !question.is_contingent()));
}

#[test]
fn question_types_resolve_per_group() {
    let survey = load_survey();
    assert_eq!(
        survey.get_question_type("A6").expect("A6"),
        QuestionType::SingleChoice
    );
    assert_eq!(
        survey.get_question_type("A8").expect("A8"),
        QuestionType::Free
    );
    assert_eq!(
        survey.get_question_type("B7").expect("B7"),
        QuestionType::MultipleChoice
    );
    assert_eq!(
        survey.get_question_type("C1").expect("C1"),
        QuestionType::Array
    );
}

#[test]
fn multiple_choice_choices_flatten_to_subquestion_labels() {
    let survey = load_survey();
    let choices = survey.get_choices("B7").expect("choices");
    assert_eq!(
        choices,
        BTreeMap::from([
            ("B7_SQ001".to_string(), "Holiday pay".to_string()),
            ("B7_SQ002".to_string(), "Pension contributions".to_string()),
            ("B7_SQ003".to_string(), "Travel allowance".to_string()),
        ])
    );
}

#[test]
fn discovery_lists_groups_in_first_seen_order() {
    let survey = load_survey();
    assert_eq!(
        survey.get_questions_by_type(QuestionType::MultipleChoice),
        vec!["B7".to_string(), "B1".to_string()]
    );
    assert_eq!(
        survey.get_questions_by_type(QuestionType::Array),
        vec!["C1".to_string()]
    );
}

#[test]
fn query_filters_rows_by_column_equality() {
    let survey = load_survey();
    let women = survey.query("A6 == 'A1'").expect("filter");
    assert_eq!(women.height(), 2);
    let men_satisfied = survey
        .query("A6 == 'A2' & C1_SQ001 != 'A1'")
        .expect("filter");
    assert_eq!(men_satisfied.height(), 1);
    assert!(survey.query("A6 ==").is_err());
    assert!(survey.query("NOPE == 'x'").is_err());
}

#[test]
fn mutation_surface_fails_loudly() {
    let mut survey = load_survey();
    let empty = survey.responses().clear();
    assert!(matches!(
        survey.add_responses(&empty),
        Err(SurveyError::Unsupported(_))
    ));
    assert!(matches!(
        survey.transform_question("A6"),
        Err(SurveyError::Unsupported(_))
    ));
}

#[test]
fn question_sheet_export_round_trips_choices() {
    let survey = load_survey();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("questions.csv");
    survey.export_questions_csv(&path).expect("export");

    let mut reader = csv::Reader::from_path(&path).expect("read back");
    let mut rows = 0usize;
    for record in reader.records() {
        let record = record.expect("record");
        if &record[0] == "A6" {
            assert_eq!(&record[2], "single-choice");
            let choices: BTreeMap<String, String> =
                serde_json::from_str(&record[5]).expect("choices json");
            assert_eq!(choices.get("A1").map(String::as_str), Some("Woman"));
        }
        rows += 1;
    }
    assert_eq!(rows, survey.questions().len());
}
