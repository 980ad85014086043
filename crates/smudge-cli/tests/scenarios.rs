//! File-based scenario replay.

use std::io::Write;
use std::path::PathBuf;

use smudge_cli::cli::{CheckArgs, Cli, Command, OutputFormat, RunArgs};
use smudge_cli::commands::{load_config, run_command};
use smudge_cli::{Runner, Scenario, ScenarioError};
use tempfile::NamedTempFile;

const TODO_SCENARIO: &str = r#"{
  "classes": [{ "name": "Todo", "smudgable": true, "extends": null, "fields": [] }],
  "steps": [
    { "op": "new", "bind": "t", "class": "Todo", "fields": { "title": "a", "tags": [] } },
    { "op": "set", "target": "t", "field": "title", "value": "b" },
    { "op": "push", "target": "t", "field": "tags", "value": "x" },
    { "op": "report", "target": "t" },
    { "op": "clean", "target": "t", "field": null },
    { "op": "report", "target": "t" }
  ]
}"#;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn replays_scenario_from_file() {
    let file = write_temp(TODO_SCENARIO);
    let scenario = Scenario::load(file.path()).unwrap();
    let reports = Runner::new().run(&scenario).unwrap();

    assert_eq!(reports.len(), 2);
    assert!(reports[0].dirty);
    assert_eq!(reports[0].dirty_fields, vec!["title", "tags"]);
    assert_eq!(reports[0].smudged_fields, vec!["title"]);
    assert!(!reports[1].dirty);
    assert!(reports[1].dirty_fields.is_empty());
}

#[test]
fn subclass_inherits_interceptors() {
    let scenario = Scenario::from_json(
        r#"{
          "classes": [
            { "name": "Base" },
            { "name": "Derived", "extends": "Base" }
          ],
          "steps": [
            { "op": "new", "bind": "b", "class": "Base", "fields": { "id": 1 } },
            { "op": "new", "bind": "d", "class": "Derived", "fields": { "id": 2, "extra": true } },
            { "op": "set", "target": "d", "field": "id", "value": 3 },
            { "op": "set", "target": "d", "field": "extra", "value": false },
            { "op": "report", "target": "d" },
            { "op": "report", "target": "b" }
          ]
        }"#,
    )
    .unwrap();
    let reports = Runner::new().run(&scenario).unwrap();
    assert_eq!(reports[0].smudged_fields, vec!["id", "extra"]);
    assert!(!reports[1].dirty);
}

#[test]
fn nested_array_element_mutation_is_reported() {
    let scenario = Scenario::from_json(
        r#"{
          "classes": [{ "name": "Box" }],
          "steps": [
            { "op": "new", "bind": "inner", "class": "Box", "fields": { "items": [1, 2] } },
            { "op": "new", "bind": "outer", "class": "Box", "fields": { "items": [{ "$ref": "inner" }] } },
            { "op": "report", "target": "outer" },
            { "op": "set_index", "target": "inner", "field": "items", "index": 1, "value": 5 },
            { "op": "report", "target": "outer" },
            { "op": "report", "target": "inner" }
          ]
        }"#,
    )
    .unwrap();
    let reports = Runner::new().run(&scenario).unwrap();
    assert!(!reports[0].dirty);
    assert_eq!(reports[1].dirty_fields, vec!["items"]);
    assert!(!reports[1].smudged);
    assert_eq!(reports[2].dirty_fields, vec!["items"]);
}

#[test]
fn malformed_scenario_is_a_parse_error() {
    let file = write_temp(r#"{ "steps": [{ "op": "teleport" }] }"#);
    assert!(matches!(
        Scenario::load(file.path()),
        Err(ScenarioError::Parse(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let missing = PathBuf::from("/nonexistent/scenario.json");
    assert!(matches!(Scenario::load(&missing), Err(ScenarioError::Io(_))));
}

#[test]
fn registry_config_from_toml() {
    let file = write_temp("sweep_interval = 8\n");
    assert_eq!(load_config(file.path()).unwrap().sweep_interval, 8);

    let defaults = write_temp("");
    assert_eq!(load_config(defaults.path()).unwrap(), Default::default());
}

#[test]
fn run_rejects_zero_sweep_interval() {
    let scenario = write_temp(TODO_SCENARIO);
    let config = write_temp("sweep_interval = 0\n");
    let cli = Cli {
        command: Command::Run(RunArgs {
            scenario: scenario.path().to_path_buf(),
            config: Some(config.path().to_path_buf()),
        }),
        verbose: false,
        format: OutputFormat::Text,
    };
    assert!(run_command(cli).is_err());
}

#[test]
fn run_and_check_commands_succeed() {
    let scenario = write_temp(TODO_SCENARIO);
    let config = write_temp("sweep_interval = 16\n");
    let run = Cli {
        command: Command::Run(RunArgs {
            scenario: scenario.path().to_path_buf(),
            config: Some(config.path().to_path_buf()),
        }),
        verbose: false,
        format: OutputFormat::Json,
    };
    run_command(run).unwrap();

    let check = Cli {
        command: Command::Check(CheckArgs {
            scenario: scenario.path().to_path_buf(),
        }),
        verbose: false,
        format: OutputFormat::Text,
    };
    run_command(check).unwrap();
}

#[test]
fn check_reports_dangling_binding() {
    let scenario = write_temp(
        r#"{ "classes": [], "steps": [{ "op": "report", "target": "nobody" }] }"#,
    );
    let check = Cli {
        command: Command::Check(CheckArgs {
            scenario: scenario.path().to_path_buf(),
        }),
        verbose: false,
        format: OutputFormat::Text,
    };
    let err = run_command(check).unwrap_err();
    assert!(err.to_string().contains("unknown binding `nobody`"));
}
