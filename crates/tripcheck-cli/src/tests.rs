use super::*;
use chrono::NaiveDate;
use tripcheck_core::{RunSummary, StoreSpec, TestResult, TestStatus};

fn result(id: &str, status: TestStatus, landing: &str, details: &str) -> TestResult {
    let store = StoreSpec {
        store_id: id.to_string(),
        store_name: format!("Store {id}"),
        xfas_url: format!("https://track.example/{id}"),
        merchant_site_url: "https://shop.example".to_string(),
        network_id: StoreSpec::DEFAULT_NETWORK_ID.to_string(),
    };
    let date = NaiveDate::from_ymd_opt(2026, 3, 14).expect("valid date");
    let mut result = TestResult::begin(store, "https://track.example/x".to_string(), date);
    result.conclude(status, landing, details);
    result
}

#[test]
fn parses_run_command() {
    let cli = Cli::try_parse_from(["tripcheck", "run", "--input", "stores.csv"])
        .expect("expected valid cli args");

    match cli.command {
        Some(Commands::Run {
            input,
            batch_size,
            login_if_missing,
        }) => {
            assert_eq!(input, PathBuf::from("stores.csv"));
            assert_eq!(batch_size, None);
            assert!(!login_if_missing);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parses_run_command_with_options() {
    let cli = Cli::try_parse_from([
        "tripcheck",
        "run",
        "-i",
        "stores.csv",
        "--batch-size",
        "5",
        "--login-if-missing",
    ])
    .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Run {
            batch_size: Some(5),
            login_if_missing: true,
            ..
        })
    ));
}

#[test]
fn run_requires_input() {
    let result = Cli::try_parse_from(["tripcheck", "run"]);
    assert!(result.is_err(), "run without --input should fail to parse");
}

#[test]
fn parses_check_command() {
    let cli = Cli::try_parse_from([
        "tripcheck",
        "check",
        "--store-id",
        "101",
        "--store-name",
        "Acme",
        "--xfas-url",
        "https://track.example/101",
        "--merchant-url",
        "https://acme.example",
    ])
    .expect("expected valid cli args");

    match cli.command {
        Some(Commands::Check {
            store_id,
            merchant_url,
            network_id,
            ..
        }) => {
            assert_eq!(store_id, "101");
            assert_eq!(merchant_url, "https://acme.example");
            assert_eq!(network_id, None);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn check_requires_merchant_url() {
    let result = Cli::try_parse_from([
        "tripcheck",
        "check",
        "--store-id",
        "101",
        "--store-name",
        "Acme",
        "--xfas-url",
        "https://track.example/101",
    ]);
    assert!(result.is_err());
}

#[test]
fn parses_session_commands() {
    for (arg, expected) in [("status", "Status"), ("login", "Login"), ("logout", "Logout")] {
        let cli = Cli::try_parse_from(["tripcheck", "session", arg])
            .expect("expected valid cli args");
        match cli.command {
            Some(Commands::Session { command }) => {
                assert_eq!(format!("{command:?}"), expected);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

#[test]
fn parses_report_command() {
    let cli = Cli::try_parse_from(["tripcheck", "report", "results/results_1.csv"])
        .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Report { path }) if path == PathBuf::from("results/results_1.csv")
    ));
}

#[test]
fn no_subcommand_parses() {
    let cli = Cli::try_parse_from(["tripcheck"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn store_from_args_defaults_network_id() {
    let store = run::store_from_args(
        "7".to_string(),
        "Acme".to_string(),
        "https://track.example/7".to_string(),
        "https://acme.example".to_string(),
        Some("  ".to_string()),
    );
    assert_eq!(store.network_id, "N/A");

    let store = run::store_from_args(
        "7".to_string(),
        "Acme".to_string(),
        "https://track.example/7".to_string(),
        "https://acme.example".to_string(),
        Some("42".to_string()),
    );
    assert_eq!(store.network_id, "42");
}

#[test]
fn progress_line_shows_landing_for_pass() {
    let line = run::format_progress(
        2,
        7,
        &result("101", TestStatus::Pass, "https://shop.example/", "Successfully redirected"),
    );
    assert!(line.starts_with("[2/7] PASS"));
    assert!(line.contains("Store 101 (101)"));
    assert!(line.ends_with("-> https://shop.example/"));
}

#[test]
fn progress_line_shows_details_for_failures() {
    let line = run::format_progress(
        1,
        1,
        &result("9", TestStatus::Fail, "https://other.example/", "Wrong domain: other.example"),
    );
    assert!(line.contains("FAIL"));
    assert!(line.ends_with("(Wrong domain: other.example)"));
}

#[test]
fn summary_lists_every_count() {
    let results = vec![
        result("1", TestStatus::Pass, "https://shop.example/", ""),
        result("2", TestStatus::Pending, "https://rakuten.com/r", "Stuck on tracking page"),
        result("3", TestStatus::Error, "", "could not open page"),
    ];
    let text = run::format_summary(&RunSummary::from_results(&results));

    assert!(text.contains("Total: 3"));
    assert!(text.contains("Passed: 1"));
    assert!(text.contains("Pending: 1"));
    assert!(text.contains("Errors: 1"));
    assert!(text.contains("Failed: 0"));
}

#[test]
fn attention_lines_skip_passing_results() {
    let results = vec![
        result("1", TestStatus::Pass, "https://shop.example/", ""),
        result("2", TestStatus::ManualReview, "https://rakuten.com/r", "blocked"),
    ];
    let lines = report::attention_lines(&results);

    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("MANUAL_REVIEW"));
    assert!(lines[0].ends_with("Store 2 (2): blocked"));
}

#[test]
fn report_command_reads_written_report() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("results_1.csv");
    let results = vec![result("1", TestStatus::Fail, "https://x.example/", "Wrong domain: x.example")];
    tripcheck_engine::write_report(&path, &results).expect("write report");

    report::run_report(&path).expect("report should be readable");
}

#[test]
fn report_command_fails_for_missing_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    assert!(report::run_report(&dir.path().join("missing.csv")).is_err());
}
