use assert_cmd::cargo;
use rstest::rstest;
use scopeguard::defer;
use std::io::Write;
use std::{fs::File, path::PathBuf};

const SNAPSHOT: &str = r#"{"user_name": "Alice", "my_var": 1, "article_text": "Sandbox"}"#;

pub fn create_file(name: &str, content: &str) -> (PathBuf, PathBuf) {
    let temp_dir = std::env::temp_dir();
    let temp_file_path = temp_dir.join(name);
    let mut file = File::create(&temp_file_path).expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write to temp file");

    (temp_dir, temp_file_path)
}

#[test]
fn test_cli_dump_file() -> Result<(), Box<dyn std::error::Error>> {
    let (_, temp_file_path) = create_file("fvars_test_dump_file.json", SNAPSHOT);
    let temp_file_path_clone = temp_file_path.clone();

    defer! {
        if temp_file_path_clone.exists() {
            std::fs::remove_file(&temp_file_path_clone).expect("Failed to delete temp file");
        }
    }

    let mut cmd = cargo::cargo_bin_cmd!("fvars");
    let assert = cmd.arg("dump").arg(temp_file_path.to_string_lossy().to_string()).assert();
    assert
        .success()
        .code(0)
        .stdout("{\n  \"article_text\": \"Sandbox\",\n  \"user_name\": \"Alice\"\n}\n");

    Ok(())
}

#[rstest]
#[case::translate(
    vec!["dump", "--translate", "-F", "text"],
    SNAPSHOT,
    "page_title: Sandbox\nuser_name: Alice\n"
)]
#[case::all_user_vars(
    vec!["dump", "--all-user-vars", "-F", "text", "-"],
    SNAPSHOT,
    "article_text: Sandbox\nmy_var: 1\nuser_name: Alice\n"
)]
#[case::wiki_vars_not_computed(
    vec!["dump", "--with-wiki-vars", "-F", "text"],
    r#"{"user_name": "Alice"}"#,
    "user_name: Alice\n"
)]
#[case::compute_named(
    vec!["dump", "--with-wiki-vars", "--compute", "wiki_name", "-F", "text"],
    r#"{"user_name": "Alice"}"#,
    "user_name: Alice\nwiki_name: testwiki\n"
)]
#[case::compute_all(
    vec!["dump", "--with-wiki-vars", "--compute-all", "-F", "text"],
    r#"{"USER_NAME": "Alice"}"#,
    "user_name: Alice\nwiki_language: en\nwiki_name: testwiki\n"
)]
fn test_cli_dump_stdin(#[case] args: Vec<&str>, #[case] input: &str, #[case] expected: &str) {
    let mut cmd = cargo::cargo_bin_cmd!("fvars");
    let assert = cmd
        .args(args)
        .env("FILTER_VARS_WIKI_ID", "testwiki")
        .env("FILTER_VARS_WIKI_LANGUAGE", "en")
        .write_stdin(input)
        .assert();
    assert.success().code(0).stdout(expected.to_string());
}

#[rstest]
#[case::not_an_object("[1, 2]")]
#[case::invalid_json("{")]
fn test_cli_dump_rejects_bad_snapshot(#[case] input: &str) {
    let mut cmd = cargo::cargo_bin_cmd!("fvars");
    cmd.arg("dump").write_stdin(input).assert().failure();
}

#[test]
fn test_cli_list() {
    let mut cmd = cargo::cargo_bin_cmd!("fvars");
    let output = cmd.arg("list").output().expect("Failed to run fvars");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.lines().any(|line| line == "page_age"));
    assert!(stdout.lines().any(|line| line == "moved_from_recent_contributors"));
}

#[test]
fn test_cli_list_deprecated() {
    let mut cmd = cargo::cargo_bin_cmd!("fvars");
    let assert = cmd.args(["list", "--deprecated"]).assert();
    let output = assert.success().get_output().stdout.clone();

    assert!(String::from_utf8_lossy(&output).contains("article_text -> page_title\n"));
}
