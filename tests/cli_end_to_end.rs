use std::fs;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::tempdir;

fn mason() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mason-filter"));
    cmd.env_remove("MASON_FILTER_CONFIG_FILE")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn render_writes_page_to_stdout() {
    let dir = tempdir().expect("tempdir");
    let page = dir.path().join("page.toml");
    fs::write(
        &page,
        "[[blocks]]\ntext = \"  <i>hi</i>  \"\npipe = \"Trim,H\"\n",
    )
    .expect("write page");

    let assert = mason().arg("render").arg(&page).assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    assert_eq!(stdout, "&lt;i&gt;hi&lt;/i&gt;");
}

#[test]
fn render_writes_page_to_output_file() {
    let dir = tempdir().expect("tempdir");
    let page = dir.path().join("page.toml");
    let out = dir.path().join("page.html");
    fs::write(
        &page,
        "[[blocks]]\ntext = \"b\"\nfilters = [{ name = \"Defer\" }]\n\n[[blocks]]\ntext = \"a\"\n",
    )
    .expect("write page");

    mason()
        .arg("render")
        .arg(&page)
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&out).expect("read output"), "ba");
}

#[test]
fn unknown_filter_fails_with_context() {
    let dir = tempdir().expect("tempdir");
    let page = dir.path().join("page.toml");
    fs::write(&page, "[[blocks]]\ntext = \"x\"\npipe = \"Trim,Bogus\"\n").expect("write page");

    mason()
        .arg("render")
        .arg(&page)
        .assert()
        .failure()
        .stderr(contains("Bogus"));
}

#[test]
fn filters_lists_standard_filters_as_json() {
    let assert = mason().args(["filters", "--json"]).assert().success();
    let listing: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("json listing");

    let names: Vec<&str> = listing
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|entry| entry["name"].as_str())
        .collect();
    for name in ["Cache", "Defer", "H", "HtmlEscape", "Repeat", "Trim", "U"] {
        assert!(names.contains(&name), "missing filter: {name}");
    }
}
