//! CLI command integration tests.
//! Each test uses a temp directory via CLERK_DATA_DIR for full isolation,
//! and strips CLERK_API_KEY so recommend always takes the offline fallback.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn clerk_cmd(data_dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("clerk").unwrap();
    cmd.env("CLERK_DATA_DIR", data_dir.path());
    cmd.env_remove("CLERK_API_KEY");
    cmd
}

fn write_catalog(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("products.json");
    std::fs::write(
        &path,
        r#"[
            {"id": "p1", "title": "Gaming Laptop RTX 4060", "price": 45000,
             "rating": 4.5, "category": "laptop", "site": "walmart"},
            {"id": "p2", "title": "Office Laptop i5", "price": 38000,
             "rating": 3.8, "category": "laptop", "site": "walmart"},
            {"id": "p3", "title": "Workstation Laptop", "price": 95000,
             "rating": 4.7, "category": "laptop", "site": "walmart"}
        ]"#,
    )
    .unwrap();
    path
}

#[test]
fn stats_fresh_profile() {
    let dir = TempDir::new().unwrap();
    clerk_cmd(&dir)
        .args(["stats", "--profile", "test-stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("profile:    test-stats"))
        .stdout(predicate::str::contains("queries:    0"))
        .stdout(predicate::str::contains("categories: 0"));
}

#[test]
fn parse_extracts_budget_and_category() {
    let dir = TempDir::new().unwrap();
    clerk_cmd(&dir)
        .args(["parse", "gaming laptop under 50000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"amount\": 50000"))
        .stdout(predicate::str::contains("\"operator\": \"under\""))
        .stdout(predicate::str::contains("\"laptop\""))
        .stdout(predicate::str::contains("\"purpose\": \"gaming\""));
}

#[test]
fn learn_then_insights() {
    let dir = TempDir::new().unwrap();

    clerk_cmd(&dir)
        .args(["learn", "gaming laptop under 45000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("learned. budget=1, categories=1"));

    clerk_cmd(&dir)
        .args(["learn", "asus gaming laptop with 16gb ram"])
        .assert()
        .success();

    clerk_cmd(&dir)
        .args(["insights"])
        .assert()
        .success()
        .stdout(predicate::str::contains("₹20k - ₹50k"))
        // "16gb ram" also matches the ram category: laptop 2 of 3, ram 1 of 3
        .stdout(predicate::str::contains("laptop (67%), ram (33%)"))
        .stdout(predicate::str::contains("asus (100%)"))
        .stdout(predicate::str::contains("purpose:    gaming"))
        .stdout(predicate::str::contains("queries:    2"));
}

#[test]
fn insights_json_output() {
    let dir = TempDir::new().unwrap();

    clerk_cmd(&dir)
        .args(["learn", "gaming laptop under 45000"])
        .assert()
        .success();

    clerk_cmd(&dir)
        .args(["insights", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"recommendedBudget\""))
        .stdout(predicate::str::contains("\"dominantPurpose\": \"gaming\""));
}

#[test]
fn recommend_fallback_without_api_key() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(&dir);

    clerk_cmd(&dir)
        .args(["recommend", "gaming laptop under 50000", "--products"])
        .arg(&catalog)
        .assert()
        .success()
        .stdout(predicate::str::contains("source:   fallback (no API key)"))
        .stdout(predicate::str::contains("products: 3 total, 2 matched"))
        .stdout(predicate::str::contains("Gaming Laptop RTX 4060"))
        .stdout(predicate::str::contains("High rating"))
        // The ₹95k laptop is over budget
        .stdout(predicate::str::contains("Workstation Laptop").not());
}

#[test]
fn recommend_json_output() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(&dir);

    clerk_cmd(&dir)
        .args(["recommend", "laptop under 50000", "--json", "--products"])
        .arg(&catalog)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"kind\": \"fallback\""))
        .stdout(predicate::str::contains("\"reason\": \"missing_credential\""))
        .stdout(predicate::str::contains("\"totalProducts\": 3"))
        .stdout(predicate::str::contains("\"filteredProducts\": 2"));
}

#[test]
fn recommend_no_matches() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(&dir);

    clerk_cmd(&dir)
        .args(["recommend", "laptop under 10000", "--products"])
        .arg(&catalog)
        .assert()
        .success()
        .stdout(predicate::str::contains("source:   no matches"))
        .stdout(predicate::str::contains("products: 3 total, 0 matched"));
}

#[test]
fn recommend_learns_by_default() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(&dir);

    clerk_cmd(&dir)
        .args(["recommend", "gaming laptop under 50000", "--products"])
        .arg(&catalog)
        .assert()
        .success();

    clerk_cmd(&dir)
        .args(["stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queries:    1"))
        .stdout(predicate::str::contains("page:       walmart (3 products)"));
}

#[test]
fn recommend_no_learn_flag() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(&dir);

    clerk_cmd(&dir)
        .args([
            "recommend",
            "gaming laptop under 50000",
            "--no-learn",
            "--products",
        ])
        .arg(&catalog)
        .assert()
        .success();

    clerk_cmd(&dir)
        .args(["stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queries:    0"))
        .stdout(predicate::str::contains("categories: 0"));
}

#[test]
fn clear_preferences_keeps_session() {
    let dir = TempDir::new().unwrap();

    clerk_cmd(&dir)
        .args(["learn", "gaming laptop under 45000"])
        .assert()
        .success();

    clerk_cmd(&dir)
        .args(["clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "cleared learned preferences for profile 'default'",
        ));

    clerk_cmd(&dir)
        .args(["prefs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(no learned preferences)"));

    // Session ring buffer is untouched by clear
    clerk_cmd(&dir)
        .args(["stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queries:    1"));
}

#[test]
fn prefs_shows_ranked_records() {
    let dir = TempDir::new().unwrap();

    for query in [
        "gaming laptop under 45000",
        "gaming laptop with 16gb ram",
        "office monitor around 20000",
    ] {
        clerk_cmd(&dir).args(["learn", query]).assert().success();
    }

    clerk_cmd(&dir)
        .args(["prefs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("category  laptop"))
        .stdout(predicate::str::contains("category  monitor"))
        .stdout(predicate::str::contains("purpose   gaming"))
        .stdout(predicate::str::contains("spec      ram"));
}

#[test]
fn profile_isolation() {
    let dir = TempDir::new().unwrap();

    clerk_cmd(&dir)
        .args(["learn", "gaming laptop", "--profile", "alpha"])
        .assert()
        .success();

    clerk_cmd(&dir)
        .args(["stats", "--profile", "alpha"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queries:    1"));

    clerk_cmd(&dir)
        .args(["stats", "--profile", "beta"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queries:    0"));
}

#[test]
fn custom_lexicon_from_data_dir() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("lexicon.toml"),
        r#"
[[categories]]
name = "telescope"
keywords = ["telescope", "refractor"]

[[purposes]]
name = "astronomy"
keywords = ["stargazing", "astro"]
"#,
    )
    .unwrap();

    clerk_cmd(&dir)
        .args(["parse", "refractor telescope for stargazing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"telescope\""))
        .stdout(predicate::str::contains("\"purpose\": \"astronomy\""));
}

#[test]
fn missing_required_args() {
    let dir = TempDir::new().unwrap();

    clerk_cmd(&dir)
        .args(["parse"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));

    clerk_cmd(&dir)
        .args(["recommend", "laptop"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn recommend_rejects_bad_catalog() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "not json").unwrap();

    clerk_cmd(&dir)
        .args(["recommend", "laptop", "--products"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid product catalog"));
}
