use std::fs;

use predicates::prelude::*;

#[test]
fn rust_log_debug_emits_debug_line_to_stderr() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let map = temp.path().join("links.yaml");
    fs::write(&map, "entries: []\n").expect("write map");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("sitemigrate");
    cmd.env("RUST_LOG", "debug")
        .args(["linkmap", "check", "--map", map.to_str().expect("utf-8 path")])
        .assert()
        .success()
        .stderr(predicate::str::contains("parsed cli"));
}

#[test]
fn linkmap_check_rejects_conflicting_keys() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let map = temp.path().join("links.yaml");
    fs::write(
        &map,
        r#"entries:
  - from: "https://www.jesuswalk.com/lords-supper/"
    to: "all-studies.html#topical"
  - from: "https://www.jesuswalk.com/lords-supper"
    to: "jw_lords-supper.html"
"#,
    )
    .expect("write map");

    assert_cmd::cargo::cargo_bin_cmd!("sitemigrate")
        .args(["linkmap", "check", "--map", map.to_str().expect("utf-8 path")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("conflicting key"))
        .stderr(predicate::str::contains("https://www.jesuswalk.com/lords-supper"));
}

#[test]
fn linkmap_check_counts_valid_entries() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let map = temp.path().join("links.yaml");
    fs::write(
        &map,
        r#"entries:
  - from: "https://www.jesuswalk.com/acts/"
    to: "all-studies.html#acts"
  - from: "https://www.jesuswalk.com/index.htm#books"
    to: "books.html"
"#,
    )
    .expect("write map");

    assert_cmd::cargo::cargo_bin_cmd!("sitemigrate")
        .args(["linkmap", "check", "--map", map.to_str().expect("utf-8 path")])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 entries"));
}

#[test]
fn relink_rewrites_once_and_is_idempotent() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let map = temp.path().join("links.yaml");
    fs::write(
        &map,
        r#"entries:
  - from: "https://www.jesuswalk.com/acts/"
    to: "all-studies.html#acts"
"#,
    )
    .expect("write map");

    let site = temp.path().join("site");
    fs::create_dir_all(site.join("pages")).expect("create site");
    let page = site.join("pages").join("study.html");
    fs::write(
        &page,
        r#"<p><a href="https://www.jesuswalk.com/acts/">Acts</a> and <a href='https://elsewhere.test/'>more</a></p>"#,
    )
    .expect("write page");

    let relink = |extra: &[&str]| {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("sitemigrate");
        cmd.args([
            "relink",
            "--map",
            map.to_str().expect("utf-8 path"),
            "--dir",
            site.to_str().expect("utf-8 path"),
        ])
        .args(extra);
        cmd
    };

    relink(&["--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry run] 1 replacement(s)"));
    assert!(
        fs::read_to_string(&page)
            .expect("read page")
            .contains("https://www.jesuswalk.com/acts/")
    );

    relink(&[])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "https://www.jesuswalk.com/acts/ -> all-studies.html#acts",
        ));
    let once = fs::read_to_string(&page).expect("read page");
    assert_eq!(
        once,
        r#"<p><a href="all-studies.html#acts">Acts</a> and <a href='https://elsewhere.test/'>more</a></p>"#
    );

    relink(&[])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 replacement(s)"));
    assert_eq!(fs::read_to_string(&page).expect("read page"), once);
}
