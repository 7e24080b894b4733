//! On-disk parsing tests: include trees, base paths, conf root, cycles.

use std::fs;
use std::path::{Path, PathBuf};

use claimconf_core::{load, ErrorKind, LoadOptions};

fn write(dir: &Path, rel: &str, text: &str) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, text).unwrap();
    path
}

// ──────────────────────────────────────────────
// Basic documents
// ──────────────────────────────────────────────

#[test]
fn parses_a_full_document() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(
        dir.path(),
        "app.conf",
        r#"# application settings
[server]
host = 0.0.0.0
port = 8080   # default port

[paths]
base = /srv/app
logs = [paths:base]/logs
banner = <<EOT
Welcome
# shown verbatim
EOT
cmd = run \
  --fast
"#,
    );
    let doc = load(&root, &LoadOptions::new()).unwrap();

    assert_eq!(doc.section_names(), ["server", "paths"]);
    assert_eq!(doc.value("server", "port"), Some("8080"));
    assert_eq!(doc.prop("server", "port").parse::<u16>().unwrap(), 8080);
    assert_eq!(doc.value("paths", "logs"), Some("/srv/app/logs"));
    assert_eq!(doc.value("paths", "banner"), Some("Welcome\n# shown verbatim"));
    assert_eq!(doc.value("paths", "cmd"), Some("run   --fast"));
    assert_eq!(doc.conf_file(), Some(root.canonicalize().unwrap().as_path()));
}

#[test]
fn section_enumeration_has_no_empty_entries() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(
        dir.path(),
        "app.conf",
        "lead=1\n[a]\n[b]\n[a]\n[c?nobody]\n[d]\n",
    );
    let doc = load(&root, &LoadOptions::new()).unwrap();
    let names = doc.section_names();
    assert_eq!(names, ["a", "b", "d"]);
    assert!(names.iter().all(|n| !n.is_empty()));
}

// ──────────────────────────────────────────────
// Includes
// ──────────────────────────────────────────────

#[test]
fn include_cycle_terminates_without_duplication() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "a.conf", "[a]\nx=1\n[include=b.conf]\n");
    write(dir.path(), "b.conf", "[b]\ny=2\n[include=a.conf]\n");

    let doc = load(&a, &LoadOptions::new()).unwrap();
    assert_eq!(doc.section_names(), ["a", "b"]);
    assert_eq!(doc.files().len(), 2);
    assert_eq!(doc.value("b", "y"), Some("2"));
}

#[test]
fn required_include_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "app.conf", "[main]\n[include=missing.conf]\n");
    let err = load(&root, &LoadOptions::new()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Io);
    assert_eq!(err.row, "[include=missing.conf]");
}

#[test]
fn optional_include_skips_its_section() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(
        dir.path(),
        "app.conf",
        "[opt]\n[include_if_exists=missing.conf]\nk=v\n[main]\nm=1\n",
    );
    let doc = load(&root, &LoadOptions::new()).unwrap();
    assert_eq!(doc.value("opt", "k"), None);
    assert_eq!(doc.value("main", "m"), Some("1"));
}

#[test]
fn nested_includes_resolve_relative_to_including_file() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "app.conf", "[x]\n[include=conf.d/db.conf]\n");
    write(dir.path(), "conf.d/db.conf", "[db]\n[include=creds.conf]\n");
    write(dir.path(), "conf.d/creds.conf", "[creds]\nuser=app\n");

    let doc = load(&root, &LoadOptions::new()).unwrap();
    assert_eq!(doc.value("creds", "user"), Some("app"));
    assert_eq!(doc.files().len(), 3);
}

#[test]
fn base_path_and_conf_root_targets() {
    let dir = tempfile::tempdir().unwrap();
    let site = tempfile::tempdir().unwrap();
    let root = write(
        dir.path(),
        "app.conf",
        "[x]\n[include_site_if_exists=local.conf]\n[y]\n[include=sub/inner.conf]\n",
    );
    write(dir.path(), "sub/inner.conf", "[z]\n[include=^/shared.conf]\n");
    write(dir.path(), "shared.conf", "[shared]\nok=yes\n");
    write(site.path(), "local.conf", "[local]\nsite=1\n");

    let options = LoadOptions::new().with_base_path("site", site.path());
    let doc = load(&root, &options).unwrap();
    assert_eq!(doc.value("local", "site"), Some("1"));
    assert_eq!(doc.value("shared", "ok"), Some("yes"));
}

#[test]
fn unknown_base_path_is_a_reference_error() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "app.conf", "[x]\n[include_site_if_exists=a.conf]\n");
    let err = load(&root, &LoadOptions::new()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Reference);
    assert_eq!(err.line, 2);
}

#[test]
fn include_inside_denied_section_never_runs() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(
        dir.path(),
        "app.conf",
        "[dev?dev]\n[include=missing.conf]\n[use undefined]\n[main]\nk=v\n",
    );
    let doc = load(&root, &LoadOptions::new().with_claim("prod")).unwrap();
    assert_eq!(doc.value("main", "k"), Some("v"));
    assert_eq!(doc.files().len(), 1);
}

// ──────────────────────────────────────────────
// Claims and macros across files
// ──────────────────────────────────────────────

#[test]
fn claims_and_macros_across_files() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(
        dir.path(),
        "app.conf",
        "[env]\nrole=prod\n[include=macros.conf]\n[svc?[env:role]]\n[use endpoint(api, 443)]\n",
    );
    write(
        dir.path(),
        "macros.conf",
        "[define endpoint($name, $port)]\nurl=https://{name}.example:{port}\n",
    );

    let doc = load(&root, &LoadOptions::new().with_claim("prod")).unwrap();
    assert_eq!(doc.value("svc", "url"), Some("https://api.example:443"));

    let doc = load(&root, &LoadOptions::new().with_claim("dev")).unwrap();
    assert_eq!(doc.value("svc", "url"), None);
}

#[test]
fn missing_root_file_is_io() {
    let dir = tempfile::tempdir().unwrap();
    let err = load(&dir.path().join("none.conf"), &LoadOptions::new()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Io);
}
