//! Corpus scanning against real directories.

use std::fs;
use std::path::PathBuf;

use course_assistant::config::CorpusConfig;
use course_assistant::corpus::scan_corpus;
use tempfile::TempDir;

fn course_dir() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    fs::create_dir_all(root.join("week1")).unwrap();
    fs::create_dir_all(root.join(".git")).unwrap();

    fs::write(
        root.join("week1/recursion.md"),
        "# Recursion\r\n\r\n\r\n\r\nA function that calls itself.   \r\n",
    )
    .unwrap();
    fs::write(root.join("syllabus-notes.txt"), "Office hours: Tuesdays.").unwrap();
    fs::write(root.join("slides.pptx"), b"binary").unwrap();
    fs::write(root.join("broken.pdf"), b"not a valid pdf").unwrap();
    fs::write(root.join("empty.txt"), "   \n\n").unwrap();
    fs::write(root.join(".hidden.md"), "secret").unwrap();
    fs::write(root.join(".git/HEAD.txt"), "ref: refs/heads/main").unwrap();

    tmp
}

fn config_for(root: PathBuf) -> CorpusConfig {
    CorpusConfig {
        root: Some(root),
        ..CorpusConfig::default()
    }
}

#[test]
fn scan_collects_supported_files_sorted() {
    let tmp = course_dir();
    let scan = scan_corpus(&config_for(tmp.path().to_path_buf())).unwrap();

    let ids: Vec<&str> = scan.documents.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["syllabus-notes.txt", "week1/recursion.md"]);

    let recursion = &scan.documents[1];
    assert_eq!(recursion.content_type, "text/markdown");
    assert_eq!(recursion.text, "# Recursion\n\nA function that calls itself.");
    assert_eq!(recursion.title.as_deref(), Some("recursion.md"));
}

#[test]
fn scan_skips_broken_and_empty_files() {
    let tmp = course_dir();
    let scan = scan_corpus(&config_for(tmp.path().to_path_buf())).unwrap();

    let skipped: Vec<&str> = scan.skipped.iter().map(|(path, _)| path.as_str()).collect();
    assert!(skipped.contains(&"broken.pdf"), "skipped: {:?}", skipped);
    assert!(skipped.contains(&"empty.txt"), "skipped: {:?}", skipped);
    // excluded and non-matching files are filtered, not reported
    assert!(!skipped.contains(&"slides.pptx"));
    assert!(!skipped.contains(&".hidden.md"));
}

#[test]
fn scan_honors_exclude_globs() {
    let tmp = course_dir();
    let config = CorpusConfig {
        exclude_globs: vec!["week1/**".to_string()],
        ..config_for(tmp.path().to_path_buf())
    };
    let scan = scan_corpus(&config).unwrap();
    let ids: Vec<&str> = scan.documents.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["syllabus-notes.txt"]);
}

#[test]
fn missing_or_unset_root_is_empty() {
    let tmp = TempDir::new().unwrap();
    let missing = scan_corpus(&config_for(tmp.path().join("nope"))).unwrap();
    assert!(missing.documents.is_empty());

    let unset = scan_corpus(&CorpusConfig::default()).unwrap();
    assert!(unset.documents.is_empty());
    assert!(unset.skipped.is_empty());
}

#[test]
fn invalid_glob_is_an_error() {
    let tmp = course_dir();
    let config = CorpusConfig {
        include_globs: vec!["**/[.md".to_string()],
        ..config_for(tmp.path().to_path_buf())
    };
    assert!(scan_corpus(&config).is_err());
}
