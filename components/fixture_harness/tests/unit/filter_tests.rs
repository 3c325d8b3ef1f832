//! Unit tests for globs and skip lists

use fixture_harness::{ConfigError, Glob, SkipList};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_star_stays_in_one_component() {
    let glob = Glob::new("js1_5/*.js").unwrap();
    assert!(glob.matches(Path::new("js1_5/regress-1.js")));
    assert!(!glob.matches(Path::new("js1_5/Regress/regress-1.js")));
    assert!(!glob.matches(Path::new("js1_6/regress-1.js")));
}

#[test]
fn test_double_star_crosses_components() {
    let glob = Glob::new("js1_5/**").unwrap();
    assert!(glob.matches(Path::new("js1_5/a.js")));
    assert!(glob.matches(Path::new("js1_5/Regress/deep/b.js")));
    assert!(!glob.matches(Path::new("js1_6/a.js")));

    let nested = Glob::new("**/Regress/*.js").unwrap();
    assert!(nested.matches(Path::new("Regress/a.js")));
    assert!(nested.matches(Path::new("js1_5/Regress/a.js")));
}

#[test]
fn test_question_mark() {
    let glob = Glob::new("regress-?.js").unwrap();
    assert!(glob.matches(Path::new("regress-1.js")));
    assert!(!glob.matches(Path::new("regress-12.js")));
}

#[test]
fn test_name_only_pattern_matches_in_any_directory() {
    let glob = Glob::new("regress-*.js").unwrap();
    assert!(glob.matches(Path::new("regress-353078.js")));
    assert!(glob.matches(Path::new("js1_5/Regress/regress-353078.js")));
    assert!(!glob.matches(Path::new("js1_5/Regress/other.js")));
}

#[test]
fn test_regex_characters_are_literal() {
    let glob = Glob::new("a+b(1).js").unwrap();
    assert!(glob.matches(Path::new("a+b(1).js")));
    assert!(!glob.matches(Path::new("aab1.js")));
    assert_eq!(glob.as_str(), "a+b(1).js");
}

#[test]
fn test_backslash_paths_are_normalized() {
    let glob = Glob::new("harmony/*.js").unwrap();
    assert!(glob.matches(Path::new("harmony\\arrow.js")));
}

#[test]
fn test_empty_glob_is_rejected() {
    let err = Glob::new("   ").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidGlob { .. }));
}

#[test]
fn test_skip_list_parse() {
    let skip = SkipList::parse(
        "# fixtures that need a newer engine\n\
         \n\
         harmony/generators.js   # generators not implemented\n\
         js1_5/Regress/**\n",
    )
    .unwrap();

    assert_eq!(skip.len(), 2);
    assert!(!skip.is_empty());
    assert_eq!(
        skip.reason_for(Path::new("harmony/generators.js")),
        Some("skip list: generators not implemented".to_string())
    );
    assert_eq!(
        skip.reason_for(Path::new("js1_5/Regress/regress-1.js")),
        Some("skip list: js1_5/Regress/**".to_string())
    );
    assert_eq!(skip.reason_for(Path::new("harmony/arrow.js")), None);
}

#[test]
fn test_skip_list_first_match_wins() {
    let skip = SkipList::parse("*.js # everything\nspecial.js # special\n").unwrap();
    assert_eq!(
        skip.reason_for(Path::new("special.js")),
        Some("skip list: everything".to_string())
    );
}

#[test]
fn test_empty_skip_list() {
    let skip = SkipList::empty();
    assert!(skip.is_empty());
    assert_eq!(skip.reason_for(Path::new("a.js")), None);
}

#[test]
fn test_skip_list_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("fixtures.skip");
    fs::write(&path, "slow/**  # too slow for CI\n").unwrap();

    let skip = SkipList::load(&path).unwrap();
    assert_eq!(skip.len(), 1);

    let missing = SkipList::load(temp_dir.path().join("nope.skip")).unwrap_err();
    assert!(matches!(missing, ConfigError::Io { .. }));
}
