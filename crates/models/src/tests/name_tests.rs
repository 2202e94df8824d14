use std::path::Path;

use crate::errors::ModelError;
use crate::name::PreferenceName;

#[test]
fn segments_are_joined_with_slash() -> anyhow::Result<()> {
    let name = PreferenceName::from_segments(["settings", "global.json"])?;
    assert_eq!(name.as_str(), "settings/global.json");
    assert_eq!(name.segments().collect::<Vec<_>>(), vec!["settings", "global.json"]);
    Ok(())
}

#[test]
fn nested_segment_is_split() -> anyhow::Result<()> {
    let name = PreferenceName::from_segments(["profiles/default", "window.json"])?;
    assert_eq!(name.as_str(), "profiles/default/window.json");
    Ok(())
}

#[test]
fn resolve_stays_under_root() -> anyhow::Result<()> {
    let name = PreferenceName::parse("a/b/c.json")?;
    let root = Path::new("/var/lib/app");
    let path = name.resolve(root);
    assert_eq!(path, root.join("a").join("b").join("c.json"));
    assert!(path.starts_with(root));
    Ok(())
}

#[test]
fn traversal_is_rejected() {
    for bad in ["../secret", "a/../../b", "./x", "a/./b"] {
        let err = PreferenceName::parse(bad).unwrap_err();
        assert!(matches!(err, ModelError::InvalidName { .. }), "{bad} should be rejected");
    }
}

#[test]
fn absolute_and_empty_names_are_rejected() {
    assert!(PreferenceName::parse("/etc/passwd").is_err());
    assert!(PreferenceName::parse("").is_err());
    assert!(PreferenceName::parse("a//b").is_err());
    assert!(PreferenceName::parse("a/").is_err());
    assert!(PreferenceName::from_segments(Vec::<&str>::new()).is_err());
}

#[test]
fn separators_and_drives_are_rejected() {
    assert!(PreferenceName::parse("a\\..\\b").is_err());
    assert!(PreferenceName::parse("C:/windows").is_err());
    assert!(PreferenceName::parse("nul\0byte").is_err());
}

#[test]
fn deserialization_validates() {
    let ok: Result<PreferenceName, _> = serde_json::from_str("\"settings.json\"");
    assert!(ok.is_ok());
    let bad: Result<PreferenceName, _> = serde_json::from_str("\"../settings.json\"");
    assert!(bad.is_err());
}
