use super::*;

fn parsed(prefix: &str, action: &str, rotation: &str) -> ParsedName {
    ParsedName::Parsed {
        prefix: prefix.to_string(),
        action: action.to_string(),
        rotation: rotation.to_string(),
    }
}

#[test]
fn strict_grammar() {
    assert_eq!(parse_artifact_name("hero-walk_045-0007"), parsed("hero", "walk", "045"));
    assert_eq!(parse_artifact_name("a-b_1-001"), parsed("a", "b", "1"));
    // The rotation may itself contain separators; the sequence is the last `-` segment.
    assert_eq!(
        parse_artifact_name("hero-run_090_shadow-12"),
        parsed("hero", "run", "090_shadow")
    );
    assert_eq!(parse_artifact_name("a-b-c_2-3"), parsed("a", "b-c", "2"));
}

#[test]
fn negative_rotation_keeps_its_sign() {
    assert_eq!(
        parse_artifact_name("woman_shadow-powerUp_-67.5-014"),
        parsed("woman_shadow", "powerUp", "-67.5")
    );
    let key = GroupKey::for_path(Path::new("woman_shadow-powerUp_-67.5-014.png"));
    assert_eq!(
        key.destination(Path::new("zips")),
        Path::new("zips/woman_shadow/powerUp/powerUp_-67.5.zip")
    );
}

#[test]
fn non_numeric_sequence_falls_back() {
    assert_eq!(
        parse_artifact_name("hero-walk_045-final"),
        ParsedName::Fallback {
            prefix: "hero".to_string(),
            action: "walk".to_string(),
            key: "hero-walk_045-final".to_string(),
            archive_name: "walk_045-final".to_string(),
        }
    );
}

#[test]
fn missing_underscore_uses_whole_remainder_as_action() {
    assert_eq!(
        parse_artifact_name("hero-idle"),
        ParsedName::Fallback {
            prefix: "hero".to_string(),
            action: "idle".to_string(),
            key: "hero-idle".to_string(),
            archive_name: "idle".to_string(),
        }
    );
}

#[test]
fn no_dash_is_single_fallback_keyed_by_stem() {
    assert_eq!(
        parse_artifact_name("thumbnail"),
        ParsedName::Fallback {
            prefix: "thumbnail".to_string(),
            action: UNKNOWN_ACTION.to_string(),
            key: "thumbnail".to_string(),
            archive_name: "thumbnail".to_string(),
        }
    );
}

#[test]
fn destination_layout() {
    let root = Path::new("zips");
    let key = GroupKey::for_path(Path::new("src/hero-walk_045-0007.png"));
    assert_eq!(key.destination(root), root.join("hero").join("walk").join("walk_045.zip"));

    let single = GroupKey::for_path(Path::new("thumbnail.png"));
    assert_eq!(
        single.destination(root),
        root.join("thumbnail").join("unknown").join("thumbnail.zip")
    );
    assert_eq!(single.to_string(), "thumbnail");
    assert_eq!(key.to_string(), "hero/walk/045");
}
