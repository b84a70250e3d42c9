use super::*;
use std::path::PathBuf;

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, body).unwrap();
    p
}

fn animation_with_keys(dir: &Path, name: &str, keys: usize) -> PathBuf {
    let keys: Vec<serde_json::Value> = (0..keys).map(|i| serde_json::json!([i, 0.0])).collect();
    let doc = serde_json::json!({ "scene": { "animations": [ { "keys": keys } ] } });
    write(dir, name, &doc.to_string())
}

#[test]
fn defaults_when_subject_has_no_angles_and_animation_is_static() {
    let dir = tempfile::tempdir().unwrap();
    let subject = write(dir.path(), "subject.duf", r#"{ "asset_info": {} }"#);
    let anim = animation_with_keys(dir.path(), "pose.duf", 1);

    let plain = calculate_expected(&subject, std::slice::from_ref(&anim), &[], false);
    assert_eq!(plain.angles, DEFAULT_ANGLES);
    assert_eq!(plain.frames, vec![1]);
    assert_eq!(plain.gear_multiplier, 1);
    assert_eq!(plain.total, 16);

    let shadow = calculate_expected(&subject, &[anim], &[], true);
    assert_eq!(shadow.total, 32);
}

#[test]
fn shadow_variant_doubles_the_count() {
    let dir = tempfile::tempdir().unwrap();
    let subject = write(dir.path(), "subject.duf", r#"{ "asset_info": { "angles": 8 } }"#);
    let anim = animation_with_keys(dir.path(), "walk.duf", 24);
    let gear = vec![PathBuf::from("g1.duf"), PathBuf::from("g2.duf")];

    let without = calculate_expected(&subject, std::slice::from_ref(&anim), &gear, false);
    let with = calculate_expected(&subject, &[anim], &gear, true);
    assert_eq!(without.total, 8 * 24 * 2);
    assert_eq!(with.total, 2 * without.total);
}

#[test]
fn frames_sum_across_animations() {
    let dir = tempfile::tempdir().unwrap();
    let subject = write(dir.path(), "subject.duf", r#"{ "asset_info": { "angles": 4 } }"#);
    let a = animation_with_keys(dir.path(), "a.duf", 10);
    let b = animation_with_keys(dir.path(), "b.duf", 5);

    let out = calculate_expected(&subject, &[a, b], &[], false);
    assert_eq!(out.frames, vec![10, 5]);
    assert_eq!(out.total, 4 * 15);
}

#[test]
fn malformed_descriptors_fall_back_without_aborting() {
    let dir = tempfile::tempdir().unwrap();
    let subject = write(dir.path(), "subject.duf", "not json at all");
    let broken = write(dir.path(), "broken.duf", "{ \"scene\": ");
    let missing = dir.path().join("missing.duf");
    let good = animation_with_keys(dir.path(), "good.duf", 7);

    let out = calculate_expected(&subject, &[broken, missing, good], &[], false);
    assert_eq!(out.angles, DEFAULT_ANGLES);
    assert_eq!(out.frames, vec![1, 1, 7]);
    assert_eq!(out.total, 16 * 9);
}

#[test]
fn blank_gear_entries_are_not_counted() {
    let dir = tempfile::tempdir().unwrap();
    let subject = write(dir.path(), "subject.duf", r#"{ "asset_info": { "angles": 2 } }"#);
    let anim = animation_with_keys(dir.path(), "a.duf", 3);
    let gear = vec![PathBuf::from(" "), PathBuf::from("hat.duf"), PathBuf::new()];

    let out = calculate_expected(&subject, &[anim], &gear, false);
    assert_eq!(out.gear_multiplier, 1);
    assert_eq!(out.total, 6);
}

#[test]
fn request_wrapper_skips_blank_animations() {
    let dir = tempfile::tempdir().unwrap();
    let subject = write(dir.path(), "subject.duf", r#"{ "asset_info": { "angles": 3 } }"#);
    let anim = animation_with_keys(dir.path(), "a.duf", 4);
    let request = RenderRequest {
        subject,
        animations: vec![PathBuf::new(), anim],
        render_shadows: false,
        ..Default::default()
    };
    assert_eq!(expected_for_request(&request).total, 12);
}
