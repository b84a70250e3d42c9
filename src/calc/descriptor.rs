use crate::foundation::error::{OverlordError, OverlordResult};
use serde_json::Value;
use std::path::Path;

/// Read a descriptor document as JSON.
///
/// Descriptor exporters may prepend a non-JSON header, so parsing starts at the first `{`.
pub fn read_descriptor(path: &Path) -> OverlordResult<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        OverlordError::descriptor_read(format!("read '{}': {e}", path.display()))
    })?;
    let start = content.find('{').ok_or_else(|| {
        OverlordError::descriptor_read(format!("'{}' contains no JSON object", path.display()))
    })?;
    serde_json::from_str(&content[start..]).map_err(|e| {
        OverlordError::descriptor_read(format!("parse '{}': {e}", path.display()))
    })
}

/// Angle count declared by a subject descriptor at `asset_info.angles`.
///
/// Only a positive integer is accepted; anything else is a [`OverlordError::DescriptorRead`].
pub fn subject_angles(path: &Path) -> OverlordResult<u32> {
    let doc = read_descriptor(path)?;
    let raw = doc.pointer("/asset_info/angles").ok_or_else(|| {
        OverlordError::descriptor_read(format!(
            "'{}' has no asset_info.angles attribute",
            path.display()
        ))
    })?;
    raw.as_u64()
        .filter(|&n| n > 0)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| {
            OverlordError::descriptor_read(format!(
                "'{}' asset_info.angles is not a positive integer: {raw}",
                path.display()
            ))
        })
}

/// Longest keyframe array found under `scene.animations[*].keys`, if any.
///
/// `Ok(None)` means the document was readable but carries no keyframes (a static pose).
pub fn animation_frames(path: &Path) -> OverlordResult<Option<u32>> {
    let doc = read_descriptor(path)?;
    Ok(longest_keyframe_array(&doc))
}

fn longest_keyframe_array(doc: &Value) -> Option<u32> {
    let animations = doc.pointer("/scene/animations")?.as_array()?;
    animations
        .iter()
        .filter_map(|anim| anim.get("keys")?.as_array().map(Vec::len))
        .max()
        .filter(|&n| n > 0)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
}
