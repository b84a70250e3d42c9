use crate::calc::descriptor::{animation_frames, subject_angles};
use crate::foundation::core::display_path;
use crate::session::request::RenderRequest;
use std::path::{Path, PathBuf};

/// Angle count used when the subject descriptor does not provide one.
pub const DEFAULT_ANGLES: u32 = 16;
/// Frame count used for static poses and unreadable animation descriptors.
pub const DEFAULT_FRAMES: u32 = 1;

/// Breakdown of the artifact count a job is expected to produce.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpectedOutput {
    pub angles: u32,
    /// Frame count per animation, in request order.
    pub frames: Vec<u32>,
    /// Number of non-empty gear paths, or 1 when there are none.
    pub gear_multiplier: u32,
    pub shadow_variant: bool,
    /// `angles * sum(frames) * gear_multiplier`, doubled for the shadow variant.
    pub total: u64,
}

/// Compute the expected artifact count for a request.
pub fn expected_for_request(request: &RenderRequest) -> ExpectedOutput {
    let animations: Vec<PathBuf> = request.animations().cloned().collect();
    let gear: Vec<PathBuf> = request.gear().cloned().collect();
    calculate_expected(
        &request.subject,
        &animations,
        &gear,
        request.render_shadows,
    )
}

/// Compute `angles × Σ frames × gear`, doubled when `shadow_variant` is set.
///
/// Never fails: a malformed or missing descriptor logs a warning and its default is used. An
/// empty animation list counts as a single static render.
#[tracing::instrument(skip(animations, gear), fields(animations = animations.len(), gear = gear.len()))]
pub fn calculate_expected(
    subject: &Path,
    animations: &[PathBuf],
    gear: &[PathBuf],
    shadow_variant: bool,
) -> ExpectedOutput {
    let angles = match subject_angles(subject) {
        Ok(n) => {
            tracing::info!(subject = %display_path(subject), angles = n, "subject angles");
            n
        }
        Err(e) => {
            tracing::warn!(
                subject = %display_path(subject),
                default = DEFAULT_ANGLES,
                "{e}; using default angle count"
            );
            DEFAULT_ANGLES
        }
    };

    let frames: Vec<u32> = if animations.is_empty() {
        tracing::info!("no animations specified, counting one static frame");
        vec![DEFAULT_FRAMES]
    } else {
        animations.iter().map(|a| frames_for(a)).collect()
    };

    let gear_count = gear
        .iter()
        .filter(|g| !g.as_os_str().to_string_lossy().trim().is_empty())
        .count();
    let gear_multiplier = u32::try_from(gear_count).unwrap_or(u32::MAX).max(1);

    let frame_sum: u64 = frames.iter().map(|&f| u64::from(f)).sum();
    let mut total = u64::from(angles)
        .saturating_mul(frame_sum)
        .saturating_mul(u64::from(gear_multiplier));
    if shadow_variant {
        total = total.saturating_mul(2);
    }

    tracing::info!(
        angles,
        frame_sum,
        gear_multiplier,
        shadow_variant,
        total,
        "expected artifact count"
    );

    ExpectedOutput {
        angles,
        frames,
        gear_multiplier,
        shadow_variant,
        total,
    }
}

fn frames_for(animation: &Path) -> u32 {
    match animation_frames(animation) {
        Ok(Some(n)) => {
            tracing::debug!(animation = %display_path(animation), frames = n, "animation frames");
            n
        }
        Ok(None) => {
            tracing::debug!(
                animation = %display_path(animation),
                "no keyframes found, counting one frame"
            );
            DEFAULT_FRAMES
        }
        Err(e) => {
            tracing::warn!(
                animation = %display_path(animation),
                default = DEFAULT_FRAMES,
                "{e}; using default frame count"
            );
            DEFAULT_FRAMES
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/calc/expected.rs"]
mod tests;
