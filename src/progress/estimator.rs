use crate::scan::scanner::{Scanner, TreeStats};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Completion estimate attached to a [`ProgressSample`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Eta {
    /// Not enough recent artifacts to measure throughput yet.
    Calculating,
    /// Nothing remains to be rendered.
    Complete,
    /// Projected completion.
    At {
        remaining: Duration,
        completes_at: SystemTime,
    },
}

impl Eta {
    /// Remaining time as a short status string (`42 seconds`, `3.5 minutes`, `2.1 hours`).
    pub fn describe(&self) -> String {
        match self {
            Self::Calculating => "Calculating...".to_string(),
            Self::Complete => "Complete".to_string(),
            Self::At { remaining, .. } => {
                let secs = remaining.as_secs_f64();
                if secs < 60.0 {
                    format!("{secs:.0} seconds")
                } else if secs < 3600.0 {
                    format!("{:.1} minutes", secs / 60.0)
                } else {
                    format!("{:.1} hours", secs / 3600.0)
                }
            }
        }
    }
}

/// One observation of session progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressSample {
    /// Artifacts produced by this session (tree count minus the pre-session baseline).
    pub rendered: u64,
    /// Artifacts still expected from this session.
    pub remaining: u64,
    pub expected: u64,
    /// `rendered / expected` as a percentage in `[0, 100]`.
    pub percent: f64,
    /// Artifacts in the whole tree, including pre-existing ones.
    pub tree_artifacts: u64,
    pub tree_bytes: u64,
    pub eta: Eta,
}

impl ProgressSample {
    /// Derive session-relative counts from a tree snapshot. The ETA is filled in by the caller.
    pub fn from_tree(expected: u64, baseline: u64, tree: TreeStats, eta: Eta) -> Self {
        let rendered = tree.artifacts.saturating_sub(baseline);
        let remaining = expected.saturating_sub(rendered);
        let percent = if expected == 0 {
            100.0
        } else {
            (rendered as f64 / expected as f64 * 100.0).min(100.0)
        };
        Self {
            rendered,
            remaining,
            expected,
            percent,
            tree_artifacts: tree.artifacts,
            tree_bytes: tree.total_bytes,
            eta,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}

/// Trailing-window completion estimate.
///
/// `recent_created` holds creation times of the most recent artifacts of this session. The mean
/// gap between consecutive creations, times `remaining`, is projected forward from `now`.
/// Non-positive gaps (clock ties) are ignored; fewer than one usable gap yields
/// [`Eta::Calculating`].
pub fn estimate_eta(now: SystemTime, remaining: u64, recent_created: &[SystemTime]) -> Eta {
    if remaining == 0 {
        return Eta::Complete;
    }
    if recent_created.len() < 2 {
        return Eta::Calculating;
    }

    let mut times = recent_created.to_vec();
    times.sort_by(|a, b| b.cmp(a));

    let gaps: Vec<Duration> = times
        .windows(2)
        .filter_map(|w| w[0].duration_since(w[1]).ok())
        .filter(|d| !d.is_zero())
        .collect();
    if gaps.is_empty() {
        return Eta::Calculating;
    }

    let mean_secs = gaps.iter().map(Duration::as_secs_f64).sum::<f64>() / gaps.len() as f64;
    let Ok(remaining_time) = Duration::try_from_secs_f64(mean_secs * remaining as f64) else {
        return Eta::Calculating;
    };
    match now.checked_add(remaining_time) {
        Some(completes_at) => Eta::At {
            remaining: remaining_time,
            completes_at,
        },
        None => Eta::Calculating,
    }
}

/// Session-bound sampler: the immutable facts captured at session start plus a scanner.
#[derive(Clone, Debug)]
pub struct ProgressTracker {
    pub scanner: Scanner,
    pub output_dir: PathBuf,
    pub expected: u64,
    pub baseline: u64,
    pub started_at: SystemTime,
    pub eta_window: usize,
}

impl ProgressTracker {
    /// Scan the output tree and produce a sample.
    pub fn sample(&self) -> ProgressSample {
        let tree = self.scanner.stats(&self.output_dir);
        let mut sample = ProgressSample::from_tree(self.expected, self.baseline, tree, Eta::Complete);
        if !sample.is_complete() {
            let recent: Vec<SystemTime> = self
                .scanner
                .created_since(&self.output_dir, self.eta_window, self.started_at)
                .into_iter()
                .map(|a| a.created)
                .collect();
            sample.eta = estimate_eta(SystemTime::now(), sample.remaining, &recent);
        }
        sample
    }
}

#[cfg(test)]
#[path = "../../tests/unit/progress/estimator.rs"]
mod tests;
