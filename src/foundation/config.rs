use crate::foundation::core::{app_data_dir, local_app_data_dir};
use crate::foundation::error::{OverlordError, OverlordResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tunables for the session controller, scanner and sampling loops.
///
/// Every field has a default, so a JSON config file only needs the values it overrides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub renderer_executable: PathBuf,
    pub driver_script: PathBuf,
    pub template_path: PathBuf,
    pub results_dir: PathBuf,
    /// Force-removed on stop.
    pub service_work_dir: PathBuf,
    pub renderer_process_names: Vec<String>,
    pub service_process_names: Vec<String>,
    /// Artifact file extension, matched case-insensitively, without the dot.
    pub artifact_extension: String,
    pub log_size_bytes: u64,
    pub launch_delay_ms: u64,
    pub progress_interval_ms: u64,
    pub preview_interval_ms: u64,
    /// Newest artifacts used for the ETA.
    pub eta_window: usize,
    pub newest_limit: usize,
    pub cleanup_attempts: u32,
    pub cleanup_backoff_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let roaming = app_data_dir();
        let local = local_app_data_dir();
        let service_work_dir = local.join("IrayServer");
        Self {
            renderer_executable: default_renderer_executable(),
            driver_script: roaming.join("scripts").join("masterRenderer.dsa"),
            template_path: roaming.join("templates").join("masterTemplate.duf"),
            results_dir: service_work_dir.join("results").join("admin"),
            service_work_dir,
            renderer_process_names: vec!["DAZStudio".to_string()],
            service_process_names: vec![
                "iray_server".to_string(),
                "iray_server_worker".to_string(),
            ],
            artifact_extension: "png".to_string(),
            log_size_bytes: 100_000_000,
            launch_delay_ms: 5_000,
            progress_interval_ms: 2_000,
            preview_interval_ms: 5_000,
            eta_window: 10,
            newest_limit: 100,
            cleanup_attempts: 5,
            cleanup_backoff_ms: 1_000,
        }
    }
}

impl OrchestratorConfig {
    /// Parse a config from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> OverlordResult<Self> {
        let cfg: Self = serde_json::from_reader(r)
            .map_err(|e| OverlordError::serde(format!("parse config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a config from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> OverlordResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            OverlordError::validation(format!("open config JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Reject values the sampling loops and cleanup cannot work with.
    pub fn validate(&self) -> OverlordResult<()> {
        if self.progress_interval_ms == 0 || self.preview_interval_ms == 0 {
            return Err(OverlordError::validation(
                "sampling intervals must be non-zero",
            ));
        }
        if self.artifact_extension.trim_start_matches('.').is_empty() {
            return Err(OverlordError::validation(
                "artifact_extension must be non-empty",
            ));
        }
        if self.eta_window < 2 {
            return Err(OverlordError::validation("eta_window must be >= 2"));
        }
        if self.newest_limit == 0 {
            return Err(OverlordError::validation("newest_limit must be >= 1"));
        }
        if self.cleanup_attempts == 0 {
            return Err(OverlordError::validation("cleanup_attempts must be >= 1"));
        }
        Ok(())
    }

    /// Extension without a leading dot, lowercased.
    pub fn normalized_extension(&self) -> String {
        self.artifact_extension
            .trim_start_matches('.')
            .to_ascii_lowercase()
    }

    /// All process-name fragments terminated on stop.
    pub fn all_process_names(&self) -> Vec<String> {
        self.renderer_process_names
            .iter()
            .chain(self.service_process_names.iter())
            .cloned()
            .collect()
    }

    pub fn launch_delay(&self) -> Duration {
        Duration::from_millis(self.launch_delay_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn preview_interval(&self) -> Duration {
        Duration::from_millis(self.preview_interval_ms)
    }

    pub fn cleanup_backoff(&self) -> Duration {
        Duration::from_millis(self.cleanup_backoff_ms)
    }
}

fn default_renderer_executable() -> PathBuf {
    if cfg!(windows) {
        let program_files = std::env::var_os("ProgramFiles")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("C:\\Program Files"));
        program_files
            .join("DAZ 3D")
            .join("DAZStudio4")
            .join("DAZStudio.exe")
    } else {
        PathBuf::from("/opt/DAZ 3D/DAZStudio4/DAZStudio")
    }
}
