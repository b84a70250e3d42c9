use crate::foundation::config::OrchestratorConfig;
use crate::foundation::core::display_path;
use crate::foundation::error::{OverlordError, OverlordResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Everything a caller supplies to start one render session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderRequest {
    /// Subject descriptor (required).
    pub subject: PathBuf,
    /// Animation descriptors, in render order (at least one required).
    pub animations: Vec<PathBuf>,
    /// Optional prop animation descriptors.
    pub prop_animations: Vec<PathBuf>,
    /// Optional gear descriptors; each one multiplies the artifact count.
    pub gear: Vec<PathBuf>,
    /// Optional gear animation descriptors.
    pub gear_animations: Vec<PathBuf>,
    /// Shared output tree the workers write artifacts into (required).
    pub output_dir: PathBuf,
    /// Number of parallel renderer instances.
    pub worker_count: u32,
    /// Frames per second for animated renders.
    pub frame_rate: u32,
    /// Render a shadow variant of every artifact.
    pub render_shadows: bool,
    /// Render cache size, in GB, above which the service flushes its cache.
    pub cache_size_threshold_gb: u32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            subject: PathBuf::new(),
            animations: Vec::new(),
            prop_animations: Vec::new(),
            gear: Vec::new(),
            gear_animations: Vec::new(),
            output_dir: PathBuf::new(),
            worker_count: 1,
            frame_rate: 30,
            render_shadows: true,
            cache_size_threshold_gb: 10,
        }
    }
}

impl RenderRequest {
    /// Parse a request from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> OverlordResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| OverlordError::serde(format!("parse render request JSON: {e}")))
    }

    /// Parse a request from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> OverlordResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            OverlordError::validation(format!(
                "open render request JSON '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Check the required fields are present and the counts are usable.
    pub fn validate(&self) -> OverlordResult<()> {
        if is_blank(&self.subject) {
            return Err(OverlordError::validation("a subject descriptor is required"));
        }
        if self.animations().next().is_none() {
            return Err(OverlordError::validation(
                "at least one animation descriptor is required",
            ));
        }
        if is_blank(&self.output_dir) {
            return Err(OverlordError::validation("an output directory is required"));
        }
        if self.worker_count == 0 {
            return Err(OverlordError::validation("worker_count must be >= 1"));
        }
        if self.frame_rate == 0 {
            return Err(OverlordError::validation("frame_rate must be >= 1"));
        }
        Ok(())
    }

    /// Check every named descriptor is an existing `.duf` file.
    ///
    /// All problems are collected into one [`OverlordError::Validation`].
    pub fn validate_files(&self) -> OverlordResult<()> {
        let mut missing = Vec::new();
        let mut not_duf = Vec::new();
        for (role, path) in self.descriptors() {
            if !path.is_file() {
                missing.push(format!("{role} '{}'", display_path(path)));
            } else if !has_duf_extension(path) {
                not_duf.push(format!("{role} '{}'", display_path(path)));
            }
        }

        let mut parts = Vec::new();
        if !missing.is_empty() {
            parts.push(format!("missing: {}", missing.join(", ")));
        }
        if !not_duf.is_empty() {
            parts.push(format!("not .duf files: {}", not_duf.join(", ")));
        }
        if parts.is_empty() {
            Ok(())
        } else {
            Err(OverlordError::validation(parts.join("; ")))
        }
    }

    /// Every non-blank descriptor path with its role.
    fn descriptors(&self) -> impl Iterator<Item = (&'static str, &PathBuf)> {
        let lists = [
            ("subject", std::slice::from_ref(&self.subject)),
            ("animation", self.animations.as_slice()),
            ("prop animation", self.prop_animations.as_slice()),
            ("gear", self.gear.as_slice()),
            ("gear animation", self.gear_animations.as_slice()),
        ];
        lists
            .into_iter()
            .flat_map(|(role, paths)| paths.iter().map(move |p| (role, p)))
            .filter(|(_, p)| !is_blank(p))
    }

    /// Non-empty animation paths.
    pub fn animations(&self) -> impl Iterator<Item = &PathBuf> {
        self.animations.iter().filter(|p| !is_blank(p))
    }

    /// Non-empty gear paths.
    pub fn gear(&self) -> impl Iterator<Item = &PathBuf> {
        self.gear.iter().filter(|p| !is_blank(p))
    }
}

fn is_blank(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}

fn has_duf_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case("duf"))
}

fn path_list<'a>(paths: impl Iterator<Item = &'a PathBuf>) -> Vec<String> {
    paths
        .filter(|p| !is_blank(p))
        .map(|p| display_path(p))
        .collect()
}

/// Serialized job description handed to every worker on its command line.
///
/// Key names and the string encoding of numeric settings are what the driver script reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub num_instances: String,
    pub image_output_dir: String,
    pub frame_rate: String,
    pub subject_file: String,
    pub animations: Vec<String>,
    pub prop_animations: Vec<String>,
    pub gear: Vec<String>,
    pub gear_animations: Vec<String>,
    pub template_path: String,
    pub render_shadows: bool,
    pub results_directory_path: String,
    pub cache_db_size_threshold_gb: String,
}

impl JobDescriptor {
    /// Combine a request with the resolved paths from `cfg`.
    pub fn new(request: &RenderRequest, cfg: &OrchestratorConfig) -> Self {
        Self {
            num_instances: request.worker_count.to_string(),
            image_output_dir: display_path(&request.output_dir),
            frame_rate: request.frame_rate.to_string(),
            subject_file: display_path(&request.subject),
            animations: path_list(request.animations.iter()),
            prop_animations: path_list(request.prop_animations.iter()),
            gear: path_list(request.gear.iter()),
            gear_animations: path_list(request.gear_animations.iter()),
            template_path: display_path(&cfg.template_path),
            render_shadows: request.render_shadows,
            results_directory_path: display_path(&cfg.results_dir),
            cache_db_size_threshold_gb: request.cache_size_threshold_gb.to_string(),
        }
    }

    /// Compact JSON form passed as the worker's script argument.
    pub fn to_json(&self) -> OverlordResult<String> {
        serde_json::to_string(self)
            .map_err(|e| OverlordError::serde(format!("serialize job descriptor: {e}")))
    }
}
