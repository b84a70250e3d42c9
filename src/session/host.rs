use crate::foundation::config::OrchestratorConfig;
use crate::foundation::core::display_path;
use crate::foundation::error::{OverlordError, OverlordResult};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// Fully-resolved command line for one renderer instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// 1-based instance identifier, distinct per worker of a session.
    pub instance: u32,
}

impl LaunchCommand {
    /// Build the renderer command line for worker `instance`.
    pub fn for_worker(cfg: &OrchestratorConfig, job_json: &str, instance: u32) -> Self {
        Self {
            program: cfg.renderer_executable.clone(),
            args: vec![
                "-scriptArg".to_string(),
                job_json.to_string(),
                "-instanceName".to_string(),
                instance.to_string(),
                "-logSize".to_string(),
                cfg.log_size_bytes.to_string(),
                "-headless".to_string(),
                "-noPrompt".to_string(),
                display_path(&cfg.driver_script),
            ],
            instance,
        }
    }
}

/// A launched worker. The controller never waits on it; it is only kept for termination.
#[derive(Debug)]
pub struct WorkerHandle {
    instance: u32,
    pid: Option<u32>,
    child: Option<Child>,
}

impl WorkerHandle {
    /// Handle owning the spawned child process.
    pub fn from_child(instance: u32, child: Child) -> Self {
        Self {
            instance,
            pid: Some(child.id()),
            child: Some(child),
        }
    }

    /// Handle without an owned process, e.g. on hosts that only track workers by name.
    pub fn detached(instance: u32, pid: Option<u32>) -> Self {
        Self {
            instance,
            pid,
            child: None,
        }
    }

    pub fn instance(&self) -> u32 {
        self.instance
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Take the owned child process, if any.
    pub fn take_child(&mut self) -> Option<Child> {
        self.child.take()
    }
}

/// OS-facing operations of a session: spawning, terminating and removing working directories.
pub trait WorkerHost: Send {
    /// Launch one worker without waiting for it.
    fn spawn(&mut self, cmd: &LaunchCommand) -> OverlordResult<WorkerHandle>;

    /// Terminate the given workers plus any process whose name contains one of
    /// `process_names`. Returns how many terminations were issued.
    fn terminate(&mut self, workers: Vec<WorkerHandle>, process_names: &[String]) -> usize;

    /// Remove a directory tree. A directory that does not exist counts as removed.
    fn remove_dir(&mut self, path: &Path) -> std::io::Result<()> {
        match std::fs::remove_dir_all(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// [`WorkerHost`] backed by real OS processes.
///
/// Spawned children are retained and killed by handle. The auxiliary render service is started by
/// the driver script rather than by us, so it can only be found by name: `taskkill` on Windows,
/// `pkill -f` elsewhere.
#[derive(Debug, Default)]
pub struct SystemWorkerHost;

impl SystemWorkerHost {
    pub fn new() -> Self {
        Self
    }
}

impl WorkerHost for SystemWorkerHost {
    fn spawn(&mut self, cmd: &LaunchCommand) -> OverlordResult<WorkerHandle> {
        let child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                OverlordError::launch(format!(
                    "failed to spawn '{}' (instance {}): {e}",
                    display_path(&cmd.program),
                    cmd.instance
                ))
            })?;
        tracing::info!(instance = cmd.instance, pid = child.id(), "worker launched");
        Ok(WorkerHandle::from_child(cmd.instance, child))
    }

    fn terminate(&mut self, workers: Vec<WorkerHandle>, process_names: &[String]) -> usize {
        let mut issued = 0usize;
        for mut worker in workers {
            let Some(mut child) = worker.take_child() else {
                continue;
            };
            match child.try_wait() {
                Ok(Some(status)) => {
                    tracing::debug!(instance = worker.instance(), %status, "worker already exited");
                    continue;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(instance = worker.instance(), "try_wait failed: {e}"),
            }
            match child.kill() {
                Ok(()) => {
                    issued += 1;
                    let _ = child.wait();
                    tracing::info!(instance = worker.instance(), "worker killed");
                }
                Err(e) => {
                    tracing::warn!(instance = worker.instance(), "failed to kill worker: {e}")
                }
            }
        }

        for name in process_names {
            if kill_by_name(name) {
                issued += 1;
            }
        }
        issued
    }
}

fn kill_by_name(name: &str) -> bool {
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("taskkill");
        c.args(["/F", "/T", "/IM"]).arg(format!("{name}*"));
        c
    } else {
        let mut c = Command::new("pkill");
        c.args(["-f", name]);
        c
    };
    match cmd.stdout(Stdio::null()).stderr(Stdio::null()).status() {
        Ok(status) if status.success() => {
            tracing::info!(process = name, "terminated by name");
            true
        }
        Ok(_) => {
            tracing::debug!(process = name, "no matching process");
            false
        }
        Err(e) => {
            tracing::warn!(process = name, "name-based termination unavailable: {e}");
            false
        }
    }
}
