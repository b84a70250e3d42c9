use crate::calc::expected::{ExpectedOutput, expected_for_request};
use crate::foundation::config::OrchestratorConfig;
use crate::foundation::core::display_path;
use crate::foundation::error::{OverlordError, OverlordResult};
use crate::foundation::ticker::Ticker;
use crate::progress::estimator::{ProgressSample, ProgressTracker};
use crate::progress::monitor::{EventSink, spawn_preview_loop, spawn_progress_loop};
use crate::scan::scanner::Scanner;
use crate::session::cleanup::{RetryPolicy, remove_dir_with_retry};
use crate::session::host::{LaunchCommand, SystemWorkerHost, WorkerHandle, WorkerHost};
use crate::session::request::{JobDescriptor, RenderRequest};
use anyhow::Context;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

type SharedHost = Arc<Mutex<Box<dyn WorkerHost>>>;
type SharedWorkers = Arc<Mutex<Vec<WorkerHandle>>>;

fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lifecycle of a render session.
///
/// `Idle -> Rendering -> Stopping -> Idle`; no other transition exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Rendering,
    Stopping,
}

impl SessionState {
    fn can_become(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Rendering)
                | (Self::Rendering, Self::Stopping)
                | (Self::Stopping, Self::Idle)
        )
    }
}

/// Facts about the active session. Reset on stop.
#[derive(Debug)]
pub struct RenderSession {
    state: SessionState,
    started_at: Option<SystemTime>,
    output_dir: Option<PathBuf>,
    expected: Option<ExpectedOutput>,
    baseline: u64,
    workers: SharedWorkers,
}

impl RenderSession {
    fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            started_at: None,
            output_dir: None,
            expected: None,
            baseline: 0,
            workers: Arc::default(),
        }
    }

    fn transition(&mut self, next: SessionState) -> OverlordResult<()> {
        if !self.state.can_become(next) {
            return Err(OverlordError::validation(format!(
                "invalid session transition {:?} -> {next:?}",
                self.state
            )));
        }
        tracing::debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn expected(&self) -> Option<&ExpectedOutput> {
        self.expected.as_ref()
    }

    /// Artifacts already present in the output tree when the session started.
    pub fn baseline(&self) -> u64 {
        self.baseline
    }

    /// Workers launched so far, including any started by the background launcher.
    pub fn worker_count(&self) -> usize {
        lock(&self.workers).len()
    }
}

/// What a successful [`SessionController::start`] launched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartSummary {
    pub expected: ExpectedOutput,
    pub baseline: u64,
    /// Workers running when `start` returned.
    pub workers_launched: u32,
    /// Workers still queued on the launcher thread.
    pub workers_pending: u32,
}

/// Owns the session state machine, the sampling loops and the worker host.
pub struct SessionController {
    cfg: OrchestratorConfig,
    scanner: Scanner,
    host: SharedHost,
    sink: Arc<dyn EventSink>,
    session: RenderSession,
    launcher: Option<Ticker>,
    progress_loop: Option<Ticker>,
    preview_loop: Option<(PathBuf, Ticker)>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session", &self.session)
            .field("launcher", &self.launcher.is_some())
            .field("progress_loop", &self.progress_loop.is_some())
            .field("preview_loop", &self.preview_loop.as_ref().map(|(p, _)| p))
            .finish_non_exhaustive()
    }
}

impl SessionController {
    pub fn new(
        cfg: OrchestratorConfig,
        host: Box<dyn WorkerHost>,
        sink: Arc<dyn EventSink>,
    ) -> OverlordResult<Self> {
        cfg.validate()?;
        Ok(Self {
            scanner: Scanner::from_config(&cfg),
            cfg,
            host: Arc::new(Mutex::new(host)),
            sink,
            session: RenderSession::idle(),
            launcher: None,
            progress_loop: None,
            preview_loop: None,
        })
    }

    /// Controller driving real OS processes.
    pub fn with_system_host(cfg: OrchestratorConfig, sink: Arc<dyn EventSink>) -> OverlordResult<Self> {
        Self::new(cfg, Box::new(SystemWorkerHost::new()), sink)
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.cfg
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn session(&self) -> &RenderSession {
        &self.session
    }

    /// Whether workers after the first are still being launched.
    pub fn is_launching(&self) -> bool {
        self.launcher.as_ref().is_some_and(Ticker::is_running)
    }

    /// Whether the progress loop is running.
    pub fn is_sampling(&self) -> bool {
        self.progress_loop.as_ref().is_some_and(Ticker::is_running)
    }

    /// Whether the preview loop is running.
    pub fn is_previewing(&self) -> bool {
        self.preview_loop
            .as_ref()
            .is_some_and(|(_, t)| t.is_running())
    }

    /// Start (or retarget) the preview loop on `output_dir`. Allowed in any state.
    pub fn watch_preview(&mut self, output_dir: impl Into<PathBuf>) -> OverlordResult<()> {
        let output_dir = output_dir.into();
        if let Some((current, ticker)) = &self.preview_loop
            && *current == output_dir
            && ticker.is_running()
        {
            return Ok(());
        }
        if let Some((_, mut old)) = self.preview_loop.take() {
            old.cancel();
        }
        let ticker = spawn_preview_loop(
            self.scanner.clone(),
            output_dir.clone(),
            self.cfg.preview_interval(),
            self.sink.clone(),
        )?;
        self.preview_loop = Some((output_dir, ticker));
        Ok(())
    }

    /// One progress observation of the active session, for callers that poll instead of
    /// listening to the sink. `None` while idle.
    pub fn sample(&self) -> Option<ProgressSample> {
        self.tracker().map(|t| t.sample())
    }

    fn tracker(&self) -> Option<ProgressTracker> {
        if self.session.state != SessionState::Rendering {
            return None;
        }
        Some(ProgressTracker {
            scanner: self.scanner.clone(),
            output_dir: self.session.output_dir.clone()?,
            expected: self.session.expected.as_ref()?.total,
            baseline: self.session.baseline,
            started_at: self.session.started_at?,
            eta_window: self.cfg.eta_window,
        })
    }

    /// Validate `request`, launch its first worker and begin sampling.
    ///
    /// The session only becomes `Rendering` once the first worker is launched. If that first
    /// launch fails the session stays `Idle` and the error is returned. The remaining workers are
    /// launched `launch_delay` apart on a background thread, so this returns without waiting
    /// for them; their failures are logged and do not stop the others.
    #[tracing::instrument(skip(self, request), fields(output_dir = %display_path(&request.output_dir)))]
    pub fn start(&mut self, request: &RenderRequest) -> OverlordResult<StartSummary> {
        if self.session.state != SessionState::Idle {
            return Err(OverlordError::already_running(format!(
                "session is {:?}",
                self.session.state
            )));
        }
        request.validate()?;
        request.validate_files()?;
        self.check_executables()?;

        let started_at = SystemTime::now();
        let baseline = self.scanner.count(&request.output_dir);
        let expected = expected_for_request(request);

        for dir in [&request.output_dir, &self.cfg.results_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create directory '{}'", display_path(dir)))?;
        }
        let job_json = JobDescriptor::new(request, &self.cfg).to_json()?;

        tracing::info!(
            workers = request.worker_count,
            expected = expected.total,
            baseline,
            "starting render session"
        );

        let first = LaunchCommand::for_worker(&self.cfg, &job_json, 1);
        let handle = lock(&self.host).spawn(&first).inspect_err(|e| {
            tracing::error!(instance = 1, "first worker failed to launch: {e}");
        })?;

        self.session.transition(SessionState::Rendering)?;
        self.session.started_at = Some(started_at);
        self.session.output_dir = Some(request.output_dir.clone());
        self.session.expected = Some(expected.clone());
        self.session.baseline = baseline;
        self.session.workers = Arc::new(Mutex::new(vec![handle]));

        let workers_pending = request.worker_count - 1;
        if workers_pending > 0 {
            self.launcher = Some(self.spawn_launcher(job_json, request.worker_count)?);
        }

        if let Some(tracker) = self.tracker() {
            let ticker = spawn_progress_loop(tracker, self.cfg.progress_interval(), self.sink.clone())?;
            self.progress_loop = Some(ticker);
        }
        self.watch_preview(request.output_dir.clone())?;

        Ok(StartSummary {
            expected,
            baseline,
            workers_launched: 1,
            workers_pending,
        })
    }

    /// Launch instances `2..=last`, one per `launch_delay`, then exit.
    fn spawn_launcher(&self, job_json: String, last: u32) -> OverlordResult<Ticker> {
        let cfg = self.cfg.clone();
        let host = Arc::clone(&self.host);
        let workers = Arc::clone(&self.session.workers);
        let mut instance = 2;
        Ticker::spawn_delayed("overlord-launcher", self.cfg.launch_delay(), move || {
            let cmd = LaunchCommand::for_worker(&cfg, &job_json, instance);
            match lock(&host).spawn(&cmd) {
                Ok(handle) => lock(&workers).push(handle),
                Err(e) => tracing::error!(instance, "worker failed to launch: {e}"),
            }
            instance += 1;
            if instance > last {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    /// Stop the active session: cancel pending launches and sampling, terminate workers and the
    /// render service, then remove the service working directory.
    ///
    /// The session always ends `Idle`. A directory that outlives the retry budget is returned as
    /// [`OverlordError::DirectoryCleanup`]. Calling this while idle is a no-op.
    #[tracing::instrument(skip(self))]
    pub fn stop(&mut self) -> OverlordResult<()> {
        if self.session.state == SessionState::Idle {
            tracing::debug!("stop requested while idle");
            return Ok(());
        }
        self.session.transition(SessionState::Stopping)?;
        self.cancel_loops();

        let workers = std::mem::take(&mut *lock(&self.session.workers));
        let names = self.cfg.all_process_names();
        let mut host = lock(&self.host);
        let issued = host.terminate(workers, &names);
        tracing::info!(terminations = issued, "workers terminated");

        let policy = RetryPolicy::new(self.cfg.cleanup_attempts, self.cfg.cleanup_backoff());
        let cleanup = remove_dir_with_retry(&self.cfg.service_work_dir, policy, |p| host.remove_dir(p));
        drop(host);
        if let Err(e) = &cleanup {
            tracing::error!("{e}");
        }

        self.session = RenderSession {
            state: SessionState::Stopping,
            ..RenderSession::idle()
        };
        self.session.transition(SessionState::Idle)?;
        cleanup.map(|_| ())
    }

    fn check_executables(&self) -> OverlordResult<()> {
        for (what, path) in [
            ("renderer", &self.cfg.renderer_executable),
            ("driver script", &self.cfg.driver_script),
        ] {
            if !path.is_file() {
                return Err(OverlordError::executable_not_found(format!(
                    "{what} '{}'",
                    display_path(path)
                )));
            }
        }
        Ok(())
    }

    fn cancel_loops(&mut self) {
        if let Some(mut t) = self.launcher.take() {
            t.cancel();
        }
        if let Some(mut t) = self.progress_loop.take() {
            t.cancel();
        }
        if let Some((_, mut t)) = self.preview_loop.take() {
            t.cancel();
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.cancel_loops();
    }
}
