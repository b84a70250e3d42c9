#![forbid(unsafe_code)]

pub mod archive;
pub mod calc;
pub mod foundation;
pub mod progress;
pub mod scan;
pub mod session;

pub use archive::naming::{GroupKey, ParsedName, parse_artifact_name};
pub use archive::pipeline::{
    ArchiveGroup, ArchiveOpts, ArchivePipeline, ArchiveReport, GroupOutcome, group_files,
};
pub use archive::writer::{ArchiveStats, ArchiveWriter, ZipArchiveWriter};
pub use calc::expected::{ExpectedOutput, calculate_expected, expected_for_request};
pub use foundation::config::OrchestratorConfig;
pub use foundation::core::{display_path, format_size};
pub use foundation::error::{OverlordError, OverlordResult};
pub use progress::estimator::{Eta, ProgressSample, ProgressTracker, estimate_eta};
pub use progress::monitor::{ChannelSink, EventSink, InMemoryEventSink, SessionEvent};
pub use scan::scanner::{Artifact, ScanMode, ScanResult, Scanner, TreeStats};
pub use session::controller::{RenderSession, SessionController, SessionState, StartSummary};
pub use session::host::{LaunchCommand, SystemWorkerHost, WorkerHandle, WorkerHost};
pub use session::request::{JobDescriptor, RenderRequest};
