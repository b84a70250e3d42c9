use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use overlord::{
    ArchiveOpts, ArchivePipeline, ChannelSink, OrchestratorConfig, RenderRequest, ScanMode,
    ScanResult, Scanner, SessionController, SessionEvent, display_path, expected_for_request,
    format_size,
};

#[derive(Parser, Debug)]
#[command(name = "overlord", version)]
struct Cli {
    /// Log at DEBUG instead of INFO.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the number of artifacts a request is expected to produce.
    Expected(ExpectedArgs),
    /// List the newest artifacts in a directory tree, or count them.
    Scan(ScanArgs),
    /// Run a render session until every expected artifact exists, Ctrl-C or the timeout.
    Render(RenderArgs),
    /// Group a flat directory of artifacts into archives.
    Archive(ArchiveArgs),
}

#[derive(Parser, Debug)]
struct ExpectedArgs {
    /// Render request JSON.
    #[arg(long)]
    request: PathBuf,
}

#[derive(Parser, Debug)]
struct ScanArgs {
    /// Root of the output tree.
    #[arg(long)]
    dir: PathBuf,

    /// Number of newest artifacts to list.
    #[arg(long, default_value_t = 100, conflicts_with = "count")]
    limit: usize,

    /// Print the artifact count and total size instead of a listing.
    #[arg(long)]
    count: bool,

    /// Artifact extension.
    #[arg(long, default_value = "png")]
    ext: String,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Render request JSON.
    #[arg(long)]
    request: PathBuf,

    /// Orchestrator config JSON. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop the session after this many seconds even if artifacts are still missing.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Parser, Debug)]
struct ArchiveArgs {
    /// Flat directory of finished artifacts.
    #[arg(long)]
    source: PathBuf,

    /// Root directory for the archives.
    #[arg(long)]
    out: PathBuf,

    /// Maximum concurrent archive writes.
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Delete source files once archived.
    #[arg(long)]
    delete_sources: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Expected(args) => cmd_expected(args),
        Command::Scan(args) => cmd_scan(args),
        Command::Render(args) => cmd_render(args),
        Command::Archive(args) => cmd_archive(args),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_expected(args: ExpectedArgs) -> anyhow::Result<()> {
    let request = RenderRequest::from_path(&args.request)?;
    let expected = expected_for_request(&request);
    println!("{}", expected.total);
    Ok(())
}

fn cmd_scan(args: ScanArgs) -> anyhow::Result<()> {
    let scanner = Scanner::new(&args.ext);
    if args.count {
        let stats = scanner.stats(&args.dir);
        println!("{} ({})", stats.artifacts, format_size(stats.total_bytes));
        return Ok(());
    }
    if let ScanResult::Artifacts(found) = scanner.scan(&args.dir, ScanMode::Newest(args.limit)) {
        for a in found {
            println!("{}\t{}", format_size(a.size), display_path(&a.path));
        }
    }
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let cfg = match &args.config {
        Some(path) => OrchestratorConfig::from_path(path)?,
        None => OrchestratorConfig::default(),
    };
    let request = RenderRequest::from_path(&args.request)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("install Ctrl-C handler")?;

    let (sink, rx) = ChannelSink::new();
    let mut controller = SessionController::with_system_host(cfg, Arc::new(sink))?;
    let summary = controller.start(&request)?;
    eprintln!(
        "launched {} worker(s) ({} more queued), expecting {} artifact(s) ({} already present)",
        summary.workers_launched,
        summary.workers_pending,
        summary.expected.total,
        summary.baseline
    );

    let timeout = args.timeout_secs.map(Duration::from_secs);
    let outcome = wait_for_session(&rx, &interrupted, timeout, print_event);
    match outcome {
        WaitOutcome::Complete => eprintln!("all expected artifacts present"),
        WaitOutcome::Interrupted => eprintln!("interrupted, stopping"),
        WaitOutcome::TimedOut => eprintln!("timed out, stopping"),
        WaitOutcome::Disconnected => eprintln!("progress loop ended, stopping"),
    }

    controller.stop().context("stop render session")?;
    if outcome != WaitOutcome::Complete {
        anyhow::bail!("render session ended before completion");
    }
    Ok(())
}

const EVENT_POLL: Duration = Duration::from_millis(200);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WaitOutcome {
    Complete,
    Interrupted,
    TimedOut,
    Disconnected,
}

/// Drain session events until a complete progress sample arrives, `interrupted` is set or
/// `timeout` passes.
fn wait_for_session(
    rx: &Receiver<SessionEvent>,
    interrupted: &AtomicBool,
    timeout: Option<Duration>,
    mut on_event: impl FnMut(&SessionEvent),
) -> WaitOutcome {
    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        if interrupted.load(Ordering::SeqCst) {
            return WaitOutcome::Interrupted;
        }
        let wait = match deadline {
            Some(d) => match d.checked_duration_since(Instant::now()) {
                Some(left) if !left.is_zero() => left.min(EVENT_POLL),
                _ => return WaitOutcome::TimedOut,
            },
            None => EVENT_POLL,
        };
        match rx.recv_timeout(wait) {
            Ok(event) => {
                on_event(&event);
                if let SessionEvent::Progress(sample) = &event
                    && sample.is_complete()
                {
                    return WaitOutcome::Complete;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return WaitOutcome::Disconnected,
        }
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Progress(sample) => eprintln!(
            "{}/{} ({:.1}%), {} on disk, eta {}",
            sample.rendered,
            sample.expected,
            sample.percent,
            format_size(sample.tree_bytes),
            sample.eta.describe()
        ),
        SessionEvent::ArtifactUpdated(a) => eprintln!("latest: {}", display_path(&a.path)),
        SessionEvent::NoArtifacts => eprintln!("no artifacts yet"),
    }
}

fn cmd_archive(args: ArchiveArgs) -> anyhow::Result<()> {
    let mut opts = ArchiveOpts::new(&args.out);
    if let Some(n) = args.max_concurrent {
        opts.max_concurrent = n;
    }
    opts.delete_sources = args.delete_sources;

    let pipeline = ArchivePipeline::new(opts)?;
    let report = pipeline.run(&args.source)?;
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(stats) => println!(
                "ok\t{}\t{} file(s)\t{}",
                display_path(&outcome.destination),
                stats.files,
                format_size(stats.bytes)
            ),
            Err(e) => println!("failed\t{}\t{e}", display_path(&outcome.destination)),
        }
    }
    println!("{} of {} group(s) archived", report.completed, report.outcomes.len());

    if report.failed() > 0 {
        anyhow::bail!("{} archive group(s) failed", report.failed());
    }
    Ok(())
}
