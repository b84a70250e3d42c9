use super::*;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
enum WriteEvent {
    Start(String),
    End(String),
}

/// Writer that records concurrency and call order, and can be told to fail specific destinations.
#[derive(Default)]
struct RecordingWriter {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_names: Vec<String>,
    written: Mutex<Vec<PathBuf>>,
    events: Mutex<Vec<WriteEvent>>,
}

impl ArchiveWriter for RecordingWriter {
    fn write(&self, destination: &Path, members: &[PathBuf]) -> OverlordResult<ArchiveStats> {
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.events.lock().unwrap().push(WriteEvent::Start(name.clone()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(30));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(WriteEvent::End(name.clone()));

        if self.fail_names.contains(&name) {
            return Err(OverlordError::archive_write(format!("refusing {name}")));
        }
        self.written.lock().unwrap().push(destination.to_path_buf());
        Ok(ArchiveStats {
            files: members.len(),
            bytes: 0,
        })
    }
}

fn paths(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(|n| PathBuf::from("src").join(n)).collect()
}

fn opts(max_concurrent: usize) -> ArchiveOpts {
    ArchiveOpts {
        output_root: PathBuf::from("zips"),
        max_concurrent,
        delete_sources: false,
    }
}

#[test]
fn groups_by_prefix_action_rotation() {
    let groups = group_files(
        paths(&["a-b_1-002.x", "a-c_2-001.x", "a-b_1-001.x"]),
        Path::new("zips"),
    );
    assert_eq!(groups.len(), 2);

    let ab = &groups[0];
    assert_eq!(
        ab.key,
        GroupKey::Category {
            prefix: "a".to_string(),
            action: "b".to_string(),
            rotation: "1".to_string(),
        }
    );
    assert_eq!(ab.members, paths(&["a-b_1-001.x", "a-b_1-002.x"]));
    assert_eq!(ab.destination, Path::new("zips/a/b/b_1.zip"));

    let ac = &groups[1];
    assert_eq!(ac.members.len(), 1);
    assert_eq!(ac.destination, Path::new("zips/a/c/c_2.zip"));
}

#[test]
fn name_without_dash_is_its_own_group() {
    let groups = group_files(paths(&["cover.png", "a-b_1-001.png"]), Path::new("zips"));
    assert_eq!(groups.len(), 2);
    let single = groups
        .iter()
        .find(|g| matches!(&g.key, GroupKey::Single { key, .. } if key == "cover"))
        .unwrap();
    assert_eq!(single.members, paths(&["cover.png"]));
}

#[test]
fn keys_sharing_a_destination_become_one_group() {
    let groups = group_files(
        paths(&["a-b_1-002.png", "a-b_1.png", "a-b_1-001.png", "a-b_2-001.png"]),
        Path::new("zips"),
    );
    assert_eq!(groups.len(), 2);

    let merged = &groups[0];
    assert_eq!(
        merged.key,
        GroupKey::Category {
            prefix: "a".to_string(),
            action: "b".to_string(),
            rotation: "1".to_string(),
        }
    );
    assert_eq!(merged.destination, Path::new("zips/a/b/b_1.zip"));
    assert_eq!(
        merged.members,
        paths(&["a-b_1-001.png", "a-b_1-002.png", "a-b_1.png"])
    );
    assert_eq!(groups[1].destination, Path::new("zips/a/b/b_2.zip"));

    let unique: std::collections::BTreeSet<_> = groups.iter().map(|g| &g.destination).collect();
    assert_eq!(unique.len(), groups.len());
}

#[test]
fn next_batch_starts_only_after_the_previous_one_finishes() {
    let names: Vec<String> = (0..5).map(|i| format!("p-act_{i}-001.png")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let groups = group_files(paths(&refs), Path::new("zips"));

    let pipeline = ArchivePipeline::with_writer(RecordingWriter::default(), opts(2)).unwrap();
    let report = pipeline.run_groups(&groups).unwrap();
    assert_eq!(report.completed, 5);

    let events = pipeline.writer.events.lock().unwrap().clone();
    assert_eq!(events.len(), 10);
    let position = |e: &WriteEvent| events.iter().position(|x| x == e).unwrap();
    let batches: Vec<&[ArchiveGroup]> = groups.chunks(2).collect();
    for pair in batches.windows(2) {
        let last_end = pair[0]
            .iter()
            .map(|g| position(&WriteEvent::End(file_name(&g.destination))))
            .max()
            .unwrap();
        let first_start = pair[1]
            .iter()
            .map(|g| position(&WriteEvent::Start(file_name(&g.destination))))
            .min()
            .unwrap();
        assert!(last_end < first_start, "{events:?}");
    }

    let order: Vec<_> = report.outcomes.iter().map(|o| o.destination.clone()).collect();
    let expected: Vec<_> = groups.iter().map(|g| g.destination.clone()).collect();
    assert_eq!(order, expected);
}

fn file_name(p: &Path) -> String {
    p.file_name().unwrap().to_string_lossy().into_owned()
}

#[test]
fn in_flight_writes_never_exceed_the_bound() {
    let names: Vec<String> = (0..5).map(|i| format!("p-act_{i}-001.png")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let groups = group_files(paths(&refs), Path::new("zips"));
    assert_eq!(groups.len(), 5);

    let pipeline = ArchivePipeline::with_writer(RecordingWriter::default(), opts(2)).unwrap();
    let report = pipeline.run_groups(&groups).unwrap();

    assert_eq!(report.completed, 5);
    assert_eq!(report.outcomes.len(), 5);
    let max = pipeline.writer.max_in_flight.load(Ordering::SeqCst);
    assert!((1..=2).contains(&max), "max in flight was {max}");
}

#[test]
fn failing_group_does_not_block_siblings() {
    let groups = group_files(
        paths(&["a-b_1-001.x", "a-b_2-001.x", "a-b_3-001.x"]),
        Path::new("zips"),
    );
    let writer = RecordingWriter {
        fail_names: vec!["b_2.zip".to_string()],
        ..Default::default()
    };
    let pipeline = ArchivePipeline::with_writer(writer, opts(3)).unwrap();
    let report = pipeline.run_groups(&groups).unwrap();

    assert_eq!(report.completed, 2);
    assert_eq!(report.failed(), 1);
    let failed: Vec<_> = report.outcomes.iter().filter(|o| !o.is_ok()).collect();
    assert_eq!(failed.len(), 1);
    assert!(matches!(failed[0].result, Err(OverlordError::ArchiveWrite(_))));
    assert_eq!(pipeline.writer.written.lock().unwrap().len(), 2);
}

#[test]
fn zero_concurrency_is_rejected() {
    assert!(matches!(
        ArchivePipeline::new(opts(0)),
        Err(OverlordError::Validation(_))
    ));
}

#[test]
fn default_bound_is_capped() {
    let n = default_max_concurrent();
    assert!((5..=32).contains(&n));
}
