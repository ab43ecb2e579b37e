//! Capture loop
//!
//! Owns the start/stop state machine and runs one capture-compare-save cycle
//! per tick. Control surfaces talk to the loop only through
//! [`ControlCommand`] messages, so the baseline frame and the state live on a
//! single task and ticks never overlap.

use crate::capture::{CaptureTarget, FrameSource};
use crate::encode::{FrameComparator, SnapshotEncoder, Verdict};
use crate::status::{StatusObserver, STATUS_CAPTURING, STATUS_IDLE};
use crate::store::SnapshotStore;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

/// Default delay between the end of one tick and the next
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Capturing,
}

/// Requests from a control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Start capturing the target with this 1-based index
    Start(usize),
    Stop,
    /// Start on the given target when idle, stop when capturing
    Toggle(usize),
    /// Leave the run loop
    Shutdown,
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not capturing; nothing happened
    Skipped,
    Unchanged,
    Saved(PathBuf),
    Failed(String),
}

/// Counters kept across ticks
#[derive(Debug, Default, Clone)]
pub struct CaptureStats {
    pub ticks: u64,
    pub saved: u64,
    pub unchanged: u64,
    pub errors: u64,
}

pub struct CaptureScheduler {
    source: Box<dyn FrameSource>,
    comparator: FrameComparator,
    encoder: SnapshotEncoder,
    store: SnapshotStore,
    observer: Arc<dyn StatusObserver>,
    targets: Vec<CaptureTarget>,
    interval: Duration,
    state: CaptureState,
    target: Option<CaptureTarget>,
    next_tick: Option<Instant>,
    stats: CaptureStats,
}

impl CaptureScheduler {
    /// Build an idle scheduler. Targets are enumerated once, here.
    pub fn new(
        source: Box<dyn FrameSource>,
        comparator: FrameComparator,
        encoder: SnapshotEncoder,
        store: SnapshotStore,
        observer: Arc<dyn StatusObserver>,
        interval: Duration,
    ) -> Self {
        let targets = source.list_targets();
        debug!("Scheduler sees {} capture target(s)", targets.len());
        Self {
            source,
            comparator,
            encoder,
            store,
            observer,
            targets,
            interval,
            state: CaptureState::Idle,
            target: None,
            next_tick: None,
            stats: CaptureStats::default(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn targets(&self) -> &[CaptureTarget] {
        &self.targets
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    /// Start capturing `target` with a fresh baseline
    pub fn start(&mut self, target: CaptureTarget) {
        if self.state == CaptureState::Capturing {
            warn!("Start requested while already capturing; ignoring");
            return;
        }

        info!("Capture started on {}", target);
        self.comparator.clear();
        self.target = Some(target);
        self.state = CaptureState::Capturing;
        self.next_tick = Some(Instant::now() + self.interval);
        self.observer.on_status(STATUS_CAPTURING);
    }

    /// Resolve a 1-based target index and start on it
    pub fn start_index(&mut self, index: usize) {
        match self.targets.iter().find(|t| t.index == index).cloned() {
            Some(target) => self.start(target),
            None => {
                warn!("No capture target with index {}", index);
                self.observer
                    .on_status(&format!("error: no capture target {}", index));
            }
        }
    }

    /// Stop capturing. The baseline is kept until the next start.
    pub fn stop(&mut self) {
        if self.state == CaptureState::Idle {
            return;
        }

        self.state = CaptureState::Idle;
        self.next_tick = None;
        info!(
            "Capture stopped: {} ticks, {} saved, {} unchanged, {} errors",
            self.stats.ticks, self.stats.saved, self.stats.unchanged, self.stats.errors
        );
        self.observer.on_status(STATUS_IDLE);
    }

    /// Apply a control command
    pub fn apply(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::Start(index) => self.start_index(index),
            ControlCommand::Stop => self.stop(),
            ControlCommand::Toggle(index) => match self.state {
                CaptureState::Idle => self.start_index(index),
                CaptureState::Capturing => self.stop(),
            },
            ControlCommand::Shutdown => self.stop(),
        }
    }

    /// One capture-compare-save cycle. A no-op unless capturing.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state != CaptureState::Capturing {
            return TickOutcome::Skipped;
        }
        let Some(target) = self.target.as_ref() else {
            return TickOutcome::Skipped;
        };
        self.stats.ticks += 1;

        let frame = match self.source.capture(target) {
            Ok(frame) => frame,
            Err(e) => return self.fail(format!("capture failed: {}", e)),
        };

        if self.comparator.observe(frame) == Verdict::Unchanged {
            self.stats.unchanged += 1;
            return TickOutcome::Unchanged;
        }

        let Some(frame) = self.comparator.last() else {
            return TickOutcome::Skipped;
        };
        let saved = match self.encoder.encode(frame) {
            Ok(image) => self
                .store
                .save(&image, &frame.captured_at)
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match saved {
            Ok(path) => {
                self.stats.saved += 1;
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                self.observer.on_status(&format!("saved: {}", name));
                TickOutcome::Saved(path)
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, message: String) -> TickOutcome {
        self.stats.errors += 1;
        warn!("Tick failed: {}", message);
        self.observer.on_status(&format!("error: {}", message));
        TickOutcome::Failed(message)
    }

    /// Serve control commands and run ticks until `Shutdown` or the
    /// channel closes.
    pub async fn run(&mut self, mut commands: mpsc::UnboundedReceiver<ControlCommand>) {
        loop {
            let deadline = self.next_tick;
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(ControlCommand::Shutdown) | None => break,
                    Some(command) => self.apply(command),
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.next_tick = None;
                    self.tick();
                    if self.state == CaptureState::Capturing {
                        self.next_tick = Some(Instant::now() + self.interval);
                    }
                }
            }
        }

        self.stop();
        debug!("Capture loop finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureError, PixelLayout, RawFrame};
    use chrono::Local;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Step {
        Fill(u8),
        Fail,
    }

    /// Plays back `steps`, repeating the last one forever
    struct ScriptedSource {
        targets: Vec<CaptureTarget>,
        steps: Vec<Step>,
        captures: Arc<AtomicUsize>,
    }

    impl FrameSource for ScriptedSource {
        fn list_targets(&self) -> Vec<CaptureTarget> {
            self.targets.clone()
        }

        fn capture(&mut self, target: &CaptureTarget) -> Result<RawFrame, CaptureError> {
            let n = self.captures.fetch_add(1, Ordering::SeqCst);
            let step = self.steps[n.min(self.steps.len() - 1)];
            match step {
                Step::Fill(fill) => Ok(RawFrame {
                    width: target.width as u32,
                    height: target.height as u32,
                    data: vec![fill; target.width as usize * target.height as usize * 4],
                    layout: PixelLayout::Bgrx,
                    captured_at: Local::now(),
                }),
                Step::Fail => Err(CaptureError::TargetUnavailable(target.index)),
            }
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl StatusObserver for Recorder {
        fn on_status(&self, message: &str) {
            self.0.lock().push(message.to_string());
        }
    }

    impl Recorder {
        fn messages(&self) -> Vec<String> {
            self.0.lock().clone()
        }
    }

    struct Harness {
        scheduler: CaptureScheduler,
        recorder: Arc<Recorder>,
        captures: Arc<AtomicUsize>,
        dir: PathBuf,
    }

    impl Harness {
        fn new(steps: Vec<Step>) -> Self {
            let dir =
                std::env::temp_dir().join(format!("snapwatch-sched-{}", uuid::Uuid::new_v4()));
            let captures = Arc::new(AtomicUsize::new(0));
            let recorder = Arc::new(Recorder::default());
            let source = ScriptedSource {
                targets: vec![CaptureTarget {
                    index: 1,
                    label: "test".to_string(),
                    x: 0,
                    y: 0,
                    width: 4,
                    height: 3,
                }],
                steps,
                captures: captures.clone(),
            };
            let scheduler = CaptureScheduler::new(
                Box::new(source),
                FrameComparator::new(),
                SnapshotEncoder::new(),
                SnapshotStore::open(&dir).expect("open store"),
                recorder.clone(),
                DEFAULT_INTERVAL,
            );
            Self {
                scheduler,
                recorder,
                captures,
                dir,
            }
        }

        fn files(&self) -> usize {
            std::fs::read_dir(&self.dir).map(|d| d.count()).unwrap_or(0)
        }
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            std::fs::remove_dir_all(&self.dir).ok();
        }
    }

    #[test]
    fn first_tick_saves_one_file() {
        let mut h = Harness::new(vec![Step::Fill(10)]);
        h.scheduler.start_index(1);

        let outcome = h.scheduler.tick();
        let TickOutcome::Saved(path) = outcome else {
            panic!("expected a save, got {:?}", outcome);
        };
        assert_eq!(h.files(), 1);

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("screenshot_") && name.ends_with(".png"));
        assert_eq!(h.recorder.messages().last(), Some(&format!("saved: {}", name)));
    }

    #[test]
    fn identical_second_tick_writes_nothing() {
        let mut h = Harness::new(vec![Step::Fill(10), Step::Fill(10)]);
        h.scheduler.start_index(1);

        assert!(matches!(h.scheduler.tick(), TickOutcome::Saved(_)));
        let before = h.recorder.messages();
        assert_eq!(h.scheduler.tick(), TickOutcome::Unchanged);

        assert_eq!(h.files(), 1);
        // no status update on an unchanged frame
        assert_eq!(h.recorder.messages(), before);
    }

    #[test]
    fn capture_error_is_reported_and_not_fatal() {
        let mut h = Harness::new(vec![Step::Fail, Step::Fill(3)]);
        h.scheduler.start_index(1);

        assert!(matches!(h.scheduler.tick(), TickOutcome::Failed(_)));
        assert_eq!(h.files(), 0);
        let last = h.recorder.messages().last().cloned().unwrap();
        assert!(last.starts_with("error: capture failed"), "{}", last);
        assert_eq!(h.scheduler.state(), CaptureState::Capturing);

        assert!(matches!(h.scheduler.tick(), TickOutcome::Saved(_)));
        assert_eq!(h.scheduler.stats().errors, 1);
        assert_eq!(h.scheduler.stats().saved, 1);
    }

    #[test]
    fn tick_after_stop_is_a_no_op() {
        let mut h = Harness::new(vec![Step::Fill(1), Step::Fill(2)]);
        h.scheduler.start_index(1);
        assert!(matches!(h.scheduler.tick(), TickOutcome::Saved(_)));

        h.scheduler.stop();
        assert_eq!(h.scheduler.tick(), TickOutcome::Skipped);
        assert_eq!(h.captures.load(Ordering::SeqCst), 1);
        assert_eq!(h.files(), 1);
        assert_eq!(h.recorder.messages().last().map(String::as_str), Some(STATUS_IDLE));
    }

    #[test]
    fn restart_clears_baseline() {
        let mut h = Harness::new(vec![Step::Fill(5)]);
        h.scheduler.start_index(1);
        assert!(matches!(h.scheduler.tick(), TickOutcome::Saved(_)));
        assert_eq!(h.scheduler.tick(), TickOutcome::Unchanged);

        h.scheduler.stop();
        h.scheduler.start_index(1);
        // same pixels, but a new session always saves its first frame
        assert!(matches!(h.scheduler.tick(), TickOutcome::Saved(_)));
    }

    #[test]
    fn unknown_target_stays_idle() {
        let mut h = Harness::new(vec![Step::Fill(5)]);
        h.scheduler.start_index(7);
        assert_eq!(h.scheduler.state(), CaptureState::Idle);
        assert_eq!(
            h.recorder.messages(),
            vec!["error: no capture target 7".to_string()]
        );
    }

    #[test]
    fn toggle_flips_state() {
        let mut h = Harness::new(vec![Step::Fill(5)]);
        h.scheduler.apply(ControlCommand::Toggle(1));
        assert_eq!(h.scheduler.state(), CaptureState::Capturing);
        h.scheduler.apply(ControlCommand::Toggle(1));
        assert_eq!(h.scheduler.state(), CaptureState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_keeps_ticking_after_errors() {
        let mut h = Harness::new(vec![Step::Fail, Step::Fill(8)]);
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(ControlCommand::Start(1)).unwrap();
        let driver = async {
            // ticks land at 100ms and 200ms
            tokio::time::sleep(Duration::from_millis(250)).await;
            tx.send(ControlCommand::Shutdown).unwrap();
        };
        tokio::join!(h.scheduler.run(rx), driver);

        assert_eq!(h.captures.load(Ordering::SeqCst), 2);
        assert_eq!(h.files(), 1);
        let messages = h.recorder.messages();
        assert_eq!(messages[0], STATUS_CAPTURING);
        assert!(messages[1].starts_with("error: "));
        assert!(messages[2].starts_with("saved: "));
        assert_eq!(messages.last().map(String::as_str), Some(STATUS_IDLE));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_between_ticks_prevents_further_writes() {
        let mut h = Harness::new(vec![Step::Fill(1), Step::Fill(2), Step::Fill(3)]);
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(ControlCommand::Start(1)).unwrap();
        let driver = async {
            tokio::time::sleep(Duration::from_millis(150)).await;
            tx.send(ControlCommand::Stop).unwrap();
            // well past when ticks would have fired
            tokio::time::sleep(Duration::from_millis(500)).await;
            tx.send(ControlCommand::Shutdown).unwrap();
        };
        tokio::join!(h.scheduler.run(rx), driver);

        assert_eq!(h.captures.load(Ordering::SeqCst), 1);
        assert_eq!(h.files(), 1);
        assert_eq!(h.scheduler.state(), CaptureState::Idle);
    }
}
