//! The capture-to-dispatch loop. Runs on its own thread because the source
//! read and classifier inference both block; everything the UI shares with
//! it crosses through snapshot reads (bindings, overlay, cooldown) or
//! channels (commands in, frames and events out).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bindings::BindingStore;
use crate::capture::{SourceFactory, VideoSource};
use crate::common::frame::{DisplayFrame, RawFrame};
use crate::cooldown::CooldownGate;
use crate::dispatch::ActionLauncher;
use crate::gesture::GestureLabel;
use crate::perception::{GestureClassifier, HandPerception};
use crate::render;

use super::events::PipelineEvent;

/// How long the loop dozes between command polls while it has no source.
const NO_SOURCE_BACKOFF: Duration = Duration::from_millis(100);

pub(crate) enum PipelineCommand {
    SwitchSource(u32),
}

pub(crate) struct Worker {
    factory: Arc<dyn SourceFactory>,
    perception: Box<dyn HandPerception>,
    classifier: Box<dyn GestureClassifier>,
    launcher: Box<dyn ActionLauncher>,
    bindings: BindingStore,
    gate: CooldownGate,
    overlay_rx: watch::Receiver<render::OverlayConfig>,
    command_rx: mpsc::Receiver<PipelineCommand>,
    frame_tx: watch::Sender<Option<DisplayFrame>>,
    event_tx: mpsc::Sender<PipelineEvent>,
    source_index: Arc<AtomicU32>,
    source: Option<Box<dyn VideoSource>>,
}

#[allow(clippy::too_many_arguments)]
impl Worker {
    pub(crate) fn new(
        factory: Arc<dyn SourceFactory>,
        perception: Box<dyn HandPerception>,
        classifier: Box<dyn GestureClassifier>,
        launcher: Box<dyn ActionLauncher>,
        bindings: BindingStore,
        gate: CooldownGate,
        overlay_rx: watch::Receiver<render::OverlayConfig>,
        command_rx: mpsc::Receiver<PipelineCommand>,
        frame_tx: watch::Sender<Option<DisplayFrame>>,
        event_tx: mpsc::Sender<PipelineEvent>,
        source_index: Arc<AtomicU32>,
    ) -> Self {
        Self {
            factory,
            perception,
            classifier,
            launcher,
            bindings,
            gate,
            overlay_rx,
            command_rx,
            frame_tx,
            event_tx,
            source_index,
            source: None,
        }
    }

    /// One run: open the last known source, loop until cancelled or the
    /// stream ends, release the source before returning. The cancel flag is
    /// checked at iteration boundaries only — a blocking read finishes first.
    pub(crate) fn run(&mut self, cancel: CancellationToken) {
        let initial = self.source_index.load(Ordering::Relaxed);
        info!(index = initial, "capture loop starting");
        self.open_source(initial);

        while !cancel.is_cancelled() {
            self.apply_pending_commands();

            let Some(source) = self.source.as_mut() else {
                // Degraded: no source until a switch succeeds. Keep polling
                // commands so the UI can still swap cameras.
                std::thread::sleep(NO_SOURCE_BACKOFF);
                continue;
            };

            let Some(frame) = source.read() else {
                info!("video source reached end of stream");
                self.source = None;
                self.emit(PipelineEvent::StreamEnded);
                break;
            };

            self.handle_frame(frame);
        }

        // The handle must be gone before the run counts as stopped.
        self.source = None;
        self.frame_tx.send_replace(None);
        info!("capture loop stopped");
    }

    fn apply_pending_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                PipelineCommand::SwitchSource(index) => self.switch_source(index),
            }
        }
    }

    /// The old handle is dropped before the new open, so there is never a
    /// moment with two devices held. A failed open leaves no source at all;
    /// the old one is not resurrected.
    fn switch_source(&mut self, index: u32) {
        self.source = None;
        self.open_source(index);
    }

    fn open_source(&mut self, index: u32) {
        match self.factory.open(index) {
            Ok(source) => {
                self.source_index.store(index, Ordering::Relaxed);
                self.source = Some(source);
                self.emit(PipelineEvent::SourceSwitched(index));
            }
            Err(e) => {
                warn!(index, error = %e, "failed to open video source");
                self.frame_tx.send_replace(None);
                self.emit(PipelineEvent::SourceOpenFailed(e));
            }
        }
    }

    fn handle_frame(&mut self, frame: RawFrame) {
        // A bad frame is "no gesture this frame", never a dead loop.
        let detection = match self.perception.detect(&frame.image) {
            Ok(detection) => detection,
            Err(e) => {
                warn!(error = %e, "perception failed, skipping frame");
                None
            }
        };

        let label = match &detection {
            Some((hand, _)) => match self.classifier.classify(hand) {
                Ok(label) => label,
                Err(e) => {
                    warn!(error = %e, "classification failed, skipping frame");
                    None
                }
            },
            None => None,
        };

        if let Some(label) = label {
            self.dispatch(label, Instant::now());
        }

        let overlay = *self.overlay_rx.borrow();
        let trace = detection.as_ref().map(|(_, trace)| trace);
        let display = render::compose(&frame, trace, label, overlay);
        self.frame_tx.send_replace(Some(display));
    }

    /// Cooldown gates detection, not action success: a no-op action still
    /// counts as a fire and still stamps the gate.
    fn dispatch(&mut self, label: GestureLabel, now: Instant) {
        if !self.gate.should_fire(label, now) {
            debug!(%label, "suppressed by cooldown");
            return;
        }
        let action = self.bindings.get(label);
        match self.launcher.launch(label, &action) {
            Ok(()) => self.emit(PipelineEvent::Dispatched { label, action }),
            Err(e) => {
                warn!(error = %e, "action failed to launch");
                self.emit(PipelineEvent::DispatchFailed(e));
            }
        }
    }

    fn emit(&self, event: PipelineEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            debug!("dropping pipeline event: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::synthetic::SyntheticFactory;
    use crate::dispatch::RecordingLauncher;
    use crate::error::{OpenError, PerceptionError};
    use crate::perception::{HandDetection, HandTrace, Landmark, NoopPerception};
    use crate::render::OverlayConfig;
    use image::RgbImage;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicI64;
    use std::sync::Mutex;

    /// Factory that counts live handles and can be told to fail per index.
    #[derive(Clone)]
    struct CountingFactory {
        open_handles: Arc<AtomicI64>,
        failing: HashSet<u32>,
    }

    impl CountingFactory {
        fn new(failing: &[u32]) -> Self {
            Self {
                open_handles: Arc::new(AtomicI64::new(0)),
                failing: failing.iter().copied().collect(),
            }
        }

        fn live(&self) -> i64 {
            self.open_handles.load(Ordering::SeqCst)
        }
    }

    impl SourceFactory for CountingFactory {
        fn open(&self, index: u32) -> Result<Box<dyn VideoSource>, OpenError> {
            if self.failing.contains(&index) {
                return Err(OpenError {
                    index,
                    reason: "device is wedged".to_string(),
                });
            }
            self.open_handles.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountedSource {
                index,
                counter: self.open_handles.clone(),
            }))
        }
    }

    #[derive(Debug)]
    struct CountedSource {
        index: u32,
        counter: Arc<AtomicI64>,
    }

    impl VideoSource for CountedSource {
        fn index(&self) -> u32 {
            self.index
        }

        fn read(&mut self) -> Option<RawFrame> {
            Some(RawFrame::new(RgbImage::new(8, 8), self.index))
        }
    }

    impl Drop for CountedSource {
        fn drop(&mut self) {
            self.counter.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Perception that always sees the same hand.
    struct AlwaysHand;

    impl HandPerception for AlwaysHand {
        fn detect(
            &mut self,
            _frame: &RgbImage,
        ) -> Result<Option<(HandDetection, HandTrace)>, PerceptionError> {
            Ok(Some((
                HandDetection {
                    landmarks: [Landmark::default(); 21],
                    confidence: 1.0,
                },
                HandTrace::default(),
            )))
        }
    }

    struct FailingPerception;

    impl HandPerception for FailingPerception {
        fn detect(
            &mut self,
            _frame: &RgbImage,
        ) -> Result<Option<(HandDetection, HandTrace)>, PerceptionError> {
            Err(PerceptionError("model exploded".to_string()))
        }
    }

    struct ConstClassifier(GestureLabel);

    impl GestureClassifier for ConstClassifier {
        fn classify(
            &mut self,
            _detection: &HandDetection,
        ) -> Result<Option<GestureLabel>, PerceptionError> {
            Ok(Some(self.0))
        }
    }

    struct TestRig {
        worker: Worker,
        frame_rx: watch::Receiver<Option<DisplayFrame>>,
        event_rx: mpsc::Receiver<PipelineEvent>,
        launched: Arc<Mutex<Vec<(GestureLabel, String)>>>,
        bindings: BindingStore,
    }

    fn rig(
        factory: Arc<dyn SourceFactory>,
        perception: Box<dyn HandPerception>,
        classifier: Box<dyn GestureClassifier>,
        cooldown: Duration,
    ) -> TestRig {
        let (launcher, launched) = RecordingLauncher::new();
        let bindings = BindingStore::new();
        let (_command_tx, command_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(64);
        let (_overlay_tx, overlay_rx) = watch::channel(OverlayConfig::default());
        let (frame_tx, frame_rx) = watch::channel(None);
        let worker = Worker::new(
            factory,
            perception,
            classifier,
            Box::new(launcher),
            bindings.clone(),
            CooldownGate::new(cooldown),
            overlay_rx,
            command_rx,
            frame_tx,
            event_tx,
            Arc::new(AtomicU32::new(0)),
        );
        TestRig {
            worker,
            frame_rx,
            event_rx,
            launched,
            bindings,
        }
    }

    fn counting_rig(factory: CountingFactory) -> TestRig {
        rig(
            Arc::new(factory),
            Box::new(NoopPerception),
            Box::new(ConstClassifier(GestureLabel::Okay)),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn dispatch_sequence_respects_the_cooldown_window() {
        let mut rig = counting_rig(CountingFactory::new(&[]));
        rig.bindings.set(GestureLabel::Okay, "cmd_A");
        let t0 = Instant::now();

        rig.worker.dispatch(GestureLabel::Okay, t0);
        rig.worker.dispatch(GestureLabel::Okay, t0 + Duration::from_secs(2));
        rig.worker
            .dispatch(GestureLabel::Fist, t0 + Duration::from_millis(2500));
        rig.worker.dispatch(GestureLabel::Okay, t0 + Duration::from_secs(6));

        let launched = rig.launched.lock().unwrap();
        assert_eq!(
            *launched,
            vec![
                (GestureLabel::Okay, "cmd_A".to_string()),
                // Fist never fired before, so its default no-op dispatches.
                (GestureLabel::Fist, "true".to_string()),
                (GestureLabel::Okay, "cmd_A".to_string()),
            ]
        );
    }

    #[test]
    fn dispatches_are_reported_as_events() {
        let mut rig = counting_rig(CountingFactory::new(&[]));
        rig.worker.dispatch(GestureLabel::Peace, Instant::now());
        match rig.event_rx.try_recv() {
            Ok(PipelineEvent::Dispatched { label, action }) => {
                assert_eq!(label, GestureLabel::Peace);
                assert_eq!(action, "true");
            }
            other => panic!("expected a dispatch event, got {other:?}"),
        }
    }

    #[test]
    fn switch_holds_at_most_one_handle_and_none_after_failure() {
        let factory = CountingFactory::new(&[3]);
        let mut rig = counting_rig(factory.clone());

        rig.worker.open_source(0);
        assert_eq!(factory.live(), 1);

        rig.worker.switch_source(1);
        assert_eq!(factory.live(), 1);

        // Failed switch: the old handle is gone and not resurrected.
        rig.worker.switch_source(3);
        assert_eq!(factory.live(), 0);
        assert!(rig.frame_rx.borrow().is_none());

        // A later successful switch recovers.
        rig.worker.switch_source(1);
        assert_eq!(factory.live(), 1);
    }

    #[test]
    fn failed_open_reports_an_event() {
        let mut rig = counting_rig(CountingFactory::new(&[7]));
        rig.worker.open_source(7);
        match rig.event_rx.try_recv() {
            Ok(PipelineEvent::SourceOpenFailed(e)) => assert_eq!(e.index, 7),
            other => panic!("expected an open failure event, got {other:?}"),
        }
    }

    #[test]
    fn perception_failure_is_a_frame_without_a_gesture() {
        let mut rig = rig(
            Arc::new(CountingFactory::new(&[])),
            Box::new(FailingPerception),
            Box::new(ConstClassifier(GestureLabel::Okay)),
            Duration::from_secs(5),
        );
        rig.worker.handle_frame(RawFrame::new(RgbImage::new(8, 8), 0));

        // No dispatch happened, but a frame still reached the handoff slot.
        assert!(rig.launched.lock().unwrap().is_empty());
        let published = rig.frame_rx.borrow();
        let display = published.as_ref().expect("frame should be published");
        assert_eq!(display.label, None);
    }

    #[test]
    fn recognized_frames_dispatch_and_carry_the_label() {
        let mut rig = rig(
            Arc::new(CountingFactory::new(&[])),
            Box::new(AlwaysHand),
            Box::new(ConstClassifier(GestureLabel::Rock)),
            Duration::from_secs(3600),
        );
        rig.worker.handle_frame(RawFrame::new(RgbImage::new(8, 8), 0));
        rig.worker.handle_frame(RawFrame::new(RgbImage::new(8, 8), 0));

        // Two frames, one dispatch: the second is inside the cooldown.
        assert_eq!(rig.launched.lock().unwrap().len(), 1);
        let published = rig.frame_rx.borrow();
        let display = published.as_ref().expect("frame should be published");
        assert_eq!(display.label, Some(GestureLabel::Rock));
    }

    #[test]
    fn run_releases_the_source_and_clears_the_slot_on_cancel() {
        let factory = CountingFactory::new(&[]);
        let mut rig = counting_rig(factory.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        rig.worker.run(cancel);
        assert_eq!(factory.live(), 0);
        assert!(rig.frame_rx.borrow().is_none());
    }

    #[test]
    fn end_of_stream_ends_the_run() {
        let factory = SyntheticFactory {
            sources: 1,
            frame_interval: Duration::ZERO,
            frame_limit: Some(2),
        };
        let mut rig = rig(
            Arc::new(factory),
            Box::new(NoopPerception),
            Box::new(ConstClassifier(GestureLabel::Okay)),
            Duration::from_secs(5),
        );
        rig.worker.run(CancellationToken::new());

        let mut saw_end = false;
        while let Ok(event) = rig.event_rx.try_recv() {
            if matches!(event, PipelineEvent::StreamEnded) {
                saw_end = true;
            }
        }
        assert!(saw_end);
    }
}
