use std::fmt;
use std::sync::atomic::AtomicU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indexmap::IndexMap;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bindings::BindingStore;
use crate::capture::{self, SourceFactory};
use crate::common::frame::DisplayFrame;
use crate::cooldown::CooldownGate;
use crate::dispatch::{ActionLauncher, ShellLauncher};
use crate::error::{BindingError, ConfigError, PipelineError};
use crate::gesture::GestureLabel;
use crate::perception::{GestureClassifier, HandPerception, HeuristicClassifier, NoopPerception};
use crate::render::OverlayConfig;

use super::events::PipelineEvent;
use super::worker::{PipelineCommand, Worker};

/// UI-triggered start moves Stopped→Running; shutdown moves Running→Stopping,
/// and the worker reports Stopped once its loop has exited and the camera
/// handle is released. End of stream goes straight to Stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Stopped,
    Running,
    Stopping,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Stopped => write!(f, "Stopped"),
            Lifecycle::Running => write!(f, "Running"),
            Lifecycle::Stopping => write!(f, "Stopping"),
        }
    }
}

pub struct Pipeline;

impl Pipeline {
    pub fn builder(factory: Arc<dyn SourceFactory>) -> PipelineBuilder {
        PipelineBuilder {
            factory,
            perception: Box::new(NoopPerception),
            classifier: Box::new(HeuristicClassifier),
            launcher: Box::new(ShellLauncher),
            bindings: BindingStore::new(),
            cooldown: Duration::from_secs(5),
            overlay: OverlayConfig::default(),
            initial_index: 0,
        }
    }
}

pub struct PipelineBuilder {
    factory: Arc<dyn SourceFactory>,
    perception: Box<dyn HandPerception>,
    classifier: Box<dyn GestureClassifier>,
    launcher: Box<dyn ActionLauncher>,
    bindings: BindingStore,
    cooldown: Duration,
    overlay: OverlayConfig,
    initial_index: u32,
}

impl PipelineBuilder {
    pub fn perception(mut self, perception: Box<dyn HandPerception>) -> Self {
        self.perception = perception;
        self
    }

    pub fn classifier(mut self, classifier: Box<dyn GestureClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn launcher(mut self, launcher: Box<dyn ActionLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn bindings(mut self, bindings: BindingStore) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn overlay(mut self, overlay: OverlayConfig) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn initial_index(mut self, index: u32) -> Self {
        self.initial_index = index;
        self
    }

    /// Wires the channels and parks the worker; nothing runs until
    /// [`PipelineController::start`]. The event receiver is handed to
    /// whoever displays pipeline outcomes.
    pub fn build(
        self,
    ) -> (
        PipelineController,
        PipelineHandle,
        mpsc::Receiver<PipelineEvent>,
    ) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(64);
        let (overlay_tx, overlay_rx) = watch::channel(self.overlay);
        let (frame_tx, frame_rx) = watch::channel(None);
        let gate = CooldownGate::new(self.cooldown);
        let lifecycle = Arc::new(Mutex::new(Lifecycle::Stopped));
        let source_index = Arc::new(AtomicU32::new(self.initial_index));

        let worker = Worker::new(
            self.factory.clone(),
            self.perception,
            self.classifier,
            self.launcher,
            self.bindings.clone(),
            gate.clone(),
            overlay_rx,
            command_rx,
            frame_tx,
            event_tx,
            source_index,
        );

        let controller = PipelineController {
            parked: Arc::new(Mutex::new(Some(worker))),
            lifecycle: lifecycle.clone(),
            cancel: CancellationToken::new(),
            join: None,
        };
        let handle = PipelineHandle {
            bindings: self.bindings,
            gate,
            factory: self.factory,
            lifecycle,
            overlay_tx,
            command_tx,
            frame_rx,
        };
        (controller, handle, event_rx)
    }
}

/// Owns the background thread. The worker itself is parked here between
/// runs so the pipeline can be started again after a stop or a device
/// disconnect.
pub struct PipelineController {
    parked: Arc<Mutex<Option<Worker>>>,
    lifecycle: Arc<Mutex<Lifecycle>>,
    cancel: CancellationToken,
    join: Option<std::thread::JoinHandle<()>>,
}

impl PipelineController {
    /// Valid only from Stopped: spawns the capture thread and transitions to
    /// Running.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        let mut worker = {
            let mut state = self.lifecycle.lock().expect("lifecycle lock poisoned");
            if *state != Lifecycle::Stopped {
                return Err(PipelineError::AlreadyStarted);
            }
            let worker = self
                .parked
                .lock()
                .expect("worker shed lock poisoned")
                .take()
                .ok_or(PipelineError::AlreadyStarted)?;
            *state = Lifecycle::Running;
            worker
        };

        // Reap the previous run's thread if the loop exited on its own.
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }

        self.cancel = CancellationToken::new();
        let cancel = self.cancel.clone();
        let parked = self.parked.clone();
        let lifecycle = self.lifecycle.clone();
        self.join = Some(std::thread::spawn(move || {
            worker.run(cancel);
            // Park first, then report Stopped: Stopped always implies the
            // worker (and its released source) is back in the shed.
            parked
                .lock()
                .expect("worker shed lock poisoned")
                .replace(worker);
            *lifecycle.lock().expect("lifecycle lock poisoned") = Lifecycle::Stopped;
        }));
        info!("pipeline started");
        Ok(())
    }

    /// Valid only from Running: cooperative cancellation, then joins the
    /// thread. The worker finishes its current iteration first; the source
    /// is released before Stopped is observable.
    pub fn stop(&mut self) -> Result<(), PipelineError> {
        let was_running = {
            let mut state = self.lifecycle.lock().expect("lifecycle lock poisoned");
            match *state {
                Lifecycle::Running => {
                    *state = Lifecycle::Stopping;
                    true
                }
                Lifecycle::Stopping | Lifecycle::Stopped => false,
            }
        };
        if !was_running {
            // Reap a loop that already ended on its own (end of stream).
            if let Some(join) = self.join.take() {
                let _ = join.join();
            }
            return Err(PipelineError::NotRunning);
        }

        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("capture thread panicked");
            }
        }
        info!("pipeline stopped");
        Ok(())
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock().expect("lifecycle lock poisoned")
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle() == Lifecycle::Running
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Thread-safe control surface handed to the UI. Everything here returns
/// without waiting on the capture loop.
#[derive(Clone)]
pub struct PipelineHandle {
    bindings: BindingStore,
    gate: CooldownGate,
    factory: Arc<dyn SourceFactory>,
    lifecycle: Arc<Mutex<Lifecycle>>,
    overlay_tx: watch::Sender<OverlayConfig>,
    command_tx: mpsc::Sender<PipelineCommand>,
    frame_rx: watch::Receiver<Option<DisplayFrame>>,
}

impl PipelineHandle {
    pub fn set_binding(&self, label: GestureLabel, action: &str) -> bool {
        self.bindings.set(label, action)
    }

    pub fn binding(&self, label: GestureLabel) -> String {
        self.bindings.get(label)
    }

    pub fn bindings(&self) -> IndexMap<GestureLabel, String> {
        self.bindings.snapshot()
    }

    pub fn export_bindings(&self) -> Result<Vec<u8>, BindingError> {
        self.bindings.export()
    }

    pub fn import_bindings(&self, payload: &[u8]) -> Result<usize, BindingError> {
        self.bindings.import(payload)
    }

    pub fn set_cooldown_secs(&self, secs: f64) -> Result<(), ConfigError> {
        self.gate.set_cooldown_secs(secs)
    }

    pub fn cooldown_secs(&self) -> f64 {
        self.gate.cooldown().as_secs_f64()
    }

    pub fn set_overlay(&self, overlay: OverlayConfig) {
        self.overlay_tx.send_replace(overlay);
    }

    pub fn overlay(&self) -> OverlayConfig {
        *self.overlay_tx.borrow()
    }

    /// Queues a source switch; the loop performs it at its next read
    /// boundary. Indices beyond the probe limit are rejected here, open
    /// failures arrive later as a [`PipelineEvent::SourceOpenFailed`].
    pub fn switch_camera(&self, index: u32) -> Result<(), ConfigError> {
        if index >= self.factory.probe_limit() {
            return Err(ConfigError::UnknownCamera(index));
        }
        if let Err(e) = self.command_tx.try_send(PipelineCommand::SwitchSource(index)) {
            warn!("dropping camera switch request: {e}");
        }
        Ok(())
    }

    /// One-shot probe of the available device indices.
    pub fn enumerate_cameras(&self) -> Vec<u32> {
        capture::enumerate(self.factory.as_ref())
    }

    /// Non-blocking: clones whatever the loop last published. `None` while
    /// stopped or while no source is open.
    pub fn latest_frame(&self) -> Option<DisplayFrame> {
        self.frame_rx.borrow().clone()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock().expect("lifecycle lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::synthetic::SyntheticFactory;
    use crate::capture::VideoSource;
    use crate::dispatch::RecordingLauncher;
    use crate::error::{OpenError, PerceptionError};
    use crate::perception::{HandDetection, HandTrace, Landmark};
    use image::RgbImage;
    use std::time::Instant;

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

    struct ConstClassifier(GestureLabel);

    impl GestureClassifier for ConstClassifier {
        fn classify(
            &mut self,
            _detection: &HandDetection,
        ) -> Result<Option<GestureLabel>, PerceptionError> {
            Ok(Some(self.0))
        }
    }

    fn fast_factory() -> Arc<SyntheticFactory> {
        Arc::new(SyntheticFactory {
            sources: 2,
            frame_interval: Duration::from_millis(2),
            frame_limit: None,
        })
    }

    fn wait_until(mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn lifecycle_transitions_and_double_calls() {
        let (mut controller, _handle, _events) = Pipeline::builder(fast_factory()).build();
        assert_eq!(controller.lifecycle(), Lifecycle::Stopped);

        controller.start().unwrap();
        assert!(controller.is_running());
        assert!(matches!(
            controller.start(),
            Err(PipelineError::AlreadyStarted)
        ));

        controller.stop().unwrap();
        assert_eq!(controller.lifecycle(), Lifecycle::Stopped);
        assert!(matches!(controller.stop(), Err(PipelineError::NotRunning)));
    }

    #[test]
    fn frames_flow_while_running_and_clear_on_stop() {
        let (mut controller, handle, _events) = Pipeline::builder(fast_factory()).build();
        controller.start().unwrap();
        assert!(wait_until(|| handle.latest_frame().is_some()));

        controller.stop().unwrap();
        assert!(handle.latest_frame().is_none());
    }

    #[test]
    fn end_of_stream_stops_the_run_and_allows_a_restart() {
        let factory = Arc::new(SyntheticFactory {
            sources: 1,
            frame_interval: Duration::from_millis(1),
            frame_limit: Some(5),
        });
        let (mut controller, _handle, _events) = Pipeline::builder(factory).build();
        controller.start().unwrap();
        assert!(wait_until(|| controller.lifecycle() == Lifecycle::Stopped));

        // The worker parked itself; a fresh run starts cleanly.
        controller.start().unwrap();
        assert!(wait_until(|| controller.lifecycle() == Lifecycle::Stopped));
    }

    #[test]
    fn switch_beyond_the_probe_limit_is_rejected_eagerly() {
        let (_controller, handle, _events) = Pipeline::builder(fast_factory()).build();
        assert!(matches!(
            handle.switch_camera(99),
            Err(ConfigError::UnknownCamera(99))
        ));
    }

    #[test]
    fn failed_switch_degrades_to_no_source() {
        let (mut controller, handle, mut events) = Pipeline::builder(fast_factory()).build();
        controller.start().unwrap();
        assert!(wait_until(|| handle.latest_frame().is_some()));

        // Index 5 is inside the probe limit but has no synthetic device.
        handle.switch_camera(5).unwrap();
        assert!(wait_until(|| {
            let mut failed = false;
            while let Ok(event) = events.try_recv() {
                if matches!(event, PipelineEvent::SourceOpenFailed(OpenError { index: 5, .. })) {
                    failed = true;
                }
            }
            failed
        }));
        assert!(wait_until(|| handle.latest_frame().is_none()));

        // Switching back to a live device recovers.
        handle.switch_camera(1).unwrap();
        assert!(wait_until(|| handle.latest_frame().is_some()));
        controller.stop().unwrap();
    }

    #[test]
    fn recognition_dispatches_once_per_cooldown_and_labels_frames() {
        let (launcher, launched) = RecordingLauncher::new();
        let bindings = BindingStore::new();
        bindings.set(GestureLabel::Okay, "cmd_ok");

        let (mut controller, handle, _events) = Pipeline::builder(fast_factory())
            .perception(Box::new(AlwaysHand))
            .classifier(Box::new(ConstClassifier(GestureLabel::Okay)))
            .launcher(Box::new(launcher))
            .bindings(bindings)
            .cooldown(Duration::from_secs(3600))
            .build();

        controller.start().unwrap();
        assert!(wait_until(|| {
            handle
                .latest_frame()
                .is_some_and(|f| f.label == Some(GestureLabel::Okay))
        }));
        // Give the loop a few more frames, then check the gate held.
        std::thread::sleep(Duration::from_millis(50));
        controller.stop().unwrap();

        assert_eq!(
            *launched.lock().unwrap(),
            vec![(GestureLabel::Okay, "cmd_ok".to_string())]
        );
    }

    #[test]
    fn overlay_changes_reach_the_next_iteration() {
        let (mut controller, handle, _events) = Pipeline::builder(fast_factory())
            .perception(Box::new(AlwaysHand))
            .classifier(Box::new(ConstClassifier(GestureLabel::Peace)))
            .launcher(Box::new(RecordingLauncher::new().0))
            .build();
        controller.start().unwrap();
        assert!(wait_until(|| {
            handle
                .latest_frame()
                .is_some_and(|f| f.label == Some(GestureLabel::Peace))
        }));

        handle.set_overlay(OverlayConfig {
            preview: true,
            traces: true,
            label: false,
        });
        assert!(wait_until(|| {
            handle.latest_frame().is_some_and(|f| f.label.is_none())
        }));
        controller.stop().unwrap();
    }

    #[test]
    fn enumerate_sees_the_synthetic_devices() {
        let (_controller, handle, _events) = Pipeline::builder(fast_factory()).build();
        assert_eq!(handle.enumerate_cameras(), vec![0, 1]);
    }

    #[test]
    fn handle_outlives_a_stopped_controller() {
        let factory = fast_factory();
        let handle = {
            let (mut controller, handle, _events) = Pipeline::builder(factory).build();
            controller.start().unwrap();
            controller.stop().unwrap();
            handle
        };
        // Configuration stays usable; there is just no loop reading it.
        assert!(handle.set_binding(GestureLabel::Stop, "cmd_stop"));
        assert_eq!(handle.lifecycle(), Lifecycle::Stopped);
        assert!(handle.latest_frame().is_none());
    }

    #[test]
    fn source_trait_objects_report_their_index() {
        let factory = fast_factory();
        let source: Box<dyn VideoSource> = factory.open(1).unwrap();
        assert_eq!(source.index(), 1);
    }
}
