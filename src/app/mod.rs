//! Desktop front end: binding editor, camera controls and live preview
//! around the pipeline's control surface. Everything here is plumbing; the
//! loop neither knows nor waits for this window.

use std::sync::Arc;
use std::time::Duration;

use egui::TextureOptions;
use indexmap::IndexMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{error, warn};

use crate::bindings::BindingStore;
use crate::capture::SourceFactory;
use crate::config::Settings;
use crate::gesture::GestureLabel;
use crate::pipeline::{Pipeline, PipelineController, PipelineEvent, PipelineHandle};
use crate::render::OverlayConfig;

const LOG_CAPACITY: usize = 100;

pub struct GestureApp {
    controller: PipelineController,
    handle: PipelineHandle,
    event_rx: mpsc::Receiver<PipelineEvent>,
    entries: IndexMap<GestureLabel, String>,
    cooldown_secs: f64,
    overlay: OverlayConfig,
    cameras: Vec<u32>,
    selected_camera: u32,
    bindings_path: String,
    log: Vec<String>,
}

impl GestureApp {
    pub fn start_gui(settings: Settings, factory: Arc<dyn SourceFactory>) -> eframe::Result<()> {
        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size(egui::vec2(1280.0, 720.0))
                .with_title("handwave"),
            ..Default::default()
        };

        let cooldown = if settings.cooldown_secs > 0.0 {
            Duration::from_secs_f64(settings.cooldown_secs)
        } else {
            warn!(
                configured = settings.cooldown_secs,
                "ignoring non-positive cooldown from settings"
            );
            Duration::from_secs(5)
        };

        let (mut controller, handle, event_rx) = Pipeline::builder(factory)
            .bindings(BindingStore::new())
            .cooldown(cooldown)
            .overlay(settings.overlay)
            .initial_index(settings.camera.index)
            .build();

        if let Err(e) = controller.start() {
            error!("failed to start the pipeline: {e}");
        }

        let entries = handle.bindings();
        let cameras = handle.enumerate_cameras();
        let app = GestureApp {
            cooldown_secs: handle.cooldown_secs(),
            overlay: handle.overlay(),
            selected_camera: settings.camera.index,
            bindings_path: settings.bindings_path,
            entries,
            cameras,
            controller,
            handle,
            event_rx,
            log: Vec::new(),
        };

        eframe::run_native("handwave", options, Box::new(move |_cc| Ok(Box::new(app))))
    }

    fn push_log(&mut self, line: String) {
        if self.log.len() >= LOG_CAPACITY {
            self.log.remove(0);
        }
        self.log.push(line);
    }

    fn drain_events(&mut self) {
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => self.push_log(event.to_string()),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn refresh_entries(&mut self) {
        self.entries = self.handle.bindings();
    }

    fn save_entries(&mut self) {
        for (label, action) in self.entries.clone() {
            // Blank rows mean "no edit"; the store enforces that.
            self.handle.set_binding(label, &action);
        }
        self.refresh_entries();
        self.push_log("bindings updated".to_string());
    }

    fn export_bindings(&mut self) {
        let result = self
            .handle
            .export_bindings()
            .map_err(|e| e.to_string())
            .and_then(|payload| {
                std::fs::write(&self.bindings_path, payload).map_err(|e| e.to_string())
            });
        match result {
            Ok(()) => self.push_log(format!("bindings exported to {}", self.bindings_path)),
            Err(e) => self.push_log(format!("[ERROR] export failed: {e}")),
        }
    }

    fn import_bindings(&mut self) {
        let result = std::fs::read(&self.bindings_path)
            .map_err(|e| e.to_string())
            .and_then(|payload| {
                self.handle
                    .import_bindings(&payload)
                    .map_err(|e| e.to_string())
            });
        match result {
            Ok(applied) => {
                self.refresh_entries();
                self.push_log(format!(
                    "imported {applied} bindings from {}",
                    self.bindings_path
                ));
            }
            Err(e) => self.push_log(format!("[ERROR] import failed: {e}")),
        }
    }

    fn draw_controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("handwave");
            ui.separator();
            ui.label(format!("pipeline: {}", self.handle.lifecycle()));

            if ui.button("Start").clicked() {
                if let Err(e) = self.controller.start() {
                    self.push_log(format!("[ERROR] {e}"));
                }
            }
            if ui.button("Stop").clicked() {
                if let Err(e) = self.controller.stop() {
                    self.push_log(format!("[ERROR] {e}"));
                }
            }
        });

        ui.horizontal(|ui| {
            let previous = self.selected_camera;
            egui::ComboBox::from_label("Camera")
                .selected_text(format!("camera {}", self.selected_camera))
                .show_ui(ui, |ui| {
                    for &index in &self.cameras {
                        ui.selectable_value(
                            &mut self.selected_camera,
                            index,
                            format!("camera {index}"),
                        );
                    }
                });
            if self.selected_camera != previous {
                if let Err(e) = self.handle.switch_camera(self.selected_camera) {
                    self.push_log(format!("[ERROR] {e}"));
                    self.selected_camera = previous;
                }
            }
            if ui.button("Rescan").clicked() {
                self.cameras = self.handle.enumerate_cameras();
                self.push_log(format!("found cameras: {:?}", self.cameras));
            }

            ui.separator();
            let mut overlay = self.overlay;
            ui.checkbox(&mut overlay.preview, "Preview");
            ui.checkbox(&mut overlay.traces, "Hand traces");
            ui.checkbox(&mut overlay.label, "Gesture label");
            if overlay != self.overlay {
                self.overlay = overlay;
                self.handle.set_overlay(overlay);
            }
        });
    }

    fn draw_bindings_editor(&mut self, ui: &mut egui::Ui) {
        ui.heading("Gesture bindings");
        ui.separator();

        for label in GestureLabel::ALL {
            ui.horizontal(|ui| {
                ui.label(format!("{} {}", label.glyph(), label.name()));
                if let Some(action) = self.entries.get_mut(&label) {
                    ui.add(egui::TextEdit::singleline(action).desired_width(220.0));
                }
            });
        }

        ui.separator();
        ui.horizontal(|ui| {
            if ui.button("Save").clicked() {
                self.save_entries();
            }
            if ui.button("Export").clicked() {
                self.export_bindings();
            }
            if ui.button("Import").clicked() {
                self.import_bindings();
            }
        });

        ui.separator();
        ui.horizontal(|ui| {
            ui.label("Cooldown (s)");
            ui.add(egui::DragValue::new(&mut self.cooldown_secs).speed(0.1));
            if ui.button("Apply").clicked() {
                match self.handle.set_cooldown_secs(self.cooldown_secs) {
                    Ok(()) => self.push_log(format!("cooldown set to {}s", self.cooldown_secs)),
                    Err(e) => {
                        self.push_log(format!("[ERROR] {e}"));
                        self.cooldown_secs = self.handle.cooldown_secs();
                    }
                }
            }
        });
    }

    fn draw_video(&mut self, ui: &mut egui::Ui) {
        let Some(frame) = self.handle.latest_frame() else {
            ui.heading("No video source");
            return;
        };

        let color_image = egui::ColorImage::from_rgb(
            [frame.image.width() as usize, frame.image.height() as usize],
            frame.image.as_raw().as_slice(),
        );
        let texture = ui
            .ctx()
            .load_texture("live_frame", color_image, TextureOptions::default());
        ui.image(&texture);

        if let Some(label) = frame.label {
            ui.heading(format!("{} {}", label.glyph(), label.name()));
        }
    }
}

impl eframe::App for GestureApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            self.draw_controls(ui);
        });

        egui::SidePanel::left("bindings")
            .resizable(true)
            .show(ctx, |ui| {
                self.draw_bindings_editor(ui);
            });

        egui::TopBottomPanel::bottom("event_log")
            .resizable(true)
            .show(ctx, |ui| {
                ui.heading("Events");
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for line in self.log.iter().rev() {
                        ui.label(line);
                    }
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_video(ui);
        });

        ctx.request_repaint();
    }
}
