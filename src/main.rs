use std::sync::Arc;

use tracing::Level;

use handwave::app::GestureApp;
use handwave::capture::SourceFactory;
use handwave::config::Settings;
use handwave::error::AppError;

fn init_logging() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
}

#[cfg(feature = "camera")]
fn source_factory(settings: &Settings) -> Arc<dyn SourceFactory> {
    Arc::new(handwave::capture::nokhwa::NokhwaFactory {
        probe_limit: settings.camera.probe_limit,
    })
}

#[cfg(not(feature = "camera"))]
fn source_factory(_settings: &Settings) -> Arc<dyn SourceFactory> {
    Arc::new(handwave::capture::synthetic::SyntheticFactory::default())
}

fn main() -> Result<(), AppError> {
    init_logging();
    let settings = Settings::load()?;
    let factory = source_factory(&settings);
    GestureApp::start_gui(settings, factory).map_err(|e| AppError::Ui(e.to_string()))?;
    Ok(())
}
