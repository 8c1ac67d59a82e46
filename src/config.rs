use serde::Deserialize;

use crate::render::OverlayConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub camera: CameraSettings,
    /// Minimum seconds between two dispatches of the same gesture.
    pub cooldown_secs: f64,
    pub overlay: OverlayConfig,
    /// Where the Export / Import buttons read and write the binding table.
    pub bindings_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Device index opened when the pipeline starts.
    pub index: u32,
    /// Enumeration probes indices `0..probe_limit`.
    pub probe_limit: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            cooldown_secs: 5.0,
            overlay: OverlayConfig::default(),
            bindings_path: "bindings.json".to_string(),
        }
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            index: 0,
            probe_limit: 10,
        }
    }
}

impl Settings {
    /// Layered load: `handwave.toml` (optional) then `HANDWAVE_*` environment
    /// overrides. Missing sources fall back to the defaults above.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("handwave").required(false))
            .add_source(config::Environment::with_prefix("HANDWAVE").separator("__"))
            .build()?
            .try_deserialize()
    }
}
