use std::fmt;

use crate::error::{DispatchError, OpenError};
use crate::gesture::GestureLabel;

/// Asynchronous outcomes the capture loop reports back to the UI. The loop
/// never blocks on these; if the UI stops draining, events are dropped.
#[derive(Debug)]
pub enum PipelineEvent {
    /// A source switch (or initial open) succeeded.
    SourceSwitched(u32),
    /// A source switch or open failed; the pipeline holds no source now.
    SourceOpenFailed(OpenError),
    /// The device disconnected; the run ended cleanly.
    StreamEnded,
    /// A gesture fired its bound action.
    Dispatched {
        label: GestureLabel,
        action: String,
    },
    /// A gesture fired but its action failed to launch.
    DispatchFailed(DispatchError),
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineEvent::SourceSwitched(index) => write!(f, "camera {index} active"),
            PipelineEvent::SourceOpenFailed(e) => write!(f, "{e}"),
            PipelineEvent::StreamEnded => write!(f, "video stream ended"),
            PipelineEvent::Dispatched { label, action } => {
                write!(f, "{} {label} -> {action}", label.glyph())
            }
            PipelineEvent::DispatchFailed(e) => write!(f, "{e}"),
        }
    }
}
