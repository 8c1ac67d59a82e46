pub mod controller;
pub mod events;
mod worker;

pub use controller::{Lifecycle, Pipeline, PipelineBuilder, PipelineController, PipelineHandle};
pub use events::PipelineEvent;
