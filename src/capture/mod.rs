//! Video source acquisition and hot-swap.
//!
//! The capture loop owns exactly one [`VideoSource`] at a time; releasing is
//! `Drop`, so every exit path — stop, switch, switch failure, end of stream —
//! gives the handle back exactly once. The UI never touches a handle; it
//! requests a switch and the loop performs the release/acquire sequence at
//! the next read boundary.

pub mod synthetic;

#[cfg(feature = "camera")]
pub mod nokhwa;

use tracing::debug;

use crate::common::frame::RawFrame;
use crate::error::OpenError;

pub trait VideoSource: Send + std::fmt::Debug {
    fn index(&self) -> u32;

    /// Blocking read of the next frame. `None` means the device reached end
    /// of stream (disconnected), which is terminal for the current run.
    fn read(&mut self) -> Option<RawFrame>;
}

pub trait SourceFactory: Send + Sync {
    fn open(&self, index: u32) -> Result<Box<dyn VideoSource>, OpenError>;

    /// Upper bound on device indices worth probing.
    fn probe_limit(&self) -> u32 {
        10
    }
}

/// One-shot enumeration: probes every index up to the factory's limit and
/// keeps the ones that open. Each probe handle is dropped immediately, so the
/// at-most-one-open-handle rule also holds while scanning.
pub fn enumerate(factory: &dyn SourceFactory) -> Vec<u32> {
    let mut available = Vec::new();
    for index in 0..factory.probe_limit() {
        match factory.open(index) {
            Ok(source) => {
                drop(source);
                available.push(index);
            }
            Err(e) => debug!(index, error = %e, "probe failed"),
        }
    }
    available
}
