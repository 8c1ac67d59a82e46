pub mod frame;

pub use frame::{DisplayFrame, RawFrame};
