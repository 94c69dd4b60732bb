//! Video stream pulling and subscription utilities

mod fps;
mod puller;
mod throttle;

pub use fps::FpsMeter;
pub use puller::{StreamOutputs, StreamPuller, StreamStats};
pub use throttle::{Throttle, ThrottleExt};
