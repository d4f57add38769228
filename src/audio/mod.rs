pub mod capture;
pub mod sink;

pub use capture::{AudioCapture, BridgeMessage};
pub use sink::AudioSink;
