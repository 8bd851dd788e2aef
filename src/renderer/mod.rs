pub mod cell;
pub mod display;
pub mod preview;
pub mod processor;

pub use display::{DisplayManager, DisplayMode};
pub use preview::PreviewScaler;
pub use processor::FrameProcessor;
