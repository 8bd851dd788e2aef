pub mod capture;
pub mod extractor;
pub mod frame_queue;
pub mod recorder;
pub mod sampler;
pub mod session;
