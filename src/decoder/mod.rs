pub mod camera;
pub mod frame_data;
pub mod video;

pub use camera::{Camera, CameraInfo, FrameSource};
pub use frame_data::FrameData;
pub use video::{FrameSink, ImageSink, JpegWriter, SeekableSource, VideoFile, VideoFileWriter};
