pub mod session;
pub mod upload;

pub use session::ViewerSession;
pub use upload::{accept_batch, load_batch, validate_upload, BatchOutcome, UploadedImage};
