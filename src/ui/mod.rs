pub mod menu;
pub mod recorder_app;
pub mod viewer_app;
