pub mod api;
pub mod limits;
pub mod models;

pub use models::{SessionStatus, VideoContainer, VideoStatus};
