pub mod admin_gate;
pub mod archive_service;
pub mod media_service;
