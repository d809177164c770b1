//! Guest-side flows: the upload form, voice capture, and the HTTP transport
//! the form submits through.

pub mod http;
pub mod submission;
pub mod voice;
