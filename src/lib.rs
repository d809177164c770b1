//! Wedding photo, video, voice and message sharing.
//!
//! Guests post contributions to `/api/upload`; the couple unlocks a JSON
//! dashboard with a shared password and can download everything as one ZIP.
//! Metadata lives in SQLite, uploaded files on local disk.

pub mod classify;
pub mod client;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
