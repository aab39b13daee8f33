//! Host-side services: capture reading, decoded history, persisted settings.

pub mod capture_service;
pub mod config;
pub mod error;
pub mod logbuf;

pub use capture_service::{CaptureEvent, CaptureService, CaptureSource};
pub use config::AppConfig;
pub use error::CoreError;
pub use logbuf::{LogEntry, LogStore};
