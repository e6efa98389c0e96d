//! The boundary to wherever telemetry documents come from.

use core::fmt;
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::models::shed::{DeviceDoc, DeviceId, DeviceIndexDoc, Resolution, SeriesDoc, SiteDoc};

#[derive(Debug)]
pub enum SourceError {
    Transport(String),
    Http { status: u16, message: String },
    /// Body was not the expected JSON shape; `path` locates the offending field.
    Decode { path: String, message: String },
    Unavailable(String),
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Transport(s) => write!(f, "transport error: {}", s),
            SourceError::Http { status, message } => write!(f, "http {}: {}", status, message),
            SourceError::Decode { path, message } => write!(f, "decode error at {}: {}", path, message),
            SourceError::Unavailable(s) => write!(f, "source unavailable: {}", s),
        }
    }
}

impl Error for SourceError {}

/// Supplies raw hierarchical documents on demand. Implementations are shared
/// by the builder's fetch workers, hence `Send + Sync`.
pub trait TelemetrySource: Send + Sync {
    fn list_sites(&self) -> Result<Vec<SiteDoc>, SourceError>;

    fn list_device_ids_by_category(&self) -> Result<DeviceIndexDoc, SourceError>;

    fn get_device(&self, id: &DeviceId) -> Result<DeviceDoc, SourceError>;

    fn get_device_series(&self, id: &DeviceId, resolution: Resolution) -> Result<SeriesDoc, SourceError>;
}
