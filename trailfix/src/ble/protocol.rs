//! GPS text frame parsing.
//!
//! The peripheral notifies UTF-8 text of the form `"<lat>,<lon>"`, possibly
//! padded with whitespace or a trailing newline. Anything else is a
//! [`FrameError`]; the caller logs and drops it.

use thiserror::Error;

use crate::geo::{GeoError, GeoPoint};

/// Reasons a notification frame is dropped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    /// Payload is not valid UTF-8.
    #[error("Frame is not valid UTF-8")]
    NotUtf8,

    /// Payload does not contain exactly two comma-separated fields.
    #[error("Expected 2 comma-separated fields, got {0}")]
    FieldCount(usize),

    /// A field is not a floating-point number.
    #[error("Invalid number in {field} field: '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    /// Coordinates parsed but fall outside the valid ranges.
    #[error(transparent)]
    OutOfRange(#[from] GeoError),
}

/// Parse one notification payload into a validated point.
pub fn parse_frame(data: &[u8]) -> Result<GeoPoint, FrameError> {
    let text = std::str::from_utf8(data).map_err(|_| FrameError::NotUtf8)?;
    let text = text.trim();

    let fields: Vec<&str> = text.split(',').collect();
    if fields.len() != 2 {
        return Err(FrameError::FieldCount(fields.len()));
    }

    let latitude = parse_field(fields[0], "latitude")?;
    let longitude = parse_field(fields[1], "longitude")?;

    Ok(GeoPoint::new(latitude, longitude)?)
}

fn parse_field(raw: &str, field: &'static str) -> Result<f64, FrameError> {
    let value = raw.trim();
    value.parse::<f64>().map_err(|_| FrameError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}
