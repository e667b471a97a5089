//! Attribute blob decoding.
//!
//! Node names sometimes arrive as an encoded blob instead of a structured
//! field. The blob is URL-safe base64 (padding optional) of a 4-byte prefix
//! followed by a JSON object whose `"n"` key holds the name.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use serde::Deserialize;
use thiserror::Error;

/// Length of the provider prefix preceding the JSON payload.
const PREFIX_LEN: usize = 4;

const ATTRIBUTE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Reasons an attribute blob could not be decoded.
#[derive(Error, Debug)]
pub enum AttributeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("blob shorter than the {PREFIX_LEN}-byte prefix")]
    TooShort,

    #[error("invalid attribute JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("attribute JSON has no name")]
    MissingName,
}

#[derive(Deserialize)]
struct NameAttribute {
    n: Option<String>,
}

/// Decode an attribute blob into the node name.
pub fn decode_attributes(blob: &str) -> Result<String, AttributeError> {
    // Padding is tolerated in any amount, including none.
    let bytes = ATTRIBUTE_ENGINE.decode(blob.trim().trim_end_matches('='))?;
    if bytes.len() < PREFIX_LEN {
        return Err(AttributeError::TooShort);
    }

    let payload = &bytes[PREFIX_LEN..];
    let end = payload
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |pos| pos + 1);

    let attribute: NameAttribute = serde_json::from_slice(&payload[..end])?;
    attribute.n.ok_or(AttributeError::MissingName)
}

/// Decode an attribute blob, logging and discarding any failure.
pub fn decode_name(blob: &str) -> Option<String> {
    match decode_attributes(blob) {
        Ok(name) => Some(name),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to decode node attributes");
            None
        }
    }
}
