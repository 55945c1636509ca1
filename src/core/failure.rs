//! Turning transport failures into user-facing error text

use crate::providers::ProviderError;

/// Shown when a failure carries no usable message
pub const FALLBACK_MESSAGE: &str = "Failed to get response from AI";

pub fn describe_failure(err: &ProviderError) -> String {
    let message = err.to_string();
    let message = message.trim();
    if message.is_empty() {
        FALLBACK_MESSAGE.to_string()
    } else {
        message.to_string()
    }
}
