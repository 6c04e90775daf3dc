// Utility functions
pub mod error;

pub use error::*;

/// Current time as an RFC 3339 UTC string with millisecond precision
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
