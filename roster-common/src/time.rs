//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC timestamp in the RFC 3339 form stored in bookkeeping columns
pub fn now_rfc3339() -> String {
    now().to_rfc3339()
}
