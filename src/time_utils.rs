// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Re-format a provider timestamp in UTC with a `Z` suffix.
///
/// Stored timestamps are compared as strings, so they must share one format.
/// Returns `None` for anything that is not RFC3339.
pub fn normalize_rfc3339(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| format_utc_rfc3339(dt.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_offset_timestamp() {
        assert_eq!(
            normalize_rfc3339("2024-05-01T14:00:00+02:00").as_deref(),
            Some("2024-05-01T12:00:00Z")
        );
    }

    #[test]
    fn test_normalize_drops_fractional_seconds() {
        assert_eq!(
            normalize_rfc3339("2024-05-01T12:00:00.123Z").as_deref(),
            Some("2024-05-01T12:00:00Z")
        );
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert_eq!(normalize_rfc3339("yesterday"), None);
    }
}
