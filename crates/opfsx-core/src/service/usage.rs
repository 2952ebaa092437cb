//! Storage usage reporting.

use serde::Serialize;

use crate::error::CoreResult;
use crate::fs::store::{StorageEstimate, Store};

const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Derived view of the host's usage estimate.
///
/// Recomputed on every refresh and never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub usage_bytes: u64,
    pub quota_bytes: u64,
    /// Percentage of the quota in use, floored to two decimals.
    pub usage_percent: f64,
    pub usage_label: String,
    pub quota_label: String,
}

impl UsageSnapshot {
    pub fn from_estimate(estimate: StorageEstimate) -> Self {
        let usage_percent = if estimate.quota == 0 {
            0.0
        } else {
            (estimate.usage as f64 / estimate.quota as f64 * 10_000.0).floor() / 100.0
        };
        Self {
            usage_bytes: estimate.usage,
            quota_bytes: estimate.quota,
            usage_percent,
            usage_label: format_bytes(estimate.usage),
            quota_label: format_bytes(estimate.quota),
        }
    }
}

impl Default for UsageSnapshot {
    fn default() -> Self {
        Self::from_estimate(StorageEstimate::default())
    }
}

/// Formats a byte count with binary units, truncated to two decimals
/// (e.g. `"1.50 KB"`).
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value > 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let truncated = (value * 100.0).floor() / 100.0;
    format!("{truncated:.2} {}", UNITS[unit])
}

/// Queries the store's aggregate consumption.
pub async fn report(store: &dyn Store) -> CoreResult<UsageSnapshot> {
    let estimate = store.estimate().await?;
    Ok(UsageSnapshot::from_estimate(estimate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::memory::MemoryStore;

    #[test]
    fn format_small_values_in_bytes() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(512), "512.00 B");
        assert_eq!(format_bytes(1024), "1024.00 B");
    }

    #[test]
    fn format_truncates_instead_of_rounding() {
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1025), "1.00 KB");
        assert_eq!(format_bytes(2047), "1.99 KB");
    }

    #[test]
    fn format_large_units() {
        assert_eq!(format_bytes(10 * 1024 * 1024 * 1024), "10.00 GB");
        assert_eq!(format_bytes(3 * 1024u64.pow(5)), "3.00 PB");
    }

    #[test]
    fn percent_is_floored_to_two_decimals() {
        let snapshot = UsageSnapshot::from_estimate(StorageEstimate {
            usage: 2,
            quota: 3,
        });
        assert!((snapshot.usage_percent - 66.66).abs() < 1e-9);
    }

    #[test]
    fn zero_quota_reports_zero_percent() {
        let snapshot = UsageSnapshot::default();
        assert_eq!(snapshot.usage_percent, 0.0);
        assert_eq!(snapshot.quota_label, "0.00 B");
    }

    #[tokio::test]
    async fn report_reads_store_estimate() {
        let store = MemoryStore::new().with_quota(4096);
        store.put_file("/a", vec![0u8; 1024]).await.unwrap();

        let snapshot = report(&store).await.unwrap();
        assert_eq!(snapshot.usage_bytes, 1024);
        assert!((snapshot.usage_percent - 25.0).abs() < 1e-9);
        assert_eq!(snapshot.usage_label, "1024.00 B");
        assert_eq!(snapshot.quota_label, "4.00 KB");
    }
}
