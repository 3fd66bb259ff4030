//! Ring health derived on demand from shared state
//!
//! Nothing here mutates the region: every metric is computed from the
//! descriptor's `write_head` and the head slot's header at call time, so
//! any attached process can probe any topic. Subscriber lag is a
//! per-subscriber property; the caller passes the cursor it wants judged.

use serde::Serialize;

use crate::error::{BusError, Result};
use crate::registry::BusRegion;
use crate::ring::now_monotonic_ns;

/// Point-in-time health snapshot of one topic ring.
///
/// The JSON field names are the stable export surface.
#[derive(Debug, Clone, Serialize)]
pub struct RingHealth {
    /// Topic name the snapshot was taken for
    pub topic: String,
    /// Total messages ever reserved (`write_head`)
    pub published: u64,
    /// Commit timestamp of the newest fully committed message, or 0 when
    /// the head slot is still being committed or nothing was published
    pub last_pub_ns: u64,
    /// Messages the sampled subscriber is behind, 0 when no cursor given
    pub lag: u64,
}

impl RingHealth {
    /// Whether the sampled lag exceeds a threshold in slots
    pub fn lag_exceeds(&self, threshold_slots: u64) -> bool {
        self.lag > threshold_slots
    }

    /// Whether the ring has been silent longer than `threshold_ns` as of
    /// `now_ns`. A ring that never published is not considered silent.
    pub fn is_silent(&self, now_ns: u64, threshold_ns: u64) -> bool {
        if self.last_pub_ns == 0 {
            return false;
        }
        now_ns.saturating_sub(self.last_pub_ns) > threshold_ns
    }

    /// Compact single-line JSON export
    pub fn to_json_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| BusError::serialization(e.to_string()))
    }
}

/// Sample the health of `topic`, judging lag against `last_seq` if the
/// caller supplies a subscriber cursor.
pub fn sample(region: &BusRegion, topic: &str, last_seq: Option<u64>) -> Result<RingHealth> {
    let entry = region.topic(topic)?;
    let ring = region.ring(entry);

    let head = ring.write_head();
    let mut last_pub_ns = 0;
    if head > 0 {
        let idx = ring.index_of(head);
        let ts = ring.slot_timestamp_ns(idx);
        // The timestamp only counts once the head slot's commit landed;
        // mid-commit the value is unknown.
        if ring.seq(idx).load(std::sync::atomic::Ordering::Acquire) == head {
            last_pub_ns = ts;
        }
    }

    let lag = match last_seq {
        Some(cursor) => head.saturating_sub(cursor),
        None => 0,
    };

    Ok(RingHealth {
        topic: topic.to_string(),
        published: head,
        last_pub_ns,
        lag,
    })
}

/// Whether a subscriber cursor trails the writer by more than
/// `threshold_slots` messages.
pub fn check_lag(
    region: &BusRegion,
    topic: &str,
    last_seq: u64,
    threshold_slots: u64,
) -> Result<bool> {
    let health = sample(region, topic, Some(last_seq))?;
    Ok(health.lag_exceeds(threshold_slots))
}

/// Whether the ring has published nothing for longer than `timeout_ms`.
/// A ring that never published reports `false`.
pub fn detect_inactivity(region: &BusRegion, topic: &str, timeout_ms: u64) -> Result<bool> {
    let health = sample(region, topic, None)?;
    Ok(health.is_silent(now_monotonic_ns(), timeout_ms * 1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lag_threshold() {
        let health = RingHealth {
            topic: "t".to_string(),
            published: 100,
            last_pub_ns: 1,
            lag: 10,
        };
        assert!(health.lag_exceeds(9));
        assert!(!health.lag_exceeds(10));
    }

    #[test]
    fn test_silence_requires_a_publish() {
        let never = RingHealth {
            topic: "t".to_string(),
            published: 0,
            last_pub_ns: 0,
            lag: 0,
        };
        assert!(!never.is_silent(1_000_000_000, 1));

        let stale = RingHealth {
            topic: "t".to_string(),
            published: 5,
            last_pub_ns: 1_000,
            lag: 0,
        };
        assert!(stale.is_silent(2_000_000_000, 1_000_000));
        assert!(!stale.is_silent(2_000, 1_000_000));
    }

    #[test]
    fn test_json_line_fields() {
        let health = RingHealth {
            topic: "imu".to_string(),
            published: 42,
            last_pub_ns: 7,
            lag: 3,
        };
        let line = health.to_json_line().unwrap();
        assert!(line.contains("\"topic\":\"imu\""));
        assert!(line.contains("\"published\":42"));
        assert!(line.contains("\"last_pub_ns\":7"));
        assert!(line.contains("\"lag\":3"));
        assert!(!line.contains('\n'));
    }
}
