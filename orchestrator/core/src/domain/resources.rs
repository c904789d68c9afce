// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time resource sample.
///
/// When carried in an [`ExecutionContext`](crate::domain::command::ExecutionContext)
/// each field is the fraction of capacity still available, in `[0.0, 1.0]`.
/// When reported as a command's resource usage it is the delta between a
/// sample taken just before and just after the command's side effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetrics {
    pub cpu: f64,
    pub memory: f64,
    pub network: f64,
    pub storage: f64,
    pub timestamp: DateTime<Utc>,
}

impl ResourceMetrics {
    pub fn new(cpu: f64, memory: f64, network: f64, storage: f64) -> Self {
        Self {
            cpu,
            memory,
            network,
            storage,
            timestamp: Utc::now(),
        }
    }

    /// All-zero sample, used where no measurement was taken.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Change from `before` to `after`, stamped with the later sample's time.
    pub fn delta(before: &ResourceMetrics, after: &ResourceMetrics) -> Self {
        Self {
            cpu: after.cpu - before.cpu,
            memory: after.memory - before.memory,
            network: after.network - before.network,
            storage: after.storage - before.storage,
            timestamp: after.timestamp,
        }
    }
}

impl Default for ResourceMetrics {
    fn default() -> Self {
        Self::zero()
    }
}

/// Platform capability for sampling process/system resources.
pub trait ResourceSampler: Send + Sync {
    fn sample(&self) -> ResourceMetrics;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta() {
        let before = ResourceMetrics::new(0.8, 0.6, 1.0, 0.5);
        let after = ResourceMetrics::new(0.5, 0.5, 1.0, 0.75);

        let delta = ResourceMetrics::delta(&before, &after);
        assert!((delta.cpu + 0.3).abs() < 1e-9);
        assert!((delta.memory + 0.1).abs() < 1e-9);
        assert_eq!(delta.network, 0.0);
        assert_eq!(delta.storage, 0.25);
        assert_eq!(delta.timestamp, after.timestamp);
    }
}
