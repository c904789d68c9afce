// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Queue Metrics
//!
//! Process-wide aggregates for one queue instance. Updated after every
//! settled execution and reset only by an explicit history clear.
//!
//! All averages are running means: `avg' = avg + (x - avg) / n`.

use crate::domain::command::CommandType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandTypeStats {
    pub count: u64,
    /// Milliseconds.
    pub avg_time: f64,
    /// Fraction of executions of this type that failed, in `[0.0, 1.0]`.
    pub failure_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMetrics {
    /// Every settled execution, successful or not.
    pub total_executed: u64,
    pub total_failed: u64,
    /// Milliseconds.
    pub average_execution_time: f64,
    pub command_type_stats: BTreeMap<CommandType, CommandTypeStats>,
    /// Commands waiting for a slot when the snapshot was taken.
    pub queue_size: usize,
    /// Cumulative execution time in milliseconds.
    pub processing_time: f64,
}

impl QueueMetrics {
    pub fn record(&mut self, command_type: CommandType, success: bool, execution_time: Duration) {
        let millis = execution_time.as_secs_f64() * 1000.0;

        self.total_executed += 1;
        if !success {
            self.total_failed += 1;
        }
        let n = self.total_executed as f64;
        self.average_execution_time += (millis - self.average_execution_time) / n;
        self.processing_time += millis;

        let stats = self.command_type_stats.entry(command_type).or_default();
        stats.count += 1;
        let n = stats.count as f64;
        stats.avg_time += (millis - stats.avg_time) / n;
        let failed = if success { 0.0 } else { 1.0 };
        stats.failure_rate += (failed - stats.failure_rate) / n;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_executed == 0 {
            return 1.0;
        }
        1.0 - self.total_failed as f64 / self.total_executed as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_running_averages() {
        let mut metrics = QueueMetrics::default();
        metrics.record(CommandType::SwarmInit, true, Duration::from_millis(100));
        metrics.record(CommandType::SwarmInit, false, Duration::from_millis(300));
        metrics.record(CommandType::AgentSpawn, true, Duration::from_millis(200));

        assert_eq!(metrics.total_executed, 3);
        assert_eq!(metrics.total_failed, 1);
        assert!(approx(metrics.average_execution_time, 200.0));
        assert!(approx(metrics.processing_time, 600.0));

        let swarm = &metrics.command_type_stats[&CommandType::SwarmInit];
        assert_eq!(swarm.count, 2);
        assert!(approx(swarm.avg_time, 200.0));
        assert!(approx(swarm.failure_rate, 0.5));

        let agent = &metrics.command_type_stats[&CommandType::AgentSpawn];
        assert_eq!(agent.count, 1);
        assert!(approx(agent.failure_rate, 0.0));
    }

    #[test]
    fn test_success_rate() {
        let mut metrics = QueueMetrics::default();
        assert!(approx(metrics.success_rate(), 1.0));

        metrics.record(CommandType::TaskOrchestrate, false, Duration::ZERO);
        metrics.record(CommandType::TaskOrchestrate, true, Duration::ZERO);
        assert!(approx(metrics.success_rate(), 0.5));
    }

    #[test]
    fn test_serializes_with_camel_case_keys() {
        let mut metrics = QueueMetrics::default();
        metrics.record(CommandType::SwarmInit, true, Duration::from_millis(10));

        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["totalExecuted"], 1);
        assert_eq!(json["commandTypeStats"]["swarm-init"]["count"], 1);
    }
}
