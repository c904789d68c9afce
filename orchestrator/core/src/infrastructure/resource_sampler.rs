// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Resource Sampler
//!
//! Native [`ResourceSampler`] implementations.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Measures available CPU and memory capacity for commands
//!
//! [`SystemResourceSampler`] reads `/proc/loadavg` and `/proc/meminfo` on
//! Linux. Other platforms, and any read failure, report full availability so
//! that validation never fails because of a missing measurement.

use crate::domain::resources::{ResourceMetrics, ResourceSampler};
use parking_lot::Mutex;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResourceSampler;

impl SystemResourceSampler {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceSampler for SystemResourceSampler {
    fn sample(&self) -> ResourceMetrics {
        ResourceMetrics::new(
            available_cpu().unwrap_or(1.0),
            available_memory().unwrap_or(1.0),
            1.0,
            1.0,
        )
    }
}

#[cfg(target_os = "linux")]
fn available_cpu() -> Option<f64> {
    let loadavg = std::fs::read_to_string("/proc/loadavg").ok()?;
    let load: f64 = loadavg.split_whitespace().next()?.parse().ok()?;
    let cores = std::thread::available_parallelism().ok()?.get() as f64;
    Some((1.0 - load / cores).clamp(0.0, 1.0))
}

#[cfg(not(target_os = "linux"))]
fn available_cpu() -> Option<f64> {
    None
}

#[cfg(target_os = "linux")]
fn available_memory() -> Option<f64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_meminfo(&meminfo)
}

#[cfg(not(target_os = "linux"))]
fn available_memory() -> Option<f64> {
    None
}

/// Fraction `MemAvailable / MemTotal` from a `/proc/meminfo` dump.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_meminfo(meminfo: &str) -> Option<f64> {
    let field = |name: &str| -> Option<f64> {
        meminfo
            .lines()
            .find(|line| line.starts_with(name))?
            .split_whitespace()
            .nth(1)?
            .parse()
            .ok()
    };

    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    if total <= 0.0 {
        return None;
    }
    Some((available / total).clamp(0.0, 1.0))
}

/// Sampler returning scripted values; each call pops the next sample and the
/// last one repeats forever.
pub struct FixedResourceSampler {
    samples: Mutex<Vec<ResourceMetrics>>,
}

impl FixedResourceSampler {
    pub fn new(sample: ResourceMetrics) -> Self {
        Self::sequence(vec![sample])
    }

    /// `samples` must not be empty; an empty sequence behaves like
    /// [`ResourceMetrics::zero`].
    pub fn sequence(mut samples: Vec<ResourceMetrics>) -> Self {
        samples.reverse();
        Self {
            samples: Mutex::new(samples),
        }
    }
}

impl ResourceSampler for FixedResourceSampler {
    fn sample(&self) -> ResourceMetrics {
        let mut samples = self.samples.lock();
        let next = if samples.len() > 1 {
            samples.pop()
        } else {
            samples.last().copied()
        };
        let mut sample = next.unwrap_or_else(ResourceMetrics::zero);
        sample.timestamp = chrono::Utc::now();
        sample
    }
}
