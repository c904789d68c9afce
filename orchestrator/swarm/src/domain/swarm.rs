// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Domain Aggregates
//!
//! Defines the types the swarm manager contract speaks in:
//!
//! - [`Swarm`] — aggregate root tracking topology and agent membership.
//! - [`SwarmId`], [`AgentId`], [`TaskId`] — unique identifiers (UUID newtypes).
//! - [`Topology`] — the supported communication layouts of a swarm.
//! - [`SwarmConfig`], [`AgentSpec`], [`TaskSpec`] — requests handed to a manager.
//! - [`SwarmStatus`] — point-in-time health report for one swarm.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a [`Swarm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwarmId(pub Uuid);

impl SwarmId {
    /// Generate a new random `SwarmId`.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SwarmId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SwarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A unique identifier for an agent spawned into a swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a task handed to a swarm for orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Communication layout of a swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    Mesh,
    Hierarchical,
    Ring,
    Star,
}

impl Topology {
    pub const ALL: [Topology; 4] = [
        Topology::Mesh,
        Topology::Hierarchical,
        Topology::Ring,
        Topology::Star,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::Mesh => "mesh",
            Topology::Hierarchical => "hierarchical",
            Topology::Ring => "ring",
            Topology::Star => "star",
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topology {
    type Err = SwarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topology::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SwarmError::InvalidTopology(s.to_string()))
    }
}

/// Request to bring up a new swarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmConfig {
    pub topology: Topology,
    /// Upper bound on agents the swarm will accept.
    pub max_agents: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Request to add one agent to an existing swarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub agent_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Scheduling priority of an orchestrated task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

/// Task handed to the swarm manager for distribution across agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub description: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swarm_id: Option<SwarmId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_agents: Option<u32>,
}

/// Health snapshot reported by the manager for a single swarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmStatus {
    pub id: SwarmId,
    pub topology: Topology,
    pub agent_count: usize,
    pub max_agents: u32,
    pub healthy: bool,
}

/// Aggregate root for a group of coordinated agents.
///
/// # Invariants
///
/// - `agents.len()` never exceeds `max_agents`.
/// - An agent belongs to exactly one swarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swarm {
    pub id: SwarmId,
    pub topology: Topology,
    pub max_agents: u32,
    pub strategy: Option<String>,
    pub name: Option<String>,
    pub agents: HashSet<AgentId>,
    pub created_at: DateTime<Utc>,
}

impl Swarm {
    pub fn new(config: SwarmConfig) -> Self {
        Self {
            id: SwarmId::new(),
            topology: config.topology,
            max_agents: config.max_agents,
            strategy: config.strategy,
            name: config.name,
            agents: HashSet::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.agents.len() >= self.max_agents as usize
    }

    /// Add an agent, refusing once the swarm is at capacity.
    pub fn admit(&mut self, agent_id: AgentId) -> Result<(), SwarmError> {
        if self.is_full() {
            return Err(SwarmError::SwarmAtCapacity {
                swarm_id: self.id,
                max_agents: self.max_agents,
            });
        }
        self.agents.insert(agent_id);
        Ok(())
    }
}

/// Errors that can occur during swarm management.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SwarmError {
    #[error("Unknown topology '{0}'")]
    InvalidTopology(String),

    #[error("Swarm {0} not found")]
    SwarmNotFound(SwarmId),

    #[error("Agent {0} not found")]
    AgentNotFound(AgentId),

    #[error("Swarm {swarm_id} is at capacity ({max_agents} agents)")]
    SwarmAtCapacity { swarm_id: SwarmId, max_agents: u32 },

    #[error("Swarm manager is unavailable: {0}")]
    Unavailable(String),
}
