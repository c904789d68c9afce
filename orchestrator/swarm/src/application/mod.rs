// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Swarm manager contract.
//!
//! Commands executed by the command queue reach swarms exclusively through
//! [`SwarmManager`]; the queue core depends on these method contracts only.

use crate::domain::{AgentId, AgentSpec, SwarmConfig, SwarmError, SwarmId, SwarmStatus, TaskId, TaskSpec};
use async_trait::async_trait;

#[async_trait]
pub trait SwarmManager: Send + Sync {
    async fn initialize_swarm(&self, config: SwarmConfig) -> Result<SwarmId, SwarmError>;
    async fn destroy_swarm(&self, swarm_id: SwarmId) -> Result<(), SwarmError>;
    async fn spawn_agent(&self, swarm_id: SwarmId, spec: AgentSpec) -> Result<AgentId, SwarmError>;
    async fn destroy_agent(&self, agent_id: AgentId) -> Result<(), SwarmError>;
    async fn get_swarm_status(&self, swarm_id: SwarmId) -> Result<SwarmStatus, SwarmError>;
    async fn orchestrate_task(&self, task: TaskSpec) -> Result<TaskId, SwarmError>;
    /// Whether the manager as a whole is accepting work.
    async fn is_healthy(&self) -> bool;
}
