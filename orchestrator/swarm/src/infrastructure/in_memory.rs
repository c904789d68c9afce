// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory [`SwarmManager`].
//!
//! Tracks swarms, agent membership and orchestrated tasks in process memory.
//! State is lost on restart.

use crate::application::SwarmManager;
use crate::domain::{
    AgentId, AgentSpec, Swarm, SwarmConfig, SwarmError, SwarmId, SwarmStatus, TaskId, TaskSpec,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

#[derive(Default)]
struct Registry {
    swarms: HashMap<SwarmId, Swarm>,
    agents: HashMap<AgentId, (SwarmId, AgentSpec)>,
    tasks: HashMap<TaskId, TaskSpec>,
}

pub struct InMemorySwarmManager {
    registry: RwLock<Registry>,
    healthy: AtomicBool,
}

impl InMemorySwarmManager {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            healthy: AtomicBool::new(true),
        }
    }

    /// Flip the manager-wide health flag. Unhealthy managers also report every
    /// swarm as unhealthy.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn swarm_count(&self) -> usize {
        self.registry.read().swarms.len()
    }

    pub fn agent_count(&self) -> usize {
        self.registry.read().agents.len()
    }

    pub fn task(&self, task_id: TaskId) -> Option<TaskSpec> {
        self.registry.read().tasks.get(&task_id).cloned()
    }

    pub fn swarm(&self, swarm_id: SwarmId) -> Option<Swarm> {
        self.registry.read().swarms.get(&swarm_id).cloned()
    }
}

impl Default for InMemorySwarmManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SwarmManager for InMemorySwarmManager {
    async fn initialize_swarm(&self, config: SwarmConfig) -> Result<SwarmId, SwarmError> {
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(SwarmError::Unavailable("manager is unhealthy".to_string()));
        }

        let swarm = Swarm::new(config);
        let swarm_id = swarm.id;
        info!(%swarm_id, topology = %swarm.topology, max_agents = swarm.max_agents, "Swarm initialized");
        self.registry.write().swarms.insert(swarm_id, swarm);
        Ok(swarm_id)
    }

    async fn destroy_swarm(&self, swarm_id: SwarmId) -> Result<(), SwarmError> {
        let mut registry = self.registry.write();
        let swarm = registry
            .swarms
            .remove(&swarm_id)
            .ok_or(SwarmError::SwarmNotFound(swarm_id))?;

        // Members go down with their swarm.
        for agent_id in &swarm.agents {
            registry.agents.remove(agent_id);
        }
        info!(%swarm_id, agents = swarm.agents.len(), "Swarm destroyed");
        Ok(())
    }

    async fn spawn_agent(&self, swarm_id: SwarmId, spec: AgentSpec) -> Result<AgentId, SwarmError> {
        let mut registry = self.registry.write();
        let swarm = registry
            .swarms
            .get_mut(&swarm_id)
            .ok_or(SwarmError::SwarmNotFound(swarm_id))?;

        let agent_id = AgentId::new();
        swarm.admit(agent_id)?;
        debug!(%swarm_id, %agent_id, agent_type = %spec.agent_type, "Agent spawned");
        registry.agents.insert(agent_id, (swarm_id, spec));
        Ok(agent_id)
    }

    async fn destroy_agent(&self, agent_id: AgentId) -> Result<(), SwarmError> {
        let mut registry = self.registry.write();
        let (swarm_id, _) = registry
            .agents
            .remove(&agent_id)
            .ok_or(SwarmError::AgentNotFound(agent_id))?;

        if let Some(swarm) = registry.swarms.get_mut(&swarm_id) {
            swarm.agents.remove(&agent_id);
        }
        debug!(%swarm_id, %agent_id, "Agent destroyed");
        Ok(())
    }

    async fn get_swarm_status(&self, swarm_id: SwarmId) -> Result<SwarmStatus, SwarmError> {
        let registry = self.registry.read();
        let swarm = registry
            .swarms
            .get(&swarm_id)
            .ok_or(SwarmError::SwarmNotFound(swarm_id))?;

        Ok(SwarmStatus {
            id: swarm.id,
            topology: swarm.topology,
            agent_count: swarm.agents.len(),
            max_agents: swarm.max_agents,
            healthy: self.healthy.load(Ordering::SeqCst),
        })
    }

    async fn orchestrate_task(&self, task: TaskSpec) -> Result<TaskId, SwarmError> {
        let mut registry = self.registry.write();
        if let Some(swarm_id) = task.swarm_id {
            if !registry.swarms.contains_key(&swarm_id) {
                return Err(SwarmError::SwarmNotFound(swarm_id));
            }
        }

        let task_id = TaskId::new();
        debug!(%task_id, priority = ?task.priority, "Task orchestrated");
        registry.tasks.insert(task_id, task);
        Ok(task_id)
    }

    async fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}
