// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::command::{
    permissions, Command, CommandError, CommandResult, CommandType, ExecutionContext,
    ValidationResult,
};
use crate::domain::resources::{ResourceMetrics, ResourceSampler};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use swarmflow_swarm::{SwarmConfig, SwarmId, SwarmManager, Topology};
use tracing::info;

pub const MAX_AGENT_COUNT: u32 = 100;
pub const LARGE_SWARM_THRESHOLD: u32 = 50;
const MIN_CPU_AVAILABLE: f64 = 0.1;
const LOW_MEMORY_THRESHOLD: f64 = 0.2;

/// Caller-supplied parameters for [`SwarmInitCommand`].
///
/// `topology` stays a string so that unknown layouts surface as validation
/// errors rather than construction failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmInitParams {
    pub topology: String,
    pub agent_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Brings up a swarm through the manager and remembers its id for undo.
pub struct SwarmInitCommand {
    params: SwarmInitParams,
    manager: Arc<dyn SwarmManager>,
    sampler: Arc<dyn ResourceSampler>,
    swarm_id: Mutex<Option<SwarmId>>,
}

impl SwarmInitCommand {
    pub fn new(
        params: SwarmInitParams,
        manager: Arc<dyn SwarmManager>,
        sampler: Arc<dyn ResourceSampler>,
    ) -> Self {
        Self {
            params,
            manager,
            sampler,
            swarm_id: Mutex::new(None),
        }
    }

    pub fn params(&self) -> &SwarmInitParams {
        &self.params
    }

    /// Swarm created by the last successful execution, until undone.
    pub fn swarm_id(&self) -> Option<SwarmId> {
        *self.swarm_id.lock()
    }
}

impl std::fmt::Debug for SwarmInitCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwarmInitCommand")
            .field("params", &self.params)
            .field("swarm_id", &self.swarm_id())
            .finish()
    }
}

#[async_trait]
impl Command for SwarmInitCommand {
    async fn validate(&self, context: &ExecutionContext) -> ValidationResult {
        let mut result = ValidationResult::new();
        let count = self.params.agent_count;

        if count == 0 {
            result.error("Agent count must be greater than 0");
        } else if count > MAX_AGENT_COUNT {
            result.error(format!(
                "Agent count {} exceeds maximum limit of {}",
                count, MAX_AGENT_COUNT
            ));
        } else if count > LARGE_SWARM_THRESHOLD {
            result.warn(format!(
                "Large swarm size ({} agents) may impact performance",
                count
            ));
        }

        if self.params.topology.parse::<Topology>().is_err() {
            result.error(format!(
                "Invalid topology '{}'. Must be one of: mesh, hierarchical, ring, star",
                self.params.topology
            ));
        }

        if !context.has_permission(permissions::SWARM_CREATE) {
            result.error(format!(
                "Missing required permission: {}",
                permissions::SWARM_CREATE
            ));
        }

        if !self.manager.is_healthy().await {
            result.error("Swarm manager is not healthy");
        }

        if context.resources.cpu < MIN_CPU_AVAILABLE {
            result.error("Insufficient CPU resources available");
        }
        if context.resources.memory < LOW_MEMORY_THRESHOLD {
            result.warn("Low memory availability may affect swarm performance");
        }

        result
    }

    async fn execute(&self, _context: &ExecutionContext) -> CommandResult {
        let started = Instant::now();
        let topology = match self.params.topology.parse::<Topology>() {
            Ok(topology) => topology,
            Err(e) => return CommandResult::failure(e.to_string(), started.elapsed()),
        };

        let before = self.sampler.sample();
        let outcome = self
            .manager
            .initialize_swarm(SwarmConfig {
                topology,
                max_agents: self.params.agent_count,
                strategy: self.params.strategy.clone(),
                name: self.params.name.clone(),
            })
            .await;
        let after = self.sampler.sample();

        match outcome {
            Ok(swarm_id) => {
                *self.swarm_id.lock() = Some(swarm_id);
                info!(%swarm_id, %topology, agents = self.params.agent_count, "Swarm initialized by command");
                CommandResult::success(
                    serde_json::json!({
                        "swarmId": swarm_id,
                        "topology": topology,
                        "agentCount": self.params.agent_count,
                    }),
                    started.elapsed(),
                    ResourceMetrics::delta(&before, &after),
                )
                .with_metadata("commandType", serde_json::json!(CommandType::SwarmInit))
            }
            Err(e) => CommandResult::failure(
                format!("Failed to initialize swarm: {}", e),
                started.elapsed(),
            ),
        }
    }

    async fn undo(&self) -> Result<(), CommandError> {
        let swarm_id = self
            .swarm_id()
            .ok_or(CommandError::NothingToUndo(CommandType::SwarmInit))?;

        self.manager.destroy_swarm(swarm_id).await?;
        *self.swarm_id.lock() = None;
        info!(%swarm_id, "Swarm initialization undone");
        Ok(())
    }

    fn can_undo(&self) -> bool {
        self.swarm_id.lock().is_some()
    }

    fn command_type(&self) -> CommandType {
        CommandType::SwarmInit
    }

    fn estimated_duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.params.agent_count) * 100 + 1000)
    }

    fn description(&self) -> String {
        format!(
            "Initialize {} swarm with {} agents",
            self.params.topology, self.params.agent_count
        )
    }

    fn required_permissions(&self) -> Vec<&'static str> {
        vec![permissions::SWARM_CREATE, permissions::AGENT_SPAWN]
    }

    fn try_clone(&self) -> Option<Arc<dyn Command>> {
        Some(Arc::new(Self::new(
            self.params.clone(),
            self.manager.clone(),
            self.sampler.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::command::Environment;
    use crate::infrastructure::resource_sampler::FixedResourceSampler;
    use swarmflow_swarm::InMemorySwarmManager;

    fn command(topology: &str, agent_count: u32, manager: Arc<InMemorySwarmManager>) -> SwarmInitCommand {
        SwarmInitCommand::new(
            SwarmInitParams {
                topology: topology.to_string(),
                agent_count,
                strategy: None,
                name: None,
            },
            manager,
            Arc::new(FixedResourceSampler::new(ResourceMetrics::new(0.9, 0.9, 1.0, 1.0))),
        )
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new("test", Environment::Test)
            .with_permissions([permissions::SWARM_CREATE, permissions::AGENT_SPAWN])
    }

    #[tokio::test]
    async fn test_validate_agent_count_bounds() {
        let manager = Arc::new(InMemorySwarmManager::new());

        let zero = command("mesh", 0, manager.clone()).validate(&context()).await;
        assert!(!zero.valid);

        let large = command("mesh", 75, manager.clone()).validate(&context()).await;
        assert!(large.valid);
        assert_eq!(large.warnings.len(), 1);

        let too_many = command("mesh", 150, manager).validate(&context()).await;
        assert!(!too_many.valid);
        assert!(too_many.errors[0].contains("exceeds maximum limit"));
    }

    #[tokio::test]
    async fn test_validate_aggregates_errors() {
        let manager = Arc::new(InMemorySwarmManager::new());
        manager.set_healthy(false);

        let starved = ExecutionContext::new("test", Environment::Test)
            .with_resources(ResourceMetrics::new(0.05, 0.1, 1.0, 1.0));
        let result = command("torus", 10, manager).validate(&starved).await;

        assert!(!result.valid);
        assert_eq!(result.errors.len(), 4, "{:?}", result.errors);
        assert!(result.errors.iter().any(|e| e.contains("Invalid topology 'torus'")));
        assert!(result.errors.iter().any(|e| e.contains("swarm:create")));
        assert!(result.errors.iter().any(|e| e.contains("not healthy")));
        assert!(result.errors.iter().any(|e| e.contains("CPU")));
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_estimated_duration() {
        let manager = Arc::new(InMemorySwarmManager::new());
        assert_eq!(
            command("ring", 10, manager.clone()).estimated_duration(),
            Duration::from_millis(2000)
        );
        assert_eq!(
            command("ring", 0, manager).estimated_duration(),
            Duration::from_millis(1000)
        );
    }

    #[tokio::test]
    async fn test_clone_drops_execution_state() {
        let manager = Arc::new(InMemorySwarmManager::new());
        let original = command("star", 3, manager);
        assert!(original.execute(&context()).await.success);
        assert!(original.can_undo());

        let clone = original.try_clone().unwrap();
        assert!(!clone.can_undo());
        assert_eq!(clone.description(), original.description());
    }

    #[tokio::test]
    async fn test_undo_without_execution() {
        let manager = Arc::new(InMemorySwarmManager::new());
        let err = command("mesh", 3, manager).undo().await.unwrap_err();
        assert!(matches!(err, CommandError::NothingToUndo(CommandType::SwarmInit)));
    }
}
