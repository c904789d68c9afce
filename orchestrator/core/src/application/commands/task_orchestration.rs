// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::command::{
    permissions, Command, CommandResult, CommandType, ExecutionContext, ValidationResult,
};
use crate::domain::resources::{ResourceMetrics, ResourceSampler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use swarmflow_swarm::{SwarmId, SwarmManager, TaskPriority, TaskSpec};
use tracing::debug;

const BASE_ESTIMATE_MS: f64 = 200.0;

fn priority_multiplier(priority: TaskPriority) -> f64 {
    match priority {
        TaskPriority::Critical => 0.5,
        TaskPriority::High => 0.7,
        TaskPriority::Medium => 1.0,
        TaskPriority::Low => 1.5,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOrchestrationParams {
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

/// Hands a task to the swarm manager. Not undoable.
pub struct TaskOrchestrationCommand {
    params: TaskOrchestrationParams,
    manager: Arc<dyn SwarmManager>,
    sampler: Arc<dyn ResourceSampler>,
}

impl TaskOrchestrationCommand {
    pub fn new(
        params: TaskOrchestrationParams,
        manager: Arc<dyn SwarmManager>,
        sampler: Arc<dyn ResourceSampler>,
    ) -> Self {
        Self {
            params,
            manager,
            sampler,
        }
    }
}

impl std::fmt::Debug for TaskOrchestrationCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskOrchestrationCommand")
            .field("params", &self.params)
            .finish()
    }
}

#[async_trait]
impl Command for TaskOrchestrationCommand {
    async fn validate(&self, context: &ExecutionContext) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.params.description.trim().is_empty() {
            result.error("Task description is required");
        }

        if !context.has_permission(permissions::TASK_ORCHESTRATE) {
            result.error(format!(
                "Missing required permission: {}",
                permissions::TASK_ORCHESTRATE
            ));
        }

        result
    }

    async fn execute(&self, _context: &ExecutionContext) -> CommandResult {
        let started = Instant::now();
        let task = TaskSpec {
            description: self.params.description.clone(),
            priority: self.params.priority,
            swarm_id: self.params.swarm_id,
            strategy: self.params.strategy.clone(),
            max_agents: self.params.max_agents,
        };

        let before = self.sampler.sample();
        let outcome = self.manager.orchestrate_task(task).await;
        let after = self.sampler.sample();

        match outcome {
            Ok(task_id) => {
                debug!(%task_id, priority = ?self.params.priority, "Task orchestrated by command");
                CommandResult::success(
                    serde_json::json!({
                        "taskId": task_id,
                        "priority": self.params.priority,
                    }),
                    started.elapsed(),
                    ResourceMetrics::delta(&before, &after),
                )
                .with_metadata("commandType", serde_json::json!(CommandType::TaskOrchestrate))
            }
            Err(e) => CommandResult::failure(
                format!("Failed to orchestrate task: {}", e),
                started.elapsed(),
            ),
        }
    }

    fn command_type(&self) -> CommandType {
        CommandType::TaskOrchestrate
    }

    fn estimated_duration(&self) -> Duration {
        Duration::from_millis((BASE_ESTIMATE_MS * priority_multiplier(self.params.priority)).round() as u64)
    }

    fn description(&self) -> String {
        format!("Orchestrate task: {}", self.params.description)
    }

    fn required_permissions(&self) -> Vec<&'static str> {
        vec![permissions::TASK_ORCHESTRATE]
    }

    fn try_clone(&self) -> Option<Arc<dyn Command>> {
        Some(Arc::new(Self::new(
            self.params.clone(),
            self.manager.clone(),
            self.sampler.clone(),
        )))
    }
}
