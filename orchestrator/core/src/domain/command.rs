// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Command Domain
//!
//! A [`Command`] is a validated, optionally undoable unit of work standing for
//! one swarm, agent or task operation. Every such operation flows through the
//! [`CommandQueue`](crate::application::command_queue::CommandQueue) as a
//! command.
//!
//! ## Capability Set
//!
//! | Capability | Required | Notes |
//! |------------|----------|-------|
//! | `validate` | yes | aggregates every violated constraint |
//! | `execute` | yes | one side effect against the swarm manager |
//! | `undo` | no | gated by `can_undo()` |
//! | `try_clone` | no | fresh instance without execution-bound state |
//!
//! Outcomes are data: validation and execution failures come back as
//! [`ValidationResult`] / [`CommandResult`] values, never as errors.

use crate::domain::resources::ResourceMetrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use swarmflow_swarm::SwarmError;
use thiserror::Error;

/// Permission strings checked against [`ExecutionContext::permissions`].
pub mod permissions {
    pub const SWARM_CREATE: &str = "swarm:create";
    pub const AGENT_SPAWN: &str = "agent:spawn";
    pub const TASK_ORCHESTRATE: &str = "task:orchestrate";
}

/// Closed set of command variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandType {
    SwarmInit,
    AgentSpawn,
    TaskOrchestrate,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::SwarmInit => "swarm-init",
            CommandType::AgentSpawn => "agent-spawn",
            CommandType::TaskOrchestrate => "task-orchestrate",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deployment environment a command runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
    Test,
}

/// Caller-supplied context, read-only to the command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub environment: Environment,
    pub permissions: Vec<String>,
    /// Available-capacity snapshot taken when the context was built.
    pub resources: ResourceMetrics,
}

impl ExecutionContext {
    pub fn new(session_id: impl Into<String>, environment: Environment) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: Utc::now(),
            environment,
            permissions: Vec::new(),
            resources: ResourceMetrics::new(1.0, 1.0, 1.0, 1.0),
        }
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions.extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn with_resources(mut self, resources: ResourceMetrics) -> Self {
        self.resources = resources;
        self
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// Result of [`Command::validate`]. Produced fresh on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Outcome of a single execution. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time: Duration,
    pub resource_usage: ResourceMetrics,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl CommandResult {
    pub fn success(
        data: serde_json::Value,
        execution_time: Duration,
        resource_usage: ResourceMetrics,
    ) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            execution_time,
            resource_usage,
            warnings: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn failure(error: impl Into<String>, execution_time: Duration) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            execution_time,
            resource_usage: ResourceMetrics::zero(),
            warnings: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Errors raised by [`Command::undo`].
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0} does not support undo")]
    UndoNotSupported(CommandType),

    #[error("{0} has no executed side effect to undo")]
    NothingToUndo(CommandType),

    #[error("Swarm manager error: {0}")]
    Swarm(#[from] SwarmError),
}

#[async_trait]
pub trait Command: Send + Sync + fmt::Debug {
    async fn validate(&self, context: &ExecutionContext) -> ValidationResult;

    async fn execute(&self, context: &ExecutionContext) -> CommandResult;

    /// Reverse the side effect of the last successful `execute`.
    async fn undo(&self) -> Result<(), CommandError> {
        Err(CommandError::UndoNotSupported(self.command_type()))
    }

    /// Whether `undo` is currently meaningful for this instance.
    fn can_undo(&self) -> bool {
        false
    }

    fn command_type(&self) -> CommandType;

    fn estimated_duration(&self) -> Duration;

    fn description(&self) -> String;

    fn required_permissions(&self) -> Vec<&'static str>;

    /// Fresh instance with identical configuration and no execution-bound
    /// state. `None` when the variant cannot be cloned.
    fn try_clone(&self) -> Option<Arc<dyn Command>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_result_accumulates() {
        let mut result = ValidationResult::new();
        assert!(result.valid);

        result.warn("low memory");
        assert!(result.valid);

        result.error("missing permission");
        result.error("unknown topology");
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.warnings, vec!["low memory".to_string()]);
    }

    #[test]
    fn test_context_permissions() {
        let context = ExecutionContext::new("session-1", Environment::Test)
            .with_permissions([permissions::SWARM_CREATE]);

        assert!(context.has_permission("swarm:create"));
        assert!(!context.has_permission("agent:spawn"));
    }

    #[test]
    fn test_command_type_wire_names() {
        assert_eq!(
            serde_json::to_value(CommandType::TaskOrchestrate).unwrap(),
            serde_json::json!("task-orchestrate")
        );
        assert_eq!(CommandType::SwarmInit.to_string(), "swarm-init");
    }
}
