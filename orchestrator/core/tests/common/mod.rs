// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use swarmflow_core::domain::command::{
    Command, CommandError, CommandResult, CommandType, ExecutionContext, ValidationResult,
};
use swarmflow_core::domain::resources::ResourceMetrics;
use swarmflow_core::{Environment, QueueConfig};

/// Shared observations across every [`ScriptedCommand`] built from it.
#[derive(Debug, Default)]
pub struct Probe {
    pub executed: Mutex<Vec<String>>,
    pub undone: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl Probe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    pub fn undone(&self) -> Vec<String> {
        self.undone.lock().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Command with scripted timing and outcome.
#[derive(Debug)]
pub struct ScriptedCommand {
    label: String,
    probe: Arc<Probe>,
    command_type: CommandType,
    delay: Duration,
    estimate: Duration,
    /// Executions of this command (and its clones) numbered `<= failures` fail.
    failures: usize,
    attempts: Arc<AtomicUsize>,
    invalid: bool,
    undoable: bool,
    undo_fails: bool,
    applied: Mutex<bool>,
}

impl ScriptedCommand {
    pub fn new(label: &str, probe: &Arc<Probe>) -> Self {
        Self {
            label: label.to_string(),
            probe: probe.clone(),
            command_type: CommandType::TaskOrchestrate,
            delay: Duration::ZERO,
            estimate: Duration::from_millis(100),
            failures: 0,
            attempts: Arc::new(AtomicUsize::new(0)),
            invalid: false,
            undoable: false,
            undo_fails: false,
            applied: Mutex::new(false),
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn estimate(mut self, estimate: Duration) -> Self {
        self.estimate = estimate;
        self
    }

    pub fn failing(mut self, failures: usize) -> Self {
        self.failures = failures;
        self
    }

    pub fn always_failing(self) -> Self {
        self.failing(usize::MAX)
    }

    pub fn invalid(mut self) -> Self {
        self.invalid = true;
        self
    }

    pub fn undoable(mut self) -> Self {
        self.undoable = true;
        self
    }

    pub fn undo_fails(mut self) -> Self {
        self.undoable = true;
        self.undo_fails = true;
        self
    }

    pub fn of_type(mut self, command_type: CommandType) -> Self {
        self.command_type = command_type;
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn into_arc(self) -> Arc<dyn Command> {
        Arc::new(self)
    }
}

#[async_trait]
impl Command for ScriptedCommand {
    async fn validate(&self, _context: &ExecutionContext) -> ValidationResult {
        let mut result = ValidationResult::new();
        if self.invalid {
            result.error(format!("{} is not allowed", self.label));
            result.warn("scripted warning");
        }
        result
    }

    async fn execute(&self, _context: &ExecutionContext) -> CommandResult {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.executed.lock().push(self.label.clone());

        let running = self.probe.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.peak.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.probe.running.fetch_sub(1, Ordering::SeqCst);

        if attempt <= self.failures {
            return CommandResult::failure(format!("{} failed on attempt {}", self.label, attempt), self.delay);
        }

        *self.applied.lock() = true;
        CommandResult::success(
            serde_json::json!({ "label": self.label }),
            self.delay,
            ResourceMetrics::zero(),
        )
    }

    async fn undo(&self) -> Result<(), CommandError> {
        self.probe.undone.lock().push(self.label.clone());
        if self.undo_fails {
            return Err(CommandError::UndoNotSupported(self.command_type));
        }
        *self.applied.lock() = false;
        Ok(())
    }

    fn can_undo(&self) -> bool {
        self.undoable && *self.applied.lock()
    }

    fn command_type(&self) -> CommandType {
        self.command_type
    }

    fn estimated_duration(&self) -> Duration {
        self.estimate
    }

    fn description(&self) -> String {
        format!("scripted {}", self.label)
    }

    fn required_permissions(&self) -> Vec<&'static str> {
        vec![]
    }

    fn try_clone(&self) -> Option<Arc<dyn Command>> {
        Some(Arc::new(Self {
            label: self.label.clone(),
            probe: self.probe.clone(),
            command_type: self.command_type,
            delay: self.delay,
            estimate: self.estimate,
            failures: self.failures,
            attempts: self.attempts.clone(),
            invalid: self.invalid,
            undoable: self.undoable,
            undo_fails: self.undo_fails,
            applied: Mutex::new(false),
        }))
    }
}

pub fn label(result: &CommandResult) -> Option<String> {
    result
        .data
        .as_ref()
        .and_then(|data| data["label"].as_str())
        .map(str::to_string)
}

pub fn context() -> ExecutionContext {
    ExecutionContext::new("integration", Environment::Test)
}

pub fn config(max_concurrent_commands: usize) -> QueueConfig {
    QueueConfig {
        max_concurrent_commands,
        ..QueueConfig::default()
    }
}
