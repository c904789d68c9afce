// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Swarmflow command queue: every swarm, agent and task operation is a
//! [`Command`](domain::command::Command) executed through a bounded
//! [`CommandQueue`](application::CommandQueue) with history, metrics,
//! undo, batching, transactions, retry and scheduling.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain types, queue engine, infrastructure adapters

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use application::{CommandQueue, ScheduledCommand, TransactionOutcome, UndoOutcome};
pub use domain::command::{
    Command, CommandError, CommandResult, CommandType, Environment, ExecutionContext,
    ValidationResult,
};
pub use domain::error::QueueError;
pub use domain::queue_config::{QueueConfig, QueueConfigManifest, RetryPolicy};
pub use infrastructure::event_bus::QueueEventBus;
