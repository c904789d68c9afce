// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::command::CommandType;
use serde::{Deserialize, Serialize};

/// Observable queue events.
///
/// Serialized with an `event` tag carrying the wire name
/// (`queue:enqueued`, `command:executed`, ...) and camelCase payload fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum QueueEvent {
    #[serde(rename = "queue:enqueued", rename_all = "camelCase")]
    Enqueued {
        command_type: CommandType,
        queue_size: usize,
    },
    #[serde(rename = "command:executed", rename_all = "camelCase")]
    CommandExecuted {
        command_type: CommandType,
        success: bool,
        /// Milliseconds.
        execution_time: u64,
    },
    #[serde(rename = "command:error", rename_all = "camelCase")]
    CommandError {
        command_type: CommandType,
        error: String,
    },
    #[serde(rename = "command:undone", rename_all = "camelCase")]
    CommandUndone { command_type: CommandType },
    #[serde(rename = "command:undo_failed", rename_all = "camelCase")]
    CommandUndoFailed {
        command_type: CommandType,
        error: String,
    },
    #[serde(rename = "queue:shutdown")]
    Shutdown,
}

impl QueueEvent {
    pub fn name(&self) -> &'static str {
        match self {
            QueueEvent::Enqueued { .. } => "queue:enqueued",
            QueueEvent::CommandExecuted { .. } => "command:executed",
            QueueEvent::CommandError { .. } => "command:error",
            QueueEvent::CommandUndone { .. } => "command:undone",
            QueueEvent::CommandUndoFailed { .. } => "command:undo_failed",
            QueueEvent::Shutdown => "queue:shutdown",
        }
    }

    /// Command type the event concerns, if any.
    pub fn command_type(&self) -> Option<CommandType> {
        match self {
            QueueEvent::Enqueued { command_type, .. }
            | QueueEvent::CommandExecuted { command_type, .. }
            | QueueEvent::CommandError { command_type, .. }
            | QueueEvent::CommandUndone { command_type }
            | QueueEvent::CommandUndoFailed { command_type, .. } => Some(*command_type),
            QueueEvent::Shutdown => None,
        }
    }
}
