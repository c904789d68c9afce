// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::command::{CommandError, CommandType};
use crate::domain::schedule::ScheduleId;
use crate::domain::transaction::{Transaction, TransactionId};
use thiserror::Error;

/// Queue-level failures.
///
/// Command validation and execution failures are not errors; they come back
/// as failed [`CommandResult`](crate::domain::command::CommandResult)s.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Command queue is shutting down")]
    ShuttingDown,

    #[error("Command dispatcher is no longer running")]
    DispatcherUnavailable,

    #[error("{command_type} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        command_type: CommandType,
        attempts: u32,
        last_error: String,
    },

    #[error("Undo of {command_type} failed: {source}")]
    UndoFailed {
        command_type: CommandType,
        #[source]
        source: CommandError,
    },

    #[error("Transaction {id} failed: {reason}")]
    TransactionFailed {
        id: TransactionId,
        reason: String,
        transaction: Box<Transaction>,
    },

    #[error("Scheduled command {0} was cancelled before it ran")]
    ScheduleCancelled(ScheduleId),
}
