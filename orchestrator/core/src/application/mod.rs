// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides the command queue engine and the swarm command variants.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Bounded dispatch, batching, transactions, retry, scheduling, undo

pub mod command_queue;
pub mod commands;

pub use command_queue::{
    CommandQueue, HistoryEntry, ScheduledCommand, TransactionOutcome, UndoOutcome,
    SHUTDOWN_REASON,
};
