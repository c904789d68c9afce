// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Transaction records.
//!
//! A [`Transaction`] groups commands that run in strict list order with
//! all-or-nothing rollback. Records live in the queue's active set only while
//! the transaction is in flight.

use crate::domain::command::Command;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Executing,
    Completed,
    RolledBack,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::RolledBack | TransactionStatus::Failed
        )
    }
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub commands: Vec<Arc<dyn Command>>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rollback_reason: Option<String>,
}

impl Transaction {
    pub fn new(commands: Vec<Arc<dyn Command>>) -> Self {
        Self {
            id: TransactionId::new(),
            commands,
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            rollback_reason: None,
        }
    }

    /// Move to a terminal status, stamping the completion time.
    pub fn finish(&mut self, status: TransactionStatus, reason: Option<String>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.completed_at = Some(Utc::now());
        if reason.is_some() {
            self.rollback_reason = reason;
        }
    }
}
