// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides the command queue domain types.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Commands, results, transactions, metrics, events, configuration

pub mod command;
pub mod error;
pub mod events;
pub mod metrics;
pub mod queue_config;
pub mod resources;
pub mod schedule;
pub mod transaction;
