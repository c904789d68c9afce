// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides swarm manager implementations.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements the `SwarmManager` contract

pub mod in_memory;

pub use in_memory::InMemorySwarmManager;
