// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `swarmflow-swarm` — Swarm Manager Collaborator
//!
//! Owns swarms, their agents and the tasks handed to them. The command queue
//! core never touches swarm state directly; every command goes through the
//! [`application::SwarmManager`] contract defined here.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `Swarm`, `SwarmId`, `AgentId`, `TaskSpec`, `SwarmError` |
//! | [`application`] | Application | `SwarmManager` contract |
//! | [`infrastructure`] | Infrastructure | `InMemorySwarmManager` |
//!
//! ## Notes
//!
//! Swarms are tracked in memory only. Topology algorithms and agent
//! scheduling heuristics live outside this crate.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use application::SwarmManager;
pub use domain::*;
pub use infrastructure::InMemorySwarmManager;
