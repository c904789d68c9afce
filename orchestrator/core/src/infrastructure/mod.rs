// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides infrastructure adapters for the command queue.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Event streaming and native resource sampling

pub mod event_bus;
pub mod resource_sampler;
