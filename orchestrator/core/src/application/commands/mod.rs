// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Command Variants
//!
//! | Command | Manager call | Undo | Estimate |
//! |---------|--------------|------|----------|
//! | [`SwarmInitCommand`] | `initialize_swarm` | `destroy_swarm` | `agents × 100ms + 1s` |
//! | [`AgentSpawnCommand`] | `spawn_agent` | `destroy_agent` | `500ms` |
//! | [`TaskOrchestrationCommand`] | `orchestrate_task` | — | `200ms × priority` |

pub mod agent_spawn;
pub mod swarm_init;
pub mod task_orchestration;

pub use agent_spawn::{AgentSpawnCommand, AgentSpawnParams};
pub use swarm_init::{SwarmInitCommand, SwarmInitParams};
pub use task_orchestration::{TaskOrchestrationCommand, TaskOrchestrationParams};
