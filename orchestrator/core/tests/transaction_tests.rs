// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod common;

use common::{config, context, Probe, ScriptedCommand};
use std::time::Duration;
use swarmflow_core::application::SHUTDOWN_REASON;
use swarmflow_core::domain::events::QueueEvent;
use swarmflow_core::domain::transaction::TransactionStatus;
use swarmflow_core::{CommandQueue, QueueConfig, QueueError};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_failure_rolls_back_applied_commands() {
    let queue = CommandQueue::with_config(QueueConfig::default());
    let probe = Probe::new();

    let outcome = assert_ok!(
        queue
            .execute_transaction(
                vec![
                    ScriptedCommand::new("a", &probe).undoable().into_arc(),
                    ScriptedCommand::new("b", &probe).undoable().always_failing().into_arc(),
                    ScriptedCommand::new("c", &probe).undoable().into_arc(),
                ],
                context(),
            )
            .await
    );

    let transaction = outcome.transaction;
    assert_eq!(transaction.status, TransactionStatus::RolledBack);
    assert_eq!(transaction.rollback_reason.as_deref(), Some("b failed on attempt 1"));
    assert!(transaction.completed_at.is_some());
    assert_eq!(outcome.results.len(), 2);

    assert_eq!(probe.executed(), vec!["a", "b"]);
    assert_eq!(probe.undone(), vec!["a"]);
    // Rolled back commands cannot be undone a second time.
    assert_eq!(queue.undo_depth(), 0);
    assert!(queue.active_transactions().is_empty());
}

#[tokio::test]
async fn test_all_success_completes() {
    let queue = CommandQueue::with_config(QueueConfig::default());
    let probe = Probe::new();

    let outcome = assert_ok!(
        queue
            .execute_transaction(
                vec![
                    ScriptedCommand::new("a", &probe).undoable().into_arc(),
                    ScriptedCommand::new("b", &probe).into_arc(),
                    ScriptedCommand::new("c", &probe).undoable().into_arc(),
                ],
                context(),
            )
            .await
    );

    assert_eq!(outcome.transaction.status, TransactionStatus::Completed);
    assert!(outcome.transaction.rollback_reason.is_none());
    assert_eq!(outcome.transaction.commands.len(), 3);
    assert!(outcome.results.iter().all(|r| r.success));
    assert_eq!(probe.executed(), vec!["a", "b", "c"]);
    assert!(probe.undone().is_empty());
    assert_eq!(queue.undo_depth(), 2);
    assert!(queue.active_transactions().is_empty());
}

#[tokio::test]
async fn test_rollback_continues_past_failed_undo() {
    let queue = CommandQueue::with_config(QueueConfig::default());
    let probe = Probe::new();
    let mut events = queue.subscribe();

    let outcome = assert_ok!(
        queue
            .execute_transaction(
                vec![
                    ScriptedCommand::new("a", &probe).undoable().into_arc(),
                    ScriptedCommand::new("b", &probe).undo_fails().into_arc(),
                    ScriptedCommand::new("c", &probe).always_failing().into_arc(),
                ],
                context(),
            )
            .await
    );

    assert_eq!(outcome.transaction.status, TransactionStatus::RolledBack);
    assert_eq!(probe.undone(), vec!["b", "a"]);

    let events = events.drain();
    assert!(events
        .iter()
        .any(|event| matches!(event, QueueEvent::CommandUndoFailed { .. })));
    assert!(events
        .iter()
        .any(|event| matches!(event, QueueEvent::CommandUndone { .. })));
}

#[tokio::test]
async fn test_first_command_failure_has_nothing_to_undo() {
    let queue = CommandQueue::with_config(QueueConfig::default());
    let probe = Probe::new();

    let outcome = assert_ok!(
        queue
            .execute_transaction(
                vec![
                    ScriptedCommand::new("a", &probe).invalid().into_arc(),
                    ScriptedCommand::new("b", &probe).undoable().into_arc(),
                ],
                context(),
            )
            .await
    );

    assert_eq!(outcome.transaction.status, TransactionStatus::RolledBack);
    assert!(outcome
        .transaction
        .rollback_reason
        .unwrap_or_default()
        .starts_with("Validation failed"));
    assert!(probe.executed().is_empty());
    assert!(probe.undone().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_drains_in_flight_commands() {
    let queue = CommandQueue::with_config(config(5));
    let probe = Probe::new();

    let running: Vec<_> = ["x", "y", "z"]
        .into_iter()
        .map(|name| {
            let queue = queue.clone();
            let command = ScriptedCommand::new(name, &probe)
                .delay(Duration::from_secs(1))
                .into_arc();
            tokio::spawn(async move { queue.execute(command, context()).await })
        })
        .collect();
    while queue.in_flight() < 3 {
        tokio::task::yield_now().await;
    }

    queue.shutdown().await;

    assert_eq!(queue.in_flight(), 0);
    assert_eq!(queue.history(None).len(), 3);
    for handle in running {
        let result = assert_ok!(handle.await.unwrap());
        assert!(result.success);
    }

    let late = queue
        .execute(ScriptedCommand::new("late", &probe).into_arc(), context())
        .await;
    assert!(matches!(late, Err(QueueError::ShuttingDown)));
    assert_eq!(probe.executed().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_fails_executing_transaction() {
    let queue = CommandQueue::with_config(QueueConfig::default());
    let probe = Probe::new();

    let transaction = {
        let queue = queue.clone();
        let commands = vec![
            ScriptedCommand::new("a", &probe)
                .undoable()
                .delay(Duration::from_secs(1))
                .into_arc(),
            ScriptedCommand::new("b", &probe).undoable().into_arc(),
        ];
        tokio::spawn(async move { queue.execute_transaction(commands, context()).await })
    };
    while queue.in_flight() < 1 {
        tokio::task::yield_now().await;
    }

    queue.shutdown().await;
    // Rolled back by the time shutdown returns, not later.
    assert_eq!(probe.undone(), vec!["a"]);
    let err = assert_err!(transaction.await.unwrap());

    match err {
        QueueError::TransactionFailed {
            reason,
            transaction,
            ..
        } => {
            assert_eq!(reason, SHUTDOWN_REASON);
            assert_eq!(transaction.status, TransactionStatus::Failed);
            assert_eq!(transaction.rollback_reason.as_deref(), Some(SHUTDOWN_REASON));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(probe.executed(), vec!["a"]);
    assert_eq!(probe.undone(), vec!["a"]);
    assert_eq!(queue.undo_depth(), 0);
    assert!(queue.active_transactions().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shutdown_returns_only_after_rollback_on_worker_threads() {
    for _ in 0..20 {
        let queue = CommandQueue::with_config(QueueConfig::default());
        let probe = Probe::new();

        let transaction = {
            let queue = queue.clone();
            let commands = vec![
                ScriptedCommand::new("a", &probe)
                    .undoable()
                    .delay(Duration::from_millis(100))
                    .into_arc(),
                ScriptedCommand::new("b", &probe).undoable().into_arc(),
            ];
            tokio::spawn(async move { queue.execute_transaction(commands, context()).await })
        };
        while probe.executed().is_empty() {
            tokio::task::yield_now().await;
        }

        queue.shutdown().await;

        assert_eq!(probe.executed(), vec!["a"]);
        assert_eq!(probe.undone(), vec!["a"]);
        assert_eq!(queue.undo_depth(), 0);

        let err = assert_err!(transaction.await.unwrap());
        assert!(matches!(err, QueueError::TransactionFailed { ref reason, .. } if reason == SHUTDOWN_REASON));
        assert_eq!(probe.undone(), vec!["a"]);
    }
}

#[tokio::test]
async fn test_transaction_rejected_after_shutdown() {
    let queue = CommandQueue::with_config(QueueConfig::default());
    let probe = Probe::new();
    queue.shutdown().await;

    let err = assert_err!(
        queue
            .execute_transaction(vec![ScriptedCommand::new("a", &probe).into_arc()], context())
            .await
    );
    assert!(matches!(err, QueueError::ShuttingDown));
}
