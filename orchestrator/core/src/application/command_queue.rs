// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Command Queue Engine
//!
//! Every swarm, agent and task operation flows through a [`CommandQueue`].
//! The queue owns all of its mutable state (pending count, in-flight count,
//! history, undo stack, metrics, active transactions, pending timers); several
//! independent queues are simply several `CommandQueue` values.
//!
//! ## Dispatch
//!
//! `execute` pushes the command onto an unbounded FIFO channel. A single
//! dispatcher task receives from that channel and acquires a semaphore slot
//! before spawning a worker, so at most `max_concurrent_commands` commands are
//! in flight and waiting commands start in arrival order. The dispatcher only
//! ever waits on the channel or on the semaphore; a worker gives its slot back
//! once the execution has settled and been recorded.
//!
//! ## Execution Modes
//!
//! | Mode | Entry point | Semantics |
//! |------|-------------|-----------|
//! | Single | [`CommandQueue::execute`] | validate, execute, record |
//! | Batch | [`CommandQueue::execute_batch`] | fast group in parallel chunks, then slow group sequentially |
//! | Transaction | [`CommandQueue::execute_transaction`] | strict order, reverse-order rollback on first failure |
//! | Retry | [`CommandQueue::retry_command`] | exponential backoff, error after the last attempt |
//! | Scheduled | [`CommandQueue::schedule_command`] | deferred by a cancellable timer |
//!
//! Command failures are data ([`CommandResult::success`] is `false`). Only
//! retry exhaustion, undo failures, failed transactions and queue-level
//! conditions come back as [`QueueError`].

use crate::domain::command::{Command, CommandResult, CommandType, ExecutionContext};
use crate::domain::error::QueueError;
use crate::domain::events::QueueEvent;
use crate::domain::metrics::QueueMetrics;
use crate::domain::queue_config::{QueueConfig, RetryPolicy};
use crate::domain::schedule::ScheduleId;
use crate::domain::transaction::{Transaction, TransactionId, TransactionStatus};
use crate::infrastructure::event_bus::{EventReceiver, QueueEventBus};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch, Semaphore};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

/// Rollback reason recorded on transactions cut short by [`CommandQueue::shutdown`].
pub const SHUTDOWN_REASON: &str = "System shutdown";

/// One settled execution.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub command: Arc<dyn Command>,
    pub result: CommandResult,
    pub timestamp: DateTime<Utc>,
}

/// Final record and per-command results of a transaction that reached
/// `completed` or `rolled_back`.
#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    pub transaction: Transaction,
    pub results: Vec<CommandResult>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    NothingToUndo,
    Undone {
        command_type: CommandType,
        description: String,
    },
}

struct QueuedCommand {
    command: Arc<dyn Command>,
    context: ExecutionContext,
    /// Set when the command runs as a transaction step.
    transaction: Option<TransactionId>,
    responder: oneshot::Sender<CommandResult>,
}

struct ActiveTransaction {
    record: Transaction,
    /// Commands that succeeded so far, in execution order. Appended in the
    /// same critical section that settles the command. Whoever takes this
    /// list owns their rollback.
    applied: Vec<Arc<dyn Command>>,
}

struct QueueState {
    accepting: bool,
    queued: usize,
    in_flight: usize,
    /// Transaction rollbacks whose undo calls are still running.
    rolling_back: usize,
    history: Vec<HistoryEntry>,
    undo_stack: Vec<Arc<dyn Command>>,
    metrics: QueueMetrics,
    transactions: HashMap<TransactionId, ActiveTransaction>,
    scheduled: HashMap<ScheduleId, AbortHandle>,
}

impl QueueState {
    fn new() -> Self {
        Self {
            accepting: true,
            queued: 0,
            in_flight: 0,
            rolling_back: 0,
            history: Vec::new(),
            undo_stack: Vec::new(),
            metrics: QueueMetrics::default(),
            transactions: HashMap::new(),
            scheduled: HashMap::new(),
        }
    }
}

struct Shared {
    config: QueueConfig,
    max_concurrent: usize,
    state: Mutex<QueueState>,
    slots: Arc<Semaphore>,
    /// Queued plus in-flight commands plus running rollbacks; shutdown waits
    /// for this to reach zero.
    load: watch::Sender<usize>,
    events: QueueEventBus,
}

/// Cheap, cloneable handle to one queue instance.
#[derive(Clone)]
pub struct CommandQueue {
    sender: mpsc::UnboundedSender<QueuedCommand>,
    shared: Arc<Shared>,
}

impl CommandQueue {
    /// Start a queue and its dispatcher. Must be called inside a tokio runtime.
    pub fn new(config: QueueConfig, events: QueueEventBus) -> Self {
        let max_concurrent = config.max_concurrent_commands.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let (load, _) = watch::channel(0);

        let shared = Arc::new(Shared {
            config,
            max_concurrent,
            state: Mutex::new(QueueState::new()),
            slots: Arc::new(Semaphore::new(max_concurrent)),
            load,
            events,
        });

        tokio::spawn(dispatch(shared.clone(), receiver));
        info!(max_concurrent, "Command queue started");

        Self { sender, shared }
    }

    /// Start a queue with its own event bus sized from the config.
    pub fn with_config(config: QueueConfig) -> Self {
        let events = QueueEventBus::new(config.event_capacity.max(1));
        Self::new(config, events)
    }

    /// Validate and execute one command, waiting for a free slot.
    pub async fn execute(
        &self,
        command: Arc<dyn Command>,
        context: ExecutionContext,
    ) -> Result<CommandResult, QueueError> {
        self.submit(command, context, None).await
    }

    async fn submit(
        &self,
        command: Arc<dyn Command>,
        context: ExecutionContext,
        transaction: Option<TransactionId>,
    ) -> Result<CommandResult, QueueError> {
        let command_type = command.command_type();
        let (responder, receiver) = oneshot::channel();

        let queue_size = {
            let mut state = self.shared.state.lock();
            if !state.accepting {
                return Err(QueueError::ShuttingDown);
            }
            state.queued += 1;
            self.shared.publish_load(&state);
            state.queued
        };

        // Published before the dispatcher can see the job, so subscribers
        // always observe `queue:enqueued` ahead of the settle events.
        debug!(%command_type, queue_size, "Command enqueued");
        self.shared.events.publish(QueueEvent::Enqueued {
            command_type,
            queue_size,
        });

        let job = QueuedCommand {
            command,
            context,
            transaction,
            responder,
        };
        if self.sender.send(job).is_err() {
            let mut state = self.shared.state.lock();
            state.queued -= 1;
            self.shared.publish_load(&state);
            return Err(QueueError::DispatcherUnavailable);
        }

        receiver.await.map_err(|_| QueueError::DispatcherUnavailable)
    }

    /// Execute a batch, split by estimated duration.
    ///
    /// Commands estimated below the fast threshold run in parallel chunks of
    /// `max_concurrent_commands`; one failure never cancels its siblings. The
    /// rest then run one after another. Results come back as
    /// `[fast..., slow...]`, each group in input order, so the output is
    /// reordered relative to the input whenever a slow command precedes a
    /// fast one.
    pub async fn execute_batch(
        &self,
        commands: Vec<Arc<dyn Command>>,
        context: ExecutionContext,
    ) -> Vec<CommandResult> {
        let threshold = self.shared.config.fast_command_threshold();
        let (fast, slow): (Vec<_>, Vec<_>) = commands
            .into_iter()
            .partition(|command| command.estimated_duration() < threshold);

        debug!(fast = fast.len(), slow = slow.len(), "Executing command batch");
        let mut results = Vec::with_capacity(fast.len() + slow.len());

        for chunk in fast.chunks(self.shared.max_concurrent) {
            let settled = futures::future::join_all(
                chunk
                    .iter()
                    .map(|command| self.execute(command.clone(), context.clone())),
            )
            .await;
            results.extend(settled.into_iter().map(settle_queue_error));
        }

        for command in slow {
            results.push(settle_queue_error(self.execute(command, context.clone()).await));
        }

        results
    }

    /// Run commands in strict order; on the first failure roll back every
    /// command that already succeeded, newest first.
    ///
    /// Returns `Ok` for `completed` and `rolled_back` transactions. A
    /// queue-level error mid-transaction, or shutdown, marks the transaction
    /// `failed`, rolls it back and returns [`QueueError::TransactionFailed`].
    pub async fn execute_transaction(
        &self,
        commands: Vec<Arc<dyn Command>>,
        context: ExecutionContext,
    ) -> Result<TransactionOutcome, QueueError> {
        let mut transaction = Transaction::new(commands.clone());
        let id = transaction.id;
        transaction.status = TransactionStatus::Executing;

        {
            let mut state = self.shared.state.lock();
            if !state.accepting {
                return Err(QueueError::ShuttingDown);
            }
            state.transactions.insert(
                id,
                ActiveTransaction {
                    record: transaction.clone(),
                    applied: Vec::new(),
                },
            );
        }
        // The record leaves the active set however this future ends.
        let _active = scopeguard::guard(self.shared.clone(), move |shared| {
            shared.state.lock().transactions.remove(&id);
        });

        info!(transaction_id = %id, commands = commands.len(), "Transaction started");
        let mut results = Vec::with_capacity(commands.len());

        for command in commands {
            if !self.shared.transaction_executing(id) {
                return Err(self.shared.aborted(id, &transaction));
            }

            match self.submit(command.clone(), context.clone(), Some(id)).await {
                Ok(result) if result.success => {
                    results.push(result);
                    // Settling already appended the command to the applied
                    // list, so a shutdown that failed the transaction in the
                    // meantime has rolled it back too.
                    if !self.shared.transaction_executing(id) {
                        return Err(self.shared.aborted(id, &transaction));
                    }
                }
                Ok(result) => {
                    let reason = result
                        .error
                        .clone()
                        .unwrap_or_else(|| format!("{} failed", command.command_type()));
                    results.push(result);
                    warn!(transaction_id = %id, %reason, "Transaction command failed; rolling back");

                    let record = self
                        .shared
                        .rollback(id, TransactionStatus::RolledBack, reason, &transaction)
                        .await;
                    if record.status == TransactionStatus::Failed {
                        return Err(failed(record));
                    }
                    return Ok(TransactionOutcome {
                        transaction: record,
                        results,
                    });
                }
                Err(e) => {
                    let reason = match e {
                        QueueError::ShuttingDown => SHUTDOWN_REASON.to_string(),
                        other => other.to_string(),
                    };
                    warn!(transaction_id = %id, %reason, "Transaction aborted; rolling back");

                    let record = self
                        .shared
                        .rollback(id, TransactionStatus::Failed, reason, &transaction)
                        .await;
                    return Err(failed(record));
                }
            }
        }

        match self.shared.complete_transaction(id, &transaction) {
            Ok(record) => {
                info!(transaction_id = %id, "Transaction completed");
                Ok(TransactionOutcome {
                    transaction: record,
                    results,
                })
            }
            Err(record) => Err(failed(record)),
        }
    }

    /// Execute with retries; see [`RetryPolicy`] for the backoff schedule.
    ///
    /// Each attempt runs a fresh clone when the command supports it. After the
    /// last failed attempt the last error is returned as
    /// [`QueueError::RetriesExhausted`]. Queue-level errors end the loop at once.
    pub async fn retry_command(
        &self,
        command: Arc<dyn Command>,
        context: ExecutionContext,
        policy: RetryPolicy,
    ) -> Result<CommandResult, QueueError> {
        let command_type = command.command_type();
        let attempts = policy.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let candidate = command.try_clone().unwrap_or_else(|| command.clone());
            let result = self.execute(candidate, context.clone()).await?;
            if result.success {
                if attempt > 1 {
                    info!(%command_type, attempt, "Command succeeded after retry");
                }
                return Ok(result);
            }

            last_error = result
                .error
                .unwrap_or_else(|| format!("{} failed", command_type));

            if attempt < attempts {
                let delay = policy.backoff(attempt);
                warn!(
                    %command_type,
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "Command attempt failed; backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }

        error!(%command_type, attempts, error = %last_error, "Command retries exhausted");
        Err(QueueError::RetriesExhausted {
            command_type,
            attempts,
            last_error,
        })
    }

    /// [`retry_command`](Self::retry_command) with the queue's configured policy.
    pub async fn retry_with_default_policy(
        &self,
        command: Arc<dyn Command>,
        context: ExecutionContext,
    ) -> Result<CommandResult, QueueError> {
        let policy = self.shared.config.retry;
        self.retry_command(command, context, policy).await
    }

    /// Defer execution until `execute_at`; a time in the past runs at once.
    pub fn schedule_command(
        &self,
        command: Arc<dyn Command>,
        context: ExecutionContext,
        execute_at: DateTime<Utc>,
    ) -> ScheduledCommand {
        let id = ScheduleId::new();
        let delay = (execute_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let (responder, receiver) = oneshot::channel();

        {
            let mut state = self.shared.state.lock();
            if !state.accepting {
                let _ = responder.send(Err(QueueError::ShuttingDown));
            } else {
                let queue = self.clone();
                // Spawned under the lock so the timer is registered before it can fire.
                let timer = tokio::spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let still_scheduled = queue.shared.state.lock().scheduled.remove(&id).is_some();
                    if !still_scheduled {
                        return;
                    }
                    debug!(schedule_id = %id, "Scheduled command fired");
                    let outcome = queue.execute(command, context).await;
                    let _ = responder.send(outcome);
                });
                state.scheduled.insert(id, timer.abort_handle());
                debug!(schedule_id = %id, delay_ms = delay.as_millis() as u64, "Command scheduled");
            }
        }

        ScheduledCommand {
            id,
            execute_at,
            receiver,
            shared: self.shared.clone(),
        }
    }

    /// Clear a timer that has not fired yet. Returns `false` if it already
    /// fired or was cancelled.
    pub fn cancel_scheduled(&self, id: ScheduleId) -> bool {
        self.shared.cancel_scheduled(id)
    }

    /// Pop the most recent undoable command and undo it.
    ///
    /// An empty stack is not an error. A failing undo is reported to the
    /// caller and the entry is not pushed back.
    pub async fn undo(&self) -> Result<UndoOutcome, QueueError> {
        let popped = self.shared.state.lock().undo_stack.pop();
        let Some(command) = popped else {
            debug!("Undo requested with empty undo stack");
            return Ok(UndoOutcome::NothingToUndo);
        };

        let command_type = command.command_type();
        match command.undo().await {
            Ok(()) => {
                info!(%command_type, "Command undone");
                self.shared
                    .events
                    .publish(QueueEvent::CommandUndone { command_type });
                Ok(UndoOutcome::Undone {
                    command_type,
                    description: command.description(),
                })
            }
            Err(source) => {
                warn!(%command_type, error = %source, "Undo failed");
                self.shared.events.publish(QueueEvent::CommandUndoFailed {
                    command_type,
                    error: source.to_string(),
                });
                Err(QueueError::UndoFailed {
                    command_type,
                    source,
                })
            }
        }
    }

    /// Stop admitting work, cancel pending timers, wait for queued and
    /// in-flight commands to settle, then fail and roll back any transaction
    /// still executing.
    pub async fn shutdown(&self) {
        let timers: Vec<AbortHandle> = {
            let mut state = self.shared.state.lock();
            state.accepting = false;
            state.scheduled.drain().map(|(_, timer)| timer).collect()
        };
        for timer in &timers {
            timer.abort();
        }
        info!(cancelled_timers = timers.len(), "Command queue shutting down");

        let mut load = self.shared.load.subscribe();
        // The sender lives in `shared`, so this only returns once drained.
        let _ = load.wait_for(|outstanding| *outstanding == 0).await;

        let stranded: Vec<(TransactionId, Vec<Arc<dyn Command>>)> = {
            let mut state = self.shared.state.lock();
            state
                .transactions
                .iter_mut()
                .filter(|(_, active)| active.record.status == TransactionStatus::Executing)
                .map(|(id, active)| {
                    active
                        .record
                        .finish(TransactionStatus::Failed, Some(SHUTDOWN_REASON.to_string()));
                    (*id, std::mem::take(&mut active.applied))
                })
                .collect()
        };

        for (id, applied) in stranded {
            warn!(transaction_id = %id, applied = applied.len(), "Transaction failed by shutdown; rolling back");
            self.shared.undo_applied(id, applied).await;
        }

        // Transactions that started their own rollback before the step above
        // are counted in the load until their last undo returns.
        let _ = load.wait_for(|outstanding| *outstanding == 0).await;

        self.shared.events.publish(QueueEvent::Shutdown);
        info!("Command queue shut down");
    }

    /// Snapshot of the running aggregates with the current queue size.
    pub fn metrics(&self) -> QueueMetrics {
        let state = self.shared.state.lock();
        let mut metrics = state.metrics.clone();
        metrics.queue_size = state.queued;
        metrics
    }

    /// Most recent `limit` entries, oldest first; everything when `None`.
    pub fn history(&self, limit: Option<usize>) -> Vec<HistoryEntry> {
        let state = self.shared.state.lock();
        let skip = limit.map_or(0, |limit| state.history.len().saturating_sub(limit));
        state.history[skip..].to_vec()
    }

    /// Records of transactions that have not finished yet.
    pub fn active_transactions(&self) -> Vec<Transaction> {
        self.shared
            .state
            .lock()
            .transactions
            .values()
            .map(|active| active.record.clone())
            .collect()
    }

    /// Drop history and reset metrics. The undo stack is kept.
    pub fn clear_history(&self) {
        let mut state = self.shared.state.lock();
        let cleared = state.history.len();
        state.history.clear();
        state.metrics = QueueMetrics::default();
        debug!(cleared, "Command history cleared");
    }

    /// Commands holding a slot right now.
    pub fn in_flight(&self) -> usize {
        self.shared.state.lock().in_flight
    }

    /// Commands waiting for a slot.
    pub fn queue_size(&self) -> usize {
        self.shared.state.lock().queued
    }

    /// Entries on the undo stack.
    pub fn undo_depth(&self) -> usize {
        self.shared.state.lock().undo_stack.len()
    }

    /// Effective concurrency bound, never below 1.
    pub fn max_concurrent(&self) -> usize {
        self.shared.max_concurrent
    }

    /// `false` once [`shutdown`](Self::shutdown) has started.
    pub fn is_accepting(&self) -> bool {
        self.shared.state.lock().accepting
    }

    /// Receive every queue event published from now on.
    pub fn subscribe(&self) -> EventReceiver {
        self.shared.events.subscribe()
    }

    /// Bus the queue publishes on, for filtered subscriptions.
    pub fn event_bus(&self) -> &QueueEventBus {
        &self.shared.events
    }
}

/// Handle to a deferred command.
pub struct ScheduledCommand {
    id: ScheduleId,
    execute_at: DateTime<Utc>,
    receiver: oneshot::Receiver<Result<CommandResult, QueueError>>,
    shared: Arc<Shared>,
}

impl ScheduledCommand {
    pub fn id(&self) -> ScheduleId {
        self.id
    }

    pub fn execute_at(&self) -> DateTime<Utc> {
        self.execute_at
    }

    /// Clear the timer if it has not fired yet.
    pub fn cancel(&self) -> bool {
        self.shared.cancel_scheduled(self.id)
    }

    /// Wait for the command to run. Resolves to
    /// [`QueueError::ScheduleCancelled`] if the timer was cleared first.
    pub async fn outcome(self) -> Result<CommandResult, QueueError> {
        let id = self.id;
        match self.receiver.await {
            Ok(outcome) => outcome,
            Err(_) => Err(QueueError::ScheduleCancelled(id)),
        }
    }
}

async fn dispatch(shared: Arc<Shared>, mut receiver: mpsc::UnboundedReceiver<QueuedCommand>) {
    while let Some(job) = receiver.recv().await {
        let permit = match shared.slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        shared.begin();

        let worker = shared.clone();
        tokio::spawn(async move {
            let QueuedCommand {
                command,
                context,
                transaction,
                responder,
            } = job;
            let result = worker.run(command.as_ref(), &context).await;
            worker.settle(&command, transaction, &result);
            drop(permit);
            let _ = responder.send(result);
        });
    }
    debug!("Command dispatcher stopped");
}

impl Shared {
    fn publish_load(&self, state: &QueueState) {
        self.load
            .send_replace(state.queued + state.in_flight + state.rolling_back);
    }

    fn begin(&self) {
        let mut state = self.state.lock();
        state.queued -= 1;
        state.in_flight += 1;
        debug_assert!(state.in_flight <= self.max_concurrent);
        self.publish_load(&state);
        metrics::gauge!("swarmflow_queue_size").set(state.queued as f64);
        metrics::gauge!("swarmflow_commands_in_flight").set(state.in_flight as f64);
    }

    async fn run(&self, command: &dyn Command, context: &ExecutionContext) -> CommandResult {
        let started = Instant::now();
        let attempt = AssertUnwindSafe(async {
            let validation = command.validate(context).await;
            if !validation.valid {
                warn!(
                    command_type = %command.command_type(),
                    errors = ?validation.errors,
                    "Command rejected by validation"
                );
                return CommandResult::failure(
                    format!("Validation failed: {}", validation.errors.join("; ")),
                    started.elapsed(),
                )
                .with_warnings(validation.warnings);
            }
            command.execute(context).await.with_warnings(validation.warnings)
        });

        match attempt.catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(&*panic);
                error!(command_type = %command.command_type(), %message, "Command panicked");
                CommandResult::failure(format!("Command panicked: {}", message), started.elapsed())
            }
        }
    }

    fn settle(
        &self,
        command: &Arc<dyn Command>,
        transaction: Option<TransactionId>,
        result: &CommandResult,
    ) {
        let command_type = command.command_type();
        let undoable = result.success && command.can_undo();

        let (queued, in_flight) = {
            let mut state = self.state.lock();
            state.in_flight -= 1;
            state.history.push(HistoryEntry {
                command: command.clone(),
                result: result.clone(),
                timestamp: Utc::now(),
            });
            state
                .metrics
                .record(command_type, result.success, result.execution_time);
            state.metrics.queue_size = state.queued;
            if undoable {
                state.undo_stack.push(command.clone());
            }
            if let Some(id) = transaction.filter(|_| result.success) {
                // Shutdown only fails transactions once the load is zero, so
                // a live transaction is still executing here.
                if let Some(active) = state.transactions.get_mut(&id) {
                    if active.record.status == TransactionStatus::Executing {
                        active.applied.push(command.clone());
                    }
                }
            }
            self.publish_load(&state);
            (state.queued, state.in_flight)
        };

        let outcome = if result.success { "success" } else { "failure" };
        metrics::counter!(
            "swarmflow_commands_total",
            "command_type" => command_type.as_str(),
            "outcome" => outcome
        )
        .increment(1);
        metrics::histogram!(
            "swarmflow_command_duration_seconds",
            "command_type" => command_type.as_str()
        )
        .record(result.execution_time.as_secs_f64());
        metrics::gauge!("swarmflow_queue_size").set(queued as f64);
        metrics::gauge!("swarmflow_commands_in_flight").set(in_flight as f64);

        let execution_time = result.execution_time.as_millis() as u64;
        debug!(%command_type, success = result.success, execution_time_ms = execution_time, "Command settled");
        self.events.publish(QueueEvent::CommandExecuted {
            command_type,
            success: result.success,
            execution_time,
        });
        if !result.success {
            self.events.publish(QueueEvent::CommandError {
                command_type,
                error: result
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }
    }

    fn cancel_scheduled(&self, id: ScheduleId) -> bool {
        let timer = self.state.lock().scheduled.remove(&id);
        match timer {
            Some(timer) => {
                timer.abort();
                info!(schedule_id = %id, "Scheduled command cancelled");
                true
            }
            None => false,
        }
    }

    fn transaction_executing(&self, id: TransactionId) -> bool {
        self.state
            .lock()
            .transactions
            .get(&id)
            .is_some_and(|active| active.record.status == TransactionStatus::Executing)
    }

    fn complete_transaction(
        &self,
        id: TransactionId,
        fallback: &Transaction,
    ) -> Result<Transaction, Transaction> {
        let mut state = self.state.lock();
        match state.transactions.get_mut(&id) {
            Some(active) if active.record.status == TransactionStatus::Executing => {
                active.record.finish(TransactionStatus::Completed, None);
                active.applied.clear();
                Ok(active.record.clone())
            }
            Some(active) => Err(active.record.clone()),
            None => {
                let mut record = fallback.clone();
                record.finish(TransactionStatus::Completed, None);
                Ok(record)
            }
        }
    }

    /// Move the transaction to `status` and undo its applied commands in
    /// reverse order. If something else already finished it, its record is
    /// returned untouched.
    async fn rollback(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        reason: String,
        fallback: &Transaction,
    ) -> Transaction {
        let (record, applied) = {
            let mut state = self.state.lock();
            let taken = match state.transactions.get_mut(&id) {
                Some(active) if !active.record.status.is_terminal() => {
                    active.record.finish(status, Some(reason));
                    (active.record.clone(), std::mem::take(&mut active.applied))
                }
                Some(active) => return active.record.clone(),
                None => {
                    let mut record = fallback.clone();
                    record.finish(status, Some(reason));
                    return record;
                }
            };
            state.rolling_back += 1;
            self.publish_load(&state);
            taken
        };

        let _rolling_back = scopeguard::guard(self, |shared| {
            let mut state = shared.state.lock();
            state.rolling_back -= 1;
            shared.publish_load(&state);
        });
        self.undo_applied(id, applied).await;
        record
    }

    fn aborted(&self, id: TransactionId, fallback: &Transaction) -> QueueError {
        let record = self
            .state
            .lock()
            .transactions
            .get(&id)
            .map(|active| active.record.clone())
            .unwrap_or_else(|| {
                let mut record = fallback.clone();
                record.finish(TransactionStatus::Failed, Some(SHUTDOWN_REASON.to_string()));
                record
            });
        failed(record)
    }

    /// Undo newest first. A failing undo is logged and the rest still run.
    async fn undo_applied(&self, id: TransactionId, applied: Vec<Arc<dyn Command>>) {
        if applied.is_empty() {
            return;
        }

        self.state
            .lock()
            .undo_stack
            .retain(|entry| !applied.iter().any(|command| Arc::ptr_eq(command, entry)));

        for command in applied.iter().rev() {
            let command_type = command.command_type();
            if !command.can_undo() {
                debug!(transaction_id = %id, %command_type, "Nothing to roll back for command");
                continue;
            }

            match command.undo().await {
                Ok(()) => {
                    info!(transaction_id = %id, %command_type, "Command rolled back");
                    self.events.publish(QueueEvent::CommandUndone { command_type });
                }
                Err(e) => {
                    error!(transaction_id = %id, %command_type, error = %e, "Rollback of command failed; continuing");
                    self.events.publish(QueueEvent::CommandUndoFailed {
                        command_type,
                        error: e.to_string(),
                    });
                }
            }
        }
    }
}

fn failed(record: Transaction) -> QueueError {
    QueueError::TransactionFailed {
        id: record.id,
        reason: record
            .rollback_reason
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        transaction: Box::new(record),
    }
}

fn settle_queue_error(outcome: Result<CommandResult, QueueError>) -> CommandResult {
    outcome.unwrap_or_else(|e| CommandResult::failure(e.to_string(), Duration::ZERO))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
