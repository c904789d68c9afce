// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Queue Events
//
// Provides in-memory event streaming using tokio broadcast channels.
// Monitoring collaborators subscribe here instead of polling the queue.
//
// In-memory only: events published with no subscriber are dropped.

use crate::domain::command::CommandType;
use crate::domain::events::QueueEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus for publishing and subscribing to queue events
#[derive(Clone)]
pub struct QueueEventBus {
    sender: Arc<broadcast::Sender<QueueEvent>>,
}

impl QueueEventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish a queue event to all subscribers
    pub fn publish(&self, event: QueueEvent) {
        debug!(event = event.name(), "Publishing queue event");

        // send() only fails when nobody is listening
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to queue event");
        }
    }

    /// Subscribe to all queue events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe and filter for one command type
    pub fn subscribe_command_type(&self, command_type: CommandType) -> CommandTypeEventReceiver {
        CommandTypeEventReceiver {
            receiver: self.sender.subscribe(),
            command_type,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for QueueEventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Receiver for all queue events
pub struct EventReceiver {
    receiver: broadcast::Receiver<QueueEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<QueueEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<QueueEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Drain everything currently buffered, skipping over lag gaps.
    pub fn drain(&mut self) -> Vec<QueueEvent> {
        let mut events = Vec::new();
        loop {
            match self.try_recv() {
                Ok(event) => events.push(event),
                Err(EventBusError::Lagged(_)) => continue,
                Err(_) => return events,
            }
        }
    }
}

/// Receiver for events about one command type (filtered)
pub struct CommandTypeEventReceiver {
    receiver: broadcast::Receiver<QueueEvent>,
    command_type: CommandType,
}

impl CommandTypeEventReceiver {
    /// Receive the next event concerning this receiver's command type.
    /// Queue-wide events (`queue:shutdown`) are skipped.
    pub async fn recv(&mut self) -> Result<QueueEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.command_type() == Some(self.command_type) {
                return Ok(event);
            }
        }
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = QueueEventBus::new(10);
        let mut receiver = event_bus.subscribe();

        event_bus.publish(QueueEvent::CommandUndone {
            command_type: CommandType::SwarmInit,
        });

        let received = receiver.recv().await.unwrap();
        assert_eq!(
            received,
            QueueEvent::CommandUndone {
                command_type: CommandType::SwarmInit
            }
        );
    }

    #[tokio::test]
    async fn test_command_type_filtering() {
        let event_bus = QueueEventBus::new(10);
        let mut receiver = event_bus.subscribe_command_type(CommandType::AgentSpawn);

        event_bus.publish(QueueEvent::Shutdown);
        event_bus.publish(QueueEvent::Enqueued {
            command_type: CommandType::SwarmInit,
            queue_size: 1,
        });
        event_bus.publish(QueueEvent::Enqueued {
            command_type: CommandType::AgentSpawn,
            queue_size: 2,
        });

        match receiver.recv().await.unwrap() {
            QueueEvent::Enqueued { command_type, queue_size } => {
                assert_eq!(command_type, CommandType::AgentSpawn);
                assert_eq!(queue_size, 2);
            }
            other => panic!("Wrong event received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = QueueEventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish(QueueEvent::Shutdown);

        assert_eq!(receiver1.recv().await.unwrap(), QueueEvent::Shutdown);
        assert_eq!(receiver2.recv().await.unwrap(), QueueEvent::Shutdown);
    }

    #[test]
    fn test_lagged_receiver_drains_latest() {
        let event_bus = QueueEventBus::new(2);
        let mut receiver = event_bus.subscribe();

        for queue_size in 0..5 {
            event_bus.publish(QueueEvent::Enqueued {
                command_type: CommandType::TaskOrchestrate,
                queue_size,
            });
        }

        let events = receiver.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], QueueEvent::Enqueued { queue_size: 4, .. }));
    }
}
