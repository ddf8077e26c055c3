use crate::domain::events::DomainEvent;
use crate::domain::ports::EventSink;
use crate::utils::error::{LevelUpError, Result};
use std::sync::{Mutex, RwLock};

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: &DomainEvent) -> Result<()> {
        Ok(())
    }
}

/// Writes every event to the `tracing` pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: &DomainEvent) -> Result<()> {
        match event {
            DomainEvent::LevelledUp { subject, from, to } => {
                tracing::info!("⬆️ {} levelled up {} -> {}", subject, from, to)
            }
            DomainEvent::LevelledDown { subject, from, to } => {
                tracing::info!("⬇️ {} levelled down {} -> {}", subject, from, to)
            }
            other => tracing::debug!(
                event = other.name(),
                subject = %other.subject(),
                "{:?}",
                other
            ),
        }
        Ok(())
    }
}

/// Keeps published events in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn take(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: &DomainEvent) -> Result<()> {
        let mut events = self.events.lock().map_err(|_| LevelUpError::LockPoisoned {
            resource: "recording sink".to_string(),
        })?;
        events.push(event.clone());
        Ok(())
    }
}

/// Fans each event out to every subscriber.
///
/// One failing subscriber does not stop delivery to the rest; the first error
/// is returned after everyone has been called.
#[derive(Default)]
pub struct EventDispatcher {
    subscribers: RwLock<Vec<Box<dyn EventSink>>>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<S: EventSink + 'static>(&self, sink: S) -> Result<()> {
        let mut subscribers = self.subscribers.write().map_err(|_| Self::poisoned())?;
        subscribers.push(Box::new(sink));
        Ok(())
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().map(|s| s.len()).unwrap_or(0)
    }

    fn poisoned() -> LevelUpError {
        LevelUpError::LockPoisoned {
            resource: "event dispatcher".to_string(),
        }
    }
}

impl EventSink for EventDispatcher {
    fn publish(&self, event: &DomainEvent) -> Result<()> {
        let subscribers = self.subscribers.read().map_err(|_| Self::poisoned())?;

        let mut first_error = None;
        for subscriber in subscribers.iter() {
            if let Err(e) = subscriber.publish(event) {
                tracing::debug!("Subscriber failed for {}: {}", event.name(), e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
