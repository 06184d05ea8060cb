//! Discovery event channel.
//!
//! An [`EventChannel`] is created by the caller, handed to one load pass, and
//! dropped with it. Every successful registry ingest is delivered to each
//! subscribed observer, synchronously and in ingest order, before the next
//! file is processed. The first observer error aborts the pass.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::debug;

use crate::types::DefinitionType;

/// What happened to one definition id during ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiscoveryEvent {
    /// First record for this id.
    Registered {
        id: String,
        #[serde(rename = "type")]
        type_name: DefinitionType,
        package: String,
    },
    /// The record replaced one from `previous_package`.
    Overridden {
        id: String,
        #[serde(rename = "type")]
        type_name: DefinitionType,
        package: String,
        previous_package: String,
    },
}

impl DiscoveryEvent {
    pub fn id(&self) -> &str {
        match self {
            DiscoveryEvent::Registered { id, .. } | DiscoveryEvent::Overridden { id, .. } => id,
        }
    }

    pub fn type_name(&self) -> &DefinitionType {
        match self {
            DiscoveryEvent::Registered { type_name, .. }
            | DiscoveryEvent::Overridden { type_name, .. } => type_name,
        }
    }

    pub fn package(&self) -> &str {
        match self {
            DiscoveryEvent::Registered { package, .. }
            | DiscoveryEvent::Overridden { package, .. } => package,
        }
    }

    pub fn is_override(&self) -> bool {
        matches!(self, DiscoveryEvent::Overridden { .. })
    }
}

impl fmt::Display for DiscoveryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryEvent::Registered {
                id,
                type_name,
                package,
            } => write!(f, "registered {id} ({type_name}) from {package}"),
            DiscoveryEvent::Overridden {
                id,
                type_name,
                package,
                previous_package,
            } => write!(
                f,
                "overridden {id} ({type_name}) from {package}, replacing {previous_package}"
            ),
        }
    }
}

/// An observer refused an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("observer {observer} failed on {id}: {message}")]
pub struct ObserverError {
    pub observer: String,
    pub id: String,
    pub message: String,
}

impl ObserverError {
    pub fn new(observer: &str, event: &DiscoveryEvent, message: impl Into<String>) -> Self {
        Self {
            observer: observer.to_string(),
            id: event.id().to_string(),
            message: message.into(),
        }
    }
}

/// Receives discovery events from a load pass.
pub trait DiscoveryObserver: Send {
    /// Short name used in errors and logs.
    fn name(&self) -> &str;

    /// Called once per ingested record. Returning an error aborts the pass.
    fn on_event(&mut self, event: &DiscoveryEvent) -> Result<(), ObserverError>;
}

/// The per-pass set of observers.
#[derive(Default)]
pub struct EventChannel {
    observers: Vec<Box<dyn DiscoveryObserver>>,
    delivered: usize,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer. Observers are notified in subscription order.
    pub fn subscribe(&mut self, observer: impl DiscoveryObserver + 'static) -> &mut Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Builder-style [`subscribe`](Self::subscribe).
    pub fn with(mut self, observer: impl DiscoveryObserver + 'static) -> Self {
        self.subscribe(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Number of events fully delivered so far.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Deliver an event to every observer, stopping at the first error.
    pub fn publish(&mut self, event: &DiscoveryEvent) -> Result<(), ObserverError> {
        for observer in &mut self.observers {
            observer.on_event(event)?;
        }
        self.delivered += 1;
        Ok(())
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field(
                "observers",
                &self.observers.iter().map(|o| o.name()).collect::<Vec<_>>(),
            )
            .field("delivered", &self.delivered)
            .finish()
    }
}

/// Logs every event through `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DiscoveryObserver for TracingObserver {
    fn name(&self) -> &str {
        "tracing"
    }

    fn on_event(&mut self, event: &DiscoveryEvent) -> Result<(), ObserverError> {
        match event {
            DiscoveryEvent::Registered {
                id,
                type_name,
                package,
            } => debug!(%id, r#type = %type_name, %package, "Definition registered"),
            DiscoveryEvent::Overridden {
                id,
                type_name,
                package,
                previous_package,
            } => debug!(
                %id,
                r#type = %type_name,
                %package,
                %previous_package,
                "Definition overridden"
            ),
        }
        Ok(())
    }
}

/// Captures events into a shared buffer.
///
/// Subscribe the recorder and keep an [`EventReader`] to inspect what was
/// delivered once the pass is over.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<DiscoveryEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a reader handle for the captured events.
    pub fn reader(&self) -> EventReader {
        EventReader {
            events: Arc::clone(&self.events),
        }
    }
}

impl DiscoveryObserver for EventRecorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn on_event(&mut self, event: &DiscoveryEvent) -> Result<(), ObserverError> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        Ok(())
    }
}

/// A read handle for an [`EventRecorder`].
#[derive(Debug, Clone)]
pub struct EventReader {
    events: Arc<Mutex<Vec<DiscoveryEvent>>>,
}

impl EventReader {
    /// Snapshot of every captured event, in delivery order.
    pub fn events(&self) -> Vec<DiscoveryEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Adapts a closure into an observer.
pub struct FnObserver<F> {
    name: String,
    f: F,
}

impl<F> FnObserver<F>
where
    F: FnMut(&DiscoveryEvent) -> Result<(), String> + Send,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> DiscoveryObserver for FnObserver<F>
where
    F: FnMut(&DiscoveryEvent) -> Result<(), String> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&mut self, event: &DiscoveryEvent) -> Result<(), ObserverError> {
        (self.f)(event).map_err(|message| ObserverError::new(&self.name, event, message))
    }
}
