//! Channel-based realtime row-change delivery.
//!
//! Backends publish every committed row change into a [`RealtimeHub`]. Consumers
//! build a channel with one or more bindings and get back a [`Subscription`]; the
//! subscription owns the delivery task and tears it down when dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::query::Scalar;

/// Capacity of the fan-out buffer; slow subscribers lag past this and skip events.
const HUB_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeEvent {
    Insert,
    Update,
    Delete,
}

/// One committed change to one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowChange {
    pub table: String,
    #[serde(rename = "type")]
    pub event: ChangeEvent,
    #[serde(default)]
    pub record: Option<Value>,
    #[serde(default)]
    pub old_record: Option<Value>,
}

impl RowChange {
    /// The row as it is after the change (before it, for deletes).
    pub fn row(&self) -> Option<&Value> {
        match self.event {
            ChangeEvent::Delete => self.old_record.as_ref(),
            _ => self.record.as_ref(),
        }
    }
}

type Callback = Arc<dyn Fn(RowChange) + Send + Sync>;

struct Binding {
    event: Option<ChangeEvent>,
    table: String,
    filter: Option<(String, Scalar)>,
    callback: Callback,
}

impl Binding {
    fn matches(&self, change: &RowChange) -> bool {
        if change.table != self.table {
            return false;
        }
        if let Some(event) = self.event {
            if event != change.event {
                return false;
            }
        }
        match &self.filter {
            None => true,
            Some((column, value)) => change
                .row()
                .and_then(|row| row.get(column))
                .is_some_and(|v| *v == value.to_json()),
        }
    }
}

/// Fan-out point for row changes.
#[derive(Clone)]
pub struct RealtimeHub {
    tx: broadcast::Sender<RowChange>,
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self {
            tx: broadcast::channel(HUB_CAPACITY).0,
        }
    }

    pub fn publish(&self, change: RowChange) {
        // No receivers is fine: nobody is mounted.
        let _ = self.tx.send(change);
    }

    pub fn channel(&self, name: &str) -> Channel {
        Channel {
            name: name.to_string(),
            tx: self.tx.clone(),
            bindings: Vec::new(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    #[cfg(test)]
    pub(crate) fn subscribe_raw(&self) -> broadcast::Receiver<RowChange> {
        self.tx.subscribe()
    }
}

/// A named channel under construction.
pub struct Channel {
    name: String,
    tx: broadcast::Sender<RowChange>,
    bindings: Vec<Binding>,
}

impl Channel {
    /// Bind `callback` to changes on `table`. `event: None` receives every event
    /// type; `filter` restricts delivery to rows whose column equals the value.
    pub fn on<F>(
        mut self,
        event: Option<ChangeEvent>,
        table: &str,
        filter: Option<(&str, Scalar)>,
        callback: F,
    ) -> Self
    where
        F: Fn(RowChange) + Send + Sync + 'static,
    {
        self.bindings.push(Binding {
            event,
            table: table.to_string(),
            filter: filter.map(|(c, v)| (c.to_string(), v)),
            callback: Arc::new(callback),
        });
        self
    }

    /// Start delivering. Must be called inside a tokio runtime.
    pub fn subscribe(self) -> Subscription {
        let mut rx = self.tx.subscribe();
        let bindings = self.bindings;
        let name = self.name.clone();

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) => {
                        for binding in bindings.iter().filter(|b| b.matches(&change)) {
                            (binding.callback)(change.clone());
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "Realtime channel '{}' lagged, skipped {} events",
                            name,
                            skipped
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        tracing::debug!("Realtime channel '{}' subscribed", self.name);

        Subscription {
            name: self.name,
            task,
        }
    }
}

/// Live channel subscription. Dropping it unsubscribes.
pub struct Subscription {
    name: String,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!("Realtime channel '{}' unsubscribed", self.name);
    }
}
