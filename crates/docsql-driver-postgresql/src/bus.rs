//! The schema-change notification bus.
//!
//! Instances sharing one database announce schema mutations on a
//! `LISTEN`/`NOTIFY` channel so that every other instance can drop its
//! cached schemas.

use crate::SchemaObserver;

use docsql_core::{Error, Result, SchemaCache};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_postgres::{AsyncMessage, Client, Config, NoTls, Notification};
use tracing::{debug, error, warn};

pub(crate) const CHANNEL: &str = "schema.change";

/// A schema change announced by another instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaChange {
    /// The changed class, or `None` when every class may have changed.
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Payload {
    sender_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    class_name: Option<String>,
}

fn parse_payload(payload: &str) -> Option<Payload> {
    serde_json::from_str(payload).ok()
}

/// Holds the observer registered through
/// [`PostgresAdapter::watch`](crate::PostgresAdapter::watch).
#[derive(Default)]
pub(crate) struct ObserverSlot {
    observer: Mutex<Option<SchemaObserver>>,
}

impl ObserverSlot {
    pub(crate) fn new(observer: Option<SchemaObserver>) -> ObserverSlot {
        ObserverSlot {
            observer: Mutex::new(observer),
        }
    }

    pub(crate) fn set(&self, observer: SchemaObserver) {
        *self.observer.lock().unwrap_or_else(PoisonError::into_inner) = Some(observer);
    }

    fn get(&self) -> Option<SchemaObserver> {
        self.observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// The dedicated listen connection and the tasks draining it.
pub(crate) struct SchemaBus {
    client: Client,
    sender_id: String,
    forward: JoinHandle<()>,
    dispatch: JoinHandle<()>,
}

impl SchemaBus {
    /// Opens the listen connection and subscribes to the channel.
    pub(crate) async fn listen(
        config: &Config,
        cache: Option<Arc<dyn SchemaCache>>,
        observers: Arc<ObserverSlot>,
    ) -> Result<SchemaBus> {
        let (client, mut connection) = config.connect(NoTls).await.map_err(Error::driver)?;
        let (tx, rx) = mpsc::unbounded_channel();

        // The listen connection only makes progress while its messages are
        // polled, so this task also drives the client's own queries.
        let forward = tokio::spawn(async move {
            let mut messages =
                Box::pin(futures::stream::poll_fn(move |cx| connection.poll_message(cx)));

            while let Some(message) = messages.next().await {
                match message {
                    Ok(AsyncMessage::Notification(notification)) => {
                        if tx.send(notification).is_err() {
                            break;
                        }
                    }
                    Ok(AsyncMessage::Notice(notice)) => {
                        debug!(%notice, "notice on schema listen connection");
                    }
                    Ok(_) => {}
                    Err(err) => {
                        error!(%err, "schema listen connection error");
                        break;
                    }
                }
            }
        });

        let sender_id = uuid::Uuid::new_v4().to_string();
        let dispatch = tokio::spawn(dispatch(rx, sender_id.clone(), cache, observers));

        let bus = SchemaBus {
            client,
            sender_id,
            forward,
            dispatch,
        };

        bus.client
            .batch_execute(&format!("LISTEN \"{CHANNEL}\""))
            .await
            .map_err(Error::driver)?;

        debug!(sender_id = %bus.sender_id, "listening for schema changes");
        Ok(bus)
    }

    /// Announces a schema change. Failures are logged and otherwise ignored.
    pub(crate) async fn publish(&self, class_name: Option<&str>) {
        let payload = Payload {
            sender_id: self.sender_id.clone(),
            class_name: class_name.map(str::to_string),
        };

        let payload = match serde_json::to_string(&payload) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, "failed to encode schema change");
                return;
            }
        };

        if let Err(err) = self
            .client
            .execute("SELECT pg_notify($1, $2)", &[&CHANNEL, &payload])
            .await
        {
            warn!(%err, class_name, "failed to publish schema change");
        }
    }

    pub(crate) fn shutdown(&self) {
        self.forward.abort();
        self.dispatch.abort();
    }
}

impl Drop for SchemaBus {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn dispatch(
    mut rx: mpsc::UnboundedReceiver<Notification>,
    sender_id: String,
    cache: Option<Arc<dyn SchemaCache>>,
    observers: Arc<ObserverSlot>,
) {
    while let Some(notification) = rx.recv().await {
        if notification.channel() != CHANNEL {
            continue;
        }

        let Some(payload) = parse_payload(notification.payload()) else {
            warn!(payload = notification.payload(), "malformed schema change payload");
            continue;
        };

        if payload.sender_id == sender_id {
            continue;
        }

        debug!(class_name = ?payload.class_name, "schema changed remotely");

        if let Some(cache) = &cache {
            cache.clear().await;
        }

        if let Some(observer) = observers.get() {
            observer(SchemaChange {
                class_name: payload.class_name,
            });
        }
    }
}
