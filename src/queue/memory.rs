use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{QueueClient, QueueEndpoint};
use crate::error::{Error, Result};
use crate::message::{LeaseMessage, ReceiptHandle, ReceivedMessage};

/// A send as seen by the queue, whether or not it was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub endpoint: QueueEndpoint,
    pub body: String,
    pub group_key: String,
    pub attributes: HashMap<String, String>,
    pub accepted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub resolved: Vec<String>,
    pub sends: Vec<SentMessage>,
    pub receives: usize,
    pub deletes: Vec<ReceiptHandle>,
}

#[derive(Debug, Default)]
struct Faults {
    failing_bodies: HashSet<String>,
    fail_receives: bool,
    fail_deletes: bool,
}

#[derive(Debug)]
struct InFlight {
    receipt: ReceiptHandle,
    visible_at: Instant,
}

#[derive(Debug)]
struct Stored {
    body: String,
    group_key: String,
    attributes: HashMap<String, String>,
    in_flight: Option<InFlight>,
}

impl Stored {
    fn hidden(&self, now: Instant) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|f| f.visible_at > now)
    }
}

#[derive(Debug, Default)]
struct Inner {
    queues: HashMap<QueueEndpoint, VecDeque<Stored>>,
    names: HashMap<String, QueueEndpoint>,
    calls: CallLog,
    faults: Faults,
}

/// In-process FIFO queue with visibility timeouts and receipt handles.
///
/// Messages that share a group key are delivered in order, and a group is
/// held back while any of its messages is in flight. A message whose
/// visibility timeout lapses is delivered again under a new receipt handle,
/// which invalidates the previous one.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty queue named `name`, or returns the existing one.
    pub async fn create_queue(&self, name: &str) -> QueueEndpoint {
        let mut guard = self.inner.lock().await;
        let endpoint = guard
            .names
            .entry(name.to_string())
            .or_insert_with(|| QueueEndpoint::new(format!("memory://{}", name)))
            .clone();
        guard.queues.entry(endpoint.clone()).or_default();
        endpoint
    }

    pub async fn calls(&self) -> CallLog {
        self.inner.lock().await.calls.clone()
    }

    /// Messages on the queue, counting in-flight ones.
    pub async fn len(&self, endpoint: &QueueEndpoint) -> usize {
        let guard = self.inner.lock().await;
        guard.queues.get(endpoint).map_or(0, VecDeque::len)
    }

    pub async fn is_empty(&self, endpoint: &QueueEndpoint) -> bool {
        self.len(endpoint).await == 0
    }

    /// Bodies currently on the queue, in delivery order.
    pub async fn bodies(&self, endpoint: &QueueEndpoint) -> Vec<String> {
        let guard = self.inner.lock().await;
        guard
            .queues
            .get(endpoint)
            .map(|q| q.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }

    /// Rejects every future send whose body equals `body`.
    pub async fn fail_sends_for(&self, body: &str) {
        let mut guard = self.inner.lock().await;
        guard.faults.failing_bodies.insert(body.to_string());
    }

    pub async fn set_fail_receives(&self, fail: bool) {
        self.inner.lock().await.faults.fail_receives = fail;
    }

    pub async fn set_fail_deletes(&self, fail: bool) {
        self.inner.lock().await.faults.fail_deletes = fail;
    }

    /// Ends the visibility timeout of every in-flight message right away.
    pub async fn expire_in_flight(&self) {
        let now = Instant::now();
        let mut guard = self.inner.lock().await;
        for queue in guard.queues.values_mut() {
            for msg in queue.iter_mut() {
                if let Some(flight) = msg.in_flight.as_mut() {
                    flight.visible_at = now;
                }
            }
        }
    }
}

fn unknown_endpoint(endpoint: &QueueEndpoint) -> Error {
    Error::Queue(format!("no queue at {}", endpoint))
}

#[async_trait]
impl QueueClient for MemoryQueue {
    async fn resolve_queue_url(&self, name: &str) -> Result<QueueEndpoint> {
        let mut guard = self.inner.lock().await;
        guard.calls.resolved.push(name.to_string());
        guard
            .names
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    async fn send_message(&self, endpoint: &QueueEndpoint, message: &LeaseMessage) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let body = message.body();
        let attributes: HashMap<String, String> = message
            .attributes()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let accepted =
            guard.queues.contains_key(endpoint) && !guard.faults.failing_bodies.contains(&body);
        guard.calls.sends.push(SentMessage {
            endpoint: endpoint.clone(),
            body: body.clone(),
            group_key: message.group_key().to_string(),
            attributes: attributes.clone(),
            accepted,
        });

        if guard.faults.failing_bodies.contains(&body) {
            return Err(Error::Queue(format!("send of {} rejected", body)));
        }
        let queue = guard
            .queues
            .get_mut(endpoint)
            .ok_or_else(|| unknown_endpoint(endpoint))?;
        queue.push_back(Stored {
            body,
            group_key: message.group_key().to_string(),
            attributes,
            in_flight: None,
        });
        Ok(())
    }

    async fn receive_messages(
        &self,
        endpoint: &QueueEndpoint,
        max_count: i32,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>> {
        let mut guard = self.inner.lock().await;
        guard.calls.receives += 1;
        if guard.faults.fail_receives {
            return Err(Error::Queue("receive timed out".to_string()));
        }
        let queue = guard
            .queues
            .get_mut(endpoint)
            .ok_or_else(|| unknown_endpoint(endpoint))?;

        let now = Instant::now();
        let limit = usize::try_from(max_count).unwrap_or(0);
        let blocked: HashSet<String> = queue
            .iter()
            .filter(|m| m.hidden(now))
            .map(|m| m.group_key.clone())
            .collect();

        let mut delivered = Vec::new();
        for msg in queue.iter_mut() {
            if delivered.len() >= limit {
                break;
            }
            if msg.hidden(now) || blocked.contains(&msg.group_key) {
                continue;
            }
            let receipt = ReceiptHandle::new(uuid::Uuid::new_v4().to_string());
            msg.in_flight = Some(InFlight {
                receipt: receipt.clone(),
                visible_at: now + visibility_timeout,
            });
            delivered.push(ReceivedMessage {
                body: msg.body.clone(),
                attributes: msg.attributes.clone(),
                receipt_handle: receipt,
            });
        }
        Ok(delivered)
    }

    async fn delete_message(&self, endpoint: &QueueEndpoint, receipt: &ReceiptHandle) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.calls.deletes.push(receipt.clone());
        if guard.faults.fail_deletes {
            return Err(Error::Queue("delete timed out".to_string()));
        }
        let queue = guard
            .queues
            .get_mut(endpoint)
            .ok_or_else(|| unknown_endpoint(endpoint))?;

        let now = Instant::now();
        let position = queue.iter().position(|m| {
            m.in_flight
                .as_ref()
                .is_some_and(|f| &f.receipt == receipt && f.visible_at > now)
        });
        match position {
            Some(idx) => {
                queue.remove(idx);
                Ok(())
            }
            None => Err(Error::InvalidReceipt(receipt.to_string())),
        }
    }
}
