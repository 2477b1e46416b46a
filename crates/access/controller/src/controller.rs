//! Controller: watch pump, periodic resync and reconcile workers

use crate::events::{AccessEvent, AccessEventEnvelope};
use crate::queue::WorkQueue;
use crate::reconciler::Reconciler;
use crate::store::{RequestStore, Store};
use access_authz::ApprovalChecker;
use access_types::ObjectKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;

const EVENT_CAPACITY: usize = 256;

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Concurrent reconcile workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Interval at which every request is re-enqueued
    #[serde(default = "default_resync_interval")]
    pub resync_interval_secs: u64,

    /// First retry delay after a failed pass
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            resync_interval_secs: default_resync_interval(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_ms: default_backoff_max(),
        }
    }
}

fn default_workers() -> usize {
    2
}

fn default_resync_interval() -> u64 {
    300
}

fn default_backoff_base() -> u64 {
    100
}

fn default_backoff_max() -> u64 {
    60_000
}

pub struct Controller {
    config: ControllerConfig,
    store: Arc<dyn Store>,
    reconciler: Arc<Reconciler>,
    queue: Arc<WorkQueue<ObjectKey>>,
    event_tx: broadcast::Sender<AccessEventEnvelope>,
}

impl Controller {
    pub fn new(config: ControllerConfig, store: Arc<dyn Store>, checker: ApprovalChecker) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let reconciler = Arc::new(Reconciler::new(store.clone(), checker, event_tx.clone()));
        let queue = Arc::new(WorkQueue::new(
            Duration::from_millis(config.backoff_base_ms.max(1)),
            Duration::from_millis(config.backoff_max_ms.max(1)),
        ));

        Self {
            config,
            store,
            reconciler,
            queue,
            event_tx,
        }
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<AccessEventEnvelope> {
        self.event_tx.subscribe()
    }

    pub fn queue(&self) -> &Arc<WorkQueue<ObjectKey>> {
        &self.queue
    }

    /// Trigger an immediate pass for one request
    pub fn enqueue(&self, key: ObjectKey) {
        self.queue.add(key);
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped)
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        // subscribe before listing so nothing committed in between is missed
        let mut changes = self.store.watch();
        self.resync().await;

        let workers = self.config.workers.max(1);
        let mut tasks = JoinSet::new();
        for worker in 0..workers {
            let controller = Arc::clone(&self);
            tasks.spawn(async move {
                while let Some(key) = controller.queue.get().await {
                    controller.process(key).await;
                }
                tracing::debug!(worker, "Reconcile worker stopped");
            });
        }
        tracing::info!(workers, "Controller started");

        let mut resync = tokio::time::interval(Duration::from_secs(
            self.config.resync_interval_secs.max(1),
        ));
        // first tick fires immediately and the initial list already ran
        resync.tick().await;

        loop {
            tokio::select! {
                change = changes.recv() => match change {
                    Ok(event) => {
                        if let Some(key) = event.request_key() {
                            self.queue.add(key.clone());
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Watch lagged, resyncing");
                        self.resync().await;
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = resync.tick() => self.resync().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.queue.shutdown();
        while tasks.join_next().await.is_some() {}
        tracing::info!("Controller stopped");
    }

    /// Enqueue every stored request
    async fn resync(&self) {
        match self.store.list_requests(None).await {
            Ok(requests) => {
                tracing::debug!(count = requests.len(), "Resyncing access requests");
                for request in requests {
                    self.queue.add(request.key());
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to list access requests"),
        }
    }

    async fn process(&self, key: ObjectKey) {
        match self.reconciler.reconcile(&key).await {
            Ok(outcome) => {
                tracing::debug!(request = %key, outcome = ?outcome, "Reconciled access request");
                self.queue.forget(&key);
            }
            Err(e) if e.is_retryable() => {
                let delay = self.queue.add_rate_limited(key.clone());
                tracing::warn!(
                    request = %key,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Reconciliation failed, retrying"
                );
                self.reconciler.emit(
                    &key,
                    AccessEvent::ReconcileFailed {
                        reason: e.to_string(),
                        retrying: true,
                    },
                );
            }
            Err(e) => {
                tracing::error!(request = %key, error = %e, "Reconciliation failed");
                self.queue.forget(&key);
                self.reconciler.emit(
                    &key,
                    AccessEvent::ReconcileFailed {
                        reason: e.to_string(),
                        retrying: false,
                    },
                );
            }
        }
        self.queue.done(&key);
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("config", &self.config)
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BindingStore, InMemoryStore};
    use access_authz::StaticOracle;
    use access_types::{AccessRequest, Attributes, ConditionStatus, ConditionType, RoleRef, Subject};
    use chrono::Utc;

    /// Poll the stored request until `check` holds
    async fn wait_for(store: &InMemoryStore, key: &ObjectKey, check: impl Fn(&AccessRequest) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(request) = store.get_request(key).await.unwrap() {
                    if check(&request) {
                        return;
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_controller_drives_request_to_completion() {
        let store = Arc::new(InMemoryStore::new());
        let oracle = Arc::new(StaticOracle::new().with_approver("bob", ["*"]));
        let controller = Arc::new(Controller::new(
            ControllerConfig::default(),
            store.clone(),
            ApprovalChecker::new(oracle),
        ));
        let mut events = controller.subscribe();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(controller.clone().run(shutdown_rx));

        let request = AccessRequest::new(
            "team-a",
            "req",
            vec![Subject::user("alice")],
            RoleRef::role("viewer"),
        );
        let created = store.create_request(request).await.unwrap();
        let key = created.key();

        wait_for(&store, &key, |r| {
            r.status.condition_status(ConditionType::Approved) == Some(ConditionStatus::False)
        })
        .await;

        let mut approved = store.get_request(&key).await.unwrap().unwrap();
        approved.spec.approved = true;
        approved.spec.attributes = Some(Attributes {
            created_by: "alice".to_string(),
            approved_by: "bob".to_string(),
            approval_time: Some(Utc::now()),
        });
        store.update_request(approved).await.unwrap();

        // the binding's own watch event drives the completing pass
        wait_for(&store, &key, |r| r.status.completion_time.is_some()).await;
        assert_eq!(store.list_bindings(None).await.unwrap().len(), 1);

        let mut saw_completed = false;
        while let Ok(envelope) = events.try_recv() {
            assert_eq!(envelope.request, key);
            saw_completed |= matches!(envelope.event, AccessEvent::Completed { bindings: 1 });
        }
        assert!(saw_completed);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_invariant_violation_is_not_retried() {
        let store = Arc::new(InMemoryStore::new());
        let controller = Arc::new(Controller::new(
            ControllerConfig::default(),
            store.clone(),
            ApprovalChecker::new(Arc::new(StaticOracle::new())),
        ));
        let mut events = controller.subscribe();

        let mut request = AccessRequest::new("team-a", "bad", vec![], RoleRef::role("viewer"));
        request.spec.approved = true;
        let key = store.create_request(request).await.unwrap().key();

        controller.enqueue(key.clone());
        let taken = controller.queue().get().await.unwrap();
        controller.process(taken).await;

        assert_eq!(controller.queue().failures(&key), 0);
        assert!(controller.queue().is_empty());
        let envelope = events.try_recv().unwrap();
        assert!(matches!(
            envelope.event,
            AccessEvent::ReconcileFailed { retrying: false, .. }
        ));
    }
}
