use std::sync::Arc;

use futures::{executor::ThreadPool, StreamExt};
use futures_channel::mpsc;

use crate::{
    errors::NodeError,
    resolver::{Cascade, Resolution},
    types::TypeInfo,
};

/// Reported by every resolution task once it is done
enum NodeEvent {
    Resolved(TypeInfo),
    Skipped(TypeInfo),
    Failed(NodeError),
}

/// Runs every resolution as its own task on `pool` and waits for the cascade to quiesce
pub(crate) fn run(cascade: Arc<Cascade>, pool: &ThreadPool, seeds: Vec<TypeInfo>) -> Vec<NodeError> {
    futures::executor::block_on(resolve_concurrently(cascade, pool, seeds))
}

/// Every task holds a sender, so the event stream ends exactly when no task is left
pub(crate) async fn resolve_concurrently(
    cascade: Arc<Cascade>,
    pool: &ThreadPool,
    seeds: Vec<TypeInfo>,
) -> Vec<NodeError> {
    let (event_tx, mut event_rx) = mpsc::unbounded();
    let seed_count = seeds.len();
    for node in seeds {
        spawn_resolve(pool, cascade.clone(), event_tx.clone(), node);
    }
    drop(event_tx);

    tracing::debug!("Started cascade from {seed_count} node(s)");

    let mut resolved = 0_usize;
    let mut failures = Vec::new();
    while let Some(event) = event_rx.next().await {
        match event {
            NodeEvent::Resolved(node) => {
                resolved += 1;
                tracing::trace!("{} resolved [{resolved} so far]", node.type_name);
            }
            NodeEvent::Skipped(node) => {
                tracing::trace!("{} needed no work", node.type_name);
            }
            NodeEvent::Failed(err) => failures.push(err),
        }
    }

    tracing::debug!(
        "Cascade quiesced after {resolved} resolution(s) and {} failure(s)",
        failures.len()
    );
    failures
}

fn spawn_resolve(
    pool: &ThreadPool,
    cascade: Arc<Cascade>,
    event_tx: mpsc::UnboundedSender<NodeEvent>,
    node: TypeInfo,
) {
    let task_pool = pool.clone();
    pool.spawn_ok(async move {
        match cascade.resolve(node) {
            Ok(Resolution::Resolved(ready)) => {
                // Consumers get their senders before ours is dropped
                for consumer in ready {
                    spawn_resolve(&task_pool, cascade.clone(), event_tx.clone(), consumer);
                }
                let _ = event_tx.unbounded_send(NodeEvent::Resolved(node));
            }
            Ok(Resolution::Skipped) => {
                let _ = event_tx.unbounded_send(NodeEvent::Skipped(node));
            }
            Err(err) => {
                let _ = event_tx.unbounded_send(NodeEvent::Failed(err));
            }
        }
    });
}
