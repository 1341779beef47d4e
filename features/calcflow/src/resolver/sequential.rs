use std::collections::VecDeque;

use crate::{
    errors::NodeError,
    resolver::{Cascade, Resolution},
    types::TypeInfo,
};

/// Runs the cascade on the calling thread
///
/// Nodes made ready by a completion are queued instead of recursed into,
/// so deep graphs don't grow the stack.
pub(crate) fn run(cascade: &Cascade, seeds: Vec<TypeInfo>) -> Vec<NodeError> {
    let mut queue: VecDeque<TypeInfo> = seeds.into();
    let mut failures = Vec::new();

    while let Some(node) = queue.pop_front() {
        match cascade.resolve(node) {
            Ok(Resolution::Resolved(ready)) => queue.extend(ready),
            Ok(Resolution::Skipped) => {}
            // The failed branch stops here, its consumers never reach zero
            Err(err) => failures.push(err),
        }
    }

    failures
}
