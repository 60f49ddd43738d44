//! Mutations with optimistic update, rollback and settlement.
//!
//! A mutation runs as a small state machine:
//!
//! ```text
//! Idle -> Mutating -> Committed(output)
//!                  -> RolledBack(error)
//! ```
//!
//! [`MutationHandler::on_mutate`] runs synchronously before the request and
//! may return a [`MutationContext`] holding snapshots of every key it
//! touched. The context is the only thing carried from the optimistic step
//! to settlement. If the request fails, the snapshots are restored before
//! `on_error` runs. If the caller drops the future before the request
//! settles, the snapshots are restored and `on_settled` still runs, so the
//! cache never keeps an unconfirmed write. Mutations are never retried.

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use payloads::ClientError;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{QueryClient, Snapshot};

/// State message of a call dropped before its request settled.
pub const CANCELLED: &str = "Mutation cancelled";

/// Pre-mutation cache values needed to undo an optimistic write.
#[derive(Debug, Clone, Default)]
pub struct MutationContext {
    snapshots: Vec<Snapshot>,
}

impl MutationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshots.push(snapshot);
        self
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Restore every snapshot, last taken first.
    pub fn rollback(&self, client: &QueryClient) {
        for snapshot in self.snapshots.iter().rev() {
            tracing::debug!(key = %snapshot.key(), "Rolling back optimistic write");
            client.restore(snapshot);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationState<R> {
    Idle,
    Mutating,
    Committed(R),
    /// The request failed. Any optimistic write has been undone.
    RolledBack(String),
}

/// The remote operation behind a mutation hook plus its cache phases.
pub trait MutationHandler: 'static {
    type Variables: Clone + 'static;
    type Output: Clone + 'static;

    fn mutation_fn(
        &self,
        variables: Self::Variables,
    ) -> LocalBoxFuture<'static, Result<Self::Output, ClientError>>;

    /// Optimistic step. Cancel fetches for the keys about to be written,
    /// snapshot them, write. Return `None` to skip the optimistic write,
    /// e.g. when nobody is signed in; the request still goes out.
    fn on_mutate(
        &self,
        _client: &QueryClient,
        _variables: &Self::Variables,
    ) -> Option<MutationContext> {
        None
    }

    /// Runs after the context, if any, has been rolled back.
    fn on_error(
        &self,
        _client: &QueryClient,
        _error: &ClientError,
        _variables: &Self::Variables,
        _context: Option<&MutationContext>,
    ) {
    }

    fn on_success(
        &self,
        _client: &QueryClient,
        _output: &Self::Output,
        _variables: &Self::Variables,
    ) {
    }

    /// Runs last, whatever the outcome.
    fn on_settled(&self, _client: &QueryClient, _variables: &Self::Variables) {}
}

/// A mounted mutation hook.
pub struct Mutation<M: MutationHandler> {
    client: QueryClient,
    handler: Rc<M>,
    state: Rc<RefCell<MutationState<M::Output>>>,
    in_flight: Rc<Cell<usize>>,
    /// Only the most recent call updates `state`.
    generation: Rc<Cell<u64>>,
    listeners: Rc<RefCell<Vec<Rc<dyn Fn()>>>>,
}

impl<M: MutationHandler> Clone for Mutation<M> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            handler: self.handler.clone(),
            state: self.state.clone(),
            in_flight: self.in_flight.clone(),
            generation: self.generation.clone(),
            listeners: self.listeners.clone(),
        }
    }
}

impl<M: MutationHandler> Mutation<M> {
    pub fn new(client: &QueryClient, handler: M) -> Self {
        Self {
            client: client.clone(),
            handler: Rc::new(handler),
            state: Rc::new(RefCell::new(MutationState::Idle)),
            in_flight: Rc::new(Cell::new(0)),
            generation: Rc::new(Cell::new(0)),
            listeners: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn handler(&self) -> &M {
        &self.handler
    }

    pub fn state(&self) -> MutationState<M::Output> {
        self.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.get() > 0
    }

    /// Call `listener` whenever the state changes.
    pub fn on_change(&self, listener: impl Fn() + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    fn set_state(&self, generation: u64, state: MutationState<M::Output>) {
        if self.generation.get() != generation {
            return;
        }
        *self.state.borrow_mut() = state;
        let listeners: Vec<Rc<dyn Fn()>> = self.listeners.borrow().clone();
        for listener in listeners {
            listener();
        }
    }

    /// Run the mutation and wait for it to settle.
    pub async fn mutate(
        &self,
        variables: M::Variables,
    ) -> Result<M::Output, ClientError> {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.in_flight.set(self.in_flight.get() + 1);
        self.set_state(generation, MutationState::Mutating);

        let mut pending = PendingMutation {
            context: self.handler.on_mutate(&self.client, &variables),
            mutation: self.clone(),
            variables: Some(variables.clone()),
            generation,
        };
        let result = self.handler.mutation_fn(variables).await;
        pending.settle(&result);
        result
    }

    fn finish(&self) {
        self.in_flight.set(self.in_flight.get().saturating_sub(1));
    }

    /// Fire and forget, for event handlers. Failures are logged and rolled
    /// back.
    pub fn mutate_detached(&self, variables: M::Variables) {
        let mutation = self.clone();
        self.client.spawn(
            async move {
                let _ = mutation.mutate(variables).await;
            }
            .boxed_local(),
        );
    }
}

/// One call between its optimistic write and settlement. Settles as
/// cancelled if dropped before the request completes.
struct PendingMutation<M: MutationHandler> {
    mutation: Mutation<M>,
    context: Option<MutationContext>,
    /// Taken on settlement.
    variables: Option<M::Variables>,
    generation: u64,
}

impl<M: MutationHandler> PendingMutation<M> {
    fn settle(&mut self, result: &Result<M::Output, ClientError>) {
        let Some(variables) = self.variables.take() else {
            return;
        };
        let mutation = &self.mutation;
        let client = &mutation.client;
        mutation.finish();
        match result {
            Ok(output) => {
                mutation.handler.on_success(client, output, &variables);
                mutation.set_state(
                    self.generation,
                    MutationState::Committed(output.clone()),
                );
            }
            Err(e) => {
                tracing::warn!("Mutation failed: {e}");
                if let Some(context) = &self.context {
                    context.rollback(client);
                }
                mutation
                    .handler
                    .on_error(client, e, &variables, self.context.as_ref());
                mutation.set_state(
                    self.generation,
                    MutationState::RolledBack(e.to_string()),
                );
            }
        }
        mutation.handler.on_settled(client, &variables);
    }
}

impl<M: MutationHandler> Drop for PendingMutation<M> {
    fn drop(&mut self) {
        let Some(variables) = self.variables.take() else {
            return;
        };
        tracing::warn!("Mutation dropped before settling, rolling back");
        let mutation = &self.mutation;
        mutation.finish();
        if let Some(context) = &self.context {
            context.rollback(&mutation.client);
        }
        mutation.set_state(
            self.generation,
            MutationState::RolledBack(CANCELLED.to_string()),
        );
        mutation.handler.on_settled(&mutation.client, &variables);
    }
}
