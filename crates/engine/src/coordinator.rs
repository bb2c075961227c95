use std::sync::Arc;

use cartflow_core::{Cart, OperationId};
use cartflow_storage::{CartActions, CartCache, CartSource};

use crate::config::CoordinatorConfig;
use crate::error::EngineError;
use crate::intent::MutationIntent;
use crate::sequencer::{Dispatch, Episode, MutationSequencer, Settlement};
use crate::store::{
    CartUiStore, LastOperation, OperationOutcome, OptimisticDelta, UiEvent, UiState,
};
use crate::view::CartView;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Settled(Settlement),
    /// Another mutation was in flight. UI state was left untouched.
    Dropped,
}

impl SubmitOutcome {
    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped)
    }

    pub fn settlement(&self) -> Option<&Settlement> {
        match self {
            Self::Settled(settlement) => Some(settlement),
            Self::Dropped => None,
        }
    }
}

impl From<&Settlement> for OperationOutcome {
    fn from(settlement: &Settlement) -> Self {
        match settlement {
            Settlement::Succeeded(_) => OperationOutcome::Succeeded,
            Settlement::Failed { message } => OperationOutcome::Failed {
                message: message.clone(),
            },
        }
    }
}

/// Drives one cart drawer: optimistic UI state, the mutation slot and the
/// last authoritative cart.
pub struct CartCoordinator<A> {
    store: CartUiStore,
    sequencer: MutationSequencer<A>,
    cache: CartCache,
    config: CoordinatorConfig,
}

impl<A> Clone for CartCoordinator<A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            sequencer: self.sequencer.clone(),
            cache: self.cache.clone(),
            config: self.config.clone(),
        }
    }
}

impl<A: CartActions + 'static> CartCoordinator<A> {
    pub fn new(actions: Arc<A>, revalidate: impl Fn() + Send + Sync + 'static) -> Self {
        Self::with_config(actions, revalidate, CoordinatorConfig::default())
    }

    /// `revalidate` runs after every successful mutation, once the cached
    /// cart has been marked stale.
    pub fn with_config(
        actions: Arc<A>,
        revalidate: impl Fn() + Send + Sync + 'static,
        config: CoordinatorConfig,
    ) -> Self {
        let cache = CartCache::new();
        let stale = cache.clone();
        let sequencer = MutationSequencer::with_config(
            actions,
            move || {
                stale.invalidate();
                revalidate();
            },
            config.sequencer.clone(),
        );
        Self {
            store: CartUiStore::new(),
            sequencer,
            cache,
            config,
        }
    }

    /// Runs one mutation end to end.
    ///
    /// Invalid intents are rejected before reaching the sequencer. If a
    /// mutation is already in flight the intent is dropped. Otherwise the
    /// optimistic delta and pending count are recorded before the call
    /// starts. Settling the pending count and `lastOperation` happens on its
    /// own task, so dropping the returned future does not leak `pending`.
    pub async fn submit(&self, intent: MutationIntent) -> Result<SubmitOutcome, EngineError> {
        intent.validate()?;
        let kind = intent.kind();
        let delta = intent.optimistic_delta();
        let operation = OperationId::new();
        let mut previous = None;

        let dispatch = self.sequencer.dispatch_with(intent, || {
            previous = delta.as_ref().map(|delta| self.previous_values(delta));
            if let Some(delta) = delta {
                self.store.send(UiEvent::OptimisticLinesUpdate(delta));
            }
            self.store.send(UiEvent::PendingInc);
            self.store.send(UiEvent::SetLastOperation(Some(LastOperation {
                id: operation,
                kind,
                outcome: OperationOutcome::Pending,
            })));
        });

        let episode = match dispatch {
            Dispatch::Accepted(episode) => episode,
            Dispatch::Ignored => {
                tracing::debug!(kind = kind.as_str(), pending = self.store.pending(), "submit dropped");
                return Ok(SubmitOutcome::Dropped);
            }
        };

        let rollback = if self.config.rollback_optimistic_on_failure {
            previous
        } else {
            None
        };
        let bookkeeping = tokio::spawn(finish(self.store.clone(), episode, operation, rollback));
        let settlement = match bookkeeping.await {
            Ok(settlement) => settlement,
            Err(err) => {
                tracing::error!(kind = kind.as_str(), error = %err, "cart mutation bookkeeping aborted");
                Settlement::Failed {
                    message: self.config.sequencer.unknown_error_message.clone(),
                }
            }
        };
        Ok(SubmitOutcome::Settled(settlement))
    }
}

/// Waits for `episode`, then releases the pending count, restores `rollback`
/// on failure and records the outcome.
async fn finish(
    store: CartUiStore,
    episode: Episode,
    operation: OperationId,
    rollback: Option<OptimisticDelta>,
) -> Settlement {
    let kind = episode.kind();
    let settlement = episode.settled().await;

    store.send(UiEvent::PendingDec);
    if let (false, Some(previous)) = (settlement.is_success(), rollback) {
        store.send(UiEvent::OptimisticLinesUpdate(previous));
    }
    store.send(UiEvent::SetLastOperation(Some(LastOperation {
        id: operation,
        kind,
        outcome: OperationOutcome::from(&settlement),
    })));
    settlement
}

impl<A> CartCoordinator<A> {
    pub fn store(&self) -> &CartUiStore {
        &self.store
    }

    pub fn sequencer(&self) -> &MutationSequencer<A> {
        &self.sequencer
    }

    pub fn cache(&self) -> &CartCache {
        &self.cache
    }

    pub fn ui(&self) -> UiState {
        self.store.snapshot()
    }

    pub fn cart(&self) -> Option<Cart> {
        self.cache.cart()
    }

    pub fn view(&self) -> CartView {
        CartView::build(&self.store.snapshot(), self.cache.cart().as_ref())
    }

    pub fn open(&self) {
        self.store.send(UiEvent::Open);
    }

    pub fn close(&self) {
        self.store.send(UiEvent::Close);
    }

    pub fn toggle(&self) {
        self.store.send(UiEvent::Toggle);
    }

    pub fn set_open(&self, open: bool) {
        self.store.send(crate::view::drawer_open_change(open));
    }

    /// Authoritative data supersedes every optimistic guess.
    pub fn receive_cart(&self, cart: Cart) {
        let revision = self.cache.replace(cart);
        self.store.send(UiEvent::OptimisticClear);
        tracing::debug!(revision, "authoritative cart received");
    }

    pub async fn refresh<S: CartSource + ?Sized>(&self, source: &S) -> Result<Cart, EngineError> {
        let cart = source.fetch_cart().await.inspect_err(|err| {
            tracing::warn!(error = %err, "cart refresh failed");
        })?;
        self.receive_cart(cart.clone());
        Ok(cart)
    }

    /// Refetches only if nothing is cached or a mutation invalidated it.
    pub async fn refresh_if_stale<S: CartSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<Option<Cart>, EngineError> {
        if !self.cache.needs_refresh() {
            return Ok(None);
        }
        self.refresh(source).await.map(Some)
    }

    /// Current optimistic values for the delta's keys, so a failed mutation
    /// can put them back. Absent keys restore as 0, which prunes them.
    fn previous_values(&self, delta: &OptimisticDelta) -> OptimisticDelta {
        let lines = self.store.optimistic_lines();
        delta
            .keys()
            .map(|line_id| (line_id.clone(), lines.get(line_id).unwrap_or(0)))
            .collect()
    }
}
