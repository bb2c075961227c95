use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cartflow_core::{AddLineInput, Cart, LineId, RemoveLineInput, UpdateLineInput, VariantId};
use cartflow_engine::{
    CartCoordinator, CoordinatorConfig, EngineError, MutationIntent, SubmitOutcome,
};
use cartflow_storage::MemoryCart;
use tokio::task::JoinHandle;

use crate::actions::GatedActions;
use crate::fixtures;

pub type ShopActions = GatedActions<MemoryCart>;

/// A storefront wired end to end: in-memory backend, gated actions and a
/// coordinator whose revalidation callback is counted.
pub struct TestShop {
    pub backend: Arc<MemoryCart>,
    pub actions: Arc<ShopActions>,
    pub coordinator: CartCoordinator<ShopActions>,
    revalidations: Arc<AtomicUsize>,
}

impl Default for TestShop {
    fn default() -> Self {
        Self::new()
    }
}

impl TestShop {
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    pub fn with_config(config: CoordinatorConfig) -> Self {
        let backend = Arc::new(
            MemoryCart::new("gid://cartflow/Cart/test", fixtures::CURRENCY)
                .with_merchandise(fixtures::mug())
                .with_merchandise(fixtures::poster())
                .with_merchandise(fixtures::tote()),
        );
        let actions = Arc::new(GatedActions::new(Arc::clone(&backend)));
        let revalidations = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&revalidations);
        let coordinator = CartCoordinator::with_config(
            Arc::clone(&actions),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            config,
        );
        Self {
            backend,
            actions,
            coordinator,
            revalidations,
        }
    }

    pub fn revalidations(&self) -> usize {
        self.revalidations.load(Ordering::SeqCst)
    }

    pub async fn submit(&self, intent: MutationIntent) -> Result<SubmitOutcome, EngineError> {
        self.coordinator.submit(intent).await
    }

    /// Submits on a separate task so the caller can observe the in-flight state.
    pub fn spawn_submit(
        &self,
        intent: MutationIntent,
    ) -> JoinHandle<Result<SubmitOutcome, EngineError>> {
        let coordinator = self.coordinator.clone();
        tokio::spawn(async move { coordinator.submit(intent).await })
    }

    pub async fn add(&self, variant: &str, quantity: u32) -> Result<SubmitOutcome, EngineError> {
        self.submit(MutationIntent::AddLines(AddLineInput::new(variant, quantity)))
            .await
    }

    pub async fn update(
        &self,
        line_id: &LineId,
        quantity: u32,
    ) -> Result<SubmitOutcome, EngineError> {
        self.submit(MutationIntent::UpdateLine(UpdateLineInput::new(
            line_id.clone(),
            quantity,
        )))
        .await
    }

    pub async fn remove(&self, line_id: &LineId) -> Result<SubmitOutcome, EngineError> {
        self.submit(MutationIntent::RemoveLine(RemoveLineInput::new(line_id.clone())))
            .await
    }

    pub async fn clear(&self) -> Result<SubmitOutcome, EngineError> {
        self.submit(MutationIntent::Clear).await
    }

    /// Refetches the authoritative cart, as the revalidation collaborator would.
    pub async fn sync(&self) -> Result<Cart, EngineError> {
        self.coordinator.refresh(self.backend.as_ref()).await
    }

    pub fn line_id(&self, variant: &str) -> Option<LineId> {
        self.backend.line_for(&VariantId::from(variant))
    }
}
