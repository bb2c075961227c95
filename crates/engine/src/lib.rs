pub mod config;
pub mod coordinator;
pub mod error;
pub mod intent;
pub mod sequencer;
pub mod store;
pub mod view;

pub use config::{CoordinatorConfig, SequencerConfig};
pub use coordinator::{CartCoordinator, SubmitOutcome};
pub use error::EngineError;
pub use intent::{MutationIntent, MutationKind};
pub use sequencer::{
    Dispatch, Episode, MutationContext, MutationSequencer, SequencerSnapshot, SequencerState,
    Settlement,
};
pub use store::{
    CartUiStore, LastOperation, OperationOutcome, OptimisticDelta, OptimisticLines, UiEvent,
    UiState,
};
pub use view::{CartBody, CartView, FooterView, LineControls};
