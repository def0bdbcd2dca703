pub mod interaction;
pub mod magnifier;

pub use interaction::{
    AngleDraftPhase, Draft, DraftPreview, Effects, Interaction, InteractionContext,
    InteractionState, MoveDrag, Tool,
};
pub use magnifier::Loupe;
