pub mod brain;
pub mod coordinator;
pub mod ngram;
pub mod sampling;

pub use brain::{
    Brain, BrainStats, DEFAULT_RECURSION, EMPTY_BRAIN, LEXICON_TABLE, NGRAM_TABLE,
    NOT_ENOUGH_INFORMATION, NO_WORDS,
};
pub use coordinator::{ChatCoordinator, InboundMessage};
pub use ngram::{ngram_id, Ngram};
