//! Spaced-repetition flashcards with SM-2 scheduling.

pub mod add;
pub mod delete;
pub mod error;
pub mod init;
pub mod list;
pub mod models;
pub mod review;
pub mod scheduler;
pub mod stats;
pub mod store;
pub mod utils;

pub use error::InvalidInputError;
pub use models::{Card, FlashcardSchedulingState};
pub use review::{ReviewOutcome, ReviewSession};
pub use scheduler::{compute_next_state, Quality};
pub use store::{CardBox, FlashcardStore, MemoryStore};
