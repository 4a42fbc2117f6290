//! Storage-independent election logic.

mod category;
mod clock;

pub use category::{AttributeKind, VoterAttributes, VoterCategory};
pub use clock::{ElectionClock, ElectionStatus, ElectionWindow, ELECTION_ENDED_MESSAGE};
