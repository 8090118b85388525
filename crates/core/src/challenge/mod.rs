//! Challenge acquisition support.
//!
//! An artifact fetched from upstream is handed to a [`ChallengeSolverChain`],
//! which tries each configured [`SolvingCapability`] in order and returns the
//! first non-empty answer. Capabilities are external collaborators; this
//! crate ships none.

mod chain;
mod config;
mod error;
mod traits;
mod types;

pub use chain::ChallengeSolverChain;
pub use config::ChallengeConfig;
pub use error::ChallengeError;
pub use traits::SolvingCapability;
pub use types::{ArtifactPayload, ChallengeArtifact, SolvedChallenge};
