//! Trait definitions for the challenge module.

use async_trait::async_trait;

use super::error::ChallengeError;
use super::types::ChallengeArtifact;

/// An external capability able to answer a challenge.
///
/// Implementations are opaque to the chain: it only knows their name and
/// order. The chain applies its own timeout around `solve`.
#[async_trait]
pub trait SolvingCapability: Send + Sync {
    /// Returns the name used in `capability_order` and logs.
    fn name(&self) -> &str;

    /// Produce an answer for the artifact.
    async fn solve(&self, artifact: &ChallengeArtifact) -> Result<String, ChallengeError>;
}
