//! Challenge data types.

use serde::{Deserialize, Serialize};

/// Payload of a challenge as delivered by upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactPayload {
    /// Raster image bytes with their MIME type.
    Image { bytes: Vec<u8>, mime: String },
    /// Inline markup (e.g. SVG).
    Markup { content: String },
}

/// A challenge that needs a text answer before submission.
///
/// The token is one-time-use: once the next artifact is fetched, any answer
/// computed for this one is worthless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeArtifact {
    /// Continuation token identifying this challenge upstream.
    pub token: String,
    pub payload: ArtifactPayload,
}

impl ChallengeArtifact {
    /// Artifact with an inline markup payload.
    pub fn markup(token: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            payload: ArtifactPayload::Markup {
                content: content.into(),
            },
        }
    }

    /// Artifact with an image payload.
    pub fn image(token: impl Into<String>, bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            payload: ArtifactPayload::Image {
                bytes,
                mime: mime.into(),
            },
        }
    }
}

/// An accepted answer and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolvedChallenge {
    /// Normalised answer (trimmed, lower-case).
    pub answer: String,
    /// Name of the capability that produced it.
    pub capability: String,
    /// 1-based attempt number of the whole chain.
    pub attempt: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_serialization_is_tagged() {
        let artifact = ChallengeArtifact::markup("tok-1", "<svg/>");
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["token"], "tok-1");
        assert_eq!(json["payload"]["kind"], "markup");
        assert_eq!(json["payload"]["content"], "<svg/>");
    }

    #[test]
    fn test_image_constructor() {
        let artifact = ChallengeArtifact::image("tok-2", vec![1, 2, 3], "image/png");
        match artifact.payload {
            ArtifactPayload::Image { bytes, mime } => {
                assert_eq!(bytes, vec![1, 2, 3]);
                assert_eq!(mime, "image/png");
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }
}
