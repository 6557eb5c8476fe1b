//! ICE candidate types as they appear after `typ` in an `a=candidate` line

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpCandidateType {
    Host,
    #[serde(rename = "srflx")]
    ServerReflexive,
    #[serde(rename = "prflx")]
    PeerReflexive,
    Relay,
}

impl SdpCandidateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SdpCandidateType::Host => "host",
            SdpCandidateType::ServerReflexive => "srflx",
            SdpCandidateType::PeerReflexive => "prflx",
            SdpCandidateType::Relay => "relay",
        }
    }

    /// Parse a `typ` token; unrecognized tokens are `None`
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "host" => Some(SdpCandidateType::Host),
            "srflx" => Some(SdpCandidateType::ServerReflexive),
            "prflx" => Some(SdpCandidateType::PeerReflexive),
            "relay" => Some(SdpCandidateType::Relay),
            _ => None,
        }
    }
}

impl fmt::Display for SdpCandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_mapping() {
        for t in [
            SdpCandidateType::Host,
            SdpCandidateType::ServerReflexive,
            SdpCandidateType::PeerReflexive,
            SdpCandidateType::Relay,
        ] {
            assert_eq!(SdpCandidateType::from_token(t.as_str()), Some(t));
        }
        assert_eq!(SdpCandidateType::from_token("unknown"), None);
    }
}
