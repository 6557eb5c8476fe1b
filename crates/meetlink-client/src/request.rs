//! Connection requests queued on the signaling client

use meetlink_core::CONTROL_PROTOCOL_VERSION;
use std::fmt;

/// Sub-protocol identifying a signaling session
pub const SESSION_SUBPROTOCOL: &str = "_aws_wt_session";

/// Where to connect and with which join token
#[derive(Clone, PartialEq, Eq)]
pub struct SignalingClientConnectionRequest {
    signaling_url: String,
    join_token: String,
}

impl SignalingClientConnectionRequest {
    pub fn new(signaling_url: impl Into<String>, join_token: impl Into<String>) -> Self {
        Self {
            signaling_url: signaling_url.into(),
            join_token: join_token.into(),
        }
    }

    /// Signaling URL with the control protocol query appended
    pub fn url(&self) -> String {
        format!(
            "{}?X-Chime-Control-Protocol-Version={}&X-Amzn-Chime-Send-Close-On-Error=1",
            self.signaling_url, CONTROL_PROTOCOL_VERSION
        )
    }

    pub fn protocols(&self) -> Vec<String> {
        vec![SESSION_SUBPROTOCOL.to_string(), self.join_token.clone()]
    }
}

// The join token is a credential
impl fmt::Debug for SignalingClientConnectionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalingClientConnectionRequest")
            .field("signaling_url", &self.signaling_url)
            .field("join_token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_and_protocols() {
        let request = SignalingClientConnectionRequest::new("wss://signal.example.com/control/abc", "tok");
        assert_eq!(
            request.url(),
            "wss://signal.example.com/control/abc?X-Chime-Control-Protocol-Version=3&X-Amzn-Chime-Send-Close-On-Error=1"
        );
        assert_eq!(request.protocols(), vec!["_aws_wt_session", "tok"]);
    }

    #[test]
    fn test_debug_hides_token() {
        let request = SignalingClientConnectionRequest::new("wss://x", "secret-token");
        assert!(!format!("{:?}", request).contains("secret-token"));
    }
}
