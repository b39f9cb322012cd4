use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh token pair issued by the Auth API.
///
/// Token contents are opaque to the client; `expires_at` is whatever the
/// server advertised at issuance and may be absent (refresh responses omit it).
/// The server alone decides whether a token is still good.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_omits_unknown_expiry() {
        let json = serde_json::to_value(TokenSet::new("a", "r")).unwrap();
        assert_eq!(json, serde_json::json!({"accessToken": "a", "refreshToken": "r"}));

        let at: DateTime<Utc> = "2030-01-01T00:00:00Z".parse().unwrap();
        let back: TokenSet = serde_json::from_value(serde_json::json!({
            "accessToken": "a",
            "refreshToken": "r",
            "expiresAt": "2030-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(back, TokenSet::new("a", "r").with_expiry(at));
    }
}
