//! Authenticated session state shared by the lender adapters.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

/// Tokens are refreshed this long before their recorded expiry so a send
/// never goes out with a token that lapses mid-flight.
pub const REFRESH_MARGIN_SECS: i64 = 300;

/// Lifetime assumed for tokens whose expiry cannot be determined.
pub const FALLBACK_TOKEN_TTL_SECS: i64 = 3600;

/// One authenticated session with a partner API.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    /// Session for a JWT-style bearer token. Expiry comes from the token's
    /// `exp` claim when present, otherwise the fallback TTL applies.
    pub fn from_bearer_token(access_token: String, issued_at: DateTime<Utc>) -> Self {
        let expires_at = expiry_from_jwt(&access_token)
            .unwrap_or_else(|| issued_at + Duration::seconds(FALLBACK_TOKEN_TTL_SECS));
        Self {
            access_token,
            refresh_token: None,
            expires_at,
        }
    }

    /// Session from an OAuth token response with an explicit lifetime in
    /// seconds. A missing lifetime falls back to the default TTL.
    pub fn with_lifetime(
        access_token: String,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let lifetime = expires_in_secs.unwrap_or(FALLBACK_TOKEN_TTL_SECS);
        Self {
            access_token,
            refresh_token,
            expires_at: issued_at + Duration::seconds(lifetime),
        }
    }

    /// Whether the token is still safely usable at `now`, leaving the
    /// refresh margin intact.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Reads the `exp` claim out of a JWT payload without verifying the
/// signature. Returns `None` for anything that does not decode as a JWT
/// with a numeric `exp`.
pub fn expiry_from_jwt(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: Value = serde_json::from_slice(&decoded).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    DateTime::from_timestamp(exp, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_with_exp(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload =
            URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"partner-7","exp":{}}}"#, exp).as_bytes());
        format!("{}.{}.signature", header, payload)
    }

    #[test]
    fn reads_exp_claim_from_jwt() {
        let expires = expiry_from_jwt(&jwt_with_exp(1_900_000_000)).unwrap();
        assert_eq!(expires.timestamp(), 1_900_000_000);
    }

    #[test]
    fn rejects_opaque_tokens() {
        assert!(expiry_from_jwt("not-a-jwt").is_none());
        assert!(expiry_from_jwt("a.%%%.c").is_none());
        // Valid base64 but no exp claim.
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"partner-7"}"#);
        assert!(expiry_from_jwt(&format!("h.{}.s", payload)).is_none());
    }

    #[test]
    fn bearer_session_uses_exp_claim() {
        let now = Utc::now();
        let exp = (now + Duration::hours(12)).timestamp();
        let session = AuthSession::from_bearer_token(jwt_with_exp(exp), now);
        assert_eq!(session.expires_at.timestamp(), exp);
        assert!(session.refresh_token.is_none());
    }

    #[test]
    fn bearer_session_falls_back_when_exp_missing() {
        let now = Utc::now();
        let session = AuthSession::from_bearer_token("opaque-token".to_string(), now);
        assert_eq!(
            session.expires_at,
            now + Duration::seconds(FALLBACK_TOKEN_TTL_SECS)
        );
    }

    #[test]
    fn freshness_respects_refresh_margin() {
        let now = Utc::now();
        let session = AuthSession::with_lifetime("token".to_string(), None, Some(600), now);

        assert!(session.is_fresh(now));
        // Inside the five-minute margin the token counts as stale.
        assert!(!session.is_fresh(now + Duration::seconds(301)));
        assert!(!session.is_fresh(now + Duration::seconds(900)));
    }

    #[test]
    fn missing_lifetime_uses_fallback_ttl() {
        let now = Utc::now();
        let session = AuthSession::with_lifetime(
            "token".to_string(),
            Some("refresh".to_string()),
            None,
            now,
        );
        assert_eq!(
            session.expires_at,
            now + Duration::seconds(FALLBACK_TOKEN_TTL_SECS)
        );
        assert_eq!(session.refresh_token.as_deref(), Some("refresh"));
    }
}
