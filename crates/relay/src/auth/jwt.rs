//! JWT credential verification

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use livedesk_shared::{AgentRole, Identity};

/// Claims carried by tokens issued by the auth collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// User role
    pub role: String,
    /// Display name
    pub name: String,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
}

/// Verifies credentials issued by the external auth collaborator
#[derive(Clone)]
pub struct JwtManager {
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Verify an opaque credential token and resolve the identity behind it.
    ///
    /// Returns `None` for expired, malformed, or unknown-role tokens; the
    /// caller translates that into `InvalidCredential`.
    pub fn verify_credential(&self, token: &str) -> Option<Identity> {
        let validation = Validation::new(Algorithm::HS256);
        let data = match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!(error = ?e, "Credential verification failed");
                return None;
            }
        };

        let role = match data.claims.role.as_str() {
            "agent" => AgentRole::Agent,
            "admin" => AgentRole::Admin,
            other => {
                tracing::warn!(role = %other, "Credential carries unknown role");
                return None;
            }
        };

        Some(Identity {
            id: data.claims.sub,
            role,
            name: data.claims.name,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::OffsetDateTime;

    const SECRET: &str = "test-secret-test-secret-test-secret-test";

    fn issue(role: &str, exp_offset_secs: i64) -> String {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            role: role.to_string(),
            name: "Agent A".to_string(),
            iat: now,
            exp: now + exp_offset_secs,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_verify_valid_agent_token() {
        let manager = JwtManager::new(SECRET);
        let identity = manager.verify_credential(&issue("agent", 3600)).unwrap();
        assert_eq!(identity.role, AgentRole::Agent);
        assert_eq!(identity.name, "Agent A");
    }

    #[test]
    fn test_reject_expired_token() {
        let manager = JwtManager::new(SECRET);
        assert!(manager.verify_credential(&issue("agent", -3600)).is_none());
    }

    #[test]
    fn test_reject_unknown_role() {
        let manager = JwtManager::new(SECRET);
        assert!(manager.verify_credential(&issue("customer", 3600)).is_none());
    }

    #[test]
    fn test_reject_wrong_secret() {
        let manager = JwtManager::new("another-secret-another-secret-another");
        assert!(manager.verify_credential(&issue("agent", 3600)).is_none());
    }
}
