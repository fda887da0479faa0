//! Connection identity resolution
//!
//! Derives the caller's identity from the token presented at upgrade time.
//! Token issuance lives elsewhere; this is a pure function of the
//! credentials and holds no state.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use deskhub_shared::Role;

/// Resolved identity of a connected caller, immutable for the
/// connection's lifetime
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    pub role: Role,
    pub name: String,
}

/// Claims carried by a gateway connection token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub name: String,
    pub exp: i64,
}

/// Resolve an identity from a connection token
pub fn resolve(token: &str, secret: &str) -> Result<Identity, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(Identity {
        id: data.claims.sub,
        role: data.claims.role,
        name: data.claims.name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::OffsetDateTime;

    const SECRET: &str = "test-jwt-secret-must-be-at-least-32-characters-long";

    fn issue(role: Role) -> String {
        let claims = Claims {
            sub: Uuid::new_v4(),
            role,
            name: "Sam Agent".to_string(),
            exp: (OffsetDateTime::now_utc() + time::Duration::hours(1)).unix_timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_valid_token() {
        let identity = resolve(&issue(Role::Agent), SECRET).unwrap();
        assert_eq!(identity.role, Role::Agent);
        assert_eq!(identity.name, "Sam Agent");
    }

    #[test]
    fn test_resolve_rejects_wrong_secret() {
        let token = issue(Role::Customer);
        assert!(resolve(&token, "another-secret-that-is-also-32-chars!!").is_err());
    }

    #[test]
    fn test_resolve_rejects_garbage() {
        assert!(resolve("not-a-token", SECRET).is_err());
    }
}
