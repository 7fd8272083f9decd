//! User access tokens for API authentication.
//!
//! Tokens are HMAC-SHA256 based, scoped to a (user_id, org_id) pair.
//! Format: `planhub_ut_<user_id>_<org_id>_<hmac_hex>`

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Token prefix used to identify planhub user tokens.
const TOKEN_PREFIX: &str = "planhub_ut_";

/// Length of a hyphenated UUID.
const UUID_LEN: usize = 36;

/// Errors that can occur during token operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token format: {0}")]
    InvalidFormat(String),

    #[error("invalid user ID in token: {0}")]
    InvalidUserId(String),

    #[error("invalid org ID in token: {0}")]
    InvalidOrgId(String),

    #[error("token HMAC verification failed")]
    HmacMismatch,

    #[error("missing token secret")]
    MissingSecret,
}

/// Configuration for token generation and validation.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// The HMAC secret key bytes.
    pub secret: Vec<u8>,
}

impl TokenConfig {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }

    /// Create a TokenConfig from the `PLANHUB_TOKEN_SECRET` environment
    /// variable, which must hold hex (as written by `planhub init`).
    pub fn from_env() -> Result<Self, TokenError> {
        let secret_hex =
            std::env::var("PLANHUB_TOKEN_SECRET").map_err(|_| TokenError::MissingSecret)?;
        let secret = hex::decode(&secret_hex).map_err(|e| {
            TokenError::InvalidFormat(format!("PLANHUB_TOKEN_SECRET is not valid hex: {e}"))
        })?;
        Ok(Self::new(secret))
    }
}

/// Claims extracted from a validated token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: Uuid,
    pub org_id: Uuid,
}

/// Generate a user token for acting within one organization.
///
/// The HMAC-SHA256 is computed over `<user_id>:<org_id>`.
pub fn generate_token(config: &TokenConfig, user_id: Uuid, org_id: Uuid) -> String {
    let message = format!("{user_id}:{org_id}");
    let mac = compute_hmac(&config.secret, message.as_bytes());
    let hmac_hex = hex::encode(mac);
    format!("{TOKEN_PREFIX}{user_id}_{org_id}_{hmac_hex}")
}

/// Validate a user token and extract its claims.
///
/// The HMAC is checked with a constant-time comparison.
pub fn validate_token(config: &TokenConfig, token: &str) -> Result<TokenClaims, TokenError> {
    let rest = token.strip_prefix(TOKEN_PREFIX).ok_or_else(|| {
        TokenError::InvalidFormat(format!("token must start with '{TOKEN_PREFIX}'"))
    })?;

    let (user_str, rest) = split_uuid_prefix(rest)?;
    let user_id =
        Uuid::parse_str(user_str).map_err(|e| TokenError::InvalidUserId(e.to_string()))?;

    let rest = rest.strip_prefix('_').ok_or_else(|| {
        TokenError::InvalidFormat("expected underscore after user ID".to_string())
    })?;

    let (org_str, rest) = split_uuid_prefix(rest)?;
    let org_id = Uuid::parse_str(org_str).map_err(|e| TokenError::InvalidOrgId(e.to_string()))?;

    let hmac_hex = rest.strip_prefix('_').ok_or_else(|| {
        TokenError::InvalidFormat("expected underscore after org ID".to_string())
    })?;

    let provided_mac = hex::decode(hmac_hex)
        .map_err(|e| TokenError::InvalidFormat(format!("invalid hex in hmac: {e}")))?;

    let message = format!("{user_id}:{org_id}");
    verify_hmac_constant_time(&config.secret, message.as_bytes(), &provided_mac)?;

    Ok(TokenClaims { user_id, org_id })
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn parse_bearer(header_value: &str) -> Result<&str, TokenError> {
    let (scheme, token) = header_value.trim().split_once(' ').ok_or_else(|| {
        TokenError::InvalidFormat("authorization header must be 'Bearer <token>'".to_string())
    })?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(TokenError::InvalidFormat(format!(
            "unsupported authorization scheme {scheme:?}"
        )));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::InvalidFormat("empty bearer token".to_string()));
    }
    Ok(token)
}

/// Split a hyphenated UUID off the front of `s`. Returns (uuid_str, remainder).
fn split_uuid_prefix(s: &str) -> Result<(&str, &str), TokenError> {
    if s.len() < UUID_LEN || !s.is_char_boundary(UUID_LEN) {
        return Err(TokenError::InvalidFormat(
            "token too short to contain a valid UUID".to_string(),
        ));
    }
    Ok(s.split_at(UUID_LEN))
}

fn new_mac(key: &[u8]) -> HmacSha256 {
    <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC can take key of any size")
}

/// Compute HMAC-SHA256 over the given message with the given key.
fn compute_hmac(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = new_mac(key);
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Verify an HMAC using `hmac`'s constant-time `verify_slice`.
fn verify_hmac_constant_time(
    key: &[u8],
    message: &[u8],
    expected_mac: &[u8],
) -> Result<(), TokenError> {
    let mut mac = new_mac(key);
    mac.update(message);
    mac.verify_slice(expected_mac)
        .map_err(|_| TokenError::HmacMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TokenConfig {
        TokenConfig::new(b"test-secret-key-for-planhub".to_vec())
    }

    fn ids() -> (Uuid, Uuid) {
        (
            Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap(),
            Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").unwrap(),
        )
    }

    #[test]
    fn generate_token_has_correct_format() {
        let config = test_config();
        let (user_id, org_id) = ids();

        let token = generate_token(&config, user_id, org_id);

        assert!(token.starts_with("planhub_ut_"));
        let rest = token.strip_prefix("planhub_ut_").unwrap();
        assert_eq!(&rest[..36], user_id.to_string());
        assert_eq!(&rest[37..73], org_id.to_string());
        let hmac_hex = &rest[74..];
        assert_eq!(hmac_hex.len(), 64, "HMAC-SHA256 hex should be 64 chars");
    }

    #[test]
    fn generate_and_validate_roundtrip() {
        let config = test_config();
        let (user_id, org_id) = ids();

        let token = generate_token(&config, user_id, org_id);
        let claims = validate_token(&config, &token).unwrap();

        assert_eq!(claims, TokenClaims { user_id, org_id });
    }

    #[test]
    fn reject_tampered_hmac() {
        let config = test_config();
        let (user_id, org_id) = ids();
        let mut token = generate_token(&config, user_id, org_id);

        let last = token.pop().unwrap();
        token.push(if last == 'a' { 'b' } else { 'a' });

        let result = validate_token(&config, &token);
        assert!(matches!(result, Err(TokenError::HmacMismatch)));
    }

    #[test]
    fn reject_swapped_org() {
        let config = test_config();
        let (user_id, org_id) = ids();
        let token = generate_token(&config, user_id, org_id);

        let other_org = Uuid::new_v4();
        let tampered = token.replace(&org_id.to_string(), &other_org.to_string());

        let result = validate_token(&config, &tampered);
        assert!(matches!(result, Err(TokenError::HmacMismatch)));
    }

    #[test]
    fn reject_wrong_secret() {
        let config = test_config();
        let (user_id, org_id) = ids();
        let token = generate_token(&config, user_id, org_id);

        let wrong_config = TokenConfig::new(b"wrong-secret-key".to_vec());
        let result = validate_token(&wrong_config, &token);
        assert!(matches!(result, Err(TokenError::HmacMismatch)));
    }

    #[test]
    fn reject_malformed_tokens() {
        let config = test_config();
        let (user_id, _) = ids();

        for bad in [
            "",
            "wrong_prefix_abc",
            "planhub_ut_short",
            &format!("planhub_ut_{user_id}"),
            &format!("planhub_ut_{user_id}-{user_id}_00"),
        ] {
            let result = validate_token(&config, bad);
            assert!(
                matches!(result, Err(TokenError::InvalidFormat(_))),
                "expected InvalidFormat for {bad:?}, got {result:?}"
            );
        }
    }

    #[test]
    fn reject_invalid_uuids() {
        let config = test_config();
        let (user_id, _) = ids();

        let bad_user = format!("planhub_ut_{}_{user_id}_00", "x".repeat(36));
        assert!(matches!(
            validate_token(&config, &bad_user),
            Err(TokenError::InvalidUserId(_))
        ));

        let bad_org = format!("planhub_ut_{user_id}_{}_00", "y".repeat(36));
        assert!(matches!(
            validate_token(&config, &bad_org),
            Err(TokenError::InvalidOrgId(_))
        ));
    }

    #[test]
    fn reject_invalid_hex_in_hmac() {
        let config = test_config();
        let (user_id, org_id) = ids();
        let token = format!("planhub_ut_{user_id}_{org_id}_zz-not-hex");
        assert!(matches!(
            validate_token(&config, &token),
            Err(TokenError::InvalidFormat(_))
        ));
    }

    #[test]
    fn same_inputs_produce_same_token() {
        let config = test_config();
        let (user_id, org_id) = ids();
        assert_eq!(
            generate_token(&config, user_id, org_id),
            generate_token(&config, user_id, org_id)
        );
        assert_ne!(
            generate_token(&config, user_id, org_id),
            generate_token(&config, org_id, user_id)
        );
    }

    #[test]
    fn parse_bearer_accepts_standard_header() {
        assert_eq!(parse_bearer("Bearer abc").unwrap(), "abc");
        assert_eq!(parse_bearer("bearer   abc  ").unwrap(), "abc");
    }

    #[test]
    fn parse_bearer_rejects_other_schemes() {
        assert!(parse_bearer("Basic dXNlcjpwdw==").is_err());
        assert!(parse_bearer("Bearer").is_err());
        assert!(parse_bearer("Bearer    ").is_err());
        assert!(parse_bearer("").is_err());
    }
}
