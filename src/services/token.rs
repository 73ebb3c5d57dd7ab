//! Token signing and verification
//!
//! Tokens are JWS compact strings. The header carries the id (`kid`) of the
//! key that signed them, and verification resolves that id through a
//! [`KeyLookup`], so tokens signed before a key rotation stay valid while
//! their public key is still published.
//!
//! Expiry is *not* enforced here: the codec answers "was this signed by us",
//! and the authorization middleware decides liveness against the injected
//! clock and the session store.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::{config::AuthConfig, error::AppError, models::claims::Claims};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token configuration: {0}")]
    Configuration(String),

    #[error("signing token: {0}")]
    Signing(String),

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("unrecognized key id {0:?}")]
    UnknownKey(String),
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Configuration(msg) => AppError::Configuration(msg),
            TokenError::Signing(msg) => AppError::Internal(format!("Failed to create token: {}", msg)),
            TokenError::Malformed(_) | TokenError::UnknownKey(_) => AppError::unauthorized(),
        }
    }
}

/// Maps a key id to the public key that verifies its signatures
#[async_trait]
pub trait KeyLookup: Send + Sync {
    async fn lookup(&self, kid: &str) -> Result<DecodingKey, TokenError>;
}

/// Fixed key set loaded at startup. Good enough for a handful of rotated
/// keys; a JWKS-backed lookup would implement the same trait.
#[derive(Clone, Default)]
pub struct StaticKeyLookup {
    keys: HashMap<String, DecodingKey>,
}

impl StaticKeyLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, kid: impl Into<String>, key: DecodingKey) -> Self {
        self.keys.insert(kid.into(), key);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Load every configured public key from disk
    pub fn from_config(config: &AuthConfig, algorithm: Algorithm) -> Result<Self, TokenError> {
        let mut lookup = Self::new();
        for entry in &config.public_keys {
            let bytes = fs::read(&entry.path).map_err(|e| {
                TokenError::Configuration(format!("reading public key {}: {}", entry.path, e))
            })?;
            lookup = lookup.with_key(entry.kid.clone(), decoding_key(algorithm, &bytes)?);
        }
        Ok(lookup)
    }
}

#[async_trait]
impl KeyLookup for StaticKeyLookup {
    async fn lookup(&self, kid: &str) -> Result<DecodingKey, TokenError> {
        self.keys
            .get(kid)
            .cloned()
            .ok_or_else(|| TokenError::UnknownKey(kid.to_string()))
    }
}

/// Parse key material for `algorithm`: PEM for asymmetric families, raw bytes for HMAC
pub fn encoding_key(algorithm: Algorithm, material: &[u8]) -> Result<EncodingKey, TokenError> {
    let key = match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(EncodingKey::from_secret(material)),
        Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(material),
        Algorithm::EdDSA => EncodingKey::from_ed_pem(material),
        _ => EncodingKey::from_rsa_pem(material),
    };
    key.map_err(|e| TokenError::Configuration(format!("invalid private key: {}", e)))
}

pub fn decoding_key(algorithm: Algorithm, material: &[u8]) -> Result<DecodingKey, TokenError> {
    let key = match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(DecodingKey::from_secret(material)),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(material),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(material),
        _ => DecodingKey::from_rsa_pem(material),
    };
    key.map_err(|e| TokenError::Configuration(format!("invalid public key: {}", e)))
}

/// Signs claims with the active private key and verifies tokens through the key lookup
pub struct TokenCodec {
    private_key: EncodingKey,
    active_kid: String,
    algorithm: Algorithm,
    keys: Arc<dyn KeyLookup>,
    validation: Validation,
}

impl TokenCodec {
    /// Fails if the private key, the active key id or the key lookup is missing
    pub fn new(
        private_key: Option<EncodingKey>,
        active_kid: &str,
        algorithm: Algorithm,
        keys: Option<Arc<dyn KeyLookup>>,
    ) -> Result<Self, TokenError> {
        let private_key = private_key
            .ok_or_else(|| TokenError::Configuration("private key cannot be missing".to_string()))?;

        if active_kid.trim().is_empty() {
            return Err(TokenError::Configuration("active kid cannot be blank".to_string()));
        }

        let keys = keys
            .ok_or_else(|| TokenError::Configuration("public key lookup cannot be missing".to_string()))?;

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = ["sub", "exp"].iter().map(|c| c.to_string()).collect::<HashSet<_>>();

        Ok(Self {
            private_key,
            active_kid: active_kid.to_string(),
            algorithm,
            keys,
            validation,
        })
    }

    /// Build the codec from the `auth` configuration section
    pub fn from_config(config: &AuthConfig) -> Result<Self, TokenError> {
        let algorithm = Algorithm::from_str(&config.algorithm).map_err(|_| {
            TokenError::Configuration(format!("unsupported algorithm {}", config.algorithm))
        })?;

        let private_key = if config.private_key_path.is_empty() {
            None
        } else {
            let bytes = fs::read(&config.private_key_path).map_err(|e| {
                TokenError::Configuration(format!(
                    "reading private key {}: {}",
                    config.private_key_path, e
                ))
            })?;
            Some(encoding_key(algorithm, &bytes)?)
        };

        let lookup = StaticKeyLookup::from_config(config, algorithm)?;
        let keys: Option<Arc<dyn KeyLookup>> = if lookup.is_empty() {
            None
        } else {
            Some(Arc::new(lookup))
        };

        Self::new(private_key, &config.active_kid, algorithm, keys)
    }

    pub fn active_kid(&self) -> &str {
        &self.active_kid
    }

    /// Sign `claims`, stamping the active key id into the header
    pub fn generate_token(&self, claims: &Claims) -> Result<String, TokenError> {
        let mut header = Header::new(self.algorithm);
        header.kid = Some(self.active_kid.clone());

        encode(&header, claims, &self.private_key).map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Recreate the claims a token was generated from, checking it was signed by one of our keys
    pub async fn parse_claims(&self, token: &str) -> Result<Claims, TokenError> {
        let header = decode_header(token).map_err(|e| TokenError::Malformed(e.to_string()))?;

        let kid = header
            .kid
            .ok_or_else(|| TokenError::Malformed("missing key id (kid) in token header".to_string()))?;

        let key = self.keys.lookup(&kid).await?;

        let data = decode::<Claims>(token, &key, &self.validation)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::claims::Role;
    use chrono::{Duration, TimeZone, Utc};

    const PRIMARY_PRIVATE: &[u8] = include_bytes!("../../tests/fixtures/primary.pem");
    const PRIMARY_PUBLIC: &[u8] = include_bytes!("../../tests/fixtures/primary.pub.pem");
    const ROTATED_PRIVATE: &[u8] = include_bytes!("../../tests/fixtures/rotated.pem");
    const ROTATED_PUBLIC: &[u8] = include_bytes!("../../tests/fixtures/rotated.pub.pem");

    fn both_keys() -> Arc<dyn KeyLookup> {
        Arc::new(
            StaticKeyLookup::new()
                .with_key("primary", decoding_key(Algorithm::RS256, PRIMARY_PUBLIC).unwrap())
                .with_key("rotated", decoding_key(Algorithm::RS256, ROTATED_PUBLIC).unwrap()),
        )
    }

    fn codec(private: &[u8], kid: &str, keys: Arc<dyn KeyLookup>) -> TokenCodec {
        TokenCodec::new(
            Some(encoding_key(Algorithm::RS256, private).unwrap()),
            kid,
            Algorithm::RS256,
            Some(keys),
        )
        .unwrap()
    }

    fn sample_claims() -> Claims {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Claims::new(
            "5c1b7d7e-8a52-4bb3-a4b6-2b1f5a1d2e30",
            [Role::User].into_iter().collect(),
            now,
            Duration::hours(1),
            "csrf-token",
        )
    }

    #[tokio::test]
    async fn test_round_trip() {
        let codec = codec(PRIMARY_PRIVATE, "primary", both_keys());
        let claims = sample_claims();

        let token = codec.generate_token(&claims).unwrap();
        let parsed = codec.parse_claims(&token).await.unwrap();

        assert_eq!(parsed, claims);
    }

    #[tokio::test]
    async fn test_header_carries_active_kid() {
        let codec = codec(ROTATED_PRIVATE, "rotated", both_keys());
        let token = codec.generate_token(&sample_claims()).unwrap();

        let header = decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("rotated"));
        assert_eq!(header.alg, Algorithm::RS256);
    }

    #[tokio::test]
    async fn test_expired_claims_still_parse() {
        let codec = codec(PRIMARY_PRIVATE, "primary", both_keys());
        let old = Claims::new(
            "subject",
            [Role::Admin].into_iter().collect(),
            Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap(),
            Duration::minutes(5),
            "",
        );

        let token = codec.generate_token(&old).unwrap();
        assert_eq!(codec.parse_claims(&token).await.unwrap(), old);
    }

    #[tokio::test]
    async fn test_tokens_survive_key_rotation() {
        let before = codec(PRIMARY_PRIVATE, "primary", both_keys());
        let after = codec(ROTATED_PRIVATE, "rotated", both_keys());
        let claims = sample_claims();

        let old_token = before.generate_token(&claims).unwrap();
        let new_token = after.generate_token(&claims).unwrap();

        assert_eq!(after.parse_claims(&old_token).await.unwrap(), claims);
        assert_eq!(after.parse_claims(&new_token).await.unwrap(), claims);
    }

    #[tokio::test]
    async fn test_unknown_kid() {
        let only_primary: Arc<dyn KeyLookup> = Arc::new(
            StaticKeyLookup::new()
                .with_key("primary", decoding_key(Algorithm::RS256, PRIMARY_PUBLIC).unwrap()),
        );
        let signer = codec(ROTATED_PRIVATE, "rotated", both_keys());
        let verifier = codec(PRIMARY_PRIVATE, "primary", only_primary);

        let token = signer.generate_token(&sample_claims()).unwrap();
        let err = verifier.parse_claims(&token).await.unwrap_err();

        assert!(matches!(err, TokenError::UnknownKey(ref kid) if kid == "rotated"));
        assert!(matches!(AppError::from(err), AppError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_signature_from_wrong_key() {
        // Claims to be "primary" but is signed with the rotated private key.
        let forger = codec(ROTATED_PRIVATE, "primary", both_keys());
        let verifier = codec(PRIMARY_PRIVATE, "primary", both_keys());

        let token = forger.generate_token(&sample_claims()).unwrap();
        let err = verifier.parse_claims(&token).await.unwrap_err();

        assert!(matches!(err, TokenError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_tampered_and_garbage_tokens() {
        let codec = codec(PRIMARY_PRIVATE, "primary", both_keys());
        let token = codec.generate_token(&sample_claims()).unwrap();

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_payload = base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            br#"{"sub":"someone-else","roles":["admin"],"iat":0,"exp":9999999999,"csrf":""}"#,
        );
        parts[1] = &forged_payload;
        let tampered = parts.join(".");

        for bad in [tampered.as_str(), "not-a-token", "", "a.b.c"] {
            let err = codec.parse_claims(bad).await.unwrap_err();
            assert!(matches!(err, TokenError::Malformed(_)), "{:?} for {:?}", err, bad);
        }
    }

    #[tokio::test]
    async fn test_missing_kid_is_malformed() {
        let codec = codec(PRIMARY_PRIVATE, "primary", both_keys());
        let key = encoding_key(Algorithm::RS256, PRIMARY_PRIVATE).unwrap();
        let token = encode(&Header::new(Algorithm::RS256), &sample_claims(), &key).unwrap();

        let err = codec.parse_claims(&token).await.unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
    }

    #[test]
    fn test_construction_requires_configuration() {
        let key = || Some(encoding_key(Algorithm::RS256, PRIMARY_PRIVATE).unwrap());

        let missing_key = TokenCodec::new(None, "primary", Algorithm::RS256, Some(both_keys()));
        assert!(matches!(missing_key, Err(TokenError::Configuration(_))));

        let blank_kid = TokenCodec::new(key(), "  ", Algorithm::RS256, Some(both_keys()));
        assert!(matches!(blank_kid, Err(TokenError::Configuration(_))));

        let missing_lookup = TokenCodec::new(key(), "primary", Algorithm::RS256, None);
        assert!(matches!(missing_lookup, Err(TokenError::Configuration(_))));
    }

    #[test]
    fn test_from_config_rejects_empty_key_set() {
        let config = AuthConfig {
            active_kid: "primary".to_string(),
            private_key_path: "tests/fixtures/primary.pem".to_string(),
            public_keys: Vec::new(),
            ..AuthConfig::default()
        };

        assert!(matches!(
            TokenCodec::from_config(&config),
            Err(TokenError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_hmac_round_trip() {
        let keys: Arc<dyn KeyLookup> = Arc::new(
            StaticKeyLookup::new().with_key("dev", decoding_key(Algorithm::HS256, b"dev-secret").unwrap()),
        );
        let codec = TokenCodec::new(
            Some(encoding_key(Algorithm::HS256, b"dev-secret").unwrap()),
            "dev",
            Algorithm::HS256,
            Some(keys),
        )
        .unwrap();

        let claims = sample_claims();
        let token = codec.generate_token(&claims).unwrap();
        assert_eq!(codec.parse_claims(&token).await.unwrap(), claims);
    }
}
