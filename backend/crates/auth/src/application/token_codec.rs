//! Bearer token signing and verification (HS256 JWT)
//!
//! Time checks use the injected clock instead of the library's wall clock,
//! so `exp`/`nbf` are validated here rather than by `jsonwebtoken`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::application::config::AuthConfig;
use crate::domain::entity::user::User;
use crate::domain::value_object::session_claims::SessionClaims;
use crate::error::{AuthError, AuthResult};

/// Random bytes in each `jti`
const JTI_BYTES: usize = 16;

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.jwt_issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iat", "iss", "sub"]);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(&config.jwt_secret),
            decoding: DecodingKey::from_secret(&config.jwt_secret),
            validation,
            issuer: config.jwt_issuer.clone(),
            ttl: config.token_ttl,
        }
    }

    /// Sign a token for `user`, valid from `now` for the configured lifetime
    pub fn mint(&self, user: &User, now: DateTime<Utc>) -> AuthResult<(String, SessionClaims)> {
        let iat = now.timestamp();
        let ttl = i64::try_from(self.ttl.as_secs())
            .map_err(|_| AuthError::Internal("token lifetime out of range".to_string()))?;

        let claims = SessionClaims {
            sub: SessionClaims::subject_for(&user.user_id),
            uid: user.user_id.into_uuid(),
            phone_number: user.phone_number.as_str().to_string(),
            iat,
            nbf: iat,
            exp: iat + ttl,
            iss: self.issuer.clone(),
            jti: platform::crypto::random_hex(JTI_BYTES),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("token signing failed: {e}")))?;

        Ok((token, claims))
    }

    /// Verify signature, algorithm, issuer and the `nbf <= now < exp` window
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> AuthResult<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "Token rejected during decode");
            AuthError::Unauthorized
        })?;

        let claims = data.claims;
        if !claims.is_current(now.timestamp()) {
            tracing::debug!(exp = claims.exp, nbf = claims.nbf, "Token outside validity window");
            return Err(AuthError::Unauthorized);
        }
        if claims.sub != format!("user:{}", claims.uid) {
            return Err(AuthError::Unauthorized);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::PhoneNumber;

    fn user() -> User {
        User::register(PhoneNumber::new("+1234567890").unwrap(), Utc::now())
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(&AuthConfig::with_random_secret())
    }

    #[test]
    fn test_mint_then_verify() {
        let codec = codec();
        let user = user();
        let now = Utc::now();
        let (token, claims) = codec.mint(&user, now).unwrap();

        assert_eq!(claims.uid, user.user_id.into_uuid());
        assert_eq!(claims.sub, format!("user:{}", user.user_id));
        assert_eq!(claims.exp - claims.iat, 86_400);
        assert_eq!(claims.iss, "otp-auth-service");

        let verified = codec.verify(&token, now).unwrap();
        assert_eq!(verified, claims);
    }

    #[test]
    fn test_same_second_tokens_differ() {
        let codec = codec();
        let user = user();
        let now = Utc::now();
        let (a, _) = codec.mint(&user, now).unwrap();
        let (b, _) = codec.mint(&user, now).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_expired_token_rejected() {
        let codec = codec();
        let now = Utc::now();
        let (token, _) = codec.mint(&user(), now).unwrap();
        let later = now + chrono::Duration::hours(24);
        assert!(matches!(codec.verify(&token, later), Err(AuthError::Unauthorized)));
    }

    #[test]
    fn test_not_yet_valid_token_rejected() {
        let codec = codec();
        let now = Utc::now();
        let (token, _) = codec.mint(&user(), now).unwrap();
        let earlier = now - chrono::Duration::seconds(5);
        assert!(matches!(codec.verify(&token, earlier), Err(AuthError::Unauthorized)));
    }

    #[test]
    fn test_other_key_or_issuer_rejected() {
        let now = Utc::now();
        let (token, _) = codec().mint(&user(), now).unwrap();
        assert!(codec().verify(&token, now).is_err());

        let secret = platform::crypto::random_bytes(32);
        let a = TokenCodec::new(&AuthConfig {
            jwt_secret: secret.clone(),
            ..Default::default()
        });
        let b = TokenCodec::new(&AuthConfig {
            jwt_secret: secret,
            jwt_issuer: "someone-else".to_string(),
            ..Default::default()
        });
        let (token, _) = a.mint(&user(), now).unwrap();
        assert!(b.verify(&token, now).is_err());
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let config = AuthConfig::with_random_secret();
        let codec = TokenCodec::new(&config);
        let now = Utc::now();
        let (_, claims) = codec.mint(&user(), now).unwrap();
        let hs512 = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(&config.jwt_secret),
        )
        .unwrap();
        assert!(codec.verify(&hs512, now).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            codec().verify("not.a.jwt", Utc::now()),
            Err(AuthError::Unauthorized)
        ));
    }
}
