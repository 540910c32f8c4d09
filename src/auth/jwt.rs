use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::JwtConfig, state::AppState, users::repo_types::User};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Reset,
}

/// Profile claim set carried by access and refresh tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: Option<String>,
    pub gender: String,
    pub address: String,
    pub joined_on: String,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

/// Reset tokens carry no profile data, only the user binding.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResetClaims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signing and verification keys. Access and reset tokens use the primary
/// secret; refresh tokens use a separate secret with their own expiry.
#[derive(Clone)]
pub struct JwtKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    reset_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from_config(&state.config.jwt)
    }
}

fn timestamps(ttl: Duration) -> (usize, usize) {
    let now = OffsetDateTime::now_utc();
    let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
    (now.unix_timestamp() as usize, exp.unix_timestamp() as usize)
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(cfg.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(cfg.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs((cfg.access_ttl_minutes as u64) * 60),
            refresh_ttl: Duration::from_secs((cfg.refresh_ttl_minutes as u64) * 60),
            reset_ttl: Duration::from_secs((cfg.reset_ttl_minutes as u64) * 60),
        }
    }

    fn claims_for(&self, user: &User, kind: TokenKind, ttl: Duration) -> Claims {
        let (iat, exp) = timestamps(ttl);
        Claims {
            sub: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role.clone(),
            gender: user.gender.clone(),
            address: user.address.clone(),
            joined_on: user.joined_on.clone(),
            iat,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        }
    }

    pub fn sign_access(&self, user: &User) -> anyhow::Result<String> {
        let claims = self.claims_for(user, TokenKind::Access, self.access_ttl);
        let token = encode(&Header::default(), &claims, &self.access_encoding)?;
        debug!(user_id = %user.id, "access token signed");
        Ok(token)
    }

    pub fn sign_refresh(&self, user: &User) -> anyhow::Result<String> {
        let claims = self.claims_for(user, TokenKind::Refresh, self.refresh_ttl);
        let token = encode(&Header::default(), &claims, &self.refresh_encoding)?;
        debug!(user_id = %user.id, "refresh token signed");
        Ok(token)
    }

    pub fn sign_pair(&self, user: &User) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.sign_access(user)?,
            refresh_token: self.sign_refresh(user)?,
        })
    }

    pub fn sign_reset(&self, user_id: Uuid) -> anyhow::Result<String> {
        let (iat, exp) = timestamps(self.reset_ttl);
        let claims = ResetClaims {
            sub: user_id,
            iat,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: TokenKind::Reset,
        };
        let token = encode(&Header::default(), &claims, &self.access_encoding)?;
        debug!(user_id = %user_id, "reset token signed");
        Ok(token)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        let data = decode::<Claims>(token, &self.refresh_decoding, &self.validation())?;
        if data.claims.kind != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        debug!(user_id = %data.claims.sub, "refresh token verified");
        Ok(data.claims)
    }

    pub fn verify_reset(&self, token: &str) -> anyhow::Result<ResetClaims> {
        let data = decode::<ResetClaims>(token, &self.access_decoding, &self.validation())?;
        if data.claims.kind != TokenKind::Reset {
            anyhow::bail!("not a reset token");
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn make_keys() -> JwtKeys {
        JwtKeys::from_config(&AppConfig::for_tests().jwt)
    }

    #[tokio::test]
    async fn keys_come_from_state() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        assert_eq!(keys.issuer, "test-issuer");
        assert_eq!(keys.audience, "test-aud");
    }

    #[test]
    fn access_token_claims_match_user() {
        let keys = make_keys();
        let user = User::sample();
        let token = keys.sign_access(&user).expect("sign access");
        let data = decode::<Claims>(&token, &keys.access_decoding, &keys.validation())
            .expect("decode access");
        assert_eq!(data.claims.sub, user.id);
        assert_eq!(data.claims.name, user.name);
        assert_eq!(data.claims.email, user.email);
        assert_eq!(data.claims.phone, user.phone);
        assert_eq!(data.claims.role, user.role);
        assert_eq!(data.claims.gender, user.gender);
        assert_eq!(data.claims.address, user.address);
        assert_eq!(data.claims.joined_on, user.joined_on);
        assert_eq!(data.claims.kind, TokenKind::Access);
    }

    #[test]
    fn refresh_token_verifies_against_refresh_secret() {
        let keys = make_keys();
        let user = User::sample();
        let pair = keys.sign_pair(&user).expect("sign pair");
        let claims = keys.verify_refresh(&pair.refresh_token).expect("verify refresh");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.kind, TokenKind::Refresh);
    }

    #[test]
    fn verify_refresh_rejects_access_token() {
        let keys = make_keys();
        let user = User::sample();
        let pair = keys.sign_pair(&user).expect("sign pair");
        // Access tokens are signed with the primary secret, so signature
        // verification against the refresh secret must fail.
        assert!(keys.verify_refresh(&pair.access_token).is_err());
    }

    #[test]
    fn reset_token_roundtrip() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_reset(user_id).expect("sign reset");
        let claims = keys.verify_reset(&token).expect("verify reset");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.kind, TokenKind::Reset);
    }

    #[test]
    fn verify_reset_rejects_refresh_token() {
        let keys = make_keys();
        let user = User::sample();
        let token = keys.sign_refresh(&user).expect("sign refresh");
        assert!(keys.verify_reset(&token).is_err());
    }

    #[test]
    fn verify_reset_rejects_expired_token() {
        let keys = make_keys();
        let now = OffsetDateTime::now_utc();
        let claims = ResetClaims {
            sub: Uuid::new_v4(),
            iat: (now - TimeDuration::hours(3)).unix_timestamp() as usize,
            exp: (now - TimeDuration::hours(2)).unix_timestamp() as usize,
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
            kind: TokenKind::Reset,
        };
        let token =
            encode(&Header::default(), &claims, &keys.access_encoding).expect("encode expired");
        assert!(keys.verify_reset(&token).is_err());
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let keys = make_keys();
        let mut other_cfg = AppConfig::for_tests().jwt;
        other_cfg.issuer = "someone-else".into();
        other_cfg.audience = "other-aud".into();
        let other_keys = JwtKeys::from_config(&other_cfg);
        let token = other_keys.sign_reset(Uuid::new_v4()).expect("sign reset");
        assert!(keys.verify_reset(&token).is_err());
    }

    #[test]
    fn token_pair_serializes_camel_case() {
        let json = serde_json::to_value(TokenPair {
            access_token: "a".into(),
            refresh_token: "r".into(),
        })
        .expect("serialize");
        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");
    }
}
