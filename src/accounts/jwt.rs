use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};

use super::{
    claims::{Claims, TokenUse},
    repo_types::Account,
};
use crate::{config::JwtConfig, error::AppError, state::AppState};

/// Signing and verification keys plus token lifetimes.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl SessionKeys {
    pub fn from_config(cfg: &JwtConfig) -> Result<Self, AppError> {
        if cfg.secret.is_empty() {
            return Err(AppError::Configuration("empty JWT signing secret".into()));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: minutes(cfg.ttl_minutes),
            refresh_ttl: minutes(cfg.refresh_ttl_minutes),
        })
    }

    /// Signs `{id, email, kind}` with an expiry of `now + ttl`.
    pub fn issue(&self, account: &Account, typ: TokenUse, ttl: Duration) -> Result<String, AppError> {
        self.issue_at(account, typ, ttl, OffsetDateTime::now_utc())
    }

    fn issue_at(
        &self,
        account: &Account,
        typ: TokenUse,
        ttl: Duration,
        now: OffsetDateTime,
    ) -> Result<String, AppError> {
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: account.id,
            email: account.email.clone(),
            kind: account.kind,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            typ,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Configuration(format!("jwt encode: {}", e)))?;
        debug!(account_id = %account.id, typ = ?typ, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, account: &Account) -> Result<String, AppError> {
        self.issue(account, TokenUse::Access, self.access_ttl)
    }

    pub fn sign_refresh(&self, account: &Account) -> Result<String, AppError> {
        self.issue(account, TokenUse::Refresh, self.refresh_ttl)
    }

    /// Checks signature, issuer, audience and expiry with no leeway.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AppError::Unauthorized("token expired".into()),
                _ => AppError::Unauthorized("invalid token".into()),
            }
        })?;
        debug!(account_id = %data.claims.sub, typ = ?data.claims.typ, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AppError> {
        let claims = self.verify(token)?;
        if claims.typ != TokenUse::Refresh {
            return Err(AppError::Unauthorized("not a refresh token".into()));
        }
        Ok(claims)
    }
}

fn minutes(m: i64) -> Duration {
    Duration::from_secs(m.max(0) as u64 * 60)
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.as_ref().clone()
    }
}

/// Extracts and validates a bearer access token.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = SessionKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing Authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthorized("invalid auth scheme".into()))?;

        let claims = keys.verify(token).map_err(|e| {
            warn!("invalid or expired token");
            e
        })?;

        if claims.typ != TokenUse::Access {
            return Err(AppError::Unauthorized("access token required".into()));
        }

        Ok(AuthUser(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::repo_types::{AccountKind, NewAccount};

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> SessionKeys {
        SessionKeys::from_config(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        })
        .expect("keys")
    }

    fn account() -> Account {
        Account::from_new(NewAccount {
            name: "Linus".into(),
            email: "linus@example.com".into(),
            credential_hash: "h".into(),
            kind: AccountKind::Freelancer,
        })
    }

    #[test]
    fn sign_and_verify_access_token() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let acct = account();
        let token = keys.sign_access(&acct).expect("sign access");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, acct.id);
        assert_eq!(claims.email, "linus@example.com");
        assert_eq!(claims.kind, AccountKind::Freelancer);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.typ, TokenUse::Access);
        assert_eq!(claims.exp - claims.iat, 5 * 60);
    }

    #[test]
    fn verify_refresh_rejects_access_token() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let acct = account();
        let refresh = keys.sign_refresh(&acct).unwrap();
        assert_eq!(keys.verify_refresh(&refresh).unwrap().typ, TokenUse::Refresh);

        let access = keys.sign_access(&acct).unwrap();
        let err = keys.verify_refresh(&access).unwrap_err();
        assert!(err.to_string().contains("not a refresh token"));
    }

    #[test]
    fn token_expires_after_ttl() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let ttl = Duration::from_secs(60);
        let issued = OffsetDateTime::now_utc() - TimeDuration::seconds(61);
        let token = keys.issue_at(&account(), TokenUse::Access, ttl, issued).unwrap();
        let err = keys.verify(&token).unwrap_err();
        assert!(err.to_string().contains("token expired"));

        let fresh = keys.issue(&account(), TokenUse::Access, ttl).unwrap();
        assert!(keys.verify(&fresh).is_ok());
    }

    #[test]
    fn verify_rejects_wrong_secret_issuer_or_audience() {
        let good = make_keys("same-secret", "good-iss", "good-aud");
        let token = good.sign_access(&account()).unwrap();
        assert!(make_keys("same-secret", "bad-iss", "good-aud").verify(&token).is_err());
        assert!(make_keys("same-secret", "good-iss", "bad-aud").verify(&token).is_err());
        assert!(make_keys("other-secret", "good-iss", "good-aud").verify(&token).is_err());
    }

    #[test]
    fn empty_secret_is_configuration_error() {
        let err = SessionKeys::from_config(&JwtConfig {
            secret: String::new(),
            issuer: "i".into(),
            audience: "a".into(),
            ttl_minutes: 1,
            refresh_ttl_minutes: 1,
        })
        .err()
        .expect("must fail");
        assert!(matches!(err, AppError::Configuration(_)));
    }
}
