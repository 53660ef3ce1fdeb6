//! Issues and verifies signed bearer token pairs. Stateless: no session
//! table, no server-side revocation.

use anyhow::Result;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct TokenService {
    secret: String,
    access_ttl_min: i64,
    refresh_ttl_hour: i64,
}

impl TokenService {
    pub fn new(secret: impl Into<String>, access_ttl_min: i64, refresh_ttl_hour: i64) -> Self {
        TokenService {
            secret: secret.into(),
            access_ttl_min,
            refresh_ttl_hour,
        }
    }

    pub fn issue_pair(&self, user_id: i64, username: &str) -> Result<TokenPair> {
        let access_token = self.sign(user_id, username, self.access_ttl_min * 60)?;
        let refresh_token = self.sign(user_id, username, self.refresh_ttl_hour * 3600)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }

    pub fn refresh(&self, refresh_token: &str) -> Result<String> {
        let claims = self.verify(refresh_token)?;
        self.sign(claims.sub, &claims.username, self.access_ttl_min * 60)
    }

    fn sign(&self, user_id: i64, username: &str, ttl_secs: i64) -> Result<String> {
        let now = now_epoch_secs();
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            iat: now,
            exp: now + ttl_secs,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }
}

fn now_epoch_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_pair_verifies() {
        let svc = TokenService::new("test-secret", 15, 24);
        let pair = svc.issue_pair(7, "alice").unwrap();
        let claims = svc.verify(&pair.access_token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn refresh_issues_new_access_token_same_identity() {
        let svc = TokenService::new("test-secret", 15, 24);
        let pair = svc.issue_pair(1, "bob").unwrap();
        let new_access = svc.refresh(&pair.refresh_token).unwrap();
        let claims = svc.verify(&new_access).unwrap();
        assert_eq!(claims.sub, 1);
        assert_eq!(claims.username, "bob");
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let svc = TokenService::new("secret-a", 15, 24);
        let other = TokenService::new("secret-b", 15, 24);
        let pair = svc.issue_pair(1, "bob").unwrap();
        assert!(other.verify(&pair.access_token).is_err());
    }

    #[test]
    fn expired_token_fails_verification() {
        let svc = TokenService::new("test-secret", 0, 0);
        let pair = svc.issue_pair(1, "bob").unwrap();
        std::thread::sleep(std::time::Duration::from_secs(1));
        assert!(svc.verify(&pair.access_token).is_err());
    }
}
