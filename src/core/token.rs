use hmac::{Hmac, Mac};
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use chrono::{DateTime, Duration, Utc};
use crate::common::config::TokenConfig;
use crate::common::error::{VoteError, Result};
use crate::storage::email_key;

type HmacSha256 = Hmac<Sha256>;

const SECRET_SIZE: usize = 32;

/// Proof that `email` passed a trusted face verification, valid until
/// `expires_at` (unix seconds).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VerificationToken {
    pub email: String,
    pub expires_at: i64,
    pub mac: Vec<u8>,
}

impl VerificationToken {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires_at, 0)
    }
}

pub struct TokenIssuer {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &TokenConfig) -> Self {
        let secret = match &config.secret {
            Some(secret) if !secret.is_empty() => secret.as_bytes().to_vec(),
            _ => generate_secret(),
        };

        Self {
            secret,
            ttl: Duration::seconds(config.ttl_seconds as i64),
        }
    }

    pub fn issue(&self, email: &str) -> Result<VerificationToken> {
        self.issue_at(email, Utc::now())
    }

    pub fn issue_at(&self, email: &str, now: DateTime<Utc>) -> Result<VerificationToken> {
        let expires_at = (now + self.ttl).timestamp();
        Ok(VerificationToken {
            email: email.to_string(),
            expires_at,
            mac: self.sign(email, expires_at)?,
        })
    }

    /// Accepts the token only for `email`, before expiry, with an intact MAC.
    pub fn check(&self, token: &VerificationToken, email: &str) -> Result<()> {
        self.check_at(token, email, Utc::now())
    }

    pub fn check_at(&self, token: &VerificationToken, email: &str, now: DateTime<Utc>) -> Result<()> {
        if email_key(&token.email) != email_key(email) {
            tracing::warn!("Token for {} presented for {}", token.email, email);
            return Err(VoteError::InvalidToken);
        }
        if now.timestamp() >= token.expires_at {
            return Err(VoteError::InvalidToken);
        }

        let mut mac = self.mac()?;
        mac.update(email_key(email).as_bytes());
        mac.update(&token.expires_at.to_le_bytes());
        mac.verify_slice(&token.mac).map_err(|_| VoteError::InvalidToken)
    }

    fn sign(&self, email: &str, expires_at: i64) -> Result<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(email_key(email).as_bytes());
        mac.update(&expires_at.to_le_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| VoteError::Other(anyhow::anyhow!("Invalid token secret: {}", e)))
    }
}

fn generate_secret() -> Vec<u8> {
    let mut rng = thread_rng();
    let mut secret = vec![0u8; SECRET_SIZE];
    rng.fill(&mut secret[..]);
    secret
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&TokenConfig::default())
    }

    #[test]
    fn fresh_token_is_accepted() {
        let issuer = issuer();
        let token = issuer.issue("a@x.com").unwrap();
        assert!(issuer.check(&token, "a@x.com").is_ok());
        // keys are normalised the same way as the stores
        assert!(issuer.check(&token, " A@X.com ").is_ok());
    }

    #[test]
    fn expiry_is_issue_time_plus_ttl() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = issuer().issue_at("a@x.com", now).unwrap();
        assert_eq!(token.expires_at(), Some(now + Duration::seconds(300)));
    }

    #[test]
    fn token_is_bound_to_email() {
        let issuer = issuer();
        let mut token = issuer.issue("a@x.com").unwrap();
        assert!(matches!(issuer.check(&token, "b@x.com"), Err(VoteError::InvalidToken)));

        token.email = "b@x.com".to_string();
        assert!(matches!(issuer.check(&token, "b@x.com"), Err(VoteError::InvalidToken)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = issuer();
        let now = Utc::now();
        let token = issuer.issue_at("a@x.com", now).unwrap();
        assert!(issuer.check_at(&token, "a@x.com", now + Duration::seconds(299)).is_ok());
        assert!(issuer.check_at(&token, "a@x.com", now + Duration::seconds(300)).is_err());
    }

    #[test]
    fn extended_expiry_breaks_the_mac() {
        let issuer = issuer();
        let mut token = issuer.issue("a@x.com").unwrap();
        token.expires_at += 3600;
        assert!(matches!(issuer.check(&token, "a@x.com"), Err(VoteError::InvalidToken)));
    }

    #[test]
    fn other_issuer_cannot_validate() {
        let token = issuer().issue("a@x.com").unwrap();
        assert!(issuer().check(&token, "a@x.com").is_err());

        let config = TokenConfig { secret: Some("shared".to_string()), ..Default::default() };
        let token = TokenIssuer::new(&config).issue("a@x.com").unwrap();
        assert!(TokenIssuer::new(&config).check(&token, "a@x.com").is_ok());
    }
}
