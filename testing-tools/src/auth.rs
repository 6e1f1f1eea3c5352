use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use domain::jwt::{JwtAuthenticator, StreamClaims};
use domain::BYPASS_CAPABILITY;

/// A stream identity the test client acts as.
#[derive(Debug, Clone)]
pub struct TestIdentity {
    pub label: String,
    pub id: String,
    pub allowed_markings: Vec<String>,
    pub token: String,
}

/// Signs tokens with the server's secret so scenarios can connect as any identity.
pub struct TokenMinter {
    authenticator: JwtAuthenticator,
}

impl TokenMinter {
    pub fn new(signing_key: &str) -> Self {
        Self {
            authenticator: JwtAuthenticator::new(signing_key),
        }
    }

    /// Mints a token valid for one hour. Ids get a random suffix so repeated
    /// runs never collide with streams left open by an earlier run.
    pub fn mint(
        &self,
        label: &str,
        id_prefix: &str,
        allowed_markings: &[&str],
        bypass: bool,
    ) -> Result<TestIdentity> {
        let id = format!("{id_prefix}-{}", uuid::Uuid::new_v4().simple());
        let allowed_markings: Vec<String> =
            allowed_markings.iter().map(|m| m.to_string()).collect();
        let capabilities = if bypass {
            vec![BYPASS_CAPABILITY.to_string()]
        } else {
            vec![]
        };

        let token = self
            .authenticator
            .issue(&StreamClaims {
                sub: id.clone(),
                exp: (Utc::now() + Duration::hours(1)).timestamp(),
                allowed_markings: allowed_markings.clone(),
                capabilities,
            })
            .context("Failed to sign test token")?;

        Ok(TestIdentity {
            label: label.to_string(),
            id,
            allowed_markings,
            token,
        })
    }
}
