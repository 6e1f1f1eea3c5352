//! JSON Web Token authentication for stream connections.
//!
//! Tokens are HS256-signed [`StreamClaims`]. The same secret verifies incoming
//! tokens and signs new ones, which the integration tooling uses to connect as
//! arbitrary identities against a development server.

use crate::error::Error;
use crate::identity::{Authenticator, Identity, BYPASS_CAPABILITY};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use service::config::Config;

pub use claims::StreamClaims;

mod claims;

pub struct JwtAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let secret = config.jwt_signing_key().ok_or_else(|| {
            warn!("No JWT signing key configured, stream clients cannot authenticate");
            Error::config("JWT signing key is required")
        })?;

        Ok(Self::new(&secret))
    }

    /// Signs `claims` into a token this authenticator will accept.
    pub fn issue(&self, claims: &StreamClaims) -> Result<String, Error> {
        Ok(encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding_key,
        )?)
    }
}

impl From<StreamClaims> for Identity {
    fn from(claims: StreamClaims) -> Self {
        let bypass = claims
            .capabilities
            .iter()
            .any(|capability| capability == BYPASS_CAPABILITY);
        let expiration_time =
            DateTime::<Utc>::from_timestamp(claims.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC);

        Identity::new(claims.sub, claims.allowed_markings, bypass, expiration_time)
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Option<Identity>, Error> {
        match decode::<StreamClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(Some(data.claims.into())),
            Err(e) => {
                debug!("Rejected stream token: {e}");
                Ok(None)
            }
        }
    }
}
