//! Environment-driven configuration.
//!
//! All knobs come from the process environment at startup. A broken
//! verification-key setup is fatal here, before the service binds a
//! socket; it is never discovered per request.

use crate::identity::IdentityResolver;
use crate::query::limits::{FieldWeights, QueryLimits};

/// Environment variable holding the shared HMAC signing secret.
pub const ENV_JWT_SECRET: &str = "GATEWAY_JWT_SECRET";
/// Environment variable holding an RSA public key in PEM form.
pub const ENV_JWT_PUBLIC_KEY_PEM: &str = "GATEWAY_JWT_PUBLIC_KEY_PEM";
/// Environment variable holding the database connection URL.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
/// Environment variable overriding the depth ceiling.
pub const ENV_MAX_DEPTH: &str = "GATEWAY_MAX_DEPTH";
/// Environment variable overriding the complexity ceiling.
pub const ENV_MAX_COMPLEXITY: &str = "GATEWAY_MAX_COMPLEXITY";
/// Environment variable holding per-field cost weights as a JSON object.
pub const ENV_FIELD_WEIGHTS: &str = "GATEWAY_FIELD_WEIGHTS";

/// Configuration error raised at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The verification-key environment is unusable.
    #[error("misconfigured verification key: {reason}")]
    MisconfiguredVerificationKey {
        /// What is wrong with the key setup.
        reason: String,
    },
    /// An environment variable holds a value that does not parse.
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// The offending value.
        value: String,
    },
}

/// Key material used to verify bearer credentials.
#[derive(Clone)]
pub enum VerificationKey {
    /// Shared secret for HMAC-SHA256 signatures.
    Hs256(String),
    /// RSA public key in PEM form for RS256 signatures.
    Rs256Pem(String),
}

impl std::fmt::Debug for VerificationKey {
    // Key material stays out of logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationKey::Hs256(_) => f.write_str("VerificationKey::Hs256(..)"),
            VerificationKey::Rs256Pem(_) => f.write_str("VerificationKey::Rs256Pem(..)"),
        }
    }
}

/// Startup configuration for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Credential verification key.
    pub verification_key: VerificationKey,
    /// Database connection URL, when a database is in play.
    pub database_url: Option<String>,
    /// Shape ceilings for the query gate.
    pub limits: QueryLimits,
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Exactly one of the two key variables must be set; both or neither
    /// is a misconfiguration.
    pub fn from_source(source: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let secret = source(ENV_JWT_SECRET).filter(|s| !s.trim().is_empty());
        let pem = source(ENV_JWT_PUBLIC_KEY_PEM).filter(|s| !s.trim().is_empty());

        let verification_key = match (secret, pem) {
            (Some(secret), None) => VerificationKey::Hs256(secret),
            (None, Some(pem)) => VerificationKey::Rs256Pem(pem),
            (Some(_), Some(_)) => {
                return Err(ConfigError::MisconfiguredVerificationKey {
                    reason: format!(
                        "both {ENV_JWT_SECRET} and {ENV_JWT_PUBLIC_KEY_PEM} are set; set exactly one"
                    ),
                })
            }
            (None, None) => {
                return Err(ConfigError::MisconfiguredVerificationKey {
                    reason: format!(
                        "neither {ENV_JWT_SECRET} nor {ENV_JWT_PUBLIC_KEY_PEM} is set"
                    ),
                })
            }
        };

        let mut limits = QueryLimits::default();
        if let Some(raw) = source(ENV_MAX_DEPTH) {
            limits.max_depth = raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: ENV_MAX_DEPTH,
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = source(ENV_MAX_COMPLEXITY) {
            limits.max_complexity = raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: ENV_MAX_COMPLEXITY,
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = source(ENV_FIELD_WEIGHTS) {
            limits.field_weights =
                serde_json::from_str::<FieldWeights>(&raw).map_err(|_| {
                    ConfigError::InvalidValue {
                        name: ENV_FIELD_WEIGHTS,
                        value: raw.clone(),
                    }
                })?;
        }

        Ok(Self {
            verification_key,
            database_url: source(ENV_DATABASE_URL),
            limits,
        })
    }

    /// Build the identity resolver for the configured key.
    ///
    /// A PEM that does not parse is reported as a misconfiguration; an
    /// HMAC secret is accepted as-is.
    pub fn identity_resolver(&self) -> Result<IdentityResolver, ConfigError> {
        match &self.verification_key {
            VerificationKey::Hs256(secret) => Ok(IdentityResolver::hs256(secret.as_bytes())),
            VerificationKey::Rs256Pem(pem) => IdentityResolver::rs256_pem(pem.as_bytes())
                .map_err(|e| ConfigError::MisconfiguredVerificationKey {
                    reason: format!("{ENV_JWT_PUBLIC_KEY_PEM} does not hold a usable key: {e}"),
                }),
        }
    }
}
