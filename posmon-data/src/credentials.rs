use crate::error::CredentialError;
use regex::Regex;
use std::{fmt, sync::LazyLock};

/// Environment variable holding the OKX API key.
pub const ENV_API_KEY: &str = "OKX_API_KEY";

/// Environment variable holding the OKX API secret.
pub const ENV_API_SECRET: &str = "OKX_API_SECRET";

/// Environment variable holding the OKX API passphrase.
pub const ENV_API_PASSPHRASE: &str = "OKX_API_PASSPHRASE";

static API_KEY_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-fA-F0-9]{8}-[a-fA-F0-9]{4}-[a-fA-F0-9]{4}-[a-fA-F0-9]{4}-[a-fA-F0-9]{12}$")
        .unwrap()
});

const PLACEHOLDERS: [&str; 3] = [
    "your-actual-api-key",
    "your-actual-api-secret",
    "your-actual-passphrase",
];

const MIN_SECRET_LEN: usize = 32;

/// OKX private API credentials.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret_key", &"<redacted>")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            passphrase: passphrase.into(),
        }
    }

    /// Read raw credentials from [`ENV_API_KEY`], [`ENV_API_SECRET`] and
    /// [`ENV_API_PASSPHRASE`]. Unset variables are read as empty strings.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).unwrap_or_default();
        Self::new(var(ENV_API_KEY), var(ENV_API_SECRET), var(ENV_API_PASSPHRASE))
    }

    /// Validate the credential format without contacting the venue.
    pub fn validate(&self) -> Result<(), CredentialError> {
        if self.api_key.is_empty() && self.secret_key.is_empty() && self.passphrase.is_empty() {
            return Err(CredentialError::Missing);
        }

        let fields = [&self.api_key, &self.secret_key, &self.passphrase];
        if fields
            .iter()
            .zip(PLACEHOLDERS)
            .any(|(field, placeholder)| field.contains(placeholder))
        {
            return Err(CredentialError::Placeholder);
        }

        if !API_KEY_FORMAT.is_match(&self.api_key) {
            return Err(CredentialError::ApiKeyFormat);
        }

        if self.secret_key.len() < MIN_SECRET_LEN {
            return Err(CredentialError::SecretTooShort);
        }

        if self.passphrase.is_empty() {
            return Err(CredentialError::PassphraseEmpty);
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
