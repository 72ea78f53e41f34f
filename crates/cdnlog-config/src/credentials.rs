// Cloud credentials supplied by the host environment
//
// Serverless platforms inject a temporary key pair plus session token into the
// function's environment. The value is read once per process and handed to the
// clients that need it; nothing caches it globally.

use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct CloudCredentials {
    pub secret_id: String,
    pub secret_key: String,
    pub token: Option<String>,
}

impl CloudCredentials {
    pub fn new(
        secret_id: impl Into<String>,
        secret_key: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            secret_id: secret_id.into(),
            secret_key: secret_key.into(),
            token: token.filter(|t| !t.is_empty()),
        }
    }
}

impl fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudCredentials")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"***")
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}
