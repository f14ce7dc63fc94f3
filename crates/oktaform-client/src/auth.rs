//! Okta API credentials.

use reqwest::RequestBuilder;

/// Credentials used to authenticate against the Okta management API.
///
/// The [`Debug`] impl redacts the token so credentials never end up in logs.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OktaCredentials {
    /// Static API token, sent as `Authorization: SSWS <token>`.
    ApiToken { token: String },

    /// OAuth 2.0 access token obtained out of band, sent as `Bearer`.
    Bearer { token: String },
}

impl std::fmt::Debug for OktaCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiToken { .. } => f
                .debug_struct("ApiToken")
                .field("token", &"[REDACTED]")
                .finish(),
            Self::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"[REDACTED]")
                .finish(),
        }
    }
}

impl OktaCredentials {
    /// Value of the `Authorization` header for these credentials.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        match self {
            Self::ApiToken { token } => format!("SSWS {token}"),
            Self::Bearer { token } => format!("Bearer {token}"),
        }
    }

    /// Attach the `Authorization` header to a request.
    #[must_use]
    pub fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(reqwest::header::AUTHORIZATION, self.authorization_header())
    }

    /// Whether the credential carries an empty token.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::ApiToken { token } | Self::Bearer { token } => token.trim().is_empty(),
        }
    }
}
