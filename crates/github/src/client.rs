//! Authenticated REST client and error mapping.

use octocrab::Octocrab;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sweeper_core::config::Credentials;
use sweeper_core::{Error, Result};
use tracing::debug;

/// Page size used for every paginated listing.
pub const PER_PAGE: u32 = 100;

/// Query string for paginated listings.
#[derive(Debug, Serialize)]
pub(crate) struct PageQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_type: Option<&'a str>,
    pub per_page: u32,
    pub page: u32,
}

impl<'a> PageQuery<'a> {
    pub(crate) const fn new(page: u32) -> Self {
        Self {
            package_type: None,
            per_page: PER_PAGE,
            page,
        }
    }

    pub(crate) const fn with_package_type(mut self, package_type: &'a str) -> Self {
        self.package_type = Some(package_type);
        self
    }
}

/// Thin wrapper over [`Octocrab`] translating failures into [`Error`].
#[derive(Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
}

impl GitHubClient {
    /// Create a client authenticated with a personal or installation token.
    ///
    /// `api_url` overrides the API base for GitHub Enterprise.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the client cannot be built.
    pub fn new(credentials: &Credentials, api_url: Option<&str>) -> Result<Self> {
        let mut builder =
            Octocrab::builder().personal_token(credentials.token().expose_secret().to_string());

        if let Some(api_url) = api_url {
            debug!(api_url, "Using custom GitHub API base");
            builder = builder.base_uri(api_url).map_err(|e| {
                Error::configuration_with_help(
                    format!("Invalid GitHub API URL '{api_url}': {e}"),
                    "GITHUB_API_URL must be an absolute URL such as https://ghe.example.com/api/v3",
                )
            })?;
        }

        let octocrab = builder
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create GitHub client: {e}")))?;

        Ok(Self { octocrab })
    }

    pub(crate) async fn get_json<T, P>(&self, operation: &str, route: &str, query: &P) -> Result<T>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        debug!(operation, route, "GET");
        self.octocrab
            .get(route, Some(query))
            .await
            .map_err(|e| map_error(operation, route, e))
    }

    /// `GET` a resource only to learn whether it exists. 404 is `Ok(false)`.
    pub(crate) async fn exists(&self, operation: &str, route: &str) -> Result<bool> {
        debug!(operation, route, "GET");
        let response = self
            .octocrab
            ._get(route)
            .await
            .map_err(|e| map_error(operation, route, e))?;
        match octocrab::map_github_error(response).await {
            Ok(_) => Ok(true),
            Err(e) => match map_error(operation, route, e) {
                Error::NotFound { .. } => Ok(false),
                other => Err(other),
            },
        }
    }

    pub(crate) async fn delete(&self, operation: &str, route: &str) -> Result<()> {
        debug!(operation, route, "DELETE");
        let response = self
            .octocrab
            ._delete(route, None::<&()>)
            .await
            .map_err(|e| map_error(operation, route, e))?;
        octocrab::map_github_error(response)
            .await
            .map(drop)
            .map_err(|e| map_error(operation, route, e))
    }
}

/// Translate an octocrab failure into the sweeper error taxonomy.
#[must_use]
pub fn map_error(operation: &str, resource: &str, err: octocrab::Error) -> Error {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            map_status(operation, resource, source.status_code.as_u16(), &source.message)
        }
        err @ (octocrab::Error::Serde { .. } | octocrab::Error::Json { .. }) => {
            Error::remote(operation, format!("unexpected response: {err}"))
        }
        err => Error::transient(operation, err.to_string()),
    }
}

/// Map an HTTP status to an error.
///
/// 404 is [`Error::NotFound`]; 408, 429 and 5xx are transient; anything
/// else is a permanent remote failure.
#[must_use]
pub fn map_status(operation: &str, resource: &str, status: u16, message: &str) -> Error {
    match status {
        404 => Error::not_found(resource),
        408 | 429 | 500..=599 => Error::transient(operation, format!("HTTP {status}: {message}")),
        _ => Error::remote(operation, format!("HTTP {status}: {message}")),
    }
}

/// Percent-encode a path segment (`/` in package names becomes `%2F`).
#[must_use]
pub fn encode_path_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}
