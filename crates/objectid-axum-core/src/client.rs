//! HTTP client for a remote block allocator.

use core::time::Duration;

use objectid::{Block, BlockSource, Error, IdType, Result, TypeListing, is_valid_type_name};
use reqwest::{Response, header::CACHE_CONTROL};
use serde::de::DeserializeOwned;

use crate::{
    ErrorBody, GenerateBlockRequest, HEALTH_PATH, SETUP_PATH, SetupResponse, TYPES_PATH,
    generate_path, parse_max_age, type_path,
};

/// User agent sent unless overridden.
pub const DEFAULT_USER_AGENT: &str = concat!("objectid-client/", env!("CARGO_PKG_VERSION"));

/// Builder for [`HttpClient`].
#[derive(Clone, Debug)]
pub struct HttpClientBuilder {
    endpoint: String,
    user_agent: String,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl HttpClientBuilder {
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Total time allowed for one request, connection included.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the endpoint is not an absolute
    /// `http(s)` URL or the HTTP stack cannot be initialized.
    pub fn build(self) -> Result<HttpClient> {
        let endpoint = self.endpoint.trim_end_matches('/').to_string();
        let url = reqwest::Url::parse(&endpoint).map_err(|e| Error::Configuration {
            reason: format!("invalid endpoint '{endpoint}': {e}"),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Configuration {
                reason: format!("endpoint '{endpoint}' must use http or https"),
            });
        }

        let mut builder = reqwest::Client::builder().user_agent(self.user_agent);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().map_err(|e| Error::Configuration {
            reason: format!("cannot build HTTP client: {e}"),
        })?;

        Ok(HttpClient { http, endpoint })
    }
}

/// Talks to an `objectid-axum-server`.
///
/// Every transport failure, timeout or unreadable answer becomes
/// [`Error::Communication`]. Error bodies sent by the server are mapped back
/// onto the matching [`Error`] variant.
///
/// Plug it into an [`objectid::AllocationManager`] to issue IDs:
///
/// ```no_run
/// use objectid::{AllocationManager, ManagerConfig};
/// use objectid_axum_core::HttpClient;
///
/// # async fn run() -> objectid::Result<()> {
/// let client = HttpClient::new("http://127.0.0.1:8080")?;
/// let manager = AllocationManager::new(client, ManagerConfig::default());
/// let id = manager.generate_id("user").await?;
/// println!("{id}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct HttpClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpClient {
    pub fn builder(endpoint: impl Into<String>) -> HttpClientBuilder {
        HttpClientBuilder {
            endpoint: endpoint.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: None,
            connect_timeout: None,
        }
    }

    /// A client with default settings.
    ///
    /// # Errors
    ///
    /// See [`HttpClientBuilder::build`].
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::builder(endpoint).build()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.endpoint)
    }

    /// # Errors
    ///
    /// [`Error::Communication`] unless the server answers `200`.
    pub async fn health(&self) -> Result<()> {
        let response = self
            .http
            .get(self.url(HEALTH_PATH))
            .send()
            .await
            .map_err(transport)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::communication(format!(
                "health check answered {}",
                response.status()
            )))
        }
    }

    /// Asks the server to provision every declared type.
    ///
    /// # Errors
    ///
    /// [`Error::Communication`], or the server's storage failure.
    pub async fn setup_types(&self) -> Result<SetupResponse> {
        let response = self
            .http
            .post(self.url(SETUP_PATH))
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }

    /// Lists provisioned types along with the cache lifetime the server
    /// advertises.
    ///
    /// # Errors
    ///
    /// [`Error::Communication`].
    pub async fn list_types(&self) -> Result<TypeListing> {
        let response = self
            .http
            .get(self.url(TYPES_PATH))
            .send()
            .await
            .map_err(transport)?;
        let max_age = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_max_age);
        let types = decode(response).await?;
        Ok(TypeListing { types, max_age })
    }

    /// # Errors
    ///
    /// [`Error::NotFound`] if the server has no type with this id.
    pub async fn type_by_id(&self, type_id: u32) -> Result<IdType> {
        self.get_type(&type_path(type_id)).await
    }

    /// # Errors
    ///
    /// [`Error::NotFound`] if the server has no type with this name.
    pub async fn type_by_name(&self, type_name: &str) -> Result<IdType> {
        // Anything else could not be a type name, and may not be a safe path
        // segment either.
        if !is_valid_type_name(type_name) {
            return Err(Error::NotFound {
                key: type_name.to_string(),
            });
        }
        self.get_type(&type_path(type_name)).await
    }

    async fn get_type(&self, path: &str) -> Result<IdType> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }

    /// Reserves `amount` values of `type_name`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`], [`Error::InvalidRequest`],
    ///   [`Error::RangeExhausted`] as reported by the server.
    /// - [`Error::Remote`] if the server halted the type or failed to store
    ///   the counter.
    /// - [`Error::Communication`] if the request failed in transit or the
    ///   block that came back is malformed.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub async fn generate_block(&self, type_name: &str, amount: u64) -> Result<Block> {
        if type_name.is_empty() {
            return Err(Error::InvalidRequest {
                reason: "type name must not be empty".to_string(),
            });
        }
        if !is_valid_type_name(type_name) {
            return Err(Error::NotFound {
                key: type_name.to_string(),
            });
        }

        let response = self
            .http
            .post(self.url(&generate_path(type_name)))
            .json(&GenerateBlockRequest { amount })
            .send()
            .await
            .map_err(transport)?;
        let block: Block = decode(response).await?;
        block
            .validate()
            .map_err(|e| Error::communication(format!("server sent an invalid block: {e}")))
    }
}

impl BlockSource for HttpClient {
    async fn generate_block(&self, type_name: &str, amount: u64) -> Result<Block> {
        Self::generate_block(self, type_name, amount).await
    }

    async fn list_types(&self) -> Result<TypeListing> {
        Self::list_types(self).await
    }
}

fn transport(err: reqwest::Error) -> Error {
    #[cfg(feature = "tracing")]
    tracing::warn!(error = %err, "request to allocator failed");
    Error::communication(err.to_string())
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(transport)?;
    if status.is_success() {
        return serde_json::from_slice(&bytes)
            .map_err(|e| Error::communication(format!("unreadable response: {e}")));
    }
    match serde_json::from_slice::<ErrorBody>(&bytes) {
        Ok(body) => Err(body.into_error()),
        Err(_) => Err(Error::communication(format!("server answered {status}"))),
    }
}
