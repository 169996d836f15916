//! reqwest-backed [`StatusFetcher`].

use async_trait::async_trait;
use execwatch_status::ExecutionRecord;
use reqwest::header::{ACCEPT, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::ClientConfig;
use crate::context::RequestContext;
use crate::error::{ClientError, FetchError};
use crate::fetcher::{StatusFetcher, require_identifier};

/// Body shapes accepted from the status endpoints.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

/// Fetches execution status over HTTP.
///
/// - status: `GET {base}/executions/{execution_id}`
/// - list: `GET {base}/documents/{document_id}/executions`
///
/// The tenant id goes in the configured tenant header and the token, when
/// present, as a bearer `Authorization` header.
#[derive(Debug, Clone)]
pub struct HttpStatusFetcher {
    client: Client,
    tenant_header: HeaderName,
}

impl HttpStatusFetcher {
    /// Build a fetcher from `config`.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let tenant_header = HeaderName::from_bytes(config.tenant_header.as_bytes())
            .map_err(|e| ClientError::Configuration(e.to_string()))?;
        Ok(Self {
            client: builder.build()?,
            tenant_header,
        })
    }

    /// Wrap an existing reqwest client.
    pub fn with_client(client: Client, tenant_header: HeaderName) -> Self {
        Self {
            client,
            tenant_header,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        url: Url,
    ) -> Result<T, FetchError> {
        let tenant = HeaderValue::from_str(ctx.tenant_id()).map_err(|_| {
            FetchError::MissingIdentifier {
                field: "tenant_id",
            }
        })?;

        let mut request = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .header(self.tenant_header.clone(), tenant);
        if let Some(token) = ctx.bearer_token() {
            request = request.bearer_auth(token);
        }

        tracing::trace!(%url, tenant_id = %ctx.tenant_id(), "fetching");
        let response = request.send().await.map_err(FetchError::network)?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let body = response.bytes().await.map_err(FetchError::network)?;
        let envelope: Envelope<T> =
            serde_json::from_slice(&body).map_err(|e| FetchError::decode(e.to_string()))?;
        Ok(envelope.into_inner())
    }
}

/// Turn a non-2xx response into [`FetchError::Http`], pulling a message out
/// of a JSON body when there is one.
async fn http_error(response: Response) -> FetchError {
    let status = response.status().as_u16();
    let message = match response.bytes().await {
        Ok(body) => error_message(&body),
        Err(_) => None,
    };
    tracing::debug!(status, message = message.as_deref(), "status endpoint returned error");
    FetchError::http(status, message)
}

fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    ["message", "error", "detail"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .filter(|m| !m.is_empty())
        .map(str::to_owned)
}

#[async_trait]
impl StatusFetcher for HttpStatusFetcher {
    async fn fetch_status(
        &self,
        ctx: &RequestContext,
        execution_id: &str,
    ) -> Result<ExecutionRecord, FetchError> {
        require_identifier(execution_id, "execution_id")?;
        require_identifier(ctx.tenant_id(), "tenant_id")?;
        self.get_json(ctx, ctx.endpoint(&["executions", execution_id]))
            .await
    }

    async fn fetch_executions(
        &self,
        ctx: &RequestContext,
        document_id: &str,
    ) -> Result<Vec<ExecutionRecord>, FetchError> {
        require_identifier(document_id, "document_id")?;
        require_identifier(ctx.tenant_id(), "tenant_id")?;
        self.get_json(ctx, ctx.endpoint(&["documents", document_id, "executions"]))
            .await
    }
}
