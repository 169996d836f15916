//! Request context and its owner.
//!
//! Every fetch receives a [`RequestContext`] explicitly. The context that is
//! current for the application lives in a [`ContextStore`], which is set on
//! login, replaced on tenant switch and cleared on logout.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::ClientError;

/// Everything a fetch needs to address and authorize a request.
#[derive(Clone)]
pub struct RequestContext {
    base_url: Url,
    tenant_id: String,
    token: Option<SecretString>,
}

impl RequestContext {
    /// Create a context for `tenant_id` against `base_url`.
    pub fn new(base_url: Url, tenant_id: impl Into<String>) -> Self {
        Self {
            base_url,
            tenant_id: tenant_id.into(),
            token: None,
        }
    }

    /// Parse `base_url` and create a context.
    pub fn parse(base_url: &str, tenant_id: impl Into<String>) -> Result<Self, ClientError> {
        let url = Url::parse(base_url).map_err(|e| ClientError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;
        if url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl {
                url: base_url.to_owned(),
                reason: "URL cannot carry path segments".into(),
            });
        }
        Ok(Self::new(url, tenant_id))
    }

    /// Attach a bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Copy of this context scoped to another tenant.
    #[must_use]
    pub fn for_tenant(&self, tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..self.clone()
        }
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The tenant (organization) id sent with every request.
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// The bearer token, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.expose_secret())
    }

    /// Build `{base}/{segments...}` with each segment percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `parse` rejects cannot-be-a-base URLs, so this only fails for
        // contexts built directly from such a URL; those keep the base as is.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("base_url", &self.base_url.as_str())
            .field("tenant_id", &self.tenant_id)
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Holder of the application's current [`RequestContext`].
///
/// Readers get a cheap `Arc` snapshot; a tenant switch never mutates a
/// context another task is already using.
#[derive(Default)]
pub struct ContextStore {
    current: ArcSwapOption<RequestContext>,
}

impl ContextStore {
    /// Create an empty (logged-out) store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the context produced by a login.
    pub fn login(&self, context: RequestContext) -> Arc<RequestContext> {
        let context = Arc::new(context);
        self.current.store(Some(Arc::clone(&context)));
        tracing::debug!(tenant_id = %context.tenant_id(), "request context installed");
        context
    }

    /// Re-scope the current context to `tenant_id`.
    pub fn switch_tenant(
        &self,
        tenant_id: impl Into<String>,
    ) -> Result<Arc<RequestContext>, ClientError> {
        let current = self.current().ok_or(ClientError::NotAuthenticated)?;
        let next = Arc::new(current.for_tenant(tenant_id));
        self.current.store(Some(Arc::clone(&next)));
        tracing::debug!(
            from = %current.tenant_id(),
            to = %next.tenant_id(),
            "tenant switched"
        );
        Ok(next)
    }

    /// Drop the current context.
    pub fn logout(&self) {
        if self.current.swap(None).is_some() {
            tracing::debug!("request context cleared");
        }
    }

    /// The current context, if logged in.
    pub fn current(&self) -> Option<Arc<RequestContext>> {
        self.current.load_full()
    }

    /// The current context, or [`ClientError::NotAuthenticated`].
    pub fn require(&self) -> Result<Arc<RequestContext>, ClientError> {
        self.current().ok_or(ClientError::NotAuthenticated)
    }
}

impl fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextStore")
            .field("current", &self.current())
            .finish()
    }
}
