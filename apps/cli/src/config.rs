//! Layered configuration: defaults → `execwatch.toml` → `EXECWATCH_*` env →
//! command-line flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use execwatch_client::{ClientConfig, RequestContext};
use execwatch_poller::PollerConfig;

use crate::cli::GlobalArgs;

/// Config file picked up from the working directory when `--config` is not
/// given.
pub const DEFAULT_CONFIG_FILE: &str = "execwatch.toml";

/// Everything the commands need.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// API base URL.
    pub base_url: Option<String>,
    /// Tenant id.
    pub tenant: Option<String>,
    /// Bearer token.
    pub token: Option<String>,
    /// HTTP client settings.
    pub client: ClientConfig,
    /// Polling settings.
    pub poller: PollerConfig,
}

/// Flag values that override every other layer.
#[derive(Debug, Serialize)]
struct Overrides<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    base_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
}

impl CliConfig {
    /// Load the configuration for `args`.
    pub fn load(args: &GlobalArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) if !path.exists() => {
                bail!("config file {} does not exist", path.display())
            }
            Some(path) => path.clone(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };
        Self::figment(&file, args)
            .extract()
            .with_context(|| format!("invalid configuration (file {})", file.display()))
    }

    fn figment(file: &Path, args: &GlobalArgs) -> Figment {
        Figment::new()
            .merge(Toml::file(file))
            .merge(
                Env::prefixed("EXECWATCH_")
                    .ignore(&["log", "log_format"])
                    .split("__"),
            )
            .merge(Serialized::defaults(Overrides {
                base_url: args.base_url.as_deref(),
                tenant: args.tenant.as_deref(),
                token: args.token.as_deref(),
            }))
    }

    /// Build the request context from the resolved connection settings.
    pub fn request_context(&self) -> Result<RequestContext> {
        let Some(base_url) = self.base_url.as_deref() else {
            bail!("no base URL: pass --base-url or set EXECWATCH_BASE_URL");
        };
        let Some(tenant) = self.tenant.as_deref() else {
            bail!("no tenant: pass --tenant or set EXECWATCH_TENANT");
        };
        let ctx = RequestContext::parse(base_url, tenant)?;
        Ok(match self.token.as_deref() {
            Some(token) => ctx.with_token(token),
            None => ctx,
        })
    }
}
