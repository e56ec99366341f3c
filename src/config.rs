use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Round-trip bound used when `MKTOWS_TIMEOUT_SECS` is not set.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

#[derive(Clone, Deserialize)]
pub struct Config {
    /// API access key (`mktowsUserId`).
    pub user_id: String,
    /// Shared secret used to sign requests.
    pub encryption_key: String,
    /// Host name of the SOAP endpoint, e.g. `na-c.marketo.com`.
    pub soap_host: String,
    /// Base URL of the SOAP gateway that performs the calls.
    pub gateway_url: String,
    /// Trace raw requests and responses.
    pub debug: bool,
    pub timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            user_id: required("MKTOWS_USER_ID")?,
            encryption_key: required("MKTOWS_ENCRYPTION_KEY")?,
            soap_host: required("MKTOWS_SOAP_HOST").and_then(|host| {
                if host.contains("://") || host.contains('/') {
                    anyhow::bail!("MKTOWS_SOAP_HOST must be a bare host name, e.g. na-c.marketo.com");
                }
                Ok(host)
            })?,
            gateway_url: required("MKTOWS_GATEWAY_URL").and_then(|url| {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    anyhow::bail!("MKTOWS_GATEWAY_URL must start with http:// or https://");
                }
                Ok(url)
            })?,
            debug: std::env::var("MKTOWS_DEBUG")
                .ok()
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false),
            timeout_secs: std::env::var("MKTOWS_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("MKTOWS_TIMEOUT_SECS must be a whole number of seconds"))?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("SOAP endpoint: {}", config.endpoint());
        tracing::debug!("Gateway URL: {}", config.gateway_url);
        if config.debug {
            tracing::info!("Request tracing enabled");
        }

        Ok(config)
    }

    /// SOAP endpoint for API version 2_0.
    pub fn endpoint(&self) -> String {
        format!("https://{}/soap/mktows/2_0", self.soap_host)
    }

    pub fn wsdl_url(&self) -> String {
        format!("{}?WSDL", self.endpoint())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("user_id", &self.user_id)
            .field("encryption_key", &"[REDACTED]")
            .field("soap_host", &self.soap_host)
            .field("gateway_url", &self.gateway_url)
            .field("debug", &self.debug)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    let value = std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", name))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    Ok(value)
}
