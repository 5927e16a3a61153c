use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::upstream::{CorsConfig, HttpConfig, OAuthConfig, RouteConfig};

/// Default location of the YAML config file.
pub const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

/// Overrides `DEFAULT_CONFIG_PATH`.
pub const CONFIG_PATH_ENV: &str = "STOREFRONT_PROXY_CONFIG";

/// Prefix for environment overrides, e.g. `STOREFRONT_PROXY_OAUTH__CLIENT_SECRET`.
pub const ENV_PREFIX: &str = "STOREFRONT_PROXY_";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0: listener, token endpoint credentials and the route table.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Port override for platforms that only hand out `PORT`.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    pub routes: Vec<RouteConfig>,
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

impl ConfigV1 {
    /// The address to listen on, with `port` replacing the port of `bind_address` when set.
    pub fn listen_address(&self) -> String {
        match self.port {
            Some(port) => {
                let host = self
                    .bind_address
                    .rsplit_once(':')
                    .map(|(host, _)| host)
                    .unwrap_or(self.bind_address.as_str());
                format!("{}:{}", host, port)
            }
            None => self.bind_address.clone(),
        }
    }
}

/// Builds the layered figment: version default, YAML file, prefixed env vars, bare `PORT`.
pub fn figment(path: &str) -> Figment {
    Figment::from(Serialized::default("version", "1.0.0"))
        .merge(Yaml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .merge(Env::raw().only(&["port"]))
}

/// Load the config from `path`, layering environment overrides on top.
pub fn load_config_from(path: &str) -> Result<ConfigV1, figment::Error> {
    match figment(path).extract::<Config>()? {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Load the config from `STOREFRONT_PROXY_CONFIG` or "config.yaml" in the current directory.
pub fn load_config() -> Result<ConfigV1, figment::Error> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config_from(&path)
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
