use config::{Config, ConfigError, File};
use ethers::types::Address;
use serde::Deserialize;
use std::env;

// Mainnet deployment constants. Every one of these can be overridden through
// Config.toml or the environment, so the aggregation logic never hardcodes a
// chain address.
const DEFAULT_FACTORY_ADDRESS: &str = "0xf8062Eedf80D8D2527cE89435f670cb996aB4e54";
const DEFAULT_MULTICALL_ADDRESS: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";
const DEFAULT_WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
const DEFAULT_USDT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
const DEFAULT_YETH_VAULT: &str = "0xe1237aA7f535b0CC33Fd973D66cBf830354D16c7";
const DEFAULT_YCRV_VAULT: &str = "0x5dbcF33D8c2E976c6b560249878e6F1491Bca25c";
const DEFAULT_CURVE_Y_POOL: &str = "0x45F783CCE6B7FF23B2ab2D70e416cdb7D6055f51";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid address '{value}' for {field}")]
    InvalidAddress { field: &'static str, value: String },
}

#[derive(Debug, Deserialize, Clone)]
pub struct Rpc {
    #[serde(default = "default_http_urls")]
    pub http_urls: Vec<String>,
    /// Global cap on in-flight RPC requests across all providers
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_multicall_batch_size")]
    pub multicall_batch_size: usize,
    #[serde(default = "default_multicall_address")]
    pub multicall_address: String,
}

fn default_http_urls() -> Vec<String> {
    vec!["https://eth.llamarpc.com".to_string()]
}
fn default_max_concurrency() -> usize {
    8
}
fn default_multicall_batch_size() -> usize {
    100
}
fn default_multicall_address() -> String {
    DEFAULT_MULTICALL_ADDRESS.to_string()
}

impl Default for Rpc {
    fn default() -> Self {
        Self {
            http_urls: default_http_urls(),
            max_concurrency: default_max_concurrency(),
            multicall_batch_size: default_multicall_batch_size(),
            multicall_address: default_multicall_address(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Protocol {
    #[serde(default = "default_factory_address")]
    pub factory_address: String,
    /// Block the factory was deployed at; log scans never start earlier
    #[serde(default = "default_genesis_block")]
    pub genesis_block: u64,
    /// Maximum block span per eth_getLogs request during discovery
    #[serde(default = "default_discovery_chunk_size")]
    pub discovery_chunk_size: u64,
}

fn default_factory_address() -> String {
    DEFAULT_FACTORY_ADDRESS.to_string()
}
fn default_genesis_block() -> u64 {
    10815298
}
fn default_discovery_chunk_size() -> u64 {
    100_000
}

impl Default for Protocol {
    fn default() -> Self {
        Self {
            factory_address: default_factory_address(),
            genesis_block: default_genesis_block(),
            discovery_chunk_size: default_discovery_chunk_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Tokens {
    #[serde(default = "default_weth")]
    pub weth: String,
    #[serde(default = "default_usdt")]
    pub usdt: String,
    /// yETH vault share; exempt from generic wrapper treatment
    #[serde(default = "default_yeth_vault")]
    pub yeth_vault: String,
    #[serde(default = "default_ycrv_vault")]
    pub ycrv_vault: String,
    /// Curve Y pool queried for get_virtual_price
    #[serde(default = "default_curve_y_pool")]
    pub curve_y_pool: String,
}

fn default_weth() -> String {
    DEFAULT_WETH.to_string()
}
fn default_usdt() -> String {
    DEFAULT_USDT.to_string()
}
fn default_yeth_vault() -> String {
    DEFAULT_YETH_VAULT.to_string()
}
fn default_ycrv_vault() -> String {
    DEFAULT_YCRV_VAULT.to_string()
}
fn default_curve_y_pool() -> String {
    DEFAULT_CURVE_Y_POOL.to_string()
}

impl Default for Tokens {
    fn default() -> Self {
        Self {
            weth: default_weth(),
            usdt: default_usdt(),
            yeth_vault: default_yeth_vault(),
            ycrv_vault: default_ycrv_vault(),
            curve_y_pool: default_curve_y_pool(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub rpc: Rpc,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub tokens: Tokens,
}

/// Typed view of the protocol constants with every address parsed once.
/// This is what the aggregation pipeline consumes; it never sees raw strings.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolParams {
    pub factory: Address,
    pub genesis_block: u64,
    pub discovery_chunk_size: u64,
    pub weth: Address,
    pub usdt: Address,
    pub yeth_vault: Address,
    pub ycrv_vault: Address,
    pub curve_y_pool: Address,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("Config.toml").required(false))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Environment variable overrides for RPC configuration
        if let Ok(raw_http) = env::var("SDK_RPC_HTTP_URLS") {
            if let Some(list) = parse_string_list(&raw_http) {
                if !list.is_empty() {
                    settings.rpc.http_urls = list;
                }
            }
        }
        if let Ok(raw_factory) = env::var("SDK_PROTOCOL_FACTORY_ADDRESS") {
            let trimmed = raw_factory.trim();
            if !trimmed.is_empty() {
                settings.protocol.factory_address = trimmed.to_string();
            }
        }

        Ok(settings)
    }

    /// Parses the protocol/token address book into its typed form.
    pub fn protocol_params(&self) -> Result<ProtocolParams, SettingsError> {
        Ok(ProtocolParams {
            factory: parse_address("protocol.factory_address", &self.protocol.factory_address)?,
            genesis_block: self.protocol.genesis_block,
            discovery_chunk_size: self.protocol.discovery_chunk_size,
            weth: parse_address("tokens.weth", &self.tokens.weth)?,
            usdt: parse_address("tokens.usdt", &self.tokens.usdt)?,
            yeth_vault: parse_address("tokens.yeth_vault", &self.tokens.yeth_vault)?,
            ycrv_vault: parse_address("tokens.ycrv_vault", &self.tokens.ycrv_vault)?,
            curve_y_pool: parse_address("tokens.curve_y_pool", &self.tokens.curve_y_pool)?,
        })
    }

    pub fn multicall_address(&self) -> Result<Address, SettingsError> {
        parse_address("rpc.multicall_address", &self.rpc.multicall_address)
    }
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, SettingsError> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|_| SettingsError::InvalidAddress {
            field,
            value: value.to_string(),
        })
}

/// Accepts either a JSON array ("[\"url1\",\"url2\"]") or a comma-separated
/// list ("url1,url2"), matching the usual shapes of env-provided lists.
fn parse_string_list(raw: &str) -> Option<Vec<String>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('[') {
        return serde_json::from_str::<Vec<String>>(trimmed).ok();
    }
    Some(
        trimmed
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}
