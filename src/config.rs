//! Bridge configuration - passed from the binary (CLI flags over env vars)

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Minimum relay fee, in smallest units. Also the session-wide fee-per-kB.
pub const MIN_FEE: u64 = 100_000;
/// Smallest units per coin.
pub const COIN: u64 = 100_000_000;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_QR_SIZE: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network { #[default] Bitcoin, Testnet, Signet, Regtest }

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self { Network::Bitcoin => "bitcoin", Network::Testnet => "testnet", Network::Signet => "signet", Network::Regtest => "regtest" }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bitcoin" | "mainnet" | "main" => Some(Network::Bitcoin),
            "testnet" | "test" => Some(Network::Testnet),
            "signet" => Some(Network::Signet),
            "regtest" => Some(Network::Regtest),
            _ => None,
        }
    }

    pub fn to_bitcoin(&self) -> bitcoin::Network {
        match self { Network::Bitcoin => bitcoin::Network::Bitcoin, Network::Testnet => bitcoin::Network::Testnet, Network::Signet => bitcoin::Network::Signet, Network::Regtest => bitcoin::Network::Regtest }
    }

    /// BIP44 coin type: 0 on mainnet, 1 everywhere else.
    pub fn coin_type(&self) -> u32 {
        match self { Network::Bitcoin => 0, _ => 1 }
    }
}

/// Bridge configuration. The binary constructs this.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub app: String,
    pub network: Network,
    pub electrum_url: Option<String>,
    pub assets_dir: PathBuf,
    /// 0 picks an ephemeral port.
    pub port: u16,
    pub poll_interval: Duration,
    pub fee_per_kb: u64,
    pub qr_size: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            app: "deskwallet".into(),
            network: Network::default(),
            electrum_url: None,
            assets_dir: PathBuf::from("assets"),
            port: 0,
            poll_interval: DEFAULT_POLL_INTERVAL,
            fee_per_kb: MIN_FEE,
            qr_size: DEFAULT_QR_SIZE,
        }
    }
}

impl BridgeConfig {
    pub fn new(app: impl Into<String>) -> Self { Self { app: app.into(), ..Default::default() } }
    pub fn with_network(mut self, network: Network) -> Self { self.network = network; self }
    pub fn with_electrum(mut self, url: impl Into<String>) -> Self { self.electrum_url = Some(url.into()); self }
    pub fn with_assets_dir(mut self, path: impl Into<PathBuf>) -> Self { self.assets_dir = path.into(); self }
    pub fn with_port(mut self, port: u16) -> Self { self.port = port; self }
    pub fn with_poll_interval(mut self, interval: Duration) -> Self { self.poll_interval = interval; self }

    /// Defaults overridden by `DESKWALLET_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();
        if let Some(app) = get("DESKWALLET_APP") {
            config.app = app;
        }
        if let Some(raw) = get("DESKWALLET_NETWORK") {
            config.network = Network::from_str(&raw)
                .ok_or_else(|| Error::Config(format!("unknown network: {}", raw)))?;
        }
        if let Some(url) = get("DESKWALLET_ELECTRUM") {
            config.electrum_url = Some(url);
        }
        if let Some(dir) = get("DESKWALLET_ASSETS") {
            config.assets_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get("DESKWALLET_PORT") {
            config.port = raw.trim().parse()
                .map_err(|e| Error::Config(format!("DESKWALLET_PORT: {}", e)))?;
        }
        Ok(config)
    }
}
