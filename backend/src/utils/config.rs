use anyhow::Result;
use std::env;
use std::fmt;
use crate::constants::{DEFAULT_SERVER_PORT, MAX_CONFIGURED_WALLETS};
use crate::db::DatabaseConfig;
use crate::models::WalletPurpose;

/// Raw `HOT_WALLET_<n>_*` entry as read from the environment.
#[derive(Clone)]
pub struct WalletEntry {
    pub index: usize,
    pub private_key: String,
    pub contract_address: String,
    pub purpose: WalletPurpose,
}

impl fmt::Debug for WalletEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletEntry")
            .field("index", &self.index)
            .field("private_key", &"<redacted>")
            .field("contract_address", &self.contract_address)
            .field("purpose", &self.purpose)
            .finish()
    }
}

#[derive(Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub port: u16,
    pub redis_url: String,
    pub rpc_url: String,
    pub neynar_api_key: String,
    pub token_hmac_secret: String,
    pub internal_api_secret: String,
    pub wallets: Vec<WalletEntry>,
    pub disabled_purposes: Vec<WalletPurpose>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("max_connections", &self.database.max_connections)
            .field("port", &self.port)
            .field("rpc_url", &self.rpc_url)
            .field("wallets", &self.wallets)
            .field("disabled_purposes", &self.disabled_purposes)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("{} must be set", key))
        };

        let wallets = wallets_from_lookup(&lookup)?;
        if wallets.is_empty() {
            return Err(anyhow::anyhow!("At least one HOT_WALLET_1_PRIVATE_KEY / HOT_WALLET_1_CONTRACT_ADDRESS pair must be set"));
        }

        Ok(Self {
            database: DatabaseConfig::from_lookup(&lookup)?,
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SERVER_PORT),
            redis_url: required("REDIS_URL")?,
            rpc_url: required("RPC_URL")?,
            neynar_api_key: required("NEYNAR_API_KEY")?,
            token_hmac_secret: required("TOKEN_HMAC_SECRET")?,
            internal_api_secret: required("INTERNAL_API_SECRET")?,
            wallets,
            disabled_purposes: parse_purposes(lookup("DISABLED_POOL_PURPOSES").as_deref())?,
        })
    }
}

/// Reads `HOT_WALLET_1_*`, `HOT_WALLET_2_*`, ... stopping at the first index
/// without a private key.
pub fn wallets_from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Vec<WalletEntry>> {
    let mut wallets = Vec::new();
    for index in 1..=MAX_CONFIGURED_WALLETS {
        let Some(private_key) = lookup(&format!("HOT_WALLET_{}_PRIVATE_KEY", index)) else {
            break;
        };
        let contract_address = lookup(&format!("HOT_WALLET_{}_CONTRACT_ADDRESS", index))
            .ok_or_else(|| anyhow::anyhow!("HOT_WALLET_{}_CONTRACT_ADDRESS must be set", index))?;
        let purpose = match lookup(&format!("HOT_WALLET_{}_PURPOSE", index)) {
            Some(p) if !p.trim().is_empty() => p.parse()?,
            _ => WalletPurpose::General,
        };

        wallets.push(WalletEntry {
            index,
            private_key: private_key.trim().to_string(),
            contract_address: contract_address.trim().to_string(),
            purpose,
        });
    }
    Ok(wallets)
}

fn parse_purposes(raw: Option<&str>) -> Result<Vec<WalletPurpose>> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<WalletPurpose>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn base_vars() -> HashMap<String, String> {
        [
            ("DATABASE_URL", "postgres://localhost/dispatcher"),
            ("REDIS_URL", "redis://localhost:6379"),
            ("RPC_URL", "https://mainnet.base.org"),
            ("NEYNAR_API_KEY", "neynar"),
            ("TOKEN_HMAC_SECRET", "secret"),
            ("INTERNAL_API_SECRET", "internal"),
            ("HOT_WALLET_1_PRIVATE_KEY", KEY),
            ("HOT_WALLET_1_CONTRACT_ADDRESS", "0x59888BE579194C701F16a9425f57ECce3906AF4b"),
            ("HOT_WALLET_1_PURPOSE", "main-airdrop"),
            ("HOT_WALLET_2_PRIVATE_KEY", KEY),
            ("HOT_WALLET_2_CONTRACT_ADDRESS", "0x59888BE579194C701F16a9425f57ECce3906AF4b"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn load(vars: &HashMap<String, String>) -> Result<Config> {
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_loads_wallets_and_defaults() {
        let config = load(&base_vars()).unwrap();
        assert_eq!(config.port, DEFAULT_SERVER_PORT);
        assert_eq!(config.database.database_url, "postgres://localhost/dispatcher");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.wallets.len(), 2);
        assert_eq!(config.wallets[0].purpose, WalletPurpose::MainAirdrop);
        assert_eq!(config.wallets[1].purpose, WalletPurpose::General);
        assert!(config.disabled_purposes.is_empty());
    }

    #[test]
    fn test_database_settings_come_from_same_lookup() {
        let mut vars = base_vars();
        vars.insert("DB_MAX_CONNECTIONS".to_string(), "25".to_string());
        assert_eq!(load(&vars).unwrap().database.max_connections, 25);

        vars.remove("DATABASE_URL");
        assert!(load(&vars).unwrap_err().to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_missing_hmac_secret_is_fatal() {
        let mut vars = base_vars();
        vars.remove("TOKEN_HMAC_SECRET");
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("TOKEN_HMAC_SECRET"));
    }

    #[test]
    fn test_wallet_scan_stops_at_gap() {
        let mut vars = base_vars();
        vars.insert("HOT_WALLET_4_PRIVATE_KEY".to_string(), KEY.to_string());
        vars.insert("HOT_WALLET_4_CONTRACT_ADDRESS".to_string(), "0x0".to_string());
        assert_eq!(load(&vars).unwrap().wallets.len(), 2);
    }

    #[test]
    fn test_disabled_purposes() {
        let mut vars = base_vars();
        vars.insert("DISABLED_POOL_PURPOSES".to_string(), "likes-recasts, link-web".to_string());
        let config = load(&vars).unwrap();
        assert_eq!(config.disabled_purposes, vec![WalletPurpose::LikesRecasts, WalletPurpose::LinkWeb]);

        vars.insert("DISABLED_POOL_PURPOSES".to_string(), "bogus".to_string());
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_debug_redacts_private_keys() {
        let config = load(&base_vars()).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains(KEY));
        assert!(!rendered.contains("internal"));
        assert!(!rendered.contains("postgres://"));
    }
}
