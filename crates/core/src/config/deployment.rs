//! Deployment presets.
//!
//! A deployment names one ledger and the flash-loan pool that funds
//! attempts against it. `DEPLOYMENT` selects a built-in preset by name or
//! points at a TOML file with the same fields. String values in the file may
//! reference environment variables as `${VAR}`.

use super::ConfigError;
use alloy::primitives::{address, Address};
use liquidator_api::UniswapV3Addresses;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub name: String,
    pub chain_id: u64,
    /// Comet proxy.
    pub ledger: Address,
    /// Token borrowed from the flash-loan pool.
    pub pair_token: Address,
    /// Pool fee tier in hundredths of a bip.
    pub pool_fee: u32,
    pub reversed_pair: bool,
    /// Withdraw log replay starts here unless the bot config overrides it.
    pub start_block: u64,
    /// Used when `RPC_URL` is not set.
    pub rpc_url: Option<String>,
    /// Periphery contracts used to quote collateral swaps.
    pub uniswap: UniswapV3Addresses,
}

impl Deployment {
    /// cUSDCv3 on Ethereum, funded from the DAI/USDC 0.01% pool.
    pub fn mainnet_usdc() -> Self {
        Self {
            name: "mainnet-usdc".to_string(),
            chain_id: 1,
            ledger: address!("c3d688B66703497DAA19211EEdff47f25384cdc3"),
            pair_token: address!("6B175474E89094C44Da98b954EedeAC495271d0F"),
            pool_fee: 100,
            reversed_pair: false,
            start_block: 15_331_586,
            rpc_url: None,
            uniswap: UniswapV3Addresses::mainnet(),
        }
    }

    /// cWETHv3 on Ethereum, funded from the USDC/WETH 0.05% pool.
    pub fn mainnet_weth() -> Self {
        Self {
            name: "mainnet-weth".to_string(),
            chain_id: 1,
            ledger: address!("A17581A9E3356d9A858b789D68B4d866e593aE94"),
            pair_token: address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            pool_fee: 500,
            reversed_pair: false,
            start_block: 16_400_710,
            rpc_url: None,
            uniswap: UniswapV3Addresses::mainnet(),
        }
    }

    pub fn presets() -> Vec<Self> {
        vec![Self::mainnet_usdc(), Self::mainnet_weth()]
    }

    /// Resolve `DEPLOYMENT`: a preset name, or a path to a `.toml` file.
    pub fn resolve(selector: &str) -> Result<Self, ConfigError> {
        match selector.trim().to_lowercase().as_str() {
            "mainnet-usdc" | "mainnet" | "usdc" => Ok(Self::mainnet_usdc()),
            "mainnet-weth" | "weth" => Ok(Self::mainnet_weth()),
            _ if selector.ends_with(".toml") => {
                Self::from_file(selector, |key| std::env::var(key).ok())
            }
            _ => Err(ConfigError::UnknownDeployment(selector.to_string())),
        }
    }

    /// Load a deployment file, expanding `${VAR}` through `lookup`.
    pub fn from_file(
        path: impl AsRef<Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, &path.display().to_string(), lookup)
    }

    pub fn from_toml_str(
        content: &str,
        origin: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let expanded = expand_env(content, &lookup);
        let file: DeploymentFile =
            toml::from_str(&expanded).map_err(|source| ConfigError::Parse {
                path: origin.to_string(),
                source,
            })?;
        file.into_deployment()
    }
}

/// On-disk shape. Addresses stay strings until validated.
#[derive(Debug, Deserialize)]
struct DeploymentFile {
    name: String,
    #[serde(default = "default_chain_id")]
    chain_id: u64,
    ledger: String,
    pair_token: String,
    pool_fee: u32,
    #[serde(default)]
    reversed_pair: bool,
    #[serde(default)]
    start_block: u64,
    #[serde(default)]
    rpc_url: Option<String>,
    /// Required off mainnet.
    #[serde(default)]
    swap_router: Option<String>,
    #[serde(default)]
    quoter_v2: Option<String>,
}

fn default_chain_id() -> u64 {
    1
}

impl DeploymentFile {
    fn into_deployment(self) -> Result<Deployment, ConfigError> {
        let uniswap = self.uniswap()?;
        Ok(Deployment {
            ledger: parse_address("ledger", &self.ledger)?,
            pair_token: parse_address("pair_token", &self.pair_token)?,
            name: self.name,
            chain_id: self.chain_id,
            pool_fee: self.pool_fee,
            reversed_pair: self.reversed_pair,
            start_block: self.start_block,
            rpc_url: self.rpc_url.filter(|url| !url.is_empty()),
            uniswap,
        })
    }

    /// Explicit periphery addresses, else the mainnet ones on chain 1.
    fn uniswap(&self) -> Result<UniswapV3Addresses, ConfigError> {
        let mainnet = (self.chain_id == 1).then(UniswapV3Addresses::mainnet);
        let swap_router = match (&self.swap_router, mainnet) {
            (Some(value), _) => parse_address("swap_router", value)?,
            (None, Some(mainnet)) => mainnet.swap_router,
            (None, None) => return Err(ConfigError::Missing("swap_router")),
        };
        let quoter_v2 = match (&self.quoter_v2, mainnet) {
            (Some(value), _) => parse_address("quoter_v2", value)?,
            (None, Some(mainnet)) => mainnet.quoter_v2,
            (None, None) => return Err(ConfigError::Missing("quoter_v2")),
        };
        Ok(UniswapV3Addresses {
            swap_router,
            quoter_v2,
        })
    }
}

pub(crate) fn parse_address(key: &'static str, value: &str) -> Result<Address, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::invalid(key, value, format!("not an address: {e}")))
}

/// Replace `${VAR}` with `lookup(VAR)`. Unknown variables are left as-is.
fn expand_env(s: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return s.to_string();
    };

    re.replace_all(s, |caps: &regex_lite::Captures<'_>| {
        lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_resolve_presets() {
        let usdc = Deployment::resolve("mainnet-usdc").unwrap();
        assert_eq!(usdc.pool_fee, 100);
        assert_eq!(usdc, Deployment::resolve("USDC").unwrap());

        let weth = Deployment::resolve("mainnet-weth").unwrap();
        assert_eq!(weth.pool_fee, 500);
        assert_ne!(usdc.ledger, weth.ledger);
    }

    #[test]
    fn test_unknown_deployment() {
        let err = Deployment::resolve("goerli-usdc").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDeployment(ref name) if name == "goerli-usdc"));
    }

    #[test]
    fn test_expand_env() {
        let lookup = vars(&[("ALCHEMY_KEY", "abc")]);
        assert_eq!(expand_env("https://x/${ALCHEMY_KEY}", &lookup), "https://x/abc");
        assert_eq!(expand_env("${MISSING}", &lookup), "${MISSING}");
        assert_eq!(expand_env("no_vars", &lookup), "no_vars");
    }

    #[test]
    fn test_from_toml_str() {
        let toml = r#"
            name = "fork-usdc"
            ledger = "0xc3d688B66703497DAA19211EEdff47f25384cdc3"
            pair_token = "${PAIR}"
            pool_fee = 100
            reversed_pair = true
            start_block = 18000000
            rpc_url = "http://127.0.0.1:${PORT}"
        "#;
        let deployment = Deployment::from_toml_str(
            toml,
            "inline",
            vars(&[
                ("PAIR", "0x6B175474E89094C44Da98b954EedeAC495271d0F"),
                ("PORT", "8545"),
            ]),
        )
        .unwrap();

        assert_eq!(deployment.name, "fork-usdc");
        assert_eq!(deployment.chain_id, 1);
        assert_eq!(deployment.pair_token, Deployment::mainnet_usdc().pair_token);
        assert!(deployment.reversed_pair);
        assert_eq!(deployment.start_block, 18_000_000);
        assert_eq!(deployment.rpc_url.as_deref(), Some("http://127.0.0.1:8545"));
        assert_eq!(deployment.uniswap, UniswapV3Addresses::mainnet());
    }

    #[test]
    fn test_non_mainnet_file_needs_swap_addresses() {
        let base = r#"
            name = "arbitrum-usdc"
            chain_id = 42161
            ledger = "0x9c4ec768c28520B50860ea7a15bd7213a9fF58bf"
            pair_token = "0xFd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9"
            pool_fee = 100
        "#;
        let err = Deployment::from_toml_str(base, "inline", vars(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("swap_router")));

        let with_periphery = format!(
            "{base}\nswap_router = \"0xE592427A0AEce92De3Edee1F18E0157C05861564\"\nquoter_v2 = \"0x61fFE014bA17989E743c5F6cB21bF9697530B21e\"\n"
        );
        let deployment =
            Deployment::from_toml_str(&with_periphery, "inline", vars(&[])).unwrap();
        assert_eq!(deployment.chain_id, 42161);
        assert_eq!(deployment.uniswap.quoter_v2, UniswapV3Addresses::mainnet().quoter_v2);
    }

    #[test]
    fn test_bad_address_in_file() {
        let toml = r#"
            name = "broken"
            ledger = "not-an-address"
            pair_token = "0x6B175474E89094C44Da98b954EedeAC495271d0F"
            pool_fee = 100
        "#;
        let err = Deployment::from_toml_str(toml, "inline", vars(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "ledger", .. }));
    }
}
