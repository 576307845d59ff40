use alloy::primitives::{
    Address,
    B256,
    U256,
    utils::parse_units,
};
use anyhow::{
    Context,
    Result,
    anyhow,
};
use regex::{
    Captures,
    Regex,
};
use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};
use std::{
    collections::BTreeMap,
    fs,
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
};

pub const DEFAULT_CONFIG_FILE: &str = "deploy-config.toml";
const DEFAULT_ARTIFACTS_DIR: &str = "build/contracts";
const DEFAULT_ADDRESSES_FILE: &str = "contractAddresses.json";
const DEFAULT_ABI_FILE: &str = "abi.json";
const DEFAULT_EXPLORER_API_URL: &str = "https://api.etherscan.io/v2/api";
const DEFAULT_EXPLORER_KEY_ENV: &str = "ETHERSCAN_TOKEN";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub project: ProjectSettings,
    pub networks: BTreeMap<String, NetworkConfig>,
    #[serde(skip_serializing)]
    pub wallets: WalletsConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub front_end: Option<FrontEndConfig>,
    pub verification: VerificationConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectSettings {
    pub artifacts_dir: PathBuf,
    pub deployments_dir: PathBuf,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            deployments_dir: PathBuf::from(deployments::DEPLOYMENTS_ROOT),
        }
    }
}

/// Settings for one `[networks.<name>]` table. Every key is optional in the
/// file; operations that need a key fail when it is absent.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub rpc_url: Option<String>,
    pub vrf_coordinator: Option<Address>,
    pub lending_pool_addresses_provider: Option<Address>,
    pub weth_token: Option<Address>,
    #[serde(alias = "subscriptionId")]
    pub subscription_id: Option<u64>,
    #[serde(alias = "gasLane")]
    pub gas_lane: Option<B256>,
    #[serde(alias = "baseFee")]
    pub base_fee: Option<Amount>,
    #[serde(alias = "gasPriceLink")]
    pub gas_price_link: Option<Amount>,
    #[serde(alias = "raffleEntranceFee")]
    pub raffle_entrance_fee: Option<Amount>,
    #[serde(alias = "callbackGasLimit")]
    pub callback_gas_limit: Option<u32>,
    #[serde(alias = "keepersUpdateInterval")]
    pub keepers_update_interval: Option<u64>,
    pub verify: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct WalletsConfig {
    pub from_key: Option<String>,
    pub mnemonic: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FrontEndConfig {
    pub constants_dir: String,
    #[serde(default = "default_addresses_file")]
    pub addresses_file: String,
    #[serde(default = "default_abi_file")]
    pub abi_file: String,
    #[serde(default = "default_front_end_contract")]
    pub contract: String,
    #[serde(default)]
    pub export_config: bool,
}

impl FrontEndConfig {
    pub fn constants_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.constants_dir).into_owned())
    }
}

fn default_addresses_file() -> String {
    DEFAULT_ADDRESSES_FILE.to_string()
}

fn default_abi_file() -> String {
    DEFAULT_ABI_FILE.to_string()
}

fn default_front_end_contract() -> String {
    contract_bindings::RAFFLE_CONTRACT.to_string()
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub api_url: String,
    pub api_key_env: String,
    /// Directory that source paths in build metadata are relative to.
    pub source_root: PathBuf,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_EXPLORER_API_URL.to_string(),
            api_key_env: DEFAULT_EXPLORER_KEY_ENV.to_string(),
            source_root: PathBuf::from("."),
        }
    }
}

impl ProjectConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Parses the file after replacing `${VAR}` placeholders from the process
    /// environment.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_vars(content, |name| std::env::var(name).ok())?;
        toml::from_str(&processed).context("Failed to parse configuration TOML")
    }

    pub fn network(&self, name: &str) -> Option<&NetworkConfig> {
        self.networks.get(name)
    }
}

/// Replaces `${NAME}` with `lookup(NAME)`, leaving unknown names verbatim.
pub fn substitute_vars(
    content: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").context("compiling placeholder pattern")?;
    let result = re.replace_all(content, |caps: &Captures| {
        let name = &caps[1];
        lookup(name).unwrap_or_else(|| format!("${{{name}}}"))
    });
    Ok(result.into_owned())
}

/// A wei amount. Accepts a bare integer, a decimal or `0x` string, or
/// `"<value> <unit>"` such as `"0.01 ether"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Amount(pub U256);

impl Amount {
    pub fn wei(self) -> U256 {
        self.0
    }
}

impl FromStr for Amount {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        parse_amount(raw).map(Amount)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(value) => Ok(Amount(U256::from(value))),
            Raw::Text(text) => parse_amount(&text)
                .map(Amount)
                .map_err(|e| serde::de::Error::custom(format!("{e:#}"))),
        }
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

pub fn parse_amount(raw: &str) -> Result<U256> {
    let raw = raw.trim();
    match raw.split_once(char::is_whitespace) {
        Some((value, unit)) => {
            let unit = unit.trim().to_ascii_lowercase();
            let parsed = parse_units(value, unit.as_str())
                .map_err(|e| anyhow!("invalid amount '{raw}': {e}"))?;
            Ok(parsed.into())
        }
        None => U256::from_str(raw).map_err(|e| anyhow!("invalid amount '{raw}': {e}")),
    }
}

/// Unwraps a configured value or names the missing `networks.<name>.<key>`.
pub fn required<T: Clone>(network: &str, key: &str, value: &Option<T>) -> Result<T> {
    value
        .clone()
        .ok_or_else(|| anyhow!("missing configuration key networks.{network}.{key}"))
}
