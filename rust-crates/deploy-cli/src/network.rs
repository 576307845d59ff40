use crate::config::{
    NetworkConfig,
    ProjectConfig,
    required,
};
use alloy::primitives::{
    Address,
    B256,
    U256,
};
use anyhow::{
    Context,
    Result,
    bail,
};
use std::fmt;
use url::Url;

pub const DEFAULT_NETWORK: &str = "development";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://127.0.0.1:8545";
pub const LOCAL_BLOCKCHAIN_ENVIRONMENTS: [&str; 2] = ["development", "ganache-local"];
pub const FORKED_LOCAL_ENVIRONMENTS: [&str; 2] = ["mainnet-fork", "mainnet-fork-dev"];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NetworkKind {
    /// Throwaway development chain; oracle contracts are mocked.
    Local,
    /// Local node forking a live chain; real oracle addresses apply.
    Forked,
    Live,
}

impl NetworkKind {
    pub fn classify(name: &str) -> Self {
        if LOCAL_BLOCKCHAIN_ENVIRONMENTS.contains(&name) {
            NetworkKind::Local
        } else if FORKED_LOCAL_ENVIRONMENTS.contains(&name) {
            NetworkKind::Forked
        } else {
            NetworkKind::Live
        }
    }

    pub fn is_local(self) -> bool {
        matches!(self, NetworkKind::Local)
    }

    /// Local and forked nodes expose the development mnemonic's accounts.
    pub fn uses_dev_accounts(self) -> bool {
        matches!(self, NetworkKind::Local | NetworkKind::Forked)
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NetworkKind::Local => "local",
            NetworkKind::Forked => "forked",
            NetworkKind::Live => "live",
        };
        write!(f, "{name}")
    }
}

/// The network selected for this run together with its settings table.
#[derive(Clone, Debug)]
pub struct ActiveNetwork {
    pub name: String,
    pub kind: NetworkKind,
    pub rpc_url: Url,
    pub settings: NetworkConfig,
}

impl ActiveNetwork {
    pub fn resolve(
        config: &ProjectConfig,
        name: &str,
        rpc_override: Option<&str>,
    ) -> Result<Self> {
        let kind = NetworkKind::classify(name);
        let settings = match (config.network(name), kind) {
            (Some(settings), _) => settings.clone(),
            (None, NetworkKind::Local) => NetworkConfig::default(),
            (None, _) => bail!("no [networks.{name}] table in configuration"),
        };

        let raw_url = match (rpc_override, settings.rpc_url.as_deref(), kind) {
            (Some(url), _, _) => url.to_string(),
            (None, Some(url), _) => url.to_string(),
            (None, None, NetworkKind::Local | NetworkKind::Forked) => {
                DEFAULT_LOCAL_RPC_URL.to_string()
            }
            (None, None, NetworkKind::Live) => {
                bail!("missing configuration key networks.{name}.rpc_url")
            }
        };
        let rpc_url = Url::parse(&raw_url)
            .with_context(|| format!("parsing RPC URL for network '{name}'"))?;

        Ok(Self {
            name: name.to_string(),
            kind,
            rpc_url,
            settings,
        })
    }

    pub fn vrf_coordinator(&self) -> Result<Address> {
        required(&self.name, "vrf_coordinator", &self.settings.vrf_coordinator)
    }

    pub fn lending_pool_addresses_provider(&self) -> Result<Address> {
        required(
            &self.name,
            "lending_pool_addresses_provider",
            &self.settings.lending_pool_addresses_provider,
        )
    }

    pub fn weth_token(&self) -> Result<Address> {
        required(&self.name, "weth_token", &self.settings.weth_token)
    }

    pub fn subscription_id(&self) -> Result<u64> {
        required(&self.name, "subscription_id", &self.settings.subscription_id)
    }

    pub fn gas_lane(&self) -> Result<B256> {
        required(&self.name, "gas_lane", &self.settings.gas_lane)
    }

    pub fn base_fee(&self) -> Result<U256> {
        required(&self.name, "base_fee", &self.settings.base_fee).map(|a| a.wei())
    }

    pub fn gas_price_link(&self) -> Result<U256> {
        required(&self.name, "gas_price_link", &self.settings.gas_price_link)
            .map(|a| a.wei())
    }

    pub fn raffle_entrance_fee(&self) -> Result<U256> {
        required(
            &self.name,
            "raffle_entrance_fee",
            &self.settings.raffle_entrance_fee,
        )
        .map(|a| a.wei())
    }

    pub fn callback_gas_limit(&self) -> Result<u32> {
        required(
            &self.name,
            "callback_gas_limit",
            &self.settings.callback_gas_limit,
        )
    }

    pub fn keepers_update_interval(&self) -> Result<U256> {
        required(
            &self.name,
            "keepers_update_interval",
            &self.settings.keepers_update_interval,
        )
        .map(U256::from)
    }

    pub fn verify(&self) -> bool {
        self.settings.verify.unwrap_or(false)
    }
}
