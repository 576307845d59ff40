use crate::network::ActiveNetwork;
use alloy::{
    network::{
        Ethereum,
        EthereumWallet,
    },
    primitives::Address,
    providers::{
        DynProvider,
        PendingTransactionBuilder,
        Provider,
        ProviderBuilder,
    },
    rpc::types::{
        Log,
        TransactionReceipt,
    },
    signers::local::PrivateKeySigner,
    sol_types::SolEvent,
};
use anyhow::{
    Context,
    Result,
    anyhow,
    ensure,
};
use deployments::DeploymentStore;
use std::path::Path;

/// Confirmations awaited for every transaction.
pub const CONFIRMATIONS: u64 = 1;

/// Everything an operation needs: the chain connection, the signing account
/// (when one was resolved) and the deployment registry of the active network.
pub struct Session {
    pub network: ActiveNetwork,
    pub provider: DynProvider,
    pub chain_id: u64,
    pub store: DeploymentStore,
    sender: Option<Address>,
}

impl Session {
    pub async fn connect(
        network: ActiveNetwork,
        signer: Option<PrivateKeySigner>,
        deployments_root: &Path,
    ) -> Result<Self> {
        let sender = signer.as_ref().map(|signer| signer.address());
        let provider = match signer {
            Some(signer) => ProviderBuilder::new()
                .wallet(EthereumWallet::from(signer))
                .connect_http(network.rpc_url.clone())
                .erased(),
            None => ProviderBuilder::new()
                .connect_http(network.rpc_url.clone())
                .erased(),
        };
        let chain_id = provider.get_chain_id().await.with_context(|| {
            format!("failed to reach network '{}' at {}", network.name, network.rpc_url)
        })?;
        tracing::info!(
            "Connected to {} network '{}' (chain id {chain_id}) at {}",
            network.kind,
            network.name,
            network.rpc_url
        );

        let store = DeploymentStore::new(deployments_root, network.name.as_str())
            .context("opening deployment store")?;

        Ok(Self {
            network,
            provider,
            chain_id,
            store,
            sender,
        })
    }

    pub fn sender(&self) -> Result<Address> {
        self.sender
            .ok_or_else(|| anyhow!("this operation needs a signing account"))
    }

    /// Address of the most recent deployment of `contract_name`. A local node
    /// forgets its state on restart, so the address must still hold code.
    pub async fn latest_address(&self, contract_name: &str) -> Result<Address> {
        let record = self.store.require_latest(contract_name)?;
        let address = parse_address(&record.address)
            .with_context(|| format!("parsing stored {contract_name} address"))?;
        ensure!(
            self.has_code(address).await?,
            "{contract_name} at {address} has no code on network '{}'; redeploy it",
            self.network.name
        );
        Ok(address)
    }

    pub async fn has_code(&self, address: Address) -> Result<bool> {
        let code = self
            .provider
            .get_code_at(address)
            .await
            .with_context(|| format!("fetching code at {address}"))?;
        Ok(!code.is_empty())
    }
}

pub fn parse_address(raw: &str) -> Result<Address> {
    raw.trim()
        .parse::<Address>()
        .map_err(|e| anyhow!("unable to parse address '{raw}': {e}"))
}

/// Waits for the configured confirmations and fails on a reverted receipt.
pub async fn confirm(
    pending: PendingTransactionBuilder<Ethereum>,
    label: &str,
) -> Result<TransactionReceipt> {
    let tx_hash = *pending.tx_hash();
    tracing::info!("{label}: waiting for tx {tx_hash}");
    let receipt = pending
        .with_required_confirmations(CONFIRMATIONS)
        .get_receipt()
        .await
        .with_context(|| format!("{label}: awaiting receipt for {tx_hash}"))?;
    ensure!(receipt.status(), "{label}: transaction {tx_hash} reverted");
    Ok(receipt)
}

/// The last log in the receipt that decodes as `E`.
pub fn last_event<E: SolEvent>(receipt: &TransactionReceipt) -> Option<E> {
    last_event_in(receipt.inner.logs())
}

pub fn last_event_in<E: SolEvent>(logs: &[Log]) -> Option<E> {
    logs.iter()
        .rev()
        .find_map(|log| log.log_decode::<E>().ok())
        .map(|decoded| decoded.inner.data)
}
