use crate::{
    artifacts::ContractArtifact,
    session::{
        Session,
        confirm,
    },
};
use alloy::{
    network::TransactionBuilder,
    primitives::Bytes,
    providers::Provider,
    rpc::types::TransactionRequest,
};
use anyhow::{
    Context,
    Result,
};
use deployments::{
    DeploymentRecord,
    compute_bytecode_hash,
};

/// Sends the creation transaction for `artifact` and returns the record of
/// the new deployment. The caller appends it to the registry.
pub async fn deploy_contract(
    session: &Session,
    artifact: &ContractArtifact,
    constructor_args: Bytes,
) -> Result<DeploymentRecord> {
    let sender = session.sender()?;
    let name = artifact.name().to_string();
    let code = artifact.creation_code()?;
    let bytecode_hash = compute_bytecode_hash(&code);

    let mut creation = code.to_vec();
    creation.extend_from_slice(&constructor_args);
    let tx = TransactionRequest::default()
        .with_from(sender)
        .with_deploy_code(creation);

    tracing::info!("Deploying {name} to '{}' from {sender}", session.network.name);
    let pending = session
        .provider
        .send_transaction(tx)
        .await
        .with_context(|| format!("submitting {name} deployment"))?;
    let receipt = confirm(pending, &format!("deploy {name}")).await?;
    let address = receipt
        .contract_address
        .with_context(|| format!("{name} deployment receipt has no contract address"))?;
    tracing::info!("{name} deployed at {address} (tx {})", receipt.transaction_hash);

    let mut record = DeploymentRecord::new(
        name,
        address.to_string(),
        session.network.name.as_str(),
        session.network.rpc_url.as_str(),
        session.chain_id,
        bytecode_hash,
    );
    record.tx_hash = Some(receipt.transaction_hash.to_string());
    record.deployer = Some(sender.to_string());
    record.block_number = receipt.block_number;
    record.constructor_args = (!constructor_args.is_empty())
        .then(|| format!("0x{}", hex::encode(&constructor_args)));
    Ok(record)
}
