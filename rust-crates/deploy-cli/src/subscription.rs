use crate::{
    artifacts,
    deploy::deploy_contract,
    session::{
        Session,
        confirm,
        last_event,
        parse_address,
    },
};
use alloy::{
    primitives::{
        Address,
        U256,
        aliases::U96,
    },
    sol_types::SolConstructor,
};
use anyhow::{
    Context,
    Result,
    anyhow,
};
use contract_bindings::{
    VRF_COORDINATOR_MOCK_CONTRACT,
    VRFCoordinatorV2Mock,
};
use std::path::Path;

/// 0.01 ether worth of subscription balance on the mock coordinator.
pub const SUBSCRIPTION_FUND_AMOUNT: u64 = 10_000_000_000_000_000;

/// Live and forked networks use the configured coordinator; local networks
/// use the newest mock still present on the node, deploying one otherwise.
pub async fn resolve_vrf_coordinator(
    session: &Session,
    artifacts_dir: &Path,
) -> Result<Address> {
    if !session.network.kind.is_local() {
        return session.network.vrf_coordinator();
    }
    if let Some(record) = session.store.latest(VRF_COORDINATOR_MOCK_CONTRACT)? {
        let address = parse_address(&record.address)?;
        if session.has_code(address).await? {
            tracing::info!("Reusing VRF coordinator mock at {address}");
            return Ok(address);
        }
        tracing::warn!("VRF coordinator mock at {address} has no code; deploying a new one");
    }
    deploy_mocks(session, artifacts_dir).await
}

pub async fn deploy_mocks(session: &Session, artifacts_dir: &Path) -> Result<Address> {
    let args = mock_constructor_args(
        session.network.base_fee()?,
        session.network.gas_price_link()?,
    )?;
    let artifact = artifacts::load(artifacts_dir, VRF_COORDINATOR_MOCK_CONTRACT)?;
    let record = deploy_contract(session, &artifact, args.into()).await?;
    let address = parse_address(&record.address)?;
    session.store.append(record).context("recording VRF mock deployment")?;
    println!("VRF coordinator mock deployed!");
    println!("All mocks deployed!");
    Ok(address)
}

pub fn mock_constructor_args(base_fee: U256, gas_price_link: U256) -> Result<Vec<u8>> {
    let call = VRFCoordinatorV2Mock::constructorCall {
        baseFee: to_u96(base_fee, "base_fee")?,
        gasPriceLink: to_u96(gas_price_link, "gas_price_link")?,
    };
    Ok(call.abi_encode())
}

fn to_u96(value: U256, key: &str) -> Result<U96> {
    let bytes = value.to_be_bytes::<32>();
    let (high, low) = bytes.split_at(32 - U96::BYTES);
    if high.iter().any(|byte| *byte != 0) {
        return Err(anyhow!("{key} ({value}) does not fit in uint96"));
    }
    U96::try_from_be_slice(low).ok_or_else(|| anyhow!("{key} ({value}) does not fit in uint96"))
}

/// Local networks get a fresh, funded subscription on the mock coordinator;
/// other networks use the configured subscription id.
pub async fn create_and_or_get_sub_id(
    session: &Session,
    vrf_coordinator: Address,
) -> Result<u64> {
    if !session.network.kind.is_local() {
        return session.network.subscription_id();
    }

    let coordinator = VRFCoordinatorV2Mock::new(vrf_coordinator, session.provider.clone());
    let pending = coordinator
        .createSubscription()
        .send()
        .await
        .context("submitting createSubscription")?;
    let receipt = confirm(pending, "createSubscription").await?;
    println!("Subscription created!");
    let created = last_event::<VRFCoordinatorV2Mock::SubscriptionCreated>(&receipt)
        .context("createSubscription emitted no SubscriptionCreated event")?;
    let subscription_id = created.subId;
    println!("Subscription ID is :{subscription_id}");

    let amount = to_u96(U256::from(SUBSCRIPTION_FUND_AMOUNT), "subscription funding")?;
    let pending = coordinator
        .fundSubscription(subscription_id, amount)
        .send()
        .await
        .context("submitting fundSubscription")?;
    let receipt = confirm(pending, "fundSubscription").await?;
    let funded = last_event::<VRFCoordinatorV2Mock::SubscriptionFunded>(&receipt)
        .context("fundSubscription emitted no SubscriptionFunded event")?;
    println!(" The old balance of subscription was: {}", funded.oldBalance);
    println!(" The new balance of subscription is: {}", funded.newBalance);
    println!("Subscription funded!");

    Ok(subscription_id)
}

/// Registers `consumer` on a mock subscription so it may request randomness.
pub async fn add_consumer(
    session: &Session,
    vrf_coordinator: Address,
    subscription_id: u64,
    consumer: Address,
) -> Result<()> {
    let coordinator = VRFCoordinatorV2Mock::new(vrf_coordinator, session.provider.clone());
    let pending = coordinator
        .addConsumer(subscription_id, consumer)
        .send()
        .await
        .context("submitting addConsumer")?;
    confirm(pending, "addConsumer").await?;
    println!("Consumer {consumer} added to subscription {subscription_id}");
    Ok(())
}
