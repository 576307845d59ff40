use crate::{
    artifacts,
    config::ProjectConfig,
    deploy::deploy_contract,
    network::ActiveNetwork,
    session::{
        Session,
        confirm,
        parse_address,
    },
    subscription,
    verify::verify_deployment,
};
use alloy::{
    primitives::{
        Address,
        B256,
        Bytes,
        U256,
    },
    providers::DynProvider,
    sol_types::SolConstructor,
};
use anyhow::{
    Context,
    Result,
    anyhow,
};
use contract_bindings::{
    RAFFLE_CONTRACT,
    RaffleV32::{
        self,
        RaffleV32Instance,
    },
};
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RaffleState {
    Open,
    Calculating,
    Paused,
}

impl TryFrom<u8> for RaffleState {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(RaffleState::Open),
            1 => Ok(RaffleState::Calculating),
            2 => Ok(RaffleState::Paused),
            other => Err(anyhow!("unknown raffle state {other}")),
        }
    }
}

impl fmt::Display for RaffleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RaffleState::Open => "OPEN",
            RaffleState::Calculating => "CALCULATING",
            RaffleState::Paused => "PAUSED",
        };
        write!(f, "{name}")
    }
}

/// Constructor arguments for `RaffleV32`, in declaration order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RaffleDeployParams {
    pub vrf_coordinator: Address,
    pub lending_pool_addresses_provider: Address,
    pub weth: Address,
    pub subscription_id: u64,
    pub gas_lane: B256,
    pub interval: U256,
    pub entrance_fee: U256,
    pub callback_gas_limit: u32,
}

impl RaffleDeployParams {
    pub fn from_network(
        network: &ActiveNetwork,
        vrf_coordinator: Address,
        subscription_id: u64,
    ) -> Result<Self> {
        Ok(Self {
            vrf_coordinator,
            lending_pool_addresses_provider: network.lending_pool_addresses_provider()?,
            weth: network.weth_token()?,
            subscription_id,
            gas_lane: network.gas_lane()?,
            interval: network.keepers_update_interval()?,
            entrance_fee: network.raffle_entrance_fee()?,
            callback_gas_limit: network.callback_gas_limit()?,
        })
    }

    pub fn constructor_args(&self) -> Bytes {
        RaffleV32::constructorCall {
            vrfCoordinatorV2: self.vrf_coordinator,
            lendingPoolAddressesProvider: self.lending_pool_addresses_provider,
            weth: self.weth,
            subscriptionId: self.subscription_id,
            gasLane: self.gas_lane,
            interval: self.interval,
            entranceFee: self.entrance_fee,
            callbackGasLimit: self.callback_gas_limit,
        }
        .abi_encode()
        .into()
    }
}

async fn latest_raffle(session: &Session) -> Result<RaffleV32Instance<DynProvider>> {
    let address = session.latest_address(RAFFLE_CONTRACT).await?;
    Ok(RaffleV32::new(address, session.provider.clone()))
}

pub async fn deploy_lottery(session: &Session, config: &ProjectConfig) -> Result<Address> {
    let artifacts_dir = config.project.artifacts_dir.as_path();
    let vrf_coordinator =
        subscription::resolve_vrf_coordinator(session, artifacts_dir).await?;
    let subscription_id =
        subscription::create_and_or_get_sub_id(session, vrf_coordinator).await?;
    let params =
        RaffleDeployParams::from_network(&session.network, vrf_coordinator, subscription_id)?;

    let artifact = artifacts::load(artifacts_dir, RAFFLE_CONTRACT)?;
    let mut record = deploy_contract(session, &artifact, params.constructor_args()).await?;
    record.subscription_id = Some(subscription_id);
    record.vrf_coordinator = Some(vrf_coordinator.to_string());
    let raffle = parse_address(&record.address)?;
    session
        .store
        .append(record.clone())
        .context("recording raffle deployment")?;

    if session.network.kind.is_local() {
        subscription::add_consumer(session, vrf_coordinator, subscription_id, raffle)
            .await?;
    }

    println!("Contract deployed!");
    println!(" The VRF contract address is :{vrf_coordinator}");
    println!(" The raffle subscription id is :{subscription_id}");
    println!(" The raffle contract address is :{raffle}");

    if session.network.verify() {
        verify_deployment(session, &config.verification, &artifact, &record).await?;
    }
    Ok(raffle)
}

/// Publishes the source of the most recent raffle deployment.
pub async fn deploy_to_etherscan(session: &Session, config: &ProjectConfig) -> Result<()> {
    let record = session.store.require_latest(RAFFLE_CONTRACT)?;
    let artifact = artifacts::load(&config.project.artifacts_dir, RAFFLE_CONTRACT)?;
    verify_deployment(session, &config.verification, &artifact, &record).await
}

pub async fn enter_raffle(session: &Session) -> Result<()> {
    let raffle = latest_raffle(session).await?;
    let entrance_fee = session.network.raffle_entrance_fee()?;
    let pending = raffle
        .enterRaffle()
        .value(entrance_fee)
        .send()
        .await
        .context("submitting enterRaffle")?;
    confirm(pending, "enterRaffle").await?;
    println!("Raffle entered");
    Ok(())
}

pub async fn withdraw_player(session: &Session) -> Result<()> {
    let raffle = latest_raffle(session).await?;
    let pending = raffle
        .withdrawPlayer()
        .send()
        .await
        .context("submitting withdrawPlayer")?;
    confirm(pending, "withdrawPlayer").await?;
    println!("Player withdrawn!");
    Ok(())
}

pub async fn get_raffle_state(session: &Session) -> Result<RaffleState> {
    let raffle = latest_raffle(session).await?;
    let raw = raffle
        .getRaffleState()
        .call()
        .await
        .context("calling getRaffleState")?;
    let state = RaffleState::try_from(raw)?;
    println!("Raffle state is: {state}");
    Ok(state)
}

pub async fn toggle_pause(session: &Session) -> Result<RaffleState> {
    get_raffle_state(session).await?;
    let raffle = latest_raffle(session).await?;
    let pending = raffle
        .togglePause()
        .send()
        .await
        .context("submitting togglePause")?;
    confirm(pending, "togglePause").await?;
    println!("Changing state...");
    get_raffle_state(session).await
}

pub async fn get_number_players(session: &Session) -> Result<U256> {
    let raffle = latest_raffle(session).await?;
    let players = raffle
        .getNumberOfPlayers()
        .call()
        .await
        .context("calling getNumberOfPlayers")?;
    println!("Raffle number of players: {players}");
    Ok(players)
}

pub async fn get_index_of_address(session: &Session) -> Result<U256> {
    let raffle = latest_raffle(session).await?;
    let account = session.sender()?;
    let index = raffle
        .getIndexOfAddress(account)
        .call()
        .await
        .context("calling getIndexOfAddress")?;
    println!("index of address is: {index}");
    Ok(index)
}

pub async fn get_has_index(session: &Session) -> Result<bool> {
    let raffle = latest_raffle(session).await?;
    let account = session.sender()?;
    let has_index = raffle
        .getHasIndex(account)
        .call()
        .await
        .context("calling getHasIndex")?;
    println!("Address has index: {has_index}");
    Ok(has_index)
}
