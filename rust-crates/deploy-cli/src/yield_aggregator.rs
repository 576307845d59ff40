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
    verify::verify_deployment,
};
use alloy::{
    primitives::{
        Address,
        Bytes,
        U256,
    },
    providers::DynProvider,
    sol_types::SolConstructor,
};
use anyhow::{
    Context,
    Result,
};
use contract_bindings::{
    YIELD_AGGREGATOR_CONTRACT,
    YieldAggregatorV32::{
        self,
        YieldAggregatorV32Instance,
    },
};

/// 0.01 ether, sent with `enterPlayer` when no value is given.
pub const DEFAULT_ENTRY_VALUE: u64 = 10_000_000_000_000_000;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct YieldDeployParams {
    pub lending_pool_addresses_provider: Address,
    pub weth: Address,
}

impl YieldDeployParams {
    pub fn from_network(network: &ActiveNetwork) -> Result<Self> {
        Ok(Self {
            lending_pool_addresses_provider: network.lending_pool_addresses_provider()?,
            weth: network.weth_token()?,
        })
    }

    pub fn constructor_args(&self) -> Bytes {
        YieldAggregatorV32::constructorCall {
            lendingPoolAddressesProvider: self.lending_pool_addresses_provider,
            weth: self.weth,
        }
        .abi_encode()
        .into()
    }
}

/// Aave account position of the aggregator contract.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AccountData {
    pub total_collateral_eth: U256,
    pub total_debt_eth: U256,
    pub available_borrows_eth: U256,
    pub current_liquidation_threshold: U256,
    pub ltv: U256,
    pub health_factor: U256,
}

impl From<YieldAggregatorV32::getUserAccountDataReturn> for AccountData {
    fn from(data: YieldAggregatorV32::getUserAccountDataReturn) -> Self {
        Self {
            total_collateral_eth: data.totalCollateralETH,
            total_debt_eth: data.totalDebtETH,
            available_borrows_eth: data.availableBorrowsETH,
            current_liquidation_threshold: data.currentLiquidationThreshold,
            ltv: data.ltv,
            health_factor: data.healthFactor,
        }
    }
}

async fn latest_aggregator(session: &Session) -> Result<YieldAggregatorV32Instance<DynProvider>> {
    let address = session.latest_address(YIELD_AGGREGATOR_CONTRACT).await?;
    Ok(YieldAggregatorV32::new(address, session.provider.clone()))
}

pub async fn deploy_yield_aggregator(
    session: &Session,
    config: &ProjectConfig,
) -> Result<Address> {
    let params = YieldDeployParams::from_network(&session.network)?;
    let artifact = artifacts::load(&config.project.artifacts_dir, YIELD_AGGREGATOR_CONTRACT)?;
    let record = deploy_contract(session, &artifact, params.constructor_args()).await?;
    let address = parse_address(&record.address)?;
    session
        .store
        .append(record.clone())
        .context("recording yield aggregator deployment")?;
    println!("Contract deployed!");

    if session.network.verify() {
        verify_deployment(session, &config.verification, &artifact, &record).await?;
    }
    Ok(address)
}

pub async fn enter_player(session: &Session, value: Option<U256>) -> Result<()> {
    let aggregator = latest_aggregator(session).await?;
    let value = value.unwrap_or(U256::from(DEFAULT_ENTRY_VALUE));
    let pending = aggregator
        .enterPlayer()
        .value(value)
        .send()
        .await
        .context("submitting enterPlayer")?;
    confirm(pending, "enterPlayer").await?;
    println!("Player entered!");
    Ok(())
}

pub async fn withdraw_player(session: &Session) -> Result<()> {
    let aggregator = latest_aggregator(session).await?;
    let pending = aggregator
        .withdrawPlayer()
        .send()
        .await
        .context("submitting withdrawPlayer")?;
    confirm(pending, "withdrawPlayer").await?;
    println!("Player withdrawn!");
    get_total_deposited(session).await?;
    Ok(())
}

pub async fn get_yield_bal(session: &Session) -> Result<U256> {
    let balance = latest_aggregator(session).await?
        .getYieldBalance()
        .call()
        .await
        .context("calling getYieldBalance")?;
    println!("Yield balance is:{balance}");
    Ok(balance)
}

pub async fn get_user_account_data(session: &Session) -> Result<AccountData> {
    let data: AccountData = latest_aggregator(session).await?
        .getUserAccountData()
        .call()
        .await
        .context("calling getUserAccountData")?
        .into();
    println!("Total collateral:{}", data.total_collateral_eth);
    println!("Total debt:{}", data.total_debt_eth);
    println!("Available borrows:{}", data.available_borrows_eth);
    println!("Liquidation threshold:{}", data.current_liquidation_threshold);
    println!("LTV:{}", data.ltv);
    println!("Health factor:{}", data.health_factor);
    Ok(data)
}

pub async fn get_total_deposited(session: &Session) -> Result<U256> {
    let total = latest_aggregator(session).await?
        .getTotalDeposited()
        .call()
        .await
        .context("calling getTotalDeposited")?;
    println!("Total deposited in contract:{total}");
    Ok(total)
}

pub async fn get_player_deposited(session: &Session, players: &[Address]) -> Result<Vec<U256>> {
    let aggregator = latest_aggregator(session).await?;
    let mut deposits = Vec::with_capacity(players.len());
    for player in players {
        let deposited = aggregator
            .getPlayerDeposited(*player)
            .call()
            .await
            .with_context(|| format!("calling getPlayerDeposited({player})"))?;
        println!("Player deposited in contract:{deposited}");
        deposits.push(deposited);
    }
    Ok(deposits)
}

pub async fn get_total_players(session: &Session) -> Result<U256> {
    let players = latest_aggregator(session).await?
        .getNumberOfPlayers()
        .call()
        .await
        .context("calling getNumberOfPlayers")?;
    println!("Total players in contract:{players}");
    Ok(players)
}

pub async fn get_index_of_player(session: &Session, players: &[Address]) -> Result<Vec<U256>> {
    let aggregator = latest_aggregator(session).await?;
    let mut indices = Vec::with_capacity(players.len());
    for player in players {
        let index = aggregator
            .getIndexOfAddress(*player)
            .call()
            .await
            .with_context(|| format!("calling getIndexOfAddress({player})"))?;
        println!("Index of player is:{index}");
        indices.push(index);
    }
    Ok(indices)
}

pub async fn get_address_at_index(session: &Session, indices: &[u64]) -> Result<Vec<Address>> {
    let aggregator = latest_aggregator(session).await?;
    let mut players = Vec::with_capacity(indices.len());
    for index in indices {
        let player = aggregator
            .getAddressAtIndex(U256::from(*index))
            .call()
            .await
            .with_context(|| format!("calling getAddressAtIndex({index})"))?;
        println!("Address of index {index} is:{player}");
        players.push(player);
    }
    Ok(players)
}

/// Reports the pool, enters the active account, and reports again.
pub async fn enter(session: &Session, value: Option<U256>) -> Result<()> {
    get_user_account_data(session).await?;
    get_total_deposited(session).await?;
    get_total_players(session).await?;
    enter_player(session, value).await?;
    get_user_account_data(session).await?;
    get_total_deposited(session).await?;
    get_total_players(session).await?;
    Ok(())
}

/// Reports the pool, withdraws the active account, and reports again.
pub async fn withdraw(session: &Session) -> Result<()> {
    get_total_players(session).await?;
    get_yield_bal(session).await?;
    get_total_deposited(session).await?;
    withdraw_player(session).await?;
    get_total_players(session).await?;
    get_yield_bal(session).await?;
    get_user_account_data(session).await?;
    get_total_deposited(session).await?;
    Ok(())
}
