use alloy::primitives::Address;
use anyhow::{
    Context,
    Result,
};
use clap::{
    Parser,
    Subcommand,
};
use deploy_cli::{
    accounts::{
        AccountSelector,
        resolve_account,
        resolve_keystore_dir,
    },
    config::{
        Amount,
        DEFAULT_CONFIG_FILE,
        ProjectConfig,
    },
    front_end,
    init_tracing,
    load_env_file,
    network::{
        ActiveNetwork,
        DEFAULT_NETWORK,
    },
    raffle,
    session::Session,
    yield_aggregator,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "raffle-deploy",
    about = "Deploy and operate the raffle and yield aggregator contracts",
    version
)]
struct Args {
    #[command(flatten)]
    globals: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct GlobalArgs {
    /// Network table to use from the configuration
    #[arg(long, global = true, default_value = DEFAULT_NETWORK)]
    network: String,

    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Environment file (defaults to the nearest .env)
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Override RPC URL
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Use the development account at this index
    #[arg(long, global = true)]
    account_index: Option<u32>,

    /// Unlock the named keystore
    #[arg(long, global = true)]
    account_id: Option<String>,

    /// Override keystore directory (defaults to ~/.raffle-deploy/accounts)
    #[arg(long, global = true)]
    keystore_dir: Option<String>,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    tracing: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// RaffleV32 operations
    Raffle {
        #[command(subcommand)]
        action: RaffleAction,
    },
    /// YieldAggregatorV32 operations
    Yield {
        #[command(subcommand)]
        action: YieldAction,
    },
    /// Copy the address map and ABI into the front-end project
    SyncFrontEnd,
}

#[derive(Subcommand, Debug)]
enum RaffleAction {
    /// Deploy the raffle, then sync the front end
    Run,
    Deploy,
    /// Publish the latest deployment's source to the block explorer
    Verify,
    Enter,
    Withdraw,
    State,
    TogglePause,
    Players,
    IndexOf,
    HasIndex,
}

impl RaffleAction {
    fn needs_account(&self) -> bool {
        !matches!(
            self,
            RaffleAction::Verify | RaffleAction::State | RaffleAction::Players
        )
    }
}

#[derive(Subcommand, Debug)]
enum YieldAction {
    Deploy,
    /// Report, enter, report
    Enter {
        #[arg(long)]
        value: Option<Amount>,
    },
    /// Report, withdraw, report
    Withdraw,
    EnterPlayer {
        /// Deposit, e.g. "0.01 ether" (defaults to 0.01 ether)
        #[arg(long)]
        value: Option<Amount>,
    },
    WithdrawPlayer,
    YieldBalance,
    AccountData,
    TotalDeposited,
    PlayerDeposited {
        /// Players to query (defaults to the active account)
        #[arg(long = "address")]
        addresses: Vec<Address>,
    },
    Players,
    IndexOf {
        #[arg(long = "address")]
        addresses: Vec<Address>,
    },
    AddressAt {
        #[arg(long = "index", required = true)]
        indices: Vec<u64>,
    },
}

impl YieldAction {
    fn needs_account(&self) -> bool {
        matches!(
            self,
            YieldAction::Deploy
                | YieldAction::Enter { .. }
                | YieldAction::Withdraw
                | YieldAction::EnterPlayer { .. }
                | YieldAction::WithdrawPlayer
                | YieldAction::PlayerDeposited { .. }
                | YieldAction::IndexOf { .. }
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    load_env_file(args.globals.env_file.as_deref());
    if args.globals.tracing {
        init_tracing();
    }

    let config = ProjectConfig::load(&args.globals.config)
        .with_context(|| format!("loading {}", args.globals.config.display()))?;

    match args.command {
        Command::SyncFrontEnd => front_end::update_front_end(&config)?,
        Command::Raffle { action } => {
            let session = connect(&args.globals, &config, action.needs_account()).await?;
            run_raffle(&session, &config, action).await?
        }
        Command::Yield { action } => {
            let session = connect(&args.globals, &config, action.needs_account()).await?;
            run_yield(&session, &config, action).await?
        }
    }
    Ok(())
}

async fn connect(
    globals: &GlobalArgs,
    config: &ProjectConfig,
    needs_account: bool,
) -> Result<Session> {
    let network = ActiveNetwork::resolve(config, &globals.network, globals.rpc_url.as_deref())?;
    deployments::ensure_structure(&config.project.deployments_dir, &network.name)
        .context("initializing deployment directories")?;

    let signer = if needs_account {
        let selector = AccountSelector {
            index: globals.account_index,
            id: globals.account_id.clone(),
        };
        let keystore_dir = resolve_keystore_dir(globals.keystore_dir.as_deref())
            .context("resolving keystore directory")?;
        let signer = resolve_account(&selector, network.kind, &config.wallets, &keystore_dir)
            .context("resolving signing account")?;
        tracing::info!("Using account {}", signer.address());
        Some(signer)
    } else {
        None
    };

    Session::connect(network, signer, &config.project.deployments_dir).await
}

async fn run_raffle(session: &Session, config: &ProjectConfig, action: RaffleAction) -> Result<()> {
    match action {
        RaffleAction::Run => {
            raffle::deploy_lottery(session, config).await?;
            front_end::update_front_end(config)?;
        }
        RaffleAction::Deploy => {
            raffle::deploy_lottery(session, config).await?;
        }
        RaffleAction::Verify => raffle::deploy_to_etherscan(session, config).await?,
        RaffleAction::Enter => raffle::enter_raffle(session).await?,
        RaffleAction::Withdraw => raffle::withdraw_player(session).await?,
        RaffleAction::State => {
            raffle::get_raffle_state(session).await?;
        }
        RaffleAction::TogglePause => {
            raffle::toggle_pause(session).await?;
        }
        RaffleAction::Players => {
            raffle::get_number_players(session).await?;
        }
        RaffleAction::IndexOf => {
            raffle::get_index_of_address(session).await?;
        }
        RaffleAction::HasIndex => {
            raffle::get_has_index(session).await?;
        }
    }
    Ok(())
}

async fn run_yield(session: &Session, config: &ProjectConfig, action: YieldAction) -> Result<()> {
    match action {
        YieldAction::Deploy => {
            yield_aggregator::deploy_yield_aggregator(session, config).await?;
        }
        YieldAction::Enter { value } => {
            yield_aggregator::enter(session, value.map(Amount::wei)).await?
        }
        YieldAction::Withdraw => yield_aggregator::withdraw(session).await?,
        YieldAction::EnterPlayer { value } => {
            yield_aggregator::enter_player(session, value.map(Amount::wei)).await?
        }
        YieldAction::WithdrawPlayer => yield_aggregator::withdraw_player(session).await?,
        YieldAction::YieldBalance => {
            yield_aggregator::get_yield_bal(session).await?;
        }
        YieldAction::AccountData => {
            yield_aggregator::get_user_account_data(session).await?;
        }
        YieldAction::TotalDeposited => {
            yield_aggregator::get_total_deposited(session).await?;
        }
        YieldAction::PlayerDeposited { addresses } => {
            let players = players_or_sender(session, addresses)?;
            yield_aggregator::get_player_deposited(session, &players).await?;
        }
        YieldAction::Players => {
            yield_aggregator::get_total_players(session).await?;
        }
        YieldAction::IndexOf { addresses } => {
            let players = players_or_sender(session, addresses)?;
            yield_aggregator::get_index_of_player(session, &players).await?;
        }
        YieldAction::AddressAt { indices } => {
            yield_aggregator::get_address_at_index(session, &indices).await?;
        }
    }
    Ok(())
}

fn players_or_sender(session: &Session, addresses: Vec<Address>) -> Result<Vec<Address>> {
    if addresses.is_empty() {
        Ok(vec![session.sender()?])
    } else {
        Ok(addresses)
    }
}
