use anyhow::{
    Context,
    Result,
    ensure,
};
use clap::{
    Parser,
    Subcommand,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    process::Command,
};

const ARTIFACTS_DIR: &str = "build/contracts";

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Raffle helper tasks (compile contracts, clippy, tests)",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the Solidity sources into build/contracts with forge
    Compile {
        /// Directory holding the contract sources
        #[arg(long, default_value = "contracts")]
        contracts: PathBuf,
    },
    /// Run clippy for the entire workspace with warnings-as-errors
    Clippy,
    /// Run the workspace tests
    Test {
        /// Also run the tests that spawn a local anvil node
        #[arg(long)]
        anvil: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = repo_root()?;

    match cli.command {
        Commands::Compile { contracts } => compile_contracts(&root, &contracts)?,
        Commands::Clippy => run_clippy(&root)?,
        Commands::Test { anvil } => run_tests(&root, anvil)?,
    }

    Ok(())
}

fn repo_root() -> Result<PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .context("xtask has no parent directory")
}

fn compile_contracts(root: &Path, contracts: &Path) -> Result<()> {
    let sources = root.join(contracts);
    ensure!(
        sources.exists(),
        "missing contract sources at {}",
        sources.display()
    );
    let mut cmd = Command::new("forge");
    cmd.arg("build")
        .arg("--contracts")
        .arg(&sources)
        .arg("--out")
        .arg(root.join(ARTIFACTS_DIR))
        .current_dir(root);
    run_command(cmd, "forge build")
}

fn run_clippy(root: &Path) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("clippy")
        .arg("--workspace")
        .arg("--all-targets")
        .arg("--all-features")
        .arg("--")
        .arg("-D")
        .arg("warnings")
        .current_dir(root);
    run_command(cmd, "cargo clippy")
}

fn run_tests(root: &Path, anvil: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("test").arg("--workspace").current_dir(root);
    if anvil {
        cmd.arg("--features").arg("deploy-cli/anvil-tests");
    }
    run_command(cmd, "cargo test")
}

fn run_command(mut cmd: Command, label: &str) -> Result<()> {
    println!("Running: {}", label);
    let status = cmd
        .status()
        .with_context(|| format!("failed to run {label}"))?;
    ensure!(status.success(), "{label} failed with status {status}");
    Ok(())
}
