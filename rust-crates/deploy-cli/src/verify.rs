use crate::{
    artifacts::{
        BuildMetadata,
        ContractArtifact,
        OptimizerSettings,
    },
    config::VerificationConfig,
    session::{
        Session,
        parse_address,
    },
};
use alloy::primitives::Address;
use anyhow::{
    Context,
    Result,
    bail,
};
use deployments::DeploymentRecord;
use serde::Deserialize;
use serde_json::{
    Map,
    Value,
    json,
};
use std::{
    fs,
    path::Path,
    time::Duration,
};

const STATUS_POLL_ATTEMPTS: u32 = 10;
const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Source as the explorer receives it: a flattened file, or a solc
/// standard-JSON input naming the contract as `path:Name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSubmission {
    SingleFile(String),
    StandardJson { input: Value, contract: String },
}

/// Source submission for an Etherscan-compatible explorer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationRequest {
    pub address: Address,
    pub contract_name: String,
    pub source: SourceSubmission,
    pub compiler_version: String,
    pub optimization_used: bool,
    pub runs: u32,
    pub evm_version: Option<String>,
    pub constructor_args: Option<String>,
}

impl VerificationRequest {
    /// Flat artifacts publish their embedded source. Forge artifacts publish
    /// a standard-JSON input whose missing source content is read relative
    /// to `source_root`.
    pub fn from_artifact(
        artifact: &ContractArtifact,
        address: Address,
        constructor_args: Option<&str>,
        source_root: &Path,
    ) -> Result<Self> {
        let source = match (&artifact.source, &artifact.metadata) {
            (Some(source), _) => SourceSubmission::SingleFile(source.clone()),
            (None, Some(metadata)) => standard_json_input(artifact, metadata, source_root)?,
            (None, None) => bail!(
                "artifact {} has no source to publish",
                artifact.path.display()
            ),
        };
        let compiler = artifact.compiler_settings().with_context(|| {
            format!("artifact {} has no compiler settings", artifact.path.display())
        })?;
        let optimizer = compiler.optimizer.unwrap_or(OptimizerSettings {
            enabled: false,
            runs: 200,
        });

        Ok(Self {
            address,
            contract_name: artifact.name().to_string(),
            source,
            compiler_version: format!("v{}", compiler.version.trim_start_matches('v')),
            optimization_used: optimizer.enabled,
            runs: optimizer.runs,
            evm_version: compiler.evm_version,
            constructor_args: constructor_args
                .map(|args| args.trim_start_matches("0x").to_string())
                .filter(|args| !args.is_empty()),
        })
    }

    pub fn form(&self, api_key: &str) -> Vec<(&'static str, String)> {
        let optimization_used = if self.optimization_used { "1" } else { "0" };
        let (source_code, code_format, contract_name) = match &self.source {
            SourceSubmission::SingleFile(source) => (
                source.clone(),
                "solidity-single-file",
                self.contract_name.clone(),
            ),
            SourceSubmission::StandardJson { input, contract } => (
                input.to_string(),
                "solidity-standard-json-input",
                contract.clone(),
            ),
        };
        let mut form = vec![
            ("apikey", api_key.to_string()),
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("contractaddress", self.address.to_string()),
            ("sourceCode", source_code),
            ("codeformat", code_format.to_string()),
            ("contractname", contract_name),
            ("compilerversion", self.compiler_version.clone()),
            ("optimizationUsed", optimization_used.to_string()),
            ("runs", self.runs.to_string()),
        ];
        // The explorer API spells this field "Arguements".
        if let Some(args) = &self.constructor_args {
            form.push(("constructorArguements", args.clone()));
        }
        if let Some(evm_version) = &self.evm_version {
            form.push(("evmversion", evm_version.clone()));
        }
        form
    }
}

fn standard_json_input(
    artifact: &ContractArtifact,
    metadata: &BuildMetadata,
    source_root: &Path,
) -> Result<SourceSubmission> {
    let (target_path, target_name) = metadata.compilation_target().with_context(|| {
        format!("artifact {} has no compilation target", artifact.path.display())
    })?;

    let mut sources = Map::new();
    for (path, source) in &metadata.sources {
        let content = match &source.content {
            Some(content) => content.clone(),
            None => {
                let file = source_root.join(path);
                fs::read_to_string(&file)
                    .with_context(|| format!("reading source {}", file.display()))?
            }
        };
        sources.insert(path.clone(), json!({ "content": content }));
    }

    let mut settings = metadata.settings.clone();
    settings.remove("compilationTarget");
    if let Some(Value::Object(libraries)) = settings.remove("libraries") {
        settings.insert("libraries".to_string(), Value::Object(nest_libraries(libraries)));
    }

    Ok(SourceSubmission::StandardJson {
        input: json!({
            "language": metadata.language,
            "sources": sources,
            "settings": settings,
        }),
        contract: format!("{target_path}:{target_name}"),
    })
}

/// Metadata keys libraries as `path:Name`; compiler input nests them by path.
fn nest_libraries(flat: Map<String, Value>) -> Map<String, Value> {
    let mut nested = Map::new();
    for (key, address) in flat {
        let (path, name) = key.rsplit_once(':').unwrap_or(("", key.as_str()));
        if let Value::Object(by_name) = nested
            .entry(path.to_string())
            .or_insert_with(|| Value::Object(Map::new()))
        {
            by_name.insert(name.to_string(), address);
        }
    }
    nested
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationStatus {
    Pending,
    Verified,
    AlreadyVerified,
    Failed(String),
}

impl VerificationStatus {
    pub fn from_result(result: &str) -> Self {
        let lowered = result.to_ascii_lowercase();
        if lowered.contains("already verified") {
            VerificationStatus::AlreadyVerified
        } else if lowered.starts_with("pass") {
            VerificationStatus::Verified
        } else if lowered.contains("pending") || lowered.contains("in queue") {
            VerificationStatus::Pending
        } else {
            VerificationStatus::Failed(result.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: String,
}

pub struct Explorer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    chain_id: u64,
}

impl Explorer {
    pub fn from_config(config: &VerificationConfig, chain_id: u64) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).with_context(|| {
            format!("{} must be set to publish source", config.api_key_env)
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key,
            chain_id,
        })
    }

    pub async fn publish_source(&self, request: &VerificationRequest) -> Result<()> {
        println!(
            "Publishing source for {} at {}...",
            request.contract_name, request.address
        );
        let chain_id = self.chain_id.to_string();
        let response: ExplorerResponse = self
            .client
            .post(&self.api_url)
            .query(&[("chainid", chain_id.as_str())])
            .form(&request.form(&self.api_key))
            .send()
            .await
            .context("submitting source verification")?
            .error_for_status()
            .context("explorer returned an error status")?
            .json()
            .await
            .context("decoding explorer response")?;

        if response.status != "1" {
            return match VerificationStatus::from_result(&response.result) {
                VerificationStatus::AlreadyVerified => {
                    println!("Contract source already verified");
                    Ok(())
                }
                _ => bail!(
                    "explorer rejected verification: {} ({})",
                    response.result,
                    response.message
                ),
            };
        }

        let guid = response.result;
        for attempt in 1..=STATUS_POLL_ATTEMPTS {
            tokio::time::sleep(STATUS_POLL_INTERVAL).await;
            let status = self.check_status(&guid).await?;
            tracing::debug!("verification check {attempt}: {status:?}");
            match status {
                VerificationStatus::Pending => continue,
                VerificationStatus::Verified | VerificationStatus::AlreadyVerified => {
                    println!("Contract source verified!");
                    return Ok(());
                }
                VerificationStatus::Failed(reason) => {
                    bail!("verification failed: {reason}")
                }
            }
        }
        bail!("verification still pending after {STATUS_POLL_ATTEMPTS} checks (guid {guid})")
    }

    async fn check_status(&self, guid: &str) -> Result<VerificationStatus> {
        let chain_id = self.chain_id.to_string();
        let response: ExplorerResponse = self
            .client
            .get(&self.api_url)
            .query(&[
                ("chainid", chain_id.as_str()),
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("querying verification status")?
            .json()
            .await
            .context("decoding verification status")?;
        Ok(VerificationStatus::from_result(&response.result))
    }
}

/// Publishes the source of a recorded deployment.
pub async fn verify_deployment(
    session: &Session,
    config: &VerificationConfig,
    artifact: &ContractArtifact,
    record: &DeploymentRecord,
) -> Result<()> {
    if session.network.kind.is_local() {
        bail!(
            "cannot publish source for local network '{}'",
            session.network.name
        );
    }
    let address = parse_address(&record.address)?;
    let request = VerificationRequest::from_artifact(
        artifact,
        address,
        record.constructor_args.as_deref(),
        &config.source_root,
    )?;
    Explorer::from_config(config, session.chain_id)?
        .publish_source(&request)
        .await
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::artifacts::{
        Bytecode,
        CompilerSettings,
    };
    use alloy::primitives::address;
    use std::path::PathBuf;

    fn artifact() -> ContractArtifact {
        ContractArtifact {
            contract_name: Some("RaffleV32".to_string()),
            abi: serde_json::json!([]),
            bytecode: Bytecode::Hex("0x6080".to_string()),
            source: Some("contract RaffleV32 {}".to_string()),
            compiler: Some(CompilerSettings {
                version: "0.8.7+commit.e28d00a7".to_string(),
                optimizer: Some(OptimizerSettings {
                    enabled: true,
                    runs: 200,
                }),
                evm_version: None,
            }),
            metadata: None,
            path: PathBuf::from("build/contracts/RaffleV32.json"),
        }
    }

    #[test]
    fn form__carries_compiler_and_stripped_constructor_args() {
        // given
        let address = address!("8103B0A8A00be2DDC778e6e7eaa21791Cd364625");
        let request =
            VerificationRequest::from_artifact(&artifact(), address, Some("0x00ab"), Path::new("."))
                .unwrap();

        // when
        let form = request.form("KEY");

        // then
        let field = |name: &str| {
            form.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.clone())
        };
        assert_eq!(field("compilerversion").unwrap(), "v0.8.7+commit.e28d00a7");
        assert_eq!(field("optimizationUsed").unwrap(), "1");
        assert_eq!(field("constructorArguements").unwrap(), "00ab");
        assert_eq!(field("apikey").unwrap(), "KEY");
        assert!(field("evmversion").is_none());
    }

    #[test]
    fn from_artifact__requires_source() {
        let mut artifact = artifact();
        artifact.source = None;

        let result =
            VerificationRequest::from_artifact(&artifact, Address::ZERO, None, Path::new("."));

        assert!(result.is_err());
    }

    const FORGE_ARTIFACT: &str = r#"{
        "abi": [],
        "bytecode": { "object": "0x6080" },
        "metadata": {
            "compiler": { "version": "0.8.7+commit.e28d00a7" },
            "language": "Solidity",
            "settings": {
                "compilationTarget": { "contracts/RaffleV32.sol": "RaffleV32" },
                "evmVersion": "london",
                "libraries": { "contracts/lib/Odds.sol:Odds": "0x00000000000000000000000000000000000000aa" },
                "optimizer": { "enabled": true, "runs": 200 },
                "remappings": ["@chainlink/=lib/chainlink/"]
            },
            "sources": {
                "contracts/RaffleV32.sol": { "keccak256": "0x01", "license": "MIT" },
                "lib/chainlink/VRFConsumerBaseV2.sol": { "keccak256": "0x02", "content": "abstract contract VRFConsumerBaseV2 {}" }
            }
        }
    }"#;

    fn forge_project() -> (tempfile::TempDir, ContractArtifact) {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out").join("RaffleV32.sol");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("RaffleV32.json"), FORGE_ARTIFACT).unwrap();
        let artifact = crate::artifacts::load(&dir.path().join("out"), "RaffleV32").unwrap();
        (dir, artifact)
    }

    #[test]
    fn from_artifact__builds_standard_json_input_for_forge_artifact() {
        // given
        let (dir, artifact) = forge_project();
        std::fs::create_dir_all(dir.path().join("contracts")).unwrap();
        std::fs::write(
            dir.path().join("contracts/RaffleV32.sol"),
            "contract RaffleV32 {}",
        )
        .unwrap();

        // when
        let request =
            VerificationRequest::from_artifact(&artifact, Address::ZERO, None, dir.path())
                .unwrap();

        // then
        assert_eq!(request.compiler_version, "v0.8.7+commit.e28d00a7");
        assert!(request.optimization_used);
        assert_eq!(request.evm_version.as_deref(), Some("london"));
        let SourceSubmission::StandardJson { input, contract } = &request.source else {
            panic!("expected standard-json input, got {:?}", request.source);
        };
        assert_eq!(contract, "contracts/RaffleV32.sol:RaffleV32");
        assert_eq!(
            input["sources"]["contracts/RaffleV32.sol"]["content"],
            "contract RaffleV32 {}"
        );
        assert_eq!(
            input["sources"]["lib/chainlink/VRFConsumerBaseV2.sol"]["content"],
            "abstract contract VRFConsumerBaseV2 {}"
        );
        assert!(input["settings"].get("compilationTarget").is_none());
        assert_eq!(
            input["settings"]["libraries"]["contracts/lib/Odds.sol"]["Odds"],
            "0x00000000000000000000000000000000000000aa"
        );

        let form = request.form("KEY");
        let field = |name: &str| {
            form.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.clone())
        };
        assert_eq!(field("codeformat").unwrap(), "solidity-standard-json-input");
        assert_eq!(
            field("contractname").unwrap(),
            "contracts/RaffleV32.sol:RaffleV32"
        );
        let submitted: Value = serde_json::from_str(&field("sourceCode").unwrap()).unwrap();
        assert_eq!(submitted["language"], "Solidity");
    }

    #[test]
    fn from_artifact__names_missing_forge_source_file() {
        let (dir, artifact) = forge_project();

        let err = VerificationRequest::from_artifact(&artifact, Address::ZERO, None, dir.path())
            .unwrap_err();

        assert!(err.to_string().contains("contracts/RaffleV32.sol"));
    }

    #[test]
    fn from_result__classifies_explorer_messages() {
        assert_eq!(
            VerificationStatus::from_result("Pending in queue"),
            VerificationStatus::Pending
        );
        assert_eq!(
            VerificationStatus::from_result("Pass - Verified"),
            VerificationStatus::Verified
        );
        assert_eq!(
            VerificationStatus::from_result("Contract source code already verified"),
            VerificationStatus::AlreadyVerified
        );
        assert_eq!(
            VerificationStatus::from_result("Fail - Unable to verify"),
            VerificationStatus::Failed("Fail - Unable to verify".to_string())
        );
    }
}
