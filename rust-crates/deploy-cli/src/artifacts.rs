use alloy::primitives::Bytes;
use anyhow::{
    Context,
    Result,
    anyhow,
    ensure,
};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{
        Path,
        PathBuf,
    },
};

/// Compiled contract as written by the build tool: either the flat
/// `<dir>/<Name>.json` layout or the `<dir>/<Name>.sol/<Name>.json` layout.
#[derive(Clone, Debug, Deserialize)]
pub struct ContractArtifact {
    #[serde(default, alias = "contractName")]
    pub contract_name: Option<String>,
    pub abi: serde_json::Value,
    pub bytecode: Bytecode,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub compiler: Option<CompilerSettings>,
    #[serde(default)]
    pub metadata: Option<BuildMetadata>,
    #[serde(skip)]
    pub path: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Bytecode {
    Hex(String),
    Object { object: String },
}

#[derive(Clone, Debug, Deserialize)]
pub struct CompilerSettings {
    pub version: String,
    #[serde(default)]
    pub optimizer: Option<OptimizerSettings>,
    #[serde(default, alias = "evmVersion")]
    pub evm_version: Option<String>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct OptimizerSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_runs")]
    pub runs: u32,
}

fn default_runs() -> u32 {
    200
}

/// The solc metadata document embedded by forge. Sources usually carry only
/// hashes, so their content is read from disk when publishing.
#[derive(Clone, Debug, Deserialize)]
pub struct BuildMetadata {
    pub compiler: MetadataCompiler,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub sources: BTreeMap<String, MetadataSource>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MetadataCompiler {
    pub version: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct MetadataSource {
    #[serde(default)]
    pub content: Option<String>,
}

fn default_language() -> String {
    "Solidity".to_string()
}

impl BuildMetadata {
    /// Source path and contract name from `settings.compilationTarget`.
    pub fn compilation_target(&self) -> Option<(&str, &str)> {
        let (path, name) = self
            .settings
            .get("compilationTarget")?
            .as_object()?
            .iter()
            .next()?;
        Some((path.as_str(), name.as_str()?))
    }
}

impl ContractArtifact {
    pub fn name(&self) -> &str {
        self.contract_name.as_deref().unwrap_or_else(|| {
            self.path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default()
        })
    }

    /// Compiler settings from the flat layout, or else from forge metadata.
    pub fn compiler_settings(&self) -> Option<CompilerSettings> {
        if let Some(compiler) = &self.compiler {
            return Some(compiler.clone());
        }
        let metadata = self.metadata.as_ref()?;
        let settings = &metadata.settings;
        Some(CompilerSettings {
            version: metadata.compiler.version.clone(),
            optimizer: settings
                .get("optimizer")
                .and_then(|optimizer| serde_json::from_value(optimizer.clone()).ok()),
            evm_version: settings
                .get("evmVersion")
                .and_then(|version| version.as_str())
                .map(str::to_string),
        })
    }

    /// Creation bytecode. Unlinked library placeholders are rejected.
    pub fn creation_code(&self) -> Result<Bytes> {
        let raw = match &self.bytecode {
            Bytecode::Hex(raw) => raw,
            Bytecode::Object { object } => object,
        };
        let cleaned = raw.trim().trim_start_matches("0x");
        ensure!(
            !cleaned.is_empty(),
            "artifact {} has no bytecode (abstract contract or interface?)",
            self.path.display()
        );
        ensure!(
            !cleaned.contains("__"),
            "artifact {} has unlinked library references",
            self.path.display()
        );
        let bytes = hex::decode(cleaned)
            .with_context(|| format!("decoding bytecode in {}", self.path.display()))?;
        Ok(Bytes::from(bytes))
    }
}

pub fn artifact_path(dir: &Path, name: &str) -> Result<PathBuf> {
    let candidates = [
        dir.join(format!("{name}.json")),
        dir.join(format!("{name}.sol")).join(format!("{name}.json")),
    ];
    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .ok_or_else(|| anyhow!("Contract artifact not found. Tried {:?}", candidates))
}

pub fn load(dir: &Path, name: &str) -> Result<ContractArtifact> {
    let path = artifact_path(dir, name)?;
    let data = fs::read(&path)
        .with_context(|| format!("Failed to read artifact {}", path.display()))?;
    let mut artifact: ContractArtifact = serde_json::from_slice(&data)
        .with_context(|| format!("Failed to parse artifact {}", path.display()))?;
    artifact.path = path;
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn load__reads_flat_artifact_with_compiler_settings() {
        // given
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("RaffleV32.json"),
            r#"{
                "contractName": "RaffleV32",
                "abi": [],
                "bytecode": "0x6080",
                "source": "pragma solidity ^0.8.7;",
                "compiler": {
                    "version": "0.8.7+commit.e28d00a7",
                    "optimizer": { "enabled": true, "runs": 200 },
                    "evm_version": "london"
                }
            }"#,
        )
        .unwrap();

        // when
        let artifact = load(dir.path(), "RaffleV32").unwrap();

        // then
        assert_eq!(artifact.name(), "RaffleV32");
        assert_eq!(artifact.creation_code().unwrap(), Bytes::from(vec![0x60, 0x80]));
        let compiler = artifact.compiler.unwrap();
        assert_eq!(compiler.version, "0.8.7+commit.e28d00a7");
        assert_eq!(compiler.optimizer.unwrap().runs, 200);
    }

    #[test]
    fn load__reads_nested_object_bytecode_layout() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("VRFCoordinatorV2Mock.sol");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            nested.join("VRFCoordinatorV2Mock.json"),
            r#"{ "abi": [], "bytecode": { "object": "0x00ff" } }"#,
        )
        .unwrap();

        let artifact = load(dir.path(), "VRFCoordinatorV2Mock").unwrap();

        assert_eq!(artifact.name(), "VRFCoordinatorV2Mock");
        assert_eq!(artifact.creation_code().unwrap(), Bytes::from(vec![0x00, 0xff]));
        assert!(artifact.compiler.is_none());
    }

    #[test]
    fn load__reads_forge_metadata_for_compiler_settings() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("RaffleV32.sol");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            nested.join("RaffleV32.json"),
            r#"{
                "abi": [],
                "bytecode": { "object": "0x6080" },
                "metadata": {
                    "compiler": { "version": "0.8.7+commit.e28d00a7" },
                    "language": "Solidity",
                    "settings": {
                        "compilationTarget": { "contracts/RaffleV32.sol": "RaffleV32" },
                        "optimizer": { "enabled": true, "runs": 1000 },
                        "evmVersion": "london"
                    },
                    "sources": {
                        "contracts/RaffleV32.sol": { "keccak256": "0x01", "license": "MIT" }
                    }
                }
            }"#,
        )
        .unwrap();

        // when
        let artifact = load(dir.path(), "RaffleV32").unwrap();

        // then
        assert!(artifact.compiler.is_none());
        let compiler = artifact.compiler_settings().unwrap();
        assert_eq!(compiler.version, "0.8.7+commit.e28d00a7");
        assert_eq!(compiler.optimizer.unwrap().runs, 1000);
        assert_eq!(compiler.evm_version.as_deref(), Some("london"));
        let metadata = artifact.metadata.unwrap();
        assert_eq!(
            metadata.compilation_target(),
            Some(("contracts/RaffleV32.sol", "RaffleV32"))
        );
        assert!(metadata.sources["contracts/RaffleV32.sol"].content.is_none());
    }

    #[test]
    fn creation_code__rejects_empty_and_unlinked_bytecode() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Iface.json"), r#"{ "abi": [], "bytecode": "0x" }"#)
            .unwrap();
        fs::write(
            dir.path().join("Linked.json"),
            r#"{ "abi": [], "bytecode": "0x60__$abc$__" }"#,
        )
        .unwrap();

        assert!(load(dir.path(), "Iface").unwrap().creation_code().is_err());
        assert!(load(dir.path(), "Linked").unwrap().creation_code().is_err());
    }

    #[test]
    fn artifact_path__lists_candidates_when_missing() {
        let dir = tempfile::tempdir().unwrap();

        let err = artifact_path(dir.path(), "RaffleV32").unwrap_err();

        assert!(err.to_string().starts_with("Contract artifact not found"));
    }
}
