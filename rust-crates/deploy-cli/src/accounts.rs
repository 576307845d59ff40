use crate::{
    config::WalletsConfig,
    network::NetworkKind,
};
use alloy::signers::local::{
    MnemonicBuilder,
    PrivateKeySigner,
    coins_bip39::English,
};
use anyhow::{
    Context,
    Result,
    anyhow,
};
use eth_keystore::decrypt_key;
use rpassword::prompt_password;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

/// Mnemonic behind the prefunded accounts of anvil, hardhat and ganache
/// in deterministic mode.
pub const DEFAULT_DEV_MNEMONIC: &str =
    "test test test test test test test test test test test junk";

/// Explicit account choices passed on the command line.
#[derive(Clone, Debug, Default)]
pub struct AccountSelector {
    pub index: Option<u32>,
    pub id: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AccountSource {
    Index(u32),
    Keystore(String),
    DevDefault,
    ConfiguredKey,
}

/// Priority chain: explicit index, named keystore, local default, configured key.
pub fn account_source(selector: &AccountSelector, kind: NetworkKind) -> AccountSource {
    if let Some(index) = selector.index {
        return AccountSource::Index(index);
    }
    if let Some(id) = selector.id.as_ref() {
        return AccountSource::Keystore(id.clone());
    }
    if kind.uses_dev_accounts() {
        return AccountSource::DevDefault;
    }
    AccountSource::ConfiguredKey
}

pub fn resolve_account(
    selector: &AccountSelector,
    kind: NetworkKind,
    wallets: &WalletsConfig,
    keystore_dir: &Path,
) -> Result<PrivateKeySigner> {
    let source = account_source(selector, kind);
    tracing::debug!("resolving signing account from {source:?}");
    match source {
        AccountSource::Index(index) => dev_account(dev_mnemonic(wallets), index),
        AccountSource::Keystore(id) => {
            let descriptor = find_keystore(keystore_dir, &id)?;
            unlock_keystore(&descriptor)
        }
        AccountSource::DevDefault => dev_account(dev_mnemonic(wallets), 0),
        AccountSource::ConfiguredKey => configured_key(wallets),
    }
}

fn dev_mnemonic(wallets: &WalletsConfig) -> &str {
    wallets.mnemonic.as_deref().unwrap_or(DEFAULT_DEV_MNEMONIC)
}

pub fn dev_account(mnemonic: &str, index: u32) -> Result<PrivateKeySigner> {
    MnemonicBuilder::<English>::default()
        .phrase(mnemonic)
        .index(index)
        .with_context(|| format!("invalid derivation index {index}"))?
        .build()
        .context("deriving account from mnemonic")
}

pub fn configured_key(wallets: &WalletsConfig) -> Result<PrivateKeySigner> {
    let raw = wallets
        .from_key
        .as_deref()
        .filter(|key| !key.trim().is_empty() && !key.contains("${"))
        .ok_or_else(|| {
            anyhow!("wallets.from_key is not set (or references an unset environment variable)")
        })?;
    parse_private_key(raw)
}

pub fn parse_private_key(raw: &str) -> Result<PrivateKeySigner> {
    let cleaned = raw.trim();
    let cleaned = cleaned.strip_prefix("0x").unwrap_or(cleaned);
    let bytes = hex::decode(cleaned).context("decoding private key hex")?;
    if bytes.len() != 32 {
        anyhow::bail!("private key must be 32 bytes (64 hex chars)");
    }
    PrivateKeySigner::from_slice(&bytes).map_err(|e| anyhow!("invalid private key: {e}"))
}

#[derive(Clone, Debug)]
pub struct KeystoreDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl KeystoreDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

pub fn default_keystore_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".raffle-deploy").join("accounts"))
}

pub fn resolve_keystore_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_keystore_dir(),
    }
}

pub fn list_keystores(dir: &Path) -> Result<Vec<KeystoreDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut keystores = Vec::new();
    for entry in fs::read_dir(dir).context("Failed to read keystore directory")? {
        let entry = entry.context("Failed to read keystore entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| anyhow!("Invalid keystore filename {:?}", path))?
            .to_owned();
        keystores.push(KeystoreDescriptor::new(name, path));
    }
    keystores.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(keystores)
}

pub fn find_keystore(dir: &Path, id: &str) -> Result<KeystoreDescriptor> {
    let keystores = list_keystores(dir)?;
    keystores
        .into_iter()
        .find(|k| k.name == id)
        .ok_or_else(|| anyhow!("Account '{id}' not found in {}", dir.display()))
}

pub fn unlock_keystore(descriptor: &KeystoreDescriptor) -> Result<PrivateKeySigner> {
    let prompt = format!("Enter password for account '{}': ", descriptor.name);
    let password = prompt_password(prompt).context("Failed to read account password")?;
    unlock_keystore_with_password(descriptor, &password)
}

pub fn unlock_keystore_with_password(
    descriptor: &KeystoreDescriptor,
    password: &str,
) -> Result<PrivateKeySigner> {
    let secret = decrypt_key(&descriptor.path, password.as_bytes()).map_err(|_| {
        anyhow!("Invalid password for account '{}'", descriptor.name)
    })?;

    if secret.len() == 32 {
        if let Ok(signer) = PrivateKeySigner::from_slice(&secret) {
            return Ok(signer);
        }
    }

    if let Ok(mnemonic) = std::str::from_utf8(&secret) {
        let word_count = mnemonic.split_whitespace().count();
        if word_count >= 12 {
            return dev_account(mnemonic, 0);
        }
    }

    Err(anyhow!(
        "Account '{}' contained unsupported key material",
        descriptor.name
    ))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use alloy::primitives::address;

    const SECOND_DEV_KEY: &str =
        "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    #[test]
    fn account_source__prefers_explicit_index_even_when_zero() {
        let selector = AccountSelector {
            index: Some(0),
            id: Some("deployer".to_string()),
        };

        let source = account_source(&selector, NetworkKind::Live);

        assert_eq!(source, AccountSource::Index(0));
    }

    #[test]
    fn account_source__uses_keystore_before_network_default() {
        let selector = AccountSelector {
            index: None,
            id: Some("deployer".to_string()),
        };

        let source = account_source(&selector, NetworkKind::Local);

        assert_eq!(source, AccountSource::Keystore("deployer".to_string()));
    }

    #[test]
    fn account_source__falls_back_by_network_kind() {
        let selector = AccountSelector::default();

        assert_eq!(
            account_source(&selector, NetworkKind::Local),
            AccountSource::DevDefault
        );
        assert_eq!(
            account_source(&selector, NetworkKind::Forked),
            AccountSource::DevDefault
        );
        assert_eq!(
            account_source(&selector, NetworkKind::Live),
            AccountSource::ConfiguredKey
        );
    }

    #[test]
    fn resolve_account__local_default_is_first_dev_account() {
        let dir = tempfile::tempdir().unwrap();

        let signer = resolve_account(
            &AccountSelector::default(),
            NetworkKind::Local,
            &WalletsConfig::default(),
            dir.path(),
        )
        .unwrap();

        assert_eq!(
            signer.address(),
            address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );
    }

    #[test]
    fn resolve_account__index_derives_from_dev_mnemonic() {
        let dir = tempfile::tempdir().unwrap();
        let selector = AccountSelector {
            index: Some(1),
            id: None,
        };

        let signer = resolve_account(
            &selector,
            NetworkKind::Live,
            &WalletsConfig::default(),
            dir.path(),
        )
        .unwrap();

        assert_eq!(
            signer.address(),
            address!("70997970C51812dc3A010C7d01b50e0d17dc79C8")
        );
    }

    #[test]
    fn resolve_account__live_network_uses_configured_key() {
        let dir = tempfile::tempdir().unwrap();
        let wallets = WalletsConfig {
            from_key: Some(SECOND_DEV_KEY.to_string()),
            mnemonic: None,
        };

        let signer = resolve_account(
            &AccountSelector::default(),
            NetworkKind::Live,
            &wallets,
            dir.path(),
        )
        .unwrap();

        assert_eq!(
            signer.address(),
            address!("70997970C51812dc3A010C7d01b50e0d17dc79C8")
        );
    }

    #[test]
    fn configured_key__rejects_unresolved_placeholder() {
        let wallets = WalletsConfig {
            from_key: Some("${PRIVATE_KEY}".to_string()),
            mnemonic: None,
        };

        let result = configured_key(&wallets);

        assert!(result.is_err());
    }

    #[test]
    fn unlock_keystore_with_password__decrypts_named_account() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let key = hex::decode(SECOND_DEV_KEY.trim_start_matches("0x")).unwrap();
        eth_keystore::encrypt_key(
            dir.path(),
            &mut rand::thread_rng(),
            &key,
            "hunter2",
            Some("deployer.json"),
        )
        .unwrap();

        // when
        let descriptor = find_keystore(dir.path(), "deployer").unwrap();
        let signer = unlock_keystore_with_password(&descriptor, "hunter2").unwrap();
        let wrong = unlock_keystore_with_password(&descriptor, "wrong");

        // then
        assert_eq!(
            signer.address(),
            address!("70997970C51812dc3A010C7d01b50e0d17dc79C8")
        );
        assert!(wrong.is_err());
    }

    #[test]
    fn find_keystore__reports_missing_account() {
        let dir = tempfile::tempdir().unwrap();

        let err = find_keystore(dir.path(), "nobody").unwrap_err();

        assert!(err.to_string().starts_with("Account 'nobody' not found"));
    }
}
