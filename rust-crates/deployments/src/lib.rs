use anyhow::{
    Context,
    Result,
    anyhow,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};
use std::{
    collections::BTreeMap,
    fs,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";
const ADDRESS_MAP_FILE: &str = "map.json";

/// One contract deployment on one network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployed_at: String,
    pub contract_name: String,
    pub address: String,
    pub network: String,
    pub network_url: String,
    pub chain_id: u64,
    pub bytecode_hash: String,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub deployer: Option<String>,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub constructor_args: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<u64>,
    #[serde(default)]
    pub vrf_coordinator: Option<String>,
}

impl DeploymentRecord {
    pub fn new(
        contract_name: impl Into<String>,
        address: impl Into<String>,
        network: impl Into<String>,
        network_url: impl Into<String>,
        chain_id: u64,
        bytecode_hash: impl Into<String>,
    ) -> Self {
        Self {
            deployed_at: Utc::now().to_rfc3339(),
            contract_name: contract_name.into(),
            address: address.into(),
            network: network.into(),
            network_url: network_url.into(),
            chain_id,
            bytecode_hash: bytecode_hash.into(),
            tx_hash: None,
            deployer: None,
            block_number: None,
            constructor_args: None,
            subscription_id: None,
            vrf_coordinator: None,
        }
    }
}

/// Append-only record file for a single network, rooted at
/// `<root>/<network>/deployments.json`.
#[derive(Debug)]
pub struct DeploymentStore {
    root: PathBuf,
    network: String,
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(root: impl AsRef<Path>, network: impl Into<String>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let network = network.into();
        let path = ensure_store(&root, &network)?;
        Ok(Self {
            root,
            network,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn load(&self) -> Result<Vec<DeploymentRecord>> {
        read_records(&self.path)
    }

    /// Appends the record and rebuilds the address map for every network under
    /// the same root.
    pub fn append(&self, record: DeploymentRecord) -> Result<()> {
        let mut records = self.load()?;
        tracing::debug!(
            contract = %record.contract_name,
            address = %record.address,
            network = %self.network,
            "recording deployment"
        );
        records.push(record);
        write_records(&self.path, &records)?;
        AddressMap::collect(&self.root)?.write(address_map_path(&self.root))
    }

    /// Most recent deployment of `contract_name`, if any.
    pub fn latest(&self, contract_name: &str) -> Result<Option<DeploymentRecord>> {
        let records = self.load()?;
        Ok(records
            .into_iter()
            .rev()
            .find(|record| record.contract_name == contract_name))
    }

    pub fn require_latest(&self, contract_name: &str) -> Result<DeploymentRecord> {
        self.latest(contract_name)?.ok_or_else(|| {
            anyhow!(
                "no {contract_name} deployments found for network '{}'",
                self.network
            )
        })
    }
}

/// Deployed addresses keyed by chain id then contract name, newest first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressMap(pub BTreeMap<String, BTreeMap<String, Vec<String>>>);

impl AddressMap {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a DeploymentRecord>) -> Self {
        let mut map: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();
        for record in records {
            let addresses = map
                .entry(record.chain_id.to_string())
                .or_default()
                .entry(record.contract_name.clone())
                .or_default();
            addresses.retain(|existing| existing != &record.address);
            addresses.insert(0, record.address.clone());
        }
        Self(map)
    }

    /// Reads every `<root>/<network>/deployments.json` and merges them
    /// oldest deployment first, so the newest address leads each list.
    /// Records with an unreadable timestamp count as the oldest.
    pub fn collect(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.exists() {
            return Ok(Self::default());
        }
        let mut networks = Vec::new();
        for entry in fs::read_dir(root).context("Failed to read deployments directory")? {
            let entry = entry.context("Failed to read deployments entry")?;
            let file = entry.path().join(DEPLOYMENTS_FILE);
            if file.is_file() {
                networks.push(file);
            }
        }
        networks.sort();

        let mut records = Vec::new();
        for file in networks {
            records.extend(read_records(&file)?);
        }
        records.sort_by_key(|record| DateTime::parse_from_rfc3339(&record.deployed_at).ok());
        Ok(Self::from_records(&records))
    }

    pub fn addresses(&self, chain_id: u64, contract_name: &str) -> &[String] {
        self.0
            .get(&chain_id.to_string())
            .and_then(|contracts| contracts.get(contract_name))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let json =
            serde_json::to_vec_pretty(self).context("Failed to serialize address map")?;
        fs::write(path.as_ref(), json).with_context(|| {
            format!("Failed to write address map to {}", path.as_ref().display())
        })
    }
}

pub fn address_map_path(root: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join(ADDRESS_MAP_FILE)
}

pub fn compute_bytecode_hash(bytes: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes.as_ref());
    format!("{:x}", hasher.finalize())
}

/// Creates the registry root, the per-network record file and an empty
/// address map when they do not exist yet.
pub fn ensure_structure(root: impl AsRef<Path>, network: &str) -> Result<()> {
    let root = root.as_ref();
    let _ = ensure_store(root, network)?;
    let map = address_map_path(root);
    if !map.exists() {
        AddressMap::default().write(&map)?;
    }
    Ok(())
}

fn ensure_store(root: &Path, network: &str) -> Result<PathBuf> {
    if network.is_empty() || network.contains(['/', '\\']) {
        return Err(anyhow!("invalid network name '{network}'"));
    }

    let env_dir = root.join(network);
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).with_context(|| {
            format!("Failed to create {} directory", env_dir.display())
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        fs::write(&file_path, b"[]").with_context(|| {
            format!(
                "Failed to initialize deployment record file for {network} at {:?}",
                file_path
            )
        })?;
    }

    Ok(file_path)
}

fn read_records(path: impl AsRef<Path>) -> Result<Vec<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).context("Failed to read deployment records")?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice::<Vec<DeploymentRecord>>(&data)
        .context("Failed to parse deployment records JSON")
}

fn write_records(path: impl AsRef<Path>, records: &[DeploymentRecord]) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)
        .context("Failed to serialize deployment records")?;
    fs::write(path.as_ref(), json).context("Failed to write deployment records")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    fn record(contract: &str, address: &str, network: &str, chain_id: u64) -> DeploymentRecord {
        DeploymentRecord::new(
            contract,
            address,
            network,
            "http://127.0.0.1:8545",
            chain_id,
            "00",
        )
    }

    #[test]
    fn new__creates_empty_store_file() {
        let dir = tempfile::tempdir().unwrap();

        let store = DeploymentStore::new(dir.path(), "development").unwrap();

        assert!(store.path().ends_with("development/deployments.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn new__rejects_network_names_with_separators() {
        let dir = tempfile::tempdir().unwrap();

        let result = DeploymentStore::new(dir.path(), "../escape");

        assert!(result.is_err());
    }

    #[test]
    fn latest__returns_last_record_for_contract() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let store = DeploymentStore::new(dir.path(), "sepolia").unwrap();
        store.append(record("RaffleV32", "0x01", "sepolia", 11155111)).unwrap();
        store
            .append(record("YieldAggregatorV32", "0x02", "sepolia", 11155111))
            .unwrap();
        store.append(record("RaffleV32", "0x03", "sepolia", 11155111)).unwrap();

        // when
        let raffle = store.latest("RaffleV32").unwrap().unwrap();
        let yield_aggregator = store.latest("YieldAggregatorV32").unwrap().unwrap();
        let missing = store.latest("VRFCoordinatorV2Mock").unwrap();

        // then
        assert_eq!(raffle.address, "0x03");
        assert_eq!(yield_aggregator.address, "0x02");
        assert!(missing.is_none());
    }

    #[test]
    fn require_latest__names_contract_and_network_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = DeploymentStore::new(dir.path(), "development").unwrap();

        let err = store.require_latest("RaffleV32").unwrap_err();

        assert_eq!(
            err.to_string(),
            "no RaffleV32 deployments found for network 'development'"
        );
    }

    #[test]
    fn append__rebuilds_address_map_newest_first_per_chain() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let sepolia = DeploymentStore::new(dir.path(), "sepolia").unwrap();
        let local = DeploymentStore::new(dir.path(), "development").unwrap();

        // when
        sepolia.append(record("RaffleV32", "0xaa", "sepolia", 11155111)).unwrap();
        sepolia.append(record("RaffleV32", "0xbb", "sepolia", 11155111)).unwrap();
        local.append(record("RaffleV32", "0xcc", "development", 31337)).unwrap();

        // then
        let data = fs::read(address_map_path(dir.path())).unwrap();
        let map: AddressMap = serde_json::from_slice(&data).unwrap();
        assert_eq!(map.addresses(11155111, "RaffleV32"), ["0xbb", "0xaa"]);
        assert_eq!(map.addresses(31337, "RaffleV32"), ["0xcc"]);
        assert!(map.addresses(1, "RaffleV32").is_empty());
    }

    #[test]
    fn collect__orders_shared_chain_by_deployment_time_not_network_name() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let mut older = record("RaffleV32", "0xold", "mainnet-fork-dev", 1);
        older.deployed_at = "2024-01-01T00:00:00+00:00".to_string();
        let mut newer = record("RaffleV32", "0xnew", "mainnet-fork", 1);
        newer.deployed_at = "2024-06-01T00:00:00+00:00".to_string();
        let dev = DeploymentStore::new(dir.path(), "mainnet-fork-dev").unwrap();
        let fork = DeploymentStore::new(dir.path(), "mainnet-fork").unwrap();
        write_records(dev.path(), &[older]).unwrap();
        write_records(fork.path(), &[newer]).unwrap();

        // when
        let map = AddressMap::collect(dir.path()).unwrap();

        // then
        assert_eq!(map.addresses(1, "RaffleV32"), ["0xnew", "0xold"]);
    }

    #[test]
    fn from_records__moves_redeployed_address_to_front() {
        let records = [
            record("RaffleV32", "0xaa", "sepolia", 5),
            record("RaffleV32", "0xbb", "sepolia", 5),
            record("RaffleV32", "0xaa", "sepolia", 5),
        ];

        let map = AddressMap::from_records(&records);

        assert_eq!(map.addresses(5, "RaffleV32"), ["0xaa", "0xbb"]);
    }

    #[test]
    fn ensure_structure__writes_empty_address_map() {
        let dir = tempfile::tempdir().unwrap();

        ensure_structure(dir.path(), "development").unwrap();

        let data = fs::read_to_string(address_map_path(dir.path())).unwrap();
        assert_eq!(data.trim(), "{}");
    }

    #[test]
    fn compute_bytecode_hash__is_sha256_hex() {
        let hash = compute_bytecode_hash(b"abc");

        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
