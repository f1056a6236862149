//! Persisted deployment records, keyed by network and logical name

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use alloy::{
    json_abi::JsonAbi,
    primitives::{Address, B256},
};
use serde::{Deserialize, Serialize};

use crate::{constants::JSON_EXTENSION, errors::DeployError};

/// The result of a deployment step, as persisted for later runs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// The address callers use: the proxy, for upgradeable deployments
    pub address: Address,
    /// The implementation the proxy delegates to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<Address>,
    /// The admin contract allowed to upgrade the proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_admin: Option<Address>,
    /// The ABI of the implementation
    pub abi: JsonAbi,
    /// The hash of the transaction that created `address`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    /// The resolved implementation constructor arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// The initializer invoked through the proxy, with resolved arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute: Option<ExecuteRecord>,
    /// The keccak256 hash of the implementation creation code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_code_hash: Option<B256>,
}

/// A recorded initializer invocation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRecord {
    /// The method invoked
    pub method_name: String,
    /// The resolved arguments it was invoked with
    pub args: Vec<String>,
}

/// Storage for the deployment records of a single network
pub trait DeploymentStore {
    /// The record persisted under `name`, if any
    fn get(&self, name: &str) -> Result<Option<DeploymentRecord>, DeployError>;

    /// Persist `record` under `name`, replacing any previous record
    fn save(&mut self, name: &str, record: &DeploymentRecord) -> Result<(), DeployError>;

    /// Every persisted record, keyed by logical name
    fn all(&self) -> Result<BTreeMap<String, DeploymentRecord>, DeployError>;
}

// --------------
// | File Store |
// --------------

/// Records persisted as `<root>/<network>/<Name>.json`
#[derive(Clone, Debug)]
pub struct FileStore {
    /// The directory holding this network's records
    dir: PathBuf,
}

impl FileStore {
    /// The store of `network`'s records under `root`
    pub fn for_network(root: &Path, network: &str) -> Self {
        Self { dir: root.join(network) }
    }

    /// The file a record named `name` is persisted in
    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{JSON_EXTENSION}"))
    }
}

impl DeploymentStore for FileStore {
    fn get(&self, name: &str) -> Result<Option<DeploymentRecord>, DeployError> {
        let path = self.record_path(name);
        if !path.exists() {
            return Ok(None);
        }

        read_record(&path).map(Some)
    }

    fn save(&mut self, name: &str, record: &DeploymentRecord) -> Result<(), DeployError> {
        fs::create_dir_all(&self.dir).map_err(|e| DeployError::WriteDeployments(e.to_string()))?;

        let contents = serde_json::to_string_pretty(record)
            .map_err(|e| DeployError::WriteDeployments(e.to_string()))?;

        // Written beside the target and renamed into place, so readers never see a partial record
        let path = self.record_path(name);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, contents).map_err(|e| DeployError::WriteDeployments(e.to_string()))?;
        fs::rename(&tmp_path, &path).map_err(|e| DeployError::WriteDeployments(e.to_string()))
    }

    fn all(&self) -> Result<BTreeMap<String, DeploymentRecord>, DeployError> {
        let mut records = BTreeMap::new();
        if !self.dir.exists() {
            return Ok(records);
        }

        let entries =
            fs::read_dir(&self.dir).map_err(|e| DeployError::ReadDeployments(e.to_string()))?;
        for entry in entries {
            let path = entry.map_err(|e| DeployError::ReadDeployments(e.to_string()))?.path();
            if path.extension().is_some_and(|ext| ext == JSON_EXTENSION) {
                let Some(name) = path.file_stem().and_then(|s| s.to_str()) else { continue };
                records.insert(name.to_string(), read_record(&path)?);
            }
        }

        Ok(records)
    }
}

/// Read and parse a single record file
fn read_record(path: &Path) -> Result<DeploymentRecord, DeployError> {
    let contents =
        fs::read_to_string(path).map_err(|e| DeployError::ReadDeployments(e.to_string()))?;
    serde_json::from_str(&contents)
        .map_err(|e| DeployError::ReadDeployments(format!("{}: {e}", path.display())))
}

// -----------------
// | Memory Stores |
// -----------------

/// Records held in memory only
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    /// The records, keyed by logical name
    records: BTreeMap<String, DeploymentRecord>,
}

impl DeploymentStore for MemoryStore {
    fn get(&self, name: &str) -> Result<Option<DeploymentRecord>, DeployError> {
        Ok(self.records.get(name).cloned())
    }

    fn save(&mut self, name: &str, record: &DeploymentRecord) -> Result<(), DeployError> {
        self.records.insert(name.to_string(), record.clone());
        Ok(())
    }

    fn all(&self) -> Result<BTreeMap<String, DeploymentRecord>, DeployError> {
        Ok(self.records.clone())
    }
}

/// A store reading through to `base` but keeping every write in memory
pub struct OverlayStore<'a, S> {
    /// The persisted records
    base: &'a S,
    /// Records written during this run
    overlay: MemoryStore,
}

impl<'a, S: DeploymentStore> OverlayStore<'a, S> {
    /// Overlay `base`
    pub fn new(base: &'a S) -> Self {
        Self { base, overlay: MemoryStore::default() }
    }
}

impl<S: DeploymentStore> DeploymentStore for OverlayStore<'_, S> {
    fn get(&self, name: &str) -> Result<Option<DeploymentRecord>, DeployError> {
        match self.overlay.get(name)? {
            Some(record) => Ok(Some(record)),
            None => self.base.get(name),
        }
    }

    fn save(&mut self, name: &str, record: &DeploymentRecord) -> Result<(), DeployError> {
        self.overlay.save(name, record)
    }

    fn all(&self) -> Result<BTreeMap<String, DeploymentRecord>, DeployError> {
        let mut records = self.base.all()?;
        records.extend(self.overlay.all()?);
        Ok(records)
    }
}
