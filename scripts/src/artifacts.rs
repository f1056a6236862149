//! Loading compiled contract artifacts and encoding calls against their ABIs

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use alloy::{
    dyn_abi::{DynSolValue, JsonAbiExt, Specifier},
    json_abi::{Function, JsonAbi, Param},
    primitives::Bytes,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    constants::{DEBUG_ARTIFACT_SUFFIX, JSON_EXTENSION},
    errors::DeployError,
};

/// A compiled contract, in the Hardhat artifact format
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// The name of the contract
    pub contract_name: String,
    /// The contract's ABI
    pub abi: JsonAbi,
    /// The creation bytecode
    pub bytecode: Bytes,
    /// The runtime bytecode
    #[serde(default)]
    pub deployed_bytecode: Bytes,
}

impl Artifact {
    /// The creation code of the contract with its constructor arguments appended
    pub fn creation_code(&self, args: &[DynSolValue]) -> Result<Bytes, DeployError> {
        let encoded_args = match &self.abi.constructor {
            Some(constructor) => constructor.abi_encode_input(args).map_err(|e| {
                DeployError::CalldataConstruction(format!(
                    "{} constructor: {e}",
                    self.contract_name
                ))
            })?,
            None if args.is_empty() => Vec::new(),
            None => {
                return Err(DeployError::CalldataConstruction(format!(
                    "{} has no constructor but was given {} arguments",
                    self.contract_name,
                    args.len()
                )))
            },
        };

        Ok([self.bytecode.as_ref(), encoded_args.as_slice()].concat().into())
    }

    /// The constructor's parameters, empty when the contract declares no constructor
    pub fn constructor_params(&self) -> &[Param] {
        self.abi.constructor.as_ref().map(|c| c.inputs.as_slice()).unwrap_or_default()
    }

    /// The overload of `method` taking `arity` arguments
    pub fn function(&self, method: &str, arity: usize) -> Result<&Function, DeployError> {
        self.abi
            .function(method)
            .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == arity))
            .ok_or_else(|| {
                DeployError::CalldataConstruction(format!(
                    "{} has no `{method}` taking {arity} arguments",
                    self.contract_name
                ))
            })
    }

    /// Calldata invoking `method` with arguments given in textual form
    pub fn encode_call(&self, method: &str, args: &[String]) -> Result<Bytes, DeployError> {
        let function = self.function(method, args.len())?;
        let context = format!("{}.{method}", self.contract_name);
        let values = coerce_args(&context, &function.inputs, args)?;

        function
            .abi_encode_input(&values)
            .map(Bytes::from)
            .map_err(|e| DeployError::CalldataConstruction(format!("{context}: {e}")))
    }

    /// Constructor arguments given in textual form, coerced to the constructor's types
    pub fn constructor_args(&self, args: &[String]) -> Result<Vec<DynSolValue>, DeployError> {
        let context = format!("{} constructor", self.contract_name);
        coerce_args(&context, self.constructor_params(), args)
    }
}

/// Coerce textual arguments into ABI values of the given parameter types
pub fn coerce_args(
    context: &str,
    params: &[Param],
    args: &[String],
) -> Result<Vec<DynSolValue>, DeployError> {
    if params.len() != args.len() {
        return Err(DeployError::CalldataConstruction(format!(
            "{context} expects {} arguments, got {}",
            params.len(),
            args.len()
        )));
    }

    params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty = param.resolve().map_err(|e| {
                DeployError::CalldataConstruction(format!("{context}: type `{}`: {e}", param.ty))
            })?;

            ty.coerce_str(arg).map_err(|e| {
                DeployError::CalldataConstruction(format!(
                    "{context}: argument `{}` = `{arg}`: {e}",
                    param.name
                ))
            })
        })
        .collect()
}

/// Write the ABI of each contract to `<out_dir>/<Contract>.json`, returning the written paths
pub fn export_abis<'a, A: ArtifactSource>(
    source: &A,
    contracts: impl IntoIterator<Item = &'a str>,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, DeployError> {
    fs::create_dir_all(out_dir).map_err(|e| DeployError::AbiExport(e.to_string()))?;

    contracts
        .into_iter()
        .map(|contract| {
            let abi = source.artifact(contract)?.abi;
            let contents = serde_json::to_string_pretty(&abi)
                .map_err(|e| DeployError::AbiExport(e.to_string()))?;

            let path = out_dir.join(format!("{contract}.{JSON_EXTENSION}"));
            fs::write(&path, contents).map_err(|e| DeployError::AbiExport(e.to_string()))?;
            Ok(path)
        })
        .collect()
}

// -----------
// | Sources |
// -----------

/// A source of compiled artifacts, looked up by contract name
pub trait ArtifactSource {
    /// The artifact of `contract`
    fn artifact(&self, contract: &str) -> Result<Artifact, DeployError>;
}

impl ArtifactSource for BTreeMap<String, Artifact> {
    fn artifact(&self, contract: &str) -> Result<Artifact, DeployError> {
        self.get(contract).cloned().ok_or_else(|| DeployError::ArtifactNotFound(contract.to_string()))
    }
}

/// A Hardhat artifacts directory, searched recursively for `<Contract>.json`
#[derive(Clone, Debug)]
pub struct ArtifactDir {
    /// The root of the artifacts tree
    root: PathBuf,
}

impl ArtifactDir {
    /// An artifact source rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find the artifact file of `contract` under the root
    fn find(&self, contract: &str) -> Result<Option<PathBuf>, DeployError> {
        let file_name = format!("{contract}.{JSON_EXTENSION}");
        let mut matches = Vec::new();
        collect_matching(&self.root, &file_name, &mut matches)?;
        matches.sort();

        if matches.len() > 1 {
            debug!(contract, candidates = matches.len(), "multiple artifacts found, using the first");
        }

        Ok(matches.into_iter().next())
    }
}

impl ArtifactSource for ArtifactDir {
    fn artifact(&self, contract: &str) -> Result<Artifact, DeployError> {
        let path =
            self.find(contract)?.ok_or_else(|| DeployError::ArtifactNotFound(contract.to_string()))?;

        let contents =
            fs::read_to_string(&path).map_err(|e| DeployError::ArtifactParsing(e.to_string()))?;
        serde_json::from_str(&contents)
            .map_err(|e| DeployError::ArtifactParsing(format!("{}: {e}", path.display())))
    }
}

/// Recursively collect files named `file_name` under `dir`, skipping debug artifacts
fn collect_matching(
    dir: &Path,
    file_name: &str,
    matches: &mut Vec<PathBuf>,
) -> Result<(), DeployError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| DeployError::ArtifactParsing(format!("{}: {e}", dir.display())))?;

    for entry in entries {
        let path = entry.map_err(|e| DeployError::ArtifactParsing(e.to_string()))?.path();
        if path.is_dir() {
            collect_matching(&path, file_name, matches)?;
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        if name == file_name && !name.ends_with(DEBUG_ARTIFACT_SUFFIX) {
            matches.push(path);
        }
    }

    Ok(())
}
