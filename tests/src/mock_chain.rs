//! An in-memory chain that executes contract creations and proxy admin calls
//! just far enough for the deploy scripts to be exercised end to end

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap, HashSet},
};

use alloy::{
    dyn_abi::{DynSolType, DynSolValue},
    primitives::{keccak256, Address, Bytes, U256},
};
use credentials_deploy::{
    artifacts::Artifact,
    chain::{Chain, TxOutcome},
    constants::{IMPLEMENTATION_STORAGE_SLOT, PROXY_ADMIN_STORAGE_SLOT, PROXY_CONTRACT_NAME},
    errors::DeployError,
};

/// The network name the mock reports
pub const MOCK_NETWORK: &str = "mock";
/// The gas charged for every transaction
pub const MOCK_GAS_USED: u64 = 100_000;
/// The gas price charged for every transaction, in wei
pub const MOCK_GAS_PRICE: u128 = 1_000_000_000;

/// A transaction sent to an existing contract
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentCall {
    /// The sender
    pub from: Address,
    /// The contract called
    pub to: Address,
    /// The calldata
    pub calldata: Bytes,
}

/// The mutable state of the mock chain
#[derive(Default)]
struct MockState {
    /// The next nonce of each sender
    nonces: HashMap<Address, u64>,
    /// The creation code stored at each created address
    code: HashMap<Address, Bytes>,
    /// The contract name each created address was identified as
    contracts: HashMap<Address, String>,
    /// Contract storage
    storage: HashMap<(Address, U256), U256>,
    /// Every sender of a mined transaction, in order
    senders: Vec<Address>,
    /// Every mined call transaction, in order
    calls: Vec<SentCall>,
    /// Contracts whose initializer reverts when invoked through a proxy
    reverting: HashSet<String>,
}

/// An in-memory [`Chain`].
///
/// Contract creations get real CREATE addresses. A contract is identified by
/// the artifact bytecode its creation code starts with, which lets proxy
/// creations be decoded to set the EIP-1967 slots and to simulate reverting
/// initializers.
pub struct MockChain {
    /// The accounts the node reports as its own
    accounts: Vec<Address>,
    /// The bytecode of each known contract, keyed by name
    bytecodes: BTreeMap<String, Bytes>,
    /// The chain state
    state: RefCell<MockState>,
}

impl MockChain {
    /// A chain recognizing the contracts in `artifacts`, with `accounts` as node accounts
    pub fn new(artifacts: &BTreeMap<String, Artifact>, accounts: Vec<Address>) -> Self {
        let bytecodes = artifacts
            .iter()
            .map(|(name, artifact)| (name.clone(), artifact.bytecode.clone()))
            .collect();

        Self { accounts, bytecodes, state: RefCell::new(MockState::default()) }
    }

    /// Make the initializer of `contract` revert when invoked through a proxy
    pub fn revert_initializer_of(&self, contract: &str) {
        self.state.borrow_mut().reverting.insert(contract.to_string());
    }

    /// Stop every initializer from reverting
    pub fn clear_reverts(&self) {
        self.state.borrow_mut().reverting.clear();
    }

    /// The number of contracts created so far
    pub fn deployments(&self) -> usize {
        self.state.borrow().code.len()
    }

    /// The number of contracts of the given name created so far
    pub fn deployments_of(&self, contract: &str) -> usize {
        self.state.borrow().contracts.values().filter(|name| *name == contract).count()
    }

    /// Every sender of a mined transaction, in order
    pub fn senders(&self) -> Vec<Address> {
        self.state.borrow().senders.clone()
    }

    /// Every mined call transaction, in order
    pub fn calls(&self) -> Vec<SentCall> {
        self.state.borrow().calls.clone()
    }

    /// The name of the contract whose bytecode `code` starts with, preferring the longest match
    fn identify(&self, code: &[u8]) -> Option<&str> {
        self.bytecodes
            .iter()
            .filter(|(_, bytecode)| !bytecode.is_empty() && code.starts_with(bytecode))
            .max_by_key(|(_, bytecode)| bytecode.len())
            .map(|(name, _)| name.as_str())
    }

    /// Mine a transaction from `from`, returning the nonce it used
    fn mine(state: &mut MockState, from: Address) -> u64 {
        let nonce = state.nonces.entry(from).or_default();
        let used = *nonce;
        *nonce += 1;
        state.senders.push(from);
        used
    }
}

impl Chain for MockChain {
    fn network(&self) -> &str {
        MOCK_NETWORK
    }

    async fn accounts(&self) -> Result<Vec<Address>, DeployError> {
        Ok(self.accounts.clone())
    }

    async fn nonce(&self, address: Address) -> Result<u64, DeployError> {
        Ok(self.state.borrow().nonces.get(&address).copied().unwrap_or_default())
    }

    async fn deploy(&self, from: Address, creation_code: Bytes) -> Result<TxOutcome, DeployError> {
        let contract = self.identify(&creation_code).map(str::to_string);
        let mut state = self.state.borrow_mut();

        let mut slots = Vec::new();
        if contract.as_deref() == Some(PROXY_CONTRACT_NAME) {
            let bytecode_len = self.bytecodes[PROXY_CONTRACT_NAME].len();
            let (implementation, admin, data) = decode_proxy_args(&creation_code[bytecode_len..])?;

            let target = state.contracts.get(&implementation).cloned().unwrap_or_default();
            if !data.is_empty() && state.reverting.contains(&target) {
                return Err(DeployError::Reverted(format!("{target}: execution reverted")));
            }

            slots.push((slot(IMPLEMENTATION_STORAGE_SLOT), address_word(implementation)));
            slots.push((slot(PROXY_ADMIN_STORAGE_SLOT), address_word(admin)));
        }

        let address = from.create(Self::mine(&mut state, from));
        for (slot, value) in slots {
            state.storage.insert((address, slot), value);
        }
        state.code.insert(address, creation_code);
        if let Some(contract) = contract {
            state.contracts.insert(address, contract);
        }

        Ok(TxOutcome {
            tx_hash: Some(keccak256(address)),
            contract_address: Some(address),
            gas_used: MOCK_GAS_USED,
            effective_gas_price: MOCK_GAS_PRICE,
        })
    }

    async fn send(
        &self,
        from: Address,
        to: Address,
        calldata: Bytes,
    ) -> Result<TxOutcome, DeployError> {
        let mut state = self.state.borrow_mut();
        if !state.code.contains_key(&to) {
            return Err(DeployError::ContractInteraction(format!("no contract at {to}")));
        }

        // Both admin upgrade methods take `(proxy, implementation, ..)`
        let selector = calldata.get(..4).unwrap_or_default();
        if selector == &keccak256("upgrade(address,address)")[..4]
            || selector == &keccak256("upgradeAndCall(address,address,bytes)")[..4]
        {
            let proxy = Address::from_slice(&calldata[4 + 12..4 + 32]);
            let implementation = Address::from_slice(&calldata[36 + 12..36 + 32]);
            let value = address_word(implementation);
            state.storage.insert((proxy, slot(IMPLEMENTATION_STORAGE_SLOT)), value);
        }

        let nonce = Self::mine(&mut state, from);
        state.calls.push(SentCall { from, to, calldata });

        Ok(TxOutcome {
            tx_hash: Some(keccak256(nonce.to_be_bytes())),
            contract_address: None,
            gas_used: MOCK_GAS_USED,
            effective_gas_price: MOCK_GAS_PRICE,
        })
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, DeployError> {
        Ok(self.state.borrow().code.get(&address).cloned().unwrap_or_default())
    }

    async fn storage_at(&self, address: Address, slot: U256) -> Result<U256, DeployError> {
        Ok(self.state.borrow().storage.get(&(address, slot)).copied().unwrap_or_default())
    }
}

/// Decode the `(logic, admin, data)` constructor arguments of a proxy
fn decode_proxy_args(encoded: &[u8]) -> Result<(Address, Address, Vec<u8>), DeployError> {
    let ty = DynSolType::Tuple(vec![DynSolType::Address, DynSolType::Address, DynSolType::Bytes]);
    let decoded = ty
        .abi_decode_params(encoded)
        .map_err(|e| DeployError::ContractDeployment(e.to_string()))?;

    match decoded {
        DynSolValue::Tuple(values) => match values.as_slice() {
            [DynSolValue::Address(logic), DynSolValue::Address(admin), DynSolValue::Bytes(data)] => {
                Ok((*logic, *admin, data.clone()))
            },
            _ => Err(DeployError::ContractDeployment("malformed proxy arguments".to_string())),
        },
        _ => Err(DeployError::ContractDeployment("malformed proxy arguments".to_string())),
    }
}

/// Parse a hex storage slot constant
fn slot(hex: &str) -> U256 {
    hex.parse().unwrap()
}

/// An address right-aligned in a storage word
fn address_word(address: Address) -> U256 {
    U256::from_be_slice(address.as_slice())
}
