//! Constants used in the deploy scripts

// ------------
// | Networks |
// ------------

/// The network selected when none is given on the command line
pub const DEFAULT_NETWORK: &str = "ganache";

/// The name of the local development node network
pub const LOCAL_NETWORK: &str = "local";

/// The name of the Ganache network
pub const GANACHE_NETWORK: &str = "ganache";

/// The name of the Polygon mainnet network
pub const MAINNET_NETWORK: &str = "mainnet";

/// The name of the Polygon Mumbai test network
pub const MUMBAI_NETWORK: &str = "mumbai";

/// The RPC URL of a local development node
pub const LOCAL_RPC_URL: &str = "http://localhost:8545";

/// The RPC URL of a local Ganache instance
pub const GANACHE_RPC_URL: &str = "http://127.0.0.1:7545";

/// The Alchemy subdomain serving Polygon mainnet
pub const POLYGON_MAINNET_SUBDOMAIN: &str = "polygon-mainnet";

/// The Alchemy subdomain serving Polygon Mumbai
pub const POLYGON_MUMBAI_SUBDOMAIN: &str = "polygon-mumbai";

/// The chain ID of Polygon Mumbai
pub const MUMBAI_CHAIN_ID: u64 = 80001;

/// The gas price, in wei, used on the public Polygon networks (40 gwei)
pub const PUBLIC_NETWORK_GAS_PRICE: u128 = 40_000_000_000;

/// The RPC timeout used on the public Polygon networks
pub const PUBLIC_NETWORK_TIMEOUT_MS: u64 = 50_000;

/// The RPC timeout used when a network does not configure one
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

// -------------------------
// | Environment variables |
// -------------------------

/// The environment variable holding the Alchemy API key
pub const ALCHEMY_KEY_ENV_VAR: &str = "ALCHEMY_KEY";

/// The environment variable holding the deployer's private key
pub const PRIVATE_KEY_ENV_VAR: &str = "PK";

/// The environment variable holding the Ganache deployer address override
pub const GANACHE_DEPLOYER_ADDRESS_ENV_VAR: &str = "GANACHE_DEPLOYER_ADDRESS";

/// The environment variable holding the block explorer API key
pub const ETHERSCAN_API_KEY_ENV_VAR: &str = "ETHERSCAN_API_KEY";

// ------------
// | Accounts |
// ------------

/// The named account role that signs every deployment
pub const DEPLOYER_ROLE: &str = "deployer";

/// The position in the network's account list used for the deployer by default
pub const DEFAULT_DEPLOYER_INDEX: usize = 0;

// ---------
// | Paths |
// ---------

/// The default directory containing compiled contract artifacts
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// The default directory in which deployment records are persisted
pub const DEFAULT_DEPLOYMENTS_DIR: &str = "deployments";

/// The default directory ABIs are exported to
pub const DEFAULT_ABI_DIR: &str = "abi";

/// The extension of artifact and deployment record files
pub const JSON_EXTENSION: &str = "json";

/// The suffix of Hardhat debug artifacts, which carry no ABI or bytecode
pub const DEBUG_ARTIFACT_SUFFIX: &str = ".dbg.json";

// -------------
// | Contracts |
// -------------

/// The artifact name of the upgradeable proxy contract
pub const PROXY_CONTRACT_NAME: &str = "TransparentUpgradeableProxy";

/// The artifact name of the proxy admin contract
pub const PROXY_ADMIN_CONTRACT_NAME: &str = "ProxyAdmin";

/// The logical name under which the shared proxy admin is recorded
pub const DEFAULT_PROXY_ADMIN_KEY: &str = "DefaultProxyAdmin";

/// The name of the initializer method invoked through each proxy
pub const INITIALIZER_METHOD: &str = "initialize";

/// The tag carried by every step of the default plan
pub const DEFAULT_PLAN_TAG: &str = "Token";

/// The ERC20 token contract
pub const TOKEN_CONTRACT: &str = "Token";

/// The indexer contract
pub const INDEXER_CONTRACT: &str = "Indexer";

/// The institutions registry contract
pub const INSTITUTIONS_CONTRACT: &str = "Institutions";

/// The students NFT contract
pub const STUDENTS_ERC721_CONTRACT: &str = "StudentsERC721";

/// The amount the token contract is initialized with
pub const TOKEN_INITIAL_SUPPLY: u64 = 100;

// ------------
// | EIP-1967 |
// ------------

/// The storage slot containing the implementation address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#logic-contract-address
pub const IMPLEMENTATION_STORAGE_SLOT: &str =
    "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc";

/// The storage slot containing the proxy admin contract address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#admin-address
pub const PROXY_ADMIN_STORAGE_SLOT: &str =
    "0xb53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103";

/// The number of bytes stored in a single storage slot
pub const NUM_BYTES_STORAGE_SLOT: usize = 32;

/// The number of bytes in an Ethereum address
pub const NUM_BYTES_ADDRESS: usize = 20;

