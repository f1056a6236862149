//! Definitions of Solidity functions called during deployment

use alloy::sol;

sol! {
    /// `ProxyAdmin.upgrade`, pointing a proxy at a new implementation
    function upgrade(address proxy, address implementation) external;

    /// `ProxyAdmin.upgradeAndCall`, pointing a proxy at a new implementation
    /// and invoking it through the proxy in the same transaction
    function upgradeAndCall(address proxy, address implementation, bytes memory data) external payable;
}
