//! Scripts for deploying, upgrading, and inspecting the upgradeable contract suite.
//!
//! Contracts are deployed behind transparent proxies by an ordered
//! [`pipeline::Pipeline`]; each step's record is persisted per network so that
//! re-runs skip what is already deployed.

#![deny(missing_docs)]

pub mod accounts;
pub mod artifacts;
pub mod chain;
pub mod cli;
mod commands;
pub mod config;
pub mod constants;
pub mod deployments;
pub mod errors;
pub mod pipeline;
pub mod proxy;
pub mod report;
mod solidity;
pub mod types;
