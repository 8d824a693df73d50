//! Transaction confirmer: submit a transaction once, and a pool of polling
//! workers tracks it against the chain until it is confirmed at the required
//! depth or fails for good.
//!
//! The engine lives in [`confirm`]; it talks to any backend implementing
//! [`confirm::TxClient`]. An `ethers`-based Ethereum backend and a local
//! nonce tracker are in [`blockchain`], and [`storage`] has an in-memory
//! record of submitted transactions meant to be driven from the hooks.

pub mod blockchain;
pub mod config;
pub mod confirm;
pub mod storage;

pub use confirm::{Confirmer, ConfirmerConfig, ConfirmerError, Hooks, PollError, TxClient};
