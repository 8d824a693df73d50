//! The confirmation engine: a retry queue, a pool of polling workers, an
//! elapsed-time gate pacing re-checks, and the retry-vs-terminal policy.

pub mod config;
pub mod confirmer;
pub mod errors;
pub mod queue;
pub mod traits;

pub use config::{ConfirmerConfig, ErrHook, Hooks, TxHook};
pub use confirmer::Confirmer;
pub use errors::{ConfirmerError, PollError};
pub use queue::{Entry, RetryQueue};
pub use traits::TxClient;
