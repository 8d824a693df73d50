pub mod pending;

pub use pending::{PendingTx, PendingTxStore, TxStatus};
