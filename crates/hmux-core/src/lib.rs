pub mod config;
pub mod logging;

// Engine
pub mod context;
pub mod error;
mod registry;
pub mod sink;
pub mod transfer;

pub use context::MultiContext;
pub use error::EngineError;
pub use sink::{CollectingSink, Completion, CompletionSink, Finished};
pub use transfer::{Method, ResultCode, TransferId, TransferOptions, TransferResult};
