pub mod crypto;
pub mod exchange;
pub mod extjson;
pub mod secrets;
pub mod storage;
pub mod telemetry;

pub use exchange::{ConnectionExchange, ExchangeError, ExportOptions, ImportError, ImportOptions};
pub use storage::{AppStore, ConnectionInfo, ConnectionStorage, ConnectionsRepository};
