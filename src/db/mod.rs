//! Store handle, configuration and snapshot reads.

mod config;
mod session;
mod store;


pub use config::{StoreConfig, SweepPolicy, SyncMode};
pub use session::ReadSession;
pub use store::Store;
