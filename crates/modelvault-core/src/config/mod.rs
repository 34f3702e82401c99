//! Store configuration: `modelvault.toml` discovery, parsing and defaults.

pub mod parser;
pub mod paths;
pub mod schema;
pub mod store;

pub use schema::{ConfigFile, StoreConfig};
pub use store::ConfigStore;
