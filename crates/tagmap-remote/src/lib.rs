pub mod applier;
pub mod cache;
pub mod client;
pub mod error;
pub mod graphql;
pub mod records;
pub mod rest;
pub mod snapshot;
pub mod source;

pub use error::{RemoteError, Result};
pub use source::{LookupChain, LookupSource, LookupTables};
