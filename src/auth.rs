//! Token lifecycle: the token model, the single-slot cache, the authorization-server client,
//! and the coordinator that hands out currently-valid bearer tokens.

pub mod cache;
pub mod coordinator;
pub mod provider;
pub mod token;

pub use cache::*;
pub use coordinator::*;
pub use provider::*;
pub use token::{freshness::*, record::*, secret::*};
