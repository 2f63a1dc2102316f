//! Token data model: issued tokens, cached copies with derived expiry, and freshness rules.

pub mod freshness;
pub mod record;
pub mod secret;
