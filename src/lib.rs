//! OAuth 2.0 courier for REST clients: keeps a bearer token fresh through a pluggable token
//! store and drives every API call through classified errors, exponential backoff, and
//! server-dictated rate-limit delays.
//!
//! The moving parts, leaf first:
//!
//! - [`store::TokenStore`] persists serialized tokens ([`store::MemoryStore`],
//!   [`store::FileStore`]).
//! - [`auth::TokenCache`] holds the most recent token and answers freshness questions.
//! - [`auth::TokenProvider`] talks to the authorization server.
//! - [`auth::AuthCoordinator`] hands out currently-valid bearer tokens.
//! - [`classify::ErrorClassifier`] and [`retry::RetryPolicy`] decide what a failure means and
//!   whether waiting will help.
//! - [`executor::RequestExecutor`] ties everything together for one logical request.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod classify;
pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod obs;
pub mod retry;
pub mod store;
pub mod transport;

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use tokio_util::sync::CancellationToken;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use http;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
