//! Token-lifecycle management and a resilient request dispatcher for the Spotify Web API.
//!
//! Endpoint wrappers funnel every call through [`dispatch::Dispatcher::execute`], which
//! asks a [`provider::TokenProvider`] for a bearer header, encodes query parameters,
//! retries rate-limited or unreachable requests at the transport layer, and classifies
//! the response into JSON or a typed [`error::Error`].

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod callback;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod params;
pub mod provider;
pub mod service;
pub mod transport;

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use serde_json;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
