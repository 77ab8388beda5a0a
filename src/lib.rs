//! Bearer-authenticated REST access core: a JWT client-assertion token broker paired with a
//! cursor/link page walker, shared by every endpoint wrapper built on top of it.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod broker;
pub mod client;
pub mod clock;
pub mod error;
pub mod http;
pub mod obs;
pub mod pager;
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
		time::Duration as StdDuration,
	};

	pub use async_lock::RwLock as AsyncRwLock;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use jsonwebtoken;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
