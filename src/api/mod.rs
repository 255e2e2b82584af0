//! # API Module
//!
//! HTTP endpoints of the local server started during `sporlstats auth`.
//!
//! - [`callback`] - completes the OAuth 2.0 PKCE flow by exchanging the
//!   authorization code Spotify redirects with for a token
//! - [`health`] - status and version of the running binary
//!
//! ```rust,ignore
//! use axum::{Extension, Router, routing::get};
//! use sporlstats::api::{callback, health};
//!
//! let app = Router::new()
//!     .route("/health", get(health))
//!     .route("/callback", get(callback).layer(Extension(state)));
//! ```

mod callback;
mod health;

use std::sync::Arc;

use tokio::sync::Mutex;

pub use callback::callback;
pub use health::health;

use crate::{config::SpotifyConfig, types::PkceToken};

/// Shared between the auth flow and the callback handler.
#[derive(Clone)]
pub struct CallbackState {
    pub pkce: Arc<Mutex<Option<PkceToken>>>,
    pub config: SpotifyConfig,
}
