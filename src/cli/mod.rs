//! # CLI Module
//!
//! User-facing commands of sporlstats. Each command loads its configuration,
//! opens the listening history store or the Spotify client it needs, and
//! presents the result with the colored message macros and `tabled` tables.
//!
//! ## Commands
//!
//! - [`auth`] - OAuth 2.0 PKCE login, caches the token
//! - [`current`] / [`recent`] - what is playing now and what played recently
//! - [`top_tracks`] / [`top_artists`] - Spotify's top items for a time range
//! - [`sync`] - records the recently played tracks once
//! - [`monitor`] - keeps recording until interrupted or a duration elapses
//! - [`analyze`] - metric snapshots, evolution between windows, JSON export
//! - [`history`] - lists recorded plays
//! - [`prune`] - deletes old plays
//!
//! ## Typical Session
//!
//! ```bash
//! sporlstats auth
//! sporlstats sync
//! sporlstats monitor --duration 60
//! sporlstats analyze --windows 4 --export
//! ```
//!
//! Errors the user has to act on (missing configuration, no token) end the
//! process through `error!`; everything below this layer returns errors.

mod analyze;
mod auth;
mod context;
mod player;
mod sync;
mod top;

pub use analyze::AnalyzeOptions;
pub use analyze::analyze;
pub use analyze::history;
pub use analyze::prune;
pub use auth::auth;
pub use player::current;
pub use player::recent;
pub use sync::monitor;
pub use sync::sync;
pub use top::top_artists;
pub use top::top_tracks;
