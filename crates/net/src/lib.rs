//! Patron Net Library
//!
//! REST boundary for the Patron backend. The client owns the bearer
//! token and every request that carries it; the protocol module owns
//! decoding, so nothing outside this crate ever touches raw JSON.

pub mod client;
pub mod error;
pub mod protocol;

pub use client::ApiClient;
pub use error::{Error, Result};
pub use protocol::{AuthSession, BillingStatus, RemoteProfile};
