//! `antco-client`
//!
//! **Responsibility:** the authenticated client core of the AntCo SSO Admin Portal.
//!
//! This crate provides:
//! - Durable token storage (`TokenStore` over a `Storage` seam)
//! - An HTTP core that attaches bearer tokens and coordinates a single
//!   in-flight token refresh across concurrent 401s
//! - The session store (who is logged in, what they may do)
//! - The authorization gate guarding protected regions
//! - Typed bindings for the Auth API and Admin API
//!
//! Presentation is out of scope: redirects are returned as values or issued
//! through a `Navigator`.

pub mod api;
pub mod config;
pub mod error;
pub mod gate;
pub mod http;
pub mod navigation;
pub mod portal;
pub mod session;
pub mod storage;
pub mod token_store;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ClientConfig;
pub use error::{AuthFailure, ClientError, ClientResult};
pub use gate::{AuthGate, Denial, Fallback, GateState, GateWatch, ProtectedRegion};
pub use http::{ApiRequest, HttpClient, Service};
pub use navigation::{LogNavigator, Navigator, RecordingNavigator, Redirect};
pub use portal::AdminPortal;
pub use session::{PersistedSession, Session, SessionStore};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use token_store::TokenStore;
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport, TransportError};
