//! The client side: an HTTP wrapper with auth-refresh-and-retry, and the
//! chunking/negotiation/parallel-transfer engine built on top of it.

pub mod api;
pub mod engine;

pub use api::ApiClient;
pub use engine::ClientEngine;
