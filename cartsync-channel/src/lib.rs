//! # cartsync-channel
//!
//! Correlated request/response exchange with the retailer page script.
//!
//! The page script holds a persistent connection per browser context. Each
//! call resolves the context hosting the script ([`TabLocator`]), tags the
//! request with a fresh correlation id and waits for the matching reply.

pub mod channel;
pub mod protocol;
pub mod tabs;

pub use channel::{ConnectionLease, RemoteChannel};
pub use protocol::{ChannelRequest, RemoteError, RequestEnvelope, ResponseEnvelope};
pub use tabs::{ContextId, TabLocator, TabRegistry};
