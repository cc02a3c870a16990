//! Background runtime: owns the sync engine and serves controllers and the
//! retailer page script over a Unix socket.

mod error;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use protocol::{
    request_connect, request_disconnect, request_status, request_stop, request_sync,
    send_request, subscribe_progress, DaemonRequest, DaemonResponse, ProgressStream,
};
pub use runtime::{init_tracing, not_running_payload, run, start_blocking, LOG_FORMAT_ENV};
