//! Request/response link between layer producers and the compositor.

pub mod channel;
pub mod limiter;
pub mod protocol;
pub mod server;
