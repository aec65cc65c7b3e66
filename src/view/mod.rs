//! Client side: viewport math, decoding, and the real-time compositor.

pub mod composite;
pub mod compositor;
pub mod decode;
pub mod nav;
pub mod state;
pub mod viewport;
