//! Producer side: sources, filters, capture/encode, and the per-layer frame buffer.

pub mod buffer;
pub mod encode;
pub mod filter;
pub mod frame;
pub mod producer;
pub mod source;
