//! `ptyrelay`: a PTY-over-WebSocket terminal sharing relay.
//!
//! See `framebuffer` for the terminal emulator, `codec` for the wire
//! compression, `session`/`relay` for multiplexing and routing, and
//! `config`/`stats` for the ambient process stack.

pub mod codec;
pub mod config;
pub mod error;
pub mod framebuffer;
pub mod relay;
pub mod session;
pub mod session_id;
pub mod stats;
