//! Tracker wire protocol for mogfs
//!
//! Requests are single lines: a command name, a space, and form-urlencoded
//! parameters, terminated by CRLF. Responses are single lines of the form
//! `OK <seq> <payload>` or `ERR <code> <message>`.

pub mod protocol;
pub mod wire;

pub use protocol::*;
pub use wire::*;
