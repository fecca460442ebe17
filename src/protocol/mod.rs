//! Postgres wire protocol (v3) codec
//!
//! This module covers:
//! * Startup packet framing and version extraction
//! * Decoding of frontend messages (simple and extended query)
//! * Encoding of backend messages
//!
//! Only the message layouts live here; no connection state is tracked.

pub mod constants;
pub mod decode;
pub mod encode;
pub mod message;

pub use decode::{decode_message, decode_startup, StartupPacket};
pub use encode::{encode_frontend, encode_message, encode_startup};
pub use message::{
    AuthenticationMessage, BackendMessage, ErrorFields, FieldDescription, FrontendMessage,
    MessageKind, StartupParameters, Target, TransactionStatus,
};
