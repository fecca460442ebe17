//! Connection handling
//!
//! This module handles:
//! * Startup handshake (protocol version gate)
//! * Relay of frontend messages with ReadyForQuery emission
//! * Extended-query state tracking

mod state;
mod transport;

pub use state::{ExtendedQuery, MessageClass, SessionState, Transition};
pub use transport::{
    Transport, AUTHENTICATION_OK, BIND_COMPLETE, CLOSE_COMPLETE, EMPTY_QUERY_RESPONSE, NO_DATA,
    PARSE_COMPLETE,
};
