//! Postgres protocol constants

/// Protocol version 3.0
pub const PROTOCOL_VERSION: i32 = 0x0003_0000;

/// Only supported major version
pub const SUPPORTED_MAJOR: u16 = 3;

/// Only supported minor version
pub const SUPPORTED_MINOR: u16 = 0;

/// SSLRequest code (80877103 = 1234 << 16 | 5679)
pub const SSL_REQUEST_CODE: i32 = 0x04D2_162F;

/// GSSENCRequest code (80877104 = 1234 << 16 | 5680)
pub const GSSENC_REQUEST_CODE: i32 = 0x04D2_1630;

/// CancelRequest code (80877102 = 1234 << 16 | 5678)
pub const CANCEL_REQUEST_CODE: i32 = 0x04D2_162E;

/// Maximum startup packet length, matching PostgreSQL's `MAX_STARTUP_PACKET_LENGTH`.
pub const MAX_STARTUP_PACKET_LENGTH: usize = 10_000;

/// Maximum message length (1 GB), matching PostgreSQL's own `PQ_LARGE_MESSAGE_LIMIT`.
pub const MAX_MESSAGE_LENGTH: usize = 1_073_741_824;

/// Frontend message type tags
pub mod frontend_tags {
    /// Simple query
    pub const QUERY: u8 = b'Q';

    /// Parse (extended query)
    pub const PARSE: u8 = b'P';

    /// Bind (extended query)
    pub const BIND: u8 = b'B';

    /// Describe statement or portal
    pub const DESCRIBE: u8 = b'D';

    /// Execute portal
    pub const EXECUTE: u8 = b'E';

    /// Sync
    pub const SYNC: u8 = b'S';

    /// Flush
    pub const FLUSH: u8 = b'H';

    /// Close statement or portal
    pub const CLOSE: u8 = b'C';

    /// Terminate
    pub const TERMINATE: u8 = b'X';
}

/// Backend message type tags
pub mod tags {
    /// Authentication request
    pub const AUTHENTICATION: u8 = b'R';

    /// Backend key data
    pub const BACKEND_KEY_DATA: u8 = b'K';

    /// Bind complete
    pub const BIND_COMPLETE: u8 = b'2';

    /// Close complete
    pub const CLOSE_COMPLETE: u8 = b'3';

    /// Command complete
    pub const COMMAND_COMPLETE: u8 = b'C';

    /// Data row
    pub const DATA_ROW: u8 = b'D';

    /// Empty query response
    pub const EMPTY_QUERY_RESPONSE: u8 = b'I';

    /// Error response
    pub const ERROR_RESPONSE: u8 = b'E';

    /// No data
    pub const NO_DATA: u8 = b'n';

    /// Notice response
    pub const NOTICE_RESPONSE: u8 = b'N';

    /// Parameter description
    pub const PARAMETER_DESCRIPTION: u8 = b't';

    /// Parameter status
    pub const PARAMETER_STATUS: u8 = b'S';

    /// Parse complete
    pub const PARSE_COMPLETE: u8 = b'1';

    /// Portal suspended
    pub const PORTAL_SUSPENDED: u8 = b's';

    /// Ready for query
    pub const READY_FOR_QUERY: u8 = b'Z';

    /// Row description
    pub const ROW_DESCRIPTION: u8 = b'T';
}

/// Authentication types
pub mod auth {
    /// Authentication successful
    pub const OK: i32 = 0;

    /// Cleartext password required
    pub const CLEARTEXT_PASSWORD: i32 = 3;

    /// MD5 password required
    pub const MD5_PASSWORD: i32 = 5;
}

/// Transaction status
pub mod tx_status {
    /// Idle (not in transaction)
    pub const IDLE: u8 = b'I';

    /// In transaction block
    pub const IN_TRANSACTION: u8 = b'T';

    /// Failed transaction (queries will be rejected until END)
    pub const FAILED: u8 = b'E';
}
