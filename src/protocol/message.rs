//! Protocol message types

use super::constants::tx_status;
use bytes::Bytes;

/// Frontend message (client → server)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontendMessage {
    /// Simple query
    Query(String),

    /// Parse a statement
    Parse {
        /// Prepared statement name (empty for the unnamed statement)
        name: String,
        /// Query text
        query: String,
        /// Parameter type OIDs (0 = unspecified)
        param_types: Vec<u32>,
    },

    /// Bind parameters to a statement, creating a portal
    Bind {
        /// Destination portal name (empty for the unnamed portal)
        portal: String,
        /// Source statement name
        statement: String,
        /// Parameter format codes
        param_formats: Vec<i16>,
        /// Parameter values (`None` = NULL)
        params: Vec<Option<Bytes>>,
        /// Result column format codes
        result_formats: Vec<i16>,
    },

    /// Describe a statement or portal
    Describe {
        /// What to describe
        target: Target,
        /// Statement or portal name
        name: String,
    },

    /// Execute a portal
    Execute {
        /// Portal name
        portal: String,
        /// Row limit (0 = no limit)
        max_rows: i32,
    },

    /// Sync (end of an extended-query sequence)
    Sync,

    /// Flush
    Flush,

    /// Close a statement or portal
    Close {
        /// What to close
        target: Target,
        /// Statement or portal name
        name: String,
    },

    /// Terminate message
    Terminate,
}

impl FrontendMessage {
    /// Message kind, without payload
    pub fn kind(&self) -> MessageKind {
        match self {
            FrontendMessage::Query(_) => MessageKind::Query,
            FrontendMessage::Parse { .. } => MessageKind::Parse,
            FrontendMessage::Bind { .. } => MessageKind::Bind,
            FrontendMessage::Describe { .. } => MessageKind::Describe,
            FrontendMessage::Execute { .. } => MessageKind::Execute,
            FrontendMessage::Sync => MessageKind::Sync,
            FrontendMessage::Flush => MessageKind::Flush,
            FrontendMessage::Close { .. } => MessageKind::Close,
            FrontendMessage::Terminate => MessageKind::Terminate,
        }
    }
}

/// Kind of a frontend message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Simple query
    Query,
    /// Parse
    Parse,
    /// Bind
    Bind,
    /// Describe
    Describe,
    /// Execute
    Execute,
    /// Sync
    Sync,
    /// Flush
    Flush,
    /// Close
    Close,
    /// Terminate
    Terminate,
}

impl MessageKind {
    /// Lowercase name used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Parse => "parse",
            Self::Bind => "bind",
            Self::Describe => "describe",
            Self::Execute => "execute",
            Self::Sync => "sync",
            Self::Flush => "flush",
            Self::Close => "close",
            Self::Terminate => "terminate",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target of a Describe or Close message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Prepared statement (`S`)
    Statement,
    /// Portal (`P`)
    Portal,
}

impl Target {
    /// Wire byte
    pub fn as_byte(&self) -> u8 {
        match self {
            Target::Statement => b'S',
            Target::Portal => b'P',
        }
    }

    /// Parse the wire byte
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'S' => Some(Target::Statement),
            b'P' => Some(Target::Portal),
            _ => None,
        }
    }
}

/// Backend message (server → client)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMessage {
    /// Authentication request
    Authentication(AuthenticationMessage),

    /// Backend key data (for cancellation)
    BackendKeyData {
        /// Process ID
        process_id: i32,
        /// Secret key
        secret_key: i32,
    },

    /// Parameter status
    ParameterStatus {
        /// Parameter name
        name: String,
        /// Parameter value
        value: String,
    },

    /// Ready for query
    ReadyForQuery {
        /// Transaction status
        status: TransactionStatus,
    },

    /// Parse complete
    ParseComplete,

    /// Bind complete
    BindComplete,

    /// Close complete
    CloseComplete,

    /// No data (Describe of a statement without result columns)
    NoData,

    /// Execute stopped at its row limit
    PortalSuspended,

    /// Empty query string
    EmptyQueryResponse,

    /// Command complete
    CommandComplete(String),

    /// Row description
    RowDescription(Vec<FieldDescription>),

    /// Parameter description (statement parameter type OIDs)
    ParameterDescription(Vec<u32>),

    /// Data row
    DataRow(Vec<Option<Bytes>>),

    /// Error response
    ErrorResponse(ErrorFields),

    /// Notice response
    NoticeResponse(ErrorFields),
}

impl BackendMessage {
    /// Lowercase name used in logs and metric labels
    pub fn name(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication",
            Self::BackendKeyData { .. } => "backend_key_data",
            Self::ParameterStatus { .. } => "parameter_status",
            Self::ReadyForQuery { .. } => "ready_for_query",
            Self::ParseComplete => "parse_complete",
            Self::BindComplete => "bind_complete",
            Self::CloseComplete => "close_complete",
            Self::NoData => "no_data",
            Self::PortalSuspended => "portal_suspended",
            Self::EmptyQueryResponse => "empty_query_response",
            Self::CommandComplete(_) => "command_complete",
            Self::RowDescription(_) => "row_description",
            Self::ParameterDescription(_) => "parameter_description",
            Self::DataRow(_) => "data_row",
            Self::ErrorResponse(_) => "error_response",
            Self::NoticeResponse(_) => "notice_response",
        }
    }
}

/// Authentication message types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationMessage {
    /// Authentication OK
    Ok,

    /// Cleartext password required
    CleartextPassword,

    /// MD5 password required
    Md5Password {
        /// Salt for MD5 hash
        salt: [u8; 4],
    },
}

/// Transaction status reported in ReadyForQuery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Not in a transaction block
    #[default]
    Idle,
    /// In a transaction block
    InTransaction,
    /// In a failed transaction block
    Failed,
}

impl TransactionStatus {
    /// Wire byte
    pub fn as_byte(&self) -> u8 {
        match self {
            TransactionStatus::Idle => tx_status::IDLE,
            TransactionStatus::InTransaction => tx_status::IN_TRANSACTION,
            TransactionStatus::Failed => tx_status::FAILED,
        }
    }
}

/// Field description (column metadata)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescription {
    /// Column name
    pub name: String,
    /// Table OID (0 if not a table column)
    pub table_oid: i32,
    /// Column attribute number (0 if not a table column)
    pub column_attr: i16,
    /// Data type OID
    pub type_oid: u32,
    /// Data type size
    pub type_size: i16,
    /// Type modifier
    pub type_modifier: i32,
    /// Format code (0 = text, 1 = binary)
    pub format_code: i16,
}

/// Error/notice fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorFields {
    /// Severity (ERROR, WARNING, etc.)
    pub severity: Option<String>,
    /// SQLSTATE code
    pub code: Option<String>,
    /// Human-readable message
    pub message: Option<String>,
    /// Additional detail
    pub detail: Option<String>,
    /// Hint
    pub hint: Option<String>,
    /// Position in query string
    pub position: Option<String>,
}

impl ErrorFields {
    /// Error with severity, SQLSTATE and message set
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Some("ERROR".to_string()),
            code: Some(code.into()),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Set fields as (field type byte, value) pairs, in wire order
    pub(crate) fn pairs(&self) -> impl Iterator<Item = (u8, &str)> {
        [
            (b'S', &self.severity),
            (b'V', &self.severity),
            (b'C', &self.code),
            (b'M', &self.message),
            (b'D', &self.detail),
            (b'H', &self.hint),
            (b'P', &self.position),
        ]
        .into_iter()
        .filter_map(|(tag, value)| value.as_deref().map(|v| (tag, v)))
    }
}

impl std::fmt::Display for ErrorFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref msg) = self.message {
            write!(f, "{}", msg)?;
        }
        if let Some(ref code) = self.code {
            write!(f, " ({})", code)?;
        }
        Ok(())
    }
}

/// Startup parameters, in the order the client sent them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupParameters {
    params: Vec<(String, String)>,
}

impl StartupParameters {
    /// Build from (name, value) pairs
    pub fn new(params: Vec<(String, String)>) -> Self {
        Self { params }
    }

    /// Value of the first parameter with this name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `user` parameter
    pub fn user(&self) -> Option<&str> {
        self.get("user")
    }

    /// `database` parameter
    pub fn database(&self) -> Option<&str> {
        self.get("database")
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// True if the client sent no parameters
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterate over (name, value) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
