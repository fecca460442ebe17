//! Extended-query session state machine

use crate::protocol::FrontendMessage;

/// Role a frontend message plays in an extended-query sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    /// Parse or Bind: opens a sequence when idle
    Begin,
    /// Sync: closes an open sequence
    End,
    /// Everything else
    Other,
}

impl MessageClass {
    /// Classify a frontend message by kind
    pub fn of(msg: &FrontendMessage) -> Self {
        match msg {
            FrontendMessage::Parse { .. } | FrontendMessage::Bind { .. } => MessageClass::Begin,
            FrontendMessage::Sync => MessageClass::End,
            _ => MessageClass::Other,
        }
    }
}

/// Effect of one message on the session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// An extended-query sequence began
    Opened,
    /// The open sequence ended
    Closed,
    /// No change
    Unchanged,
}

/// Marker for an open extended-query sequence
///
/// Its presence is the whole contract. The counters are correlation data for
/// callers and never influence when ReadyForQuery is emitted. They stay fixed
/// size however long the sequence runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtendedQuery {
    parses: usize,
    binds: usize,
    messages: usize,
}

impl ExtendedQuery {
    /// Parse messages seen since the sequence began
    pub fn parses(&self) -> usize {
        self.parses
    }

    /// Bind messages seen since the sequence began
    pub fn binds(&self) -> usize {
        self.binds
    }

    /// Messages relayed since the sequence began, the opening one included
    pub fn messages(&self) -> usize {
        self.messages
    }

    fn record(&mut self, msg: &FrontendMessage) {
        self.messages += 1;
        match msg {
            FrontendMessage::Parse { .. } => self.parses += 1,
            FrontendMessage::Bind { .. } => self.binds += 1,
            _ => {}
        }
    }
}

/// Session state owned by the reading side of a transport
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    transaction: Option<ExtendedQuery>,
}

impl SessionState {
    /// Idle state
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no extended-query sequence is open
    pub fn is_idle(&self) -> bool {
        self.transaction.is_none()
    }

    /// Open sequence, if any
    pub fn transaction(&self) -> Option<&ExtendedQuery> {
        self.transaction.as_ref()
    }

    /// Apply one inbound message
    pub fn observe(&mut self, msg: &FrontendMessage) -> Transition {
        match (MessageClass::of(msg), self.transaction.take()) {
            (MessageClass::Begin, None) => {
                let mut tx = ExtendedQuery::default();
                tx.record(msg);
                self.transaction = Some(tx);
                Transition::Opened
            }
            (MessageClass::End, Some(_)) => Transition::Closed,
            (MessageClass::End, None) => {
                // Not expected from a conforming client; treated as a no-op
                tracing::debug!("sync received outside of an extended-query sequence");
                Transition::Unchanged
            }
            (_, Some(mut tx)) => {
                tx.record(msg);
                self.transaction = Some(tx);
                Transition::Unchanged
            }
            (MessageClass::Other, None) => Transition::Unchanged,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.transaction {
            None => write!(f, "idle"),
            Some(_) => write!(f, "extended_query"),
        }
    }
}
