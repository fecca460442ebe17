//! Backend-side transport over a client connection
//!
//! The transport performs the startup handshake and then relays frontend
//! messages one at a time. While no extended-query sequence is open it writes
//! ReadyForQuery before every read, which is the cue real clients wait for
//! before issuing their next top-level command.

use super::state::{ExtendedQuery, SessionState, Transition};
use crate::config::TransportConfig;
use crate::metrics::{counters, labels};
use crate::protocol::constants::{
    CANCEL_REQUEST_CODE, GSSENC_REQUEST_CODE, SSL_REQUEST_CODE, SUPPORTED_MAJOR, SUPPORTED_MINOR,
};
use crate::protocol::{
    decode_message, decode_startup, encode_message, AuthenticationMessage, BackendMessage,
    FrontendMessage, StartupPacket, StartupParameters, TransactionStatus,
};
use crate::{Error, Result};
use bytes::{Buf, BytesMut};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{watch, Mutex};
use tracing::Instrument;

/// ParseComplete acknowledgement
pub const PARSE_COMPLETE: BackendMessage = BackendMessage::ParseComplete;

/// BindComplete acknowledgement
pub const BIND_COMPLETE: BackendMessage = BackendMessage::BindComplete;

/// CloseComplete acknowledgement
pub const CLOSE_COMPLETE: BackendMessage = BackendMessage::CloseComplete;

/// NoData response to Describe
pub const NO_DATA: BackendMessage = BackendMessage::NoData;

/// Response to an empty query string
pub const EMPTY_QUERY_RESPONSE: BackendMessage = BackendMessage::EmptyQueryResponse;

/// AuthenticationOk
pub const AUTHENTICATION_OK: BackendMessage =
    BackendMessage::Authentication(AuthenticationMessage::Ok);

/// Reading direction: stream, buffered bytes and session state
struct Inbound<R> {
    stream: R,
    buf: BytesMut,
    session: SessionState,
    // ReadyForQuery was written and no message has been read since
    ready_sent: bool,
}

impl<R: AsyncRead + Unpin> Inbound<R> {
    async fn read_startup(&mut self, max_len: usize) -> Result<StartupPacket> {
        loop {
            match decode_startup(&self.buf, max_len) {
                Ok(Some((packet, consumed))) => {
                    self.buf.advance(consumed);
                    return Ok(packet);
                }
                Ok(None) => {}
                Err(e) => return Err(Error::Framing(e.to_string())),
            }
            self.fill().await?;
        }
    }

    async fn read_message(&mut self, max_len: usize) -> Result<FrontendMessage> {
        loop {
            match decode_message(&self.buf, max_len) {
                Ok(Some((msg, consumed))) => {
                    self.buf.advance(consumed);
                    return Ok(msg);
                }
                Ok(None) => {}
                Err(e) => return Err(Error::Decode(e)),
            }
            self.fill().await?;
        }
    }

    /// Read more bytes into the buffer
    async fn fill(&mut self) -> Result<()> {
        let n = self.stream.read_buf(&mut self.buf).await?;
        if n == 0 {
            if self.buf.is_empty() {
                return Err(Error::ConnectionClosed);
            }
            return Err(Error::Framing(format!(
                "stream ended inside a packet ({} bytes buffered)",
                self.buf.len()
            )));
        }
        Ok(())
    }
}

/// Writing direction: stream and the status reported in ReadyForQuery
struct Outbound<W> {
    stream: W,
    ready_status: TransactionStatus,
}

impl<W: AsyncWrite + Unpin> Outbound<W> {
    async fn send(&mut self, msgs: &[BackendMessage]) -> Result<()> {
        let mut buf = BytesMut::new();
        for msg in msgs {
            buf.extend_from_slice(&encode_message(msg)?);
        }
        self.stream.write_all(&buf).await?;
        self.stream.flush().await?;

        for msg in msgs {
            counters::message_sent(msg.name());
        }
        Ok(())
    }
}

/// Backend-side transport for one client connection
///
/// Methods take `&self`: wrap the transport in an `Arc` to read from one task
/// while other tasks write. Reading and writing are guarded by separate locks,
/// so a `write` never waits on a blocked read.
///
/// At most one task should call [`Transport::next_frontend_message`]; the
/// reader lock serializes concurrent callers but message order between them is
/// then arbitrary.
pub struct Transport<R, W> {
    reader: Mutex<Inbound<R>>,
    writer: Mutex<Outbound<W>>,
    initialized: AtomicBool,
    transaction: watch::Sender<Option<ExtendedQuery>>,
    config: TransportConfig,
}

impl<S> Transport<ReadHalf<S>, WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite,
{
    /// Create a transport over a single duplex stream
    pub fn from_stream(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(reader, writer)
    }
}

impl<R, W> Transport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a transport from separate input and output streams
    pub fn new(reader: R, writer: W) -> Self {
        Self::assemble(reader, writer, TransportConfig::default())
    }

    /// Create a transport with explicit limits
    ///
    /// The configuration is validated first, so values deserialized without
    /// going through the builder are checked too.
    pub fn with_config(reader: R, writer: W, config: TransportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(reader, writer, config))
    }

    fn assemble(reader: R, writer: W, config: TransportConfig) -> Self {
        let (transaction, _) = watch::channel(None);
        Self {
            reader: Mutex::new(Inbound {
                stream: reader,
                buf: BytesMut::with_capacity(config.read_buffer_capacity),
                session: SessionState::new(),
                ready_sent: false,
            }),
            writer: Mutex::new(Outbound {
                stream: writer,
                ready_status: TransactionStatus::Idle,
            }),
            initialized: AtomicBool::new(false),
            transaction,
            config,
        }
    }

    /// Limits in effect
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// True once a startup packet with version 3.0 was accepted
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Open extended-query sequence, if any
    pub fn transaction(&self) -> Option<ExtendedQuery> {
        *self.transaction.borrow()
    }

    /// True while an extended-query sequence is open
    pub fn in_transaction(&self) -> bool {
        self.transaction.borrow().is_some()
    }

    /// Subscribe to the extended-query marker
    ///
    /// Receivers are notified when a sequence opens or closes.
    pub fn watch_transaction(&self) -> watch::Receiver<Option<ExtendedQuery>> {
        self.transaction.subscribe()
    }

    /// Perform the startup handshake
    ///
    /// Reads exactly one startup packet. Version 3.0 marks the transport as
    /// initialized and returns the client's parameters. Any other version,
    /// including the SSL, GSSAPI and cancel request codes, fails with
    /// `Error::ProtocolVersionUnsupported` and writes nothing; the caller is
    /// expected to close the connection.
    ///
    /// Must be called once per connection.
    pub async fn startup(&self) -> Result<StartupParameters> {
        async {
            let mut inbound = self.reader.lock().await;

            let packet = match inbound.read_startup(self.config.max_startup_packet_size).await {
                Ok(packet) => packet,
                Err(e) => {
                    let reason = match e {
                        Error::Framing(_) => labels::REASON_FRAMING,
                        _ => labels::REASON_IO,
                    };
                    tracing::warn!(error = %e, "startup packet could not be read");
                    counters::startup_rejected(reason);
                    return Err(e);
                }
            };

            if (packet.major, packet.minor) != (SUPPORTED_MAJOR, SUPPORTED_MINOR) {
                let request = match packet.code() {
                    SSL_REQUEST_CODE => "ssl",
                    GSSENC_REQUEST_CODE => "gssenc",
                    CANCEL_REQUEST_CODE => "cancel",
                    _ => "startup",
                };
                tracing::warn!(
                    major = packet.major,
                    minor = packet.minor,
                    request,
                    "rejecting unsupported protocol version"
                );
                counters::startup_rejected(labels::REASON_VERSION);
                return Err(Error::ProtocolVersionUnsupported {
                    major: packet.major,
                    minor: packet.minor,
                });
            }

            let params = packet.parameters().map_err(|e| {
                counters::startup_rejected(labels::REASON_FRAMING);
                Error::Framing(e.to_string())
            })?;

            self.initialized.store(true, Ordering::Release);
            counters::startup_accepted();
            tracing::info!(
                user = params.user().unwrap_or_default(),
                database = params.database().unwrap_or_default(),
                "startup complete"
            );
            Ok(params)
        }
        .instrument(tracing::info_span!("startup"))
        .await
    }

    /// Relay the next frontend message
    ///
    /// When no extended-query sequence is open, ReadyForQuery is written
    /// before reading; a failure to write it is returned without reading.
    /// Parse and Bind open a sequence, Sync closes it. The ReadyForQuery that
    /// follows a Sync is written by the *next* call.
    ///
    /// Cancelling the returned future while it waits for input is safe: buffered
    /// bytes are kept and ReadyForQuery is not repeated on the next call.
    ///
    /// # Panics
    ///
    /// Panics if called before [`Transport::startup`] succeeded.
    pub async fn next_frontend_message(&self) -> Result<FrontendMessage> {
        assert!(
            self.is_initialized(),
            "next_frontend_message called before a successful startup"
        );

        let mut inbound = self.reader.lock().await;

        if inbound.session.is_idle() && !inbound.ready_sent {
            self.emit_ready_for_query().await?;
            inbound.ready_sent = true;
        }

        let msg = inbound.read_message(self.config.max_message_size).await?;
        inbound.ready_sent = false;

        let kind = msg.kind();
        counters::message_received(kind.as_str());

        let transition = inbound.session.observe(&msg);
        let current = inbound.session.transaction().copied();
        match transition {
            Transition::Opened => {
                counters::transaction_opened();
                tracing::debug!(kind = %kind, "extended-query sequence opened");
                self.transaction.send_replace(current);
            }
            Transition::Closed => {
                counters::transaction_closed();
                tracing::debug!("extended-query sequence closed");
                self.transaction.send_replace(None);
            }
            Transition::Unchanged if current.is_some() => {
                // Refresh the counters without waking watchers
                self.transaction.send_if_modified(|marker| {
                    *marker = current;
                    false
                });
            }
            Transition::Unchanged => {}
        }

        tracing::debug!(kind = %kind, state = %inbound.session, "frontend message");
        Ok(msg)
    }

    /// Write one backend message and flush
    pub async fn write(&self, msg: &BackendMessage) -> Result<()> {
        self.writer.lock().await.send(std::slice::from_ref(msg)).await
    }

    /// Write several backend messages with a single flush
    pub async fn write_batch(&self, msgs: &[BackendMessage]) -> Result<()> {
        self.writer.lock().await.send(msgs).await
    }

    /// Set the status byte carried by ReadyForQuery messages the transport emits
    ///
    /// Defaults to `TransactionStatus::Idle`.
    pub async fn set_ready_status(&self, status: TransactionStatus) {
        self.writer.lock().await.ready_status = status;
    }

    /// Flush and shut down the write direction
    pub async fn shutdown(&self) -> Result<()> {
        let mut outbound = self.writer.lock().await;
        outbound.stream.flush().await?;
        outbound.stream.shutdown().await?;
        Ok(())
    }

    async fn emit_ready_for_query(&self) -> Result<()> {
        let mut outbound = self.writer.lock().await;
        let msg = BackendMessage::ReadyForQuery {
            status: outbound.ready_status,
        };
        outbound.send(std::slice::from_ref(&msg)).await?;
        counters::ready_for_query_emitted();
        Ok(())
    }
}

impl<R, W> std::fmt::Debug for Transport<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("initialized", &self.initialized.load(Ordering::Acquire))
            .field("in_transaction", &self.transaction.borrow().is_some())
            .finish_non_exhaustive()
    }
}
