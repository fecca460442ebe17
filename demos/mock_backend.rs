//! Mock Postgres backend built on `pg-transport`
//!
//! Accepts connections, performs the startup handshake and answers every
//! command with an empty result. Point `psql` at it to watch the protocol flow:
//!
//! ```text
//! RUST_LOG=pg_transport=debug,mock_backend=debug cargo run --example mock_backend
//! psql -h 127.0.0.1 -p 5433 -U demo
//! ```

use pg_transport::connection::{
    Transport, AUTHENTICATION_OK, BIND_COMPLETE, CLOSE_COMPLETE, EMPTY_QUERY_RESPONSE, NO_DATA,
    PARSE_COMPLETE,
};
use pg_transport::protocol::{BackendMessage, FrontendMessage};
use pg_transport::{Error, Result};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("PG_TRANSPORT_ADDR").unwrap_or_else(|_| "127.0.0.1:5433".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);

    let mut next_pid = 1;
    loop {
        let (socket, peer) = listener.accept().await?;
        let pid = next_pid;
        next_pid += 1;

        tokio::spawn(async move {
            match serve(socket, pid).await {
                Ok(()) | Err(Error::ConnectionClosed) => {
                    tracing::info!(%peer, pid, "connection closed")
                }
                Err(e) => tracing::warn!(%peer, pid, error = %e, "connection failed"),
            }
        });
    }
}

async fn serve(socket: TcpStream, pid: i32) -> Result<()> {
    let transport = Transport::from_stream(socket);
    let params = transport.startup().await?;
    tracing::info!(pid, user = params.user().unwrap_or("?"), "client connected");

    // ReadyForQuery is sent by the transport on the first read
    transport
        .write_batch(&[
            AUTHENTICATION_OK,
            BackendMessage::ParameterStatus {
                name: "server_version".into(),
                value: "16.0".into(),
            },
            BackendMessage::ParameterStatus {
                name: "client_encoding".into(),
                value: "UTF8".into(),
            },
            BackendMessage::BackendKeyData {
                process_id: pid,
                secret_key: 0,
            },
        ])
        .await?;

    loop {
        let msg = transport.next_frontend_message().await?;
        tracing::debug!(pid, ?msg, "received");

        match msg {
            FrontendMessage::Query(query) if query.trim().is_empty() => {
                transport.write(&EMPTY_QUERY_RESPONSE).await?;
            }
            FrontendMessage::Query(_) => {
                transport
                    .write(&BackendMessage::CommandComplete("SELECT 0".into()))
                    .await?;
            }
            FrontendMessage::Parse { .. } => transport.write(&PARSE_COMPLETE).await?,
            FrontendMessage::Bind { .. } => transport.write(&BIND_COMPLETE).await?,
            FrontendMessage::Describe { .. } => transport.write(&NO_DATA).await?,
            FrontendMessage::Execute { .. } => {
                transport
                    .write(&BackendMessage::CommandComplete("SELECT 0".into()))
                    .await?;
            }
            FrontendMessage::Close { .. } => transport.write(&CLOSE_COMPLETE).await?,
            FrontendMessage::Sync | FrontendMessage::Flush => {}
            FrontendMessage::Terminate => {
                transport.shutdown().await?;
                return Ok(());
            }
        }
    }
}
