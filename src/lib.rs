//! Backend-side Postgres wire transport
//!
//! `pg-transport` sits on the server side of a client connection and gives a
//! proxy or mock server exactly three operations:
//!
//! * [`Transport::startup`] reads the startup packet and accepts protocol 3.0 only
//! * [`Transport::next_frontend_message`] relays one client message, writing
//!   ReadyForQuery first whenever no extended-query sequence is open
//! * [`Transport::write`] sends one backend message
//!
//! ```no_run
//! use pg_transport::connection::{Transport, BIND_COMPLETE, PARSE_COMPLETE};
//! use pg_transport::protocol::FrontendMessage;
//!
//! # async fn serve(socket: tokio::net::TcpStream) -> pg_transport::Result<()> {
//! let transport = Transport::from_stream(socket);
//! transport.startup().await?;
//!
//! loop {
//!     match transport.next_frontend_message().await? {
//!         FrontendMessage::Parse { .. } => transport.write(&PARSE_COMPLETE).await?,
//!         FrontendMessage::Bind { .. } => transport.write(&BIND_COMPLETE).await?,
//!         FrontendMessage::Terminate => return Ok(()),
//!         _ => {}
//!     }
//! }
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod protocol;

pub use config::TransportConfig;
pub use connection::Transport;
pub use error::{Error, Result};
