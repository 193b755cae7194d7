//! TCP connector and session over the wire codec.

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::pool::{Connector, QueryOutput, Session};

use super::protocol::{self, AuthRequest, BackendMessage};

/// Factory for authenticated Vertica sessions. One instance is shared
/// by the pool; each `connect` opens a fresh TCP stream and runs the
/// startup handshake under the configured connect timeout.
pub struct VerticaConnector {
    config: DatabaseConfig,
}

impl VerticaConnector {
    /// Creates a connector for the given endpoint.
    #[must_use]
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for VerticaConnector {
    async fn connect(&self) -> Result<Box<dyn Session>> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let handshake = async {
            let stream = TcpStream::connect(&addr)
                .await
                .map_err(|e| Error::ConnectionFailed(format!("{addr}: {e}")))?;
            stream.set_nodelay(true).ok();

            let mut session = VerticaSession {
                stream,
                buf: BytesMut::with_capacity(8 * 1024),
            };
            session
                .send(&protocol::startup(&self.config.user, &self.config.database))
                .await?;

            loop {
                match session.next_message().await? {
                    BackendMessage::Authentication(AuthRequest::CleartextPassword) => {
                        session.send(&protocol::password(&self.config.password)).await?;
                    }
                    BackendMessage::Authentication(AuthRequest::Ok) => {}
                    BackendMessage::Authentication(AuthRequest::Other(code)) => {
                        return Err(Error::UnsupportedAuth(format!(
                            "server requested authentication type {code}, only cleartext is supported"
                        )));
                    }
                    BackendMessage::ErrorResponse(err) => {
                        return Err(Error::ConnectionFailed(err.to_string()));
                    }
                    BackendMessage::ReadyForQuery(_) => break,
                    // ParameterStatus, BackendKeyData, notices and any
                    // server-specific extras carry nothing we act on here.
                    _ => {}
                }
            }

            tracing::info!(addr = %addr, database = %self.config.database, "vertica connection established");
            Ok(session)
        };

        match timeout(self.config.connect_timeout(), handshake).await {
            Ok(Ok(session)) => Ok(Box::new(session)),
            Ok(Err(e @ Error::UnsupportedAuth(_))) => Err(e),
            Ok(Err(e @ Error::ConnectionFailed(_))) => Err(e),
            Ok(Err(e)) => Err(Error::ConnectionFailed(e.to_string())),
            Err(_) => Err(Error::ConnectionFailed(format!(
                "handshake with {addr} timed out after {}ms",
                self.config.connect_timeout_ms
            ))),
        }
    }
}

/// One authenticated session: a TCP stream plus its read buffer.
#[derive(Debug)]
pub struct VerticaSession {
    stream: TcpStream,
    buf: BytesMut,
}

impl VerticaSession {
    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.stream.write_all(frame).await?;
        Ok(())
    }

    async fn next_message(&mut self) -> Result<BackendMessage> {
        loop {
            if let Some(message) = protocol::parse_message(&mut self.buf)? {
                return Ok(message);
            }
            let read = self.stream.read_buf(&mut self.buf).await?;
            if read == 0 {
                return Err(Error::Protocol(
                    "server closed the connection mid-message".to_string(),
                ));
            }
        }
    }
}

#[async_trait]
impl Session for VerticaSession {
    /// Runs one simple-protocol query cycle: collects the column
    /// descriptor and data rows, and drains the stream through
    /// `ReadyForQuery` so the session is reusable even after an error.
    async fn execute(&mut self, sql: &str) -> Result<QueryOutput> {
        self.send(&protocol::query(sql)).await?;

        let mut columns = Vec::new();
        let mut oids: Vec<i32> = Vec::new();
        let mut rows = Vec::new();
        let mut server_error = None;

        loop {
            match self.next_message().await? {
                BackendMessage::RowDescription(described) => {
                    oids = described.iter().map(|c| c.type_oid).collect();
                    columns = described.into_iter().map(|c| c.name).collect();
                }
                BackendMessage::DataRow(cells) => {
                    let row = cells
                        .iter()
                        .enumerate()
                        .map(|(i, cell)| {
                            protocol::decode_cell(
                                oids.get(i).copied().unwrap_or_default(),
                                cell.as_deref(),
                            )
                        })
                        .collect();
                    rows.push(row);
                }
                BackendMessage::CommandComplete(_) | BackendMessage::EmptyQueryResponse => {}
                BackendMessage::ErrorResponse(err) => {
                    server_error = Some(err);
                }
                BackendMessage::NoticeResponse(notice) => {
                    tracing::debug!(notice = %notice, "server notice");
                }
                BackendMessage::ReadyForQuery(_) => break,
                _ => {}
            }
        }

        if let Some(err) = server_error {
            return Err(Error::QueryFailed(err.to_string()));
        }
        Ok(QueryOutput { columns, rows })
    }

    async fn close(&mut self) -> Result<()> {
        // Best-effort goodbye; the socket is going away either way.
        let _ = self.send(&protocol::terminate()).await;
        let _ = self.stream.shutdown().await;
        Ok(())
    }
}
