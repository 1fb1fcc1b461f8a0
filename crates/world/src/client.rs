//! Transport client: one TCP connection, one command in flight.
//!
//! A dropped connection (reset, broken pipe, EOF) is re-established and
//! the interrupted command re-sent, up to `reconnect_attempts` times.
//! Refused connections, handshake mismatches and read timeouts are never
//! retried.

use std::io::ErrorKind;
use std::time::Duration;

use blockwright_config::WorldConfig;
use blockwright_core::error::TransportError;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::protocol::{Command, FrameError, LineBuffer, Reply, encode_frame, read_frame};

pub struct TransportClient {
    config: WorldConfig,
    conn: Option<Connection>,
}

struct Connection {
    stream: TcpStream,
    buffer: LineBuffer,
}

/// How a single request/response exchange went wrong.
enum Failure {
    /// The socket went away; reconnecting may help.
    Broken(String),
    Fatal(TransportError),
}

impl TransportClient {
    /// Connect and handshake. Fails fast if nothing is listening.
    pub async fn connect(config: WorldConfig) -> Result<Self, TransportError> {
        let mut client = Self { config, conn: None };
        client.conn = Some(client.open().await?);
        Ok(client)
    }

    pub fn address(&self) -> String {
        self.config.address()
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Send one command and wait for its reply.
    pub async fn call(&mut self, command: &Command) -> Result<Value, TransportError> {
        let mut reconnects = 0u32;
        loop {
            let mut conn = match self.conn.take() {
                Some(conn) => conn,
                None => self.open().await?,
            };

            match conn.round_trip(command, self.config.read_timeout()).await {
                Ok(reply) => {
                    self.conn = Some(conn);
                    return into_result(reply);
                }
                Err(Failure::Fatal(err)) => return Err(err),
                Err(Failure::Broken(reason)) => {
                    if self.config.reconnect_attempts == 0 {
                        return Err(TransportError::ConnectionLost(reason));
                    }
                    if reconnects >= self.config.reconnect_attempts {
                        return Err(TransportError::ReconnectExhausted {
                            attempts: reconnects,
                            last: reason,
                        });
                    }
                    reconnects += 1;
                    warn!(
                        method = command.method(),
                        attempt = reconnects,
                        %reason,
                        "Connection lost. Reconnecting..."
                    );
                }
            }
        }
    }

    /// Drop the connection, if any.
    pub async fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            let _ = conn.stream.shutdown().await;
        }
    }

    async fn open(&self) -> Result<Connection, TransportError> {
        let addr = self.config.address();
        let stream = match tokio::time::timeout(
            self.config.connect_timeout(),
            TcpStream::connect(&addr),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(TransportError::ConnectionRefused {
                    addr,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(TransportError::ConnectionRefused {
                    addr,
                    reason: format!(
                        "timed out after {}s",
                        self.config.connect_timeout_secs
                    ),
                });
            }
        };
        let _ = stream.set_nodelay(true);

        let mut conn = Connection {
            stream,
            buffer: LineBuffer::new(self.config.max_frame_bytes),
        };

        let reply = match conn.round_trip(&Command::Ping, self.config.read_timeout()).await {
            Ok(Reply::Success { result }) => result,
            Ok(Reply::Error { error }) => {
                return Err(TransportError::Handshake {
                    addr,
                    reply: format!("error reply: {error}"),
                });
            }
            Err(Failure::Broken(reason)) => {
                return Err(TransportError::Handshake { addr, reply: reason });
            }
            Err(Failure::Fatal(err)) => {
                return Err(TransportError::Handshake {
                    addr,
                    reply: err.to_string(),
                });
            }
        };
        if reply != Value::from("pong") {
            return Err(TransportError::Handshake {
                addr,
                reply: reply.to_string(),
            });
        }

        info!(%addr, "Connected to world listener");
        Ok(conn)
    }
}

impl Connection {
    async fn round_trip(&mut self, command: &Command, timeout: Duration) -> Result<Reply, Failure> {
        let frame = encode_frame(&command.to_envelope())
            .map_err(|e| Failure::Fatal(TransportError::Protocol(e.to_string())))?;

        debug!(method = command.method(), "Sending command");
        if let Err(e) = self.stream.write_all(&frame).await {
            return Err(classify(e));
        }

        let line = match tokio::time::timeout(timeout, read_frame(&mut self.stream, &mut self.buffer)).await
        {
            Err(_) => {
                return Err(Failure::Fatal(TransportError::Timeout {
                    method: command.method().to_string(),
                    timeout_secs: timeout.as_secs(),
                }));
            }
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => return Err(Failure::Broken("server closed the connection".into())),
            Ok(Err(FrameError::Io(e))) => return Err(classify(e)),
            Ok(Err(e)) => return Err(Failure::Fatal(TransportError::Protocol(e.to_string()))),
        };

        serde_json::from_str(&line).map_err(|e| {
            Failure::Fatal(TransportError::Protocol(format!("invalid reply `{line}`: {e}")))
        })
    }
}

fn classify(err: std::io::Error) -> Failure {
    match err.kind() {
        ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected
        | ErrorKind::UnexpectedEof => Failure::Broken(err.to_string()),
        _ => Failure::Fatal(TransportError::Io(err)),
    }
}

fn into_result(reply: Reply) -> Result<Value, TransportError> {
    match reply {
        Reply::Success { result } => Ok(result),
        Reply::Error { error } => Err(TransportError::Remote(error)),
    }
}
