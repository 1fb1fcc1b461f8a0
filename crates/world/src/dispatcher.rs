//! Listener side of the command channel.
//!
//! Connections are served one at a time; within a connection, requests are
//! handled strictly in order. A malformed or unknown request gets an error
//! reply and the connection stays open.

use async_trait::async_trait;
use blockwright_core::world::Inventory;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::protocol::{
    Command, Envelope, FrameError, LineBuffer, ProtocolError, Reply, encode_frame, read_frame,
};

/// A failure inside the hosted world, reported verbatim to the client.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct HostError(pub String);

/// The world a dispatcher exposes.
#[async_trait]
pub trait WorldHost: Send {
    async fn position(&mut self) -> Result<[f64; 3], HostError>;

    async fn teleport(&mut self, x: f64, y: f64, z: f64) -> Result<(), HostError>;

    /// Bare material name at a cell, `"air"` when empty.
    async fn block_at(&mut self, x: i64, y: i64, z: i64) -> Result<String, HostError>;

    async fn place_block(&mut self, x: i64, y: i64, z: i64, material: &str) -> Result<bool, HostError>;

    async fn inventory(&mut self) -> Result<Inventory, HostError>;

    async fn set_inventory(&mut self, item: &str, count: i64) -> Result<(), HostError>;
}

pub struct Dispatcher<H> {
    host: H,
    max_frame_bytes: usize,
}

impl<H: WorldHost> Dispatcher<H> {
    pub fn new(host: H, max_frame_bytes: usize) -> Self {
        Self {
            host,
            max_frame_bytes,
        }
    }

    /// Accept and serve connections until the listener fails.
    pub async fn serve(&mut self, listener: TcpListener) -> std::io::Result<()> {
        info!(addr = %listener.local_addr()?, "World listener ready");
        loop {
            let (stream, peer) = listener.accept().await?;
            info!(%peer, "Client connected");
            match self.handle_connection(stream).await {
                Ok(()) => info!(%peer, "Client disconnected"),
                Err(e) => warn!(%peer, error = %e, "Connection ended with error"),
            }
        }
    }

    /// Serve one connection until the peer closes it.
    pub async fn handle_connection(&mut self, mut stream: TcpStream) -> Result<(), FrameError> {
        let mut buffer = LineBuffer::new(self.max_frame_bytes);
        loop {
            let reply = match read_frame(&mut stream, &mut buffer).await {
                Ok(Some(line)) => self.dispatch_line(&line).await,
                Ok(None) => return Ok(()),
                Err(FrameError::Io(e)) => return Err(FrameError::Io(e)),
                Err(e) => {
                    warn!(error = %e, "Rejected frame");
                    Reply::error(e)
                }
            };
            let frame = encode_frame(&reply).map_err(|e| FrameError::Io(e.into()))?;
            stream.write_all(&frame).await?;
        }
    }

    /// Decode one request line and produce its reply.
    pub async fn dispatch_line(&mut self, line: &str) -> Reply {
        let command = serde_json::from_str::<Envelope>(line)
            .map_err(|e| ProtocolError::Malformed(e.to_string()))
            .and_then(Command::from_envelope);

        let command = match command {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Bad request");
                return Reply::error(e);
            }
        };

        debug!(method = command.method(), "Dispatching");
        match self.execute(command).await {
            Ok(result) => Reply::success(result),
            Err(e) => Reply::error(e),
        }
    }

    pub async fn execute(&mut self, command: Command) -> Result<Value, ProtocolError> {
        let host = &mut self.host;
        let result = match command {
            Command::Ping => json!("pong"),
            Command::GetPosition => json!(host.position().await.map_err(host_err)?),
            Command::MoveTo { x, y, z } => {
                host.teleport(x, y, z).await.map_err(host_err)?;
                Value::Null
            }
            Command::GetBlockAt { x, y, z } => json!(host.block_at(x, y, z).await.map_err(host_err)?),
            Command::GetInventory => json!(host.inventory().await.map_err(host_err)?),
            Command::PlaceBlock { x, y, z, material } => {
                json!(host.place_block(x, y, z, &material).await.map_err(host_err)?)
            }
            Command::SetInventory { item, count } => {
                host.set_inventory(&item, count).await.map_err(host_err)?;
                Value::Null
            }
        };
        Ok(result)
    }
}

fn host_err(e: HostError) -> ProtocolError {
    ProtocolError::Host(e.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedWorld;
    use tokio::io::{AsyncBufReadExt, BufReader};

    async fn spawn_dispatcher(world: SimulatedWorld) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = Dispatcher::new(world, 1024).serve(listener).await;
        });
        addr
    }

    #[tokio::test]
    async fn dispatch_ping_and_place() {
        let mut dispatcher = Dispatcher::new(SimulatedWorld::default(), 1024);
        assert_eq!(
            dispatcher.dispatch_line(r#"{"method":"ping","params":[]}"#).await,
            Reply::success("pong")
        );
        assert_eq!(
            dispatcher
                .dispatch_line(r#"{"method":"place_block","params":[0,64,0,"minecraft:stone"]}"#)
                .await,
            Reply::success(true)
        );
        assert_eq!(
            dispatcher
                .dispatch_line(r#"{"method":"get_block_at","params":[0,64,0]}"#)
                .await,
            Reply::success("stone")
        );
    }

    #[tokio::test]
    async fn bad_requests_get_error_replies() {
        let mut dispatcher = Dispatcher::new(SimulatedWorld::default(), 1024);
        assert_eq!(
            dispatcher.dispatch_line(r#"{"method":"fly","params":[]}"#).await,
            Reply::error("Unknown method: fly")
        );
        assert!(matches!(
            dispatcher.dispatch_line("not json").await,
            Reply::Error { .. }
        ));
        assert!(matches!(
            dispatcher
                .dispatch_line(r#"{"method":"move_to","params":[1]}"#)
                .await,
            Reply::Error { .. }
        ));
    }

    #[tokio::test]
    async fn connection_survives_bad_requests() {
        let world = SimulatedWorld::default();
        let addr = spawn_dispatcher(world.clone()).await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        // Two requests in one write, the first one unknown.
        write
            .write_all(b"{\"method\":\"fly\",\"params\":[]}\n{\"method\":\"ping\",\"params\":[]}\n")
            .await
            .unwrap();
        let first: Reply = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        let second: Reply = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(first, Reply::error("Unknown method: fly"));
        assert_eq!(second, Reply::success("pong"));

        // A request split across writes.
        write.write_all(b"{\"method\":\"set_inv").await.unwrap();
        write.flush().await.unwrap();
        write
            .write_all(b"entory\",\"params\":[\"stone\",5]}\n")
            .await
            .unwrap();
        let third: Reply = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(third, Reply::Success { result: Value::Null });
        assert_eq!(
            world.clone().inventory().await.unwrap().get("stone"),
            Some(&5)
        );
    }

    #[tokio::test]
    async fn oversized_frame_rejected_without_closing() {
        let addr = spawn_dispatcher(SimulatedWorld::default()).await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        let mut big = vec![b'x'; 4096];
        big.push(b'\n');
        write.write_all(&big).await.unwrap();
        write
            .write_all(b"{\"method\":\"ping\",\"params\":[]}\n")
            .await
            .unwrap();

        let first: Reply = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(matches!(first, Reply::Error { .. }));
        let second: Reply = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(second, Reply::success("pong"));
    }

    #[tokio::test]
    async fn serves_connections_one_after_another() {
        let addr = spawn_dispatcher(SimulatedWorld::default()).await;
        for _ in 0..2 {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut lines = BufReader::new(read).lines();
            write
                .write_all(b"{\"method\":\"get_position\",\"params\":[]}\n")
                .await
                .unwrap();
            let reply: Reply = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
            assert_eq!(reply, Reply::success(json!([0.5, 64.0, 0.5])));
        }
    }
}
