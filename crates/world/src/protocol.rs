//! Wire protocol between the transport client and the dispatcher.
//!
//! Every message is one compact JSON object followed by `\n`:
//!
//! ```text
//! -> {"method":"place_block","params":[10,64,-3,"minecraft:stone"]}
//! <- {"status":"success","result":true}
//! <- {"status":"error","error":"Unknown method: fly"}
//! ```
//!
//! On the Rust side a request is a closed [`Command`] enum; the
//! method-name/positional-params envelope only exists at the edge.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Every command the dispatcher understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ping,
    GetPosition,
    MoveTo { x: f64, y: f64, z: f64 },
    GetBlockAt { x: i64, y: i64, z: i64 },
    GetInventory,
    PlaceBlock { x: i64, y: i64, z: i64, material: String },
    SetInventory { item: String, count: i64 },
}

impl Command {
    /// The wire method name.
    pub fn method(&self) -> &'static str {
        match self {
            Command::Ping => "ping",
            Command::GetPosition => "get_position",
            Command::MoveTo { .. } => "move_to",
            Command::GetBlockAt { .. } => "get_block_at",
            Command::GetInventory => "get_inventory",
            Command::PlaceBlock { .. } => "place_block",
            Command::SetInventory { .. } => "set_inventory",
        }
    }

    pub fn to_envelope(&self) -> Envelope {
        let params = match self {
            Command::Ping | Command::GetPosition | Command::GetInventory => vec![],
            Command::MoveTo { x, y, z } => vec![(*x).into(), (*y).into(), (*z).into()],
            Command::GetBlockAt { x, y, z } => vec![(*x).into(), (*y).into(), (*z).into()],
            Command::PlaceBlock { x, y, z, material } => vec![
                (*x).into(),
                (*y).into(),
                (*z).into(),
                material.clone().into(),
            ],
            Command::SetInventory { item, count } => vec![item.clone().into(), (*count).into()],
        };
        Envelope {
            method: self.method().to_string(),
            params,
        }
    }

    /// Decode a wire envelope, checking arity and parameter types.
    pub fn from_envelope(envelope: Envelope) -> Result<Command, ProtocolError> {
        let Envelope { method, params } = envelope;
        let p = Params {
            method: &method,
            values: &params,
        };
        let command = match method.as_str() {
            "ping" => {
                p.arity(0)?;
                Command::Ping
            }
            "get_position" => {
                p.arity(0)?;
                Command::GetPosition
            }
            "move_to" => {
                p.arity(3)?;
                Command::MoveTo {
                    x: p.get(0)?,
                    y: p.get(1)?,
                    z: p.get(2)?,
                }
            }
            "get_block_at" => {
                p.arity(3)?;
                Command::GetBlockAt {
                    x: p.get(0)?,
                    y: p.get(1)?,
                    z: p.get(2)?,
                }
            }
            "get_inventory" => {
                p.arity(0)?;
                Command::GetInventory
            }
            "place_block" => {
                p.arity(4)?;
                Command::PlaceBlock {
                    x: p.get(0)?,
                    y: p.get(1)?,
                    z: p.get(2)?,
                    material: p.get(3)?,
                }
            }
            "set_inventory" => {
                p.arity(2)?;
                Command::SetInventory {
                    item: p.get(0)?,
                    count: p.get(1)?,
                }
            }
            _ => return Err(ProtocolError::UnknownMethod(method)),
        };
        Ok(command)
    }
}

struct Params<'a> {
    method: &'a str,
    values: &'a [Value],
}

impl Params<'_> {
    fn arity(&self, expected: usize) -> Result<(), ProtocolError> {
        if self.values.len() == expected {
            Ok(())
        } else {
            Err(ProtocolError::BadParams {
                method: self.method.to_string(),
                reason: format!("expected {expected} params, got {}", self.values.len()),
            })
        }
    }

    fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T, ProtocolError> {
        serde_json::from_value(self.values[index].clone()).map_err(|e| ProtocolError::BadParams {
            method: self.method.to_string(),
            reason: format!("param {index}: {e}"),
        })
    }
}

/// `{"method": ..., "params": [...]}` as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

/// `{"status": "success", "result": ...}` or `{"status": "error", "error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Reply {
    Success {
        #[serde(default)]
        result: Value,
    },
    Error {
        error: String,
    },
}

impl Reply {
    pub fn success(result: impl Into<Value>) -> Self {
        Reply::Success {
            result: result.into(),
        }
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Reply::Error {
            error: message.to_string(),
        }
    }
}

/// Request-level failures reported back to the client as error replies.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Bad params for {method}: {reason}")]
    BadParams { method: String, reason: String },

    #[error("{0}")]
    Host(String),
}

/// Serialize `value` as one frame, newline included.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Frame exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,
}

/// Accumulates bytes across socket reads and yields complete lines.
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    max_frame: usize,
    /// Dropping the tail of an oversized frame until the next newline.
    discarding: bool,
}

impl LineBuffer {
    pub fn new(max_frame: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame,
            discarding: false,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// The next complete, non-blank line without its delimiter.
    ///
    /// An oversized frame is reported once and then skipped up to its
    /// terminating newline, so the stream stays usable.
    pub fn next_frame(&mut self) -> Result<Option<String>, FrameError> {
        loop {
            let Some(end) = self.buf.iter().position(|&b| b == b'\n') else {
                if self.discarding {
                    self.buf.clear();
                } else if self.buf.len() > self.max_frame {
                    self.buf.clear();
                    self.discarding = true;
                    return Err(FrameError::TooLarge {
                        limit: self.max_frame,
                    });
                }
                return Ok(None);
            };

            let line: Vec<u8> = self.buf.drain(..=end).collect();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.len() - 1 > self.max_frame {
                return Err(FrameError::TooLarge {
                    limit: self.max_frame,
                });
            }

            let text = std::str::from_utf8(&line[..end])
                .map_err(|_| FrameError::InvalidUtf8)?
                .trim_end_matches('\r');
            if text.trim().is_empty() {
                continue;
            }
            return Ok(Some(text.to_string()));
        }
    }

    /// Bytes buffered but not yet returned as a frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Read until one full frame is available. `Ok(None)` means the peer closed.
pub async fn read_frame<R>(reader: &mut R, buffer: &mut LineBuffer) -> Result<Option<String>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(frame) = buffer.next_frame()? {
            return Ok(Some(frame));
        }
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buffer.push(&chunk[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_envelope_shape() {
        let cmd = Command::PlaceBlock {
            x: 1,
            y: 64,
            z: -2,
            material: "minecraft:stone".into(),
        };
        let json = serde_json::to_value(cmd.to_envelope()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"method": "place_block", "params": [1, 64, -2, "minecraft:stone"]})
        );

        let json = serde_json::to_value(Command::Ping.to_envelope()).unwrap();
        assert_eq!(json, serde_json::json!({"method": "ping", "params": []}));
    }

    #[test]
    fn every_command_decodes_from_its_envelope() {
        let commands = vec![
            Command::Ping,
            Command::GetPosition,
            Command::MoveTo { x: 1.5, y: 66.0, z: -3.0 },
            Command::GetBlockAt { x: 1, y: 2, z: 3 },
            Command::GetInventory,
            Command::PlaceBlock { x: 0, y: 0, z: 0, material: "minecraft:glass".into() },
            Command::SetInventory { item: "stone".into(), count: 5 },
        ];
        for cmd in commands {
            let wire = serde_json::to_string(&cmd.to_envelope()).unwrap();
            let envelope: Envelope = serde_json::from_str(&wire).unwrap();
            assert_eq!(Command::from_envelope(envelope).unwrap(), cmd);
        }
    }

    #[test]
    fn missing_params_default_to_empty() {
        let envelope: Envelope = serde_json::from_str(r#"{"method":"get_inventory"}"#).unwrap();
        assert_eq!(Command::from_envelope(envelope).unwrap(), Command::GetInventory);
    }

    #[test]
    fn unknown_method_rejected() {
        let envelope = Envelope {
            method: "fly".into(),
            params: vec![],
        };
        let err = Command::from_envelope(envelope).unwrap_err();
        assert_eq!(err.to_string(), "Unknown method: fly");
    }

    #[test]
    fn wrong_arity_and_types_rejected() {
        let envelope = Envelope {
            method: "get_block_at".into(),
            params: vec![1.into(), 2.into()],
        };
        assert!(matches!(
            Command::from_envelope(envelope),
            Err(ProtocolError::BadParams { .. })
        ));

        let envelope = Envelope {
            method: "set_inventory".into(),
            params: vec!["stone".into(), "five".into()],
        };
        assert!(matches!(
            Command::from_envelope(envelope),
            Err(ProtocolError::BadParams { .. })
        ));
    }

    #[test]
    fn reply_wire_shapes() {
        assert_eq!(
            serde_json::to_value(Reply::success("pong")).unwrap(),
            serde_json::json!({"status": "success", "result": "pong"})
        );
        assert_eq!(
            serde_json::to_value(Reply::error("boom")).unwrap(),
            serde_json::json!({"status": "error", "error": "boom"})
        );
        let reply: Reply = serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        assert_eq!(reply, Reply::Success { result: Value::Null });
    }

    #[test]
    fn encoded_frames_have_exactly_one_newline() {
        let frame = encode_frame(&Command::SetInventory {
            item: "line\nbreak".into(),
            count: 1,
        }
        .to_envelope())
        .unwrap();
        assert_eq!(frame.iter().filter(|&&b| b == b'\n').count(), 1);
        assert_eq!(frame.last(), Some(&b'\n'));
    }

    #[test]
    fn line_buffer_joins_partial_reads() {
        let mut buffer = LineBuffer::new(1024);
        buffer.push(br#"{"status":"succ"#);
        assert!(buffer.next_frame().unwrap().is_none());
        buffer.push(b"ess\",\"result\":1}\n{\"status\"");
        assert_eq!(
            buffer.next_frame().unwrap().as_deref(),
            Some(r#"{"status":"success","result":1}"#)
        );
        assert!(buffer.next_frame().unwrap().is_none());
        assert_eq!(buffer.pending(), 9);
    }

    #[test]
    fn line_buffer_splits_multiple_frames_and_skips_blank_lines() {
        let mut buffer = LineBuffer::new(1024);
        buffer.push(b"a\r\n\n  \nb\n");
        assert_eq!(buffer.next_frame().unwrap().as_deref(), Some("a"));
        assert_eq!(buffer.next_frame().unwrap().as_deref(), Some("b"));
        assert!(buffer.next_frame().unwrap().is_none());
    }

    #[test]
    fn oversized_frame_is_skipped_once() {
        let mut buffer = LineBuffer::new(8);
        buffer.push(b"0123456789abc");
        assert!(matches!(buffer.next_frame(), Err(FrameError::TooLarge { limit: 8 })));
        buffer.push(b"def\nok\n");
        assert_eq!(buffer.next_frame().unwrap().as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn read_frame_reports_eof() {
        let mut buffer = LineBuffer::new(1024);
        let mut input: &[u8] = b"{\"a\":1}\n";
        assert_eq!(
            read_frame(&mut input, &mut buffer).await.unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        assert!(read_frame(&mut input, &mut buffer).await.unwrap().is_none());
    }
}
