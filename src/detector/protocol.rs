//! TCP protocol for viewer ↔ detector-server communication.
//!
//! Self-contained: message types plus length-delimited bincode framing.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use super::DetectorOptions;
use crate::camera::FrameImage;
use crate::landmark::HolisticResult;

// --- Message types ---

/// Viewer → detector server
#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub enum ClientMessage {
    Configure { options: DetectorOptions },
    Frame { frame: FrameImage },
    /// Drop tracking state (source switch)
    Reset,
}

/// Detector server → viewer
#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub enum ServerMessage {
    /// Model loaded, frames accepted from here on
    Ready,
    Detection { result: HolisticResult },
}

// --- TCP codec helpers ---

pub type MessageStream = Framed<TcpStream, LengthDelimitedCodec>;

/// Create a framed message stream with length-delimited framing.
pub fn message_stream(stream: TcpStream) -> MessageStream {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(16 * 1024 * 1024) // 16MB
        .new_codec();
    Framed::new(stream, codec)
}

/// Send a serializable message (bincode + length prefix).
pub async fn send_message<T: Serialize>(
    stream: &mut MessageStream,
    msg: &T,
) -> anyhow::Result<()> {
    let data = bincode::serialize(msg)?;
    stream.send(Bytes::from(data)).await?;
    Ok(())
}

/// Receive and deserialize a message.
pub async fn recv_message<T: DeserializeOwned>(
    stream: &mut MessageStream,
) -> anyhow::Result<T> {
    match stream.next().await {
        Some(Ok(bytes)) => Ok(bincode::deserialize(&bytes)?),
        Some(Err(e)) => Err(e.into()),
        None => Err(anyhow::anyhow!("connection closed")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_roundtrip() {
        let msg = ClientMessage::Frame {
            frame: FrameImage {
                width: 1280,
                height: 720,
                timestamp_us: 123_456,
                jpeg: vec![0xFF, 0xD8, 0xFF],
            },
        };
        let bytes = bincode::serialize(&msg).unwrap();
        let decoded: ClientMessage = bincode::deserialize(&bytes).unwrap();
        match decoded {
            ClientMessage::Frame { frame } => {
                assert_eq!(frame.width, 1280);
                assert_eq!(frame.timestamp_us, 123_456);
                assert_eq!(frame.jpeg.len(), 3);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_server_message_roundtrip() {
        let msg = ServerMessage::Detection {
            result: HolisticResult::empty(640, 480, 42),
        };
        let bytes = bincode::serialize(&msg).unwrap();
        let decoded: ServerMessage = bincode::deserialize(&bytes).unwrap();
        match decoded {
            ServerMessage::Detection { result } => {
                assert_eq!(result.width, 640);
                assert_eq!(result.timestamp_us, 42);
                assert!(result.face.is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
