//! Rank-to-rank wire protocol
//!
//! Every process of a run talks to the root (rank 0) over one TCP connection.
//! Messages are serialized with MessagePack (rmp-serde).
//!
//! # Message Flow
//!
//! ```text
//! Walker (rank r)                 Root (rank 0)
//!     |                              |
//!     |-- HELLO(version, r) -------->|
//!     |                              |
//!     |-- DATA(source, tag, value) ->|   zero or more
//!     |                              |
//!     |-- FINALIZE(r) -------------->|
//!     |<------- FINALIZE_ACK --------|
//! ```
//!
//! # Message Framing
//!
//! ```text
//! [4 bytes: body length (little-endian u32)][N bytes: MessagePack body]
//! ```

use super::error::{CommError, CommResult};
use super::{Rank, Tag};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version
///
/// Bump on any incompatible change to [`Message`].
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest accepted frame body. Payloads are single integers, so this is generous.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Protocol message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// First frame on every connection (Walker → Root)
    Hello(HelloMessage),

    /// Point-to-point payload (Walker → Root)
    Data(Envelope),

    /// Walker entered finalize and will send nothing more (Walker → Root)
    Finalize { rank: Rank },

    /// Every rank has finalized; the walker may exit (Root → Walker)
    FinalizeAck,
}

/// Connection handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloMessage {
    /// Protocol version (must match)
    pub protocol_version: u32,

    /// Rank of the connecting process
    pub rank: Rank,
}

/// A single tagged integer travelling between two ranks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub source: Rank,
    pub tag: Tag,
    pub value: u64,
}

/// Serialize a message to a length-prefixed frame
///
/// # Returns
///
/// The length prefix followed by the MessagePack body, ready to be written.
pub fn serialize_message(msg: &Message) -> CommResult<Vec<u8>> {
    // Serialize to MessagePack
    let body = rmp_serde::to_vec(msg)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(CommError::FrameTooLarge { len: body.len(), max: MAX_FRAME_LEN });
    }

    // Prepend length (4 bytes, little-endian)
    let mut framed = Vec::with_capacity(4 + body.len());
    framed.extend_from_slice(&(body.len() as u32).to_le_bytes());
    framed.extend_from_slice(&body);

    Ok(framed)
}

/// Read one complete message from a stream
///
/// # Returns
///
/// The decoded message. A clean EOF before the length prefix maps to
/// [`CommError::Disconnected`]; an EOF inside a frame is an I/O error.
pub async fn read_message<R>(reader: &mut R) -> CommResult<Message>
where
    R: AsyncRead + Unpin,
{
    // Read length field
    let mut len_buf = [0u8; 4];
    if let Err(e) = reader.read_exact(&mut len_buf).await {
        return Err(match e.kind() {
            std::io::ErrorKind::UnexpectedEof => CommError::Disconnected,
            _ => CommError::Io(e),
        });
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(CommError::FrameTooLarge { len, max: MAX_FRAME_LEN });
    }

    // Read message body
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    // Deserialize
    Ok(rmp_serde::from_slice(&body)?)
}

/// Write one message to a stream and flush it
pub async fn write_message<W>(writer: &mut W, msg: &Message) -> CommResult<()>
where
    W: AsyncWrite + Unpin,
{
    let framed = serialize_message(msg)?;
    writer.write_all(&framed).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::COMPLETION_TAG;

    /// Decode every frame in `bytes`
    async fn decode_all(bytes: &[u8]) -> CommResult<Vec<Message>> {
        let mut reader = bytes;
        let mut messages = Vec::new();
        loop {
            match read_message(&mut reader).await {
                Ok(msg) => messages.push(msg),
                Err(CommError::Disconnected) => return Ok(messages),
                Err(e) => return Err(e),
            }
        }
    }

    #[tokio::test]
    async fn test_serialize_read_hello() {
        let msg = Message::Hello(HelloMessage {
            protocol_version: PROTOCOL_VERSION,
            rank: 3,
        });

        let bytes = serialize_message(&msg).unwrap();
        let decoded = read_message(&mut bytes.as_slice()).await.unwrap();

        assert_eq!(decoded, msg);
    }

    #[tokio::test]
    async fn test_serialize_read_data() {
        let msg = Message::Data(Envelope {
            source: 2,
            tag: COMPLETION_TAG,
            value: 57,
        });

        let bytes = serialize_message(&msg).unwrap();

        match read_message(&mut bytes.as_slice()).await.unwrap() {
            Message::Data(env) => {
                assert_eq!(env.source, 2);
                assert_eq!(env.tag, COMPLETION_TAG);
                assert_eq!(env.value, 57);
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_message_framing() {
        let bytes = serialize_message(&Message::FinalizeAck).unwrap();

        assert!(bytes.len() >= 4);
        let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        assert_eq!(bytes.len(), 4 + len);
    }

    #[tokio::test]
    async fn test_back_to_back_frames() {
        let mut buf = serialize_message(&Message::Finalize { rank: 1 }).unwrap();
        buf.extend(serialize_message(&Message::FinalizeAck).unwrap());

        let messages = decode_all(&buf).await.unwrap();

        assert_eq!(messages, vec![Message::Finalize { rank: 1 }, Message::FinalizeAck]);
    }

    #[tokio::test]
    async fn test_truncated_frame() {
        let bytes = serialize_message(&Message::Finalize { rank: 7 }).unwrap();

        // Cut inside the body: the peer vanished mid-frame
        let cut_body = read_message(&mut &bytes[..bytes.len() - 1]).await;
        assert!(matches!(cut_body, Err(CommError::Io(_))));

        // Cut inside the length prefix
        let cut_prefix = read_message(&mut &bytes[..2]).await;
        assert!(matches!(cut_prefix, Err(CommError::Disconnected)));
    }

    #[tokio::test]
    async fn test_read_rejects_oversized_length() {
        let len = (MAX_FRAME_LEN as u32 + 1).to_le_bytes();
        match read_message(&mut &len[..]).await {
            Err(CommError::FrameTooLarge { len, max }) => {
                assert_eq!(len, MAX_FRAME_LEN + 1);
                assert_eq!(max, MAX_FRAME_LEN);
            }
            other => panic!("expected FrameTooLarge, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_write_over_stream() {
        let (mut a, mut b) = tokio::io::duplex(1024);

        let sent = Message::Data(Envelope { source: 1, tag: COMPLETION_TAG, value: 100 });
        write_message(&mut a, &sent).await.unwrap();
        write_message(&mut a, &Message::Finalize { rank: 1 }).await.unwrap();

        assert_eq!(read_message(&mut b).await.unwrap(), sent);
        assert_eq!(read_message(&mut b).await.unwrap(), Message::Finalize { rank: 1 });
    }

    #[tokio::test]
    async fn test_read_after_peer_close_is_disconnected() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);

        match read_message(&mut b).await {
            Err(CommError::Disconnected) => {}
            other => panic!("expected Disconnected, got {:?}", other),
        }
    }
}
