//! Length-framed byte streams to and from peers over raw TCP.
//!
//! A stream carries a back-to-back sequence of encoded [`Message`]s with no
//! extra delimiter: the message's own `u32` length prefix on `data` is the
//! only framing. [`read_message`] reads exactly one frame at a time so a
//! caller can loop it into a decode-and-dispatch `recv_loop`.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use super::message::Message;

/// One byte kind tag plus a four-byte little-endian length prefix, matching
/// [`crate::codec`]'s `u8`/`u32` encodings.
const HEADER_LEN: usize = 1 + 4;

/// Reads exactly one [`Message`] frame from `reader`.
///
/// Returns `Ok(None)` on clean EOF before any byte of a new frame has been
/// read. Any other I/O error, or EOF in the middle of a frame, is an error
/// that should close the peer's stream.
pub async fn read_message<R>(reader: &mut R) -> std::io::Result<Option<Message>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header[..1]).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    reader.read_exact(&mut header[1..]).await?;

    let kind = header[0];
    let len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]) as usize;

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;

    Ok(Some(Message { kind, data }))
}

/// Writes a [`Message`] frame to `writer`.
pub async fn send_message<W>(writer: &mut W, message: &Message) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    use crate::codec::Encode;
    let bytes = message.to_canonical_bytes();
    writer.write_all(&bytes).await
}

/// Binds a listener for inbound peer connections.
pub async fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
    TcpListener::bind(addr).await
}

/// Dials an outbound connection to `addr`.
pub async fn dial(addr: SocketAddr) -> std::io::Result<TcpStream> {
    TcpStream::connect(addr).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Encode;

    #[tokio::test]
    async fn message_round_trips_over_a_real_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let sender = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let msg = Message {
                kind: 0x05,
                data: Vec::new(),
            };
            send_message(&mut stream, &msg).await.unwrap();
        });

        let (mut stream, _) = listener.accept().await.unwrap();
        let received = read_message(&mut stream).await.unwrap().unwrap();
        assert_eq!(received.kind, 0x05);
        assert!(received.data.is_empty());

        sender.await.unwrap();
    }

    #[tokio::test]
    async fn two_messages_back_to_back_are_each_read_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let mut bytes = Vec::new();
            Message { kind: 0x05, data: vec![] }.encode(&mut bytes);
            Message { kind: 0x01, data: vec![1, 2, 3] }.encode(&mut bytes);
            stream.write_all(&bytes).await.unwrap();
        });

        let (mut stream, _) = listener.accept().await.unwrap();
        let first = read_message(&mut stream).await.unwrap().unwrap();
        let second = read_message(&mut stream).await.unwrap().unwrap();
        assert_eq!(first.kind, 0x05);
        assert_eq!(second.kind, 0x01);
        assert_eq!(second.data, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn eof_before_a_frame_returns_none() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let _stream = TcpStream::connect(addr).await.unwrap();
        });

        let (mut stream, _) = listener.accept().await.unwrap();
        assert!(read_message(&mut stream).await.unwrap().is_none());
    }
}
