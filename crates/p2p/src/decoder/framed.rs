//! Default control-byte decoder.
//!
//! # Wire Format
//!
//! ```text
//! [control: 1 byte][payload: up to 1028 bytes, only if control != 0x2]
//! ```
//!
//! A control byte of `0x2` switches the connection to raw-stream mode and
//! nothing else is consumed. Any other value announces a message whose body
//! is whatever a single read returns. There is no length prefix: a short read
//! is taken as a complete message, so message boundaries are only as good as
//! the sender's pacing.

use crate::decoder::traits::{Decoder, Source};
use crate::error::{Error, Result};
use crate::message::{Rpc, INCOMING_STREAM};
use async_trait::async_trait;
use bytes::BytesMut;
use std::io;
use tokio::io::AsyncReadExt;

/// Largest payload consumed by one decode.
pub const MAX_PAYLOAD_SIZE: usize = 1028;

/// Control-byte decoder used when no other decoder is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultDecoder;

#[async_trait]
impl Decoder for DefaultDecoder {
    async fn decode(&self, source: &mut Source<'_>) -> Result<Option<Rpc>> {
        let mut control = [0u8; 1];
        match source.read(&mut control).await {
            Ok(1) => {}
            // Lenient: a missing control byte is not a decode failure.
            Ok(_) | Err(_) => return Ok(None),
        }

        if control[0] == INCOMING_STREAM {
            return Ok(Some(Rpc::stream_start()));
        }

        let mut buf = BytesMut::zeroed(MAX_PAYLOAD_SIZE);
        let n = source.read(&mut buf).await.map_err(Error::Decode)?;
        if n == 0 {
            return Err(Error::Decode(io::ErrorKind::UnexpectedEof.into()));
        }
        buf.truncate(n);

        Ok(Some(Rpc::message(buf.freeze())))
    }

    fn name(&self) -> &'static str {
        "DefaultDecoder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::INCOMING_MESSAGE;

    async fn decode_bytes(bytes: &[u8]) -> Result<Option<Rpc>> {
        let mut source = bytes;
        DefaultDecoder.decode(&mut source).await
    }

    #[tokio::test]
    async fn test_stream_marker_consumes_one_byte() {
        let bytes = [INCOMING_STREAM, 0xAA, 0xBB];
        let mut source = &bytes[..];

        let rpc = DefaultDecoder.decode(&mut source).await.unwrap().unwrap();
        assert!(rpc.stream);
        assert!(rpc.payload.is_empty());

        // The stream bytes are left for the application.
        assert_eq!(source, &[0xAA, 0xBB]);
    }

    #[tokio::test]
    async fn test_message_payload() {
        let rpc = decode_bytes(&[INCOMING_MESSAGE, b'h', b'i']).await.unwrap().unwrap();
        assert!(!rpc.stream);
        assert_eq!(&rpc.payload[..], b"hi");
    }

    #[tokio::test]
    async fn test_any_non_stream_control_byte_is_a_message() {
        let rpc = decode_bytes(&[0x7F, 1, 2, 3]).await.unwrap().unwrap();
        assert!(!rpc.stream);
        assert_eq!(&rpc.payload[..], &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_payload_capped_at_max() {
        let mut bytes = vec![INCOMING_MESSAGE];
        bytes.extend(std::iter::repeat(7u8).take(MAX_PAYLOAD_SIZE + 10));
        let mut source = &bytes[..];

        let rpc = DefaultDecoder.decode(&mut source).await.unwrap().unwrap();
        assert_eq!(rpc.payload.len(), MAX_PAYLOAD_SIZE);
        assert_eq!(source.len(), 10);
    }

    #[tokio::test]
    async fn test_empty_source_is_lenient() {
        assert!(decode_bytes(&[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_control_byte_without_payload_fails() {
        let err = decode_bytes(&[INCOMING_MESSAGE]).await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
