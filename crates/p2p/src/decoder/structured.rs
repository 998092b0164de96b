//! Structured decoder: whole [`Rpc`] values encoded with bincode.
//!
//! Used when both ends of a connection agree on a richer protocol than the
//! control-byte format. bincode does not delimit values on a byte stream, so
//! each encoded value travels behind its length:
//!
//! ```text
//! [length: 4 bytes LE u32][bincode encoded Rpc]
//! ```

use crate::decoder::traits::{Decoder, Source};
use crate::error::{Error, Result};
use crate::message::Rpc;
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::AsyncReadExt;

/// Maximum encoded size of one value (16 MB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Decoder for length-delimited bincode values.
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeDecoder;

impl BincodeDecoder {
    /// Encode `rpc` into the frame this decoder reads back.
    ///
    /// The `from` field travels too, but the receiving transport overwrites
    /// it with the address it observed.
    pub fn encode(rpc: &Rpc) -> Result<Bytes> {
        let body = bincode::serialize(rpc)?;
        if body.len() > MAX_FRAME_SIZE {
            return Err(Error::FrameTooLarge {
                size: body.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        let mut frame = BytesMut::with_capacity(4 + body.len());
        frame.put_u32_le(body.len() as u32);
        frame.put_slice(&body);
        Ok(frame.freeze())
    }
}

#[async_trait]
impl Decoder for BincodeDecoder {
    async fn decode(&self, source: &mut Source<'_>) -> Result<Option<Rpc>> {
        let mut len_buf = [0u8; 4];
        source.read_exact(&mut len_buf).await.map_err(Error::Decode)?;

        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(Error::FrameTooLarge {
                size: len,
                max: MAX_FRAME_SIZE,
            });
        }

        let mut body = vec![0u8; len];
        source.read_exact(&mut body).await.map_err(Error::Decode)?;

        let rpc: Rpc = bincode::deserialize(&body)?;
        Ok(Some(rpc))
    }

    fn name(&self) -> &'static str {
        "BincodeDecoder"
    }
}
