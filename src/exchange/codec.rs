//! Frame codec seam for the post-upgrade stream.
//!
//! RFC 6455 §5 framing is not implemented in this crate. The exchange loop
//! only talks to a [`FrameCodec`]; [`Passthrough`] treats every chunk of
//! bytes as a frame, which turns the loop into a byte-level echo.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// Errors a codec may report while decoding or encoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The peer sent bytes that cannot form a frame.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The frame cannot be encoded.
    #[error("cannot encode frame: {0}")]
    Encode(String),
}

/// Decoder/encoder pair driven by the exchange loop.
pub trait FrameCodec: Send {
    type Frame: Send;

    /// Take one frame from the front of `src`.
    ///
    /// Returns `Ok(None)` when `src` does not yet hold a complete frame;
    /// unconsumed bytes stay in `src` until the next read.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Frame>, CodecError>;

    /// Append the wire form of `frame` to `dst`.
    fn encode(&mut self, frame: Self::Frame, dst: &mut BytesMut) -> Result<(), CodecError>;
}

/// Codec that hands bytes through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl FrameCodec for Passthrough {
    type Frame = Bytes;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, CodecError> {
        if src.is_empty() {
            Ok(None)
        } else {
            Ok(Some(src.split().freeze()))
        }
    }

    fn encode(&mut self, frame: Bytes, dst: &mut BytesMut) -> Result<(), CodecError> {
        dst.extend_from_slice(&frame);
        Ok(())
    }
}
