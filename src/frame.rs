//! Frame — the scene stream wire format.
//!
//! ARCHITECTURE
//! ============
//! Every rendered scene reaches projector nodes as one frame on a raw TCP
//! stream. There is no handshake and no close message: a frame is a 4-byte
//! big-endian `u32` length followed by exactly that many bytes.
//!
//! DESIGN
//! ======
//! - `Plain`: `[len][jpeg]`. The default.
//! - `QtDataStream`: the JPEG is itself written as a serialized byte array,
//!   so the payload is `[len][jpeg]` and the outer length covers both:
//!   `[len + 4][len][jpeg]`. Kept for projector nodes that still decode the
//!   legacy stream.
//! - Encoded frames are `Arc<[u8]>` so one buffer is shared by every client
//!   queue.

use std::sync::Arc;

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// An encoded, shareable frame ready to be written to a socket.
pub type FrameBytes = Arc<[u8]>;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame payload too large: {0} bytes")]
    TooLarge(usize),
    #[cfg(test)]
    #[error("frame truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
}

/// Byte layout of a frame on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameLayout {
    #[default]
    Plain,
    QtDataStream,
}

/// Encode an image payload into a length-prefixed frame.
///
/// # Errors
///
/// Returns [`FrameError::TooLarge`] if the prefixed length does not fit a `u32`.
pub fn encode_frame(payload: &[u8], layout: FrameLayout) -> Result<FrameBytes, FrameError> {
    let inner_len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge(payload.len()))?;

    let mut out;
    match layout {
        FrameLayout::Plain => {
            out = Vec::with_capacity(LENGTH_PREFIX_LEN + payload.len());
            out.extend_from_slice(&inner_len.to_be_bytes());
        }
        FrameLayout::QtDataStream => {
            let outer_len = inner_len
                .checked_add(4)
                .ok_or(FrameError::TooLarge(payload.len()))?;
            out = Vec::with_capacity(2 * LENGTH_PREFIX_LEN + payload.len());
            out.extend_from_slice(&outer_len.to_be_bytes());
            out.extend_from_slice(&inner_len.to_be_bytes());
        }
    }
    out.extend_from_slice(payload);
    Ok(out.into())
}

#[cfg(test)]
/// Split one frame off the front of `buf`, returning its payload and the rest.
///
/// The node only writes frames; this reads them back in tests. With
/// `QtDataStream` the inner length prefix is stripped too.
///
/// # Errors
///
/// Returns [`FrameError::Truncated`] if `buf` ends before the frame does.
pub fn decode_frame(buf: &[u8], layout: FrameLayout) -> Result<(&[u8], &[u8]), FrameError> {
    let (body, rest) = split_prefixed(buf)?;
    match layout {
        FrameLayout::Plain => Ok((body, rest)),
        FrameLayout::QtDataStream => {
            let (payload, _) = split_prefixed(body)?;
            Ok((payload, rest))
        }
    }
}

#[cfg(test)]
fn split_prefixed(buf: &[u8]) -> Result<(&[u8], &[u8]), FrameError> {
    let Some((prefix, tail)) = buf.split_first_chunk::<LENGTH_PREFIX_LEN>() else {
        return Err(FrameError::Truncated { needed: LENGTH_PREFIX_LEN, available: buf.len() });
    };
    let len = u32::from_be_bytes(*prefix) as usize;
    if tail.len() < len {
        return Err(FrameError::Truncated { needed: len, available: tail.len() });
    }
    Ok(tail.split_at(len))
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
