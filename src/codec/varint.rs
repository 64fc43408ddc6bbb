//! Frame size varint reader.
//!
//! Unlike [`prost::encoding::decode_varint`], this reader distinguishes a
//! varint that is cut off by the end of the buffer from one that is corrupt,
//! which lets the parser wait for more bytes instead of failing.

use super::error::FramingError;
use crate::tag::SIZE_PACKET_LEN_MAX;

/// Outcome of reading a size varint from the front of a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SizeRead {
    /// The varint is complete.
    Complete {
        /// Decoded frame size.
        size: usize,
        /// Bytes occupied by the varint.
        len: usize,
    },
    /// The buffer ends before the varint does.
    Truncated {
        /// Bytes of the varint already buffered.
        consumed: usize,
    },
}

/// Read a frame size varint from the start of `buf` without consuming it.
///
/// # Errors
///
/// Returns [`FramingError::InvalidLengthEncoding`] if the varint is longer
/// than [`SIZE_PACKET_LEN_MAX`] bytes or its value exceeds `i32::MAX`.
pub(crate) fn read_size(buf: &[u8]) -> Result<SizeRead, FramingError> {
    let window = buf.get(..SIZE_PACKET_LEN_MAX).unwrap_or(buf);
    let Some(last) = window.iter().position(|byte| byte & 0x80 == 0) else {
        if buf.len() >= SIZE_PACKET_LEN_MAX {
            return Err(FramingError::InvalidLengthEncoding);
        }
        return Ok(SizeRead::Truncated {
            consumed: buf.len(),
        });
    };

    let len = last + 1;
    let mut bytes = window.get(..len).unwrap_or(window);
    let value = prost::encoding::decode_varint(&mut bytes)
        .map_err(|_| FramingError::InvalidLengthEncoding)?;
    let size = i32::try_from(value)
        .ok()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or(FramingError::InvalidLengthEncoding)?;
    Ok(SizeRead::Complete { size, len })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(&[0x00], 0, 1)]
    #[case(&[0x05, 0xff], 5, 1)]
    #[case(&[0x96, 0x01], 150, 2)]
    #[case(&[0xff, 0xff, 0xff, 0xff, 0x07], i32::MAX as usize, 5)]
    fn complete_varints(#[case] buf: &[u8], #[case] size: usize, #[case] len: usize) {
        assert_eq!(read_size(buf), Ok(SizeRead::Complete { size, len }));
    }

    #[rstest]
    #[case(&[], 0)]
    #[case(&[0x96], 1)]
    #[case(&[0x80, 0x80, 0x80], 3)]
    fn truncated_varints_report_progress(#[case] buf: &[u8], #[case] consumed: usize) {
        assert_eq!(read_size(buf), Ok(SizeRead::Truncated { consumed }));
    }

    #[rstest]
    #[case(&[0x80, 0x80, 0x80, 0x80, 0x80])]
    #[case(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01])]
    #[case(&[0xff, 0xff, 0xff, 0xff, 0x0f])]
    fn oversized_varints_are_rejected(#[case] buf: &[u8]) {
        assert_eq!(read_size(buf), Err(FramingError::InvalidLengthEncoding));
    }
}
