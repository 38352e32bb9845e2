//! Checksums and fixed-width helpers for the TFRecord container.
//!
//! A TFRecords file is a sequence of frames laid out as
//!
//! ```text
//! uint64 length
//! uint32 masked_crc32c(length)
//! byte   data[length]
//! uint32 masked_crc32c(data)
//! ```
//!
//! with every integer stored little-endian. The CRC is CRC-32C (Castagnoli)
//! and the stored value is "masked":
//!
//! ```text
//! masked_crc = ((crc >> 15) | (crc << 17)) + 0xa282ead8
//! ```
//!
//! TensorFlow and every other consumer check these values bit-for-bit.

use crate::error::TfrecError;

/// Constant added after rotating a CRC (TensorFlow's `kMaskDelta`).
pub const MASK_DELTA: u32 = 0xa282_ead8;

/// Computes the CRC-32C (Castagnoli, polynomial `0x1EDC6F41`) of `data`.
///
/// Initial value and final XOR are both `0xFFFFFFFF`, so an empty slice
/// yields `0`.
pub fn crc32c(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

/// Applies TensorFlow's CRC masking transform.
///
/// Only meaningful for CRC values; this is not a general-purpose hash.
pub fn mask_crc(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(MASK_DELTA)
}

/// Reverses [`mask_crc`].
pub fn unmask_crc(masked: u32) -> u32 {
    masked.wrapping_sub(MASK_DELTA).rotate_left(15)
}

/// `mask_crc(crc32c(data))`, the value stored in a frame header or footer.
pub fn masked_crc32c(data: &[u8]) -> u32 {
    mask_crc(crc32c(data))
}

/// Encodes `value` as 8 little-endian bytes (the frame's length field).
pub fn int64_buffer(value: u64) -> [u8; 8] {
    value.to_le_bytes()
}

/// Encodes `value` as 4 little-endian bytes (the frame's CRC fields).
pub fn int32_buffer(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Reads a little-endian `u64` starting at `offset`.
///
/// # Errors
/// Returns [`TfrecError::InvalidArgument`] if fewer than 8 bytes are available.
pub fn read_int64(buffer: &[u8], offset: usize) -> Result<u64, TfrecError> {
    let bytes = fixed_slice::<8>(buffer, offset)?;
    Ok(u64::from_le_bytes(bytes))
}

/// Reads a little-endian `u32` starting at `offset`.
///
/// # Errors
/// Returns [`TfrecError::InvalidArgument`] if fewer than 4 bytes are available.
pub fn read_int32(buffer: &[u8], offset: usize) -> Result<u32, TfrecError> {
    let bytes = fixed_slice::<4>(buffer, offset)?;
    Ok(u32::from_le_bytes(bytes))
}

/// UTF-8 encodes a string.
pub fn text_encode(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Decodes UTF-8 bytes into a string.
///
/// # Errors
/// Returns [`TfrecError::InvalidUtf8`] if `bytes` is not valid UTF-8.
pub fn text_decode(bytes: &[u8]) -> Result<String, TfrecError> {
    Ok(String::from_utf8(bytes.to_vec())?)
}

fn fixed_slice<const N: usize>(buffer: &[u8], offset: usize) -> Result<[u8; N], TfrecError> {
    offset
        .checked_add(N)
        .and_then(|end| buffer.get(offset..end))
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| {
            TfrecError::InvalidArgument(format!(
                "need {} bytes at offset {}, buffer holds {}",
                N,
                offset,
                buffer.len()
            ))
        })
}
