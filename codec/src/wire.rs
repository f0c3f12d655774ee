//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//


//! Big-endian field helpers shared by the frame sections.
//!
//! Variable-length fields are written as a 4-byte size followed by the
//! payload padded with zero bytes to the next 4-byte boundary. Fixed-width
//! strings are NUL padded and trimmed on read.

use crate::{CodecError, CodecResult};
use bytes::{Buf, BufMut, Bytes};

/// Rounds `len` up to the next multiple of four.
pub(crate) const fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

pub(crate) fn ensure(buf: &impl Buf, section: &'static str, required: usize) -> CodecResult<()> {
    let available = buf.remaining();
    if available < required {
        return Err(CodecError::Truncated {
            section,
            required,
            available,
        });
    }
    Ok(())
}

pub(crate) fn get_i32(buf: &mut impl Buf, section: &'static str) -> CodecResult<i32> {
    ensure(buf, section, 4)?;
    Ok(buf.get_i32())
}

pub(crate) fn get_u64(buf: &mut impl Buf, section: &'static str) -> CodecResult<u64> {
    ensure(buf, section, 8)?;
    Ok(buf.get_u64())
}

/// Reads a signed 4-byte size and rejects negative values.
pub(crate) fn get_len(buf: &mut impl Buf, field: &'static str) -> CodecResult<usize> {
    let raw = get_i32(buf, field)?;
    usize::try_from(raw).map_err(|_| CodecError::InvalidLength {
        field,
        value: i64::from(raw),
    })
}

pub(crate) fn len_i32(len: usize, field: &'static str) -> CodecResult<i32> {
    i32::try_from(len).map_err(|_| CodecError::InvalidLength {
        field,
        value: i64::try_from(len).unwrap_or(i64::MAX),
    })
}

pub(crate) fn get_fixed_str(
    buf: &mut impl Buf,
    width: usize,
    field: &'static str,
) -> CodecResult<String> {
    ensure(buf, field, width)?;
    let raw = buf.copy_to_bytes(width);
    let text = std::str::from_utf8(&raw).map_err(|_| CodecError::InvalidUtf8 { field })?;
    Ok(text
        .trim_end_matches(|c: char| c == '\0' || c == ' ')
        .to_string())
}

pub(crate) fn put_fixed_str(
    dst: &mut impl BufMut,
    value: &str,
    width: usize,
    field: &'static str,
) -> CodecResult<()> {
    let raw = value.as_bytes();
    if raw.len() > width {
        return Err(CodecError::FieldTooLong {
            field,
            max: width,
            actual: raw.len(),
        });
    }
    dst.put_slice(raw);
    dst.put_bytes(0, width - raw.len());
    Ok(())
}

/// Reads `len` bytes followed by the padding that aligns them to 4 bytes.
pub(crate) fn get_padded(buf: &mut impl Buf, len: usize, field: &'static str) -> CodecResult<Bytes> {
    let padded = padded_len(len);
    ensure(buf, field, padded)?;
    let value = buf.copy_to_bytes(len);
    buf.advance(padded - len);
    Ok(value)
}

pub(crate) fn put_padded(dst: &mut impl BufMut, value: &[u8]) {
    dst.put_slice(value);
    dst.put_bytes(0, padded_len(value.len()) - value.len());
}

/// Reads a size-prefixed, padded byte field.
pub(crate) fn get_sized(buf: &mut impl Buf, field: &'static str) -> CodecResult<Bytes> {
    let len = get_len(buf, field)?;
    get_padded(buf, len, field)
}

pub(crate) fn put_sized(dst: &mut impl BufMut, value: &[u8], field: &'static str) -> CodecResult<()> {
    dst.put_i32(len_i32(value.len(), field)?);
    put_padded(dst, value);
    Ok(())
}

pub(crate) fn utf8(raw: Bytes, field: &'static str) -> CodecResult<String> {
    String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8 { field })
}
