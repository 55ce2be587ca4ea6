//! Combined paging-state codec.
//!
//! A client-visible pagination token sometimes has to stand in for
//! several backend cursors at once (one per underlying query). This
//! codec packs an ordered list of optional cursors into one opaque
//! token and splits it back apart.
//!
//! Wire layout for more than one element: a 4-byte big-endian element
//! count, then per element a 4-byte big-endian length (`-1` = absent)
//! followed by that many raw bytes. A single element is passed through
//! unchanged, so the common one-cursor case has zero overhead. This is
//! the one bit-exact format this crate owns; it must stay stable across
//! versions.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{GatewayError, GatewayResult};

/// Pack an ordered list of optional cursors into one opaque token.
///
/// All-absent input means pagination never started: the result is
/// absent too.
pub fn combine(nested: &[Option<Bytes>]) -> Option<Bytes> {
    if nested.iter().all(Option::is_none) {
        return None;
    }

    if nested.len() == 1 {
        return nested[0].clone();
    }

    let mut size = 4;
    for state in nested {
        size += 4 + state.as_ref().map_or(0, Bytes::len);
    }

    let mut buf = BytesMut::with_capacity(size);
    buf.put_i32(nested.len() as i32);
    for state in nested {
        match state {
            Some(bytes) => {
                buf.put_i32(bytes.len() as i32);
                buf.put_slice(bytes);
            }
            None => buf.put_i32(-1),
        }
    }
    Some(buf.freeze())
}

/// Split a combined token back into `expected` optional cursors.
///
/// The inverse of [`combine`]: an absent token yields `expected` absent
/// cursors, and `expected == 1` returns the token unchanged even if its
/// bytes happen to look like the multi-element encoding. Present
/// elements are views into the input buffer, not copies.
pub fn split(expected: usize, data: Option<Bytes>) -> GatewayResult<Vec<Option<Bytes>>> {
    if expected == 0 {
        return Err(GatewayError::InvalidPagingState(format!(
            "invalid element count: {}",
            expected
        )));
    }

    let data = match data {
        Some(data) => data,
        None => return Ok(vec![None; expected]),
    };

    if expected == 1 {
        return Ok(vec![Some(data)]);
    }

    let mut buf = data;
    if buf.remaining() < 4 {
        return Err(GatewayError::InvalidPagingState(format!(
            "unable to read element count, available bytes: {}",
            buf.remaining()
        )));
    }
    let count = buf.get_i32();
    if count < 0 || count as usize != expected {
        return Err(GatewayError::InvalidPagingState(format!(
            "expected element count: {}, actual: {}",
            expected, count
        )));
    }

    let mut nested = Vec::with_capacity(expected);
    for index in 0..expected {
        if buf.remaining() < 4 {
            return Err(GatewayError::InvalidPagingState(format!(
                "unable to read size of element {}, available bytes: {}",
                index,
                buf.remaining()
            )));
        }
        let size = buf.get_i32();
        if size < 0 {
            nested.push(None);
            continue;
        }
        let size = size as usize;
        if buf.remaining() < size {
            return Err(GatewayError::InvalidPagingState(format!(
                "element {} truncated: expected {} bytes, available: {}",
                index,
                size,
                buf.remaining()
            )));
        }
        // copy_to_bytes on Bytes is a view into the same buffer.
        nested.push(Some(buf.copy_to_bytes(size)));
    }

    if buf.has_remaining() {
        return Err(GatewayError::InvalidPagingState(format!(
            "{} trailing bytes after the last element",
            buf.remaining()
        )));
    }

    Ok(nested)
}
