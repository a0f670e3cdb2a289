//! OSC 1.0 binary codec
//!
//! Wire layout:
//! ```text
//! message: address-string  type-tag-string  arguments...
//! bundle:  "#bundle\0"  timetag(8)  { size(4) element }...
//! string:  bytes  NUL  NUL-padding to a multiple of 4
//! blob:    size(4)  bytes  NUL-padding to a multiple of 4
//! ```
//! All numeric fields are big-endian. `T`, `F` and `N` carry no payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::address::validate_address;
use crate::types::*;
use crate::{Error, Result};

/// Bundle header tag, including its NUL terminator
pub const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";

/// Default limit on bundle nesting accepted by [`decode`]
pub const MAX_BUNDLE_DEPTH: usize = 8;

/// Type tag characters
pub mod tag {
    pub const INT: u8 = b'i';
    pub const FLOAT: u8 = b'f';
    pub const STRING: u8 = b's';
    pub const BLOB: u8 = b'b';
    pub const LONG: u8 = b'h';
    pub const DOUBLE: u8 = b'd';
    pub const TIME: u8 = b't';
    pub const TRUE: u8 = b'T';
    pub const FALSE: u8 = b'F';
    pub const NIL: u8 = b'N';
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Encode a packet into a fresh buffer
pub fn encode(packet: &OscPacket) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(encoded_len(packet));
    encode_into(&mut buf, packet)?;
    Ok(buf.freeze())
}

/// Encode a packet, appending to `buf`
///
/// Reserves the exact encoded size up front, so a cleared buffer that is
/// already large enough never reallocates.
pub fn encode_into(buf: &mut BytesMut, packet: &OscPacket) -> Result<()> {
    buf.reserve(encoded_len(packet));
    match packet {
        OscPacket::Message(msg) => encode_message(buf, msg),
        OscPacket::Bundle(bundle) => encode_bundle(buf, bundle),
    }
}

/// Exact number of bytes [`encode`] produces for `packet`
pub fn encoded_len(packet: &OscPacket) -> usize {
    match packet {
        OscPacket::Message(msg) => message_len(msg),
        OscPacket::Bundle(bundle) => bundle_len(bundle),
    }
}

/// Decode one datagram
#[inline]
pub fn decode(bytes: &[u8]) -> Result<OscPacket> {
    decode_with_depth(bytes, MAX_BUNDLE_DEPTH)
}

/// Decode one datagram, allowing at most `max_depth` levels of bundle nesting
pub fn decode_with_depth(bytes: &[u8], max_depth: usize) -> Result<OscPacket> {
    decode_packet(bytes, 0, max_depth)
}

// ============================================================================
// SIZES
// ============================================================================

#[inline(always)]
fn pad4(n: usize) -> usize {
    (n + 3) & !3
}

/// Encoded size of an OSC string (terminator and padding included)
#[inline(always)]
fn string_len(s: &str) -> usize {
    pad4(s.len() + 1)
}

fn message_len(msg: &OscMessage) -> usize {
    let mut len = string_len(&msg.address) + pad4(msg.args.len() + 2);
    for arg in &msg.args {
        len += value_len(arg);
    }
    len
}

#[inline]
fn value_len(value: &OscValue) -> usize {
    match value {
        OscValue::Int(_) | OscValue::Float(_) => 4,
        OscValue::Long(_) | OscValue::Double(_) | OscValue::Time(_) => 8,
        OscValue::String(s) => string_len(s),
        OscValue::Blob(b) => 4 + pad4(b.len()),
        OscValue::Bool(_) | OscValue::Nil => 0,
    }
}

fn bundle_len(bundle: &OscBundle) -> usize {
    BUNDLE_TAG.len()
        + 8
        + bundle
            .content
            .iter()
            .map(|p| 4 + encoded_len(p))
            .sum::<usize>()
}

// ============================================================================
// ENCODING
// ============================================================================

fn encode_message(buf: &mut BytesMut, msg: &OscMessage) -> Result<()> {
    validate_address(&msg.address)?;
    encode_string(buf, &msg.address);

    // type tag string: ',' + one char per argument, NUL-padded
    buf.put_u8(b',');
    for arg in &msg.args {
        buf.put_u8(arg.type_tag() as u8);
    }
    buf.put_u8(0);
    put_padding(buf, msg.args.len() + 2);

    for arg in &msg.args {
        encode_value(buf, arg)?;
    }
    Ok(())
}

fn encode_bundle(buf: &mut BytesMut, bundle: &OscBundle) -> Result<()> {
    buf.put_slice(BUNDLE_TAG);
    buf.put_u64(bundle.timetag.as_u64());

    for element in &bundle.content {
        let size = encoded_len(element);
        if size > i32::MAX as usize {
            return Err(Error::PayloadTooLarge(size));
        }
        buf.put_i32(size as i32);
        let start = buf.len();
        match element {
            OscPacket::Message(msg) => encode_message(buf, msg)?,
            OscPacket::Bundle(inner) => encode_bundle(buf, inner)?,
        }
        debug_assert_eq!(buf.len() - start, size);
    }
    Ok(())
}

#[inline]
fn encode_value(buf: &mut BytesMut, value: &OscValue) -> Result<()> {
    match value {
        OscValue::Int(i) => buf.put_i32(*i),
        OscValue::Float(f) => buf.put_f32(*f),
        OscValue::String(s) => {
            // a NUL would end the string early on the receiving side
            if s.contains('\0') {
                return Err(Error::InvalidString(s.clone()));
            }
            encode_string(buf, s);
        }
        OscValue::Blob(b) => {
            if b.len() > i32::MAX as usize {
                return Err(Error::PayloadTooLarge(b.len()));
            }
            buf.put_i32(b.len() as i32);
            buf.put_slice(b);
            put_padding(buf, b.len());
        }
        OscValue::Long(l) => buf.put_i64(*l),
        OscValue::Double(d) => buf.put_f64(*d),
        OscValue::Time(t) => buf.put_u64(t.as_u64()),
        OscValue::Bool(_) | OscValue::Nil => {} // type tag is enough
    }
    Ok(())
}

#[inline(always)]
fn encode_string(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
    put_padding(buf, s.len() + 1);
}

/// Pad a field of `written` bytes to the next 4-byte boundary
#[inline(always)]
fn put_padding(buf: &mut BytesMut, written: usize) {
    buf.put_bytes(0, pad4(written) - written);
}

// ============================================================================
// DECODING
// ============================================================================

fn decode_packet(bytes: &[u8], depth: usize, max_depth: usize) -> Result<OscPacket> {
    match bytes.first() {
        Some(b'/') => decode_message(bytes).map(OscPacket::Message),
        Some(b'#') => decode_bundle(bytes, depth, max_depth).map(OscPacket::Bundle),
        Some(&other) => Err(Error::UnknownPacket(other)),
        None => Err(Error::BufferTooSmall { needed: 1, have: 0 }),
    }
}

fn decode_message(bytes: &[u8]) -> Result<OscMessage> {
    let mut buf = bytes;
    let address = decode_string(&mut buf)?;

    // Some old senders omit the type tag string entirely
    if buf.is_empty() {
        return Ok(OscMessage::new(address));
    }
    if buf[0] != b',' {
        return Err(Error::MalformedTypeTags(
            String::from_utf8_lossy(&buf[..buf.len().min(8)]).into_owned(),
        ));
    }

    let tags = decode_string(&mut buf)?;
    let mut args = Vec::with_capacity(tags.len() - 1);
    for tag in tags.bytes().skip(1) {
        args.push(decode_value(&mut buf, tag)?);
    }

    if !buf.is_empty() {
        return Err(Error::TrailingBytes(buf.len()));
    }

    Ok(OscMessage { address, args })
}

fn decode_bundle(bytes: &[u8], depth: usize, max_depth: usize) -> Result<OscBundle> {
    if depth >= max_depth {
        return Err(Error::DepthExceeded(max_depth));
    }

    let mut buf = bytes;
    ensure(buf, BUNDLE_TAG.len() + 8)?;
    if &buf[..BUNDLE_TAG.len()] != BUNDLE_TAG {
        return Err(Error::UnknownPacket(b'#'));
    }
    buf.advance(BUNDLE_TAG.len());
    let timetag = TimeTag::from(buf.get_u64());

    let mut content = Vec::new();
    while !buf.is_empty() {
        ensure(buf, 4)?;
        let size = buf.get_i32();
        if size <= 0 || size % 4 != 0 || size as usize > buf.len() {
            return Err(Error::InvalidElementSize(size));
        }
        let size = size as usize;
        content.push(decode_packet(&buf[..size], depth + 1, max_depth)?);
        buf.advance(size);
    }

    Ok(OscBundle { timetag, content })
}

#[inline]
fn decode_value(buf: &mut &[u8], tag: u8) -> Result<OscValue> {
    match tag {
        tag::INT => {
            ensure(buf, 4)?;
            Ok(OscValue::Int(buf.get_i32()))
        }
        tag::FLOAT => {
            ensure(buf, 4)?;
            Ok(OscValue::Float(buf.get_f32()))
        }
        tag::STRING => decode_string(buf).map(OscValue::String),
        tag::BLOB => {
            ensure(buf, 4)?;
            let len = buf.get_i32();
            if len < 0 {
                return Err(Error::NegativeLength(len));
            }
            let len = len as usize;
            ensure(buf, pad4(len))?;
            let blob = buf[..len].to_vec();
            buf.advance(pad4(len));
            Ok(OscValue::Blob(blob))
        }
        tag::LONG => {
            ensure(buf, 8)?;
            Ok(OscValue::Long(buf.get_i64()))
        }
        tag::DOUBLE => {
            ensure(buf, 8)?;
            Ok(OscValue::Double(buf.get_f64()))
        }
        tag::TIME => {
            ensure(buf, 8)?;
            Ok(OscValue::Time(TimeTag::from(buf.get_u64())))
        }
        tag::TRUE => Ok(OscValue::Bool(true)),
        tag::FALSE => Ok(OscValue::Bool(false)),
        tag::NIL => Ok(OscValue::Nil),
        other => Err(Error::UnknownTypeTag(other as char)),
    }
}

/// Read a NUL-terminated, 4-byte padded string
///
/// The terminator must appear within the remaining bytes and the padding
/// must be present in full.
#[inline]
fn decode_string(buf: &mut &[u8]) -> Result<String> {
    let Some(nul) = buf.iter().position(|&b| b == 0) else {
        return Err(Error::UnterminatedString { scanned: buf.len() });
    };
    let padded = pad4(nul + 1);
    ensure(buf, padded)?;
    let s = std::str::from_utf8(&buf[..nul])
        .map_err(|_| Error::InvalidUtf8)?
        .to_string();
    buf.advance(padded);
    Ok(s)
}

#[inline(always)]
fn ensure(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(Error::BufferTooSmall {
            needed,
            have: buf.len(),
        });
    }
    Ok(())
}
