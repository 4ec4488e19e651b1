// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Fixed-layout binary encoding of tablet metadata fields.
//!
//! Every integer is written big-endian at its full width, so the encoded size
//! of a value depends only on its shape (list lengths), never on the integer
//! values themselves. Callers rely on this to size buffers exactly before
//! encoding.

use bytes::BufMut;

use crate::error::CodecError;

/// Encoded size of the `[version: i32][length: i32]` record header.
pub const RECORD_HEADER_LEN: usize = 8;

/// Encoding operations for a metadata field.
pub trait Encode {
    /// Encode `self` into `buf`.
    ///
    /// Exactly [`Encode::encoded_len`] bytes are written.
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut;

    /// The exact number of bytes [`Encode::encode`] writes.
    fn encoded_len(&self) -> usize;

    /// Encode to a fresh `Vec`.
    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf
    }
}

/// Encoding and decoding operations for a metadata field that needs no
/// allocator to decode.
///
/// This must perfectly round-trip Self through [`Codec::decode`]. If the
/// encoding ever changes, decode must be able to handle bytes output by all
/// previous versions of encode, which is what the record version in
/// [`RecordHeader`] is for.
pub trait Codec: Encode + Sized {
    /// Decode a value previously encoded with [`Encode::encode`].
    fn decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError>;
}

/// A read position in an encoded buffer.
///
/// All reads are bounds checked and return [`CodecError::BufferTooSmall`]
/// instead of panicking.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Starts reading `buf` at offset zero.
    pub fn new(buf: &'a [u8]) -> Cursor<'a> {
        Cursor { buf, pos: 0 }
    }

    /// Starts reading `buf` at offset `pos`.
    pub fn at(buf: &'a [u8], pos: usize) -> Result<Cursor<'a>, CodecError> {
        if pos > buf.len() {
            return Err(CodecError::BufferTooSmall {
                needed: pos,
                remaining: buf.len(),
            });
        }
        Ok(Cursor { buf, pos })
    }

    /// The current offset into the underlying buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns the next `n` bytes and advances past them.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if n > self.remaining() {
            return Err(CodecError::BufferTooSmall {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let bytes = self.read_bytes(N)?;
        Ok(bytes.try_into().expect("read_bytes returned N bytes"))
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Reads a boolean, rejecting anything but 0 or 1.
    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(CodecError::corrupt(format!("invalid bool byte {}", b))),
        }
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    /// Reads a `u32` element count and checks that at least `count *
    /// min_elem_len` bytes remain, so a corrupt count cannot trigger a huge
    /// allocation.
    pub fn read_len(&mut self, min_elem_len: usize) -> Result<usize, CodecError> {
        let count = usize::try_from(self.read_u32()?)?;
        let needed = count.saturating_mul(min_elem_len);
        if needed > self.remaining() {
            return Err(CodecError::BufferTooSmall {
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(count)
    }

    /// Reads a `u8` discriminant and maps it through `f`.
    pub fn read_tag<T>(
        &mut self,
        what: &str,
        f: impl FnOnce(u8) -> Option<T>,
    ) -> Result<T, CodecError> {
        let tag = self.read_u8()?;
        f(tag).ok_or_else(|| CodecError::corrupt(format!("unknown {} tag {}", what, tag)))
    }
}

/// Writes a `u32` element count.
///
/// Panics if `len` does not fit, which would mean the value could never have
/// been allocated by an arena in the first place.
pub fn put_len<B: BufMut>(buf: &mut B, len: usize) {
    let len = u32::try_from(len).expect("element count fits in u32");
    buf.put_u32(len);
}

pub fn put_bool<B: BufMut>(buf: &mut B, b: bool) {
    buf.put_u8(u8::from(b));
}

/// The `[version][length]` prefix of a top-level metadata record.
///
/// `length` counts the whole record, header included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub version: i32,
    pub length: i32,
}

impl RecordHeader {
    /// Builds the header for a record whose body is `body_len` bytes.
    pub fn for_body(version: i32, body_len: usize) -> Result<RecordHeader, CodecError> {
        let length = i32::try_from(RECORD_HEADER_LEN + body_len)?;
        Ok(RecordHeader { version, length })
    }

    /// Reads a header and validates it against `expected_version` and the
    /// bytes actually available. `max_len` bounds the accepted record length.
    pub fn read(
        buf: &mut Cursor<'_>,
        expected_version: i32,
        max_len: usize,
    ) -> Result<RecordHeader, CodecError> {
        let available = buf.remaining();
        let version = buf.read_i32()?;
        if version != expected_version {
            return Err(CodecError::InvalidEncodingVersion {
                expected: expected_version,
                actual: version,
            });
        }
        let length = buf.read_i32()?;
        let len = usize::try_from(length)
            .map_err(|_| CodecError::corrupt(format!("negative record length {}", length)))?;
        if len < RECORD_HEADER_LEN || len > max_len {
            return Err(CodecError::corrupt(format!(
                "record length {} outside [{}, {}]",
                len, RECORD_HEADER_LEN, max_len
            )));
        }
        if len > available {
            return Err(CodecError::BufferTooSmall {
                needed: len,
                remaining: available,
            });
        }
        Ok(RecordHeader { version, length })
    }

    /// The record length as a `usize`.
    pub fn len(&self) -> usize {
        usize::try_from(self.length).expect("validated record length")
    }
}

impl Encode for RecordHeader {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        buf.put_i32(self.version);
        buf.put_i32(self.length);
    }

    fn encoded_len(&self) -> usize {
        RECORD_HEADER_LEN
    }
}

/// Writes `body` as a `[version][length][body]` record into `buf` at `*pos`.
///
/// Either the whole record is written and `*pos` is advanced past it, or
/// nothing is written and `*pos` is left alone. Records longer than `max_len`
/// are refused, the same bound [`read_record`] applies.
pub fn write_record<E: Encode>(
    version: i32,
    body: &E,
    max_len: usize,
    buf: &mut [u8],
    pos: &mut usize,
) -> Result<RecordHeader, CodecError> {
    let header = RecordHeader::for_body(version, body.encoded_len())?;
    let len = header.len();
    if len > max_len {
        return Err(CodecError::corrupt(format!(
            "record length {} exceeds limit {}",
            len, max_len
        )));
    }
    let remaining = buf.len().saturating_sub(*pos);
    if len > remaining {
        return Err(CodecError::BufferTooSmall {
            needed: len,
            remaining,
        });
    }
    let mut out = &mut buf[*pos..*pos + len];
    header.encode(&mut out);
    body.encode(&mut out);
    debug_assert!(out.is_empty(), "encoded_len disagrees with encode");
    *pos += len;
    Ok(header)
}

/// Validates the record header at `pos` and returns it together with a cursor
/// over exactly the record's body.
pub fn read_record<'a>(
    buf: &'a [u8],
    pos: usize,
    expected_version: i32,
    max_len: usize,
) -> Result<(RecordHeader, Cursor<'a>), CodecError> {
    let mut cursor = Cursor::at(buf, pos)?;
    let header = RecordHeader::read(&mut cursor, expected_version, max_len)?;
    let body = &buf[pos + RECORD_HEADER_LEN..pos + header.len()];
    Ok((header, Cursor::new(body)))
}

/// Fails if `body` has unread bytes, i.e. the record's `length` claimed more
/// than its fields used.
pub fn expect_consumed(body: &Cursor<'_>) -> Result<(), CodecError> {
    match body.remaining() {
        0 => Ok(()),
        n => Err(CodecError::corrupt(format!(
            "{} trailing bytes after record fields",
            n
        ))),
    }
}

macro_rules! int_codec {
    ($t:ty, $put:ident, $read:ident) => {
        impl Encode for $t {
            fn encode<B>(&self, buf: &mut B)
            where
                B: BufMut,
            {
                buf.$put(*self);
            }

            fn encoded_len(&self) -> usize {
                std::mem::size_of::<$t>()
            }
        }

        impl Codec for $t {
            fn decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
                buf.$read()
            }
        }
    };
}

int_codec!(i32, put_i32, read_i32);
int_codec!(i64, put_i64, read_i64);
int_codec!(u32, put_u32, read_u32);
int_codec!(u64, put_u64, read_u64);

impl Encode for bool {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        put_bool(buf, *self);
    }

    fn encoded_len(&self) -> usize {
        1
    }
}

impl Codec for bool {
    fn decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        buf.read_bool()
    }
}

/// `Option<T>` is a presence byte followed by the value when present.
impl<T: Encode> Encode for Option<T> {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        match self {
            Some(v) => {
                put_bool(buf, true);
                v.encode(buf);
            }
            None => put_bool(buf, false),
        }
    }

    fn encoded_len(&self) -> usize {
        1 + self.as_ref().map_or(0, Encode::encoded_len)
    }
}

impl<T: Codec> Codec for Option<T> {
    fn decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        if buf.read_bool()? {
            Ok(Some(T::decode(buf)?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_reads_are_bounds_checked() {
        let buf = [0u8, 0, 0, 7, 1];
        let mut c = Cursor::new(&buf);
        assert_eq!(c.read_i32(), Ok(7));
        assert_eq!(c.read_bool(), Ok(true));
        assert_eq!(
            c.read_u8(),
            Err(CodecError::BufferTooSmall {
                needed: 1,
                remaining: 0
            })
        );
        // A failed read does not move the cursor.
        assert_eq!(c.position(), 5);
    }

    #[test]
    fn cursor_rejects_non_canonical_bool() {
        let mut c = Cursor::new(&[2]);
        assert!(matches!(c.read_bool(), Err(CodecError::Corrupt(_))));
    }

    #[test]
    fn read_len_guards_against_huge_counts() {
        let mut buf = Vec::new();
        put_len(&mut buf, 1_000_000);
        buf.extend_from_slice(&[0; 16]);
        let mut c = Cursor::new(&buf);
        assert!(matches!(
            c.read_len(8),
            Err(CodecError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn record_header_validation() {
        let header = RecordHeader::for_body(1, 4).unwrap();
        let mut buf = header.encode_to_vec();
        buf.extend_from_slice(&[0; 4]);

        let mut c = Cursor::new(&buf);
        assert_eq!(RecordHeader::read(&mut c, 1, 1024), Ok(header));
        assert_eq!(header.len(), 12);

        let mut c = Cursor::new(&buf);
        assert_eq!(
            RecordHeader::read(&mut c, 2, 1024),
            Err(CodecError::InvalidEncodingVersion {
                expected: 2,
                actual: 1
            })
        );

        // Truncated record.
        let mut c = Cursor::new(&buf[..10]);
        assert!(matches!(
            RecordHeader::read(&mut c, 1, 1024),
            Err(CodecError::BufferTooSmall { .. })
        ));

        // Over the configured limit.
        let mut c = Cursor::new(&buf);
        assert!(matches!(
            RecordHeader::read(&mut c, 1, 11),
            Err(CodecError::Corrupt(_))
        ));
    }

    #[test]
    fn write_record_is_all_or_nothing() {
        let mut buf = [0xffu8; 16];
        let mut pos = 6;
        assert_eq!(
            write_record(1, &7i64, 1024, &mut buf, &mut pos),
            Err(CodecError::BufferTooSmall {
                needed: 16,
                remaining: 10
            })
        );
        assert_eq!(pos, 6);
        assert_eq!(buf, [0xff; 16]);

        let mut pos = 0;
        assert!(matches!(
            write_record(1, &7i64, 15, &mut buf, &mut pos),
            Err(CodecError::Corrupt(_))
        ));
        assert_eq!(pos, 0);
        let header = write_record(1, &7i64, 16, &mut buf, &mut pos).unwrap();
        assert_eq!(header.len(), 16);
        assert_eq!(pos, 16);

        let (read, mut body) = read_record(&buf, 0, 1, 1024).unwrap();
        assert_eq!(read, header);
        assert_eq!(body.read_i64(), Ok(7));
        assert_eq!(expect_consumed(&body), Ok(()));
    }

    #[test]
    fn option_encoding() {
        let some: Option<i64> = Some(-3);
        let none: Option<i64> = None;
        assert_eq!(some.encoded_len(), 9);
        assert_eq!(none.encoded_len(), 1);
        let buf = some.encode_to_vec();
        assert_eq!(Option::<i64>::decode(&mut Cursor::new(&buf)), Ok(Some(-3)));
        let buf = none.encode_to_vec();
        assert_eq!(Option::<i64>::decode(&mut Cursor::new(&buf)), Ok(None));
    }
}
