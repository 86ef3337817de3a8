// https://redis.io/docs/reference/protocol-spec

use std::fmt;
use std::io::Cursor;
use std::str;

use bytes::{Buf, Bytes};
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

// Upper bound on the capacity reserved up front for an array. The declared count comes from the
// client, so it is not trusted for allocation.
const MAX_PREALLOCATED_ELEMENTS: usize = 1024;

// Arrays nested deeper than this are rejected. Requests are flat arrays of strings, and parsing
// recurses once per level.
pub const MAX_NESTING_DEPTH: usize = 32;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("invalid frame data type: {0}")]
    InvalidDataType(u8),
    #[error("invalid length: {0:?}")]
    InvalidLength(String),
    #[error("invalid integer: {0:?}")]
    InvalidInteger(String),
    #[error("invalid UTF-8 in frame")]
    InvalidUtf8(#[from] str::Utf8Error),
    #[error("frame of {size} bytes exceeds the limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },
    #[error("arrays nested deeper than {limit} levels")]
    NestingTooDeep { limit: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A single RESP2 value, either decoded from a client request or built as a reply.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    NullBulkString,
    Array(Vec<Frame>),
    NullArray,
}

// Protocol specification: https://redis.io/docs/reference/protocol-spec/
impl Frame {
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        Self::parse_nested(src, 0)
    }

    /// `depth` is the number of arrays enclosing the value at the cursor.
    fn parse_nested(src: &mut Cursor<&[u8]>, depth: usize) -> Result<Self, Error> {
        // The first byte in an RESP-serialized payload always identifies its type.
        // Subsequent bytes constitute the type's contents.
        let first_byte = get_byte(src)?;
        let data_type = DataType::try_from(first_byte)?;

        match data_type {
            DataType::SimpleString => {
                let line = get_line(src)?;
                Ok(Frame::Simple(str::from_utf8(line)?.to_string()))
            }
            DataType::SimpleError => {
                let line = get_line(src)?;
                Ok(Frame::Error(str::from_utf8(line)?.to_string()))
            }
            DataType::Integer => get_integer(src).map(Frame::Integer),
            // $<length>\r\n<data>\r\n
            DataType::BulkString => {
                let Some(length) = get_length(src)? else {
                    return Ok(Frame::NullBulkString);
                };

                let data = Bytes::copy_from_slice(get_bytes(src, length)?);
                // The terminator is consumed as-is, its contents are not checked.
                get_bytes(src, CRLF.len())?;

                Ok(Frame::Bulk(data))
            }
            // *<number-of-elements>\r\n<element-1>...<element-n>
            DataType::Array => {
                if depth >= MAX_NESTING_DEPTH {
                    return Err(Error::NestingTooDeep {
                        limit: MAX_NESTING_DEPTH,
                    });
                }

                let Some(count) = get_length(src)? else {
                    return Ok(Frame::NullArray);
                };

                let mut frames = Vec::with_capacity(count.min(MAX_PREALLOCATED_ELEMENTS));
                for _ in 0..count {
                    frames.push(Self::parse_nested(src, depth + 1)?);
                }

                Ok(Frame::Array(frames))
            }
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.serialize_into(&mut bytes);
        bytes
    }

    fn serialize_into(&self, bytes: &mut Vec<u8>) {
        match self {
            Frame::Simple(s) => {
                bytes.push(u8::from(DataType::SimpleString));
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
            }
            Frame::Error(s) => {
                bytes.push(u8::from(DataType::SimpleError));
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
            }
            Frame::Integer(i) => {
                bytes.push(u8::from(DataType::Integer));
                bytes.extend_from_slice(i.to_string().as_bytes());
                bytes.extend_from_slice(CRLF);
            }
            Frame::Bulk(data) => {
                bytes.push(u8::from(DataType::BulkString));
                bytes.extend_from_slice(data.len().to_string().as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes.extend_from_slice(data);
                bytes.extend_from_slice(CRLF);
            }
            Frame::NullBulkString => {
                bytes.push(u8::from(DataType::BulkString));
                bytes.extend_from_slice(b"-1");
                bytes.extend_from_slice(CRLF);
            }
            Frame::Array(arr) => {
                bytes.push(u8::from(DataType::Array));
                bytes.extend_from_slice(arr.len().to_string().as_bytes());
                bytes.extend_from_slice(CRLF);
                for frame in arr {
                    frame.serialize_into(bytes);
                }
            }
            Frame::NullArray => {
                bytes.push(u8::from(DataType::Array));
                bytes.extend_from_slice(b"-1");
                bytes.extend_from_slice(CRLF);
            }
        }
    }
}

impl From<Frame> for Vec<u8> {
    fn from(frame: Frame) -> Self {
        frame.serialize()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", s),
            Frame::Error(s) => write!(f, "-{}", s),
            Frame::Integer(i) => write!(f, ":{}", i),
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::NullBulkString => write!(f, "$-1"),
            Frame::Array(arr) => {
                write!(f, "*{}", arr.len())?;
                for frame in arr {
                    write!(f, " {}", frame)?;
                }
                Ok(())
            }
            Frame::NullArray => write!(f, "*-1"),
        }
    }
}

/// Returns the bytes up to the next CRLF and moves the cursor past it.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    let line_end = buf[start..]
        .windows(2)
        .position(|window| window == CRLF)
        .map(|index| start + index)
        .ok_or(Error::Incomplete)?;

    src.set_position((line_end + CRLF.len()) as u64);

    Ok(&buf[start..line_end])
}

fn get_bytes<'a>(src: &mut Cursor<&'a [u8]>, len: usize) -> Result<&'a [u8], Error> {
    if src.remaining() < len {
        return Err(Error::Incomplete);
    }

    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();
    src.advance(len);

    Ok(&buf[start..start + len])
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

fn get_integer(src: &mut Cursor<&[u8]>) -> Result<i64, Error> {
    let line = get_line(src)?;
    let text = str::from_utf8(line)?;
    text.parse::<i64>()
        .map_err(|_| Error::InvalidInteger(text.to_string()))
}

/// Parses the whole decimal token of a length or count header. `-1` is the RESP2 null marker and
/// yields `None`.
fn get_length(src: &mut Cursor<&[u8]>) -> Result<Option<usize>, Error> {
    let line = get_line(src)?;
    let invalid = || Error::InvalidLength(String::from_utf8_lossy(line).into_owned());

    let length = str::from_utf8(line)
        .map_err(|_| invalid())?
        .parse::<i64>()
        .map_err(|_| invalid())?;

    match length {
        -1 => Ok(None),
        length => usize::try_from(length).map(Some).map_err(|_| invalid()),
    }
}

#[derive(Debug)]
enum DataType {
    SimpleString, // '+'
    SimpleError,  // '-'
    Integer,      // ':'
    // Due to historical reasons, RESP2 has no dedicated null type: null is expressed as a bulk
    // string or an array with a length of -1.
    BulkString, // '$'
    Array,      // '*'
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b':' => Ok(Self::Integer),
            b'$' => Ok(Self::BulkString),
            b'*' => Ok(Self::Array),
            _ => Err(Error::InvalidDataType(byte)),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        match value {
            DataType::SimpleString => b'+',
            DataType::SimpleError => b'-',
            DataType::Integer => b':',
            DataType::BulkString => b'$',
            DataType::Array => b'*',
        }
    }
}
