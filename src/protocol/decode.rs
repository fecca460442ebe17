//! Protocol message decoding
//!
//! Decoders work on a borrowed buffer and report how many bytes they consumed.
//! `Ok(None)` means the buffer does not yet hold a complete packet; the caller
//! reads more and tries again.

use super::constants::frontend_tags as tags;
use super::message::{FrontendMessage, StartupParameters, Target};
use bytes::Bytes;
use std::io;

/// Raw startup packet: version plus undecoded parameter bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupPacket {
    /// Major protocol version (upper 16 bits of the version field)
    pub major: u16,
    /// Minor protocol version (lower 16 bits of the version field)
    pub minor: u16,
    /// Parameter bytes (`length - 8` bytes)
    pub body: Bytes,
}

impl StartupPacket {
    /// Full 32-bit version code
    pub fn code(&self) -> i32 {
        ((self.major as i32) << 16) | self.minor as i32
    }

    /// Parse the body as NUL-terminated name/value pairs
    ///
    /// The list ends at an empty name or at the end of the body. An empty body
    /// is an empty parameter set.
    pub fn parameters(&self) -> io::Result<StartupParameters> {
        let mut reader = Reader::new(&self.body);
        let mut params = Vec::new();

        while !reader.is_empty() {
            let name = reader.cstring("parameter name")?;
            if name.is_empty() {
                break;
            }
            let value = reader.cstring("parameter value")?;
            params.push((name, value));
        }

        Ok(StartupParameters::new(params))
    }
}

/// Decode a startup packet
///
/// # Returns
/// `Ok(Some((packet, consumed)))` - A complete packet and the bytes it spans
/// `Ok(None)` - More bytes are needed
/// `Err(e)` - The length field is out of range
pub fn decode_startup(data: &[u8], max_len: usize) -> io::Result<Option<(StartupPacket, usize)>> {
    if data.len() < 4 {
        return Ok(None);
    }

    let len = i32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    if len < 8 {
        return Err(invalid(format!(
            "startup packet length {} is shorter than 8",
            len
        )));
    }
    let len = len as usize;
    if len > max_len {
        return Err(invalid(format!(
            "startup packet length {} exceeds maximum allowed {}",
            len, max_len
        )));
    }

    if data.len() < len {
        return Ok(None);
    }

    let major = u16::from_be_bytes([data[4], data[5]]);
    let minor = u16::from_be_bytes([data[6], data[7]]);
    let body = Bytes::copy_from_slice(&data[8..len]);

    Ok(Some((StartupPacket { major, minor, body }, len)))
}

/// Decode one frontend message
///
/// # Returns
/// `Ok(Some((msg, consumed)))` - Message and number of bytes consumed
/// `Ok(None)` - More bytes are needed
/// `Err(e)` - `InvalidData` if the frame is out of range or does not decode
pub fn decode_message(
    data: &[u8],
    max_len: usize,
) -> io::Result<Option<(FrontendMessage, usize)>> {
    if data.len() < 5 {
        return Ok(None);
    }

    let tag = data[0];
    let len = i32::from_be_bytes([data[1], data[2], data[3], data[4]]);

    if len < 4 {
        return Err(invalid(format!("message length {} is shorter than 4", len)));
    }
    let len = len as usize;
    if len > max_len {
        return Err(invalid(format!(
            "message length {} exceeds maximum allowed {}",
            len, max_len
        )));
    }

    if data.len() < len + 1 {
        return Ok(None);
    }

    let body = &data[5..len + 1];

    let msg = match tag {
        tags::QUERY => decode_query(body)?,
        tags::PARSE => decode_parse(body)?,
        tags::BIND => decode_bind(body)?,
        tags::DESCRIBE => decode_describe(body)?,
        tags::EXECUTE => decode_execute(body)?,
        tags::SYNC => decode_empty(body, FrontendMessage::Sync, "Sync")?,
        tags::FLUSH => decode_empty(body, FrontendMessage::Flush, "Flush")?,
        tags::CLOSE => decode_close(body)?,
        tags::TERMINATE => decode_empty(body, FrontendMessage::Terminate, "Terminate")?,
        _ => {
            return Err(invalid(format!(
                "unknown message tag: 0x{:02X}",
                tag
            )))
        }
    };

    Ok(Some((msg, len + 1)))
}

fn decode_query(data: &[u8]) -> io::Result<FrontendMessage> {
    let mut reader = Reader::new(data);
    let query = reader.cstring("query string")?;
    reader.finish("Query")?;
    Ok(FrontendMessage::Query(query))
}

fn decode_parse(data: &[u8]) -> io::Result<FrontendMessage> {
    let mut reader = Reader::new(data);
    let name = reader.cstring("statement name")?;
    let query = reader.cstring("query string")?;

    let count = reader.count("parameter type count")?;
    let mut param_types = Vec::with_capacity(count);
    for _ in 0..count {
        param_types.push(reader.i32("parameter type")? as u32);
    }
    reader.finish("Parse")?;

    Ok(FrontendMessage::Parse {
        name,
        query,
        param_types,
    })
}

fn decode_bind(data: &[u8]) -> io::Result<FrontendMessage> {
    let mut reader = Reader::new(data);
    let portal = reader.cstring("portal name")?;
    let statement = reader.cstring("statement name")?;

    let count = reader.count("parameter format count")?;
    let mut param_formats = Vec::with_capacity(count);
    for _ in 0..count {
        param_formats.push(reader.i16("parameter format")?);
    }

    let count = reader.count("parameter count")?;
    let mut params = Vec::with_capacity(count);
    for _ in 0..count {
        let len = reader.i32("parameter length")?;
        let value = if len == -1 {
            None
        } else if len < 0 {
            return Err(invalid(format!("negative parameter length {}", len)));
        } else {
            Some(Bytes::copy_from_slice(
                reader.bytes(len as usize, "parameter value")?,
            ))
        };
        params.push(value);
    }

    let count = reader.count("result format count")?;
    let mut result_formats = Vec::with_capacity(count);
    for _ in 0..count {
        result_formats.push(reader.i16("result format")?);
    }
    reader.finish("Bind")?;

    Ok(FrontendMessage::Bind {
        portal,
        statement,
        param_formats,
        params,
        result_formats,
    })
}

fn decode_describe(data: &[u8]) -> io::Result<FrontendMessage> {
    let mut reader = Reader::new(data);
    let target = reader.target()?;
    let name = reader.cstring("describe name")?;
    reader.finish("Describe")?;
    Ok(FrontendMessage::Describe { target, name })
}

fn decode_execute(data: &[u8]) -> io::Result<FrontendMessage> {
    let mut reader = Reader::new(data);
    let portal = reader.cstring("portal name")?;
    let max_rows = reader.i32("row limit")?;
    reader.finish("Execute")?;
    Ok(FrontendMessage::Execute { portal, max_rows })
}

fn decode_close(data: &[u8]) -> io::Result<FrontendMessage> {
    let mut reader = Reader::new(data);
    let target = reader.target()?;
    let name = reader.cstring("close name")?;
    reader.finish("Close")?;
    Ok(FrontendMessage::Close { target, name })
}

/// Body-less message: anything after the header is malformed
fn decode_empty(data: &[u8], msg: FrontendMessage, what: &str) -> io::Result<FrontendMessage> {
    Reader::new(data).finish(what)?;
    Ok(msg)
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Cursor over a message body
///
/// Every short read is `InvalidData`: the frame length was already satisfied,
/// so a missing field means the body itself is malformed.
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    fn bytes(&mut self, n: usize, what: &str) -> io::Result<&'a [u8]> {
        if self.data.len() - self.offset < n {
            return Err(invalid(format!("truncated {}", what)));
        }
        let out = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> io::Result<u8> {
        Ok(self.bytes(1, what)?[0])
    }

    fn i16(&mut self, what: &str) -> io::Result<i16> {
        let b = self.bytes(2, what)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    fn i32(&mut self, what: &str) -> io::Result<i32> {
        let b = self.bytes(4, what)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// i16 element count; negative counts are malformed
    fn count(&mut self, what: &str) -> io::Result<usize> {
        let n = self.i16(what)?;
        usize::try_from(n).map_err(|_| invalid(format!("negative {}: {}", what, n)))
    }

    fn cstring(&mut self, what: &str) -> io::Result<String> {
        let rest = &self.data[self.offset..];
        let end = rest.iter().position(|&b| b == 0).ok_or_else(|| {
            invalid(format!("missing null terminator in {}", what))
        })?;
        // Invalid UTF-8 is malformed input, never replaced
        let value = String::from_utf8(rest[..end].to_vec())
            .map_err(|e| invalid(format!("invalid UTF-8 in {}: {}", what, e)))?;
        self.offset += end + 1;
        Ok(value)
    }

    /// Fail if any bytes remain after the last field
    fn finish(self, what: &str) -> io::Result<()> {
        let left = self.data.len() - self.offset;
        if left > 0 {
            return Err(invalid(format!("{} trailing bytes after {} body", left, what)));
        }
        Ok(())
    }

    fn target(&mut self) -> io::Result<Target> {
        let b = self.u8("target")?;
        Target::from_byte(b)
            .ok_or_else(|| invalid(format!("unknown describe/close target: 0x{:02X}", b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::{MAX_MESSAGE_LENGTH, MAX_STARTUP_PACKET_LENGTH};

    fn frame(tag: u8, body: &[u8]) -> Vec<u8> {
        let mut buf = vec![tag];
        buf.extend_from_slice(&((body.len() + 4) as i32).to_be_bytes());
        buf.extend_from_slice(body);
        buf
    }

    #[test]
    fn test_decode_startup_without_parameters() {
        let data = [0, 0, 0, 8, 0, 3, 0, 0, 0, 0, 0, 0];
        let (packet, consumed) = decode_startup(&data, MAX_STARTUP_PACKET_LENGTH)
            .unwrap()
            .unwrap();

        assert_eq!((packet.major, packet.minor), (3, 0));
        assert_eq!(packet.code(), crate::protocol::constants::PROTOCOL_VERSION);
        assert_eq!(consumed, 8); // trailing bytes are not part of the packet
        assert!(packet.parameters().unwrap().is_empty());
    }

    #[test]
    fn test_decode_startup_with_parameters() {
        let body = b"user\0alice\0database\0app\0\0";
        let mut data = Vec::new();
        data.extend_from_slice(&((8 + body.len()) as i32).to_be_bytes());
        data.extend_from_slice(&[0, 3, 0, 0]);
        data.extend_from_slice(body);

        let (packet, consumed) = decode_startup(&data, MAX_STARTUP_PACKET_LENGTH)
            .unwrap()
            .unwrap();
        assert_eq!(consumed, data.len());

        let params = packet.parameters().unwrap();
        assert_eq!(params.user(), Some("alice"));
        assert_eq!(params.database(), Some("app"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_decode_startup_incomplete() {
        assert!(decode_startup(&[0, 0], 100).unwrap().is_none());
        assert!(decode_startup(&[0, 0, 0, 12, 0, 3, 0, 0], 100)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_decode_startup_rejects_short_length() {
        let err = decode_startup(&[0, 0, 0, 7, 0, 3, 0, 0], 100).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_decode_startup_rejects_oversized() {
        let err = decode_startup(&[0, 0, 0x30, 0, 0, 3, 0, 0], 100).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_startup_parameters_missing_terminator() {
        let packet = StartupPacket {
            major: 3,
            minor: 0,
            body: Bytes::from_static(b"user\0ali"),
        };
        assert!(packet.parameters().is_err());
    }

    #[test]
    fn test_decode_query() {
        let data = frame(b'Q', b"SELECT 1\0");
        let (msg, consumed) = decode_message(&data, MAX_MESSAGE_LENGTH).unwrap().unwrap();
        assert_eq!(msg, FrontendMessage::Query("SELECT 1".to_string()));
        assert_eq!(consumed, data.len());
    }

    #[test]
    fn test_decode_parse() {
        let mut body = Vec::new();
        body.extend_from_slice(b"s1\0SELECT $1\0");
        body.extend_from_slice(&1i16.to_be_bytes());
        body.extend_from_slice(&23i32.to_be_bytes());

        let (msg, _) = decode_message(&frame(b'P', &body), MAX_MESSAGE_LENGTH)
            .unwrap()
            .unwrap();
        assert_eq!(
            msg,
            FrontendMessage::Parse {
                name: "s1".to_string(),
                query: "SELECT $1".to_string(),
                param_types: vec![23],
            }
        );
    }

    #[test]
    fn test_decode_bind_with_null_parameter() {
        let mut body = Vec::new();
        body.extend_from_slice(b"p1\0s1\0");
        body.extend_from_slice(&0i16.to_be_bytes()); // param formats
        body.extend_from_slice(&2i16.to_be_bytes()); // params
        body.extend_from_slice(&2i32.to_be_bytes());
        body.extend_from_slice(b"42");
        body.extend_from_slice(&(-1i32).to_be_bytes());
        body.extend_from_slice(&1i16.to_be_bytes()); // result formats
        body.extend_from_slice(&1i16.to_be_bytes());

        let (msg, _) = decode_message(&frame(b'B', &body), MAX_MESSAGE_LENGTH)
            .unwrap()
            .unwrap();
        assert_eq!(
            msg,
            FrontendMessage::Bind {
                portal: "p1".to_string(),
                statement: "s1".to_string(),
                param_formats: vec![],
                params: vec![Some(Bytes::from_static(b"42")), None],
                result_formats: vec![1],
            }
        );
    }

    #[test]
    fn test_decode_describe_execute_close() {
        let (msg, _) = decode_message(&frame(b'D', b"Ps1\0"), MAX_MESSAGE_LENGTH)
            .unwrap()
            .unwrap();
        assert_eq!(
            msg,
            FrontendMessage::Describe {
                target: Target::Portal,
                name: "s1".to_string()
            }
        );

        let (msg, _) = decode_message(&frame(b'E', b"\0\0\0\0\0"), MAX_MESSAGE_LENGTH)
            .unwrap()
            .unwrap();
        assert_eq!(
            msg,
            FrontendMessage::Execute {
                portal: String::new(),
                max_rows: 0
            }
        );

        let (msg, _) = decode_message(&frame(b'C', b"S\0"), MAX_MESSAGE_LENGTH)
            .unwrap()
            .unwrap();
        assert_eq!(
            msg,
            FrontendMessage::Close {
                target: Target::Statement,
                name: String::new()
            }
        );
    }

    #[test]
    fn test_decode_sync_and_flush() {
        let mut data = frame(b'H', &[]);
        data.extend_from_slice(&frame(b'S', &[]));

        let (msg, consumed) = decode_message(&data, MAX_MESSAGE_LENGTH).unwrap().unwrap();
        assert_eq!(msg, FrontendMessage::Flush);
        assert_eq!(consumed, 5);

        let (msg, _) = decode_message(&data[consumed..], MAX_MESSAGE_LENGTH)
            .unwrap()
            .unwrap();
        assert_eq!(msg, FrontendMessage::Sync);
    }

    #[test]
    fn test_decode_incomplete_body() {
        let data = frame(b'Q', b"SELECT 1\0");
        assert!(decode_message(&data[..6], MAX_MESSAGE_LENGTH)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_decode_unknown_tag() {
        let err = decode_message(&frame(b'?', &[]), MAX_MESSAGE_LENGTH).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("unknown message tag"));
    }

    #[test]
    fn test_decode_malformed_body_is_invalid_data() {
        // Parse frame whose body stops before the parameter count
        let err = decode_message(&frame(b'P', b"s1\0SELECT 1\0"), MAX_MESSAGE_LENGTH).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_decode_rejects_non_utf8_query() {
        // LATIN1 'é' must not be silently rewritten to U+FFFD
        let err = decode_message(&frame(b'Q', b"SELECT '\xE9'\0"), MAX_MESSAGE_LENGTH).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("invalid UTF-8 in query string"));
    }

    #[test]
    fn test_decode_rejects_non_utf8_statement_name() {
        let mut body = Vec::new();
        body.extend_from_slice(b"caf\xE9\0SELECT 1\0");
        body.extend_from_slice(&0i16.to_be_bytes());

        let err = decode_message(&frame(b'P', &body), MAX_MESSAGE_LENGTH).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_decode_rejects_negative_counts() {
        let mut parse = Vec::new();
        parse.extend_from_slice(b"s1\0SELECT 1\0");
        parse.extend_from_slice(&(-1i16).to_be_bytes());
        let err = decode_message(&frame(b'P', &parse), MAX_MESSAGE_LENGTH).unwrap_err();
        assert!(err.to_string().contains("negative parameter type count"));

        let mut bind = Vec::new();
        bind.extend_from_slice(b"\0\0");
        bind.extend_from_slice(&0i16.to_be_bytes()); // param formats
        bind.extend_from_slice(&(-2i16).to_be_bytes()); // params
        bind.extend_from_slice(&0i16.to_be_bytes()); // result formats
        let err = decode_message(&frame(b'B', &bind), MAX_MESSAGE_LENGTH).unwrap_err();
        assert!(err.to_string().contains("negative parameter count"));
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut bind = Vec::new();
        bind.extend_from_slice(b"\0\0");
        bind.extend_from_slice(&0i16.to_be_bytes());
        bind.extend_from_slice(&0i16.to_be_bytes());
        bind.extend_from_slice(&0i16.to_be_bytes());
        bind.push(0xAA);
        let err = decode_message(&frame(b'B', &bind), MAX_MESSAGE_LENGTH).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("trailing bytes after Bind"));

        let err = decode_message(&frame(b'Q', b"SELECT 1\0X"), MAX_MESSAGE_LENGTH).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let err = decode_message(&frame(b'S', &[0]), MAX_MESSAGE_LENGTH).unwrap_err();
        assert!(err.to_string().contains("after Sync body"));
    }

    #[test]
    fn test_decode_rejects_oversized_message() {
        let oversized_len = (MAX_MESSAGE_LENGTH as i32) + 1;
        let len_bytes = oversized_len.to_be_bytes();
        let data = [b'Q', len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]];

        let err = decode_message(&data, MAX_MESSAGE_LENGTH).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("exceeds maximum"));
    }
}
