//! Protocol message encoding

use super::constants::{auth, frontend_tags, tags};
use super::message::{
    AuthenticationMessage, BackendMessage, ErrorFields, FieldDescription, FrontendMessage,
};
use bytes::{BufMut, BytesMut};
use std::io;

/// Encode a backend message into bytes
pub fn encode_message(msg: &BackendMessage) -> io::Result<BytesMut> {
    let mut buf = BytesMut::new();

    match msg {
        BackendMessage::Authentication(auth_msg) => {
            encode_authentication(&mut buf, auth_msg)?;
        }
        BackendMessage::BackendKeyData {
            process_id,
            secret_key,
        } => {
            buf.put_u8(tags::BACKEND_KEY_DATA);
            buf.put_i32(12);
            buf.put_i32(*process_id);
            buf.put_i32(*secret_key);
        }
        BackendMessage::ParameterStatus { name, value } => {
            framed(&mut buf, tags::PARAMETER_STATUS, |buf| {
                put_cstring(buf, name)?;
                put_cstring(buf, value)?;
                Ok(())
            })?;
        }
        BackendMessage::ReadyForQuery { status } => {
            buf.put_u8(tags::READY_FOR_QUERY);
            buf.put_i32(5);
            buf.put_u8(status.as_byte());
        }
        BackendMessage::ParseComplete => encode_empty(&mut buf, tags::PARSE_COMPLETE),
        BackendMessage::BindComplete => encode_empty(&mut buf, tags::BIND_COMPLETE),
        BackendMessage::CloseComplete => encode_empty(&mut buf, tags::CLOSE_COMPLETE),
        BackendMessage::NoData => encode_empty(&mut buf, tags::NO_DATA),
        BackendMessage::PortalSuspended => encode_empty(&mut buf, tags::PORTAL_SUSPENDED),
        BackendMessage::EmptyQueryResponse => {
            encode_empty(&mut buf, tags::EMPTY_QUERY_RESPONSE)
        }
        BackendMessage::CommandComplete(tag) => {
            framed(&mut buf, tags::COMMAND_COMPLETE, |buf| {
                put_cstring(buf, tag)?;
                Ok(())
            })?;
        }
        BackendMessage::RowDescription(fields) => {
            encode_row_description(&mut buf, fields)?;
        }
        BackendMessage::ParameterDescription(types) => {
            framed(&mut buf, tags::PARAMETER_DESCRIPTION, |buf| {
                buf.put_i16(count(types.len(), "parameter types")?);
                for oid in types {
                    buf.put_u32(*oid);
                }
                Ok(())
            })?;
        }
        BackendMessage::DataRow(values) => {
            framed(&mut buf, tags::DATA_ROW, |buf| {
                buf.put_i16(count(values.len(), "data row columns")?);
                for value in values {
                    match value {
                        Some(bytes) => {
                            buf.put_i32(length(bytes.len())?);
                            buf.put_slice(bytes);
                        }
                        None => buf.put_i32(-1),
                    }
                }
                Ok(())
            })?;
        }
        BackendMessage::ErrorResponse(fields) => {
            encode_error_fields(&mut buf, tags::ERROR_RESPONSE, fields)?;
        }
        BackendMessage::NoticeResponse(fields) => {
            encode_error_fields(&mut buf, tags::NOTICE_RESPONSE, fields)?;
        }
    }

    Ok(buf)
}

fn encode_authentication(buf: &mut BytesMut, msg: &AuthenticationMessage) -> io::Result<()> {
    buf.put_u8(tags::AUTHENTICATION);
    match msg {
        AuthenticationMessage::Ok => {
            buf.put_i32(8);
            buf.put_i32(auth::OK);
        }
        AuthenticationMessage::CleartextPassword => {
            buf.put_i32(8);
            buf.put_i32(auth::CLEARTEXT_PASSWORD);
        }
        AuthenticationMessage::Md5Password { salt } => {
            buf.put_i32(12);
            buf.put_i32(auth::MD5_PASSWORD);
            buf.put_slice(salt);
        }
    }
    Ok(())
}

fn encode_empty(buf: &mut BytesMut, tag: u8) {
    buf.put_u8(tag);
    buf.put_i32(4); // Length includes itself
}

fn encode_row_description(buf: &mut BytesMut, fields: &[FieldDescription]) -> io::Result<()> {
    framed(buf, tags::ROW_DESCRIPTION, |buf| {
        buf.put_i16(count(fields.len(), "row description fields")?);
        for field in fields {
            put_cstring(buf, &field.name)?;
            buf.put_i32(field.table_oid);
            buf.put_i16(field.column_attr);
            buf.put_u32(field.type_oid);
            buf.put_i16(field.type_size);
            buf.put_i32(field.type_modifier);
            buf.put_i16(field.format_code);
        }
        Ok(())
    })
}

fn encode_error_fields(buf: &mut BytesMut, tag: u8, fields: &ErrorFields) -> io::Result<()> {
    framed(buf, tag, |buf| {
        for (field_type, value) in fields.pairs() {
            buf.put_u8(field_type);
            put_cstring(buf, value)?;
        }
        buf.put_u8(0);
        Ok(())
    })
}

/// Encode a frontend message into bytes
///
/// Used by clients of this crate that forward traffic upstream, and by tests
/// that play the client side of a connection.
pub fn encode_frontend(msg: &FrontendMessage) -> io::Result<BytesMut> {
    let mut buf = BytesMut::new();

    match msg {
        FrontendMessage::Query(query) => {
            framed(&mut buf, frontend_tags::QUERY, |buf| {
                put_cstring(buf, query)?;
                Ok(())
            })?;
        }
        FrontendMessage::Parse {
            name,
            query,
            param_types,
        } => {
            framed(&mut buf, frontend_tags::PARSE, |buf| {
                put_cstring(buf, name)?;
                put_cstring(buf, query)?;
                buf.put_i16(count(param_types.len(), "parameter types")?);
                for oid in param_types {
                    buf.put_u32(*oid);
                }
                Ok(())
            })?;
        }
        FrontendMessage::Bind {
            portal,
            statement,
            param_formats,
            params,
            result_formats,
        } => {
            framed(&mut buf, frontend_tags::BIND, |buf| {
                put_cstring(buf, portal)?;
                put_cstring(buf, statement)?;
                buf.put_i16(count(param_formats.len(), "parameter formats")?);
                for format in param_formats {
                    buf.put_i16(*format);
                }
                buf.put_i16(count(params.len(), "parameters")?);
                for param in params {
                    match param {
                        Some(bytes) => {
                            buf.put_i32(length(bytes.len())?);
                            buf.put_slice(bytes);
                        }
                        None => buf.put_i32(-1),
                    }
                }
                buf.put_i16(count(result_formats.len(), "result formats")?);
                for format in result_formats {
                    buf.put_i16(*format);
                }
                Ok(())
            })?;
        }
        FrontendMessage::Describe { target, name } => {
            framed(&mut buf, frontend_tags::DESCRIBE, |buf| {
                buf.put_u8(target.as_byte());
                put_cstring(buf, name)?;
                Ok(())
            })?;
        }
        FrontendMessage::Execute { portal, max_rows } => {
            framed(&mut buf, frontend_tags::EXECUTE, |buf| {
                put_cstring(buf, portal)?;
                buf.put_i32(*max_rows);
                Ok(())
            })?;
        }
        FrontendMessage::Sync => encode_empty(&mut buf, frontend_tags::SYNC),
        FrontendMessage::Flush => encode_empty(&mut buf, frontend_tags::FLUSH),
        FrontendMessage::Close { target, name } => {
            framed(&mut buf, frontend_tags::CLOSE, |buf| {
                buf.put_u8(target.as_byte());
                put_cstring(buf, name)?;
                Ok(())
            })?;
        }
        FrontendMessage::Terminate => encode_empty(&mut buf, frontend_tags::TERMINATE),
    }

    Ok(buf)
}

/// Encode a startup packet for an arbitrary (major, minor) version
pub fn encode_startup(major: u16, minor: u16, params: &[(&str, &str)]) -> io::Result<BytesMut> {
    let mut buf = BytesMut::new();

    // Startup packets don't have a type byte
    buf.put_i32(0);
    buf.put_u16(major);
    buf.put_u16(minor);

    for (key, value) in params {
        put_cstring(&mut buf, key)?;
        put_cstring(&mut buf, value)?;
    }
    if !params.is_empty() {
        buf.put_u8(0);
    }

    let len = length(buf.len())?;
    buf[0..4].copy_from_slice(&len.to_be_bytes());
    Ok(buf)
}

/// Write a tag, a length placeholder and the body, then fill in the length
fn framed<F>(buf: &mut BytesMut, tag: u8, body: F) -> io::Result<()>
where
    F: FnOnce(&mut BytesMut) -> io::Result<()>,
{
    buf.put_u8(tag);
    let len_pos = buf.len();
    buf.put_i32(0);

    body(buf)?;

    let len = length(buf.len() - len_pos)?;
    buf[len_pos..len_pos + 4].copy_from_slice(&len.to_be_bytes());
    Ok(())
}

fn put_cstring(buf: &mut BytesMut, s: &str) -> io::Result<()> {
    if s.as_bytes().contains(&0) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("string contains a null byte: {:?}", s),
        ));
    }
    buf.put(s.as_bytes());
    buf.put_u8(0);
    Ok(())
}

fn count(n: usize, what: &str) -> io::Result<i16> {
    i16::try_from(n).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("too many {}: {}", what, n),
        )
    })
}

fn length(n: usize) -> io::Result<i32> {
    i32::try_from(n).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("message too large: {} bytes", n),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode::{decode_message, decode_startup};
    use crate::protocol::message::{Target, TransactionStatus};
    use bytes::Bytes;

    #[test]
    fn test_encode_ready_for_query() {
        let msg = BackendMessage::ReadyForQuery {
            status: TransactionStatus::Idle,
        };
        let buf = encode_message(&msg).unwrap();
        assert_eq!(&buf[..], &[b'Z', 0, 0, 0, 5, b'I']);
    }

    #[test]
    fn test_encode_completions() {
        assert_eq!(
            &encode_message(&BackendMessage::ParseComplete).unwrap()[..],
            &[b'1', 0, 0, 0, 4]
        );
        assert_eq!(
            &encode_message(&BackendMessage::BindComplete).unwrap()[..],
            &[b'2', 0, 0, 0, 4]
        );
        assert_eq!(
            &encode_message(&BackendMessage::CloseComplete).unwrap()[..],
            &[b'3', 0, 0, 0, 4]
        );
    }

    #[test]
    fn test_encode_authentication_ok() {
        let msg = BackendMessage::Authentication(AuthenticationMessage::Ok);
        let buf = encode_message(&msg).unwrap();
        assert_eq!(&buf[..], &[b'R', 0, 0, 0, 8, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_parameter_status() {
        let msg = BackendMessage::ParameterStatus {
            name: "server_version".to_string(),
            value: "16.0".to_string(),
        };
        let buf = encode_message(&msg).unwrap();
        // length = 4 + 15 ("server_version\0") + 5 ("16.0\0") = 24
        assert_eq!(buf[0], b'S');
        assert_eq!(&buf[1..5], &[0, 0, 0, 24]);
        assert_eq!(&buf[5..], b"server_version\x0016.0\x00");
    }

    #[test]
    fn test_encode_command_complete() {
        let buf = encode_message(&BackendMessage::CommandComplete("SELECT 1".into())).unwrap();
        assert_eq!(buf[0], b'C');
        let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
        assert_eq!(len, (buf.len() - 1) as i32);
        assert_eq!(&buf[5..], b"SELECT 1\0");
    }

    #[test]
    fn test_encode_data_row_with_null() {
        let msg = BackendMessage::DataRow(vec![Some(Bytes::from_static(b"1")), None]);
        let buf = encode_message(&msg).unwrap();
        assert_eq!(
            &buf[..],
            &[b'D', 0, 0, 0, 15, 0, 2, 0, 0, 0, 1, b'1', 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_encode_error_response() {
        let msg = BackendMessage::ErrorResponse(ErrorFields::error("XX000", "boom"));
        let buf = encode_message(&msg).unwrap();
        assert_eq!(buf[0], b'E');
        assert_eq!(*buf.last().unwrap(), 0);
        assert_eq!(&buf[5..], b"SERROR\0VERROR\0CXX000\0Mboom\0\0");
    }

    #[test]
    fn test_encode_frontend_decodes_back() {
        let messages = vec![
            FrontendMessage::Query("SELECT 1".into()),
            FrontendMessage::Parse {
                name: "s".into(),
                query: "SELECT $1".into(),
                param_types: vec![25],
            },
            FrontendMessage::Bind {
                portal: "".into(),
                statement: "s".into(),
                param_formats: vec![0],
                params: vec![Some(Bytes::from_static(b"x")), None],
                result_formats: vec![],
            },
            FrontendMessage::Describe {
                target: Target::Statement,
                name: "s".into(),
            },
            FrontendMessage::Execute {
                portal: "".into(),
                max_rows: 10,
            },
            FrontendMessage::Close {
                target: Target::Portal,
                name: "".into(),
            },
            FrontendMessage::Sync,
        ];

        let mut stream = BytesMut::new();
        for msg in &messages {
            stream.extend_from_slice(&encode_frontend(msg).unwrap());
        }

        let mut decoded = Vec::new();
        let mut offset = 0;
        while let Some((msg, consumed)) = decode_message(&stream[offset..], 1 << 20).unwrap() {
            decoded.push(msg);
            offset += consumed;
        }
        assert_eq!(decoded, messages);
    }

    #[test]
    fn test_encode_startup() {
        let buf = encode_startup(3, 0, &[]).unwrap();
        assert_eq!(&buf[..], &[0, 0, 0, 8, 0, 3, 0, 0]);

        let buf = encode_startup(3, 0, &[("user", "bob")]).unwrap();
        let (packet, consumed) = decode_startup(&buf, 1024).unwrap().unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(packet.parameters().unwrap().user(), Some("bob"));
    }

    #[test]
    fn test_encode_rejects_interior_null() {
        let err = encode_message(&BackendMessage::CommandComplete("SELECT\01".into())).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let fields = ErrorFields::error("XX000", "bad\0message");
        let err = encode_message(&BackendMessage::ErrorResponse(fields)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let err = encode_startup(3, 0, &[("user", "a\0b")]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
