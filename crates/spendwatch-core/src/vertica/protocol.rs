//! Frontend/backend message codec.
//!
//! Frames are `tag (1 byte) + length (i32, includes itself) + payload`,
//! except the startup message, which carries no tag. The parser is
//! incremental: [`parse_message`] returns `Ok(None)` until a complete
//! frame is buffered, so short reads never corrupt the stream.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde_json::Value;
use std::fmt;

use crate::error::{Error, Result};

/// Protocol version 3.0.
pub const PROTOCOL_VERSION: i32 = 196_608;

/// Upper bound on a single backend frame. A result row larger than this
/// indicates a protocol desync, not data.
const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

// ============================================================================
// Frontend messages
// ============================================================================

/// Builds the startup message carrying the `user` and `database`
/// parameters.
#[must_use]
pub fn startup(user: &str, database: &str) -> Bytes {
    let mut body = BytesMut::new();
    body.put_i32(PROTOCOL_VERSION);
    for (name, value) in [("user", user), ("database", database)] {
        body.put_slice(name.as_bytes());
        body.put_u8(0);
        body.put_slice(value.as_bytes());
        body.put_u8(0);
    }
    body.put_u8(0);

    let mut frame = BytesMut::with_capacity(4 + body.len());
    frame.put_i32(4 + body.len() as i32);
    frame.extend_from_slice(&body);
    frame.freeze()
}

/// Builds a cleartext password message.
#[must_use]
pub fn password(password: &str) -> Bytes {
    tagged(b'p', |body| {
        body.put_slice(password.as_bytes());
        body.put_u8(0);
    })
}

/// Builds a simple-protocol query message.
#[must_use]
pub fn query(sql: &str) -> Bytes {
    tagged(b'Q', |body| {
        body.put_slice(sql.as_bytes());
        body.put_u8(0);
    })
}

/// Builds the terminate message.
#[must_use]
pub fn terminate() -> Bytes {
    tagged(b'X', |_| {})
}

fn tagged(tag: u8, fill: impl FnOnce(&mut BytesMut)) -> Bytes {
    let mut body = BytesMut::new();
    fill(&mut body);

    let mut frame = BytesMut::with_capacity(5 + body.len());
    frame.put_u8(tag);
    frame.put_i32(4 + body.len() as i32);
    frame.extend_from_slice(&body);
    frame.freeze()
}

// ============================================================================
// Backend messages
// ============================================================================

/// Authentication request carried by an `R` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequest {
    /// Authentication succeeded.
    Ok,
    /// Server wants the password in cleartext.
    CleartextPassword,
    /// A method this client does not implement (MD5, SHA-512, GSS, ...).
    Other(i32),
}

/// One column of a `RowDescription`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    /// Field name.
    pub name: String,
    /// Type OID, used to decode the text-format cells of this column.
    pub type_oid: i32,
}

/// An `ErrorResponse` or `NoticeResponse` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerError {
    /// Severity field (`ERROR`, `FATAL`, ...).
    pub severity: String,
    /// SQLSTATE code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code.is_empty() {
            write!(f, "{}: {}", self.severity, self.message)
        } else {
            write!(f, "{} ({}): {}", self.severity, self.code, self.message)
        }
    }
}

/// Messages the backend sends during startup and the query cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMessage {
    /// `R`: authentication request.
    Authentication(AuthRequest),
    /// `S`: run-time parameter report.
    ParameterStatus {
        /// Parameter name.
        name: String,
        /// Parameter value.
        value: String,
    },
    /// `K`: cancellation key data.
    BackendKeyData {
        /// Backend process id.
        pid: i32,
        /// Cancellation secret.
        secret: i32,
    },
    /// `Z`: ready for a new query; payload is the transaction status.
    ReadyForQuery(u8),
    /// `T`: column descriptor for the following data rows.
    RowDescription(Vec<ColumnDescription>),
    /// `D`: one row of values, `None` per NULL cell.
    DataRow(Vec<Option<Vec<u8>>>),
    /// `C`: statement finished; payload is the command tag.
    CommandComplete(String),
    /// `I`: the query string was empty.
    EmptyQueryResponse,
    /// `E`: the statement failed.
    ErrorResponse(ServerError),
    /// `N`: informational notice.
    NoticeResponse(ServerError),
    /// A tag this client does not interpret; skipped by callers.
    Unknown(u8),
}

/// Parses one backend message from `buf`, advancing past it.
///
/// Returns `Ok(None)` when the buffer does not yet hold a complete
/// frame.
pub fn parse_message(buf: &mut BytesMut) -> Result<Option<BackendMessage>> {
    if buf.len() < 5 {
        return Ok(None);
    }

    let tag = buf[0];
    let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
    if len < 4 {
        return Err(Error::Protocol(format!(
            "invalid frame length {len} for tag '{}'",
            tag as char
        )));
    }
    let frame_len = 1 + len as usize;
    if frame_len > MAX_MESSAGE_SIZE {
        return Err(Error::Protocol(format!(
            "frame of {frame_len} bytes exceeds the {MAX_MESSAGE_SIZE} byte limit"
        )));
    }
    if buf.len() < frame_len {
        return Ok(None);
    }

    buf.advance(5);
    let mut payload = buf.split_to(len as usize - 4);

    let message = match tag {
        b'R' => decode_authentication(&mut payload)?,
        b'S' => BackendMessage::ParameterStatus {
            name: read_cstr(&mut payload)?,
            value: read_cstr(&mut payload)?,
        },
        b'K' => {
            ensure_remaining(&payload, 8, "BackendKeyData")?;
            BackendMessage::BackendKeyData {
                pid: payload.get_i32(),
                secret: payload.get_i32(),
            }
        }
        b'Z' => {
            ensure_remaining(&payload, 1, "ReadyForQuery")?;
            BackendMessage::ReadyForQuery(payload.get_u8())
        }
        b'T' => decode_row_description(&mut payload)?,
        b'D' => decode_data_row(&mut payload)?,
        b'C' => BackendMessage::CommandComplete(read_cstr(&mut payload)?),
        b'I' => BackendMessage::EmptyQueryResponse,
        b'E' => BackendMessage::ErrorResponse(decode_error_fields(&mut payload)?),
        b'N' => BackendMessage::NoticeResponse(decode_error_fields(&mut payload)?),
        other => BackendMessage::Unknown(other),
    };

    Ok(Some(message))
}

fn decode_authentication(payload: &mut BytesMut) -> Result<BackendMessage> {
    ensure_remaining(payload, 4, "Authentication")?;
    let request = match payload.get_i32() {
        0 => AuthRequest::Ok,
        3 => AuthRequest::CleartextPassword,
        other => AuthRequest::Other(other),
    };
    Ok(BackendMessage::Authentication(request))
}

fn decode_row_description(payload: &mut BytesMut) -> Result<BackendMessage> {
    ensure_remaining(payload, 2, "RowDescription")?;
    let count = payload.get_i16();
    let mut columns = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        let name = read_cstr(payload)?;
        // table oid, attribute number, type oid, type size, type
        // modifier, format code
        ensure_remaining(payload, 18, "RowDescription field")?;
        payload.get_i32();
        payload.get_i16();
        let type_oid = payload.get_i32();
        payload.get_i16();
        payload.get_i32();
        payload.get_i16();
        columns.push(ColumnDescription { name, type_oid });
    }
    Ok(BackendMessage::RowDescription(columns))
}

fn decode_data_row(payload: &mut BytesMut) -> Result<BackendMessage> {
    ensure_remaining(payload, 2, "DataRow")?;
    let count = payload.get_i16();
    let mut cells = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        ensure_remaining(payload, 4, "DataRow cell")?;
        let len = payload.get_i32();
        if len < 0 {
            cells.push(None);
        } else {
            ensure_remaining(payload, len as usize, "DataRow cell value")?;
            cells.push(Some(payload.split_to(len as usize).to_vec()));
        }
    }
    Ok(BackendMessage::DataRow(cells))
}

fn decode_error_fields(payload: &mut BytesMut) -> Result<ServerError> {
    let mut error = ServerError::default();
    loop {
        ensure_remaining(payload, 1, "error field")?;
        let field = payload.get_u8();
        if field == 0 {
            break;
        }
        let value = read_cstr(payload)?;
        match field {
            b'S' => error.severity = value,
            b'C' => error.code = value,
            b'M' => error.message = value,
            _ => {}
        }
    }
    Ok(error)
}

fn read_cstr(payload: &mut BytesMut) -> Result<String> {
    let Some(end) = payload.iter().position(|b| *b == 0) else {
        return Err(Error::Protocol("unterminated string".to_string()));
    };
    let raw = payload.split_to(end);
    payload.advance(1);
    String::from_utf8(raw.to_vec()).map_err(|e| Error::Protocol(e.to_string()))
}

fn ensure_remaining(payload: &BytesMut, needed: usize, context: &str) -> Result<()> {
    if payload.len() < needed {
        return Err(Error::Protocol(format!(
            "truncated {context}: need {needed} bytes, have {}",
            payload.len()
        )));
    }
    Ok(())
}

// ============================================================================
// Value decoding
// ============================================================================

/// Type OIDs with a non-string JSON representation. Anything the server
/// describes with an OID outside this set stays a string.
const OID_BOOL: i32 = 16;
const OID_INT8: i32 = 20;
const OID_INT2: i32 = 21;
const OID_INT4: i32 = 23;
const OID_FLOAT4: i32 = 700;
const OID_FLOAT8: i32 = 701;
const OID_NUMERIC: i32 = 1700;

/// Decodes one text-format cell into a JSON value by its column's type
/// OID. NULL cells decode to `Value::Null`; values that fail to parse
/// under their declared type fall back to their text form rather than
/// erroring, since the analytics payloads are forwarded as JSON anyway.
#[must_use]
pub fn decode_cell(type_oid: i32, raw: Option<&[u8]>) -> Value {
    let Some(bytes) = raw else {
        return Value::Null;
    };
    let text = String::from_utf8_lossy(bytes);

    match type_oid {
        OID_BOOL => Value::Bool(matches!(text.as_ref(), "t" | "true" | "1")),
        OID_INT2 | OID_INT4 | OID_INT8 => text
            .parse::<i64>()
            .map_or_else(|_| Value::String(text.into_owned()), Value::from),
        OID_FLOAT4 | OID_FLOAT8 | OID_NUMERIC => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map_or_else(|| Value::String(text.into_owned()), Value::Number),
        _ => Value::String(text.into_owned()),
    }
}
