//! Tests for the wire codec.

use super::protocol::{
    decode_cell, parse_message, password, query, startup, terminate, AuthRequest, BackendMessage,
    PROTOCOL_VERSION,
};
use bytes::{BufMut, BytesMut};
use serde_json::{json, Value};

/// Builds a backend frame: tag + length + payload.
fn frame(tag: u8, payload: &[u8]) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_u8(tag);
    buf.put_i32(4 + payload.len() as i32);
    buf.put_slice(payload);
    buf
}

#[test]
fn test_startup_message_layout() {
    let bytes = startup("dashboard_ro", "warehouse");

    let len = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    assert_eq!(len as usize, bytes.len());

    let version = i32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    assert_eq!(version, PROTOCOL_VERSION);

    let body = &bytes[8..];
    assert_eq!(
        body,
        b"user\0dashboard_ro\0database\0warehouse\0\0".as_slice()
    );
}

#[test]
fn test_query_message_layout() {
    let bytes = query("SELECT 1");
    assert_eq!(bytes[0], b'Q');
    let len = i32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    assert_eq!(len as usize, bytes.len() - 1);
    assert_eq!(&bytes[5..], b"SELECT 1\0".as_slice());
}

#[test]
fn test_password_and_terminate_tags() {
    assert_eq!(password("secret")[0], b'p');
    let term = terminate();
    assert_eq!(term.as_ref(), &[b'X', 0, 0, 0, 4]);
}

#[test]
fn test_parse_returns_none_on_partial_frame() {
    let full = frame(b'Z', &[b'I']);
    for cut in 0..full.len() {
        let mut partial = BytesMut::from(&full[..cut]);
        assert_eq!(parse_message(&mut partial).unwrap(), None, "cut at {cut}");
    }
}

#[test]
fn test_parse_consumes_exactly_one_frame() {
    let mut buf = frame(b'Z', &[b'I']);
    buf.extend_from_slice(&frame(b'Z', &[b'T']));

    assert_eq!(
        parse_message(&mut buf).unwrap(),
        Some(BackendMessage::ReadyForQuery(b'I'))
    );
    assert_eq!(
        parse_message(&mut buf).unwrap(),
        Some(BackendMessage::ReadyForQuery(b'T'))
    );
    assert!(buf.is_empty());
}

#[test]
fn test_parse_authentication_variants() {
    let mut ok = frame(b'R', &0i32.to_be_bytes());
    assert_eq!(
        parse_message(&mut ok).unwrap(),
        Some(BackendMessage::Authentication(AuthRequest::Ok))
    );

    let mut cleartext = frame(b'R', &3i32.to_be_bytes());
    assert_eq!(
        parse_message(&mut cleartext).unwrap(),
        Some(BackendMessage::Authentication(AuthRequest::CleartextPassword))
    );

    let mut md5 = frame(b'R', &5i32.to_be_bytes());
    assert_eq!(
        parse_message(&mut md5).unwrap(),
        Some(BackendMessage::Authentication(AuthRequest::Other(5)))
    );
}

#[test]
fn test_parse_row_description() {
    let mut payload = BytesMut::new();
    payload.put_i16(2);
    for (name, oid) in [("advertiser_id", 20i32), ("description", 25i32)] {
        payload.put_slice(name.as_bytes());
        payload.put_u8(0);
        payload.put_i32(0); // table oid
        payload.put_i16(0); // attribute number
        payload.put_i32(oid);
        payload.put_i16(8); // type size
        payload.put_i32(-1); // type modifier
        payload.put_i16(0); // format
    }

    let mut buf = frame(b'T', &payload);
    let Some(BackendMessage::RowDescription(columns)) = parse_message(&mut buf).unwrap() else {
        panic!("expected RowDescription");
    };
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0].name, "advertiser_id");
    assert_eq!(columns[0].type_oid, 20);
    assert_eq!(columns[1].name, "description");
    assert_eq!(columns[1].type_oid, 25);
}

#[test]
fn test_parse_data_row_with_null_cell() {
    let mut payload = BytesMut::new();
    payload.put_i16(3);
    payload.put_i32(2);
    payload.put_slice(b"42");
    payload.put_i32(-1); // NULL
    payload.put_i32(4);
    payload.put_slice(b"Acme");

    let mut buf = frame(b'D', &payload);
    let Some(BackendMessage::DataRow(cells)) = parse_message(&mut buf).unwrap() else {
        panic!("expected DataRow");
    };
    assert_eq!(cells[0].as_deref(), Some(b"42".as_slice()));
    assert_eq!(cells[1], None);
    assert_eq!(cells[2].as_deref(), Some(b"Acme".as_slice()));
}

#[test]
fn test_parse_error_response_fields() {
    let mut payload = BytesMut::new();
    payload.put_slice(b"SERROR\0");
    payload.put_slice(b"C42601\0");
    payload.put_slice(b"Msyntax error at or near \"SELEC\"\0");
    payload.put_u8(0);

    let mut buf = frame(b'E', &payload);
    let Some(BackendMessage::ErrorResponse(err)) = parse_message(&mut buf).unwrap() else {
        panic!("expected ErrorResponse");
    };
    assert_eq!(err.severity, "ERROR");
    assert_eq!(err.code, "42601");
    assert!(err.message.contains("SELEC"));
    assert!(err.to_string().contains("42601"));
}

#[test]
fn test_parse_rejects_invalid_length() {
    let mut buf = BytesMut::new();
    buf.put_u8(b'Z');
    buf.put_i32(2); // impossible: length includes its own four bytes
    buf.put_slice(&[0; 8]);
    assert!(parse_message(&mut buf).is_err());
}

#[test]
fn test_unknown_tag_is_surfaced_not_fatal() {
    let mut buf = frame(b'v', &[1, 2, 3]);
    assert_eq!(
        parse_message(&mut buf).unwrap(),
        Some(BackendMessage::Unknown(b'v'))
    );
    assert!(buf.is_empty(), "unknown frames are consumed whole");
}

#[test]
fn test_decode_cell_by_type_oid() {
    assert_eq!(decode_cell(16, Some(b"t")), json!(true));
    assert_eq!(decode_cell(16, Some(b"f")), json!(false));
    assert_eq!(decode_cell(20, Some(b"9934")), json!(9934));
    assert_eq!(decode_cell(23, Some(b"-7")), json!(-7));
    assert_eq!(decode_cell(701, Some(b"98.5")), json!(98.5));
    assert_eq!(decode_cell(1700, Some(b"0.25")), json!(0.25));
    assert_eq!(decode_cell(25, Some(b"Acme")), json!("Acme"));
    assert_eq!(decode_cell(20, None), Value::Null);
}

#[test]
fn test_decode_cell_falls_back_to_text_on_parse_failure() {
    assert_eq!(decode_cell(20, Some(b"not-a-number")), json!("not-a-number"));
}

#[test]
fn test_decode_cell_unknown_oid_stays_text() {
    assert_eq!(
        decode_cell(1114, Some(b"2025-10-24 13:30:00")),
        json!("2025-10-24 13:30:00")
    );
}
