//! Black-box scenarios against the public decode/encode API, covering the
//! concrete wire-format cases called out for the format: nil, a small
//! integer, a fresh-symbol-then-back-reference pair, a UTF-8-flagged
//! string, and a generic object with instance variables.

use rmarshal_core::arena::ObjectData;
use rmarshal_core::{decode, encode, DecodeOptions, EncodeOptions, Value};

// ─── Scalars ────────────────────────────────────────────────────────────────

#[test]
fn minimal_nil() {
    let bytes = [0x04, 0x08, b'0'];
    let doc = decode(&bytes[..], &DecodeOptions::default()).unwrap();
    assert!(matches!(doc.root, Value::Null));

    let mut out = Vec::new();
    encode(&mut out, &doc.arena, doc.root, &EncodeOptions::default()).unwrap();
    assert_eq!(out, bytes);
}

#[test]
fn small_integer() {
    let bytes = [0x04, 0x08, b'i', 0x0A];
    let doc = decode(&bytes[..], &DecodeOptions::default()).unwrap();
    assert!(matches!(doc.root, Value::Int(5)));
}

// ─── Symbols ────────────────────────────────────────────────────────────────

#[test]
fn fresh_symbol_then_back_reference() {
    // [:ok, :ok] — two elements, the second a back-reference to the first
    // symbol (marshal-id 0).
    let mut bytes = vec![0x04, 0x08, b'['];
    bytes.push(0x02 + 5); // fixnum 2 (array length)
    bytes.push(b':');
    bytes.push(0x02 + 5); // fixnum 2 (symbol byte length)
    bytes.extend_from_slice(b"ok");
    bytes.push(b';');
    bytes.push(0x00); // fixnum 0 (symbol back-reference) — 0 is its own tag byte

    let doc = decode(&bytes[..], &DecodeOptions::default()).unwrap();
    let array_id = doc.root.as_object().unwrap();
    let items = match doc.arena.get_object(array_id).unwrap() {
        ObjectData::Array(a) => &a.items,
        _ => panic!("expected an array"),
    };
    assert_eq!(items.len(), 2);
    let (a, b) = (items[0].as_symbol().unwrap(), items[1].as_symbol().unwrap());
    assert_eq!(a, b, "both elements should resolve to the same symbol id");
    assert_eq!(doc.arena.get_symbol(a).unwrap(), b"ok");

    let mut out = Vec::new();
    encode(&mut out, &doc.arena, doc.root, &EncodeOptions::default()).unwrap();
    assert_eq!(out, bytes, "re-encoding must reproduce the back-reference, not a fresh symbol");
}

// ─── Strings ────────────────────────────────────────────────────────────────

#[test]
fn utf8_flagged_string_round_trips_its_ivar() {
    // "I" "hi" 1 :E true
    let mut bytes = vec![0x04, 0x08, b'I', b'"'];
    bytes.push(0x02 + 5);
    bytes.extend_from_slice(b"hi");
    bytes.push(0x01 + 5); // 1 ivar
    bytes.push(b':');
    bytes.push(0x01 + 5);
    bytes.push(b'E');
    bytes.push(b'T');

    let doc = decode(&bytes[..], &DecodeOptions::default()).unwrap();
    let id = doc.root.as_object().unwrap();
    match doc.arena.get_object(id).unwrap() {
        ObjectData::String(s) => {
            assert_eq!(s.bytes, b"hi");
            assert!(doc.arena.string_is_utf8(s));
        }
        _ => panic!("expected a string"),
    }

    let mut out = Vec::new();
    encode(&mut out, &doc.arena, doc.root, &EncodeOptions::default()).unwrap();
    assert_eq!(out, bytes);
}

// ─── Generic objects ────────────────────────────────────────────────────────

#[test]
fn generic_object_with_ivars_round_trips() {
    // o :Point 2 :@x 1 :@y 2
    let mut bytes = vec![0x04, 0x08, b'o'];
    bytes.push(b':');
    bytes.push(0x05 + 5);
    bytes.extend_from_slice(b"Point");
    bytes.push(0x02 + 5); // 2 ivars
    bytes.push(b':');
    bytes.push(0x02 + 5);
    bytes.extend_from_slice(b"@x");
    bytes.push(b'i');
    bytes.push(0x01 + 5);
    bytes.push(b':');
    bytes.push(0x02 + 5);
    bytes.extend_from_slice(b"@y");
    bytes.push(b'i');
    bytes.push(0x02 + 5);

    let doc = decode(&bytes[..], &DecodeOptions::default()).unwrap();
    let id = doc.root.as_object().unwrap();
    match doc.arena.get_object(id).unwrap() {
        ObjectData::GenericObject(o) => {
            assert_eq!(doc.arena.get_symbol(o.class_name).unwrap(), b"Point");
            assert_eq!(o.ivars.len(), 2);
        }
        _ => panic!("expected a generic object"),
    }

    let mut out = Vec::new();
    encode(&mut out, &doc.arena, doc.root, &EncodeOptions::default()).unwrap();
    assert_eq!(out, bytes);
}

// ─── Malformed input ────────────────────────────────────────────────────────

#[test]
fn truncated_input_is_reported_not_panicked() {
    let bytes = [0x04, 0x08, b'i'];
    assert!(decode(&bytes[..], &DecodeOptions::default()).is_err());
}

#[test]
fn unknown_tag_is_reported() {
    let bytes = [0x04, 0x08, b'?'];
    let err = decode(&bytes[..], &DecodeOptions::default()).unwrap_err();
    assert!(matches!(err, rmarshal_core::MarshalError::UnsupportedTag { .. }));
}

#[test]
fn dangling_object_reference_is_reported() {
    let bytes = [0x04, 0x08, b'@', 0x00];
    assert!(decode(&bytes[..], &DecodeOptions::default()).is_err());
}
