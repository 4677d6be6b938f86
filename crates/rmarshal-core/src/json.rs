//! A self-contained JSON projection of a decoded value tree, for the CLI's
//! `--json` mode (spec §0: Serialization). Unlike [`crate::trace::describe`]
//! this isn't meant for a human to read a Ruby-`inspect`-flavored summary of
//! a value, it's meant for a downstream tool to consume machine-readably —
//! so symbols and back-references are spelled out as tagged objects rather
//! than folded into a single string.
//!
//! Gated behind the `serde` feature since [`Value`] and [`Arena`] are
//! arena-relative and have no meaningful `Serialize` impl of their own; this
//! module walks them the way [`crate::trace`] does and builds an
//! already-resolved [`serde_json::Value`] tree instead.

use serde_json::{json, Value as Json};

use crate::arena::{Arena, ObjectData};
use crate::error::{MarshalError, Result};
use crate::value::Value;

/// Renders `value` (and everything it transitively references through
/// `arena`) as a [`serde_json::Value`] tree suitable for `--json` output.
pub fn to_json(arena: &Arena, value: Value) -> Json {
    match value {
        Value::Bool(b) => Json::Bool(b),
        Value::Null => Json::Null,
        Value::Int(n) => Json::Number(n.into()),
        Value::Symbol(id) => match arena.get_symbol(id) {
            Ok(bytes) => json!({ "type": "symbol", "name": String::from_utf8_lossy(bytes) }),
            Err(_) => json!({ "type": "symbol", "name": null }),
        },
        Value::Object(id) => object_to_json(arena, id),
    }
}

fn object_to_json(arena: &Arena, id: crate::arena::ObjectId) -> Json {
    let data = match arena.get_object(id) {
        Ok(d) => d,
        Err(_) => return json!({ "type": "error", "message": "dangling object reference" }),
    };
    match data {
        ObjectData::String(s) => {
            if arena.string_is_utf8(s) {
                json!({ "type": "string", "utf8": true, "value": String::from_utf8_lossy(&s.bytes) })
            } else {
                json!({ "type": "string", "utf8": false, "bytes": s.bytes })
            }
        }
        ObjectData::Array(a) => {
            json!({ "type": "array", "items": a.items.iter().map(|v| to_json(arena, *v)).collect::<Vec<_>>() })
        }
        ObjectData::Hash(h) => {
            let pairs: Vec<Json> = h
                .pairs
                .iter()
                .map(|(k, v)| json!({ "key": to_json(arena, *k), "value": to_json(arena, *v) }))
                .collect();
            json!({ "type": "hash", "pairs": pairs })
        }
        ObjectData::GenericObject(o) => {
            json!({
                "type": "object",
                "class": class_name_json(arena, o.class_name),
                "ivars": ivars_json(arena, &o.ivars),
            })
        }
        ObjectData::UserDefined(u) => {
            json!({
                "type": "user_defined",
                "class": class_name_json(arena, u.class_name),
                "dump": u.data,
                "ivars": ivars_json(arena, &u.ivars),
            })
        }
        ObjectData::UserMarshal(u) => {
            json!({
                "type": "user_marshal",
                "class": class_name_json(arena, u.class_name),
                "dump": to_json(arena, u.data),
                "ivars": ivars_json(arena, &u.ivars),
            })
        }
    }
}

fn class_name_json(arena: &Arena, class_name: crate::arena::SymbolId) -> Json {
    match arena.get_symbol(class_name) {
        Ok(bytes) => Json::String(String::from_utf8_lossy(bytes).into_owned()),
        Err(_) => Json::Null,
    }
}

/// The inverse of [`to_json`]: builds a fresh [`Value`]/[`Arena`] subtree
/// from the same tagged-object shape `to_json` produces, for the CLI's
/// `encode` subcommand. Rejects anything that isn't shaped like one of
/// `to_json`'s own outputs rather than guessing at a looser JSON encoding.
pub fn from_json(arena: &mut Arena, json: &Json) -> Result<Value> {
    match json {
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Null => Ok(Value::Null),
        Json::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .ok_or_else(|| MarshalError::Other(format!("integer out of range: {n}"))),
        Json::Object(map) => from_json_object(arena, map),
        other => Err(MarshalError::Other(format!("unexpected top-level JSON value: {other}"))),
    }
}

fn from_json_object(arena: &mut Arena, map: &serde_json::Map<String, Json>) -> Result<Value> {
    let kind = map
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| MarshalError::Other("object is missing a \"type\" field".into()))?;
    match kind {
        "symbol" => {
            let name = field_str(map, "name")?;
            Ok(Value::Symbol(arena.register_symbol(name.as_bytes().to_vec())))
        }
        "string" => {
            let utf8 = map.get("utf8").and_then(Json::as_bool).unwrap_or(false);
            let bytes = if utf8 {
                field_str(map, "value")?.into_bytes()
            } else {
                field_byte_array(map, "bytes")?
            };
            let mut ivars = Vec::new();
            if utf8 {
                let e = arena.register_symbol(b"E".to_vec());
                ivars.push((e, Value::Bool(true)));
            }
            let id = arena.register_object(ObjectData::String(crate::arena::RString { bytes, ivars }));
            Ok(Value::Object(id))
        }
        "array" => {
            let items = map
                .get("items")
                .and_then(Json::as_array)
                .ok_or_else(|| MarshalError::Other("array object is missing \"items\"".into()))?;
            let id = arena.register_object(ObjectData::Array(crate::arena::RArray::default()));
            for item in items {
                let v = from_json(arena, item)?;
                match arena.get_object_mut(id)? {
                    ObjectData::Array(a) => a.items.push(v),
                    _ => unreachable!(),
                }
            }
            Ok(Value::Object(id))
        }
        "hash" => {
            let pairs = map
                .get("pairs")
                .and_then(Json::as_array)
                .ok_or_else(|| MarshalError::Other("hash object is missing \"pairs\"".into()))?;
            let id = arena.register_object(ObjectData::Hash(crate::arena::RHash::default()));
            for pair in pairs {
                let key = pair.get("key").ok_or_else(|| MarshalError::Other("hash pair missing \"key\"".into()))?;
                let val = pair.get("value").ok_or_else(|| MarshalError::Other("hash pair missing \"value\"".into()))?;
                let k = from_json(arena, key)?;
                let v = from_json(arena, val)?;
                match arena.get_object_mut(id)? {
                    ObjectData::Hash(h) => h.pairs.push((k, v)),
                    _ => unreachable!(),
                }
            }
            Ok(Value::Object(id))
        }
        "object" => {
            let class_name = field_str(map, "class")?;
            let class_sym = arena.register_symbol(class_name.into_bytes());
            let id = arena.register_object(ObjectData::GenericObject(crate::arena::GenericObject {
                class_name: class_sym,
                ivars: Vec::new(),
            }));
            if let Some(Json::Object(ivars)) = map.get("ivars") {
                set_ivars_from_json(arena, id, ivars)?;
            }
            Ok(Value::Object(id))
        }
        "user_defined" => {
            let class_name = field_str(map, "class")?;
            let class_sym = arena.register_symbol(class_name.into_bytes());
            let data = field_byte_array(map, "dump")?;
            let id = arena.register_object(ObjectData::UserDefined(crate::arena::UserDefined {
                class_name: class_sym,
                data,
                ivars: Vec::new(),
            }));
            if let Some(Json::Object(ivars)) = map.get("ivars") {
                set_ivars_from_json(arena, id, ivars)?;
            }
            Ok(Value::Object(id))
        }
        "user_marshal" => {
            let class_name = field_str(map, "class")?;
            let class_sym = arena.register_symbol(class_name.into_bytes());
            let id = arena.register_object(ObjectData::UserMarshal(crate::arena::UserMarshal {
                class_name: class_sym,
                data: Value::Null,
                ivars: Vec::new(),
            }));
            let dump = map.get("dump").ok_or_else(|| MarshalError::Other("user_marshal object is missing \"dump\"".into()))?;
            let lifted = from_json(arena, dump)?;
            match arena.get_object_mut(id)? {
                ObjectData::UserMarshal(u) => u.data = lifted,
                _ => unreachable!(),
            }
            if let Some(Json::Object(ivars)) = map.get("ivars") {
                set_ivars_from_json(arena, id, ivars)?;
            }
            Ok(Value::Object(id))
        }
        other => Err(MarshalError::Other(format!("unsupported JSON object type: {other}"))),
    }
}

fn set_ivars_from_json(arena: &mut Arena, id: crate::arena::ObjectId, ivars: &serde_json::Map<String, Json>) -> Result<()> {
    for (name, value) in ivars {
        let key = arena.register_symbol(name.as_bytes().to_vec());
        let v = from_json(arena, value)?;
        arena.set_ivar(id, key, v)?;
    }
    Ok(())
}

fn field_str<'a>(map: &'a serde_json::Map<String, Json>, field: &str) -> Result<&'a str> {
    map.get(field)
        .and_then(Json::as_str)
        .ok_or_else(|| MarshalError::Other(format!("missing or non-string \"{field}\" field")))
}

fn field_byte_array(map: &serde_json::Map<String, Json>, field: &str) -> Result<Vec<u8>> {
    map.get(field)
        .and_then(Json::as_array)
        .ok_or_else(|| MarshalError::Other(format!("missing or non-array \"{field}\" field")))?
        .iter()
        .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| MarshalError::Other(format!("\"{field}\" must be an array of byte values")))
}

fn ivars_json(arena: &Arena, ivars: &[(crate::arena::SymbolId, Value)]) -> Json {
    let mut map = serde_json::Map::new();
    for (key, val) in ivars {
        let name = match arena.get_symbol(*key) {
            Ok(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Err(_) => continue,
        };
        map.insert(name, to_json(arena, *val));
    }
    Json::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{ObjectData, RString};

    #[test]
    fn renders_scalars() {
        let arena = Arena::new();
        assert_eq!(to_json(&arena, Value::Bool(true)), json!(true));
        assert_eq!(to_json(&arena, Value::Null), json!(null));
        assert_eq!(to_json(&arena, Value::Int(5)), json!(5));
    }

    #[test]
    fn round_trips_an_array_through_json() {
        let mut arena = Arena::new();
        let id = arena.register_object(ObjectData::Array(crate::arena::RArray {
            items: vec![Value::Int(1), Value::Bool(true), Value::Null],
            ivars: vec![],
        }));
        let rendered = to_json(&arena, Value::Object(id));

        let mut arena2 = Arena::new();
        let rebuilt = from_json(&mut arena2, &rendered).unwrap();
        let rebuilt_json = to_json(&arena2, rebuilt);
        assert_eq!(rendered, rebuilt_json);
    }

    #[test]
    fn renders_a_utf8_string() {
        let mut arena = Arena::new();
        let e = arena.register_symbol(b"E".to_vec());
        let id = arena.register_object(ObjectData::String(RString {
            bytes: b"hi".to_vec(),
            ivars: vec![(e, Value::Bool(true))],
        }));
        let rendered = to_json(&arena, Value::Object(id));
        assert_eq!(rendered["type"], json!("string"));
        assert_eq!(rendered["utf8"], json!(true));
        assert_eq!(rendered["value"], json!("hi"));
    }
}
