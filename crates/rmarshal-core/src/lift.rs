//! Lifts host values back into the decoded [`Value`] graph (spec §4.4's
//! `lift(host_value, factory) -> Value`), the inverse of
//! [`crate::project::project`]. This is what [`crate::encode`]'s top-level
//! `encode` entry point runs before writing the wire format.
//!
//! Repeated bytes-identical symbols are coalesced through the string-dedup
//! index (spec §4.8) so the encoder's own back-reference logic sees one
//! arena symbol per distinct name rather than one per occurrence. Repeated
//! [`HostValue::Object`] handles (the same `Rc`, e.g. two array slots
//! pointing at one struct) are coalesced by pointer identity so they lift
//! to one arena object and round-trip through the encoder's `@`
//! back-reference machinery exactly as a real shared Ruby object would.

use std::collections::HashMap;
use std::rc::Rc;

use crate::arena::{Arena, GenericObject, ObjectData, ObjectId, RArray, RHash, RString, SymbolId, UserDefined, UserMarshal};
use crate::dedup::StringDedup;
use crate::error::Result;
use crate::host::{HostObject, HostValue};
use crate::value::Value;

/// Lifts `value` into a fresh entry (or subtree) in `arena`, returning the
/// root [`Value`] handle [`crate::encode::encode`] should be given.
pub fn lift(arena: &mut Arena, value: &HostValue) -> Result<Value> {
    let mut ctx = LiftContext { arena, dedup: StringDedup::new(), symbol_of_dedup_id: Vec::new(), seen_objects: HashMap::new() };
    ctx.lift_value(value)
}

struct LiftContext<'a> {
    arena: &'a mut Arena,
    dedup: StringDedup,
    /// Parallel to the ids [`StringDedup::intern`] hands out: the arena
    /// symbol already created for that distinct byte string, if any.
    symbol_of_dedup_id: Vec<Option<SymbolId>>,
    /// Keyed by `Rc::as_ptr` cast to a thin pointer, so two `HostValue`s
    /// wrapping the same underlying object resolve to the same arena slot.
    seen_objects: HashMap<*const (), ObjectId>,
}

impl<'a> LiftContext<'a> {
    fn intern_symbol(&mut self, bytes: &[u8]) -> SymbolId {
        let dedup_id = self.dedup.intern(bytes) as usize;
        if self.symbol_of_dedup_id.len() <= dedup_id {
            self.symbol_of_dedup_id.resize(dedup_id + 1, None);
        }
        if let Some(id) = self.symbol_of_dedup_id[dedup_id] {
            return id;
        }
        let id = self.arena.register_symbol(bytes.to_vec());
        self.symbol_of_dedup_id[dedup_id] = Some(id);
        id
    }

    fn lift_value(&mut self, value: &HostValue) -> Result<Value> {
        match value {
            HostValue::Bool(b) => Ok(Value::Bool(*b)),
            HostValue::Null => Ok(Value::Null),
            HostValue::Int(n) => Ok(Value::Int(*n)),
            HostValue::Symbol(s) => Ok(Value::Symbol(self.intern_symbol(s.as_bytes()))),
            HostValue::String(bytes, utf8) => {
                let mut ivars = Vec::new();
                if *utf8 {
                    let e = self.intern_symbol(b"E");
                    ivars.push((e, Value::Bool(true)));
                }
                let id = self.arena.register_object(ObjectData::String(RString { bytes: bytes.clone(), ivars }));
                Ok(Value::Object(id))
            }
            HostValue::Array(items) => {
                let id = self.arena.register_object(ObjectData::Array(RArray::default()));
                for item in items {
                    let lifted = self.lift_value(item)?;
                    match self.arena.get_object_mut(id)? {
                        ObjectData::Array(a) => a.items.push(lifted),
                        _ => unreachable!(),
                    }
                }
                Ok(Value::Object(id))
            }
            HostValue::Hash(pairs) => {
                let id = self.arena.register_object(ObjectData::Hash(RHash::default()));
                for (k, v) in pairs {
                    let lk = self.lift_value(k)?;
                    let lv = self.lift_value(v)?;
                    match self.arena.get_object_mut(id)? {
                        ObjectData::Hash(h) => h.pairs.push((lk, lv)),
                        _ => unreachable!(),
                    }
                }
                Ok(Value::Object(id))
            }
            HostValue::Object(handle) => self.lift_object(handle),
        }
    }

    fn lift_object(&mut self, handle: &Rc<std::cell::RefCell<dyn HostObject>>) -> Result<Value> {
        let key = Rc::as_ptr(handle) as *const ();
        if let Some(&id) = self.seen_objects.get(&key) {
            return Ok(Value::Object(id));
        }

        let (class_name, dump, marshal_dump, attrs) = {
            let obj = handle.borrow();
            (obj.class_name(), obj.lift_dump(), obj.lift_marshal_dump(), obj.lift_attrs())
        };
        let class_sym = self.intern_symbol(class_name.as_bytes());

        if let Some(bytes) = dump {
            let id = self.arena.register_object(ObjectData::UserDefined(UserDefined {
                class_name: class_sym,
                data: bytes,
                ivars: Vec::new(),
            }));
            self.seen_objects.insert(key, id);
            self.lift_ivars_onto(id, &attrs)?;
            return Ok(Value::Object(id));
        }

        if let Some(inner) = marshal_dump {
            let id = self.arena.register_object(ObjectData::UserMarshal(UserMarshal {
                class_name: class_sym,
                data: Value::Null,
                ivars: Vec::new(),
            }));
            self.seen_objects.insert(key, id);
            let lifted_inner = self.lift_value(&inner)?;
            match self.arena.get_object_mut(id)? {
                ObjectData::UserMarshal(u) => u.data = lifted_inner,
                _ => unreachable!(),
            }
            self.lift_ivars_onto(id, &attrs)?;
            return Ok(Value::Object(id));
        }

        let id = self.arena.register_object(ObjectData::GenericObject(GenericObject {
            class_name: class_sym,
            ivars: Vec::new(),
        }));
        self.seen_objects.insert(key, id);
        self.lift_ivars_onto(id, &attrs)?;
        Ok(Value::Object(id))
    }

    fn lift_ivars_onto(&mut self, id: ObjectId, attrs: &[(String, HostValue)]) -> Result<()> {
        for (name, value) in attrs {
            let key_name = if name.starts_with('@') { name.clone() } else { format!("@{name}") };
            let key_sym = self.intern_symbol(key_name.as_bytes());
            let lifted = self.lift_value(value)?;
            self.arena.set_ivar(id, key_sym, lifted)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::encode::encode;
    use crate::host::ProjectionFactory;
    use crate::options::DecodeOptions;
    use crate::project::project;
    use std::cell::RefCell;

    #[test]
    fn lifts_scalars_and_collections() {
        let mut arena = Arena::new();
        let v = lift(
            &mut arena,
            &HostValue::Array(vec![HostValue::Int(1), HostValue::Bool(true), HostValue::Null]),
        )
        .unwrap();
        match v {
            Value::Object(id) => match arena.get_object(id).unwrap() {
                ObjectData::Array(a) => assert_eq!(a.items.len(), 3),
                _ => panic!("expected an array"),
            },
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn repeated_symbol_bytes_share_one_arena_slot() {
        let mut arena = Arena::new();
        let v = lift(
            &mut arena,
            &HostValue::Array(vec![HostValue::Symbol("ok".into()), HostValue::Symbol("ok".into())]),
        )
        .unwrap();
        let id = v.as_object().unwrap();
        match arena.get_object(id).unwrap() {
            ObjectData::Array(a) => {
                assert_eq!(a.items[0].as_symbol(), a.items[1].as_symbol());
            }
            _ => panic!("expected an array"),
        }
    }

    #[derive(Debug, Default)]
    struct Point {
        x: i64,
        y: i64,
    }

    impl HostObject for Point {
        fn set_attr(&mut self, name: &str, value: HostValue) -> Result<()> {
            let n = match value {
                HostValue::Int(n) => n,
                _ => return Ok(()),
            };
            match name {
                "x" => self.x = n,
                "y" => self.y = n,
                _ => {}
            }
            Ok(())
        }

        fn describe(&self) -> String {
            "Point".into()
        }

        fn lift_attrs(&self) -> Vec<(String, HostValue)> {
            vec![("x".into(), HostValue::Int(self.x)), ("y".into(), HostValue::Int(self.y))]
        }
    }

    struct PointFactory;
    impl ProjectionFactory for PointFactory {
        fn instantiate(&self, class_name: &str, _arg: Option<&HostValue>) -> Option<Rc<RefCell<dyn HostObject>>> {
            if class_name == "Point" {
                Some(Rc::new(RefCell::new(Point::default())))
            } else {
                None
            }
        }
    }

    #[test]
    fn decode_project_lift_encode_round_trips_a_generic_object() {
        // o :Point 2 :@x 1 :@y 2
        let mut bytes = vec![0x04, 0x08, b'o'];
        bytes.push(b':');
        bytes.push(0x05 + 5);
        bytes.extend_from_slice(b"Point");
        bytes.push(0x02 + 5);
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
        let projected = project(&doc.arena, doc.root, &PointFactory).unwrap();

        let mut arena2 = Arena::new();
        let lifted = lift(&mut arena2, &projected).unwrap();
        let mut out = Vec::new();
        encode(&mut out, &arena2, lifted, &crate::options::EncodeOptions::default()).unwrap();
        assert_eq!(out, bytes);
    }
}
