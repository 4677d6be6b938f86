//! The value arena and its two reference tables (spec §4.3).
//!
//! Decoded values never hold pointers to one another directly. Instead a
//! [`Value`](crate::value::Value) is a small `Copy` handle — either an
//! inline ephemeral (`Bool`/`Null`/`Int`) or an index into one of the two
//! arrays owned by an [`Arena`]: `symbols` (indexed by [`SymbolId`]) and
//! `objects` (indexed by [`ObjectId`]). The arena is append-only during
//! decode and is the sole owner of every value's payload.

use std::cell::RefCell;

use crate::error::{MarshalError, RefKind, Result};
use crate::host::HostValue;
use crate::value::Value;

/// Index into [`Arena::symbols`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

/// Index into [`Arena::objects`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u32);

/// A decoded Ruby string: raw bytes plus whatever instance variables were
/// attached via an `I` wrapper (commonly just `E => true/false`).
#[derive(Debug, Clone)]
pub struct RString {
    pub bytes: Vec<u8>,
    pub ivars: Vec<(SymbolId, Value)>,
}

/// A decoded Ruby array.
#[derive(Debug, Clone, Default)]
pub struct RArray {
    pub items: Vec<Value>,
    pub ivars: Vec<(SymbolId, Value)>,
}

/// A decoded Ruby hash. Pairs are stored in emission order; duplicate keys
/// are not deduplicated (spec invariant 5/6 of §3).
#[derive(Debug, Clone, Default)]
pub struct RHash {
    pub pairs: Vec<(Value, Value)>,
    pub ivars: Vec<(SymbolId, Value)>,
}

/// A plain Ruby object (`o` tag): a class name plus its instance variables.
#[derive(Debug, Clone)]
pub struct GenericObject {
    pub class_name: SymbolId,
    pub ivars: Vec<(SymbolId, Value)>,
}

/// A class with a custom `_dump`/`_load` pair (`u` tag): an opaque payload.
#[derive(Debug, Clone)]
pub struct UserDefined {
    pub class_name: SymbolId,
    pub data: Vec<u8>,
    pub ivars: Vec<(SymbolId, Value)>,
}

/// A class with a custom `marshal_dump`/`marshal_load` pair (`U` tag): the
/// payload is itself a decoded value.
#[derive(Debug, Clone)]
pub struct UserMarshal {
    pub class_name: SymbolId,
    pub data: Value,
    pub ivars: Vec<(SymbolId, Value)>,
}

/// The payload of every non-ephemeral, non-symbol value.
#[derive(Debug, Clone)]
pub enum ObjectData {
    String(RString),
    Array(RArray),
    Hash(RHash),
    GenericObject(GenericObject),
    UserDefined(UserDefined),
    UserMarshal(UserMarshal),
}

impl ObjectData {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::String(_) => "String",
            Self::Array(_) => "Array",
            Self::Hash(_) => "Hash",
            Self::GenericObject(_) => "Object",
            Self::UserDefined(_) => "UserDefined",
            Self::UserMarshal(_) => "UserMarshal",
        }
    }

    fn ivars(&self) -> &[(SymbolId, Value)] {
        match self {
            Self::String(s) => &s.ivars,
            Self::Array(a) => &a.ivars,
            Self::Hash(h) => &h.ivars,
            Self::GenericObject(o) => &o.ivars,
            Self::UserDefined(u) => &u.ivars,
            Self::UserMarshal(u) => &u.ivars,
        }
    }
}

struct ObjectSlot {
    data: ObjectData,
    /// Cached host projection (spec §4.7: "projections are cached on the
    /// value so repeated projections ... return the same host object").
    projection: RefCell<Option<HostValue>>,
    /// Set while a projection of this object is in progress, so a cyclic
    /// reference back to it is reported rather than recursing forever.
    projecting: std::cell::Cell<bool>,
}

/// Owns every decoded symbol and object for the lifetime of a decode (or
/// lift) session.
#[derive(Default)]
pub struct Arena {
    symbols: Vec<Vec<u8>>,
    objects: Vec<ObjectSlot>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_symbol(&mut self, bytes: Vec<u8>) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(bytes);
        id
    }

    pub fn get_symbol(&self, id: SymbolId) -> Result<&[u8]> {
        self.symbols
            .get(id.0 as usize)
            .map(Vec::as_slice)
            .ok_or(MarshalError::BadRef { kind: RefKind::Symbol, index: id.0 as usize, len: self.symbols.len() })
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn symbol_id_for_index(&self, index: usize) -> Result<SymbolId> {
        if index < self.symbols.len() {
            Ok(SymbolId(index as u32))
        } else {
            Err(MarshalError::BadRef { kind: RefKind::Symbol, index, len: self.symbols.len() })
        }
    }

    pub fn register_object(&mut self, data: ObjectData) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(ObjectSlot {
            data,
            projection: RefCell::new(None),
            projecting: std::cell::Cell::new(false),
        });
        id
    }

    pub fn get_object(&self, id: ObjectId) -> Result<&ObjectData> {
        self.objects
            .get(id.0 as usize)
            .map(|s| &s.data)
            .ok_or(MarshalError::BadRef { kind: RefKind::Object, index: id.0 as usize, len: self.objects.len() })
    }

    pub fn get_object_mut(&mut self, id: ObjectId) -> Result<&mut ObjectData> {
        let len = self.objects.len();
        self.objects
            .get_mut(id.0 as usize)
            .map(|s| &mut s.data)
            .ok_or(MarshalError::BadRef { kind: RefKind::Object, index: id.0 as usize, len })
    }

    pub fn object_id_for_index(&self, index: usize) -> Result<ObjectId> {
        if index < self.objects.len() {
            Ok(ObjectId(index as u32))
        } else {
            Err(MarshalError::BadRef { kind: RefKind::Object, index, len: self.objects.len() })
        }
    }

    /// Applies an instance variable to a previously registered object.
    /// Tolerates the same key being set twice (spec §5: "later wins") by
    /// simply appending — the last entry for a given key is what a
    /// projector or re-encoder will apply last.
    pub fn set_ivar(&mut self, object: ObjectId, key: SymbolId, value: Value) -> Result<()> {
        if self.get_symbol(key)? == b"E" && !matches!(value, Value::Bool(_)) {
            return Err(MarshalError::EncodingUnsupported {
                reason: "the `E` instance variable must be a boolean".into(),
            });
        }
        let data = self.get_object_mut(object)?;
        match data {
            ObjectData::String(s) => s.ivars.push((key, value)),
            ObjectData::Array(a) => a.ivars.push((key, value)),
            ObjectData::Hash(h) => h.ivars.push((key, value)),
            ObjectData::GenericObject(o) => o.ivars.push((key, value)),
            ObjectData::UserDefined(u) => u.ivars.push((key, value)),
            ObjectData::UserMarshal(u) => u.ivars.push((key, value)),
        }
        Ok(())
    }

    /// Returns `true` if the string carries `:E => true` among its ivars.
    /// `:E` set more than once (tolerated by [`Self::set_ivar`], "later
    /// wins") resolves to its *last* occurrence, so this scans in reverse.
    pub fn string_is_utf8(&self, s: &RString) -> bool {
        for (k, v) in s.ivars.iter().rev() {
            if self.get_symbol(*k).map(|b| b == b"E").unwrap_or(false) {
                if let Value::Bool(b) = v {
                    return *b;
                }
            }
        }
        false
    }

    /// The cached host projection for `object`, if one has been computed.
    pub fn cached_projection(&self, object: ObjectId) -> Result<Option<HostValue>> {
        let slot = self
            .objects
            .get(object.0 as usize)
            .ok_or(MarshalError::BadRef { kind: RefKind::Object, index: object.0 as usize, len: self.objects.len() })?;
        Ok(slot.projection.borrow().clone())
    }

    /// Stores `value` as the cached projection for `object`.
    pub fn cache_projection(&self, object: ObjectId, value: HostValue) -> Result<()> {
        let slot = self
            .objects
            .get(object.0 as usize)
            .ok_or(MarshalError::BadRef { kind: RefKind::Object, index: object.0 as usize, len: self.objects.len() })?;
        *slot.projection.borrow_mut() = Some(value);
        Ok(())
    }

    pub fn object_ivars(&self, object: ObjectId) -> Result<&[(SymbolId, Value)]> {
        Ok(self.get_object(object)?.ivars())
    }

    /// Marks `object` as having a projection in progress. Returns `true` if
    /// it was already marked, meaning the caller has found a cycle.
    pub fn begin_projecting(&self, object: ObjectId) -> Result<bool> {
        let slot = self
            .objects
            .get(object.0 as usize)
            .ok_or(MarshalError::BadRef { kind: RefKind::Object, index: object.0 as usize, len: self.objects.len() })?;
        Ok(slot.projecting.replace(true))
    }

    pub fn end_projecting(&self, object: ObjectId) {
        if let Some(slot) = self.objects.get(object.0 as usize) {
            slot.projecting.set(false);
        }
    }
}
