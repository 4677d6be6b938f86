//! The host projection layer (spec §4.7, §6.3).
//!
//! Decoded values are Ruby-shaped and arena-local; a caller that wants its
//! own native types back calls [`crate::project::project`] with a
//! [`ProjectionFactory`] that knows how to build one. This mirrors the way
//! [`crate::decode`] itself is parameterized over a sink rather than
//! hard-coding one host language's object model.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::Result;

/// A host-side value produced by projection. `Object` wraps a caller type
/// behind [`HostObject`] so host languages can model reference semantics
/// (two marshal-ids projecting to the same arena slot share one `Rc`).
#[derive(Clone)]
pub enum HostValue {
    Bool(bool),
    Null,
    Int(i64),
    Symbol(String),
    String(Vec<u8>, bool),
    Array(Vec<HostValue>),
    Hash(Vec<(HostValue, HostValue)>),
    Object(Rc<RefCell<dyn HostObject>>),
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Null => write!(f, "Null"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Symbol(s) => write!(f, "Symbol({s:?})"),
            Self::String(b, utf8) => write!(f, "String({:?}, utf8={utf8})", String::from_utf8_lossy(b)),
            Self::Array(items) => f.debug_list().entries(items).finish(),
            Self::Hash(pairs) => f.debug_map().entries(pairs.iter().map(|(k, v)| (k, v))).finish(),
            Self::Object(o) => write!(f, "Object({})", o.borrow().describe()),
        }
    }
}

/// Implemented by a caller's native types to accept projected Marshal data.
///
/// The three methods mirror the three ways Ruby populates a freshly
/// allocated object: reading plain instance variables (`o` tag), handing it
/// a `_dump` payload (`u` tag), or handing it a `marshal_load` argument
/// (`U` tag). A type only needs to implement the method(s) its class
/// actually uses on the Ruby side; the defaults report a projection failure.
///
/// The `lift_*` methods are the inverse: [`crate::lift::lift`] calls them to
/// turn a host object back into a decoded [`crate::value::Value`] for
/// [`crate::encode::encode`]. A type need only override the lift accessor(s)
/// matching whichever `load`/`marshal_load`/`set_attr` contract it actually
/// implements; the defaults produce a bare `GenericObject` with no ivars.
pub trait HostObject: fmt::Debug {
    fn set_attr(&mut self, _name: &str, _value: HostValue) -> Result<()> {
        Err(crate::error::MarshalError::ProjectionFailed {
            class_name: self.describe(),
            reason: "this type does not accept instance variables".into(),
        })
    }

    fn load(&mut self, _data: &[u8]) -> Result<()> {
        Err(crate::error::MarshalError::ProjectionFailed {
            class_name: self.describe(),
            reason: "this type does not implement _load".into(),
        })
    }

    fn marshal_load(&mut self, _data: HostValue) -> Result<()> {
        Err(crate::error::MarshalError::ProjectionFailed {
            class_name: self.describe(),
            reason: "this type does not implement marshal_load".into(),
        })
    }

    /// Short label used in diagnostics; defaults to the Rust type name.
    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    /// The Ruby class name to lift this object back under. Defaults to
    /// [`HostObject::describe`].
    fn class_name(&self) -> String {
        self.describe()
    }

    /// Instance variables to lift back onto the wire, keyed by attribute
    /// name without the `@` sigil (`lift` re-adds it). Used for objects
    /// that were populated through `set_attr`.
    fn lift_attrs(&self) -> Vec<(String, HostValue)> {
        Vec::new()
    }

    /// The `_dump` payload to lift back as a `u`-tagged [`UserDefined`
    /// value](crate::arena::UserDefined). `None` means this object should
    /// not be lifted as a `UserDefined`.
    fn lift_dump(&self) -> Option<Vec<u8>> {
        None
    }

    /// The `marshal_dump` payload to lift back as a `U`-tagged
    /// [`UserMarshal` value](crate::arena::UserMarshal). `None` means this
    /// object should not be lifted as a `UserMarshal`.
    fn lift_marshal_dump(&self) -> Option<HostValue> {
        None
    }
}

/// Caller-supplied factory that turns a Ruby class name into a fresh host
/// object. Returning `None` for an unrecognized class is how a caller opts
/// out of projecting a particular type; [`crate::project::project`] then
/// reports [`crate::error::MarshalError::UnknownClass`].
pub trait ProjectionFactory {
    /// `arg` is supplied only when projecting a `U`-tagged value, before its
    /// payload has been decoded and handed to [`HostObject::marshal_load`] —
    /// some host runtimes need the class available as context while the
    /// payload value is itself being projected.
    fn instantiate(&self, class_name: &str, arg: Option<&HostValue>) -> Option<Rc<RefCell<dyn HostObject>>>;
}
