//! Projects decoded values onto host types supplied by the caller (spec
//! §4.7, §6.3).

use crate::arena::{Arena, ObjectData, ObjectId};
use crate::error::{MarshalError, Result};
use crate::host::{HostObject, HostValue, ProjectionFactory};
use crate::value::Value;

/// Projects `value` onto a [`HostValue`], consulting `factory` for every
/// `GenericObject`/`UserDefined`/`UserMarshal` it encounters. Projections of
/// a given object are cached on the arena, so projecting the same object
/// twice (directly, or by way of two different parents) returns the same
/// `HostValue::Object` handle both times.
pub fn project(arena: &Arena, value: Value, factory: &dyn ProjectionFactory) -> Result<HostValue> {
    match value {
        Value::Bool(b) => Ok(HostValue::Bool(b)),
        Value::Null => Ok(HostValue::Null),
        Value::Int(n) => Ok(HostValue::Int(n)),
        Value::Symbol(id) => {
            let bytes = arena.get_symbol(id)?;
            Ok(HostValue::Symbol(String::from_utf8_lossy(bytes).into_owned()))
        }
        Value::Object(id) => project_object(arena, id, factory),
    }
}

fn project_object(arena: &Arena, id: ObjectId, factory: &dyn ProjectionFactory) -> Result<HostValue> {
    if let Some(cached) = arena.cached_projection(id)? {
        return Ok(cached);
    }
    if arena.begin_projecting(id)? {
        return Err(MarshalError::ProjectionFailed {
            class_name: arena.get_object(id)?.kind_name().to_string(),
            reason: "cyclic reference: this value projects through itself".into(),
        });
    }
    let result = project_object_uncached(arena, id, factory);
    arena.end_projecting(id);
    let projected = result?;
    arena.cache_projection(id, projected.clone())?;
    Ok(projected)
}

fn project_object_uncached(arena: &Arena, id: ObjectId, factory: &dyn ProjectionFactory) -> Result<HostValue> {
    let projected = match arena.get_object(id)? {
        ObjectData::String(s) => HostValue::String(s.bytes.clone(), arena.string_is_utf8(s)),
        ObjectData::Array(a) => {
            let mut items = Vec::with_capacity(a.items.len());
            for item in &a.items {
                items.push(project(arena, *item, factory)?);
            }
            HostValue::Array(items)
        }
        ObjectData::Hash(h) => {
            let mut pairs = Vec::with_capacity(h.pairs.len());
            for (k, v) in &h.pairs {
                pairs.push((project(arena, *k, factory)?, project(arena, *v, factory)?));
            }
            HostValue::Hash(pairs)
        }
        ObjectData::GenericObject(o) => {
            let class_name = String::from_utf8_lossy(arena.get_symbol(o.class_name)?).into_owned();
            let handle = factory
                .instantiate(&class_name, None)
                .ok_or_else(|| MarshalError::UnknownClass { class_name: class_name.clone() })?;
            // Clone ivars before recursing: `project` may re-enter this
            // object through a cycle and would otherwise see a half-populated
            // cache entry.
            let ivars = o.ivars.clone();
            apply_ivars(arena, &handle, &ivars, &class_name, factory)?;
            HostValue::Object(handle)
        }
        ObjectData::UserDefined(u) => {
            let class_name = String::from_utf8_lossy(arena.get_symbol(u.class_name)?).into_owned();
            let handle = factory
                .instantiate(&class_name, None)
                .ok_or_else(|| MarshalError::UnknownClass { class_name: class_name.clone() })?;
            handle.borrow_mut().load(&u.data).map_err(|e| attach_class(e, &class_name))?;
            apply_ivars(arena, &handle, &u.ivars, &class_name, factory)?;
            HostValue::Object(handle)
        }
        ObjectData::UserMarshal(u) => {
            let class_name = String::from_utf8_lossy(arena.get_symbol(u.class_name)?).into_owned();
            let inner = u.data;
            let projected_inner = project(arena, inner, factory)?;
            let handle = factory
                .instantiate(&class_name, Some(&projected_inner))
                .ok_or_else(|| MarshalError::UnknownClass { class_name: class_name.clone() })?;
            handle
                .borrow_mut()
                .marshal_load(projected_inner)
                .map_err(|e| attach_class(e, &class_name))?;
            let ivars = u.ivars.clone();
            apply_ivars(arena, &handle, &ivars, &class_name, factory)?;
            HostValue::Object(handle)
        }
    };
    Ok(projected)
}

fn apply_ivars(
    arena: &Arena,
    handle: &std::rc::Rc<std::cell::RefCell<dyn HostObject>>,
    ivars: &[(crate::arena::SymbolId, Value)],
    class_name: &str,
    factory: &dyn ProjectionFactory,
) -> Result<()> {
    for (key, val) in ivars {
        let raw_name = String::from_utf8_lossy(arena.get_symbol(*key)?).into_owned();
        let name = raw_name.strip_prefix('@').unwrap_or(&raw_name).to_string();
        let projected_val = project(arena, *val, factory)?;
        handle
            .borrow_mut()
            .set_attr(&name, projected_val)
            .map_err(|e| attach_class(e, class_name))?;
    }
    Ok(())
}

fn attach_class(err: MarshalError, class_name: &str) -> MarshalError {
    match err {
        MarshalError::ProjectionFailed { reason, .. } => {
            MarshalError::ProjectionFailed { class_name: class_name.to_string(), reason }
        }
        other => other,
    }
}
