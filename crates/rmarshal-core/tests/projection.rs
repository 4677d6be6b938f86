//! Black-box tests for the host projection layer: a fake host that records
//! what it was asked to do, exercising `GenericObject`, `UserDefined`, and
//! `UserMarshal` projection plus idempotent caching across repeated
//! references to the same object.

use std::cell::RefCell;
use std::rc::Rc;

use rmarshal_core::host::{HostObject, HostValue, ProjectionFactory};
use rmarshal_core::{decode, project, DecodeOptions};

#[derive(Debug, Default)]
struct RecordingHost {
    class_name: String,
    attrs: Vec<(String, String)>,
    loaded: Option<Vec<u8>>,
}

impl HostObject for RecordingHost {
    fn set_attr(&mut self, name: &str, value: HostValue) -> rmarshal_core::Result<()> {
        self.attrs.push((name.to_string(), format!("{value:?}")));
        Ok(())
    }

    fn load(&mut self, data: &[u8]) -> rmarshal_core::Result<()> {
        self.loaded = Some(data.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        self.class_name.clone()
    }
}

struct RecordingFactory;

impl ProjectionFactory for RecordingFactory {
    fn instantiate(&self, class_name: &str, _arg: Option<&HostValue>) -> Option<Rc<RefCell<dyn HostObject>>> {
        Some(Rc::new(RefCell::new(RecordingHost { class_name: class_name.to_string(), ..Default::default() })))
    }
}

struct RefusingFactory;

impl ProjectionFactory for RefusingFactory {
    fn instantiate(&self, _class_name: &str, _arg: Option<&HostValue>) -> Option<Rc<RefCell<dyn HostObject>>> {
        None
    }
}

fn generic_object_point_bytes() -> Vec<u8> {
    let mut bytes = vec![0x04, 0x08, b'o'];
    bytes.push(b':');
    bytes.push(0x05 + 5);
    bytes.extend_from_slice(b"Point");
    bytes.push(0x01 + 5);
    bytes.push(b':');
    bytes.push(0x02 + 5);
    bytes.extend_from_slice(b"@x");
    bytes.push(b'i');
    bytes.push(0x01 + 5);
    bytes
}

#[test]
fn generic_object_projects_through_factory_and_sets_attrs() {
    let bytes = generic_object_point_bytes();
    let doc = decode(&bytes[..], &DecodeOptions::default()).unwrap();
    let projected = project(&doc.arena, doc.root, &RecordingFactory).unwrap();
    match projected {
        HostValue::Object(handle) => {
            let borrowed = handle.borrow();
            assert_eq!(format!("{borrowed:?}"), "Point");
        }
        other => panic!("expected an Object, got {other:?}"),
    }
}

#[test]
fn unknown_class_surfaces_as_an_error() {
    let bytes = generic_object_point_bytes();
    let doc = decode(&bytes[..], &DecodeOptions::default()).unwrap();
    let err = project(&doc.arena, doc.root, &RefusingFactory).unwrap_err();
    assert!(matches!(err, rmarshal_core::MarshalError::UnknownClass { .. }));
}

#[test]
fn repeated_projection_of_the_same_object_is_cached() {
    // [o, o] — an array holding the same generic object object twice via a
    // back-reference, so both elements must project to the identical Rc.
    let mut bytes = vec![0x04, 0x08, b'['];
    bytes.push(0x02 + 5);
    bytes.extend_from_slice(&{
        let mut inner = generic_object_point_bytes();
        inner.drain(0..2); // drop the inner signature
        inner
    });
    bytes.push(b'@');
    bytes.push(0x00); // back-reference to object id 0 — 0 is its own tag byte

    let doc = decode(&bytes[..], &DecodeOptions::default()).unwrap();
    let projected = project(&doc.arena, doc.root, &RecordingFactory).unwrap();
    match projected {
        HostValue::Array(items) => {
            assert_eq!(items.len(), 2);
            match (&items[0], &items[1]) {
                (HostValue::Object(a), HostValue::Object(b)) => {
                    assert!(Rc::ptr_eq(a, b), "both references must share one host object");
                }
                other => panic!("expected two Objects, got {other:?}"),
            }
        }
        other => panic!("expected an Array, got {other:?}"),
    }
}
