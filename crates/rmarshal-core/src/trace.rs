//! Bounded, depth-aware rendering of decoded values for diagnostics (spec
//! §4.11). Used by `Document`'s `Display` impl and by the CLI's
//! non-JSON output mode.

use std::fmt::Write as _;

use crate::arena::{Arena, ObjectData};
use crate::value::Value;

/// Caps how many bytes [`describe`] will emit before truncating with `...`,
/// so a pathological or adversarial document can't blow up a log line.
const MAX_REPR_LEN: usize = 4096;

/// A scratch buffer that stops growing past [`MAX_REPR_LEN`] and marks the
/// cut with a trailing ellipsis instead of silently dropping the tail.
struct ReprBuf {
    out: String,
    truncated: bool,
}

impl ReprBuf {
    fn new() -> Self {
        Self { out: String::new(), truncated: false }
    }

    fn reserve_tail(&mut self, extra: usize) -> bool {
        if self.truncated {
            return false;
        }
        if self.out.len() + extra > MAX_REPR_LEN {
            self.truncated = true;
            self.out.push_str("...");
            return false;
        }
        true
    }

    fn push_str(&mut self, s: &str) {
        if self.reserve_tail(s.len()) {
            self.out.push_str(s);
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

/// Renders `value` (and everything it transitively references through
/// `arena`) as a compact, Ruby-`inspect`-flavored string.
pub fn describe(arena: &Arena, value: Value) -> String {
    let mut buf = ReprBuf::new();
    write_value(arena, value, &mut buf, 0);
    buf.finish()
}

fn write_value(arena: &Arena, value: Value, buf: &mut ReprBuf, depth: usize) {
    if depth > 64 {
        buf.push_str("<max depth>");
        return;
    }
    if buf.truncated {
        return;
    }
    match value {
        Value::Bool(b) => buf.push_str(if b { "true" } else { "false" }),
        Value::Null => buf.push_str("nil"),
        Value::Int(n) => {
            let mut tmp = String::new();
            let _ = write!(tmp, "{n}");
            buf.push_str(&tmp);
        }
        Value::Symbol(id) => match arena.get_symbol(id) {
            Ok(bytes) => {
                buf.push_str(":");
                buf.push_str(&String::from_utf8_lossy(bytes));
            }
            Err(_) => buf.push_str(":<bad symbol>"),
        },
        Value::Object(id) => write_object(arena, id, buf, depth),
    }
}

fn write_object(arena: &Arena, id: crate::arena::ObjectId, buf: &mut ReprBuf, depth: usize) {
    let data = match arena.get_object(id) {
        Ok(d) => d,
        Err(_) => {
            buf.push_str("<bad object>");
            return;
        }
    };
    match data {
        ObjectData::String(s) => {
            buf.push_str("\"");
            buf.push_str(&String::from_utf8_lossy(&s.bytes));
            buf.push_str("\"");
        }
        ObjectData::Array(a) => {
            buf.push_str("[");
            for (i, item) in a.items.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                write_value(arena, *item, buf, depth + 1);
            }
            buf.push_str("]");
        }
        ObjectData::Hash(h) => {
            buf.push_str("{");
            for (i, (k, v)) in h.pairs.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                write_value(arena, *k, buf, depth + 1);
                buf.push_str(" => ");
                write_value(arena, *v, buf, depth + 1);
            }
            buf.push_str("}");
        }
        ObjectData::GenericObject(o) => {
            buf.push_str("#<");
            write_class_name(arena, o.class_name, buf);
            for (k, v) in &o.ivars {
                buf.push_str(" ");
                write_value(arena, Value::Symbol(*k), buf, depth + 1);
                buf.push_str("=");
                write_value(arena, *v, buf, depth + 1);
            }
            buf.push_str(">");
        }
        ObjectData::UserDefined(u) => {
            buf.push_str("#<");
            write_class_name(arena, u.class_name, buf);
            buf.push_str(&format!(" _dump={} byte(s)", u.data.len()));
            buf.push_str(">");
        }
        ObjectData::UserMarshal(u) => {
            buf.push_str("#<");
            write_class_name(arena, u.class_name, buf);
            buf.push_str(" marshal_dump=");
            write_value(arena, u.data, buf, depth + 1);
            buf.push_str(">");
        }
    }
}

fn write_class_name(arena: &Arena, class_name: crate::arena::SymbolId, buf: &mut ReprBuf) {
    match arena.get_symbol(class_name) {
        Ok(bytes) => buf.push_str(&String::from_utf8_lossy(bytes)),
        Err(_) => buf.push_str("<bad class>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{ObjectData, RString};

    #[test]
    fn describes_scalars() {
        let arena = Arena::new();
        assert_eq!(describe(&arena, Value::Bool(true)), "true");
        assert_eq!(describe(&arena, Value::Null), "nil");
        assert_eq!(describe(&arena, Value::Int(5)), "5");
    }

    #[test]
    fn describes_a_string() {
        let mut arena = Arena::new();
        let id = arena.register_object(ObjectData::String(RString { bytes: b"hi".to_vec(), ivars: vec![] }));
        assert_eq!(describe(&arena, Value::Object(id)), "\"hi\"");
    }

    #[test]
    fn truncates_past_the_cap() {
        let mut arena = Arena::new();
        let id = arena.register_object(ObjectData::String(RString {
            bytes: vec![b'x'; MAX_REPR_LEN * 2],
            ivars: vec![],
        }));
        let s = describe(&arena, Value::Object(id));
        assert!(s.ends_with("..."));
        assert!(s.len() < MAX_REPR_LEN * 2);
    }
}
