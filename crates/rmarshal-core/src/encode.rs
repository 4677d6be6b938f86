//! The encoder driver (spec §4.5, §4.9, §6.2).
//!
//! Marshal-ids are assigned lazily, the first time a symbol or object is
//! actually emitted, in the same order [`crate::decode`] would have
//! assigned them — a depth-first walk of the value graph starting at the
//! root.

use std::collections::HashMap;
use std::io::Write;

use crate::arena::{Arena, ObjectData, SymbolId};
use crate::error::Result;
use crate::fixnum::{encode_byte_sequence, encode_fixnum};
use crate::io::ByteWriter;
use crate::options::EncodeOptions;
use crate::value::Value;

const SIGNATURE: [u8; 2] = [0x04, 0x08];

/// Encodes `root` (and everything reachable from it through `arena`) as a
/// complete Marshal 4.8 document, signature included.
pub fn encode<W: Write>(writer: W, arena: &Arena, root: Value, options: &EncodeOptions) -> Result<()> {
    let _ = options;
    let mut w = ByteWriter::new(writer);
    w.put_bytes(&SIGNATURE)?;
    let mut ctx = EncodeContext {
        arena,
        writer: w,
        seen_symbols: HashMap::new(),
        seen_objects: HashMap::new(),
        next_symbol_id: 0,
        next_object_id: 0,
    };
    ctx.encode_value(root)?;
    ctx.writer.flush()
}

struct EncodeContext<'a, W> {
    arena: &'a Arena,
    writer: ByteWriter<W>,
    seen_symbols: HashMap<u32, i64>,
    seen_objects: HashMap<u32, i64>,
    next_symbol_id: i64,
    next_object_id: i64,
}

impl<'a, W: Write> EncodeContext<'a, W> {
    fn encode_value(&mut self, v: Value) -> Result<()> {
        match v {
            Value::Bool(true) => self.writer.put_byte(b'T'),
            Value::Bool(false) => self.writer.put_byte(b'F'),
            Value::Null => self.writer.put_byte(b'0'),
            Value::Int(n) => {
                self.writer.put_byte(b'i')?;
                encode_fixnum(&mut self.writer, n)
            }
            Value::Symbol(id) => self.encode_symbol_ref(id),
            Value::Object(id) => self.encode_object(id),
        }
    }

    fn encode_symbol_ref(&mut self, id: SymbolId) -> Result<()> {
        if let Some(&mid) = self.seen_symbols.get(&id.0) {
            self.writer.put_byte(b';')?;
            return encode_fixnum(&mut self.writer, mid);
        }
        let mid = self.next_symbol_id;
        self.next_symbol_id += 1;
        self.seen_symbols.insert(id.0, mid);
        self.writer.put_byte(b':')?;
        let bytes = self.arena.get_symbol(id)?.to_vec();
        encode_byte_sequence(&mut self.writer, &bytes)
    }

    fn encode_object(&mut self, id: crate::arena::ObjectId) -> Result<()> {
        if let Some(&mid) = self.seen_objects.get(&id.0) {
            self.writer.put_byte(b'@')?;
            return encode_fixnum(&mut self.writer, mid);
        }
        let mid = self.next_object_id;
        self.next_object_id += 1;
        self.seen_objects.insert(id.0, mid);

        match self.arena.get_object(id)? {
            ObjectData::String(s) => self.write_ivar_wrapped(&s.ivars, |me| {
                me.writer.put_byte(b'"')?;
                encode_byte_sequence(&mut me.writer, &s.bytes)
            }),
            ObjectData::Array(a) => self.write_ivar_wrapped(&a.ivars, |me| {
                me.writer.put_byte(b'[')?;
                encode_fixnum(&mut me.writer, a.items.len() as i64)?;
                for item in &a.items {
                    me.encode_value(*item)?;
                }
                Ok(())
            }),
            ObjectData::Hash(h) => self.write_ivar_wrapped(&h.ivars, |me| {
                me.writer.put_byte(b'{')?;
                encode_fixnum(&mut me.writer, h.pairs.len() as i64)?;
                for (k, v) in &h.pairs {
                    me.encode_value(*k)?;
                    me.encode_value(*v)?;
                }
                Ok(())
            }),
            ObjectData::GenericObject(o) => {
                self.writer.put_byte(b'o')?;
                self.encode_value(Value::Symbol(o.class_name))?;
                encode_fixnum(&mut self.writer, o.ivars.len() as i64)?;
                for (k, v) in &o.ivars {
                    self.encode_value(Value::Symbol(*k))?;
                    self.encode_value(*v)?;
                }
                Ok(())
            }
            ObjectData::UserDefined(u) => self.write_ivar_wrapped(&u.ivars, |me| {
                me.writer.put_byte(b'u')?;
                me.encode_value(Value::Symbol(u.class_name))?;
                encode_byte_sequence(&mut me.writer, &u.data)
            }),
            ObjectData::UserMarshal(u) => self.write_ivar_wrapped(&u.ivars, |me| {
                me.writer.put_byte(b'U')?;
                me.encode_value(Value::Symbol(u.class_name))?;
                me.encode_value(u.data)
            }),
        }
    }

    /// Writes `body`, wrapped in an `I` tag with trailing ivar pairs when
    /// `ivars` is non-empty. `GenericObject` never calls this — its ivars
    /// are inline in the `o` tag's own grammar.
    fn write_ivar_wrapped<F>(&mut self, ivars: &[(SymbolId, Value)], body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        if ivars.is_empty() {
            return body(self);
        }
        self.writer.put_byte(b'I')?;
        body(self)?;
        encode_fixnum(&mut self.writer, ivars.len() as i64)?;
        for (k, v) in ivars {
            self.encode_value(Value::Symbol(*k))?;
            self.encode_value(*v)?;
        }
        Ok(())
    }
}
