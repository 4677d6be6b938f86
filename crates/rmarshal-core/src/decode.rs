//! The decoder driver (spec §4.4, §4.9, §6.2).

use std::io::Read;

use tracing::trace;

use crate::arena::{Arena, GenericObject, ObjectData, RArray, RHash, RString, UserDefined, UserMarshal};
use crate::error::{MarshalError, Result};
use crate::fixnum::{decode_byte_sequence, decode_fixnum};
use crate::io::ByteReader;
use crate::options::DecodeOptions;
use crate::value::{Document, Value};

const SIGNATURE: [u8; 2] = [0x04, 0x08];

/// Decodes a complete Marshal 4.8 document from `reader`, signature included.
pub fn decode<R: Read>(reader: R, options: &DecodeOptions) -> Result<Document> {
    let mut r = ByteReader::new(reader);
    let major = r.next_byte()?;
    let minor = r.next_byte()?;
    if [major, minor] != SIGNATURE {
        return Err(MarshalError::BadSignature(major, minor));
    }
    let mut ctx = DecodeContext { reader: r, arena: Arena::new(), depth: 0, options };
    let root = ctx.decode_value()?;
    Ok(Document { arena: ctx.arena, root })
}

/// Decodes a single value with no leading signature, for callers embedding
/// Marshal data inside a larger container. The returned arena holds only
/// the symbols/objects reachable from `root`.
pub fn decode_value<R: Read>(reader: R, options: &DecodeOptions) -> Result<Document> {
    let r = ByteReader::new(reader);
    let mut ctx = DecodeContext { reader: r, arena: Arena::new(), depth: 0, options };
    let root = ctx.decode_value()?;
    Ok(Document { arena: ctx.arena, root })
}

struct DecodeContext<'o, R> {
    reader: ByteReader<R>,
    arena: Arena,
    depth: usize,
    options: &'o DecodeOptions,
}

impl<'o, R: Read> DecodeContext<'o, R> {
    fn decode_value(&mut self) -> Result<Value> {
        self.depth += 1;
        if self.depth > self.options.max_depth {
            return Err(MarshalError::RecursionLimit { limit: self.options.max_depth });
        }
        let result = self.decode_tagged();
        self.depth -= 1;
        result
    }

    fn decode_tagged(&mut self) -> Result<Value> {
        let offset = self.reader.offset();
        let tag = self.reader.next_byte()?;
        if !self.options.quiet {
            trace!(tag = %(tag as char), offset, depth = self.depth, "decode tag");
        }
        match tag {
            b'T' => Ok(Value::Bool(true)),
            b'F' => Ok(Value::Bool(false)),
            b'0' => Ok(Value::Null),
            b'i' => Ok(Value::Int(decode_fixnum(&mut self.reader)?)),
            b':' => {
                let bytes = decode_byte_sequence(&mut self.reader)?;
                Ok(Value::Symbol(self.arena.register_symbol(bytes)))
            }
            b';' => {
                let index = decode_fixnum(&mut self.reader)?;
                Ok(Value::Symbol(self.arena.symbol_id_for_index(non_negative(index)?)?))
            }
            b'@' => {
                let index = decode_fixnum(&mut self.reader)?;
                Ok(Value::Object(self.arena.object_id_for_index(non_negative(index)?)?))
            }
            b'"' => {
                let bytes = decode_byte_sequence(&mut self.reader)?;
                let id = self.arena.register_object(ObjectData::String(RString { bytes, ivars: vec![] }));
                Ok(Value::Object(id))
            }
            b'[' => {
                let n = non_negative(decode_fixnum(&mut self.reader)?)?;
                let id = self.arena.register_object(ObjectData::Array(RArray::default()));
                for _ in 0..n {
                    let item = self.decode_value()?;
                    match self.arena.get_object_mut(id)? {
                        ObjectData::Array(a) => a.items.push(item),
                        _ => unreachable!(),
                    }
                }
                Ok(Value::Object(id))
            }
            b'{' => {
                let n = non_negative(decode_fixnum(&mut self.reader)?)?;
                let id = self.arena.register_object(ObjectData::Hash(RHash::default()));
                for _ in 0..n {
                    let key = self.decode_value()?;
                    let val = self.decode_value()?;
                    match self.arena.get_object_mut(id)? {
                        ObjectData::Hash(h) => h.pairs.push((key, val)),
                        _ => unreachable!(),
                    }
                }
                Ok(Value::Object(id))
            }
            b'o' => {
                let class_name = self.decode_symbol()?;
                let id = self.arena.register_object(ObjectData::GenericObject(GenericObject {
                    class_name,
                    ivars: vec![],
                }));
                let n = non_negative(decode_fixnum(&mut self.reader)?)?;
                for _ in 0..n {
                    let key = self.decode_symbol()?;
                    let val = self.decode_value()?;
                    self.arena.set_ivar(id, key, val)?;
                }
                Ok(Value::Object(id))
            }
            b'u' => {
                let class_name = self.decode_symbol()?;
                let data = decode_byte_sequence(&mut self.reader)?;
                let id = self.arena.register_object(ObjectData::UserDefined(UserDefined {
                    class_name,
                    data,
                    ivars: vec![],
                }));
                Ok(Value::Object(id))
            }
            b'U' => {
                let class_name = self.decode_symbol()?;
                // Reserve the marshal-id before decoding the payload, matching
                // the order real Marshal streams assign them in.
                let id = self.arena.register_object(ObjectData::UserMarshal(UserMarshal {
                    class_name,
                    data: Value::Null,
                    ivars: vec![],
                }));
                let inner = self.decode_value()?;
                match self.arena.get_object_mut(id)? {
                    ObjectData::UserMarshal(u) => u.data = inner,
                    _ => unreachable!(),
                }
                Ok(Value::Object(id))
            }
            b'I' => {
                let inner = self.decode_value()?;
                let n = non_negative(decode_fixnum(&mut self.reader)?)?;
                for _ in 0..n {
                    let key = self.decode_symbol()?;
                    let val = self.decode_value()?;
                    if let Some(object) = inner.as_object() {
                        self.arena.set_ivar(object, key, val)?;
                    }
                    // Ephemeral values can't carry ivars; the pair is still
                    // consumed above so the stream stays in sync.
                }
                Ok(inner)
            }
            other => Err(MarshalError::UnsupportedTag {
                tag: other,
                tag_char: other as char,
                offset,
            }),
        }
    }

    fn decode_symbol(&mut self) -> Result<crate::arena::SymbolId> {
        let offset = self.reader.offset();
        let tag = self.reader.next_byte()?;
        match tag {
            b':' => {
                let bytes = decode_byte_sequence(&mut self.reader)?;
                Ok(self.arena.register_symbol(bytes))
            }
            b';' => {
                let index = decode_fixnum(&mut self.reader)?;
                self.arena.symbol_id_for_index(non_negative(index)?)
            }
            other => Err(MarshalError::UnsupportedTag {
                tag: other,
                tag_char: other as char,
                offset,
            }),
        }
    }
}

fn non_negative(v: i64) -> Result<usize> {
    usize::try_from(v).map_err(|_| MarshalError::Other(format!("expected a non-negative count, got {v}")))
}
