use std::borrow::Cow;

use serde::ser::{self, SerializeMap, SerializeSeq};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::mapping::Mapping;
use crate::sexp::{Number, Sexp};

/// Builds a `Sexp` from any `Serialize` value.
///
/// Structs and maps become lists of entries. An entry is the key followed by
/// the value, with a list value spliced in: `x: 1` is `(x 1)` and
/// `users: vec![1, 2]` is `(users 1 2)`. This is the same shape as the
/// top-level lists of a parsed document, so `from_str` reads it back.
pub struct Serializer;
pub struct CompoundSerializer(Vec<Sexp<'static>>);

pub fn to_sexp<T>(value: &T) -> Result<Sexp<'static>>
where
    T: ?Sized + Serialize,
{
    value.serialize(Serializer)
}

fn symbol(s: &str) -> Sexp<'static> {
    Sexp::Symbol(Cow::Owned(s.to_owned()))
}

fn entry(key: Sexp<'static>, value: Sexp<'static>) -> Sexp<'static> {
    match value {
        Sexp::List(mut items) => {
            items.insert(0, key);
            Sexp::List(items)
        }
        atom => Sexp::List(vec![key, atom]),
    }
}

impl ser::Serializer for Serializer {
    type Ok = Sexp<'static>;
    type Error = Error;
    type SerializeSeq = CompoundSerializer;
    type SerializeTuple = CompoundSerializer;
    type SerializeTupleStruct = CompoundSerializer;
    type SerializeTupleVariant = CompoundSerializer;
    type SerializeMap = CompoundSerializer;
    type SerializeStruct = CompoundSerializer;
    type SerializeStructVariant = CompoundSerializer;

    fn serialize_bool(self, v: bool) -> Result<Sexp<'static>> {
        let atom = if v { "true" } else { "false" };
        Ok(Sexp::Symbol(Cow::from(atom)))
    }

    fn serialize_i64(self, v: i64) -> Result<Sexp<'static>> {
        Ok(Sexp::Number(Number::Int(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<Sexp<'static>> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Sexp<'static>> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Sexp<'static>> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Sexp<'static>> {
        match i64::try_from(v) {
            Ok(v) => self.serialize_i64(v),
            Err(_) => Ok(symbol(&v.to_string())),
        }
    }

    // Integers beyond `i64` stay as text, like they do when parsed.
    fn serialize_u64(self, v: u64) -> Result<Sexp<'static>> {
        match i64::try_from(v) {
            Ok(v) => self.serialize_i64(v),
            Err(_) => Ok(symbol(&v.to_string())),
        }
    }

    fn serialize_u32(self, v: u32) -> Result<Sexp<'static>> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Sexp<'static>> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Sexp<'static>> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Sexp<'static>> {
        match i64::try_from(v) {
            Ok(v) => self.serialize_i64(v),
            Err(_) => Ok(symbol(&v.to_string())),
        }
    }

    fn serialize_f64(self, v: f64) -> Result<Sexp<'static>> {
        Ok(Sexp::Number(Number::Float(v)))
    }

    fn serialize_f32(self, v: f32) -> Result<Sexp<'static>> {
        // Go through the shortest decimal form so 0.1f32 stays 0.1.
        let v = v.to_string().parse().unwrap_or(f64::from(v));
        self.serialize_f64(v)
    }

    fn serialize_str(self, v: &str) -> Result<Sexp<'static>> {
        Ok(Sexp::String(Cow::Owned(v.to_string())))
    }

    fn serialize_char(self, v: char) -> Result<Sexp<'static>> {
        Ok(Sexp::String(Cow::Owned(v.to_string())))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Sexp<'static>> {
        match std::str::from_utf8(v) {
            Ok(s) => self.serialize_str(s),
            Err(_) => Err(Error::Serialization(
                "non-UTF-8 bytes are not supported".to_string(),
            )),
        }
    }

    fn serialize_unit(self) -> Result<Sexp<'static>> {
        Ok(Sexp::List(vec![]))
    }

    fn serialize_none(self) -> Result<Sexp<'static>> {
        self.serialize_unit()
    }

    fn serialize_some<T>(self, value: &T) -> Result<Sexp<'static>>
    where
        T: ?Sized + Serialize,
    {
        let sexp = value.serialize(self)?;
        Ok(Sexp::List(vec![sexp]))
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<Sexp<'static>> {
        Ok(Sexp::Symbol(Cow::from(name)))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Sexp<'static>> {
        Ok(Sexp::Symbol(Cow::from(variant)))
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<Sexp<'static>>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    // `(Variant value)`
    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Sexp<'static>>
    where
        T: ?Sized + Serialize,
    {
        let value = value.serialize(Serializer)?;
        Ok(Sexp::List(vec![Sexp::Symbol(Cow::from(variant)), value]))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq> {
        let vec = match len {
            None => vec![],
            Some(len) => Vec::with_capacity(len),
        };
        Ok(CompoundSerializer(vec))
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        self.serialize_seq(Some(len))
    }

    // `(Variant a b ...)`
    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        let mut vec = Vec::with_capacity(len + 1);
        vec.push(Sexp::Symbol(Cow::from(variant)));
        Ok(CompoundSerializer(vec))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap> {
        self.serialize_seq(len)
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<Self::SerializeStruct> {
        self.serialize_seq(Some(len))
    }

    // `(Variant (field value) ...)`
    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        let mut vec = Vec::with_capacity(len + 1);
        vec.push(Sexp::Symbol(Cow::from(variant)));
        Ok(CompoundSerializer(vec))
    }
}

impl CompoundSerializer {
    fn push(&mut self, value: Sexp<'static>) -> Result<()> {
        self.0.push(value);
        Ok(())
    }

    fn end(self) -> Result<Sexp<'static>> {
        Ok(Sexp::List(self.0))
    }
}

macro_rules! impl_list_serializer {
    ($serializer:ident, $serialize_elem:ident) => {
        impl ser::$serializer for CompoundSerializer {
            type Ok = Sexp<'static>;
            type Error = Error;

            fn $serialize_elem<T>(&mut self, value: &T) -> Result<()>
            where
                T: ?Sized + Serialize,
            {
                let elem = value.serialize(Serializer)?;
                self.push(elem)
            }

            fn end(self) -> Result<Sexp<'static>> {
                self.end()
            }
        }
    };
}

impl_list_serializer!(SerializeSeq, serialize_element);
impl_list_serializer!(SerializeTuple, serialize_element);
impl_list_serializer!(SerializeTupleStruct, serialize_field);
impl_list_serializer!(SerializeTupleVariant, serialize_field);

macro_rules! impl_entry_serializer {
    ($serializer:ident) => {
        impl ser::$serializer for CompoundSerializer {
            type Ok = Sexp<'static>;
            type Error = Error;

            fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
            where
                T: ?Sized + Serialize,
            {
                let value = value.serialize(Serializer)?;
                self.push(entry(Sexp::Symbol(Cow::from(key)), value))
            }

            fn end(self) -> Result<Sexp<'static>> {
                self.end()
            }
        }
    };
}

impl_entry_serializer!(SerializeStruct);
impl_entry_serializer!(SerializeStructVariant);

impl ser::SerializeMap for CompoundSerializer {
    type Ok = Sexp<'static>;
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        // Parked on the end until its value arrives.
        let key = key.serialize(Serializer)?;
        self.push(key)
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .0
            .pop()
            .ok_or_else(|| Error::Serialization("map value without a key".to_string()))?;
        let value = value.serialize(Serializer)?;
        self.push(entry(key, value))
    }

    fn end(self) -> Result<Sexp<'static>> {
        self.end()
    }
}

/// Atoms serialize as strings, numbers as numbers and lists as sequences.
impl Serialize for Sexp<'_> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        match self {
            Sexp::Symbol(s) | Sexp::String(s) | Sexp::Quote(s) => serializer.serialize_str(s),
            Sexp::Number(Number::Int(i)) => serializer.serialize_i64(*i),
            Sexp::Number(Number::Float(f)) => serializer.serialize_f64(*f),
            Sexp::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// A map from each tag to the sequence of its values.
impl Serialize for Mapping<'_> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, values) in self.iter() {
            map.serialize_entry(key, values)?;
        }
        map.end()
    }
}
