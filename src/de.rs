use std::num::{ParseFloatError, ParseIntError};

use serde::de::value::BorrowedStrDeserializer;
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, EnumAccess, MapAccess, SeqAccess, VariantAccess,
    Visitor,
};
use serde::{forward_to_deserialize_any, Deserialize};

use crate::error::{Error, Result};
use crate::mapping::Mapping;
use crate::parser::parse;
use crate::sexp::{Number, Sexp};

/// Reads typed values out of a parsed tree.
///
/// A deserializer either looks at a single node, or at the values that
/// follow a key, like the rest of a top-level list. A run of values reads as
/// a sequence, struct or map over its elements, and as a scalar when it
/// holds exactly one.
#[derive(Copy, Clone)]
pub struct Deserializer<'de, 's> {
    source: Source<'de, 's>,
}

#[derive(Copy, Clone)]
enum Source<'de, 's> {
    Node(&'de Sexp<'s>),
    Rest(&'de [Sexp<'s>]),
}

fn error<V>(s: &str) -> Result<V> {
    Err(Error::Deserialization(s.to_string()))
}

fn error_string<V>(s: String) -> Result<V> {
    Err(Error::Deserialization(s))
}

fn parse_int_error(err: ParseIntError) -> Error {
    Error::Deserialization(format!("unable to parse int: {}", err))
}

fn parse_float_error(err: ParseFloatError) -> Error {
    Error::Deserialization(format!("unable to parse float: {}", err))
}

fn parse_int(text: &str) -> Result<i128> {
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let (radix, digits) = match unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        Some(hex) => (16, hex),
        None => (10, unsigned),
    };

    // `from_str_radix` takes a sign of its own; only the one above is allowed.
    if digits.starts_with(['+', '-']) {
        return error_string(format!("unable to parse int: unexpected sign in {:?}", text));
    }
    let magnitude = u128::from_str_radix(digits, radix).map_err(parse_int_error)?;

    let value = if !negative {
        i128::try_from(magnitude).ok()
    } else if magnitude == i128::MIN.unsigned_abs() {
        Some(i128::MIN)
    } else {
        i128::try_from(magnitude).ok().map(|i| -i)
    };
    value.ok_or_else(|| Error::Deserialization(format!("integer {} out of range", text)))
}

impl<'de, 's> Deserializer<'de, 's> {
    pub fn from_node(sexp: &'de Sexp<'s>) -> Deserializer<'de, 's> {
        Deserializer {
            source: Source::Node(sexp),
        }
    }

    /// A deserializer over the values that follow a key.
    pub fn from_values(values: &'de [Sexp<'s>]) -> Deserializer<'de, 's> {
        Deserializer {
            source: Source::Rest(values),
        }
    }

    fn single(&self) -> Result<&'de Sexp<'s>> {
        match self.source {
            Source::Node(sexp) => Ok(sexp),
            Source::Rest([sexp]) => Ok(sexp),
            Source::Rest(values) => error_string(format!(
                "expected a single value, got {} values",
                values.len()
            )),
        }
    }

    fn elements(&self) -> &'de [Sexp<'s>] {
        match self.source {
            Source::Node(Sexp::List(items)) => items,
            Source::Node(atom) => std::slice::from_ref(atom),
            Source::Rest(values) => values,
        }
    }

    fn expect_text(&self) -> Result<&'de str> {
        match self.single()? {
            Sexp::List(_) => error("expected atom; got list"),
            Sexp::Number(_) => error("expected text; got number"),
            atom => atom
                .as_str()
                .ok_or_else(|| Error::Deserialization("expected atom".to_string())),
        }
    }

    fn expect_integer(&self) -> Result<i128> {
        match self.single()? {
            Sexp::Number(Number::Int(i)) => Ok(i128::from(*i)),
            Sexp::Number(Number::Float(_)) => error("expected integer; got float"),
            Sexp::List(_) => error("expected integer; got list"),
            atom => parse_int(atom.as_str().unwrap_or_default()),
        }
    }

    fn expect_float(&self) -> Result<f64> {
        match self.single()? {
            Sexp::Number(n) => Ok(n.as_f64()),
            Sexp::List(_) => error("expected float; got list"),
            atom => atom
                .as_str()
                .unwrap_or_default()
                .parse::<f64>()
                .map_err(parse_float_error),
        }
    }
}

/// Deserializes `T` from a single node.
pub fn from_sexp<'de, T>(sexp: &'de Sexp<'_>) -> Result<T>
where
    T: Deserialize<'de>,
{
    T::deserialize(Deserializer::from_node(sexp))
}

/// Deserializes `T` from a mapping, as a map from each tag to the values
/// that follow it.
pub fn from_mapping<'de, T>(mapping: &'de Mapping<'_>) -> Result<T>
where
    T: Deserialize<'de>,
{
    T::deserialize(MappingDeserializer { mapping })
}

/// Parses `text` with the default options and deserializes `T` from the
/// resulting mapping.
pub fn from_str<T>(text: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let mapping = parse(text)?;
    from_mapping(&mapping)
}

macro_rules! impl_deserialize_int {
    ($deserialize_int:ident, $int_t:ty, $visit_int:ident) => {
        fn $deserialize_int<V>(self, visitor: V) -> Result<V::Value>
        where
            V: Visitor<'de>,
        {
            let i = self.expect_integer()?;
            match <$int_t>::try_from(i) {
                Ok(i) => visitor.$visit_int(i),
                Err(_) => error_string(format!(
                    "integer {} out of range for {}",
                    i,
                    stringify!($int_t)
                )),
            }
        }
    };
}

impl<'de, 's> de::Deserializer<'de> for Deserializer<'de, 's> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.source {
            Source::Rest([sexp]) => Deserializer::from_node(sexp).deserialize_any(visitor),
            Source::Rest(values) => visit_elements(values, visitor),
            Source::Node(Sexp::List(items)) => visit_elements(items, visitor),
            Source::Node(Sexp::Number(Number::Int(i))) => visitor.visit_i64(*i),
            Source::Node(Sexp::Number(Number::Float(f))) => visitor.visit_f64(*f),
            Source::Node(Sexp::Symbol(s) | Sexp::String(s) | Sexp::Quote(s)) => {
                visitor.visit_borrowed_str(s.as_ref())
            }
        }
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let b = match self.expect_text()? {
            "true" => true,
            "false" => false,
            _ => return error("expected `true` or `false`"),
        };
        visitor.visit_bool(b)
    }

    impl_deserialize_int!(deserialize_i8, i8, visit_i8);
    impl_deserialize_int!(deserialize_i16, i16, visit_i16);
    impl_deserialize_int!(deserialize_i32, i32, visit_i32);
    impl_deserialize_int!(deserialize_i64, i64, visit_i64);
    impl_deserialize_int!(deserialize_i128, i128, visit_i128);

    impl_deserialize_int!(deserialize_u8, u8, visit_u8);
    impl_deserialize_int!(deserialize_u16, u16, visit_u16);
    impl_deserialize_int!(deserialize_u32, u32, visit_u32);
    impl_deserialize_int!(deserialize_u64, u64, visit_u64);
    impl_deserialize_int!(deserialize_u128, u128, visit_u128);

    fn deserialize_f32<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_f32(self.expect_float()? as f32)
    }

    fn deserialize_f64<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_f64(self.expect_float()?)
    }

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let mut chars = self.expect_text()?.chars();
        match chars.next() {
            None => error("Expected char but got empty string"),
            Some(ch) => {
                if chars.next().is_some() {
                    error("Expected single char but got multi-char string")
                } else {
                    visitor.visit_char(ch)
                }
            }
        }
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.single()? {
            Sexp::Number(n) => visitor.visit_string(n.to_string()),
            _ => visitor.visit_borrowed_str(self.expect_text()?),
        }
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_borrowed_bytes(self.expect_text()?.as_bytes())
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_bytes(visitor)
    }

    // `()` is `None` and `(v)` is `Some(v)`. After a key, no values is `None`
    // and anything else is `Some`.
    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.source {
            Source::Rest([]) => visitor.visit_none(),
            Source::Rest([sexp]) => visitor.visit_some(Deserializer::from_node(sexp)),
            Source::Rest(_) => visitor.visit_some(self),
            Source::Node(Sexp::List(items)) => match items.as_slice() {
                [] => visitor.visit_none(),
                [sexp] => visitor.visit_some(Deserializer::from_node(sexp)),
                _ => visitor.visit_some(self),
            },
            Source::Node(_) => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let is_unit = match self.source {
            Source::Rest([]) => true,
            Source::Rest([Sexp::List(items)]) | Source::Node(Sexp::List(items)) => items.is_empty(),
            _ => false,
        };

        if is_unit {
            visitor.visit_unit()
        } else {
            error("expected empty list")
        }
    }

    fn deserialize_unit_struct<V>(self, name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let s = self.expect_text()?;
        if s == name {
            visitor.visit_unit()
        } else {
            error_string(format!("Expected atom: {:?}, got: {:?}", name, s))
        }
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visit_elements(self.elements(), visitor)
    }

    fn deserialize_tuple<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.source {
            Source::Node(sexp) if sexp.is_atom() => error("expected list of entries; got atom"),
            _ => visitor.visit_map(EntriesDeserializer::new(self.elements())),
        }
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let items = match self.source {
            Source::Rest([sexp]) | Source::Node(sexp) => match sexp {
                Sexp::List(items) => items.as_slice(),
                atom => std::slice::from_ref(atom),
            },
            Source::Rest(values) => values,
        };

        match items.split_first() {
            None => error("expected variant; got empty list"),
            Some((Sexp::List(_), _)) => error("expected variant name; got list"),
            Some((name, payload)) => match name.as_str() {
                Some(name) => visitor.visit_enum(VariantDeserializer { name, payload }),
                None => error("expected variant name; got number"),
            },
        }
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }
}

fn visit_elements<'de, 's, V>(items: &'de [Sexp<'s>], visitor: V) -> Result<V::Value>
where
    V: Visitor<'de>,
{
    let mut seq = ElementsDeserializer { iter: items.iter() };
    let value = visitor.visit_seq(&mut seq)?;
    match seq.iter.len() {
        0 => Ok(value),
        remaining => error_string(format!(
            "expected {} elements, got {}",
            items.len() - remaining,
            items.len()
        )),
    }
}

struct ElementsDeserializer<'de, 's> {
    iter: std::slice::Iter<'de, Sexp<'s>>,
}

impl<'de, 's> SeqAccess<'de> for ElementsDeserializer<'de, 's> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        match self.iter.next() {
            None => Ok(None),
            Some(sexp) => seed.deserialize(Deserializer::from_node(sexp)).map(Some),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

/// Entries are lists whose first element is the key and whose remaining
/// elements are the value.
struct EntriesDeserializer<'de, 's> {
    iter: std::slice::Iter<'de, Sexp<'s>>,
    value: &'de [Sexp<'s>],
}

impl<'de, 's> EntriesDeserializer<'de, 's> {
    fn new(entries: &'de [Sexp<'s>]) -> EntriesDeserializer<'de, 's> {
        EntriesDeserializer {
            iter: entries.iter(),
            value: &[],
        }
    }
}

impl<'de, 's> MapAccess<'de> for EntriesDeserializer<'de, 's> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        let Some(entry) = self.iter.next() else {
            return Ok(None);
        };

        match entry {
            Sexp::List(items) => match items.split_first() {
                None => error("expect key-value pair, but got empty list"),
                Some((key, value)) => {
                    self.value = value;
                    seed.deserialize(Deserializer::from_node(key)).map(Some)
                }
            },
            _ => error("expect key-value pair, but got atom"),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        seed.deserialize(Deserializer::from_values(self.value))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct VariantDeserializer<'de, 's> {
    name: &'de str,
    payload: &'de [Sexp<'s>],
}

impl<'de, 's> EnumAccess<'de> for VariantDeserializer<'de, 's> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: DeserializeSeed<'de>,
    {
        let val = seed.deserialize(BorrowedStrDeserializer::<Error>::new(self.name))?;
        Ok((val, self))
    }
}

impl<'de, 's> VariantAccess<'de> for VariantDeserializer<'de, 's> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        if self.payload.is_empty() {
            Ok(())
        } else {
            error_string(format!("unit variant {} takes no values", self.name))
        }
    }

    // `(Variant v)`: exactly one value.
    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        match self.payload {
            [value] => seed.deserialize(Deserializer::from_node(value)),
            _ => error_string(format!(
                "newtype variant {} takes one value, got {}",
                self.name,
                self.payload.len()
            )),
        }
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visit_elements(self.payload, visitor)
    }

    fn struct_variant<V>(self, _fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_map(EntriesDeserializer::new(self.payload))
    }
}

struct MappingDeserializer<'de, 's> {
    mapping: &'de Mapping<'s>,
}

impl<'de, 's> de::Deserializer<'de> for MappingDeserializer<'de, 's> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_map(TagsDeserializer {
            iter: self.mapping.entries().iter(),
            value: &[],
        })
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }
}

struct TagsDeserializer<'de, 's> {
    iter: std::slice::Iter<'de, (std::borrow::Cow<'s, str>, Vec<Sexp<'s>>)>,
    value: &'de [Sexp<'s>],
}

impl<'de, 's> MapAccess<'de> for TagsDeserializer<'de, 's> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        match self.iter.next() {
            None => Ok(None),
            Some((key, values)) => {
                self.value = values.as_slice();
                let key = BorrowedStrDeserializer::<Error>::new(key.as_ref());
                seed.deserialize(key).map(Some)
            }
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        seed.deserialize(Deserializer::from_values(self.value))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}
