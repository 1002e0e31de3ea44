use std::borrow::Cow;
use std::fmt;

use crate::tokenizer::AtomKind;

/// A parsed s-expression node.
#[derive(Clone, Debug, PartialEq)]
pub enum Sexp<'a> {
    /// A bare atom: `cpuinfo`, `/dev/hda1`, or a number left as text.
    Symbol(Cow<'a, str>),
    /// A double-quoted atom, with escapes decoded.
    String(Cow<'a, str>),
    /// A single-quoted atom or form, verbatim and without the leading `'`.
    Quote(Cow<'a, str>),
    Number(Number),
    List(Vec<Sexp<'a>>),
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Interprets a bare atom as a number, if it looks like one.
    ///
    /// Accepts decimal integers (`-12`), hexadecimal integers (`0x1f`, no
    /// sign) and decimals with a single `.` and an optional exponent
    /// (`1.5`, `.5`, `2e10`). Integers that don't fit in an `i64` are not
    /// numbers.
    pub fn infer(text: &str) -> Option<Number> {
        let (negative, unsigned) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        if let Some(hex) = unsigned
            .strip_prefix("0x")
            .or_else(|| unsigned.strip_prefix("0X"))
        {
            if negative || hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            return i64::from_str_radix(hex, 16).ok().map(Number::Int);
        }

        if unsigned.is_empty() {
            return None;
        }

        if unsigned.bytes().all(|b| b.is_ascii_digit()) {
            return text.parse::<i64>().ok().map(Number::Int);
        }

        let (mantissa, exponent) = match unsigned.find(|c| c == 'e' || c == 'E') {
            Some(i) => (&unsigned[..i], Some(&unsigned[i + 1..])),
            None => (unsigned, None),
        };

        let mut dots = 0;
        let mut digits = 0;
        for b in mantissa.bytes() {
            match b {
                b'.' => dots += 1,
                b'0'..=b'9' => digits += 1,
                _ => return None,
            }
        }

        if dots > 1 || digits == 0 {
            return None;
        }

        if let Some(exponent) = exponent {
            let exponent = exponent
                .strip_prefix('+')
                .or_else(|| exponent.strip_prefix('-'))
                .unwrap_or(exponent);
            if exponent.is_empty() || !exponent.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
        }

        text.parse::<f64>().ok().map(Number::Float)
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            // `Debug` always keeps a `.` or an exponent, so the text reads
            // back as a float.
            Number::Float(x) => write!(f, "{:?}", x),
        }
    }
}

impl<'a> Sexp<'a> {
    pub(crate) fn from_atom(kind: AtomKind, text: Cow<'a, str>) -> Sexp<'a> {
        match kind {
            AtomKind::Bare => Sexp::Symbol(text),
            AtomKind::DoubleQuoted => Sexp::String(text),
            AtomKind::SingleQuoted => Sexp::Quote(text),
        }
    }

    pub fn symbol(text: impl Into<Cow<'a, str>>) -> Sexp<'a> {
        Sexp::Symbol(text.into())
    }

    pub fn string(text: impl Into<Cow<'a, str>>) -> Sexp<'a> {
        Sexp::String(text.into())
    }

    pub fn is_atom(&self) -> bool {
        !self.is_list()
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Sexp::List(_))
    }

    /// The text of a symbol, string or quote.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Sexp::Symbol(s) | Sexp::String(s) | Sexp::Quote(s) => Some(s),
            Sexp::Number(_) | Sexp::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Sexp<'a>]> {
        match self {
            Sexp::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Sexp::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Sexp::Number(Number::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().map(|n| n.as_f64())
    }

    /// Replaces every symbol that looks like a number with that number.
    /// Strings and quotes are left alone.
    pub fn infer_numbers(&mut self) {
        let mut pending = vec![self];

        while let Some(sexp) = pending.pop() {
            match sexp {
                Sexp::List(items) => pending.extend(items.iter_mut()),
                Sexp::Symbol(text) => {
                    if let Some(number) = Number::infer(text) {
                        *sexp = Sexp::Number(number);
                    }
                }
                Sexp::String(_) | Sexp::Quote(_) | Sexp::Number(_) => (),
            }
        }
    }

    pub fn into_owned(self) -> Sexp<'static> {
        match self {
            Sexp::Symbol(s) => Sexp::Symbol(Cow::Owned(s.into_owned())),
            Sexp::String(s) => Sexp::String(Cow::Owned(s.into_owned())),
            Sexp::Quote(s) => Sexp::Quote(Cow::Owned(s.into_owned())),
            Sexp::Number(n) => Sexp::Number(n),
            Sexp::List(items) => Sexp::List(items.into_iter().map(Sexp::into_owned).collect()),
        }
    }
}

impl<'a> From<&'a str> for Sexp<'a> {
    fn from(s: &'a str) -> Sexp<'a> {
        Sexp::Symbol(Cow::Borrowed(s))
    }
}

impl From<i64> for Sexp<'_> {
    fn from(i: i64) -> Self {
        Sexp::Number(Number::Int(i))
    }
}

impl From<f64> for Sexp<'_> {
    fn from(f: f64) -> Self {
        Sexp::Number(Number::Float(f))
    }
}

impl<'a> From<Vec<Sexp<'a>>> for Sexp<'a> {
    fn from(items: Vec<Sexp<'a>>) -> Sexp<'a> {
        Sexp::List(items)
    }
}

impl fmt::Display for Sexp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&crate::writer::to_string(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_integers() {
        assert_eq!(Number::infer("0"), Some(Number::Int(0)));
        assert_eq!(Number::infer("818850"), Some(Number::Int(818850)));
        assert_eq!(Number::infer("-42"), Some(Number::Int(-42)));
        assert_eq!(Number::infer("007"), Some(Number::Int(7)));
        assert_eq!(Number::infer("0x104000a"), Some(Number::Int(0x104000a)));
        assert_eq!(Number::infer("0X1F"), Some(Number::Int(31)));
        assert_eq!(Number::infer("9223372036854775807"), Some(Number::Int(i64::MAX)));
    }

    #[test]
    fn test_infer_floats() {
        assert_eq!(Number::infer("1.5"), Some(Number::Float(1.5)));
        assert_eq!(Number::infer("-0.25"), Some(Number::Float(-0.25)));
        assert_eq!(Number::infer(".5"), Some(Number::Float(0.5)));
        assert_eq!(Number::infer("5."), Some(Number::Float(5.0)));
        assert_eq!(Number::infer("1e3"), Some(Number::Float(1000.0)));
        assert_eq!(Number::infer("2.5E-1"), Some(Number::Float(0.25)));
    }

    #[test]
    fn test_infer_rejects_non_numbers() {
        for text in [
            "", "-", ".", "-.", "abc", "1.2.3", "12a", "0x", "0xg1", "-0x10", "1e", "e5", "1e+",
            "n-1", "/dev/root", "9223372036854775808", "0x8000000000000000",
        ] {
            assert_eq!(Number::infer(text), None, "{:?}", text);
        }
    }

    #[test]
    fn test_infer_numbers_in_tree() {
        let mut sexp = Sexp::List(vec![
            Sexp::symbol("user"),
            Sexp::symbol("1"),
            Sexp::string("2"),
            Sexp::List(vec![Sexp::symbol("0x10"), Sexp::symbol("lo")]),
        ]);
        sexp.infer_numbers();

        assert_eq!(
            sexp,
            Sexp::List(vec![
                Sexp::symbol("user"),
                Sexp::from(1i64),
                Sexp::string("2"),
                Sexp::List(vec![Sexp::from(16i64), Sexp::symbol("lo")]),
            ])
        );
    }

    #[test]
    fn test_accessors() {
        let sexp = Sexp::List(vec![Sexp::symbol("a"), Sexp::from(2i64), Sexp::from(0.5)]);
        let items = sexp.as_list().unwrap_or_default();
        assert_eq!(items[0].as_str(), Some("a"));
        assert_eq!(items[1].as_i64(), Some(2));
        assert_eq!(items[1].as_f64(), Some(2.0));
        assert_eq!(items[2].as_i64(), None);
        assert_eq!(items[2].as_f64(), Some(0.5));
        assert!(sexp.is_list());
        assert!(items[0].is_atom());
        assert_eq!(sexp.as_str(), None);
    }

    #[test]
    fn test_into_owned() {
        let text = String::from("(a b)");
        let sexp = Sexp::List(vec![Sexp::symbol(&text[1..2]), Sexp::Quote(Cow::Borrowed(&text))]);
        let owned: Sexp<'static> = sexp.clone().into_owned();
        assert_eq!(owned, sexp);
    }
}
