use std::io;

// How an atom has to be written so that the tokenizer reads it back as the
// same atom. Bare text is only written bare if it would tokenize as a single
// bare atom: non-empty, no whitespace or parentheses, and not starting with
// '"' or '\''. Anything else is written as a double-quoted string.
pub enum Atom<'a> {
    Bare(&'a str),
    DoubleQuoted(&'a str),
    SingleQuoted(&'a str),
}

fn can_be_bare(s: &str) -> bool {
    if s.starts_with('"') || s.starts_with('\'') {
        return false;
    }

    !s.is_empty()
        && !s
            .bytes()
            .any(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | b'(' | b')'))
}

impl<'a> Atom<'a> {
    pub fn symbol(s: &'a str) -> Atom<'a> {
        if can_be_bare(s) {
            Atom::Bare(s)
        } else {
            Atom::DoubleQuoted(s)
        }
    }

    pub fn string(s: &'a str) -> Atom<'a> {
        Atom::DoubleQuoted(s)
    }

    /// Quoted forms are written back verbatim; a quoted bare atom that
    /// couldn't be read back as one is written as a string instead.
    pub fn quote(s: &'a str) -> Atom<'a> {
        if s.starts_with('(') || can_be_bare(s) {
            Atom::SingleQuoted(s)
        } else {
            Atom::DoubleQuoted(s)
        }
    }

    /// Whether the next atom needs a separating space. Bare text would
    /// otherwise run into it.
    pub fn ends_open(&self) -> bool {
        match self {
            Atom::Bare(_) => true,
            Atom::DoubleQuoted(_) => false,
            Atom::SingleQuoted(s) => !s.starts_with('('),
        }
    }

    pub fn write<W: io::Write>(&self, mut w: W) -> io::Result<()> {
        match self {
            Atom::Bare(s) => write!(w, "{}", s),
            Atom::DoubleQuoted(s) => {
                write!(w, "\"")?;
                write_escaped(&mut w, s)?;
                write!(w, "\"")
            }
            Atom::SingleQuoted(s) => write!(w, "'{}", s),
        }
    }
}

fn write_escaped<W: io::Write>(mut w: W, s: &str) -> io::Result<()> {
    let mut unescaped_from = 0;

    for (i, b) in s.bytes().enumerate() {
        let escape = match b {
            b'"' => "\\\"",
            b'\\' => "\\\\",
            b'\n' => "\\n",
            b'\t' => "\\t",
            b'\r' => "\\r",
            _ => continue,
        };
        w.write_all(&s.as_bytes()[unescaped_from..i])?;
        w.write_all(escape.as_bytes())?;
        unescaped_from = i + 1;
    }

    w.write_all(&s.as_bytes()[unescaped_from..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(atom: Atom) -> String {
        let mut v = Vec::new();
        atom.write(&mut v).unwrap();
        String::from_utf8(v).unwrap()
    }

    #[test]
    fn test_symbols_that_need_quotes() {
        assert!(matches!(Atom::symbol(""), Atom::DoubleQuoted(_)));
        assert!(matches!(Atom::symbol("a b"), Atom::DoubleQuoted(_)));
        assert!(matches!(Atom::symbol("("), Atom::DoubleQuoted(_)));
        assert!(matches!(Atom::symbol(")"), Atom::DoubleQuoted(_)));
        assert!(matches!(Atom::symbol("\"a"), Atom::DoubleQuoted(_)));
        assert!(matches!(Atom::symbol("'a"), Atom::DoubleQuoted(_)));
        assert!(matches!(Atom::symbol("a\nb"), Atom::DoubleQuoted(_)));

        assert!(matches!(Atom::symbol("a"), Atom::Bare(_)));
        assert!(matches!(Atom::symbol("a\"b"), Atom::Bare(_)));
        assert!(matches!(Atom::symbol("/dev/hda1"), Atom::Bare(_)));
        assert!(matches!(Atom::symbol("αβγ"), Atom::Bare(_)));
    }

    #[test]
    fn test_write() {
        assert_eq!(written(Atom::symbol("abc")), "abc");
        assert_eq!(written(Atom::symbol("a b")), r#""a b""#);
        assert_eq!(written(Atom::string(r#"say "hi"\"#)), r#""say \"hi\"\\""#);
        assert_eq!(written(Atom::string("1\n2\t3\r")), r#""1\n2\t3\r""#);
        assert_eq!(written(Atom::quote("(a (b))")), "'(a (b))");
        assert_eq!(written(Atom::quote("weird")), "'weird");
        assert_eq!(written(Atom::quote("a b")), r#""a b""#);
    }
}
