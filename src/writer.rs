//! Writing trees back out as s-expression text.
//!
//! Output always reads back as the same tree: symbols that wouldn't
//! tokenize as a single bare atom are quoted, and strings are escaped.

use std::fmt::Write as _;
use std::io;

use crate::atom::Atom;
use crate::error::Result;
use crate::mapping::Mapping;
use crate::sexp::Sexp;
use crate::token_writer::TokenWriter;

pub use crate::token_writer::Style;

pub fn to_string(sexp: &Sexp) -> String {
    sexps_to_string(std::slice::from_ref(sexp), Style::Standard)
}

/// Like `to_string`, but with only the spaces needed to read it back.
pub fn to_string_mach(sexp: &Sexp) -> String {
    sexps_to_string(std::slice::from_ref(sexp), Style::Machine)
}

pub fn to_writer<W: io::Write>(w: W, sexp: &Sexp) -> Result<()> {
    write_sexps(&mut TokenWriter::new(w, Style::Standard), std::slice::from_ref(sexp))?;
    Ok(())
}

pub fn to_writer_mach<W: io::Write>(w: W, sexp: &Sexp) -> Result<()> {
    write_sexps(&mut TokenWriter::new(w, Style::Machine), std::slice::from_ref(sexp))?;
    Ok(())
}

/// Writes every top-level list of `mapping`, `(key values...)`, in order.
pub fn write_mapping<W: io::Write>(w: W, mapping: &Mapping, style: Style) -> Result<()> {
    let mut writer = TokenWriter::new(w, style);
    for (key, values) in mapping.iter() {
        writer.start_list()?;
        writer.write_atom(Atom::symbol(key))?;
        write_sexps(&mut writer, values)?;
        writer.end_list()?;
    }
    Ok(())
}

pub fn mapping_to_string(mapping: &Mapping) -> String {
    let mut buf = Vec::new();
    // Writing to a `Vec` can't fail.
    let _ = write_mapping(&mut buf, mapping, Style::Standard);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Renders `sexp` as a Graphviz DOT graph: a circle per list, a box per
/// atom labelled with its text, and an edge from each list to each of its
/// elements, in order.
pub fn to_dot(sexp: &Sexp) -> String {
    let mut out = String::from("digraph sexp {\n");
    let mut next_id = 0;
    // Nodes still to draw, each with the id of the list holding it.
    let mut pending: Vec<(Option<usize>, &Sexp)> = vec![(None, sexp)];

    while let Some((parent, node)) = pending.pop() {
        let id = next_id;
        next_id += 1;

        match node {
            Sexp::List(items) => {
                let _ = writeln!(out, "  n{} [shape=circle, label=\"()\"];", id);
                pending.extend(items.iter().rev().map(|item| (Some(id), item)));
            }
            atom => {
                let label = to_string(atom).replace('\\', "\\\\").replace('"', "\\\"");
                let _ = writeln!(out, "  n{} [shape=box, label=\"{}\"];", id, label);
            }
        }

        if let Some(parent) = parent {
            let _ = writeln!(out, "  n{} -> n{};", parent, id);
        }
    }

    out.push_str("}\n");
    out
}

fn sexps_to_string(sexps: &[Sexp], style: Style) -> String {
    let mut writer = TokenWriter::new(Vec::new(), style);
    let _ = write_sexps(&mut writer, sexps);
    String::from_utf8_lossy(&writer.into_inner()).into_owned()
}

// Iterative so that writing is no more depth-limited than parsing.
fn write_sexps<W: io::Write>(writer: &mut TokenWriter<W>, sexps: &[Sexp]) -> io::Result<()> {
    let mut stack = vec![sexps.iter()];

    while let Some(items) = stack.last_mut() {
        match items.next() {
            None => {
                stack.pop();
                if !stack.is_empty() {
                    writer.end_list()?;
                }
            }
            Some(Sexp::List(children)) => {
                writer.start_list()?;
                stack.push(children.iter());
            }
            Some(Sexp::Symbol(s)) => writer.write_atom(Atom::symbol(s))?,
            Some(Sexp::String(s)) => writer.write_atom(Atom::string(s))?,
            Some(Sexp::Quote(s)) => writer.write_atom(Atom::quote(s))?,
            Some(Sexp::Number(n)) => writer.write_atom(Atom::symbol(&n.to_string()))?,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::parser::{parse, parse_one, parse_sexps};

    use insta::assert_snapshot;

    #[test]
    fn test_styles() {
        let sexp = parse_one(r#"(a "b c" (d 1 2.5) () 'e '(f g) "h")"#).unwrap();
        assert_snapshot!(to_string(&sexp), @r#"(a "b c" (d 1 2.5) () 'e '(f g) "h")"#);
        assert_snapshot!(to_string_mach(&sexp), @r#"(a "b c"(d 1 2.5)()'e '(f g)"h")"#);
        assert_snapshot!(sexp, @r#"(a "b c" (d 1 2.5) () 'e '(f g) "h")"#);
    }

    #[test]
    fn test_quoting() {
        let sexp = Sexp::List(vec![
            Sexp::symbol(""),
            Sexp::symbol("two words"),
            Sexp::symbol("(paren"),
            Sexp::string("tab\there"),
            Sexp::string(r#"q"uote\"#),
            Sexp::from(1.0),
            Sexp::from(-7i64),
        ]);
        assert_snapshot!(
            to_string(&sexp),
            @r#"("" "two words" "(paren" "tab\there" "q\"uote\\" 1.0 -7)"#
        );
    }

    #[test]
    fn test_to_writer() {
        let sexp = parse_one("(x (y z))").unwrap();
        let mut out = Vec::new();
        to_writer(&mut out, &sexp).unwrap();
        to_writer_mach(&mut out, &sexp).unwrap();
        assert_eq!(out, b"(x (y z))(x(y z))");
    }

    #[test]
    fn test_mapping() {
        let mapping = parse("(cpuinfo (user 1) (system 1))\n(avenrun (1))").unwrap();
        assert_snapshot!(mapping, @"(cpuinfo (user 1) (system 1)) (avenrun (1))");

        let mut out = Vec::new();
        write_mapping(&mut out, &mapping, Style::Machine).unwrap();
        assert_eq!(out, b"(cpuinfo(user 1)(system 1))(avenrun(1))");
    }

    #[test]
    fn test_round_trip() {
        let inputs = [
            "(cpuinfo (user 1) (system 1))(avenrun (1))",
            r#"(uname Linux "my host" "a\"b\\c\nd") (disk (/dev/hda1 818850 0x10))"#,
            "(q '(a (b \")\") c) 'sym \"'not-quote\") (f 1.5 -0.25 1e3)",
            "(weird a\"b c'd) (empty () (()))",
        ];

        for input in inputs {
            let first = parse(input).unwrap();
            let text = first.to_string();
            assert_eq!(parse(&text).unwrap(), first, "{}", text);

            let sexps = parse_sexps(input).unwrap();
            for sexp in &sexps {
                assert_eq!(&parse_one(&to_string_mach(sexp)).unwrap(), sexp);
            }
        }
    }

    #[test]
    fn test_dot() {
        let sexp = parse_one(r#"(status (user 1 2) "db 1" 'x)"#).unwrap();
        assert_snapshot!(to_dot(&sexp), @r#"
        digraph sexp {
          n0 [shape=circle, label="()"];
          n1 [shape=box, label="status"];
          n0 -> n1;
          n2 [shape=circle, label="()"];
          n0 -> n2;
          n3 [shape=box, label="user"];
          n2 -> n3;
          n4 [shape=box, label="1"];
          n2 -> n4;
          n5 [shape=box, label="2"];
          n2 -> n5;
          n6 [shape=box, label="\"db 1\""];
          n0 -> n6;
          n7 [shape=box, label="'x"];
          n0 -> n7;
        }
        "#);

        assert_snapshot!(to_dot(&Sexp::string(r"a\b")), @r#"
        digraph sexp {
          n0 [shape=box, label="\"a\\\\b\""];
        }
        "#);
    }

    #[test]
    fn test_deep_nesting() {
        let depth = 1000;
        let text = format!("{}{}", "(".repeat(depth), ")".repeat(depth));
        let sexp = parse_one(&text).unwrap();
        assert_eq!(to_string_mach(&sexp), text);

        let dot = to_dot(&sexp);
        assert_eq!(dot.matches(" -> ").count(), depth - 1);
        assert!(dot.contains(&format!("n{} -> n{};", depth - 2, depth - 1)));
    }
}
