//! A small s-expression parser.
//!
//! A document is a run of top-level lists, each starting with a tag:
//!
//! ```
//! let status = sfsexp::parse("(cpuinfo (user 1) (system 1))(avenrun (1))")?;
//! assert_eq!(status.len(), 2);
//! assert_eq!(status["avenrun"][0].as_list().map(|l| l.len()), Some(1));
//! # Ok::<(), sfsexp::Error>(())
//! ```

// Nested `if`s inside an `else` often mirror a case split better than
// `else if` does.
#![allow(clippy::collapsible_else_if)]
// `len() == 0` reads fine for things that aren't really collections.
#![allow(clippy::len_zero)]

mod atom;
pub mod de;
pub mod error;
pub mod framing;
pub mod input;
pub mod mapping;
pub mod parser;
pub mod ser;
pub mod sexp;
pub mod stream;
mod token_writer;
pub mod tokenizer;
pub mod writer;

pub use de::{from_mapping, from_sexp, from_str};
pub use error::{Error, Result, SyntaxError};
pub use mapping::{DuplicateKeys, Mapping};
pub use parser::{parse, parse_one, parse_sexps, NumberPolicy, ParseOptions, Parser};
pub use ser::to_sexp;
pub use sexp::{Number, Sexp};
pub use stream::StreamParser;
pub use writer::{to_dot, to_string, to_string_mach, to_writer, to_writer_mach, Style};
