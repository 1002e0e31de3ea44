use tracing::trace;

use crate::error::{Error, Result};
use crate::input::InputRef;
use crate::parser::{NumberPolicy, ParseOptions, TreeBuilder};
use crate::sexp::Sexp;
use crate::tokenizer::RawTokenizer;

/// A parser that is handed its input a piece at a time, e.g. as it arrives
/// from a socket, and picks up where it left off on the next piece.
///
/// ```
/// use sfsexp::StreamParser;
///
/// let mut parser = StreamParser::new();
/// assert!(parser.feed(b"(avenrun (0.5").unwrap().is_empty());
/// let done = parser.feed(b" 0.25))").unwrap();
/// assert_eq!(done.len(), 1);
/// assert!(parser.finish().unwrap().is_empty());
/// ```
pub struct StreamParser {
    tokenizer: RawTokenizer,
    builder: TreeBuilder<'static>,
    numbers: NumberPolicy,
    // Once a chunk fails, every later call reports the same error.
    failure: Option<Error>,
}

impl Default for StreamParser {
    fn default() -> StreamParser {
        StreamParser::new()
    }
}

impl StreamParser {
    pub fn new() -> StreamParser {
        StreamParser::with_options(&ParseOptions::default())
    }

    /// The number policy and depth limit apply; a stream has no top-level
    /// mapping.
    pub fn with_options(options: &ParseOptions) -> StreamParser {
        StreamParser {
            tokenizer: RawTokenizer::new(),
            builder: TreeBuilder::new(options.max_depth),
            numbers: options.numbers,
            failure: None,
        }
    }

    /// Consumes `chunk` and returns every top-level expression it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Sexp<'static>>> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        self.tokenizer.process_more_data(chunk);
        let result = self.drain(chunk);
        if let Err(err) = &result {
            self.failure = Some(err.clone());
        }
        result
    }

    /// Signals end of input. Fails if an expression was left incomplete.
    pub fn finish(mut self) -> Result<Vec<Sexp<'static>>> {
        if let Some(err) = self.failure {
            return Err(err);
        }

        self.tokenizer.eof();
        let completed = self.drain(&[])?;
        self.builder.finish()?;
        Ok(completed)
    }

    /// Number of lists currently open.
    pub fn depth(&self) -> usize {
        self.builder.depth()
    }

    fn drain(&mut self, chunk: &[u8]) -> Result<Vec<Sexp<'static>>> {
        let mut completed = vec![];

        while let Some((offset, token)) = self.tokenizer.next_token(InputRef::Transient(chunk))? {
            if let Some((start, mut sexp)) = self.builder.push(offset, token)? {
                if self.numbers == NumberPolicy::Infer {
                    sexp.infer_numbers();
                }
                trace!(offset = start, "completed expression");
                completed.push(sexp);
            }
        }

        Ok(completed)
    }
}
