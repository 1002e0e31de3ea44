use std::io;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result, SyntaxError};
use crate::input::{Input, ReadInput, SliceInput, DEFAULT_CHUNK_SIZE};
use crate::mapping::{DuplicateKeys, Mapping};
use crate::sexp::Sexp;
use crate::tokenizer::{Token, Tokenizer};

/// Whether bare atoms that look like numbers become `Sexp::Number`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberPolicy {
    #[default]
    Infer,
    Text,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    pub numbers: NumberPolicy,
    pub duplicate_keys: DuplicateKeys,
    /// Size of the chunks read from the input. Zero is treated as one.
    pub chunk_size: usize,
    /// Deepest list nesting accepted before failing with
    /// `SyntaxError::TooDeep`. Trees are dropped, compared and deserialized
    /// recursively, so this bounds the stack those need.
    pub max_depth: usize,
}

pub const DEFAULT_MAX_DEPTH: usize = 1024;

impl Default for ParseOptions {
    fn default() -> ParseOptions {
        ParseOptions {
            numbers: NumberPolicy::default(),
            duplicate_keys: DuplicateKeys::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParseOptions {
    pub fn with_numbers(mut self, numbers: NumberPolicy) -> ParseOptions {
        self.numbers = numbers;
        self
    }

    pub fn with_duplicate_keys(mut self, duplicate_keys: DuplicateKeys) -> ParseOptions {
        self.duplicate_keys = duplicate_keys;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> ParseOptions {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> ParseOptions {
        self.max_depth = max_depth;
        self
    }
}

/// Assembles tokens into trees. Open lists live on an explicit stack; no
/// more than `max_depth` may be open at once.
#[derive(Debug)]
pub(crate) struct TreeBuilder<'de> {
    // Offset of each open paren, and the items collected so far.
    open: Vec<(usize, Vec<Sexp<'de>>)>,
    max_depth: usize,
}

impl<'de> TreeBuilder<'de> {
    pub(crate) fn new(max_depth: usize) -> TreeBuilder<'de> {
        TreeBuilder {
            open: vec![],
            max_depth,
        }
    }

    /// Returns a top-level expression and its starting offset once one is
    /// complete.
    pub(crate) fn push(
        &mut self,
        offset: usize,
        token: Token<'de>,
    ) -> Result<Option<(usize, Sexp<'de>)>> {
        match token {
            Token::LeftParen => {
                if self.open.len() >= self.max_depth {
                    return Err(Error::syntax(SyntaxError::TooDeep, offset));
                }
                self.open.push((offset, vec![]));
                Ok(None)
            }
            Token::RightParen => match self.open.pop() {
                None => Err(Error::syntax(SyntaxError::UnexpectedCloseParen, offset)),
                Some((start, items)) => Ok(self.complete(start, Sexp::List(items))),
            },
            Token::Atom(kind, text) => Ok(self.complete(offset, Sexp::from_atom(kind, text))),
        }
    }

    fn complete(&mut self, offset: usize, sexp: Sexp<'de>) -> Option<(usize, Sexp<'de>)> {
        match self.open.last_mut() {
            Some((_, items)) => {
                items.push(sexp);
                None
            }
            None => Some((offset, sexp)),
        }
    }

    /// Checks that every list was closed at end of input.
    pub(crate) fn finish(&self) -> Result<()> {
        match self.open.first() {
            Some((offset, _)) => Err(Error::syntax(SyntaxError::UnclosedList, *offset)),
            None => Ok(()),
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.open.len()
    }
}

/// Iterator over the top-level expressions of an input. Stops after the
/// first error.
pub struct Expressions<'de, I> {
    tokenizer: Tokenizer<I>,
    builder: TreeBuilder<'de>,
    numbers: NumberPolicy,
    done: bool,
}

impl<'de, I: Input<'de>> Expressions<'de, I> {
    /// Uses the number policy and depth limit of `options`.
    pub fn new(input: I, options: &ParseOptions) -> Expressions<'de, I> {
        Expressions {
            tokenizer: Tokenizer::new(input),
            builder: TreeBuilder::new(options.max_depth),
            numbers: options.numbers,
            done: false,
        }
    }

    /// Like `next`, but also returns the byte offset the expression
    /// started at.
    pub fn next_expression(&mut self) -> Result<Option<(usize, Sexp<'de>)>> {
        if self.done {
            return Ok(None);
        }

        let result = self.advance();
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }
        result
    }

    fn advance(&mut self) -> Result<Option<(usize, Sexp<'de>)>> {
        while let Some(token) = self.tokenizer.next_token()? {
            let offset = self.tokenizer.offset();
            if let Some((start, mut sexp)) = self.builder.push(offset, token)? {
                if self.numbers == NumberPolicy::Infer {
                    sexp.infer_numbers();
                }
                return Ok(Some((start, sexp)));
            }
        }

        self.builder.finish()?;
        Ok(None)
    }
}

impl<'de, I: Input<'de>> Iterator for Expressions<'de, I> {
    type Item = Result<Sexp<'de>>;

    fn next(&mut self) -> Option<Result<Sexp<'de>>> {
        self.next_expression()
            .transpose()
            .map(|result| result.map(|(_, sexp)| sexp))
    }
}

#[derive(Clone, Debug, Default)]
pub struct Parser {
    options: ParseOptions,
}

impl Parser {
    pub fn new(options: ParseOptions) -> Parser {
        Parser { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    fn chunk_size(&self) -> usize {
        self.options.chunk_size.max(1)
    }

    fn slice_input<'de>(&self, bytes: &'de [u8]) -> SliceInput<'de> {
        SliceInput::new_with_chunk_size(bytes, self.chunk_size())
    }

    /// Parses a document of top-level `(tag values...)` lists.
    pub fn parse<'de>(&self, text: &'de str) -> Result<Mapping<'de>> {
        self.parse_bytes(text.as_bytes())
    }

    pub fn parse_bytes<'de>(&self, bytes: &'de [u8]) -> Result<Mapping<'de>> {
        self.mapping_from(self.slice_input(bytes))
    }

    /// Reads a whole document from `reader`. Nothing is borrowed from the
    /// reader, so the result is owned.
    pub fn parse_reader<R: io::Read>(&self, reader: R) -> Result<Mapping<'static>> {
        self.mapping_from(ReadInput::new_with_chunk_size(reader, self.chunk_size()))
    }

    /// Every top-level expression, atoms included.
    pub fn parse_sexps<'de>(&self, text: &'de str) -> Result<Vec<Sexp<'de>>> {
        let sexps = self.expressions(text).collect::<Result<Vec<_>>>()?;
        if sexps.is_empty() {
            return Err(Error::EmptyInput);
        }
        Ok(sexps)
    }

    /// Exactly one expression.
    pub fn parse_one<'de>(&self, text: &'de str) -> Result<Sexp<'de>> {
        let mut expressions = self.expressions(text);
        let Some((_, sexp)) = expressions.next_expression()? else {
            return Err(Error::EmptyInput);
        };

        match expressions.next_expression()? {
            None => Ok(sexp),
            Some((offset, _)) => Err(Error::syntax(SyntaxError::TrailingInput, offset)),
        }
    }

    pub fn expressions<'de>(&self, text: &'de str) -> Expressions<'de, SliceInput<'de>> {
        Expressions::new(self.slice_input(text.as_bytes()), &self.options)
    }

    fn mapping_from<'de, I: Input<'de>>(&self, input: I) -> Result<Mapping<'de>> {
        // Tags are never numbers, so inference waits until the tag is split
        // off.
        let options = self.options.clone().with_numbers(NumberPolicy::Text);
        let mut expressions = Expressions::new(input, &options);
        let mut mapping = Mapping::new();

        while let Some((offset, sexp)) = expressions.next_expression()? {
            mapping.insert_top_level(offset, sexp, &self.options)?;
        }

        if mapping.is_empty() {
            return Err(Error::EmptyInput);
        }

        debug!(tags = mapping.len(), "parsed document");
        Ok(mapping)
    }
}

/// Parses with the default options: numbers inferred, later duplicate tags
/// win.
pub fn parse(text: &str) -> Result<Mapping<'_>> {
    Parser::default().parse(text)
}

pub fn parse_sexps(text: &str) -> Result<Vec<Sexp<'_>>> {
    Parser::default().parse_sexps(text)
}

pub fn parse_one(text: &str) -> Result<Sexp<'_>> {
    Parser::default().parse_one(text)
}
