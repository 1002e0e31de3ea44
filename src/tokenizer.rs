use std::borrow::Cow;
use std::collections::VecDeque;
use std::ops::Range;

use crate::error::{Error, Result, SyntaxError};
use crate::input::{Input, InputChunk, InputRef};

#[derive(Clone, Debug, PartialEq)]
pub enum Token<'de> {
    LeftParen,
    Atom(AtomKind, Cow<'de, str>),
    RightParen,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AtomKind {
    /// `abc`
    Bare,
    /// `"a b c"`, with escapes already decoded.
    DoubleQuoted,
    /// `'abc` or `'(a b c)`, kept verbatim without the leading quote.
    SingleQuoted,
}

#[derive(Debug)]
enum RawTokenRefData {
    Range(Range<usize>),
    Scratch,
}

#[derive(Debug)]
enum RawTokenRef {
    LeftParen,
    RightParen,
    Atom(RawTokenRefData, AtomKind),
}

#[derive(Debug)]
struct PendingToken {
    offset: usize,
    token: RawTokenRef,
}

// Rules:
// - Whitespace: ' ', '\t', '\n', '\r', '\x0c'
// - Parentheses: '(' and ')'
// - Bare atoms run until whitespace or a parenthesis. A '"' or '\'' inside a
//   bare atom is just another character.
// - Double-quoted atoms:
//   - Start with '"' at a token boundary, end at the next unescaped '"'
//   - Escapes: \" \\ \n \t \r; a backslash followed by anything else is kept
//     as a literal backslash and then that character
// - Single-quoted atoms: '\'' at a token boundary followed by
//   - '(' : a balanced form, kept verbatim. Parens inside double quotes in
//     the form don't count towards the balance.
//   - '"' : an ordinary double-quoted atom
//   - anything else that can start a bare atom: a bare atom
//   A quote followed by whitespace, ')' or end of input is an error.

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum TokenizationState {
    Start,
    InBareAtom,
    InStringAtom,
    InStringAtomEscape,
    AfterQuote,
    InQuotedForm,
    InQuotedFormString,
    InQuotedFormStringEscape,
}

/// Push-driven half of the tokenizer: feed it chunks of bytes and pop tokens
/// out. Tokens that lie entirely in the most recent chunk are stored as
/// ranges into it, so all pending tokens must be popped before the next chunk
/// is processed.
pub(crate) struct RawTokenizer {
    // None when done tokenizing, either because of EOF or an error.
    state: Option<TokenizationState>,
    scratch_buffer_for_a_previous_token: Vec<u8>,
    scratch_buffer_for_current_token: Vec<u8>,
    using_scratch_buffer_for_current_token: bool,
    pending_tokens: VecDeque<Result<PendingToken>>,
    kind_of_current_token: AtomKind,
    quoted_form_depth: usize,
    // Relative to the chunk being processed.
    start_of_current_token: usize,
    offset_of_current_token: usize,
    offset_of_current_chunk: usize,
}

macro_rules! whitespace {
    () => {
        b' ' | b'\n' | b'\t' | b'\r' | b'\x0c'
    };
}

impl RawTokenizer {
    pub(crate) fn new() -> RawTokenizer {
        RawTokenizer {
            state: Some(TokenizationState::Start),
            scratch_buffer_for_a_previous_token: vec![],
            scratch_buffer_for_current_token: vec![],
            using_scratch_buffer_for_current_token: false,
            pending_tokens: VecDeque::new(),
            kind_of_current_token: AtomKind::Bare,
            quoted_form_depth: 0,
            start_of_current_token: 0,
            offset_of_current_token: 0,
            offset_of_current_chunk: 0,
        }
    }

    pub(crate) fn need_more_data_to_produce_tokens(&self) -> bool {
        self.pending_tokens.is_empty() && self.state.is_some()
    }

    fn push_token(&mut self, pos: usize, token: RawTokenRef) {
        self.pending_tokens.push_back(Ok(PendingToken {
            offset: self.offset_of_current_chunk + pos,
            token,
        }));
    }

    fn fail(&mut self, kind: SyntaxError, offset: usize) {
        self.pending_tokens.push_back(Err(Error::syntax(kind, offset)));
        self.state = None;
    }

    fn start_new_token(&mut self, pos: usize, kind: AtomKind) {
        self.using_scratch_buffer_for_current_token = false;
        self.start_of_current_token = pos;
        self.offset_of_current_token = self.offset_of_current_chunk + pos;
        self.kind_of_current_token = kind;
    }

    /// Like `start_new_token`, but the token is reported at the position of
    /// the quote that preceded it.
    fn start_token_after_quote(&mut self, pos: usize, kind: AtomKind) {
        let quote_offset = self.offset_of_current_token;
        self.start_new_token(pos, kind);
        self.offset_of_current_token = quote_offset;
    }

    fn copy_partial_token_to_scratch_buffer(&mut self, buffer: &[u8]) {
        let partial_token = &buffer[self.start_of_current_token..];
        if !self.using_scratch_buffer_for_current_token {
            self.scratch_buffer_for_current_token.clear();
            self.using_scratch_buffer_for_current_token = true;
        }
        self.scratch_buffer_for_current_token
            .extend_from_slice(partial_token);
    }

    fn finish_token(&mut self, ends_before: usize, buffer: &[u8]) {
        let range = self.start_of_current_token..ends_before;
        let raw_token_ref_data = if self.using_scratch_buffer_for_current_token {
            let partial_token = &buffer[range];
            self.scratch_buffer_for_current_token
                .extend_from_slice(partial_token);
            self.complete_token_in_scratch_buffer();
            RawTokenRefData::Scratch
        } else {
            RawTokenRefData::Range(range)
        };

        self.pending_tokens.push_back(Ok(PendingToken {
            offset: self.offset_of_current_token,
            token: RawTokenRef::Atom(raw_token_ref_data, self.kind_of_current_token),
        }));
    }

    fn complete_token_in_scratch_buffer(&mut self) {
        // The finished token's bytes move to the other buffer so the next
        // token can start filling this one.
        std::mem::swap(
            &mut self.scratch_buffer_for_a_previous_token,
            &mut self.scratch_buffer_for_current_token,
        );
        self.scratch_buffer_for_current_token.clear();
    }

    pub(crate) fn process_more_data(&mut self, buffer: &[u8]) {
        use TokenizationState::*;

        if buffer.is_empty() {
            return;
        }

        let Some(mut state) = self.state else {
            return;
        };

        self.start_of_current_token = 0;

        for (pos, ch) in buffer.iter().enumerate() {
            state = match state {
                Start => match *ch {
                    whitespace!() => Start,
                    b'(' => {
                        self.push_token(pos, RawTokenRef::LeftParen);
                        Start
                    }
                    b')' => {
                        self.push_token(pos, RawTokenRef::RightParen);
                        Start
                    }
                    b'"' => {
                        self.start_new_token(pos, AtomKind::DoubleQuoted);
                        InStringAtom
                    }
                    b'\'' => {
                        self.offset_of_current_token = self.offset_of_current_chunk + pos;
                        AfterQuote
                    }
                    _ => {
                        self.start_new_token(pos, AtomKind::Bare);
                        InBareAtom
                    }
                },
                InBareAtom => match *ch {
                    whitespace!() => {
                        self.finish_token(pos, buffer);
                        Start
                    }
                    b'(' => {
                        self.finish_token(pos, buffer);
                        self.push_token(pos, RawTokenRef::LeftParen);
                        Start
                    }
                    b')' => {
                        self.finish_token(pos, buffer);
                        self.push_token(pos, RawTokenRef::RightParen);
                        Start
                    }
                    _ => InBareAtom,
                },
                InStringAtom => match *ch {
                    b'"' => {
                        self.finish_token(pos + 1, buffer);
                        Start
                    }
                    b'\\' => InStringAtomEscape,
                    _ => InStringAtom,
                },
                InStringAtomEscape => InStringAtom,
                AfterQuote => match *ch {
                    whitespace!() | b')' => {
                        let offset = self.offset_of_current_token;
                        self.fail(SyntaxError::DanglingQuote, offset);
                        return;
                    }
                    b'(' => {
                        self.start_token_after_quote(pos, AtomKind::SingleQuoted);
                        self.quoted_form_depth = 1;
                        InQuotedForm
                    }
                    b'"' => {
                        self.start_token_after_quote(pos, AtomKind::DoubleQuoted);
                        InStringAtom
                    }
                    _ => {
                        self.start_token_after_quote(pos, AtomKind::SingleQuoted);
                        InBareAtom
                    }
                },
                InQuotedForm => match *ch {
                    b'(' => {
                        self.quoted_form_depth += 1;
                        InQuotedForm
                    }
                    b')' => {
                        self.quoted_form_depth -= 1;
                        if self.quoted_form_depth == 0 {
                            self.finish_token(pos + 1, buffer);
                            Start
                        } else {
                            InQuotedForm
                        }
                    }
                    b'"' => InQuotedFormString,
                    _ => InQuotedForm,
                },
                InQuotedFormString => match *ch {
                    b'"' => InQuotedForm,
                    b'\\' => InQuotedFormStringEscape,
                    _ => InQuotedFormString,
                },
                InQuotedFormStringEscape => InQuotedFormString,
            };
        }

        // Save the partial token; the next chunk overwrites this one.
        if !matches!(state, Start | AfterQuote) {
            self.copy_partial_token_to_scratch_buffer(buffer);
        }

        self.state = Some(state);
        self.offset_of_current_chunk += buffer.len();
    }

    pub(crate) fn eof(&mut self) {
        use TokenizationState::*;

        let Some(state) = self.state.take() else {
            return;
        };

        let offset = self.offset_of_current_token;
        match state {
            Start => (),
            InBareAtom => {
                // The whole token is in the scratch buffer by now.
                self.start_of_current_token = 0;
                self.finish_token(0, &[]);
            }
            InStringAtom | InStringAtomEscape => self.fail(SyntaxError::UnterminatedString, offset),
            AfterQuote => self.fail(SyntaxError::DanglingQuote, offset),
            InQuotedForm | InQuotedFormString | InQuotedFormStringEscape => {
                self.fail(SyntaxError::UnterminatedQuote, offset)
            }
        }
    }

    /// Pops the next pending token. `last_chunk` must be the data most
    /// recently passed to `process_more_data`.
    pub(crate) fn next_token<'de>(
        &mut self,
        last_chunk: InputRef<'de, '_>,
    ) -> Result<Option<(usize, Token<'de>)>> {
        let Some(pending) = self.pending_tokens.pop_front() else {
            return Ok(None);
        };

        let PendingToken { offset, token } = pending?;
        let token = match token {
            RawTokenRef::LeftParen => Token::LeftParen,
            RawTokenRef::RightParen => Token::RightParen,
            RawTokenRef::Atom(data, kind) => {
                let raw = match data {
                    RawTokenRefData::Range(range) => last_chunk.index(range).into_cow(),
                    RawTokenRefData::Scratch => {
                        Cow::Owned(std::mem::take(&mut self.scratch_buffer_for_a_previous_token))
                    }
                };
                atom_from_raw(raw, kind, offset)?
            }
        };

        Ok(Some((offset, token)))
    }
}

fn atom_from_raw(raw: Cow<'_, [u8]>, kind: AtomKind, offset: usize) -> Result<Token<'_>> {
    let invalid_utf8 = |_| Error::syntax(SyntaxError::InvalidUtf8, offset);
    let text = match raw {
        Cow::Borrowed(bytes) => Cow::Borrowed(std::str::from_utf8(bytes).map_err(invalid_utf8)?),
        Cow::Owned(bytes) => Cow::Owned(
            String::from_utf8(bytes).map_err(|err| invalid_utf8(err.utf8_error()))?,
        ),
    };

    let text = match kind {
        AtomKind::DoubleQuoted => unquote(text),
        AtomKind::Bare | AtomKind::SingleQuoted => text,
    };

    Ok(Token::Atom(kind, text))
}

/// Strips the surrounding double quotes and decodes escapes. The tokenizer
/// guarantees the text starts and ends with `"`.
fn unquote(quoted: Cow<'_, str>) -> Cow<'_, str> {
    match quoted {
        Cow::Borrowed(s) => {
            let inner = &s[1..s.len() - 1];
            if inner.contains('\\') {
                Cow::Owned(unescape(inner))
            } else {
                Cow::Borrowed(inner)
            }
        }
        Cow::Owned(s) => Cow::Owned(unescape(&s[1..s.len() - 1])),
    }
}

pub(crate) fn unescape(s: &str) -> String {
    let mut unescaped = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            unescaped.push(ch);
            continue;
        }

        match chars.next() {
            Some('"') => unescaped.push('"'),
            Some('\\') => unescaped.push('\\'),
            Some('n') => unescaped.push('\n'),
            Some('t') => unescaped.push('\t'),
            Some('r') => unescaped.push('\r'),
            Some(other) => {
                unescaped.push('\\');
                unescaped.push(other);
            }
            None => unescaped.push('\\'),
        }
    }

    unescaped
}

/// Pull-driven tokenizer over an `Input`.
pub struct Tokenizer<I> {
    input: I,
    raw_tokenizer: RawTokenizer,
    offset_of_last_token: usize,
}

impl<I> Tokenizer<I> {
    pub fn new(input: I) -> Tokenizer<I> {
        Tokenizer {
            input,
            raw_tokenizer: RawTokenizer::new(),
            offset_of_last_token: 0,
        }
    }

    /// Byte offset of the most recently returned token.
    pub fn offset(&self) -> usize {
        self.offset_of_last_token
    }
}

impl<'de, I> Tokenizer<I>
where
    I: Input<'de>,
{
    pub fn next_token(&mut self) -> Result<Option<Token<'de>>> {
        while self.raw_tokenizer.need_more_data_to_produce_tokens() {
            match self.input.next_chunk()? {
                InputChunk::Data(chunk) => self.raw_tokenizer.process_more_data(chunk),
                InputChunk::Eof => self.raw_tokenizer.eof(),
            }
        }

        match self.raw_tokenizer.next_token(self.input.last_chunk())? {
            None => Ok(None),
            Some((offset, token)) => {
                self.offset_of_last_token = offset;
                Ok(Some(token))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::tests::ExplicitChunksInput;
    use crate::input::SliceInput;

    use bstr::ByteSlice;
    use insta::assert_snapshot;

    use std::fmt::Write;

    fn format_token(token: Token<'_>) -> String {
        match token {
            Token::LeftParen => "LeftParen: (".to_owned(),
            Token::RightParen => "RightParen: )".to_owned(),
            Token::Atom(kind, text) => {
                let ref_kind = match text {
                    Cow::Borrowed(_) => "borrowed",
                    Cow::Owned(_) => "owned",
                };
                format!("{:?}: {:?} ({})", kind, text, ref_kind)
            }
        }
    }

    fn drain<'de, I: Input<'de>>(mut tokenizer: Tokenizer<I>) -> String {
        let mut output = String::new();
        let o = &mut output;

        loop {
            let _ = match tokenizer.next_token() {
                Ok(None) => break,
                Ok(Some(token)) => writeln!(o, "{}", format_token(token)),
                Err(err) => writeln!(o, "ERROR: {:?}", err),
            };
        }

        output
    }

    fn tokenize_str(buffer: &[u8]) -> String {
        drain(Tokenizer::new(SliceInput::new(buffer)))
    }

    fn tokenize_fragments(buffers: &[&'static [u8]]) -> String {
        drain(Tokenizer::new(ExplicitChunksInput::new(buffers)))
    }

    #[test]
    fn test_basics() {
        assert_snapshot!(tokenize_str(b"a bc 123 "), @r#"
        Bare: "a" (borrowed)
        Bare: "bc" (borrowed)
        Bare: "123" (borrowed)
        "#);

        assert_snapshot!(tokenize_str(b"(cpuinfo (user 1))"), @r#"
        LeftParen: (
        Bare: "cpuinfo" (borrowed)
        LeftParen: (
        Bare: "user" (borrowed)
        Bare: "1" (borrowed)
        RightParen: )
        RightParen: )
        "#);

        // Tokenizer does not enforce a valid sexp.
        assert_snapshot!(tokenize_str(b") ) ( ("), @r"
        RightParen: )
        RightParen: )
        LeftParen: (
        LeftParen: (
        ");
    }

    #[test]
    fn test_whitespace() {
        assert_snapshot!(tokenize_str(b"\ta\r\nb\x0cc\n"), @r#"
        Bare: "a" (borrowed)
        Bare: "b" (borrowed)
        Bare: "c" (borrowed)
        "#);
        assert_snapshot!(tokenize_str(b" \r\n\t "), @"");
    }

    #[test]
    fn test_quotes_inside_bare_atoms() {
        assert_snapshot!(tokenize_str(br#"a"b" c'd 0x1f /dev/hda1"#), @r#"
        Bare: "a\"b\"" (borrowed)
        Bare: "c'd" (borrowed)
        Bare: "0x1f" (borrowed)
        Bare: "/dev/hda1" (borrowed)
        "#);
    }

    #[test]
    fn test_double_quoted_atoms() {
        assert_snapshot!(tokenize_str(br#""with" "a b" """#), @r#"
        DoubleQuoted: "with" (borrowed)
        DoubleQuoted: "a b" (borrowed)
        DoubleQuoted: "" (borrowed)
        "#);

        assert_snapshot!(tokenize_str(br#"("(x)")"#), @r#"
        LeftParen: (
        DoubleQuoted: "(x)" (borrowed)
        RightParen: )
        "#);

        assert_snapshot!(tokenize_str(br#""a\"b" "c\\d" "\n\t\r" "\q""#), @r#"
        DoubleQuoted: "a\"b" (owned)
        DoubleQuoted: "c\\d" (owned)
        DoubleQuoted: "\n\t\r" (owned)
        DoubleQuoted: "\\q" (owned)
        "#);
    }

    #[test]
    fn test_single_quoted_atoms() {
        assert_snapshot!(
            tokenize_str(br#"(i am the test '(expression) "with" 'weird atoms)"#),
            @r#"
        LeftParen: (
        Bare: "i" (borrowed)
        Bare: "am" (borrowed)
        Bare: "the" (borrowed)
        Bare: "test" (borrowed)
        SingleQuoted: "(expression)" (borrowed)
        DoubleQuoted: "with" (borrowed)
        SingleQuoted: "weird" (borrowed)
        Bare: "atoms" (borrowed)
        RightParen: )
        "#);

        assert_snapshot!(tokenize_str(br#"'(a (b ")") c) '"x y""#), @r#"
        SingleQuoted: "(a (b \")\") c)" (borrowed)
        DoubleQuoted: "x y" (borrowed)
        "#);
    }

    #[test]
    fn test_errors() {
        assert_snapshot!(tokenize_str(br#"a "bc"#), @r#"
        Bare: "a" (borrowed)
        ERROR: Syntax { kind: UnterminatedString, offset: 2 }
        "#);
        assert_snapshot!(tokenize_str(br#""bc\""#), @"ERROR: Syntax { kind: UnterminatedString, offset: 0 }");
        assert_snapshot!(tokenize_str(b"(a ' b)"), @r#"
        LeftParen: (
        Bare: "a" (borrowed)
        ERROR: Syntax { kind: DanglingQuote, offset: 3 }
        "#);
    }

    #[test]
    fn test_quote_errors() {
        assert_snapshot!(tokenize_str(b"'"), @"ERROR: Syntax { kind: DanglingQuote, offset: 0 }");
        assert_snapshot!(tokenize_str(b"(')"), @r"
        LeftParen: (
        ERROR: Syntax { kind: DanglingQuote, offset: 1 }
        ");
        assert_snapshot!(tokenize_str(b"x '(a (b)"), @r#"
        Bare: "x" (borrowed)
        ERROR: Syntax { kind: UnterminatedQuote, offset: 2 }
        "#);
    }

    #[test]
    fn test_invalid_utf8() {
        assert_snapshot!(tokenize_str(b"ok \xff\xfe"), @r#"
        Bare: "ok" (borrowed)
        ERROR: Syntax { kind: InvalidUtf8, offset: 3 }
        "#);
    }

    #[test]
    fn test_partial_tokens() {
        assert_snapshot!(
            tokenize_fragments(&[b"abc", b"", b"def", b"ghi "]),
            @r#"Bare: "abcdefghi" (owned)"#,
        );

        assert_snapshot!(
            tokenize_fragments(&[b"\"ab", b"c d", b"\\\"\""]),
            @r#"DoubleQuoted: "abc d\"" (owned)"#,
        );

        assert_snapshot!(
            tokenize_fragments(&[b"'", b"(a", b" b)", b" 'c", b"d"]),
            @r#"
        SingleQuoted: "(a b)" (owned)
        SingleQuoted: "cd" (owned)
        "#,
        );
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        // "αβ" split in the middle of the first character.
        assert_snapshot!(
            tokenize_fragments(&[b"(\xce", b"\xb1\xce\xb2)"]),
            @r#"
        LeftParen: (
        Bare: "αβ" (owned)
        RightParen: )
        "#,
        );
    }

    #[test]
    fn test_offsets() {
        let mut tokenizer = Tokenizer::new(ExplicitChunksInput::new(&[b"(ab", b"c  'd)"]));
        let mut offsets = vec![];
        while let Ok(Some(_)) = tokenizer.next_token() {
            offsets.push(tokenizer.offset());
        }
        assert_eq!(offsets, vec![0, 1, 6, 8]);
    }

    #[test]
    fn test_eof() {
        assert_snapshot!(tokenize_fragments(&[b"a"]), @r#"Bare: "a" (owned)"#);
        assert_snapshot!(tokenize_fragments(&[b"(a"]), @r#"
        LeftParen: (
        Bare: "a" (owned)
        "#);
        assert_snapshot!(tokenize_fragments(&[b"\"a"]), @"ERROR: Syntax { kind: UnterminatedString, offset: 0 }");
        assert_snapshot!(tokenize_fragments(&[]), @"");
    }

    #[test]
    fn test_unescape() {
        let u = |bytes: &[u8]| unescape(bytes.to_str().unwrap_or_default());
        assert_eq!(u(br#"a\"b"#), "a\"b");
        assert_eq!(u(br"\\\\"), r"\\");
        assert_eq!(u(br#"\n\t\r"#), "\n\t\r");
        assert_eq!(u(br#"\x"#), "\\x");
        assert_eq!(u(br#"trailing\"#), "trailing\\");
    }
}
