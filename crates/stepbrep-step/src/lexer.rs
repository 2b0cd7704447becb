//! Part 21 (STEP physical file) lexer.
//!
//! Splits ISO 10303-21 exchange text into tokens: keywords, instance names
//! (`#12`), strings, reals, integers, enumerations (`.T.`), binaries and the
//! punctuation `( ) , ; = * $`. Comments (`/* ... */`) and whitespace are
//! skipped.

use crate::error::StepError;

/// A token in a STEP file.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Keyword or type name, upper-cased.
    Keyword(String),
    /// Instance name (`#123` becomes `EntityRef(123)`).
    EntityRef(u64),
    /// String literal (contents without quotes, `''` unescaped).
    String(String),
    /// Binary literal (hex digits without quotes).
    Binary(String),
    /// Real number.
    Real(f64),
    /// Integer number.
    Integer(i64),
    /// Enumeration (`.TRUE.` becomes `Enum("TRUE")`).
    Enum(String),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `=`
    Equals,
    /// `*` (derived value).
    Asterisk,
    /// `$` (unset value).
    Dollar,
}

/// Position in the source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub col: usize,
}

/// A token with the position where it starts.
#[derive(Debug, Clone)]
pub struct SpannedToken {
    /// The token.
    pub token: Token,
    /// Start position.
    pub pos: Position,
}

/// Lexer for Part 21 text.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over raw bytes.
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Tokenize the entire input.
    pub fn tokenize(&mut self) -> Result<Vec<SpannedToken>, StepError> {
        let mut tokens = Vec::new();
        while let Some(tok) = self.next_token()? {
            tokens.push(tok);
        }
        Ok(tokens)
    }

    /// The next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<SpannedToken>, StepError> {
        self.skip_whitespace_and_comments()?;

        let Some(ch) = self.peek() else {
            return Ok(None);
        };
        let start = self.position();

        let token = match ch {
            b'(' => self.punct(Token::LParen),
            b')' => self.punct(Token::RParen),
            b',' => self.punct(Token::Comma),
            b';' => self.punct(Token::Semicolon),
            b'=' => self.punct(Token::Equals),
            b'*' => self.punct(Token::Asterisk),
            b'$' => self.punct(Token::Dollar),
            b'#' => self.read_entity_ref(start)?,
            b'\'' => self.read_string(start)?,
            b'"' => self.read_binary(start)?,
            b'.' => self.read_enum(start)?,
            b'-' | b'+' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit() || c == b'.') => {
                self.read_number(start)?
            }
            b'0'..=b'9' => self.read_number(start)?,
            b'A'..=b'Z' | b'a'..=b'z' | b'_' | b'!' => self.read_keyword(),
            _ => {
                return Err(StepError::lexer(
                    start.line,
                    start.col,
                    format!("unexpected character: '{}'", ch as char),
                ));
            }
        };

        Ok(Some(SpannedToken { token, pos: start }))
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            col: self.col,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn punct(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    /// Consume bytes while `pred` holds and return them as text.
    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> String {
        let begin = self.pos;
        while self.peek().is_some_and(&pred) {
            self.advance();
        }
        String::from_utf8_lossy(&self.input[begin..self.pos]).into_owned()
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), StepError> {
        loop {
            while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
                self.advance();
            }
            if self.peek() == Some(b'/') && self.peek_at(1) == Some(b'*') {
                let start = self.position();
                self.advance();
                self.advance();
                loop {
                    match (self.peek(), self.peek_at(1)) {
                        (Some(b'*'), Some(b'/')) => {
                            self.advance();
                            self.advance();
                            break;
                        }
                        (Some(_), _) => {
                            self.advance();
                        }
                        (None, _) => {
                            return Err(StepError::lexer(
                                start.line,
                                start.col,
                                "unterminated comment",
                            ));
                        }
                    }
                }
                continue;
            }
            return Ok(());
        }
    }

    fn read_entity_ref(&mut self, start: Position) -> Result<Token, StepError> {
        self.advance();
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Err(StepError::lexer(
                start.line,
                start.col,
                "expected digits after '#'",
            ));
        }
        let id = digits.parse().map_err(|_| {
            StepError::lexer(start.line, start.col, format!("invalid entity ID: {digits}"))
        })?;
        Ok(Token::EntityRef(id))
    }

    fn read_string(&mut self, start: Position) -> Result<Token, StepError> {
        self.advance();
        let mut content = Vec::new();
        loop {
            match self.advance() {
                None => {
                    return Err(StepError::lexer(
                        start.line,
                        start.col,
                        "unterminated string",
                    ));
                }
                Some(b'\'') if self.peek() == Some(b'\'') => {
                    self.advance();
                    content.push(b'\'');
                }
                Some(b'\'') => break,
                Some(ch) => content.push(ch),
            }
        }
        Ok(Token::String(String::from_utf8_lossy(&content).into_owned()))
    }

    fn read_binary(&mut self, start: Position) -> Result<Token, StepError> {
        self.advance();
        let hex = self.take_while(|c| c.is_ascii_hexdigit());
        if self.advance() != Some(b'"') {
            return Err(StepError::lexer(
                start.line,
                start.col,
                "unterminated binary literal",
            ));
        }
        Ok(Token::Binary(hex))
    }

    fn read_enum(&mut self, start: Position) -> Result<Token, StepError> {
        self.advance();
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_');
        if self.advance() != Some(b'.') {
            return Err(StepError::lexer(
                start.line,
                start.col,
                "unterminated enumeration",
            ));
        }
        if name.is_empty() {
            return Err(StepError::lexer(start.line, start.col, "empty enumeration"));
        }
        Ok(Token::Enum(name.to_uppercase()))
    }

    /// Integers and reals. A `.` directly after the integer part always
    /// belongs to the number, so `10.` and `0.E+000` lex as reals.
    fn read_number(&mut self, start: Position) -> Result<Token, StepError> {
        let mut text = String::new();
        if let Some(sign @ (b'-' | b'+')) = self.peek() {
            self.advance();
            text.push(sign as char);
        }
        text.push_str(&self.take_while(|c| c.is_ascii_digit()));

        let mut is_real = false;
        if self.peek() == Some(b'.') {
            is_real = true;
            self.advance();
            text.push('.');
            text.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }
        if let Some(b'E' | b'e') = self.peek() {
            is_real = true;
            self.advance();
            text.push('E');
            if let Some(sign @ (b'-' | b'+')) = self.peek() {
                self.advance();
                text.push(sign as char);
            }
            text.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }

        if is_real {
            // Rust's parser rejects a bare trailing `.` before an exponent.
            let normalized = text.replace(".E", ".0E");
            let normalized = normalized.strip_suffix('.').map_or(normalized.clone(), |s| format!("{s}.0"));
            normalized.parse().map(Token::Real).map_err(|_| {
                StepError::lexer(start.line, start.col, format!("invalid real number: {text}"))
            })
        } else {
            text.parse().map(Token::Integer).map_err(|_| {
                StepError::lexer(start.line, start.col, format!("invalid integer: {text}"))
            })
        }
    }

    fn read_keyword(&mut self) -> Token {
        // User-defined keywords carry a leading `!`; header keywords contain `-`.
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'-' || c == b'!');
        Token::Keyword(name.to_uppercase())
    }
}
