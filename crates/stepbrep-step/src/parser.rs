//! Part 21 parser: builds the raw instance graph from tokens.
//!
//! The parser does not interpret entities. Each instance has an id and one
//! partial record (`#1=LINE(...)`) or several (`#1=(LENGTH_UNIT() SI_UNIT(...))`).
//! Arguments can nest (lists of lists, typed values).

use crate::error::StepError;
use crate::lexer::{Lexer, SpannedToken, Token};
use std::collections::HashMap;

/// A single argument value in a STEP record.
#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    /// Entity reference (`#123`).
    EntityRef(u64),
    /// String literal.
    String(String),
    /// Binary literal (hex digits).
    Binary(String),
    /// Real number.
    Real(f64),
    /// Integer number.
    Integer(i64),
    /// Enumeration (`.T.`).
    Enum(String),
    /// Aggregate (nested in parentheses).
    List(Vec<StepValue>),
    /// Derived value (`*`).
    Derived,
    /// Unset value (`$`).
    Null,
    /// Typed select value, e.g. `LENGTH_MEASURE(1.E-07)`.
    Typed {
        /// The defined type name.
        type_name: String,
        /// Arguments.
        args: Vec<StepValue>,
    },
}

impl StepValue {
    /// As an entity reference.
    pub fn as_entity_ref(&self) -> Option<u64> {
        match self {
            StepValue::EntityRef(id) => Some(*id),
            _ => None,
        }
    }

    /// As a real number (integers are widened).
    pub fn as_real(&self) -> Option<f64> {
        match self {
            StepValue::Real(v) => Some(*v),
            StepValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// As an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            StepValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// As a string.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            StepValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// As an enumeration literal.
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            StepValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// As an aggregate.
    pub fn as_list(&self) -> Option<&[StepValue]> {
        match self {
            StepValue::List(v) => Some(v),
            _ => None,
        }
    }

    /// `$`
    pub fn is_null(&self) -> bool {
        matches!(self, StepValue::Null)
    }

    /// `*`
    pub fn is_derived(&self) -> bool {
        matches!(self, StepValue::Derived)
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            StepValue::EntityRef(_) => "entity reference",
            StepValue::String(_) => "string",
            StepValue::Binary(_) => "binary",
            StepValue::Real(_) => "real",
            StepValue::Integer(_) => "integer",
            StepValue::Enum(_) => "enumeration",
            StepValue::List(_) => "list",
            StepValue::Derived => "derived value",
            StepValue::Null => "unset value",
            StepValue::Typed { .. } => "typed value",
        }
    }
}

/// One `TYPE(args)` group: the whole of a simple instance, or one
/// partial record of a complex instance.
#[derive(Debug, Clone)]
pub struct PartialRecord {
    /// Entity type name (e.g., `CARTESIAN_POINT`).
    pub type_name: String,
    /// Arguments in declaration order.
    pub args: Vec<StepValue>,
}

/// A parsed data-section instance.
#[derive(Debug, Clone)]
pub struct RawInstance {
    /// Instance id (from `#123`).
    pub id: u64,
    /// Partial records; exactly one for a simple instance.
    pub records: Vec<PartialRecord>,
    /// Whether the instance was written in the external (complex) mapping.
    pub complex: bool,
}

impl RawInstance {
    /// Type name of a simple instance, or the first partial of a complex one.
    pub fn type_name(&self) -> &str {
        self.records.first().map_or("", |r| r.type_name.as_str())
    }

    /// Whether any partial record carries `type_name`.
    pub fn has_record(&self, type_name: &str) -> bool {
        self.records.iter().any(|r| r.type_name == type_name)
    }
}

/// The parsed content of a STEP file.
#[derive(Debug, Clone)]
pub struct StepFile {
    /// Header section records (`FILE_DESCRIPTION`, `FILE_NAME`, `FILE_SCHEMA`).
    pub header: Vec<PartialRecord>,
    /// Data section instances, indexed by id.
    pub instances: HashMap<u64, RawInstance>,
}

impl StepFile {
    /// Instance by id.
    pub fn get(&self, id: u64) -> Option<&RawInstance> {
        self.instances.get(&id)
    }

    /// Instance by id, or [`StepError::MissingEntity`].
    pub fn require(&self, id: u64) -> Result<&RawInstance, StepError> {
        self.instances.get(&id).ok_or(StepError::MissingEntity(id))
    }

    /// Ids of simple instances of `type_name` and complex instances with a
    /// partial of that type, in ascending order.
    pub fn ids_of_type(&self, type_name: &str) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .instances
            .values()
            .filter(|inst| inst.has_record(type_name))
            .map(|inst| inst.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Schema names listed in `FILE_SCHEMA`, if present.
    pub fn schema_names(&self) -> Vec<&str> {
        self.header
            .iter()
            .filter(|r| r.type_name == "FILE_SCHEMA")
            .filter_map(|r| r.args.first()?.as_list())
            .flatten()
            .filter_map(StepValue::as_string)
            .collect()
    }
}

/// Parser for Part 21 STEP files.
pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    /// Id of the instance being parsed, for error messages.
    current: Option<u64>,
}

impl Parser {
    /// Parse a STEP file from bytes.
    pub fn parse(input: &[u8]) -> Result<StepFile, StepError> {
        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            current: None,
        };
        parser.parse_file()
    }

    fn parse_file(&mut self) -> Result<StepFile, StepError> {
        let mut header = Vec::new();
        let mut instances = HashMap::new();

        self.expect_keyword("ISO-10303-21")?;
        self.expect_token(&Token::Semicolon)?;

        while !self.is_at_end() {
            if self.check_keyword("HEADER") {
                self.advance();
                self.expect_token(&Token::Semicolon)?;
                header = self.parse_header_records()?;
                self.expect_keyword("ENDSEC")?;
                self.expect_token(&Token::Semicolon)?;
            } else if self.check_keyword("DATA") {
                self.advance();
                // DATA may carry a parameter list in edition 3 files.
                if self.check_token(&Token::LParen) {
                    self.parse_args()?;
                }
                self.expect_token(&Token::Semicolon)?;
                self.parse_data_section(&mut instances)?;
                self.expect_keyword("ENDSEC")?;
                self.expect_token(&Token::Semicolon)?;
            } else if self.check_keyword("END-ISO-10303-21") {
                self.advance();
                self.expect_token(&Token::Semicolon)?;
                break;
            } else {
                return Err(self.unexpected("section keyword"));
            }
        }

        Ok(StepFile { header, instances })
    }

    fn parse_header_records(&mut self) -> Result<Vec<PartialRecord>, StepError> {
        let mut records = Vec::new();
        while let Some(Token::Keyword(type_name)) = self.peek_token().cloned() {
            if type_name == "ENDSEC" {
                break;
            }
            self.advance();
            let args = self.parse_args()?;
            self.expect_token(&Token::Semicolon)?;
            records.push(PartialRecord { type_name, args });
        }
        Ok(records)
    }

    fn parse_data_section(
        &mut self,
        instances: &mut HashMap<u64, RawInstance>,
    ) -> Result<(), StepError> {
        while let Some(Token::EntityRef(id)) = self.peek_token().cloned() {
            self.advance();
            self.current = Some(id);
            self.expect_token(&Token::Equals)?;

            let (records, complex) = if self.check_token(&Token::LParen) {
                (self.parse_complex_records()?, true)
            } else {
                (vec![self.parse_record()?], false)
            };
            self.expect_token(&Token::Semicolon)?;

            if instances
                .insert(
                    id,
                    RawInstance {
                        id,
                        records,
                        complex,
                    },
                )
                .is_some()
            {
                return Err(StepError::parser(Some(id), "duplicate instance id"));
            }
        }
        self.current = None;
        Ok(())
    }

    /// `( A(..) B(..) ... )`
    fn parse_complex_records(&mut self) -> Result<Vec<PartialRecord>, StepError> {
        self.expect_token(&Token::LParen)?;
        let mut records = Vec::new();
        while !self.check_token(&Token::RParen) {
            records.push(self.parse_record()?);
        }
        self.expect_token(&Token::RParen)?;
        if records.is_empty() {
            return Err(StepError::parser(self.current, "empty complex instance"));
        }
        Ok(records)
    }

    fn parse_record(&mut self) -> Result<PartialRecord, StepError> {
        match self.peek_token().cloned() {
            Some(Token::Keyword(type_name)) => {
                self.advance();
                let args = self.parse_args()?;
                Ok(PartialRecord { type_name, args })
            }
            _ => Err(self.unexpected("type name")),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<StepValue>, StepError> {
        self.expect_token(&Token::LParen)?;
        let mut args = Vec::new();
        if !self.check_token(&Token::RParen) {
            args.push(self.parse_value()?);
            while self.check_token(&Token::Comma) {
                self.advance();
                args.push(self.parse_value()?);
            }
        }
        self.expect_token(&Token::RParen)?;
        Ok(args)
    }

    fn parse_value(&mut self) -> Result<StepValue, StepError> {
        let value = match self.peek_token().cloned() {
            Some(Token::EntityRef(id)) => StepValue::EntityRef(id),
            Some(Token::String(s)) => StepValue::String(s),
            Some(Token::Binary(s)) => StepValue::Binary(s),
            Some(Token::Real(v)) => StepValue::Real(v),
            Some(Token::Integer(v)) => StepValue::Integer(v),
            Some(Token::Enum(s)) => StepValue::Enum(s),
            Some(Token::Asterisk) => StepValue::Derived,
            Some(Token::Dollar) => StepValue::Null,
            Some(Token::LParen) => return self.parse_args().map(StepValue::List),
            Some(Token::Keyword(type_name)) => {
                self.advance();
                let args = self.parse_args()?;
                return Ok(StepValue::Typed { type_name, args });
            }
            _ => return Err(self.unexpected("value")),
        };
        self.advance();
        Ok(value)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check_token(&self, expected: &Token) -> bool {
        self.peek_token() == Some(expected)
    }

    fn check_keyword(&self, name: &str) -> bool {
        matches!(self.peek_token(), Some(Token::Keyword(k)) if k == name)
    }

    fn unexpected(&self, wanted: &str) -> StepError {
        let message = match self.tokens.get(self.pos) {
            Some(t) => format!(
                "expected {wanted}, got {:?} at line {}, column {}",
                t.token, t.pos.line, t.pos.col
            ),
            None => format!("expected {wanted}, got end of input"),
        };
        StepError::parser(self.current, message)
    }

    fn expect_token(&mut self, expected: &Token) -> Result<(), StepError> {
        if self.check_token(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("{expected:?}")))
        }
    }

    fn expect_keyword(&mut self, name: &str) -> Result<(), StepError> {
        if self.check_keyword(name) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("keyword '{name}'")))
        }
    }
}
