//! Tokenizer for the scriptlet language using winnow.
//!
//! Produces a flat token list. Each token remembers whether a line break
//! preceded it, which the parser uses to end statements that omit `;`.

use winnow::ascii::{digit0, digit1};
use winnow::combinator::{alt, opt, repeat};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_until, take_while};

use crate::error::ScriptError;

/// A lexical token with its position in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
    /// True when at least one line break separates this token from the previous one.
    pub newline_before: bool,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Keyword(Keyword),
    Punct(Punct),
    Eof,
}

/// Reserved words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Var,
    Let,
    Const,
    Function,
    Return,
    If,
    Else,
    For,
    While,
    Break,
    Continue,
    True,
    False,
    Null,
    Undefined,
    Typeof,
    In,
    With,
    Try,
    Catch,
    Finally,
    Throw,
    New,
}

impl Keyword {
    /// The source spelling of this keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Var => "var",
            Keyword::Let => "let",
            Keyword::Const => "const",
            Keyword::Function => "function",
            Keyword::Return => "return",
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::For => "for",
            Keyword::While => "while",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::Null => "null",
            Keyword::Undefined => "undefined",
            Keyword::Typeof => "typeof",
            Keyword::In => "in",
            Keyword::With => "with",
            Keyword::Try => "try",
            Keyword::Catch => "catch",
            Keyword::Finally => "finally",
            Keyword::Throw => "throw",
            Keyword::New => "new",
        }
    }

    fn from_word(word: &str) -> Option<Keyword> {
        let keyword = match word {
            "var" => Keyword::Var,
            "let" => Keyword::Let,
            "const" => Keyword::Const,
            "function" => Keyword::Function,
            "return" => Keyword::Return,
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "for" => Keyword::For,
            "while" => Keyword::While,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            "true" => Keyword::True,
            "false" => Keyword::False,
            "null" => Keyword::Null,
            "undefined" => Keyword::Undefined,
            "typeof" => Keyword::Typeof,
            "in" => Keyword::In,
            "with" => Keyword::With,
            "try" => Keyword::Try,
            "catch" => Keyword::Catch,
            "finally" => Keyword::Finally,
            "throw" => Keyword::Throw,
            "new" => Keyword::New,
            _ => return None,
        };
        Some(keyword)
    }
}

/// Operators and punctuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Dot,
    Question,
    Colon,
    Arrow,
    Not,
    Assign,
    Eq,
    StrictEq,
    Ne,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    Inc,
    Dec,
    And,
    Or,
    Nullish,
}

impl Punct {
    /// The source spelling of this punctuator.
    pub fn as_str(self) -> &'static str {
        PUNCTUATORS
            .iter()
            .find(|(_, punct)| *punct == self)
            .map_or("?", |(text, _)| text)
    }
}

/// Punctuators ordered so that longer spellings win.
const PUNCTUATORS: &[(&str, Punct)] = &[
    ("===", Punct::StrictEq),
    ("!==", Punct::StrictNe),
    ("=>", Punct::Arrow),
    ("==", Punct::Eq),
    ("!=", Punct::Ne),
    ("<=", Punct::Le),
    (">=", Punct::Ge),
    ("&&", Punct::And),
    ("||", Punct::Or),
    ("??", Punct::Nullish),
    ("++", Punct::Inc),
    ("--", Punct::Dec),
    ("+=", Punct::PlusAssign),
    ("-=", Punct::MinusAssign),
    ("*=", Punct::StarAssign),
    ("/=", Punct::SlashAssign),
    ("{", Punct::LBrace),
    ("}", Punct::RBrace),
    ("(", Punct::LParen),
    (")", Punct::RParen),
    ("[", Punct::LBracket),
    ("]", Punct::RBracket),
    (";", Punct::Semi),
    (",", Punct::Comma),
    (".", Punct::Dot),
    ("?", Punct::Question),
    (":", Punct::Colon),
    ("!", Punct::Not),
    ("=", Punct::Assign),
    ("<", Punct::Lt),
    (">", Punct::Gt),
    ("+", Punct::Plus),
    ("-", Punct::Minus),
    ("*", Punct::Star),
    ("/", Punct::Slash),
    ("%", Punct::Percent),
];

/// Line/column tracker advanced over consumed text.
struct Cursor {
    line: usize,
    column: usize,
}

impl Cursor {
    fn advance(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::Syntax {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }
}

/// Split script source into tokens, ending with a single `Eof` token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
    let mut remaining = source;
    let mut cursor = Cursor { line: 1, column: 1 };
    let mut tokens = Vec::new();

    loop {
        let skipped = trivia
            .parse_next(&mut remaining)
            .map_err(|_| cursor.error("invalid whitespace"))?;
        cursor.advance(skipped);
        let newline_before = tokens.is_empty() || skipped.contains('\n');

        if remaining.starts_with("/*") {
            return Err(cursor.error("unterminated comment"));
        }
        if remaining.is_empty() {
            tokens.push(Token {
                kind: TokenKind::Eof,
                line: cursor.line,
                column: cursor.column,
                newline_before,
            });
            return Ok(tokens);
        }

        let start = remaining;
        let kind = token_kind.parse_next(&mut remaining).map_err(|_| {
            let c = start.chars().next().unwrap_or('?');
            if c == '"' || c == '\'' {
                cursor.error("unterminated string literal")
            } else {
                cursor.error(format!("unexpected character '{c}'"))
            }
        })?;
        tokens.push(Token {
            kind,
            line: cursor.line,
            column: cursor.column,
            newline_before,
        });
        cursor.advance(&start[..start.len() - remaining.len()]);
    }
}

/// Consume whitespace and comments, returning the skipped text.
fn trivia<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    repeat::<_, _, (), _, _>(0.., alt((whitespace, line_comment, block_comment)))
        .take()
        .parse_next(input)
}

fn whitespace(input: &mut &str) -> ModalResult<()> {
    take_while(1.., |c: char| c.is_whitespace())
        .void()
        .parse_next(input)
}

fn line_comment(input: &mut &str) -> ModalResult<()> {
    ("//", take_while(0.., |c: char| c != '\n'))
        .void()
        .parse_next(input)
}

fn block_comment(input: &mut &str) -> ModalResult<()> {
    ("/*", take_until(0.., "*/"), "*/").void().parse_next(input)
}

/// Parse a single token.
fn token_kind(input: &mut &str) -> ModalResult<TokenKind> {
    alt((number, string_literal, word, punct)).parse_next(input)
}

/// Parse a decimal number: `12`, `1.5`, `.5`, `1e3`.
fn number(input: &mut &str) -> ModalResult<TokenKind> {
    alt((
        (digit1, opt(('.', digit0)), opt(exponent)).take(),
        ('.', digit1, opt(exponent)).take(),
    ))
    .try_map(str::parse::<f64>)
    .map(TokenKind::Number)
    .parse_next(input)
}

fn exponent<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (one_of(['e', 'E']), opt(one_of(['+', '-'])), digit1)
        .take()
        .parse_next(input)
}

/// Parse a single or double quoted string literal.
fn string_literal(input: &mut &str) -> ModalResult<TokenKind> {
    let quote = one_of(['"', '\'']).parse_next(input)?;
    let mut value = String::new();
    loop {
        match any.parse_next(input)? {
            c if c == quote => break,
            '\\' => value.push(escape_char(input)?),
            '\n' => return Err(ErrMode::Backtrack(ContextError::new())),
            c => value.push(c),
        }
    }
    Ok(TokenKind::Str(value))
}

/// Parse the character after a backslash.
fn escape_char(input: &mut &str) -> ModalResult<char> {
    let c = match any.parse_next(input)? {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'b' => '\u{8}',
        'f' => '\u{c}',
        'v' => '\u{b}',
        '0' => '\0',
        'u' => {
            let hex = take_while(4, |c: char| c.is_ascii_hexdigit()).parse_next(input)?;
            u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .unwrap_or(char::REPLACEMENT_CHARACTER)
        }
        other => other,
    };
    Ok(c)
}

/// Parse an identifier or keyword.
fn word(input: &mut &str) -> ModalResult<TokenKind> {
    (
        one_of(|c: char| c.is_alphabetic() || c == '_' || c == '$'),
        take_while(0.., |c: char| c.is_alphanumeric() || c == '_' || c == '$'),
    )
        .take()
        .map(|w: &str| {
            Keyword::from_word(w).map_or_else(|| TokenKind::Ident(w.to_string()), TokenKind::Keyword)
        })
        .parse_next(input)
}

/// Parse an operator or punctuation mark.
fn punct(input: &mut &str) -> ModalResult<TokenKind> {
    for (text, punct) in PUNCTUATORS {
        if let Some(rest) = input.strip_prefix(text) {
            *input = rest;
            return Ok(TokenKind::Punct(*punct));
        }
    }
    Err(ErrMode::Backtrack(ContextError::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_member_call() {
        assert_eq!(
            kinds("a.b(1)"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Punct(Punct::Dot),
                TokenKind::Ident("b".into()),
                TokenKind::Punct(Punct::LParen),
                TokenKind::Number(1.0),
                TokenKind::Punct(Punct::RParen),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn longest_punctuator_wins() {
        assert_eq!(
            kinds("a !== b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Punct(Punct::StrictNe),
                TokenKind::Ident("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\nA""#),
            vec![
                TokenKind::Str("it's".into()),
                TokenKind::Str("a\nA".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tracks_newlines_and_comments() {
        let tokens = tokenize("a // note\n/* block */ b").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Ident("b".into()));
        assert!(tokens[1].newline_before);
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("'abc").unwrap_err();
        assert!(err.to_string().contains("unterminated string literal"));
    }
}
