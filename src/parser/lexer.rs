//! Tokenization of TSDL metadata text using `nom`.
//!
//! Produces a stream of [`Token`]s for the declaration parser. Whitespace,
//! `/* */` block comments and `//` line comments are discarded.

use crate::utils::error::MetadataError;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, digit1, hex_digit1, multispace1, not_line_ending},
    combinator::value,
    multi::many0,
    sequence::{delimited, preceded},
    IResult, Parser,
};
use std::fmt;

/// A token in TSDL source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identifier or keyword (`struct`, `uint32_t`, `le`, ...).
    Ident(String),
    /// Unsigned integer literal; signs are separate tokens.
    Integer(u64),
    /// Double-quoted string literal, escapes resolved.
    Str(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    LAngle,
    RAngle,
    Semi,
    Comma,
    /// `=`
    Assign,
    /// `:=`
    TypeAssign,
    Colon,
    Dot,
    /// `...` in enumeration ranges.
    Ellipsis,
    Minus,
    Plus,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "identifier `{s}`"),
            Token::Integer(v) => write!(f, "integer {v}"),
            Token::Str(s) => write!(f, "string \"{s}\""),
            Token::LBrace => f.write_str("`{`"),
            Token::RBrace => f.write_str("`}`"),
            Token::LBracket => f.write_str("`[`"),
            Token::RBracket => f.write_str("`]`"),
            Token::LParen => f.write_str("`(`"),
            Token::RParen => f.write_str("`)`"),
            Token::LAngle => f.write_str("`<`"),
            Token::RAngle => f.write_str("`>`"),
            Token::Semi => f.write_str("`;`"),
            Token::Comma => f.write_str("`,`"),
            Token::Assign => f.write_str("`=`"),
            Token::TypeAssign => f.write_str("`:=`"),
            Token::Colon => f.write_str("`:`"),
            Token::Dot => f.write_str("`.`"),
            Token::Ellipsis => f.write_str("`...`"),
            Token::Minus => f.write_str("`-`"),
            Token::Plus => f.write_str("`+`"),
        }
    }
}

/// Skippable items: whitespace, line comments and block comments.
fn skip_trivia(input: &str) -> IResult<&str, ()> {
    let line_comment = value((), preceded(tag("//"), not_line_ending));
    let block_comment = value((), delimited(tag("/*"), take_until("*/"), tag("*/")));
    let ws = value((), multispace1);
    let (input, _) = many0(alt((ws, line_comment, block_comment))).parse(input)?;
    Ok((input, ()))
}

/// Parses a double-quoted string literal with C-style escapes.
fn string_literal(input: &str) -> IResult<&str, Token> {
    let (input, _) = char('"')(input)?;
    let mut result = String::new();
    let mut chars = input.char_indices();
    loop {
        match chars.next() {
            Some((idx, '"')) => {
                let remaining = &input[idx + 1..];
                return Ok((remaining, Token::Str(result)));
            }
            Some((_, '\\')) => match chars.next() {
                Some((_, 'n')) => result.push('\n'),
                Some((_, 't')) => result.push('\t'),
                Some((_, 'r')) => result.push('\r'),
                Some((_, '0')) => result.push('\0'),
                Some((_, c)) => result.push(c),
                None => {
                    return Err(nom::Err::Failure(nom::error::Error::new(
                        input,
                        nom::error::ErrorKind::Char,
                    )));
                }
            },
            Some((_, c)) => result.push(c),
            None => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Char,
                )));
            }
        }
    }
}

/// Strips C integer suffixes (`U`, `UL`, `ULL`, ...).
fn integer_suffix(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| matches!(c, 'u' | 'U' | 'l' | 'L'))(input)
}

fn hex_literal(input: &str) -> IResult<&str, Token> {
    let (rest, digits) = preceded(alt((tag("0x"), tag("0X"))), hex_digit1).parse(input)?;
    let (rest, _) = integer_suffix(rest)?;
    let val = u64::from_str_radix(digits, 16).map_err(|_| {
        nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::HexDigit))
    })?;
    Ok((rest, Token::Integer(val)))
}

/// Decimal literal, or octal when it has a leading zero.
fn decimal_literal(input: &str) -> IResult<&str, Token> {
    let (rest, digits) = digit1(input)?;
    let (rest, _) = integer_suffix(rest)?;
    let parsed = if digits.len() > 1 && digits.starts_with('0') {
        u64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse::<u64>()
    };
    let val = parsed.map_err(|_| {
        nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
    })?;
    Ok((rest, Token::Integer(val)))
}

const fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

const fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn identifier(input: &str) -> IResult<&str, Token> {
    let (rest, first) = take_while1(is_ident_start)(input)?;
    let (rest, tail) = take_while(is_ident_continue)(rest)?;
    Ok((rest, Token::Ident(format!("{first}{tail}"))))
}

/// Parses a punctuation token. Longer symbols are tried first.
fn symbol(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::Ellipsis, tag("...")),
        value(Token::TypeAssign, tag(":=")),
        value(Token::LBrace, char('{')),
        value(Token::RBrace, char('}')),
        value(Token::LBracket, char('[')),
        value(Token::RBracket, char(']')),
        value(Token::LParen, char('(')),
        value(Token::RParen, char(')')),
        value(Token::LAngle, char('<')),
        value(Token::RAngle, char('>')),
        value(Token::Semi, char(';')),
        value(Token::Comma, char(',')),
        value(Token::Assign, char('=')),
        value(Token::Colon, char(':')),
        value(Token::Dot, char('.')),
        value(Token::Minus, char('-')),
        value(Token::Plus, char('+')),
    ))
    .parse(input)
}

fn single_token(input: &str) -> IResult<&str, Token> {
    alt((string_literal, hex_literal, decimal_literal, symbol, identifier)).parse(input)
}

/// Tokenizes TSDL source into a vector of tokens.
///
/// # Errors
///
/// Returns [`MetadataError::Lex`] if the input contains characters that
/// cannot be tokenized or an unterminated string/comment.
pub fn tokenize(input: &str) -> Result<Vec<Token>, MetadataError> {
    let mut tokens = Vec::new();
    let mut remaining = input;

    loop {
        let (rest, ()) = skip_trivia(remaining)
            .map_err(|e| MetadataError::Lex(format!("error skipping whitespace: {e}")))?;
        remaining = rest;

        if remaining.is_empty() {
            break;
        }

        let (rest, token) = single_token(remaining).map_err(|e| {
            let snippet: String = remaining.chars().take(20).collect();
            MetadataError::Lex(format!("unexpected input at \"{snippet}\" ({e})"))
        })?;
        tokens.push(token);
        remaining = rest;
    }

    Ok(tokens)
}
