// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Lexer for GraphQL executable documents
//!
//! Produces a flat token stream with source locations. Insignificant input
//! (whitespace, line terminators, commas, the byte order mark and `#` comments)
//! is consumed but never emitted.
//!
//! Every token parser must either consume input or return an error; the main
//! loop rejects a parser that succeeds without advancing.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, digit1, one_of, satisfy},
    combinator::{map, opt, recognize, value},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use std::fmt;

use super::ast::Location;

/// Token types for GraphQL executable documents
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Punctuators
    Bang,         // !
    Dollar,       // $
    Ampersand,    // &
    LeftParen,    // (
    RightParen,   // )
    Spread,       // ...
    Colon,        // :
    Equals,       // =
    AtSign,       // @
    LeftBracket,  // [
    RightBracket, // ]
    LeftBrace,    // {
    Pipe,         // |
    RightBrace,   // }

    // Lexical values
    Name(String),
    Int(String),
    Float(String),
    String(String),

    // End of file
    EOF,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Bang => f.write_str("!"),
            Token::Dollar => f.write_str("$"),
            Token::Ampersand => f.write_str("&"),
            Token::LeftParen => f.write_str("("),
            Token::RightParen => f.write_str(")"),
            Token::Spread => f.write_str("..."),
            Token::Colon => f.write_str(":"),
            Token::Equals => f.write_str("="),
            Token::AtSign => f.write_str("@"),
            Token::LeftBracket => f.write_str("["),
            Token::RightBracket => f.write_str("]"),
            Token::LeftBrace => f.write_str("{"),
            Token::Pipe => f.write_str("|"),
            Token::RightBrace => f.write_str("}"),
            Token::Name(name) => f.write_str(name),
            Token::Int(n) | Token::Float(n) => f.write_str(n),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::EOF => f.write_str("<EOF>"),
        }
    }
}

/// A token together with the location of its first character
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub location: Location,
}

/// Lexer failure with the location of the offending character
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub location: Location,
}

/// Tokenize a GraphQL document. The returned stream always ends with `Token::EOF`.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, LexError> {
    let mut remaining = input;
    let mut tokens = Vec::new();
    let mut location = Location::new(1, 1);

    while !remaining.is_empty() {
        if let Ok((next, _)) = ignored(remaining) {
            location = advance(location, &remaining[..remaining.len() - next.len()]);
            remaining = next;
            continue;
        }

        match token(remaining) {
            Ok((next, token)) => {
                if next.len() == remaining.len() {
                    return Err(LexError {
                        message: format!("Token parser did not consume input at '{}'", token),
                        location,
                    });
                }
                tokens.push(Spanned { token, location });
                location = advance(location, &remaining[..remaining.len() - next.len()]);
                remaining = next;
            }
            Err(nom::Err::Failure(e)) => {
                let consumed = remaining.len() - e.input.len();
                return Err(LexError {
                    message: "Unterminated string".to_string(),
                    location: advance(location, &remaining[..consumed]),
                });
            }
            Err(_) => {
                let unexpected = remaining.chars().next().unwrap_or_default();
                return Err(LexError {
                    message: format!("Unexpected character '{}'", unexpected),
                    location,
                });
            }
        }
    }

    tokens.push(Spanned {
        token: Token::EOF,
        location,
    });
    Ok(tokens)
}

fn advance(mut location: Location, consumed: &str) -> Location {
    let mut chars = consumed.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                location.line += 1;
                location.column = 1;
            }
            '\n' => {
                location.line += 1;
                location.column = 1;
            }
            _ => location.column += 1,
        }
    }
    location
}

/// Whitespace, commas, BOM or a comment
fn ignored(input: &str) -> IResult<&str, &str> {
    alt((
        take_while1(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r' | ',' | '\u{feff}')),
        recognize(preceded(char('#'), take_while(|c: char| c != '\n' && c != '\r'))),
    ))(input)
}

/// Parse a single token. Block strings must be tried before plain strings and
/// the spread before any single-character punctuator.
fn token(input: &str) -> IResult<&str, Token> {
    alt((
        punctuator,
        map(block_string, Token::String),
        map(string_literal, Token::String),
        number,
        map(name, |s| Token::Name(s.to_string())),
    ))(input)
}

fn punctuator(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::Spread, tag("...")),
        value(Token::Bang, char('!')),
        value(Token::Dollar, char('$')),
        value(Token::Ampersand, char('&')),
        value(Token::LeftParen, char('(')),
        value(Token::RightParen, char(')')),
        value(Token::Colon, char(':')),
        value(Token::Equals, char('=')),
        value(Token::AtSign, char('@')),
        value(Token::LeftBracket, char('[')),
        value(Token::RightBracket, char(']')),
        value(Token::LeftBrace, char('{')),
        value(Token::Pipe, char('|')),
        value(Token::RightBrace, char('}')),
    ))(input)
}

fn name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

/// IntValue or FloatValue. A number directly followed by a name start or a
/// dot is rejected so `1a` and `1.` never lex as two tokens.
fn number(input: &str) -> IResult<&str, Token> {
    let (rest, text) = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;

    if rest
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_' || c == '.')
        .unwrap_or(false)
    {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        )));
    }

    let is_float = text.contains(['.', 'e', 'E']);
    let literal = text.to_string();
    Ok((
        rest,
        if is_float {
            Token::Float(literal)
        } else {
            Token::Int(literal)
        },
    ))
}

fn block_string(input: &str) -> IResult<&str, String> {
    map(
        delimited(tag("\"\"\""), take_until("\"\"\""), tag("\"\"\"")),
        block_string_value,
    )(input)
}

/// Strip the common indentation and leading/trailing blank lines of a block string
fn block_string_value(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let common_indent = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut stripped: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                *line
            } else {
                line.get(common_indent..).unwrap_or("")
            }
        })
        .collect();

    while stripped.first().map(|l| l.trim().is_empty()).unwrap_or(false) {
        stripped.remove(0);
    }
    while stripped.last().map(|l| l.trim().is_empty()).unwrap_or(false) {
        stripped.pop();
    }
    stripped.join("\n")
}

/// Quoted string with escape sequences. An opening quote without a matching
/// close on the same line is a hard failure.
fn string_literal(input: &str) -> IResult<&str, String> {
    let (body, _) = char('"')(input)?;
    let mut out = String::new();
    let mut chars = body.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((&body[i + 1..], out)),
            '\n' | '\r' => break,
            '\\' => {
                let escaped = match chars.next() {
                    Some((_, esc)) => esc,
                    None => break,
                };
                match escaped {
                    '"' => out.push('"'),
                    '\\' => out.push('\\'),
                    '/' => out.push('/'),
                    'b' => out.push('\u{0008}'),
                    'f' => out.push('\u{000C}'),
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    'u' => {
                        let hex: String = chars.by_ref().take(4).map(|(_, h)| h).collect();
                        match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                            Some(decoded) if hex.len() == 4 => out.push(decoded),
                            _ => break,
                        }
                    }
                    _ => break,
                }
            }
            other => out.push(other),
        }
    }

    Err(nom::Err::Failure(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|spanned| spanned.token)
            .collect()
    }

    #[test]
    fn test_punctuators_and_names() {
        assert_eq!(
            kinds("{ user(id: $id) { ...F } }"),
            vec![
                Token::LeftBrace,
                Token::Name("user".into()),
                Token::LeftParen,
                Token::Name("id".into()),
                Token::Colon,
                Token::Dollar,
                Token::Name("id".into()),
                Token::RightParen,
                Token::LeftBrace,
                Token::Spread,
                Token::Name("F".into()),
                Token::RightBrace,
                Token::RightBrace,
                Token::EOF,
            ]
        );
    }

    #[test]
    fn test_commas_and_comments_are_ignored() {
        assert_eq!(
            kinds("a, b # trailing comment\n,c"),
            vec![
                Token::Name("a".into()),
                Token::Name("b".into()),
                Token::Name("c".into()),
                Token::EOF,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("12 -3 1.5 2e10 -0.5E-3"),
            vec![
                Token::Int("12".into()),
                Token::Int("-3".into()),
                Token::Float("1.5".into()),
                Token::Float("2e10".into()),
                Token::Float("-0.5E-3".into()),
                Token::EOF,
            ]
        );
        assert!(tokenize("12abc").is_err());
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            kinds(r#""a\"b\nA""#),
            vec![Token::String("a\"b\nA".into()), Token::EOF]
        );
        assert_eq!(
            kinds("\"\"\"\n    hello\n      world\n\"\"\""),
            vec![Token::String("hello\n  world".into()), Token::EOF]
        );
    }

    #[test]
    fn test_locations() {
        let tokens = tokenize("{\n  a\n}").unwrap();
        assert_eq!(tokens[0].location, Location::new(1, 1));
        assert_eq!(tokens[1].location, Location::new(2, 3));
        assert_eq!(tokens[2].location, Location::new(3, 1));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("{ a(x: \"oops) }").unwrap_err();
        assert_eq!(err.message, "Unterminated string");
        assert_eq!(err.location.line, 1);
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("{ a ? }").unwrap_err();
        assert!(err.message.contains('?'));
        assert_eq!(err.location, Location::new(1, 5));
    }
}
