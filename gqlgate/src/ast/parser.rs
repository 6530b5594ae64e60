// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Parser for GraphQL executable documents using nom parsers over the token stream
//!
//! Parsers commit with `cut` once an opening delimiter or keyword has been
//! seen, so a syntax error is reported at the token where parsing actually
//! stopped instead of at the start of the enclosing definition.

use log::debug;
use nom::{
    branch::alt,
    combinator::{cut, map, opt},
    multi::{many0, many1},
    sequence::{pair, preceded, terminated, tuple},
    IResult,
};

use super::ast::*;
use super::lexer::{tokenize, Spanned, Token};

/// Syntax error with positional diagnostics
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (at {location})")]
pub struct ParseError {
    pub message: String,
    pub location: Location,
}

impl ParseError {
    pub fn new(message: impl Into<String>, location: Location) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

/// Deepest nesting of selection sets, lists, objects and argument lists a
/// document may use
pub const MAX_DEPTH: usize = 64;

type Tokens<'a> = &'a [Spanned];
type PResult<'a, O> = IResult<Tokens<'a>, O>;

/// Parse a GraphQL executable document
pub fn parse_document(input: &str) -> Result<Document, ParseError> {
    let tokens = tokenize(input).map_err(|e| ParseError::new(e.message, e.location))?;

    if matches!(tokens.first(), Some(Spanned { token: Token::EOF, .. })) {
        return Err(ParseError::new(
            "Document does not contain any definitions",
            tokens[0].location,
        ));
    }

    check_depth(&tokens)?;

    let parsed = match many1(definition)(&tokens) {
        Ok((rest, definitions)) => match rest.first() {
            None
            | Some(Spanned {
                token: Token::EOF, ..
            }) => {
                debug!("Parsed document with {} definition(s)", definitions.len());
                Ok(Document { definitions })
            }
            Some(spanned) => Err(unexpected(spanned)),
        },
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(match e.input.first() {
            Some(spanned) => unexpected(spanned),
            None => ParseError::new("Unexpected end of document", end_location(&tokens)),
        }),
        Err(nom::Err::Incomplete(_)) => Err(ParseError::new(
            "Unexpected end of document",
            end_location(&tokens),
        )),
    };
    parsed
}

/// Reject documents whose braces, brackets or parentheses nest deeper than
/// [`MAX_DEPTH`]. The descent below recurses once per nesting level.
fn check_depth(tokens: &[Spanned]) -> Result<(), ParseError> {
    let mut depth = 0usize;
    for spanned in tokens {
        match spanned.token {
            Token::LeftBrace | Token::LeftBracket | Token::LeftParen => {
                depth += 1;
                if depth > MAX_DEPTH {
                    return Err(ParseError::new(
                        format!("Document nesting exceeds the maximum depth of {}", MAX_DEPTH),
                        spanned.location,
                    ));
                }
            }
            Token::RightBrace | Token::RightBracket | Token::RightParen => {
                depth = depth.saturating_sub(1);
            }
            _ => {}
        }
    }
    Ok(())
}

fn unexpected(spanned: &Spanned) -> ParseError {
    match &spanned.token {
        Token::EOF => ParseError::new("Unexpected end of document", spanned.location),
        token => ParseError::new(format!("Unexpected token '{}'", token), spanned.location),
    }
}

fn end_location(tokens: &[Spanned]) -> Location {
    tokens.last().map(|t| t.location).unwrap_or_default()
}

fn location_of(tokens: Tokens) -> Location {
    tokens.first().map(|t| t.location).unwrap_or_default()
}

fn reject<O>(tokens: Tokens) -> PResult<O> {
    Err(nom::Err::Error(nom::error::Error::new(
        tokens,
        nom::error::ErrorKind::Tag,
    )))
}

/// Match a single punctuator
fn punct(expected: Token) -> impl Fn(&[Spanned]) -> IResult<&[Spanned], ()> {
    move |tokens: &[Spanned]| match tokens.split_first() {
        Some((spanned, rest)) if spanned.token == expected => Ok((rest, ())),
        _ => reject(tokens),
    }
}

/// Match a name with a specific spelling (GraphQL keywords are contextual)
fn keyword(expected: &'static str) -> impl Fn(&[Spanned]) -> IResult<&[Spanned], ()> {
    move |tokens: &[Spanned]| match tokens.split_first() {
        Some((
            Spanned {
                token: Token::Name(name),
                ..
            },
            rest,
        )) if name == expected => Ok((rest, ())),
        _ => reject(tokens),
    }
}

fn name(tokens: Tokens) -> PResult<String> {
    match tokens.split_first() {
        Some((
            Spanned {
                token: Token::Name(name),
                ..
            },
            rest,
        )) => Ok((rest, name.clone())),
        _ => reject(tokens),
    }
}

/// Fragment names are any name except `on`
fn fragment_name(tokens: Tokens) -> PResult<String> {
    let (rest, parsed) = name(tokens)?;
    if parsed == "on" {
        return reject(tokens);
    }
    Ok((rest, parsed))
}

fn definition(tokens: Tokens) -> PResult<Definition> {
    alt((
        map(operation_definition, Definition::Operation),
        map(fragment_definition, Definition::Fragment),
    ))(tokens)
}

fn operation_definition(tokens: Tokens) -> PResult<OperationDefinition> {
    let location = location_of(tokens);

    match selection_set(tokens) {
        Ok((rest, selection_set)) => {
            return Ok((
                rest,
                OperationDefinition {
                    kind: OperationKind::Query,
                    name: None,
                    variable_definitions: Vec::new(),
                    directives: Vec::new(),
                    selection_set,
                    location,
                },
            ))
        }
        Err(nom::Err::Error(_)) => {}
        Err(failure) => return Err(failure),
    }

    let (rest, kind) = operation_kind(tokens)?;
    let (rest, (name, variable_definitions, directives, selection_set)) = cut(tuple((
        opt(name),
        opt(variable_definitions),
        directives,
        selection_set,
    )))(rest)?;

    Ok((
        rest,
        OperationDefinition {
            kind,
            name,
            variable_definitions: variable_definitions.unwrap_or_default(),
            directives,
            selection_set,
            location,
        },
    ))
}

fn operation_kind(tokens: Tokens) -> PResult<OperationKind> {
    alt((
        map(keyword("query"), |_| OperationKind::Query),
        map(keyword("mutation"), |_| OperationKind::Mutation),
        map(keyword("subscription"), |_| OperationKind::Subscription),
    ))(tokens)
}

fn fragment_definition(tokens: Tokens) -> PResult<FragmentDefinition> {
    let location = location_of(tokens);
    let (rest, (name, type_condition, directives, selection_set)) = preceded(
        keyword("fragment"),
        cut(tuple((fragment_name, type_condition, directives, selection_set))),
    )(tokens)?;

    Ok((
        rest,
        FragmentDefinition {
            name,
            type_condition,
            directives,
            selection_set,
            location,
        },
    ))
}

fn type_condition(tokens: Tokens) -> PResult<String> {
    preceded(keyword("on"), cut(name))(tokens)
}

fn variable_definitions(tokens: Tokens) -> PResult<Vec<VariableDefinition>> {
    preceded(
        punct(Token::LeftParen),
        cut(terminated(
            many1(variable_definition),
            punct(Token::RightParen),
        )),
    )(tokens)
}

fn variable_definition(tokens: Tokens) -> PResult<VariableDefinition> {
    let (rest, (name, var_type, default_value, directives)) = tuple((
        variable,
        preceded(cut(punct(Token::Colon)), cut(type_ref)),
        opt(preceded(punct(Token::Equals), cut(value))),
        directives,
    ))(tokens)?;

    Ok((
        rest,
        VariableDefinition {
            name,
            var_type,
            default_value,
            directives,
        },
    ))
}

fn variable(tokens: Tokens) -> PResult<String> {
    preceded(punct(Token::Dollar), cut(name))(tokens)
}

fn type_ref(tokens: Tokens) -> PResult<TypeRef> {
    let (rest, (base, non_null)) = pair(
        alt((
            map(name, TypeRef::Named),
            map(
                preceded(
                    punct(Token::LeftBracket),
                    cut(terminated(type_ref, punct(Token::RightBracket))),
                ),
                |inner| TypeRef::List(Box::new(inner)),
            ),
        )),
        opt(punct(Token::Bang)),
    )(tokens)?;

    let wrapped = if non_null.is_some() {
        TypeRef::NonNull(Box::new(base))
    } else {
        base
    };
    Ok((rest, wrapped))
}

fn directives(tokens: Tokens) -> PResult<Vec<Directive>> {
    many0(directive)(tokens)
}

fn directive(tokens: Tokens) -> PResult<Directive> {
    let (rest, (name, arguments)) =
        preceded(punct(Token::AtSign), cut(pair(name, opt(arguments))))(tokens)?;
    Ok((
        rest,
        Directive {
            name,
            arguments: arguments.unwrap_or_default(),
        },
    ))
}

fn arguments(tokens: Tokens) -> PResult<Vec<Argument>> {
    preceded(
        punct(Token::LeftParen),
        cut(terminated(many1(argument), punct(Token::RightParen))),
    )(tokens)
}

fn argument(tokens: Tokens) -> PResult<Argument> {
    let (rest, (name, value)) = pair(name, preceded(cut(punct(Token::Colon)), cut(value)))(tokens)?;
    Ok((rest, Argument { name, value }))
}

fn selection_set(tokens: Tokens) -> PResult<SelectionSet> {
    map(
        preceded(
            punct(Token::LeftBrace),
            cut(terminated(many1(selection), punct(Token::RightBrace))),
        ),
        |items| SelectionSet { items },
    )(tokens)
}

fn selection(tokens: Tokens) -> PResult<Selection> {
    alt((map(field, Selection::Field), spread))(tokens)
}

fn field(tokens: Tokens) -> PResult<Field> {
    let location = location_of(tokens);
    let (rest, (first, second, arguments, directives, selection_set)) = tuple((
        name,
        opt(preceded(punct(Token::Colon), cut(name))),
        opt(arguments),
        directives,
        opt(selection_set),
    ))(tokens)?;

    let (alias, name) = match second {
        Some(actual) => (Some(first), actual),
        None => (None, first),
    };

    Ok((
        rest,
        Field {
            alias,
            name,
            arguments: arguments.unwrap_or_default(),
            directives,
            selection_set: selection_set.unwrap_or_default(),
            location,
        },
    ))
}

/// `...Name @dir` or `... on Type @dir { ... }`
fn spread(tokens: Tokens) -> PResult<Selection> {
    let location = location_of(tokens);
    preceded(
        punct(Token::Spread),
        cut(alt((
            map(pair(fragment_name, directives), move |(fragment_name, directives)| {
                Selection::FragmentSpread(FragmentSpread {
                    fragment_name,
                    directives,
                    location,
                })
            }),
            map(
                tuple((opt(type_condition), directives, selection_set)),
                move |(type_condition, directives, selection_set)| {
                    Selection::InlineFragment(InlineFragment {
                        type_condition,
                        directives,
                        selection_set,
                        location,
                    })
                },
            ),
        ))),
    )(tokens)
}

fn value(tokens: Tokens) -> PResult<Value> {
    alt((
        map(variable, Value::Variable),
        scalar_value,
        map(
            preceded(
                punct(Token::LeftBracket),
                cut(terminated(many0(value), punct(Token::RightBracket))),
            ),
            Value::List,
        ),
        map(
            preceded(
                punct(Token::LeftBrace),
                cut(terminated(many0(object_field), punct(Token::RightBrace))),
            ),
            Value::Object,
        ),
    ))(tokens)
}

fn object_field(tokens: Tokens) -> PResult<(String, Value)> {
    pair(name, preceded(cut(punct(Token::Colon)), cut(value)))(tokens)
}

fn scalar_value(tokens: Tokens) -> PResult<Value> {
    match tokens.split_first() {
        Some((spanned, rest)) => {
            let parsed = match &spanned.token {
                Token::Int(n) => Value::Int(n.clone()),
                Token::Float(n) => Value::Float(n.clone()),
                Token::String(s) => Value::String(s.clone()),
                Token::Name(n) => match n.as_str() {
                    "true" => Value::Boolean(true),
                    "false" => Value::Boolean(false),
                    "null" => Value::Null,
                    _ => Value::Enum(n.clone()),
                },
                _ => return reject(tokens),
            };
            Ok((rest, parsed))
        }
        None => reject(tokens),
    }
}
