//! Parser for query documents.
//!
//! Produces the [`QueryDocument`] structural form the safety rules evaluate.
//! The parser covers the request-document subset of the query language:
//! operations, fields, aliases, arguments, directives, variables, and inline
//! fragments. Named fragment spreads are rejected - the gateway holds no
//! fragment registry, and resolving spreads is the engine's job, not an
//! admission concern.
//!
//! Parse failures are terminal for the request and surface before the safety
//! gate or any resolver runs.

use super::{Field, Operation, OperationKind, QueryDocument, SelectionSet};

/// Argument names treated as result-multiplicity estimates for a field.
const PAGING_ARGUMENTS: [&str; 3] = ["first", "last", "limit"];

/// Error raised when a query document cannot be parsed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// The document contains no tokens.
    #[error("query document is empty")]
    Empty,

    /// The document ended mid-construct.
    #[error("unexpected end of query document")]
    UnexpectedEnd,

    /// A token appeared where another construct was required.
    #[error("unexpected {found}, expected {expected}")]
    Unexpected {
        /// Description of the token found.
        found: String,
        /// Description of what was required.
        expected: &'static str,
    },

    /// A selection set selected no fields.
    #[error("selection set must select at least one field")]
    EmptySelection,

    /// The document used a named fragment spread.
    #[error("named fragment spreads are not supported by the gateway")]
    UnsupportedFragment,

    /// The document contained more than one operation.
    #[error("documents must contain exactly one operation")]
    MultipleOperations,

    /// A character outside the query grammar.
    #[error("unrecognized character {0:?} in query document")]
    InvalidCharacter(char),

    /// A numeric literal that does not parse.
    #[error("invalid numeric literal: {0}")]
    InvalidNumber(String),
}

/// Parse a query document into its structural form.
///
/// # Errors
///
/// Returns a [`ParseError`] for empty, truncated, or malformed documents,
/// for documents with more than one operation, and for named fragment
/// spreads.
pub fn parse_document(text: &str) -> Result<QueryDocument, ParseError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut parser = Parser { tokens, pos: 0 };
    let operation = parser.parse_operation()?;

    if let Some(token) = parser.peek() {
        // Anything after one complete operation is a second operation (or a
        // fragment definition, which we also do not admit).
        return Err(match token {
            Token::LBrace => ParseError::MultipleOperations,
            Token::Name(word)
                if operation_kind(word).is_some() || word == "fragment" =>
            {
                ParseError::MultipleOperations
            }
            other => ParseError::Unexpected {
                found: describe(other),
                expected: "end of document",
            },
        });
    }

    Ok(QueryDocument { operation })
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Dollar,
    At,
    Equals,
    Bang,
    Spread,
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
}

fn describe(token: &Token) -> String {
    match token {
        Token::LBrace => "'{'".to_string(),
        Token::RBrace => "'}'".to_string(),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::LBracket => "'['".to_string(),
        Token::RBracket => "']'".to_string(),
        Token::Colon => "':'".to_string(),
        Token::Dollar => "'$'".to_string(),
        Token::At => "'@'".to_string(),
        Token::Equals => "'='".to_string(),
        Token::Bang => "'!'".to_string(),
        Token::Spread => "'...'".to_string(),
        Token::Name(name) => format!("name `{name}`"),
        Token::Int(value) => format!("integer `{value}`"),
        Token::Float(value) => format!("float `{value}`"),
        Token::Str(_) => "string literal".to_string(),
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            // Commas are insignificant, like whitespace.
            ' ' | '\t' | '\r' | '\n' | ',' | '\u{feff}' => {
                chars.next();
            }
            '#' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '{' => {
                chars.next();
                tokens.push(Token::LBrace);
            }
            '}' => {
                chars.next();
                tokens.push(Token::RBrace);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            ':' => {
                chars.next();
                tokens.push(Token::Colon);
            }
            '$' => {
                chars.next();
                tokens.push(Token::Dollar);
            }
            '@' => {
                chars.next();
                tokens.push(Token::At);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Equals);
            }
            '!' => {
                chars.next();
                tokens.push(Token::Bang);
            }
            '.' => {
                chars.next();
                if chars.next() != Some('.') || chars.next() != Some('.') {
                    return Err(ParseError::InvalidCharacter('.'));
                }
                tokens.push(Token::Spread);
            }
            '"' => {
                chars.next();
                tokens.push(lex_string(&mut chars)?);
            }
            '-' | '0'..='9' => {
                tokens.push(lex_number(&mut chars)?);
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Name(name));
            }
            other => return Err(ParseError::InvalidCharacter(other)),
        }
    }

    Ok(tokens)
}

/// Lex a string literal. The opening quote has been consumed.
fn lex_string(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> Result<Token, ParseError> {
    // Distinguish "", block strings, and ordinary strings.
    if chars.peek() == Some(&'"') {
        chars.next();
        if chars.peek() == Some(&'"') {
            chars.next();
            return lex_block_string(chars);
        }
        return Ok(Token::Str(String::new()));
    }

    let mut value = String::new();
    loop {
        match chars.next() {
            Some('"') => return Ok(Token::Str(value)),
            Some('\\') => {
                // The gateway never interprets string contents; keep the
                // escaped character verbatim so quoting stays balanced.
                match chars.next() {
                    Some(escaped) => value.push(escaped),
                    None => return Err(ParseError::UnexpectedEnd),
                }
            }
            Some(c) => value.push(c),
            None => return Err(ParseError::UnexpectedEnd),
        }
    }
}

/// Lex a block string. The opening `"""` has been consumed.
fn lex_block_string(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> Result<Token, ParseError> {
    let mut value = String::new();
    let mut quotes = 0usize;
    for c in chars.by_ref() {
        if c == '"' {
            quotes += 1;
            if quotes == 3 {
                // Trailing quotes counted into the value are not part of it.
                value.truncate(value.len().saturating_sub(2));
                return Ok(Token::Str(value));
            }
        } else {
            quotes = 0;
        }
        value.push(c);
    }
    Err(ParseError::UnexpectedEnd)
}

fn lex_number(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> Result<Token, ParseError> {
    let mut literal = String::new();
    let mut is_float = false;

    if chars.peek() == Some(&'-') {
        literal.push('-');
        chars.next();
    }
    while let Some(&c) = chars.peek() {
        match c {
            '0'..='9' => {
                literal.push(c);
                chars.next();
            }
            '.' | 'e' | 'E' | '+' | '-' if !literal.is_empty() => {
                is_float = true;
                literal.push(c);
                chars.next();
            }
            _ => break,
        }
    }

    if is_float {
        literal
            .parse::<f64>()
            .map(Token::Float)
            .map_err(|_| ParseError::InvalidNumber(literal))
    } else {
        literal
            .parse::<i64>()
            .map(Token::Int)
            .map_err(|_| ParseError::InvalidNumber(literal))
    }
}

// ============================================================================
// Parser
// ============================================================================

fn operation_kind(word: &str) -> Option<OperationKind> {
    match word {
        "query" => Some(OperationKind::Query),
        "mutation" => Some(OperationKind::Mutation),
        "subscription" => Some(OperationKind::Subscription),
        _ => None,
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_name(&mut self, expected: &'static str) -> Result<String, ParseError> {
        match self.next() {
            Some(Token::Name(name)) => Ok(name),
            Some(other) => Err(ParseError::Unexpected {
                found: describe(&other),
                expected,
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn parse_operation(&mut self) -> Result<Operation, ParseError> {
        let (kind, name) = match self.peek() {
            // Shorthand form: a bare selection set is an anonymous query.
            Some(Token::LBrace) => (OperationKind::Query, None),
            Some(Token::Name(word)) => {
                let Some(kind) = operation_kind(word) else {
                    return Err(ParseError::Unexpected {
                        found: describe(&Token::Name(word.clone())),
                        expected: "an operation keyword or a selection set",
                    });
                };
                self.next();

                let name = match self.peek() {
                    Some(Token::Name(_)) => Some(self.expect_name("an operation name")?),
                    _ => None,
                };

                // Variable definitions affect execution, not shape.
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.skip_balanced_parens()?;
                }
                self.skip_directives()?;

                (kind, name)
            }
            Some(other) => {
                return Err(ParseError::Unexpected {
                    found: describe(other),
                    expected: "an operation keyword or a selection set",
                })
            }
            None => return Err(ParseError::UnexpectedEnd),
        };

        let selection_set = self.parse_selection_set()?;
        Ok(Operation {
            kind,
            name,
            selection_set,
        })
    }

    fn parse_selection_set(&mut self) -> Result<SelectionSet, ParseError> {
        match self.next() {
            Some(Token::LBrace) => {}
            Some(other) => {
                return Err(ParseError::Unexpected {
                    found: describe(&other),
                    expected: "'{'",
                })
            }
            None => return Err(ParseError::UnexpectedEnd),
        }

        let mut fields = Vec::new();
        loop {
            match self.peek() {
                Some(Token::RBrace) => {
                    self.next();
                    break;
                }
                Some(Token::Name(_)) => fields.push(self.parse_field()?),
                Some(Token::Spread) => {
                    self.next();
                    let mut inlined = self.parse_inline_fragment()?;
                    // Inline fragments select at the enclosing level; they
                    // add no nesting of their own.
                    fields.append(&mut inlined.fields);
                }
                Some(other) => {
                    return Err(ParseError::Unexpected {
                        found: describe(other),
                        expected: "a field or '}'",
                    })
                }
                None => return Err(ParseError::UnexpectedEnd),
            }
        }

        if fields.is_empty() {
            return Err(ParseError::EmptySelection);
        }
        Ok(SelectionSet { fields })
    }

    /// Parse an inline fragment body. The `...` has been consumed.
    fn parse_inline_fragment(&mut self) -> Result<SelectionSet, ParseError> {
        match self.peek() {
            Some(Token::Name(word)) if word == "on" => {
                self.next();
                self.expect_name("a type condition")?;
            }
            Some(Token::Name(_)) => return Err(ParseError::UnsupportedFragment),
            _ => {}
        }
        self.skip_directives()?;
        self.parse_selection_set()
    }

    fn parse_field(&mut self) -> Result<Field, ParseError> {
        let mut name = self.expect_name("a field name")?;
        let mut alias = None;

        if matches!(self.peek(), Some(Token::Colon)) {
            self.next();
            alias = Some(name);
            name = self.expect_name("a field name")?;
        }

        let mut list_size = None;
        if matches!(self.peek(), Some(Token::LParen)) {
            list_size = self.parse_arguments()?;
        }
        self.skip_directives()?;

        let selection_set = if matches!(self.peek(), Some(Token::LBrace)) {
            Some(self.parse_selection_set()?)
        } else {
            None
        };

        Ok(Field {
            name,
            alias,
            list_size,
            selection_set,
        })
    }

    /// Parse an argument list, returning a list-size estimate if a paging
    /// argument carries an integer literal. The '(' has not been consumed.
    fn parse_arguments(&mut self) -> Result<Option<u64>, ParseError> {
        self.next(); // consume '('
        let mut list_size = None;

        loop {
            match self.peek() {
                Some(Token::RParen) => {
                    self.next();
                    return Ok(list_size);
                }
                Some(Token::Name(_)) => {
                    let name = self.expect_name("an argument name")?;
                    match self.next() {
                        Some(Token::Colon) => {}
                        Some(other) => {
                            return Err(ParseError::Unexpected {
                                found: describe(&other),
                                expected: "':'",
                            })
                        }
                        None => return Err(ParseError::UnexpectedEnd),
                    }
                    let value = self.parse_value()?;
                    if PAGING_ARGUMENTS.contains(&name.as_str()) {
                        if let ParsedValue::Int(n) = value {
                            if n >= 0 {
                                list_size = Some(n as u64);
                            }
                        }
                    }
                }
                Some(other) => {
                    return Err(ParseError::Unexpected {
                        found: describe(other),
                        expected: "an argument name or ')'",
                    })
                }
                None => return Err(ParseError::UnexpectedEnd),
            }
        }
    }

    fn parse_value(&mut self) -> Result<ParsedValue, ParseError> {
        match self.next() {
            Some(Token::Int(n)) => Ok(ParsedValue::Int(n)),
            Some(Token::Float(_)) | Some(Token::Str(_)) => Ok(ParsedValue::Other),
            // Booleans, null, and enum values all lex as names.
            Some(Token::Name(_)) => Ok(ParsedValue::Other),
            Some(Token::Dollar) => {
                // Variable value: multiplicity unknown at admission time.
                self.expect_name("a variable name")?;
                Ok(ParsedValue::Other)
            }
            Some(Token::LBracket) => {
                loop {
                    match self.peek() {
                        Some(Token::RBracket) => {
                            self.next();
                            break;
                        }
                        Some(_) => {
                            self.parse_value()?;
                        }
                        None => return Err(ParseError::UnexpectedEnd),
                    }
                }
                Ok(ParsedValue::Other)
            }
            Some(Token::LBrace) => {
                loop {
                    match self.peek() {
                        Some(Token::RBrace) => {
                            self.next();
                            break;
                        }
                        Some(Token::Name(_)) => {
                            self.expect_name("an object field name")?;
                            match self.next() {
                                Some(Token::Colon) => {}
                                Some(other) => {
                                    return Err(ParseError::Unexpected {
                                        found: describe(&other),
                                        expected: "':'",
                                    })
                                }
                                None => return Err(ParseError::UnexpectedEnd),
                            }
                            self.parse_value()?;
                        }
                        Some(other) => {
                            return Err(ParseError::Unexpected {
                                found: describe(other),
                                expected: "an object field name or '}'",
                            })
                        }
                        None => return Err(ParseError::UnexpectedEnd),
                    }
                }
                Ok(ParsedValue::Other)
            }
            Some(other) => Err(ParseError::Unexpected {
                found: describe(&other),
                expected: "a value",
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    /// Skip `@name` directives, including their argument lists.
    fn skip_directives(&mut self) -> Result<(), ParseError> {
        while matches!(self.peek(), Some(Token::At)) {
            self.next();
            self.expect_name("a directive name")?;
            if matches!(self.peek(), Some(Token::LParen)) {
                self.parse_arguments()?;
            }
        }
        Ok(())
    }

    /// Skip a balanced parenthesized group (variable definitions).
    fn skip_balanced_parens(&mut self) -> Result<(), ParseError> {
        let mut depth = 0usize;
        loop {
            match self.next() {
                Some(Token::LParen) => depth += 1,
                Some(Token::RParen) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(_) => {}
                None => return Err(ParseError::UnexpectedEnd),
            }
        }
    }
}

enum ParsedValue {
    Int(i64),
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shorthand_query() {
        let doc = parse_document("{ users { id name } }").unwrap();
        assert_eq!(doc.operation.kind, OperationKind::Query);
        assert_eq!(doc.operation.name, None);
        assert_eq!(doc.root().fields.len(), 1);

        let users = &doc.root().fields[0];
        assert_eq!(users.name, "users");
        let children = users.selection_set.as_ref().unwrap();
        assert_eq!(children.fields.len(), 2);
        assert_eq!(children.fields[0].name, "id");
        assert_eq!(children.fields[1].name, "name");
    }

    #[test]
    fn test_parse_named_operation() {
        let doc = parse_document("query GetUsers { users { id } }").unwrap();
        assert_eq!(doc.operation.kind, OperationKind::Query);
        assert_eq!(doc.operation.name.as_deref(), Some("GetUsers"));
    }

    #[test]
    fn test_parse_mutation() {
        let doc = parse_document(r#"mutation { newNote(content: "hi") { id } }"#).unwrap();
        assert_eq!(doc.operation.kind, OperationKind::Mutation);
        assert_eq!(doc.root().fields[0].name, "newNote");
    }

    #[test]
    fn test_parse_alias() {
        let doc = parse_document("{ me: user { id } }").unwrap();
        let field = &doc.root().fields[0];
        assert_eq!(field.name, "user");
        assert_eq!(field.alias.as_deref(), Some("me"));
        assert_eq!(field.response_key(), "me");
    }

    #[test]
    fn test_paging_argument_captured() {
        let doc = parse_document("{ users(first: 10) { id } }").unwrap();
        assert_eq!(doc.root().fields[0].list_size, Some(10));
    }

    #[test]
    fn test_variable_paging_argument_has_no_estimate() {
        let doc = parse_document("query Q($n: Int) { users(first: $n) { id } }").unwrap();
        assert_eq!(doc.root().fields[0].list_size, None);
    }

    #[test]
    fn test_negative_paging_argument_ignored() {
        let doc = parse_document("{ users(first: -5) { id } }").unwrap();
        assert_eq!(doc.root().fields[0].list_size, None);
    }

    #[test]
    fn test_non_paging_arguments_ignored() {
        let doc = parse_document(r#"{ users(role: ADMIN, active: true) { id } }"#).unwrap();
        assert_eq!(doc.root().fields[0].list_size, None);
    }

    #[test]
    fn test_variable_definitions_with_defaults_skipped() {
        let doc =
            parse_document("query Q($n: Int = 10, $tags: [String!] = []) { users { id } }")
                .unwrap();
        assert_eq!(doc.operation.name.as_deref(), Some("Q"));
        assert_eq!(doc.root().fields[0].name, "users");
    }

    #[test]
    fn test_inline_fragment_flattened() {
        let doc = parse_document("{ users { ... on Admin { permissions } id } }").unwrap();
        let users = doc.root().fields[0].selection_set.as_ref().unwrap();
        assert_eq!(users.fields.len(), 2);
        assert_eq!(users.fields[0].name, "permissions");
        assert_eq!(users.fields[1].name, "id");
    }

    #[test]
    fn test_untyped_inline_fragment() {
        let doc = parse_document("{ users { ... { id } } }").unwrap();
        let users = doc.root().fields[0].selection_set.as_ref().unwrap();
        assert_eq!(users.fields[0].name, "id");
    }

    #[test]
    fn test_named_fragment_spread_rejected() {
        let err = parse_document("{ users { ...UserParts } }").unwrap_err();
        assert_eq!(err, ParseError::UnsupportedFragment);
    }

    #[test]
    fn test_directives_skipped() {
        let doc = parse_document("{ users @include(if: true) { id @skip(if: false) } }").unwrap();
        let users = &doc.root().fields[0];
        assert_eq!(users.name, "users");
        assert_eq!(users.selection_set.as_ref().unwrap().fields[0].name, "id");
    }

    #[test]
    fn test_comments_and_commas_insignificant() {
        let doc = parse_document("{\n  # who is asking\n  users, { id, name, } }").unwrap();
        assert_eq!(doc.root().fields[0].name, "users");
    }

    #[test]
    fn test_string_argument_with_braces() {
        let doc = parse_document(r#"{ search(filter: "{nested: \"braces\"}") { id } }"#).unwrap();
        assert_eq!(doc.root().fields[0].name, "search");
    }

    #[test]
    fn test_object_and_list_argument_values() {
        let doc =
            parse_document(r#"{ search(where: {tags: ["a", "b"], depth: 2}) { id } }"#).unwrap();
        assert_eq!(doc.root().fields[0].name, "search");
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(parse_document("").unwrap_err(), ParseError::Empty);
        assert_eq!(parse_document("  \n# only a comment").unwrap_err(), ParseError::Empty);
    }

    #[test]
    fn test_empty_selection_set() {
        assert_eq!(parse_document("{}").unwrap_err(), ParseError::EmptySelection);
    }

    #[test]
    fn test_truncated_document() {
        assert_eq!(parse_document("{ users { id }").unwrap_err(), ParseError::UnexpectedEnd);
    }

    #[test]
    fn test_multiple_operations_rejected() {
        let err = parse_document("query A { users { id } } query B { users { id } }").unwrap_err();
        assert_eq!(err, ParseError::MultipleOperations);

        let err = parse_document("{ a } { b }").unwrap_err();
        assert_eq!(err, ParseError::MultipleOperations);
    }

    #[test]
    fn test_fragment_definition_rejected() {
        let err = parse_document("{ a } fragment F on User { id }").unwrap_err();
        assert_eq!(err, ParseError::MultipleOperations);
    }

    #[test]
    fn test_invalid_character() {
        assert_eq!(
            parse_document("{ users; }").unwrap_err(),
            ParseError::InvalidCharacter(';')
        );
    }

    #[test]
    fn test_block_string_argument() {
        let doc = parse_document(r#"{ notes(content: """multi "line" body""") { id } }"#).unwrap();
        assert_eq!(doc.root().fields[0].name, "notes");
    }
}
