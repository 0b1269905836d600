// SCR - Live Code Execution Visualizer
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! JavaScript tokenizer.

use crate::{
    instrumentation::{ast::Span, common::LineIndex},
    ParseError,
};

/// Punctuators, longest first so that the first prefix match wins.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-",
    "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".",
];

/// Keywords after which a `/` starts a regular expression.
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

/// Statement heads whose parenthesized part may be followed by a regex.
const REGEX_AFTER_HEAD: &[&str] = &["if", "while", "for", "with"];

/// Statement heads whose parenthesized part is followed by a block.
const BLOCK_AFTER_HEAD: &[&str] = &["if", "while", "for", "with", "switch", "catch"];

/// Kind of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifiers and keywords alike.
    Ident(String),
    /// A numeric literal.
    Number,
    /// A quoted string literal.
    String,
    /// A whole template literal, substitutions included.
    Template {
        /// Whether the literal contains `${ … }` parts.
        substitutions: bool,
    },
    /// A regular expression literal, flags included.
    Regex,
    /// A punctuator.
    Punct(&'static str),
    /// End of input.
    Eof,
}

/// A token and where it sits in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Kind of the token.
    pub kind: TokenKind,
    /// Byte span of the token.
    pub span: Span,
    /// A line terminator separates this token from the previous one.
    pub newline_before: bool,
}

impl Token {
    /// Whether the token is the given punctuator.
    pub fn is_punct(&self, punct: &str) -> bool {
        matches!(self.kind, TokenKind::Punct(p) if p == punct)
    }

    /// Whether the token is the given identifier or keyword.
    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(n) if n == name)
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Ident(name) => format!("`{name}`"),
            TokenKind::Number => "number".to_string(),
            TokenKind::String => "string".to_string(),
            TokenKind::Template { .. } => "template literal".to_string(),
            TokenKind::Regex => "regular expression".to_string(),
            TokenKind::Punct(p) => format!("`{p}`"),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// Splits the source into tokens. The last token is always [`TokenKind::Eof`].
pub fn lex(lines: &LineIndex<'_>) -> Result<Vec<Token>, ParseError> {
    Lexer::new(lines).lex()
}

/// An open bracket and what its closing counterpart allows next.
#[derive(Debug, Clone, Copy, Default)]
struct Bracket {
    /// A `/` right after the closing bracket starts a regex.
    regex_after_close: bool,
    /// A `{` right after the closing bracket opens a block.
    block_after_close: bool,
}

struct Lexer<'a, 'src> {
    src: &'src str,
    lines: &'a LineIndex<'src>,
    pos: usize,
    tokens: Vec<Token>,
    /// Whether each token sits where a statement may start.
    statement_starts: Vec<bool>,
    /// Brackets not closed yet, innermost last.
    open: Vec<Bracket>,
    /// The bracket closed by the last `)`, `]` or `}`.
    closed: Option<Bracket>,
    newline_before: bool,
}

impl<'a, 'src> Lexer<'a, 'src> {
    fn new(lines: &'a LineIndex<'src>) -> Self {
        Self {
            src: lines.source(),
            lines,
            pos: 0,
            tokens: Vec::new(),
            statement_starts: Vec::new(),
            open: Vec::new(),
            closed: None,
            newline_before: false,
        }
    }

    fn lex(mut self) -> Result<Vec<Token>, ParseError> {
        if self.src.starts_with("#!") {
            self.skip_line();
        }

        loop {
            self.skip_trivia()?;
            let start = self.pos;
            let Some(c) = self.peek_char() else {
                self.push(TokenKind::Eof, start);
                break;
            };

            let kind = if is_ident_start(c) {
                TokenKind::Ident(self.take_while(is_ident_cont).to_string())
            } else if c.is_ascii_digit()
                || (c == '.' && self.peek_nth_char(1).is_some_and(|d| d.is_ascii_digit()))
            {
                self.lex_number()?;
                TokenKind::Number
            } else if c == '"' || c == '\'' {
                self.lex_string(c)?;
                TokenKind::String
            } else if c == '`' {
                let substitutions = self.lex_template()?;
                TokenKind::Template { substitutions }
            } else if c == '/' && self.regex_allowed() {
                self.lex_regex()?;
                TokenKind::Regex
            } else {
                let punct = self
                    .lex_punct()
                    .ok_or_else(|| self.lines.error(format!("unexpected character {c:?}"), start))?;
                TokenKind::Punct(punct)
            };
            self.push(kind, start);
        }

        Ok(self.tokens)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        let starts_statement = self.at_statement_start();
        match kind {
            TokenKind::Punct("(") => {
                let head = match self.tokens.last().map(|t| &t.kind) {
                    Some(TokenKind::Ident(name)) => name.as_str(),
                    _ => "",
                };
                let bracket = Bracket {
                    regex_after_close: REGEX_AFTER_HEAD.contains(&head),
                    block_after_close: BLOCK_AFTER_HEAD.contains(&head)
                        || self.opens_declaration_params(),
                };
                self.open.push(bracket);
            }
            TokenKind::Punct("{") => self.open.push(Bracket {
                regex_after_close: starts_statement,
                block_after_close: starts_statement,
            }),
            TokenKind::Punct("[") => self.open.push(Bracket::default()),
            TokenKind::Punct(")" | "]" | "}") => self.closed = self.open.pop(),
            _ => {}
        }

        let newline_before = std::mem::take(&mut self.newline_before);
        self.tokens.push(Token { kind, span: Span::new(start, self.pos), newline_before });
        self.statement_starts.push(starts_statement);
    }

    /// Whether the next token sits where a statement may start.
    fn at_statement_start(&self) -> bool {
        let Some(last) = self.tokens.last() else {
            return true;
        };
        match &last.kind {
            TokenKind::Punct(";") => true,
            TokenKind::Punct("{" | ":") => self.open.last().is_some_and(|b| b.block_after_close),
            TokenKind::Punct(")" | "}") => self.closed.is_some_and(|b| b.block_after_close),
            TokenKind::Ident(name) => matches!(name.as_str(), "else" | "do" | "try" | "finally"),
            _ => false,
        }
    }

    /// Whether a `(` about to be pushed opens the parameters of a function
    /// declaration, `async` functions and generators included.
    fn opens_declaration_params(&self) -> bool {
        let mut rest = self.tokens.iter().enumerate().rev().peekable();
        if rest
            .peek()
            .is_some_and(|(_, t)| matches!(&t.kind, TokenKind::Ident(n) if n != "function"))
        {
            rest.next();
        }
        if rest.peek().is_some_and(|(_, t)| t.is_punct("*")) {
            rest.next();
        }
        match rest.next() {
            Some((at, t)) if t.is_ident("function") => {
                self.statement_starts[at]
                    || rest.next().is_some_and(|(before, t)| {
                        t.is_ident("async") && self.statement_starts[before]
                    })
            }
            _ => false,
        }
    }

    fn regex_allowed(&self) -> bool {
        match self.tokens.last().map(|t| &t.kind) {
            None => true,
            Some(TokenKind::Punct(")" | "}")) => self.closed.is_some_and(|b| b.regex_after_close),
            Some(TokenKind::Punct(p)) => !matches!(*p, "]" | "++" | "--"),
            Some(TokenKind::Ident(name)) => REGEX_PRECEDING_KEYWORDS.contains(&name.as_str()),
            Some(_) => false,
        }
    }

    fn lex_regex(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let mut in_class = false;
        self.bump();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(self.lines.error("unterminated regular expression", start))
                }
                Some('\\') => {
                    self.bump();
                }
                Some('[') => in_class = true,
                Some(']') => in_class = false,
                Some('/') if !in_class => break,
                Some(_) => {}
            }
        }
        self.take_while(is_ident_cont);
        Ok(())
    }

    fn lex_punct(&mut self) -> Option<&'static str> {
        let rest = &self.src[self.pos..];
        for &punct in PUNCTUATORS {
            if !rest.starts_with(punct) {
                continue;
            }
            // `a?.5:b` is a conditional, not an optional chain
            if punct == "?." && rest[2..].starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            self.pos += punct.len();
            return Some(punct);
        }
        None
    }
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_cont(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
