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

//! Recursive descent parser for the supported JavaScript subset.
//!
//! Statements are parsed by recursive descent, expressions by precedence
//! climbing. Constructs outside the subset are reported as [`ParseError`]s
//! rather than skipped, so that the caller can fall back to running the
//! source untraced.

use crate::{
    instrumentation::{
        ast::*,
        common::LineIndex,
        lexer::{lex, Token, TokenKind},
    },
    ParseError,
};

const RESERVED_WORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "export", "extends", "false", "finally", "for", "function", "if", "import", "in",
    "instanceof", "new", "null", "return", "super", "switch", "this", "throw", "true", "try",
    "typeof", "var", "void", "while", "with", "yield", "await",
];

const ASSIGNMENT_OPERATORS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "%=", "**=", "<<=", ">>=", ">>>=", "&=", "|=", "^=", "&&=",
    "||=", "??=",
];

/// Deepest nesting of statements and expressions the parser descends into.
pub const MAX_NESTING: usize = 64;

/// Longest chain of operators, member accesses or calls in one expression.
pub const MAX_CHAIN: usize = 256;

type Result<T> = std::result::Result<T, ParseError>;

/// Parses a whole script.
pub fn parse_program(lines: &LineIndex<'_>) -> Result<Program> {
    let tokens = lex(lines)?;
    let mut parser = Parser::new(lines, tokens);
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.parse_statement()?);
    }
    Ok(Program { body, span: Span::new(0, lines.source().len()) })
}

/// Binding powers of binary operators, `(left, right)`.
fn infix_binding_power(op: &str) -> Option<(u8, u8)> {
    let precedence = match op {
        "??" | "||" => 2,
        "&&" => 3,
        "|" => 4,
        "^" => 5,
        "&" => 6,
        "==" | "!=" | "===" | "!==" => 7,
        "<" | ">" | "<=" | ">=" | "instanceof" | "in" => 8,
        "<<" | ">>" | ">>>" => 9,
        "+" | "-" => 10,
        "*" | "/" | "%" => 11,
        // right associative
        "**" => return Some((25, 24)),
        _ => return None,
    };
    Some((precedence * 2, precedence * 2 + 1))
}

fn is_reserved(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

fn is_logical(op: &str) -> bool {
    matches!(op, "&&" | "||" | "??")
}

struct Parser<'a, 'src> {
    lines: &'a LineIndex<'src>,
    tokens: Vec<Token>,
    pos: usize,
    /// Set while parsing a `for` head, where `in` is not an operator.
    no_in: bool,
    /// Statements and expressions currently being parsed, outermost included.
    nesting: usize,
}

impl<'a, 'src> Parser<'a, 'src> {
    fn new(lines: &'a LineIndex<'src>, tokens: Vec<Token>) -> Self {
        Self { lines, tokens, pos: 0, no_in: false, nesting: 0 }
    }

    // ---------------------------------------------------------------------
    // Token helpers
    // ---------------------------------------------------------------------

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if !matches!(token.kind, TokenKind::Eof) {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn at_punct(&self, punct: &str) -> bool {
        self.peek().is_punct(punct)
    }

    fn at_ident(&self, name: &str) -> bool {
        self.peek().is_ident(name)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        let found = self.at_punct(punct);
        if found {
            self.pos += 1;
        }
        found
    }

    fn eat_ident(&mut self, name: &str) -> bool {
        let found = self.at_ident(name);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect_punct(&mut self, punct: &str) -> Result<Span> {
        if self.at_punct(punct) {
            Ok(self.next().span)
        } else {
            Err(self.unexpected(&format!("expected `{punct}`")))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<Span> {
        if self.at_ident(keyword) {
            Ok(self.next().span)
        } else {
            Err(self.unexpected(&format!("expected `{keyword}`")))
        }
    }

    /// End offset of the last consumed token.
    fn last_end(&self) -> usize {
        self.pos.checked_sub(1).map_or(0, |i| self.tokens[i].span.end)
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.last_end().max(start))
    }

    fn unexpected(&self, message: &str) -> ParseError {
        let token = self.peek();
        self.lines.error(format!("{message}, found {}", token.describe()), token.span.start)
    }

    fn unsupported(&self, what: &str) -> ParseError {
        self.lines.error(format!("{what} are not supported"), self.peek().span.start)
    }

    /// Consumes a statement terminator, honouring automatic semicolon insertion.
    fn consume_semicolon(&mut self) -> Result<()> {
        if self.eat_punct(";") || self.at_punct("}") || self.at_eof() || self.peek().newline_before
        {
            return Ok(());
        }
        Err(self.unexpected("expected `;`"))
    }

    fn binding_ident(&mut self) -> Result<Ident> {
        if self.at_punct("[") || self.at_punct("{") {
            return Err(self.unsupported("destructuring patterns"));
        }
        match &self.peek().kind {
            TokenKind::Ident(name) if !is_reserved(name) => {
                let name = name.clone();
                let span = self.next().span;
                Ok(Ident { name, span })
            }
            _ => Err(self.unexpected("expected identifier")),
        }
    }

    fn at_binding_ident(&self, n: usize) -> bool {
        matches!(&self.peek_at(n).kind, TokenKind::Ident(name) if !is_reserved(name))
    }

    /// Runs `f` one nesting level deeper, failing past [`MAX_NESTING`].
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.nesting >= MAX_NESTING {
            return Err(self.lines.error("expression nesting too deep", self.peek().span.start));
        }
        self.nesting += 1;
        let result = f(self);
        self.nesting -= 1;
        result
    }

    fn check_chain(&self, links: usize) -> Result<()> {
        if links > MAX_CHAIN {
            return Err(self.lines.error("expression chain too long", self.peek().span.start));
        }
        Ok(())
    }

    fn with_in<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = std::mem::replace(&mut self.no_in, false);
        let result = f(self);
        self.no_in = saved;
        result
    }

    // ---------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<Stmt> {
        self.nested(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt> {
        let start = self.peek().span.start;
        let TokenKind::Ident(word) = self.peek().kind.clone() else {
            if self.at_punct("{") {
                return self.parse_block();
            }
            if self.eat_punct(";") {
                return Ok(Stmt::Empty(self.span_from(start)));
            }
            return self.parse_expression_statement();
        };

        match word.as_str() {
            "var" | "const" => {
                let decl = self.parse_var_decl()?;
                self.consume_semicolon()?;
                Ok(Stmt::Var(decl))
            }
            "let" if self.at_binding_ident(1)
                || self.peek_at(1).is_punct("[")
                || self.peek_at(1).is_punct("{") =>
            {
                let decl = self.parse_var_decl()?;
                self.consume_semicolon()?;
                Ok(Stmt::Var(decl))
            }
            "function" => Ok(Stmt::Function(Box::new(self.parse_function(true)?))),
            "async"
                if self.peek_at(1).is_ident("function") && !self.peek_at(1).newline_before =>
            {
                Ok(Stmt::Function(Box::new(self.parse_function(true)?)))
            }
            "if" => self.parse_if(),
            "while" => {
                self.next();
                let test = self.parse_paren_test()?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::While { test, body, span: self.span_from(start) })
            }
            "do" => {
                self.next();
                let body = Box::new(self.parse_statement()?);
                self.expect_keyword("while")?;
                let test = self.parse_paren_test()?;
                self.eat_punct(";");
                Ok(Stmt::DoWhile { body, test, span: self.span_from(start) })
            }
            "for" => self.parse_for(),
            "return" => {
                self.next();
                let arg = if self.at_punct(";")
                    || self.at_punct("}")
                    || self.at_eof()
                    || self.peek().newline_before
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_semicolon()?;
                Ok(Stmt::Return { arg, span: self.span_from(start) })
            }
            "break" | "continue" => {
                self.next();
                if self.at_binding_ident(0) && !self.peek().newline_before {
                    self.next();
                }
                self.consume_semicolon()?;
                Ok(Stmt::Jump(self.span_from(start)))
            }
            "throw" => {
                self.next();
                let arg = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Throw { arg, span: self.span_from(start) })
            }
            "try" => self.parse_try(),
            "switch" => self.parse_switch(),
            "class" => Err(self.unsupported("classes")),
            "import" | "export" => Err(self.unsupported("modules")),
            "with" => Err(self.unsupported("`with` statements")),
            "debugger" => {
                self.next();
                self.consume_semicolon()?;
                Ok(Stmt::Empty(self.span_from(start)))
            }
            _ if self.peek_at(1).is_punct(":") => Err(self.unsupported("labelled statements")),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt> {
        let start = self.peek().span.start;
        let expr = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Stmt::Expr { expr, span: self.span_from(start) })
    }

    fn parse_block(&mut self) -> Result<Stmt> {
        let (body, span) = self.parse_braced_statements()?;
        Ok(Stmt::Block { body, span })
    }

    fn parse_braced_statements(&mut self) -> Result<(Vec<Stmt>, Span)> {
        let start = self.expect_punct("{")?.start;
        let mut body = Vec::new();
        while !self.at_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected("expected `}`"));
            }
            body.push(self.parse_statement()?);
        }
        self.next();
        Ok((body, self.span_from(start)))
    }

    fn parse_paren_test(&mut self) -> Result<Expr> {
        self.expect_punct("(")?;
        let test = self.with_in(|p| p.parse_expression())?;
        self.expect_punct(")")?;
        Ok(test)
    }

    fn parse_var_kind(&mut self) -> Result<VarKind> {
        let kind = match &self.peek().kind {
            TokenKind::Ident(w) if w == "var" => VarKind::Var,
            TokenKind::Ident(w) if w == "let" => VarKind::Let,
            TokenKind::Ident(w) if w == "const" => VarKind::Const,
            _ => return Err(self.unexpected("expected declaration")),
        };
        self.next();
        Ok(kind)
    }

    fn parse_var_decl(&mut self) -> Result<VarDecl> {
        let start = self.peek().span.start;
        let kind = self.parse_var_kind()?;
        let mut declarators = Vec::new();
        loop {
            let name = self.binding_ident()?;
            let init = if self.eat_punct("=") { Some(self.parse_assign()?) } else { None };
            let span = self.span_from(name.span.start);
            declarators.push(VarDeclarator { name, init, span });
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(VarDecl { kind, declarators, span: self.span_from(start) })
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let start = self.expect_keyword("if")?.start;
        let test = self.parse_paren_test()?;
        let cons = Box::new(self.parse_statement()?);
        let alt =
            if self.eat_ident("else") { Some(Box::new(self.parse_statement()?)) } else { None };
        Ok(Stmt::If { test, cons, alt, span: self.span_from(start) })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        let start = self.expect_keyword("for")?.start;
        if self.at_ident("await") {
            return Err(self.unsupported("`for await` loops"));
        }
        self.expect_punct("(")?;

        let is_decl = self.at_ident("var")
            || self.at_ident("const")
            || (self.at_ident("let")
                && (self.at_binding_ident(1) || self.peek_at(1).is_punct("[")));

        let mut init = None;
        if is_decl {
            let iterates = self.peek_at(2).is_ident("of") || self.peek_at(2).is_ident("in");
            if iterates && self.at_binding_ident(1) {
                let kind = self.parse_var_kind()?;
                let name = self.binding_ident()?;
                return self.parse_for_in_rest(start, ForHead::Var(kind, name));
            }
            self.no_in = true;
            let decl = self.parse_var_decl();
            self.no_in = false;
            init = Some(ForInit::Var(decl?));
        } else if !self.at_punct(";") {
            self.no_in = true;
            let expr = self.parse_expression();
            self.no_in = false;
            let expr = expr?;
            if self.at_ident("of") || self.at_ident("in") {
                if !is_simple_target(&expr) {
                    return Err(self.lines.error("invalid loop variable", expr.span.start));
                }
                return self.parse_for_in_rest(start, ForHead::Expr(expr));
            }
            init = Some(ForInit::Expr(expr));
        }

        self.expect_punct(";")?;
        let test = if self.at_punct(";") { None } else { Some(self.parse_expression()?) };
        self.expect_punct(";")?;
        let update = if self.at_punct(")") { None } else { Some(self.parse_expression()?) };
        self.expect_punct(")")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For { init, test, update, body, span: self.span_from(start) })
    }

    fn parse_for_in_rest(&mut self, start: usize, head: ForHead) -> Result<Stmt> {
        let of = self.at_ident("of");
        self.next();
        let right = if of { self.parse_assign()? } else { self.parse_expression()? };
        self.expect_punct(")")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::ForIn { head, right, of, body, span: self.span_from(start) })
    }

    fn parse_try(&mut self) -> Result<Stmt> {
        let start = self.expect_keyword("try")?.start;
        let block = Box::new(self.parse_block()?);
        let handler = if self.eat_ident("catch") {
            let param = if self.eat_punct("(") {
                let param = self.binding_ident()?;
                self.expect_punct(")")?;
                Some(param)
            } else {
                None
            };
            Some((param, Box::new(self.parse_block()?)))
        } else {
            None
        };
        let finalizer =
            if self.eat_ident("finally") { Some(Box::new(self.parse_block()?)) } else { None };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.unexpected("expected `catch` or `finally`"));
        }
        Ok(Stmt::Try { block, handler, finalizer, span: self.span_from(start) })
    }

    fn parse_switch(&mut self) -> Result<Stmt> {
        let start = self.expect_keyword("switch")?.start;
        let discriminant = self.parse_paren_test()?;
        self.expect_punct("{")?;
        let mut cases = Vec::new();
        while !self.eat_punct("}") {
            let test = if self.eat_ident("case") {
                Some(self.parse_expression()?)
            } else if self.eat_ident("default") {
                None
            } else {
                return Err(self.unexpected("expected `case` or `default`"));
            };
            self.expect_punct(":")?;
            let mut body = Vec::new();
            while !(self.at_ident("case") || self.at_ident("default") || self.at_punct("}")) {
                if self.at_eof() {
                    return Err(self.unexpected("expected `}`"));
                }
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        Ok(Stmt::Switch { discriminant, cases, span: self.span_from(start) })
    }

    // ---------------------------------------------------------------------
    // Functions
    // ---------------------------------------------------------------------

    /// Parses `[async] function [*] [name] (params) { body }`.
    fn parse_function(&mut self, is_statement: bool) -> Result<Function> {
        let start = self.peek().span.start;
        self.eat_ident("async");
        self.expect_keyword("function")?;
        self.eat_punct("*");
        let name = if self.at_binding_ident(0) {
            Some(self.binding_ident()?)
        } else if is_statement {
            return Err(self.unexpected("expected function name"));
        } else {
            None
        };
        let params = self.parse_params()?;
        let body = self.parse_function_body()?;
        let kind = if is_statement { FunctionKind::Declaration } else { FunctionKind::Expression };
        Ok(Function { name, kind, params, body, span: self.span_from(start) })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.at_punct(")") {
            let rest = self.eat_punct("...");
            let name = self.binding_ident()?;
            let default = if self.eat_punct("=") {
                Some(self.with_in(|p| p.parse_assign())?)
            } else {
                None
            };
            params.push(Param { name, default, rest });
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(params)
    }

    fn parse_function_body(&mut self) -> Result<FunctionBody> {
        let (body, span) = self.with_in(|p| p.parse_braced_statements())?;
        Ok(FunctionBody::Block { body, span })
    }

    /// Index of the token closing the parenthesis at `open`, if any.
    fn matching_paren(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(open) {
            match token.kind {
                TokenKind::Punct("(") => depth += 1,
                TokenKind::Punct(")") => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                TokenKind::Eof => return None,
                _ => {}
            }
        }
        None
    }

    /// Whether an arrow function starts at the current token.
    fn at_arrow(&self) -> bool {
        if self.at_binding_ident(0) && self.peek_at(1).is_punct("=>") {
            return true;
        }
        let offset = usize::from(self.at_ident("async") && !self.peek_at(1).newline_before);
        if offset == 1 && self.at_binding_ident(1) && self.peek_at(2).is_punct("=>") {
            return true;
        }
        self.peek_at(offset).is_punct("(")
            && self
                .matching_paren(self.pos + offset)
                .and_then(|close| self.tokens.get(close + 1))
                .is_some_and(|t| t.is_punct("=>"))
    }

    fn parse_arrow(&mut self) -> Result<Expr> {
        let start = self.peek().span.start;
        if self.at_ident("async") && !self.peek_at(1).is_punct("=>") {
            self.next();
        }
        let params = if self.at_punct("(") {
            self.parse_params()?
        } else {
            vec![Param { name: self.binding_ident()?, default: None, rest: false }]
        };
        self.expect_punct("=>")?;
        let body = if self.at_punct("{") {
            self.parse_function_body()?
        } else {
            FunctionBody::Expr(Box::new(self.parse_assign()?))
        };
        let span = self.span_from(start);
        let function = Function { name: None, kind: FunctionKind::Arrow, params, body, span };
        Ok(Expr::new(ExprKind::Function(Box::new(function)), span))
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    /// Parses a comma separated expression.
    fn parse_expression(&mut self) -> Result<Expr> {
        let first = self.parse_assign()?;
        if !self.at_punct(",") {
            return Ok(first);
        }
        let start = first.span.start;
        let mut exprs = vec![first];
        while self.eat_punct(",") {
            exprs.push(self.parse_assign()?);
        }
        Ok(Expr::new(ExprKind::Sequence(exprs), self.span_from(start)))
    }

    fn parse_assign(&mut self) -> Result<Expr> {
        self.nested(Self::parse_assign_inner)
    }

    fn parse_assign_inner(&mut self) -> Result<Expr> {
        if self.at_arrow() {
            return self.parse_arrow();
        }
        if self.at_ident("yield") {
            return self.parse_yield();
        }

        let start = self.peek().span.start;
        let target = self.parse_conditional()?;

        let op = match self.peek().kind {
            TokenKind::Punct(op) if ASSIGNMENT_OPERATORS.contains(&op) => op,
            _ => return Ok(target),
        };
        let unwrapped = target.unparenthesized();
        if matches!(unwrapped.kind, ExprKind::Array(_) | ExprKind::Object(_)) {
            return Err(self.lines.error("destructuring patterns are not supported", start));
        }
        if !is_simple_target(unwrapped) {
            return Err(self.lines.error("invalid assignment target", start));
        }
        self.next();
        let value = self.parse_assign()?;
        Ok(Expr::new(
            ExprKind::Assign { op, target: Box::new(target), value: Box::new(value) },
            self.span_from(start),
        ))
    }

    fn parse_yield(&mut self) -> Result<Expr> {
        let start = self.next().span.start;
        let delegate = self.eat_punct("*");
        let next = self.peek();
        let ends = next.newline_before
            || next.is_punct(")")
            || next.is_punct("]")
            || next.is_punct("}")
            || next.is_punct(",")
            || next.is_punct(";")
            || next.is_punct(":")
            || matches!(next.kind, TokenKind::Eof);
        let arg = if ends && !delegate { None } else { Some(Box::new(self.parse_assign()?)) };
        Ok(Expr::new(ExprKind::Yield { arg, delegate }, self.span_from(start)))
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        let start = self.peek().span.start;
        let test = self.parse_binary(0)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let cons = self.with_in(|p| p.parse_assign())?;
        self.expect_punct(":")?;
        let alt = self.parse_assign()?;
        Ok(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                cons: Box::new(cons),
                alt: Box::new(alt),
            },
            self.span_from(start),
        ))
    }

    fn parse_binary(&mut self, min_bp: u8) -> Result<Expr> {
        let start = self.peek().span.start;
        let mut lhs = self.parse_unary()?;

        let mut links = 0;
        loop {
            let op: &'static str = match &self.peek().kind {
                TokenKind::Punct(p) => *p,
                TokenKind::Ident(w) if w == "instanceof" => "instanceof",
                TokenKind::Ident(w) if w == "in" && !self.no_in => "in",
                _ => break,
            };
            let Some((l_bp, r_bp)) = infix_binding_power(op) else { break };
            if l_bp < min_bp {
                break;
            }
            links += 1;
            self.check_chain(links)?;
            self.next();
            let rhs = self.nested(|p| p.parse_binary(r_bp))?;
            let (left, right) = (Box::new(lhs), Box::new(rhs));
            let kind = if is_logical(op) {
                ExprKind::Logical { op, left, right }
            } else {
                ExprKind::Binary { op, left, right }
            };
            lhs = Expr::new(kind, self.span_from(start));
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let start = self.peek().span.start;
        let op: Option<&'static str> = match &self.peek().kind {
            TokenKind::Punct(p @ ("!" | "-" | "+" | "~")) => Some(*p),
            TokenKind::Ident(w) => match w.as_str() {
                "typeof" => Some("typeof"),
                "void" => Some("void"),
                "delete" => Some("delete"),
                "await" => Some("await"),
                _ => None,
            },
            _ => None,
        };
        if let Some(op) = op {
            self.next();
            let arg = Box::new(self.nested(Self::parse_unary)?);
            return Ok(Expr::new(ExprKind::Unary { op, arg }, self.span_from(start)));
        }

        if let TokenKind::Punct(op @ ("++" | "--")) = self.peek().kind {
            self.next();
            let arg = self.nested(Self::parse_unary)?;
            if !is_simple_target(arg.unparenthesized()) {
                return Err(self.lines.error("invalid update target", arg.span.start));
            }
            return Ok(Expr::new(
                ExprKind::Update { op, prefix: true, arg: Box::new(arg) },
                self.span_from(start),
            ));
        }

        let expr = self.parse_call_member()?;
        if let TokenKind::Punct(op @ ("++" | "--")) = self.peek().kind {
            if !self.peek().newline_before {
                if !is_simple_target(expr.unparenthesized()) {
                    return Err(self.lines.error("invalid update target", expr.span.start));
                }
                self.next();
                return Ok(Expr::new(
                    ExprKind::Update { op, prefix: false, arg: Box::new(expr) },
                    self.span_from(start),
                ));
            }
        }
        Ok(expr)
    }

    fn parse_call_member(&mut self) -> Result<Expr> {
        let start = self.peek().span.start;
        let mut expr = if self.at_ident("new") { self.parse_new()? } else { self.parse_primary()? };

        let mut links = 0;
        loop {
            links += 1;
            self.check_chain(links)?;
            if self.eat_punct(".") {
                let property = MemberProp::Name(self.property_name()?);
                expr = self.member(expr, property, false, start);
            } else if self.eat_punct("?.") {
                if self.at_punct("(") {
                    let args = self.parse_args()?;
                    expr = Expr::new(
                        ExprKind::Call { callee: Box::new(expr), args, optional: true },
                        self.span_from(start),
                    );
                } else if self.eat_punct("[") {
                    let property = self.parse_computed_property()?;
                    expr = self.member(expr, property, true, start);
                } else {
                    let property = MemberProp::Name(self.property_name()?);
                    expr = self.member(expr, property, true, start);
                }
            } else if self.eat_punct("[") {
                let property = self.parse_computed_property()?;
                expr = self.member(expr, property, false, start);
            } else if self.at_punct("(") {
                let args = self.parse_args()?;
                expr = Expr::new(
                    ExprKind::Call { callee: Box::new(expr), args, optional: false },
                    self.span_from(start),
                );
            } else if matches!(self.peek().kind, TokenKind::Template { .. }) {
                return Err(self.unsupported("tagged templates"));
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_new(&mut self) -> Result<Expr> {
        let start = self.expect_keyword("new")?.start;
        if self.at_punct(".") {
            return Err(self.unsupported("`new.target` expressions"));
        }
        let mut callee = if self.at_ident("new") {
            self.nested(Self::parse_new)?
        } else {
            self.parse_primary()?
        };
        let mut links = 0;
        loop {
            links += 1;
            self.check_chain(links)?;
            if self.eat_punct(".") {
                let property = MemberProp::Name(self.property_name()?);
                callee = self.member(callee, property, false, start);
            } else if self.eat_punct("[") {
                let property = self.parse_computed_property()?;
                callee = self.member(callee, property, false, start);
            } else {
                break;
            }
        }
        let args = if self.at_punct("(") { self.parse_args()? } else { Vec::new() };
        Ok(Expr::new(ExprKind::New { callee: Box::new(callee), args }, self.span_from(start)))
    }

    fn member(&self, object: Expr, property: MemberProp, optional: bool, start: usize) -> Expr {
        let start = start.min(object.span.start);
        Expr::new(
            ExprKind::Member { object: Box::new(object), property, optional },
            self.span_from(start),
        )
    }

    fn parse_computed_property(&mut self) -> Result<MemberProp> {
        let property = self.with_in(|p| p.parse_expression())?;
        self.expect_punct("]")?;
        Ok(MemberProp::Computed(Box::new(property)))
    }

    /// Any identifier, reserved words included.
    fn property_name(&mut self) -> Result<Ident> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                let span = self.next().span;
                Ok(Ident { name, span })
            }
            _ => Err(self.unexpected("expected property name")),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>> {
        self.expect_punct("(")?;
        let args = self.with_in(|p| {
            let mut args = Vec::new();
            while !p.at_punct(")") {
                args.push(p.parse_spread_or_assign()?);
                if !p.eat_punct(",") {
                    break;
                }
            }
            Ok(args)
        })?;
        self.expect_punct(")")?;
        Ok(args)
    }

    fn parse_spread_or_assign(&mut self) -> Result<Expr> {
        let start = self.peek().span.start;
        if self.eat_punct("...") {
            let arg = self.parse_assign()?;
            return Ok(Expr::new(ExprKind::Spread(Box::new(arg)), self.span_from(start)));
        }
        self.parse_assign()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        let start = token.span.start;
        match &token.kind {
            TokenKind::Number | TokenKind::String | TokenKind::Regex => {
                self.next();
                Ok(Expr::new(ExprKind::Literal, token.span))
            }
            TokenKind::Template { substitutions } => {
                self.next();
                Ok(Expr::new(ExprKind::Template(*substitutions), token.span))
            }
            TokenKind::Punct("(") => {
                self.next();
                let inner = self.with_in(|p| p.parse_expression())?;
                self.expect_punct(")")?;
                Ok(Expr::new(ExprKind::Paren(Box::new(inner)), self.span_from(start)))
            }
            TokenKind::Punct("[") => self.parse_array(),
            TokenKind::Punct("{") => self.parse_object(),
            TokenKind::Ident(word) => match word.as_str() {
                "function" => self.parse_function_expr(),
                "async"
                    if self.peek_at(1).is_ident("function")
                        && !self.peek_at(1).newline_before =>
                {
                    self.parse_function_expr()
                }
                "this" => {
                    self.next();
                    Ok(Expr::new(ExprKind::This, token.span))
                }
                "true" | "false" | "null" => {
                    self.next();
                    Ok(Expr::new(ExprKind::Literal, token.span))
                }
                "class" => Err(self.unsupported("classes")),
                "super" => Err(self.unsupported("`super` expressions")),
                "import" => Err(self.unsupported("modules")),
                name if is_reserved(name) => Err(self.unexpected("expected expression")),
                name => {
                    let name = name.to_string();
                    self.next();
                    Ok(Expr::new(ExprKind::Ident(name), token.span))
                }
            },
            _ => Err(self.unexpected("expected expression")),
        }
    }

    fn parse_function_expr(&mut self) -> Result<Expr> {
        let function = self.parse_function(false)?;
        let span = function.span;
        Ok(Expr::new(ExprKind::Function(Box::new(function)), span))
    }

    fn parse_array(&mut self) -> Result<Expr> {
        let start = self.expect_punct("[")?.start;
        let elements = self.with_in(|p| {
            let mut elements = Vec::new();
            while !p.at_punct("]") {
                if p.eat_punct(",") {
                    elements.push(None);
                    continue;
                }
                elements.push(Some(p.parse_spread_or_assign()?));
                if !p.eat_punct(",") {
                    break;
                }
            }
            Ok(elements)
        })?;
        self.expect_punct("]")?;
        Ok(Expr::new(ExprKind::Array(elements), self.span_from(start)))
    }

    fn parse_object(&mut self) -> Result<Expr> {
        let start = self.expect_punct("{")?.start;
        let properties = self.with_in(|p| {
            let mut properties = Vec::new();
            while !p.at_punct("}") {
                properties.push(p.parse_property()?);
                if !p.eat_punct(",") {
                    break;
                }
            }
            Ok(properties)
        })?;
        self.expect_punct("}")?;
        Ok(Expr::new(ExprKind::Object(properties), self.span_from(start)))
    }

    fn at_property_key(&self, n: usize) -> bool {
        let token = self.peek_at(n);
        matches!(token.kind, TokenKind::Ident(_) | TokenKind::String | TokenKind::Number)
            || token.is_punct("[")
    }

    fn parse_property(&mut self) -> Result<Property> {
        let start = self.peek().span.start;
        if self.eat_punct("...") {
            let arg = self.parse_assign()?;
            return Ok(Property::Spread(arg));
        }
        if (self.at_ident("get") || self.at_ident("set")) && self.at_property_key(1) {
            return Err(self.unsupported("getters and setters"));
        }
        if self.at_ident("async") && self.at_property_key(1) && !self.peek_at(1).newline_before
            || self.at_ident("async") && self.peek_at(1).is_punct("*")
        {
            self.next();
        }
        let generator = self.eat_punct("*");

        let key_token = self.peek().clone();
        let key = match &key_token.kind {
            TokenKind::Ident(name) => {
                self.next();
                PropKey::Static(name.clone(), key_token.span)
            }
            TokenKind::String | TokenKind::Number => {
                self.next();
                let text = self.lines.source()[key_token.span.start..key_token.span.end]
                    .trim_matches(|c: char| c == '"' || c == '\'')
                    .to_string();
                PropKey::Static(text, key_token.span)
            }
            TokenKind::Punct("[") => {
                self.next();
                let expr = self.parse_assign()?;
                self.expect_punct("]")?;
                PropKey::Computed(expr)
            }
            _ => return Err(self.unexpected("expected property name")),
        };

        if self.at_punct("(") {
            let params = self.parse_params()?;
            let body = self.parse_function_body()?;
            let name = match &key {
                PropKey::Static(name, span) => Some(Ident { name: name.clone(), span: *span }),
                PropKey::Computed(_) => None,
            };
            let function = Function {
                name,
                kind: FunctionKind::Expression,
                params,
                body,
                span: self.span_from(start),
            };
            return Ok(Property::Method { key, function: Box::new(function) });
        }
        if generator {
            return Err(self.unexpected("expected `(`"));
        }
        if self.eat_punct(":") {
            let value = self.parse_assign()?;
            return Ok(Property::KeyValue { key, value });
        }
        match key {
            PropKey::Static(name, span)
                if matches!(key_token.kind, TokenKind::Ident(_)) && !is_reserved(&name) =>
            {
                if self.at_punct("=") {
                    return Err(self.unsupported("destructuring patterns"));
                }
                Ok(Property::Shorthand(Ident { name, span }))
            }
            _ => Err(self.unexpected("expected `:`")),
        }
    }
}

/// Identifiers and non-optional member expressions can be assigned to.
fn is_simple_target(expr: &Expr) -> bool {
    match &expr.unparenthesized().kind {
        ExprKind::Ident(_) => true,
        ExprKind::Member { .. } => !expr.unparenthesized().has_optional_link(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Result<Program> {
        parse_program(&LineIndex::new(src))
    }

    fn parse_expr(src: &str) -> Expr {
        let program = parse(src).unwrap();
        match program.body.into_iter().next() {
            Some(Stmt::Expr { expr, .. }) => expr,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expr("a + b * c");
        let ExprKind::Binary { op, right, .. } = expr.kind else { panic!("not binary") };
        assert_eq!(op, "+");
        assert!(matches!(right.kind, ExprKind::Binary { op: "*", .. }));

        let expr = parse_expr("a ** b ** c");
        let ExprKind::Binary { left, right, .. } = expr.kind else { panic!("not binary") };
        assert!(matches!(left.kind, ExprKind::Ident(_)));
        assert!(matches!(right.kind, ExprKind::Binary { op: "**", .. }));

        let expr = parse_expr("a || b && c");
        assert!(matches!(expr.kind, ExprKind::Logical { op: "||", .. }));
    }

    #[test]
    fn test_spans_cover_source() {
        let src = "foo(1, bar.baz)";
        let expr = parse_expr(src);
        assert_eq!(expr.span, Span::new(0, src.len()));
        let ExprKind::Call { args, .. } = expr.kind else { panic!("not a call") };
        assert_eq!(args[1].span, Span::new(7, 14));
    }

    #[test]
    fn test_arrows() {
        for src in ["x => x + 1", "(a, b = 2) => { return a; }", "async () => 1", "async x => x"] {
            let expr = parse_expr(src);
            let ExprKind::Function(function) = expr.kind else { panic!("not a function: {src}") };
            assert_eq!(function.kind, FunctionKind::Arrow);
        }
        // a parenthesized expression is not an arrow
        assert!(matches!(parse_expr("(a, b)").kind, ExprKind::Paren(_)));
    }

    #[test]
    fn test_automatic_semicolons() {
        let program = parse("let a = 1\nlet b = a\nb++\nreturn_value()").unwrap();
        assert_eq!(program.body.len(), 4);

        assert!(parse("let a = 1 let b = 2").is_err());
    }

    #[test]
    fn test_statements() {
        let src = r#"
            function f(n, ...rest) {
                for (let i = 0; i < n; i++) { if (i % 2) continue; }
                for (const k in obj) {}
                for (x of [1, 2]) {}
                do { n-- } while (n > 0)
                switch (n) { case 1: break; default: n = 2 }
                try { throw new Error("x") } catch (e) {} finally {}
                while (false);
                return { n, [k]: 1, m() { return this; } };
            }
        "#;
        let program = parse(src).unwrap();
        let Stmt::Function(function) = &program.body[0] else { panic!("not a function") };
        let FunctionBody::Block { body, .. } = &function.body else { panic!("no block body") };
        assert_eq!(body.len(), 8);
        assert!(function.params[1].rest);
    }

    #[test]
    fn test_for_in_with_in_operator_in_body() {
        let program = parse("for (var i = 0; i < 3; i++) { if ('a' in o) {} }").unwrap();
        assert!(matches!(program.body[0], Stmt::For { .. }));
    }

    #[test]
    fn test_optional_chains() {
        let expr = parse_expr("a?.b.c");
        assert!(expr.has_optional_link());
        assert!(parse("a?.b = 1").is_err());
    }

    #[test]
    fn test_regex_after_statement_heads() {
        let program = parse("if (a) /x/.test(s)\nfunction f() {}\n/re/.test(s)").unwrap();
        assert_eq!(program.body.len(), 3);
        assert!(matches!(program.body[2], Stmt::Expr { .. }));
    }

    #[test]
    fn test_unsupported_syntax() {
        for src in [
            "class A {}",
            "import x from 'y'",
            "const [a, b] = c",
            "const { a } = c",
            "label: for (;;) {}",
            "({ get x() { return 1 } })",
            "tag`x`",
        ] {
            let err = parse(src).unwrap_err();
            assert!(err.message.contains("not supported"), "{src}: {}", err.message);
        }
    }

    #[test]
    fn test_error_position() {
        let err = parse("let a = 1;\nlet b = ;").unwrap_err();
        assert_eq!(err.position, scr_common::Position::new(1, 8));
        assert!(err.message.contains("found `;`"));
    }

    #[test]
    fn test_nesting_limits() {
        let parens = |depth: usize| format!("let x = {}1{};", "(".repeat(depth), ")".repeat(depth));
        assert!(parse(&parens(32)).is_ok());
        let err = parse(&parens(1000)).unwrap_err();
        assert_eq!(err.message, "expression nesting too deep");

        assert!(parse(&format!("x = {}y;", "!".repeat(1000))).is_err());
        assert!(parse(&format!("{}f(){}", "if (a) {".repeat(500), "}".repeat(500))).is_err());

        let sum = |terms: usize| vec!["1"; terms].join(" + ");
        assert!(parse(&sum(200)).is_ok());
        let err = parse(&sum(1000)).unwrap_err();
        assert_eq!(err.message, "expression chain too long");
        assert!(parse(&format!("a{}", ".b".repeat(1000))).is_err());
    }
}
