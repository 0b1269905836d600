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

//! Syntax tree for the supported JavaScript subset.
//!
//! The tree only keeps what the instrumenter needs: node shapes and byte
//! spans into the original source. Nothing is ever printed back from the
//! tree; instrumentation inserts text at span boundaries instead.

/// A half-open byte range `[start, end)` in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Offset of the first byte.
    pub start: usize,
    /// Offset right after the last byte.
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The smallest span covering both.
    pub fn to(self, other: Self) -> Self {
        Self { start: self.start.min(other.start), end: self.end.max(other.end) }
    }
}

/// A whole script.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Top-level statements.
    pub body: Vec<Stmt>,
    /// The whole source.
    pub span: Span,
}

/// A name with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    /// The name.
    pub name: String,
    /// Where it appears.
    pub span: Span,
}

/// `var`, `let` or `const`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    /// `var`
    Var,
    /// `let`
    Let,
    /// `const`
    Const,
}

/// `name = init` inside a variable declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclarator {
    /// Declared name.
    pub name: Ident,
    /// Initializer, if any.
    pub init: Option<Expr>,
    /// From the name to the end of the initializer.
    pub span: Span,
}

/// A variable declaration statement, or the head of a `for`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    /// Declaration keyword.
    pub kind: VarKind,
    /// The declarators, in order.
    pub declarators: Vec<VarDeclarator>,
    /// The whole declaration.
    pub span: Span,
}

/// Initializer clause of a classic `for`.
#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    /// `for (let i = 0; …)`
    Var(VarDecl),
    /// `for (i = 0; …)`
    Expr(Expr),
}

/// Left-hand side of `for … in` / `for … of`.
#[derive(Debug, Clone, PartialEq)]
pub enum ForHead {
    /// `for (const x of …)`
    Var(VarKind, Ident),
    /// `for (x of …)`
    Expr(Expr),
}

/// One `case` (or `default`) of a `switch`.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` for `default`.
    pub test: Option<Expr>,
    /// Statements under the label.
    pub body: Vec<Stmt>,
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `let x = 1, y;`
    Var(VarDecl),
    /// `function f() {}`
    Function(Box<Function>),
    /// `return x;`
    Return {
        /// Returned value.
        arg: Option<Expr>,
        /// Whole statement.
        span: Span,
    },
    /// `if (test) cons else alt`
    If {
        /// Condition.
        test: Expr,
        /// Taken branch.
        cons: Box<Stmt>,
        /// `else` branch.
        alt: Option<Box<Stmt>>,
        /// Whole statement.
        span: Span,
    },
    /// `while (test) body`
    While {
        /// Condition.
        test: Expr,
        /// Loop body.
        body: Box<Stmt>,
        /// Whole statement.
        span: Span,
    },
    /// `do body while (test)`
    DoWhile {
        /// Loop body.
        body: Box<Stmt>,
        /// Condition.
        test: Expr,
        /// Whole statement.
        span: Span,
    },
    /// `for (init; test; update) body`
    For {
        /// Initializer clause.
        init: Option<ForInit>,
        /// Condition.
        test: Option<Expr>,
        /// Update clause.
        update: Option<Expr>,
        /// Loop body.
        body: Box<Stmt>,
        /// Whole statement.
        span: Span,
    },
    /// `for (head in/of right) body`
    ForIn {
        /// Loop variable.
        head: ForHead,
        /// Iterated object.
        right: Expr,
        /// `of` rather than `in`.
        of: bool,
        /// Loop body.
        body: Box<Stmt>,
        /// Whole statement.
        span: Span,
    },
    /// `{ … }`
    Block {
        /// Statements.
        body: Vec<Stmt>,
        /// Including the braces.
        span: Span,
    },
    /// An expression evaluated for its effects.
    Expr {
        /// The expression.
        expr: Expr,
        /// Including the semicolon, if any.
        span: Span,
    },
    /// `;`
    Empty(Span),
    /// `break` or `continue`, with an optional label.
    Jump(Span),
    /// `throw x;`
    Throw {
        /// Thrown value.
        arg: Expr,
        /// Whole statement.
        span: Span,
    },
    /// `try {} catch (e) {} finally {}`
    Try {
        /// Protected block.
        block: Box<Stmt>,
        /// Catch parameter and block.
        handler: Option<(Option<Ident>, Box<Stmt>)>,
        /// Finally block.
        finalizer: Option<Box<Stmt>>,
        /// Whole statement.
        span: Span,
    },
    /// `switch (disc) { … }`
    Switch {
        /// Discriminant.
        discriminant: Expr,
        /// Cases in order.
        cases: Vec<SwitchCase>,
        /// Whole statement.
        span: Span,
    },
}

/// How a function was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// `function f() {}` as a statement.
    Declaration,
    /// `function () {}` in expression position, or an object method.
    Expression,
    /// `() => {}`
    Arrow,
}

/// A function parameter. Only plain names are supported.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Parameter name.
    pub name: Ident,
    /// Default value.
    pub default: Option<Expr>,
    /// `...rest`
    pub rest: bool,
}

/// Body of a function.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    /// `{ … }`
    Block {
        /// Statements.
        body: Vec<Stmt>,
        /// Including the braces.
        span: Span,
    },
    /// Concise arrow body.
    Expr(Box<Expr>),
}

/// A function of any kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Declared name, if any.
    pub name: Option<Ident>,
    /// How it was written.
    pub kind: FunctionKind,
    /// Parameters.
    pub params: Vec<Param>,
    /// Body.
    pub body: FunctionBody,
    /// Whole function.
    pub span: Span,
}

/// Key of an object literal property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropKey {
    /// `a: …`, `"a": …`, `1: …`
    Static(String, Span),
    /// `[expr]: …`
    Computed(Expr),
}

/// A member of an object literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    /// `key: value`
    KeyValue {
        /// Key.
        key: PropKey,
        /// Value.
        value: Expr,
    },
    /// `{ a }`
    Shorthand(Ident),
    /// `key() {}`
    Method {
        /// Key.
        key: PropKey,
        /// The method.
        function: Box<Function>,
    },
    /// `...expr`
    Spread(Expr),
}

/// Property of a member expression.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberProp {
    /// `.name`
    Name(Ident),
    /// `[expr]`
    Computed(Box<Expr>),
}

/// An expression with its span.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// Shape of the expression.
    pub kind: ExprKind,
    /// Where it appears.
    pub span: Span,
}

/// Shapes of expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// A variable reference.
    Ident(String),
    /// Number, string, boolean, `null` or regex literal.
    Literal,
    /// A template literal; `true` if it has substitutions.
    Template(bool),
    /// `this`
    This,
    /// `[a, , ...b]`
    Array(Vec<Option<Expr>>),
    /// `{ … }`
    Object(Vec<Property>),
    /// A function or arrow expression.
    Function(Box<Function>),
    /// Prefix operator other than `++`/`--`.
    Unary {
        /// Operator text.
        op: &'static str,
        /// Operand.
        arg: Box<Expr>,
    },
    /// `++`/`--`.
    Update {
        /// Operator text.
        op: &'static str,
        /// Prefix form.
        prefix: bool,
        /// Operand.
        arg: Box<Expr>,
    },
    /// Arithmetic, comparison and bitwise operators.
    Binary {
        /// Operator text.
        op: &'static str,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `&&`, `||`, `??`.
    Logical {
        /// Operator text.
        op: &'static str,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Any assignment operator.
    Assign {
        /// Operator text.
        op: &'static str,
        /// Assigned place.
        target: Box<Expr>,
        /// Assigned value.
        value: Box<Expr>,
    },
    /// `test ? cons : alt`
    Conditional {
        /// Condition.
        test: Box<Expr>,
        /// Value when true.
        cons: Box<Expr>,
        /// Value when false.
        alt: Box<Expr>,
    },
    /// `callee(args)`
    Call {
        /// Called expression.
        callee: Box<Expr>,
        /// Arguments.
        args: Vec<Expr>,
        /// `callee?.(args)`
        optional: bool,
    },
    /// `new callee(args)`
    New {
        /// Constructor.
        callee: Box<Expr>,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// `object.prop`, `object[prop]`, `object?.prop`
    Member {
        /// Base object.
        object: Box<Expr>,
        /// Accessed property.
        property: MemberProp,
        /// `?.`
        optional: bool,
    },
    /// `yield`, `yield x`, `yield* x`
    Yield {
        /// Yielded value.
        arg: Option<Box<Expr>>,
        /// `yield*`
        delegate: bool,
    },
    /// `a, b`
    Sequence(Vec<Expr>),
    /// `...expr` in arrays and arguments.
    Spread(Box<Expr>),
    /// `(expr)`
    Paren(Box<Expr>),
}

impl Expr {
    /// Creates a new expression.
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Strips any number of enclosing parentheses.
    pub fn unparenthesized(&self) -> &Self {
        match &self.kind {
            ExprKind::Paren(inner) => inner.unparenthesized(),
            _ => self,
        }
    }

    /// Whether this is a member or call link of a chain that contains `?.`.
    pub fn has_optional_link(&self) -> bool {
        match &self.kind {
            ExprKind::Member { object, optional, .. } => *optional || object.has_optional_link(),
            ExprKind::Call { callee, optional, .. } => *optional || callee.has_optional_link(),
            _ => false,
        }
    }
}
