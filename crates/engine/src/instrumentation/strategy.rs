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

//! Decides which constructs are tracked and collects the probe insertions.

use scr_common::TraceKind;

use crate::{
    instrumentation::{
        ast::*,
        codegen::{self, ARGUMENTS, CALL_CLOSE, NO_ARGUMENTS, VALUE_CLOSE},
        common::LineIndex,
        location::{Location, LocationMap},
        modification::{InstrumentContent, SourceModifications},
    },
    EngineConfig, ParseError,
};

/// Deepest expression tree the collector walks into.
pub const MAX_DEPTH: usize = 256;

/// How the parent uses an expression. Only values are wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Usage {
    Value,
    /// Called; wrapping would lose the `this` binding.
    Callee,
    /// Assigned to or updated.
    Target,
    /// Operand of `typeof` or `delete`.
    Operand,
    /// Inner link of an optional chain; wrapping would break short-circuiting.
    ChainLink,
}

/// Collects the modifications and the location map for a parsed program.
///
/// Fails when expressions nest deeper than [`MAX_DEPTH`].
pub fn collect_modifications(
    program: &Program,
    lines: &LineIndex<'_>,
    config: &EngineConfig,
) -> Result<(SourceModifications, LocationMap), ParseError> {
    let mut collector = Collector {
        config,
        lines,
        modifications: SourceModifications::new(),
        locations: LocationMap::new(),
        next_id: 0,
        depth: 0,
        callback_depth: 0,
        too_deep: None,
    };
    for stmt in &program.body {
        collector.visit_stmt(stmt);
    }
    match collector.too_deep {
        Some(err) => Err(err),
        None => Ok((collector.modifications, collector.locations)),
    }
}

struct Collector<'a, 'src> {
    config: &'a EngineConfig,
    lines: &'a LineIndex<'src>,
    modifications: SourceModifications,
    locations: LocationMap,
    next_id: usize,
    /// Nesting depth of the expression being visited.
    depth: usize,
    /// Number of enclosing functions passed as call arguments.
    callback_depth: usize,
    /// Set once an expression exceeds [`MAX_DEPTH`]; the walk stops there.
    too_deep: Option<ParseError>,
}

impl Collector<'_, '_> {
    fn register(&mut self, label: &str, kind: TraceKind, span: Span) -> String {
        self.next_id += 1;
        let label = if label.is_empty() { kind.as_str() } else { label };
        let id = format!("{}:{}", label.replace(':', "_"), self.next_id);
        let location = Location {
            range: self.lines.range(span),
            kind,
            is_callback: self.callback_depth > 0,
        };
        self.locations.insert(id.clone(), location);
        id
    }

    fn wrap_value(&mut self, span: Span, id: String) {
        let probe = self.config.probes.value.clone();
        self.modifications.wrap(
            span.start,
            span.end,
            self.depth,
            InstrumentContent::ValueOpen { probe, id },
            InstrumentContent::Plain(VALUE_CLOSE.to_string()),
        );
    }

    fn wrap_call(&mut self, span: Span, id: String) {
        let probes = &self.config.probes;
        let open = InstrumentContent::CallOpen {
            pre: probes.pre_call.clone(),
            post: probes.post_call.clone(),
            id,
        };
        self.modifications.wrap(
            span.start,
            span.end,
            self.depth,
            open,
            InstrumentContent::Plain(CALL_CLOSE.to_string()),
        );
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    // ---------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var(decl) => self.visit_var_decl(decl),
            Stmt::Function(function) => self.visit_function(function, None),
            Stmt::Return { arg, .. } => {
                if let Some(arg) = arg {
                    self.visit_expr(arg, Usage::Value);
                }
            }
            Stmt::If { test, cons, alt, span } => {
                self.visit_branch_test(test, TraceKind::IfStatement, *span);
                self.visit_stmt(cons);
                if let Some(alt) = alt {
                    self.visit_stmt(alt);
                }
            }
            Stmt::While { test, body, span } => {
                self.visit_branch_test(test, TraceKind::WhileStatement, *span);
                self.visit_stmt(body);
            }
            Stmt::DoWhile { body, test, span } => {
                self.visit_stmt(body);
                self.visit_branch_test(test, TraceKind::DoWhileStatement, *span);
            }
            Stmt::For { init, test, update, body, span } => {
                match init {
                    Some(ForInit::Var(decl)) => self.visit_var_decl(decl),
                    Some(ForInit::Expr(expr)) => self.visit_expr(expr, Usage::Value),
                    None => {}
                }
                if let Some(test) = test {
                    self.visit_branch_test(test, TraceKind::ForStatement, *span);
                }
                if let Some(update) = update {
                    self.visit_expr(update, Usage::Value);
                }
                self.visit_stmt(body);
            }
            Stmt::ForIn { head, right, body, .. } => {
                if let ForHead::Expr(target) = head {
                    self.visit_expr(target, Usage::Target);
                }
                self.visit_expr(right, Usage::Value);
                self.visit_stmt(body);
            }
            Stmt::Block { body, .. } => {
                for stmt in body {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::Expr { expr, .. } | Stmt::Throw { arg: expr, .. } => {
                self.visit_expr(expr, Usage::Value)
            }
            Stmt::Empty(_) | Stmt::Jump(_) => {}
            Stmt::Try { block, handler, finalizer, .. } => {
                self.visit_stmt(block);
                if let Some((_, handler)) = handler {
                    self.visit_stmt(handler);
                }
                if let Some(finalizer) = finalizer {
                    self.visit_stmt(finalizer);
                }
            }
            Stmt::Switch { discriminant, cases, span } => {
                self.visit_branch_test(discriminant, TraceKind::SwitchStatement, *span);
                for case in cases {
                    if let Some(test) = &case.test {
                        self.visit_expr(test, Usage::Value);
                    }
                    for stmt in &case.body {
                        self.visit_stmt(stmt);
                    }
                }
            }
        }
    }

    fn visit_var_decl(&mut self, decl: &VarDecl) {
        for declarator in &decl.declarators {
            let Some(init) = &declarator.init else { continue };
            let id = self.register(
                &declarator.name.name,
                TraceKind::VariableDeclarator,
                declarator.span,
            );
            self.wrap_value(init.span, id);
            self.nested(|this| this.visit_named_expr(init, &declarator.name.name));
        }
    }

    /// Wraps a branch decision. The location takes the range of the whole
    /// statement so that it can be matched against the statement.
    fn visit_branch_test(&mut self, test: &Expr, kind: TraceKind, statement: Span) {
        if !self.config.instrumentation.track_branches {
            self.visit_expr(test, Usage::Value);
            return;
        }
        let id = self.register(kind.as_str(), kind, statement);
        self.wrap_value(test.span, id);
        self.nested(|this| this.visit_expr(test, Usage::Value));
    }

    // ---------------------------------------------------------------------
    // Functions
    // ---------------------------------------------------------------------

    fn visit_function(&mut self, function: &Function, hint: Option<&str>) {
        let kind = match function.kind {
            FunctionKind::Declaration => TraceKind::FunctionDeclaration,
            FunctionKind::Expression => TraceKind::FunctionExpression,
            FunctionKind::Arrow => TraceKind::ArrowFunctionExpression,
        };

        // (id, captured expression) of the entry probes, in emission order
        let mut entries = Vec::new();
        if self.config.instrumentation.track_function_entries {
            let label =
                function.name.as_ref().map(|n| n.name.as_str()).or(hint).unwrap_or_default();
            let arg = if function.kind == FunctionKind::Arrow { NO_ARGUMENTS } else { ARGUMENTS };
            entries.push((self.register(label, kind, function.span), arg.to_string()));
            for param in &function.params {
                let name = &param.name;
                let id = self.register(&name.name, TraceKind::Parameter, name.span);
                entries.push((id, name.name.clone()));
            }
        }

        for param in &function.params {
            if let Some(default) = &param.default {
                self.visit_expr(default, Usage::Value);
            }
        }

        let probe = self.config.probes.value.clone();
        match &function.body {
            FunctionBody::Block { body, span } => {
                let loc = self.body_entry_offset(body, *span);
                for (id, arg) in entries {
                    let content =
                        InstrumentContent::EntryStatement { probe: probe.clone(), id, arg };
                    self.modifications.function_entry(loc, content);
                }
                for stmt in body {
                    self.visit_stmt(stmt);
                }
            }
            FunctionBody::Expr(expr) => {
                if !entries.is_empty() {
                    let prefix = entries
                        .iter()
                        .map(|(id, arg)| codegen::entry_expression(&probe, id, arg))
                        .collect::<Vec<_>>()
                        .join(", ");
                    self.modifications.wrap(
                        expr.span.start,
                        expr.span.end,
                        self.depth,
                        InstrumentContent::Plain(format!("({prefix}, ")),
                        InstrumentContent::Plain(")".to_string()),
                    );
                }
                self.nested(|this| this.visit_expr(expr, Usage::Value));
            }
        }
    }

    /// Offset right after the opening brace and any directive prologue.
    fn body_entry_offset(&self, body: &[Stmt], span: Span) -> usize {
        let source = self.lines.source();
        body.iter()
            .map_while(|stmt| match stmt {
                Stmt::Expr { expr, span }
                    if expr.kind == ExprKind::Literal
                        && source[expr.span.start..].starts_with(['"', '\'']) =>
                {
                    Some(span.end)
                }
                _ => None,
            })
            .last()
            .unwrap_or(span.start + 1)
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    /// Visits an expression whose value gets bound to `name`, which then
    /// labels an anonymous function.
    fn visit_named_expr(&mut self, expr: &Expr, name: &str) {
        match &expr.unparenthesized().kind {
            ExprKind::Function(function) => self.visit_function(function, Some(name)),
            _ => self.visit_expr(expr, Usage::Value),
        }
    }

    fn visit_expr(&mut self, expr: &Expr, usage: Usage) {
        if self.depth >= MAX_DEPTH || self.too_deep.is_some() {
            if self.too_deep.is_none() {
                self.too_deep =
                    Some(self.lines.error("expression nesting too deep", expr.span.start));
            }
            return;
        }
        if usage == Usage::Value {
            self.track(expr);
        }
        self.nested(|this| this.visit_children(expr, usage));
    }

    /// Registers and wraps the expression if its kind is tracked.
    fn track(&mut self, expr: &Expr) {
        let (kind, label) = match &expr.kind {
            ExprKind::Ident(name) => {
                if !self.config.instrumentation.track_identifiers {
                    return;
                }
                (TraceKind::Identifier, name.clone())
            }
            ExprKind::Template(true) => (TraceKind::TemplateLiteral, String::new()),
            ExprKind::Array(_) => (TraceKind::ArrayExpression, String::new()),
            ExprKind::Object(_) => (TraceKind::ObjectExpression, String::new()),
            ExprKind::Unary { op: "await", .. } => (TraceKind::AwaitExpression, String::new()),
            ExprKind::Unary { .. } => (TraceKind::UnaryExpression, String::new()),
            ExprKind::Update { arg, .. } => {
                (TraceKind::UpdateExpression, path_label(arg).unwrap_or_default())
            }
            ExprKind::Binary { .. } => (TraceKind::BinaryExpression, String::new()),
            ExprKind::Logical { .. } => (TraceKind::LogicalExpression, String::new()),
            ExprKind::Conditional { .. } => (TraceKind::ConditionalExpression, String::new()),
            ExprKind::Assign { target, .. } => {
                (TraceKind::AssignmentExpression, path_label(target).unwrap_or_default())
            }
            ExprKind::Member { .. } => {
                (TraceKind::MemberExpression, path_label(expr).unwrap_or_default())
            }
            ExprKind::Call { callee, .. } => {
                let label = path_label(callee).unwrap_or_default();
                let id = self.register(&label, TraceKind::CallExpression, expr.span);
                self.wrap_call(expr.span, id);
                return;
            }
            ExprKind::New { callee, .. } => {
                let label = path_label(callee).unwrap_or_default();
                let id = self.register(&label, TraceKind::NewExpression, expr.span);
                self.wrap_call(expr.span, id);
                return;
            }
            ExprKind::Literal
            | ExprKind::Template(false)
            | ExprKind::This
            | ExprKind::Function(_)
            | ExprKind::Yield { .. }
            | ExprKind::Sequence(_)
            | ExprKind::Spread(_)
            | ExprKind::Paren(_) => return,
        };
        let id = self.register(&label, kind, expr.span);
        self.wrap_value(expr.span, id);
    }

    fn visit_children(&mut self, expr: &Expr, usage: Usage) {
        match &expr.kind {
            ExprKind::Ident(_) | ExprKind::Literal | ExprKind::Template(_) | ExprKind::This => {}
            ExprKind::Array(elements) => {
                for element in elements.iter().flatten() {
                    self.visit_expr(element, Usage::Value);
                }
            }
            ExprKind::Object(properties) => {
                for property in properties {
                    self.visit_property(property);
                }
            }
            ExprKind::Function(function) => self.visit_function(function, None),
            ExprKind::Unary { op, arg } => {
                let usage =
                    if matches!(*op, "typeof" | "delete") { Usage::Operand } else { Usage::Value };
                self.visit_expr(arg, usage);
            }
            ExprKind::Update { arg, .. } => self.visit_expr(arg, Usage::Target),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.visit_expr(left, Usage::Value);
                self.visit_expr(right, Usage::Value);
            }
            ExprKind::Assign { target, value, .. } => {
                self.visit_expr(target, Usage::Target);
                match path_label(target) {
                    Some(name) => self.visit_named_expr(value, &name),
                    None => self.visit_expr(value, Usage::Value),
                }
            }
            ExprKind::Conditional { test, cons, alt } => {
                self.visit_expr(test, Usage::Value);
                self.visit_expr(cons, Usage::Value);
                self.visit_expr(alt, Usage::Value);
            }
            ExprKind::Call { callee, args, .. } | ExprKind::New { callee, args } => {
                self.visit_expr(callee, Usage::Callee);
                for arg in args {
                    self.visit_argument(arg);
                }
            }
            ExprKind::Member { object, property, .. } => {
                let usage =
                    if object.has_optional_link() { Usage::ChainLink } else { Usage::Value };
                self.visit_expr(object, usage);
                if let MemberProp::Computed(property) = property {
                    self.visit_expr(property, Usage::Value);
                }
            }
            ExprKind::Yield { arg, .. } => {
                if let Some(arg) = arg {
                    self.visit_expr(arg, Usage::Value);
                }
            }
            ExprKind::Sequence(exprs) => {
                for expr in exprs {
                    self.visit_expr(expr, Usage::Value);
                }
            }
            ExprKind::Spread(arg) => self.visit_expr(arg, Usage::Value),
            // parentheses are transparent to how the value is used
            ExprKind::Paren(inner) => self.visit_expr(inner, usage),
        }
    }

    fn visit_property(&mut self, property: &Property) {
        match property {
            Property::KeyValue { key, value } => {
                if let PropKey::Computed(key) = key {
                    self.visit_expr(key, Usage::Value);
                }
                match key {
                    PropKey::Static(name, _) => self.visit_named_expr(value, name),
                    PropKey::Computed(_) => self.visit_expr(value, Usage::Value),
                }
            }
            Property::Shorthand(_) => {}
            Property::Method { key, function } => {
                if let PropKey::Computed(key) = key {
                    self.visit_expr(key, Usage::Value);
                }
                self.visit_function(function, None);
            }
            Property::Spread(arg) => self.visit_expr(arg, Usage::Value),
        }
    }

    /// Functions passed directly as arguments run as callbacks.
    fn visit_argument(&mut self, arg: &Expr) {
        let inner = match &arg.kind {
            ExprKind::Spread(inner) => inner.unparenthesized(),
            _ => arg.unparenthesized(),
        };
        if matches!(inner.kind, ExprKind::Function(_)) {
            self.callback_depth += 1;
            self.visit_expr(arg, Usage::Value);
            self.callback_depth -= 1;
        } else {
            self.visit_expr(arg, Usage::Value);
        }
    }
}

/// Dotted path of identifiers and member accesses, e.g. `console.log`.
fn path_label(expr: &Expr) -> Option<String> {
    match &expr.unparenthesized().kind {
        ExprKind::Ident(name) => Some(name.clone()),
        ExprKind::This => Some("this".to_string()),
        ExprKind::Member { object, property, .. } => {
            let object = path_label(object)?;
            match property {
                MemberProp::Name(name) => Some(format!("{object}.{}", name.name)),
                MemberProp::Computed(_) => Some(format!("{object}[]")),
            }
        }
        _ => None,
    }
}
