// CPG - Code Property Graph Engine for JavaScript and TypeScript
// Copyright (C) 2025 Zhuo Zhang and Wuqi Zhang
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

//! Bounded in-function micro-tracing from a thrown identifier back to a
//! constructor call.
//!
//! When a throw or reject uses a plain identifier, this walks the enclosing
//! function body looking for the first assignment to that name in source
//! order. A `new C()` right-hand side resolves the error class; another
//! identifier continues the walk. The visited set strictly grows and the
//! body is finite, so termination is guaranteed; a revisited name is a cycle
//! and terminates with no class.
//!
//! Picking the first assignment in source order is a documented divergence
//! from runtime semantics when the name is reassigned.

use std::collections::HashSet;

use swc_ecma_ast::{BlockStmt, Decl, Expr, Pat, PatOrExpr, Stmt};

use crate::analysis::classify::ident_name;

/// Result of a micro-trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceOutcome {
    /// Resolved error class, when the walk reached a `new C()`.
    pub class_name: Option<String>,
    /// Names visited in order, starting with the thrown identifier.
    pub path: Vec<String>,
}

impl TraceOutcome {
    /// Length of the trace path.
    pub fn len(&self) -> usize {
        self.path.len()
    }

    /// True when the path is empty (never the case for a completed trace).
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

/// Traces `start` through in-function assignments to a constructor call.
pub fn trace_error_class(body: &BlockStmt, start: &str) -> TraceOutcome {
    let mut visited: HashSet<String> = HashSet::new();
    let mut path = Vec::new();
    let mut current = start.to_string();

    loop {
        if !visited.insert(current.clone()) {
            // Cycle between aliases; give up without a class.
            return TraceOutcome { class_name: None, path };
        }
        path.push(current.clone());

        let Some(rhs) = find_first_assignment(&body.stmts, &current) else {
            return TraceOutcome { class_name: None, path };
        };

        match unwrap_trivial(rhs) {
            Expr::New(new_expr) => {
                return TraceOutcome { class_name: ident_name(&new_expr.callee), path };
            }
            Expr::Ident(next) => {
                current = next.sym.to_string();
            }
            _ => return TraceOutcome { class_name: None, path },
        }
    }
}

fn unwrap_trivial(expr: &Expr) -> &Expr {
    match expr {
        Expr::Paren(inner) => unwrap_trivial(&inner.expr),
        Expr::Await(inner) => unwrap_trivial(&inner.arg),
        _ => expr,
    }
}

/// Finds the right-hand side of the first assignment to `name`, in source
/// order, without descending into nested functions.
fn find_first_assignment<'a>(stmts: &'a [Stmt], name: &str) -> Option<&'a Expr> {
    stmts.iter().find_map(|stmt| assignment_in_stmt(stmt, name))
}

fn assignment_in_stmt<'a>(stmt: &'a Stmt, name: &str) -> Option<&'a Expr> {
    match stmt {
        Stmt::Decl(Decl::Var(var)) => var.decls.iter().find_map(|declarator| {
            match (&declarator.name, declarator.init.as_deref()) {
                (Pat::Ident(ident), Some(init)) if ident.id.sym.as_ref() == name => Some(init),
                _ => None,
            }
        }),
        Stmt::Expr(expr_stmt) => assignment_in_expr(&expr_stmt.expr, name),
        Stmt::Block(block) => find_first_assignment(&block.stmts, name),
        Stmt::If(if_stmt) => assignment_in_stmt(&if_stmt.cons, name)
            .or_else(|| if_stmt.alt.as_deref().and_then(|alt| assignment_in_stmt(alt, name))),
        Stmt::While(inner) => assignment_in_stmt(&inner.body, name),
        Stmt::DoWhile(inner) => assignment_in_stmt(&inner.body, name),
        Stmt::For(inner) => assignment_in_stmt(&inner.body, name),
        Stmt::ForIn(inner) => assignment_in_stmt(&inner.body, name),
        Stmt::ForOf(inner) => assignment_in_stmt(&inner.body, name),
        Stmt::Try(try_stmt) => find_first_assignment(&try_stmt.block.stmts, name)
            .or_else(|| {
                try_stmt
                    .handler
                    .as_ref()
                    .and_then(|handler| find_first_assignment(&handler.body.stmts, name))
            })
            .or_else(|| {
                try_stmt
                    .finalizer
                    .as_ref()
                    .and_then(|finalizer| find_first_assignment(&finalizer.stmts, name))
            }),
        Stmt::Switch(switch) => switch
            .cases
            .iter()
            .find_map(|case| find_first_assignment(&case.cons, name)),
        Stmt::Labeled(labeled) => assignment_in_stmt(&labeled.body, name),
        _ => None,
    }
}

fn assignment_in_expr<'a>(expr: &'a Expr, name: &str) -> Option<&'a Expr> {
    match expr {
        Expr::Assign(assign) if assign.op == swc_ecma_ast::AssignOp::Assign => {
            let target_matches = match &assign.left {
                PatOrExpr::Pat(pat) => {
                    matches!(&**pat, Pat::Ident(ident) if ident.id.sym.as_ref() == name)
                }
                PatOrExpr::Expr(target) => {
                    matches!(&**target, Expr::Ident(ident) if ident.sym.as_ref() == name)
                }
            };
            if target_matches {
                Some(&assign.right)
            } else {
                None
            }
        }
        Expr::Seq(seq) => seq.exprs.iter().find_map(|inner| assignment_in_expr(inner, name)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SourceParser;
    use swc_ecma_ast::{Decl, ModuleItem, Stmt};

    fn function_body(source: &str) -> BlockStmt {
        let parsed = SourceParser.parse("a.ts", source).unwrap();
        match &parsed.module.body[0] {
            ModuleItem::Stmt(Stmt::Decl(Decl::Fn(decl))) => {
                decl.function.body.clone().expect("function body")
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_direct_constructor_assignment() {
        let body = function_body("function f() { const err = new TypeError(); throw err; }");
        let outcome = trace_error_class(&body, "err");
        assert_eq!(outcome.class_name.as_deref(), Some("TypeError"));
        assert_eq!(outcome.path, vec!["err"]);
    }

    #[test]
    fn test_alias_chain_is_followed() {
        let body = function_body(
            "function f() { const base = new E(); const alias = base; throw alias; }",
        );
        let outcome = trace_error_class(&body, "alias");
        assert_eq!(outcome.class_name.as_deref(), Some("E"));
        assert_eq!(outcome.path, vec!["alias", "base"]);
    }

    #[test]
    fn test_cycle_terminates_without_class() {
        let body = function_body("function f() { let a = b; let b = a; throw a; }");
        let outcome = trace_error_class(&body, "a");
        assert_eq!(outcome.class_name, None);
        assert_eq!(outcome.path, vec!["a", "b"]);
    }

    #[test]
    fn test_unresolvable_rhs_stops() {
        let body = function_body("function f() { const err = make(); throw err; }");
        let outcome = trace_error_class(&body, "err");
        assert_eq!(outcome.class_name, None);
        assert_eq!(outcome.path, vec!["err"]);
    }

    #[test]
    fn test_first_assignment_in_source_order_wins() {
        let body = function_body(
            "function f() { let e = new First(); e = new Second(); throw e; }",
        );
        let outcome = trace_error_class(&body, "e");
        assert_eq!(outcome.class_name.as_deref(), Some("First"));
    }

    #[test]
    fn test_assignment_inside_branch_is_found() {
        let body = function_body(
            "function f(x) { let e; if (x) { e = new RangeError(); } throw e; }",
        );
        let outcome = trace_error_class(&body, "e");
        assert_eq!(outcome.class_name.as_deref(), Some("RangeError"));
    }

    #[test]
    fn test_no_assignment_found() {
        let body = function_body("function f(e) { throw e; }");
        let outcome = trace_error_class(&body, "e");
        assert_eq!(outcome.class_name, None);
        assert_eq!(outcome.path, vec!["e"]);
    }
}
