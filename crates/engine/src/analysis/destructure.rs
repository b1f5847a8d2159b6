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

//! Data-flow records for destructuring declarations.
//!
//! Given the flattened bound names of a pattern and the pattern's
//! initializer, emits one record per bound name describing the
//! property-access or index-access chain that reaches its value.
//! Identifier and call initializers are supported; any other initializer
//! kind is silently skipped.

use swc_ecma_ast::{CallExpr, Callee, Expr};

use crate::analysis::{
    classify::render_receiver, BoundName, CallSource, DestructuringRecord, ModuleAnalyzer,
    RecordHandle,
};

/* Destructuring tracking */
impl ModuleAnalyzer<'_> {
    /// Emits one data-flow record per bound name of a destructuring
    /// declaration. `bound` pairs each name with its VARIABLE record.
    pub(super) fn track_destructuring(
        &mut self,
        bound: &[(BoundName, RecordHandle)],
        init: &Expr,
    ) {
        match unwrap_await(init) {
            Expr::Ident(source) => {
                let source = source.sym.to_string();
                for (name, variable) in bound {
                    self.push_destructuring(name, *variable, source.clone(), None);
                }
            }
            Expr::Call(call) => {
                let callee = callee_name(call);
                let loc = self.loc(call.span);
                let call_source = CallSource {
                    name: callee.clone(),
                    line: loc.line,
                    column: loc.column,
                };
                let object = format!("{callee}()");
                for (name, variable) in bound {
                    self.push_destructuring(
                        name,
                        *variable,
                        object.clone(),
                        Some(call_source.clone()),
                    );
                }
            }
            // Other initializer shapes (object literals, member chains, ...)
            // are not tracked.
            _ => {}
        }
    }

    fn push_destructuring(
        &mut self,
        name: &BoundName,
        variable: RecordHandle,
        object: String,
        call_source: Option<CallSource>,
    ) {
        let loc = self.loc(name.span);
        let property_path = if name.is_rest || name.property_path.is_empty() {
            None
        } else {
            Some(name.property_path.join("."))
        };
        self.records.destructurings.push(DestructuringRecord {
            variable,
            variable_name: name.name.clone(),
            object,
            property_path,
            array_index: if name.is_rest { None } else { name.array_index },
            is_rest: name.is_rest,
            call_source,
            loc,
        });
    }
}

fn unwrap_await(expr: &Expr) -> &Expr {
    match expr {
        Expr::Await(inner) => unwrap_await(&inner.arg),
        Expr::Paren(inner) => unwrap_await(&inner.expr),
        _ => expr,
    }
}

/// Renders a call's callee as a dotted name.
pub(super) fn callee_name(call: &CallExpr) -> String {
    match &call.callee {
        Callee::Expr(callee) => match &**callee {
            Expr::Ident(ident) => ident.sym.to_string(),
            Expr::Member(member) => {
                let base = render_receiver(&member.obj);
                match &member.prop {
                    swc_ecma_ast::MemberProp::Ident(prop) => format!("{base}.{}", prop.sym),
                    _ => base,
                }
            }
            _ => "<complex>".to_string(),
        },
        Callee::Super(_) => "super".to_string(),
        Callee::Import(_) => "import".to_string(),
    }
}
