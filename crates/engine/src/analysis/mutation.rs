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

//! Mutation detection.
//!
//! Four families: mutating array method calls (`push`/`unshift`/`splice`),
//! indexed array writes, object property writes (including `this.prop` and
//! computed keys), and `Object.assign`. Update expressions (`++`/`--`) are
//! recorded separately. Every record carries the scope path at the mutation
//! site so the writer can resolve which binding of a shadowed name is hit.
//!
//! A computed key that is not a numeric literal is always treated as an
//! object write, even when the target is plainly an array; duplicate-edge
//! prevention in the writer relies on this choice.

use swc_common::Spanned;
use swc_ecma_ast::{
    AssignExpr, CallExpr, Callee, Expr, Lit, MemberExpr, MemberProp, PatOrExpr, UpdateExpr,
    UpdateOp,
};

use crate::analysis::{
    classify::{render_receiver, COMPUTED},
    ArrayMutationKind, ArrayMutationRecord, BufferKind, InsertedValue, ModuleAnalyzer,
    ObjectMutationKind, ObjectMutationRecord, RecordHandle, UpdateRecord,
};
use cpg_common::NodeKind;

/* Mutation detection */
impl ModuleAnalyzer<'_> {
    /// Records an ARRAY_MUTATION when the call is `x.push/unshift/splice(...)`.
    /// Returns true when the call was recognized as an array method.
    pub(super) fn detect_array_method_call(&mut self, call: &CallExpr) -> bool {
        let Callee::Expr(callee) = &call.callee else { return false };
        let Expr::Member(member) = &**callee else { return false };
        let MemberProp::Ident(method) = &member.prop else { return false };
        let Some(kind) = array_mutation_kind(method.sym.as_ref()) else { return false };

        let (array_name, is_nested, base_object, property_name) = match &*member.obj {
            Expr::Ident(ident) => (ident.sym.to_string(), false, None, None),
            Expr::Member(nested) => {
                let base = render_receiver(&nested.obj);
                let property = match &nested.prop {
                    MemberProp::Ident(prop) => prop.sym.to_string(),
                    _ => COMPUTED.to_string(),
                };
                (format!("{base}.{property}"), true, Some(base), Some(property))
            }
            Expr::This(_) => {
                let class_name = self.enclosing_class_name();
                ("this".to_string(), true, class_name.clone().or(Some("this".to_string())), None)
            }
            _ => return false,
        };

        if self.is_constant_binding(&array_name) {
            return true;
        }

        // splice(start, deleteCount, ...items): the first two positional
        // arguments are not inserted values.
        let skip = if kind == ArrayMutationKind::Splice { 2 } else { 0 };
        let inserted: Vec<InsertedValue> = call
            .args
            .iter()
            .skip(skip)
            .map(|argument| InsertedValue {
                value: self.classify_expression(&argument.expr),
                spread: argument.spread.is_some(),
            })
            .collect();

        let loc = self.loc(call.span);
        let id = self.ids.coordinate(NodeKind::ArrayMutation, loc.line, loc.column);
        let scope_path = self.scopes.scope_path();
        let index = self.records.array_mutations.len();
        self.records.array_mutations.push(ArrayMutationRecord {
            id: id.clone(),
            kind,
            array_name,
            is_nested,
            base_object,
            property_name,
            index: None,
            inserted,
            scope_path: scope_path.clone(),
            loc,
        });
        self.ids.register(&id, RecordHandle { buffer: BufferKind::ArrayMutation, index }, &scope_path);
        true
    }

    /// Records `Object.assign(target, ...sources)` as one object mutation per
    /// source. Returns true when the call was recognized.
    pub(super) fn detect_object_assign(&mut self, call: &CallExpr) -> bool {
        let Callee::Expr(callee) = &call.callee else { return false };
        let Expr::Member(member) = &**callee else { return false };
        let (Expr::Ident(object), MemberProp::Ident(method)) = (&*member.obj, &member.prop) else {
            return false;
        };
        if object.sym.as_ref() != "Object" || method.sym.as_ref() != "assign" {
            return false;
        }
        let Some(target) = call.args.first() else { return true };
        let target_name = match &*target.expr {
            Expr::Ident(ident) => ident.sym.to_string(),
            Expr::This(_) => "this".to_string(),
            Expr::Member(member) => render_receiver(&member.obj),
            _ => return true,
        };
        if self.is_constant_binding(&target_name) {
            return true;
        }
        let class_name =
            if target_name == "this" { self.enclosing_class_name() } else { None };

        for source in call.args.iter().skip(1) {
            let value = self.classify_expression(&source.expr);
            let loc = self.loc(source.expr.span());
            let id = self.ids.coordinate(NodeKind::ObjectMutation, loc.line, loc.column);
            let scope_path = self.scopes.scope_path();
            let index = self.records.object_mutations.len();
            self.records.object_mutations.push(ObjectMutationRecord {
                id: id.clone(),
                object_name: target_name.clone(),
                class_name: class_name.clone(),
                kind: ObjectMutationKind::Assign,
                property: None,
                computed_var: None,
                value: Some(value),
                scope_path: scope_path.clone(),
                loc,
            });
            self.ids.register(
                &id,
                RecordHandle { buffer: BufferKind::ObjectMutation, index },
                &scope_path,
            );
        }
        true
    }

    /// Records indexed array writes and object property writes for an
    /// assignment whose target is a member expression.
    pub(super) fn detect_member_write(&mut self, assign: &AssignExpr) {
        let Some(member) = assignment_member_target(assign) else { return };

        let object_name = match &*member.obj {
            Expr::Ident(ident) => ident.sym.to_string(),
            Expr::This(_) => "this".to_string(),
            Expr::Member(nested) => {
                let base = render_receiver(&nested.obj);
                match &nested.prop {
                    MemberProp::Ident(prop) => format!("{base}.{}", prop.sym),
                    _ => format!("{base}.{COMPUTED}"),
                }
            }
            _ => return,
        };
        if self.is_constant_binding(&object_name) {
            return;
        }
        let class_name = if object_name == "this" { self.enclosing_class_name() } else { None };

        // `arr[0] = x` with a numeric literal key is an array write. Any
        // other computed key goes down the object path.
        if let MemberProp::Computed(computed) = &member.prop {
            if let Expr::Lit(Lit::Num(number)) = &*computed.expr {
                let value = self.classify_expression(&assign.right);
                let loc = self.loc(assign.span);
                let id = self.ids.coordinate(NodeKind::ArrayMutation, loc.line, loc.column);
                let scope_path = self.scopes.scope_path();
                let index = self.records.array_mutations.len();
                self.records.array_mutations.push(ArrayMutationRecord {
                    id: id.clone(),
                    kind: ArrayMutationKind::IndexedWrite,
                    array_name: object_name,
                    is_nested: false,
                    base_object: None,
                    property_name: None,
                    index: Some(number.value),
                    inserted: vec![InsertedValue { value, spread: false }],
                    scope_path: scope_path.clone(),
                    loc,
                });
                self.ids.register(
                    &id,
                    RecordHandle { buffer: BufferKind::ArrayMutation, index },
                    &scope_path,
                );
                return;
            }
        }

        let (kind, property, computed_var) = match &member.prop {
            MemberProp::Ident(prop) => {
                (ObjectMutationKind::Property, Some(prop.sym.to_string()), None)
            }
            MemberProp::PrivateName(prop) => {
                (ObjectMutationKind::Property, Some(format!("#{}", prop.id.sym)), None)
            }
            MemberProp::Computed(computed) => match &*computed.expr {
                Expr::Lit(Lit::Str(key)) => {
                    (ObjectMutationKind::Property, Some(key.value.to_string()), None)
                }
                Expr::Ident(key) => (
                    ObjectMutationKind::Computed,
                    Some(COMPUTED.to_string()),
                    Some(key.sym.to_string()),
                ),
                _ => (ObjectMutationKind::Computed, Some(COMPUTED.to_string()), None),
            },
        };

        let value = self.classify_expression(&assign.right);
        let loc = self.loc(assign.span);
        let id = self.ids.coordinate(NodeKind::ObjectMutation, loc.line, loc.column);
        let scope_path = self.scopes.scope_path();
        let index = self.records.object_mutations.len();
        self.records.object_mutations.push(ObjectMutationRecord {
            id: id.clone(),
            object_name,
            class_name,
            kind,
            property,
            computed_var,
            value: Some(value),
            scope_path: scope_path.clone(),
            loc,
        });
        self.ids.register(
            &id,
            RecordHandle { buffer: BufferKind::ObjectMutation, index },
            &scope_path,
        );
    }

    /// Records an `++`/`--` expression against its target.
    pub(super) fn record_update_expression(&mut self, update: &UpdateExpr) {
        let range = self.parsed.byte_range(update.span);
        if !self.processed_updates.insert(range) {
            return;
        }

        let op = match update.op {
            UpdateOp::PlusPlus => "++",
            UpdateOp::MinusMinus => "--",
        };

        let (target, object, property, computed_var, class_name) = match &*update.arg {
            Expr::Ident(ident) => {
                let name = ident.sym.to_string();
                if self.is_constant_binding(&name) {
                    return;
                }
                (name, None, None, None, None)
            }
            Expr::Member(member) => {
                let object = match &*member.obj {
                    Expr::Ident(ident) => ident.sym.to_string(),
                    Expr::This(_) => "this".to_string(),
                    other => render_receiver(other),
                };
                let class_name =
                    if object == "this" { self.enclosing_class_name() } else { None };
                let (property, computed_var) = match &member.prop {
                    MemberProp::Ident(prop) => (prop.sym.to_string(), None),
                    MemberProp::PrivateName(prop) => (format!("#{}", prop.id.sym), None),
                    MemberProp::Computed(computed) => match &*computed.expr {
                        Expr::Ident(key) => (COMPUTED.to_string(), Some(key.sym.to_string())),
                        Expr::Lit(Lit::Str(key)) => (key.value.to_string(), None),
                        Expr::Lit(Lit::Num(key)) => {
                            (crate::analysis::classify::render_number(key.value), None)
                        }
                        _ => (COMPUTED.to_string(), None),
                    },
                };
                (property.clone(), Some(object), Some(property), computed_var, class_name)
            }
            _ => return,
        };

        let loc = self.loc(update.span);
        let id = self.ids.coordinate(NodeKind::UpdateExpression, loc.line, loc.column);
        let scope_path = self.scopes.scope_path();
        let index = self.records.updates.len();
        self.records.updates.push(UpdateRecord {
            id: id.clone(),
            target,
            object,
            property,
            computed_var,
            class_name,
            prefix: update.prefix,
            op: op.to_string(),
            scope_path: scope_path.clone(),
            loc,
        });
        self.ids.register(&id, RecordHandle { buffer: BufferKind::Update, index }, &scope_path);
    }

    /// True when `name` resolves to a CONSTANT binding visible from the
    /// current scope.
    pub(super) fn is_constant_binding(&self, name: &str) -> bool {
        self.find_binding(name)
            .map(|binding| self.records.variables[binding.index].kind == NodeKind::Constant)
            .unwrap_or(false)
    }
}

fn array_mutation_kind(method: &str) -> Option<ArrayMutationKind> {
    match method {
        "push" => Some(ArrayMutationKind::Push),
        "unshift" => Some(ArrayMutationKind::Unshift),
        "splice" => Some(ArrayMutationKind::Splice),
        _ => None,
    }
}

fn assignment_member_target(assign: &AssignExpr) -> Option<&MemberExpr> {
    match &assign.left {
        PatOrExpr::Expr(target) => match &**target {
            Expr::Member(member) => Some(member),
            _ => None,
        },
        PatOrExpr::Pat(pat) => match &**pat {
            swc_ecma_ast::Pat::Expr(target) => match &**target {
                Expr::Member(member) => Some(member),
                _ => None,
            },
            _ => None,
        },
    }
}
