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

//! Expression classification.
//!
//! Every initializer or right-hand side is mapped onto the closed
//! [`ValueSource`] sum. Classification never fails: unusual AST shapes fall
//! back to sentinel values so the traversal can proceed. Object/array
//! literals and compound expressions additionally emit their own anchor
//! records as a side effect, so the returned variant can reference them by
//! handle.

use serde::{Deserialize, Serialize};
use swc_common::Spanned;
use swc_ecma_ast::{
    Expr, Lit, MemberExpr, MemberProp, ObjectLit, OptChainBase, Prop, PropName, PropOrSpread,
};

use crate::analysis::{
    ArrayLiteralRecord, BufferKind, ExpressionDetail, ExpressionRecord, ModuleAnalyzer,
    ObjectLiteralRecord, ObjectPropertyRecord, RecordHandle, ScopeKind,
};

/// Sentinel for receivers and callees the classifier cannot name.
pub const COMPLEX: &str = "<complex>";
/// Sentinel property name for computed accesses.
pub const COMPUTED: &str = "<computed>";

/// The closed set of value-source kinds an expression can classify to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueSource {
    /// A literal value.
    Literal {
        /// Rendered value.
        value: String,
        /// Type tag (string / number / boolean / null / regex / bigint).
        literal_type: String,
    },
    /// A plain identifier read.
    Variable {
        /// Source identifier name.
        name: String,
    },
    /// A direct call; resolved to the CALL record by coordinates.
    CallSite {
        /// Callee name.
        callee: String,
        /// Call line.
        line: usize,
        /// Call column.
        column: usize,
    },
    /// A method call; resolved to the CALL record by coordinates.
    MethodCall {
        /// Call line.
        line: usize,
        /// Call column.
        column: usize,
    },
    /// A `new` expression; resolved to the CONSTRUCTOR_CALL by coordinates.
    ConstructorCall {
        /// Constructed class name.
        class_name: String,
        /// Site line.
        line: usize,
        /// Site column.
        column: usize,
    },
    /// A function or arrow expression.
    Function {
        /// Function name, when named.
        name: Option<String>,
    },
    /// An object literal anchor.
    ObjectLiteral {
        /// Handle of the emitted OBJECT_LITERAL record.
        node: RecordHandle,
    },
    /// An array literal anchor.
    ArrayLiteral {
        /// Handle of the emitted ARRAY_LITERAL record.
        node: RecordHandle,
    },
    /// A compound expression anchor (member / binary / conditional / template / other).
    Expression {
        /// Handle of the emitted EXPRESSION record.
        node: RecordHandle,
    },
    /// Nothing useful could be said.
    Unknown,
}

impl ValueSource {
    /// Returns the identifier name when the source is a plain variable read.
    pub fn variable_name(&self) -> Option<&str> {
        match self {
            Self::Variable { name } => Some(name),
            _ => None,
        }
    }
}

/* Expression classification */
impl ModuleAnalyzer<'_> {
    /// Classifies an arbitrary expression, recursing through `await` and
    /// parentheses, and through TypeScript assertion wrappers.
    pub(super) fn classify_expression(&mut self, expr: &Expr) -> ValueSource {
        match expr {
            Expr::Await(inner) => self.classify_expression(&inner.arg),
            Expr::Paren(inner) => self.classify_expression(&inner.expr),
            Expr::TsAs(inner) => self.classify_expression(&inner.expr),
            Expr::TsNonNull(inner) => self.classify_expression(&inner.expr),
            Expr::TsConstAssertion(inner) => self.classify_expression(&inner.expr),
            Expr::TsTypeAssertion(inner) => self.classify_expression(&inner.expr),
            Expr::TsSatisfies(inner) => self.classify_expression(&inner.expr),

            Expr::Lit(lit) => {
                let (value, literal_type) = literal_parts(lit);
                ValueSource::Literal { value, literal_type }
            }
            Expr::Ident(ident) => ValueSource::Variable { name: ident.sym.to_string() },

            Expr::Call(call) => {
                let loc = self.loc(call.span);
                match call.callee.as_expr().map(|callee| &**callee) {
                    Some(Expr::Member(_)) => {
                        ValueSource::MethodCall { line: loc.line, column: loc.column }
                    }
                    Some(Expr::Ident(ident)) => ValueSource::CallSite {
                        callee: ident.sym.to_string(),
                        line: loc.line,
                        column: loc.column,
                    },
                    _ => ValueSource::CallSite {
                        callee: COMPLEX.to_string(),
                        line: loc.line,
                        column: loc.column,
                    },
                }
            }
            Expr::New(new_expr) => {
                let loc = self.loc(new_expr.span);
                ValueSource::ConstructorCall {
                    class_name: ident_name(&new_expr.callee).unwrap_or_else(|| COMPLEX.to_string()),
                    line: loc.line,
                    column: loc.column,
                }
            }

            Expr::Fn(fn_expr) => {
                ValueSource::Function { name: fn_expr.ident.as_ref().map(|i| i.sym.to_string()) }
            }
            Expr::Arrow(_) => ValueSource::Function { name: None },

            Expr::Object(object) => {
                let node = self.classify_object_literal(object);
                ValueSource::ObjectLiteral { node }
            }
            Expr::Array(array) => {
                let elements: Vec<ValueSource> = array
                    .elems
                    .iter()
                    .flatten()
                    .map(|element| self.classify_expression(&element.expr))
                    .collect();
                let loc = self.loc(array.span);
                let id = self.ids.coordinate(cpg_common::NodeKind::ArrayLiteral, loc.line, loc.column);
                let index = self.records.array_literals.len();
                self.records.array_literals.push(ArrayLiteralRecord {
                    id: id.clone(),
                    elements,
                    loc,
                });
                let handle = RecordHandle { buffer: BufferKind::ArrayLiteral, index };
                let path = self.scopes.scope_path();
                self.ids.register(&id, handle, &path);
                ValueSource::ArrayLiteral { node: handle }
            }

            Expr::Member(member) => {
                let (object, property, computed, computed_var) = self.member_parts(member);
                let node = self.emit_expression(
                    "MemberExpression",
                    member.span,
                    ExpressionDetail::Member { object, property, computed, computed_var },
                );
                ValueSource::Expression { node }
            }
            Expr::OptChain(chain) => match &*chain.base {
                OptChainBase::Member(member) => {
                    let (object, property, computed, computed_var) = self.member_parts(member);
                    let node = self.emit_expression(
                        "OptionalMemberExpression",
                        chain.span,
                        ExpressionDetail::Member { object, property, computed, computed_var },
                    );
                    ValueSource::Expression { node }
                }
                OptChainBase::Call(call) => {
                    let loc = self.loc(chain.span);
                    match &*call.callee {
                        Expr::Member(_) => {
                            ValueSource::MethodCall { line: loc.line, column: loc.column }
                        }
                        Expr::Ident(ident) => ValueSource::CallSite {
                            callee: ident.sym.to_string(),
                            line: loc.line,
                            column: loc.column,
                        },
                        _ => ValueSource::CallSite {
                            callee: COMPLEX.to_string(),
                            line: loc.line,
                            column: loc.column,
                        },
                    }
                }
            },

            Expr::Bin(binary) => {
                let node = self.emit_expression(
                    "BinaryExpression",
                    binary.span,
                    ExpressionDetail::Binary {
                        operator: binary.op.as_str().to_string(),
                        left: expr_ident_name(&binary.left),
                        right: expr_ident_name(&binary.right),
                    },
                );
                ValueSource::Expression { node }
            }
            Expr::Cond(conditional) => {
                // Recurse into both arms so nested literals and calls get
                // their own anchors.
                self.classify_expression(&conditional.cons);
                self.classify_expression(&conditional.alt);
                let node = self.emit_expression(
                    "ConditionalExpression",
                    conditional.span,
                    ExpressionDetail::Conditional {
                        consequent: expr_ident_name(&conditional.cons),
                        alternate: expr_ident_name(&conditional.alt),
                    },
                );
                ValueSource::Expression { node }
            }
            Expr::Tpl(template) => {
                let mut identifiers = Vec::new();
                for embedded in &template.exprs {
                    if let Expr::Ident(ident) = &**embedded {
                        identifiers.push(ident.sym.to_string());
                    }
                    self.classify_expression(embedded);
                }
                let node = self.emit_expression(
                    "TemplateLiteral",
                    template.span,
                    ExpressionDetail::Template { identifiers },
                );
                ValueSource::Expression { node }
            }

            Expr::This(_) => ValueSource::Variable { name: "this".to_string() },

            other => {
                let node = self.emit_expression(
                    "Expression",
                    other.span(),
                    ExpressionDetail::Other { repr: self.snippet(other.span()) },
                );
                ValueSource::Expression { node }
            }
        }
    }

    /// Emits an EXPRESSION anchor and registers its coordinate id.
    pub(super) fn emit_expression(
        &mut self,
        ast_kind: &str,
        span: swc_common::Span,
        detail: ExpressionDetail,
    ) -> RecordHandle {
        let loc = self.loc(span);
        let id = self.ids.expression(ast_kind, loc.line, loc.column);
        let index = self.records.expressions.len();
        self.records.expressions.push(ExpressionRecord {
            id: id.clone(),
            ast_kind: ast_kind.to_string(),
            detail,
            loc,
        });
        let handle = RecordHandle { buffer: BufferKind::Expression, index };
        let path = self.scopes.scope_path();
        self.ids.register(&id, handle, &path);
        handle
    }

    /// Emits an OBJECT_LITERAL anchor and one property record per entry,
    /// recursing into nested objects, spreads, computed keys, and methods.
    pub(super) fn classify_object_literal(&mut self, object: &ObjectLit) -> RecordHandle {
        let loc = self.loc(object.span);
        let id = self.ids.coordinate(cpg_common::NodeKind::ObjectLiteral, loc.line, loc.column);
        let index = self.records.object_literals.len();
        self.records.object_literals.push(ObjectLiteralRecord { id: id.clone(), loc });
        let handle = RecordHandle { buffer: BufferKind::ObjectLiteral, index };
        let path = self.scopes.scope_path();
        self.ids.register(&id, handle, &path);

        for prop in &object.props {
            let record = match prop {
                PropOrSpread::Spread(spread) => {
                    let value = self.classify_expression(&spread.expr);
                    ObjectPropertyRecord {
                        object: handle,
                        key: "<spread>".to_string(),
                        computed: false,
                        is_spread: true,
                        is_method: false,
                        value: Some(value),
                    }
                }
                PropOrSpread::Prop(prop) => match &**prop {
                    Prop::Shorthand(ident) => ObjectPropertyRecord {
                        object: handle,
                        key: ident.sym.to_string(),
                        computed: false,
                        is_spread: false,
                        is_method: false,
                        value: Some(ValueSource::Variable { name: ident.sym.to_string() }),
                    },
                    Prop::KeyValue(entry) => {
                        let (key, computed) = prop_key(&entry.key);
                        let value = self.classify_expression(&entry.value);
                        ObjectPropertyRecord {
                            object: handle,
                            key,
                            computed,
                            is_spread: false,
                            is_method: false,
                            value: Some(value),
                        }
                    }
                    Prop::Assign(entry) => {
                        let value = self.classify_expression(&entry.value);
                        ObjectPropertyRecord {
                            object: handle,
                            key: entry.key.sym.to_string(),
                            computed: false,
                            is_spread: false,
                            is_method: false,
                            value: Some(value),
                        }
                    }
                    Prop::Getter(entry) => {
                        let (key, computed) = prop_key(&entry.key);
                        ObjectPropertyRecord {
                            object: handle,
                            key,
                            computed,
                            is_spread: false,
                            is_method: true,
                            value: None,
                        }
                    }
                    Prop::Setter(entry) => {
                        let (key, computed) = prop_key(&entry.key);
                        ObjectPropertyRecord {
                            object: handle,
                            key,
                            computed,
                            is_spread: false,
                            is_method: true,
                            value: None,
                        }
                    }
                    Prop::Method(entry) => {
                        let (key, computed) = prop_key(&entry.key);
                        ObjectPropertyRecord {
                            object: handle,
                            key: key.clone(),
                            computed,
                            is_spread: false,
                            is_method: true,
                            value: Some(ValueSource::Function { name: Some(key) }),
                        }
                    }
                },
            };
            self.records.object_properties.push(record);
        }

        handle
    }

    /// Splits a member expression into receiver, property, and computed-key
    /// information. `this` receivers keep the literal name; callers resolve
    /// it to the enclosing class where that matters.
    pub(super) fn member_parts(
        &mut self,
        member: &MemberExpr,
    ) -> (String, String, bool, Option<String>) {
        let object = render_receiver(&member.obj);
        match &member.prop {
            MemberProp::Ident(ident) => (object, ident.sym.to_string(), false, None),
            MemberProp::PrivateName(name) => (object, format!("#{}", name.id.sym), false, None),
            MemberProp::Computed(computed) => match &*computed.expr {
                Expr::Lit(Lit::Str(key)) => (object, key.value.to_string(), true, None),
                Expr::Lit(Lit::Num(key)) => (object, render_number(key.value), true, None),
                Expr::Ident(key) => {
                    (object, COMPUTED.to_string(), true, Some(key.sym.to_string()))
                }
                _ => (object, COMPUTED.to_string(), true, None),
            },
        }
    }

    /// Resolves `this` to the nearest enclosing class name, when inside one.
    pub(super) fn enclosing_class_name(&self) -> Option<String> {
        self.scopes.enclosing_scope(ScopeKind::Class).map(str::to_string)
    }
}

/// Renders a member-expression receiver as a dotted name, with sentinels for
/// shapes that have none.
pub(super) fn render_receiver(expr: &Expr) -> String {
    match expr {
        Expr::Ident(ident) => ident.sym.to_string(),
        Expr::This(_) => "this".to_string(),
        Expr::Member(member) => {
            let base = render_receiver(&member.obj);
            match &member.prop {
                MemberProp::Ident(ident) => format!("{base}.{}", ident.sym),
                _ => format!("{base}.{COMPUTED}"),
            }
        }
        Expr::Call(_) | Expr::New(_) => "<call>".to_string(),
        Expr::Paren(inner) => render_receiver(&inner.expr),
        Expr::Await(inner) => render_receiver(&inner.arg),
        _ => COMPLEX.to_string(),
    }
}

/// Returns the identifier name of an expression, if it is one.
pub(super) fn expr_ident_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Ident(ident) => Some(ident.sym.to_string()),
        Expr::Paren(inner) => expr_ident_name(&inner.expr),
        Expr::Await(inner) => expr_ident_name(&inner.arg),
        _ => None,
    }
}

/// Returns the class name of a `new` callee, if it is a plain identifier.
pub(super) fn ident_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Ident(ident) => Some(ident.sym.to_string()),
        Expr::Paren(inner) => ident_name(&inner.expr),
        _ => None,
    }
}

/// Renders a property key.
pub(super) fn prop_key(key: &PropName) -> (String, bool) {
    match key {
        PropName::Ident(ident) => (ident.sym.to_string(), false),
        PropName::Str(value) => (value.value.to_string(), false),
        PropName::Num(value) => (render_number(value.value), false),
        PropName::BigInt(value) => (value.value.to_string(), false),
        PropName::Computed(_) => (COMPUTED.to_string(), true),
    }
}

/// Renders a literal's value and type tag.
pub(super) fn literal_parts(lit: &Lit) -> (String, String) {
    match lit {
        Lit::Str(value) => (value.value.to_string(), "string".to_string()),
        Lit::Num(value) => (render_number(value.value), "number".to_string()),
        Lit::Bool(value) => (value.value.to_string(), "boolean".to_string()),
        Lit::Null(_) => ("null".to_string(), "null".to_string()),
        Lit::BigInt(value) => (value.value.to_string(), "bigint".to_string()),
        Lit::Regex(value) => (format!("/{}/{}", value.exp, value.flags), "regex".to_string()),
        Lit::JSXText(value) => (value.value.to_string(), "string".to_string()),
    }
}

/// Renders a numeric literal without a trailing `.0` for integral values.
pub(super) fn render_number(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
