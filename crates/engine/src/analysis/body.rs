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

//! Function body traversal.
//!
//! One recursive walk per function body multiplexes the variable, return,
//! yield, throw, loop, branch, try, call, new, property-access, and update
//! handlers. All handlers share a [`FnCtx`]: the per-function control-flow
//! state, the parameter map, the invoked-parameter set, and the promise
//! executor binding when the function is one. The same walker serves the
//! module-level passes with a module context (no enclosing function).
//!
//! Byte-range dedup sets on the analyzer keep records unique when more than
//! one pass reaches the same AST node.

use std::collections::{BTreeSet, HashMap};

use swc_common::{Span, Spanned};
use swc_ecma_ast::{
    ArrowExpr, BlockStmt, BlockStmtOrExpr, CallExpr, Callee, ClassMember, Decl, DoWhileStmt, Expr,
    ForHead, ForInStmt, ForOfStmt, ForStmt, Function, Ident, IfStmt, Lit, MemberProp,
    MetaPropKind, NewExpr, Pat, PatOrExpr, ReturnStmt, Stmt, SwitchStmt, ThrowStmt, TryStmt,
    VarDecl, VarDeclKind, VarDeclOrExpr, WhileStmt, YieldExpr,
};

use crate::analysis::{
    classify::{expr_ident_name, ident_name, literal_parts, render_receiver, COMPLEX, COMPUTED},
    extract_bound_names,
    trace::trace_error_class,
    ArgValue, AssignmentRecord, BranchKind, BranchRecord, BufferKind, CallArgumentRecord,
    CallRecord, CaseRecord, CatchBlockRecord, ConstructorCallRecord, ControlFlowSummary,
    FinallyBlockRecord, FunctionRecord, LoopKind, LoopRecord, ModuleAnalyzer,
    PropertyAccessRecord, RecordHandle, RejectionKind, ResolutionKind, ResolutionRecord,
    ReturnKind, ReturnRecord, ScopeKind, ThrowRecord, TryBlockRecord,
};
use cpg_common::NodeKind;

/// Per-function control-flow counters. Depth counters must return to zero
/// when the body traversal finishes.
#[derive(Debug, Default, Clone)]
pub(super) struct ControlFlowState {
    pub branch_count: u32,
    pub loop_count: u32,
    pub case_count: u32,
    pub logical_op_count: u32,
    pub has_try_catch: bool,
    pub has_early_return: bool,
    pub has_throw: bool,
    pub return_count: u32,
    pub try_block_depth: usize,
    pub loop_depth: usize,
}

impl ControlFlowState {
    pub(super) fn summary(&self) -> ControlFlowSummary {
        ControlFlowSummary {
            has_branches: self.branch_count > 0,
            has_loops: self.loop_count > 0,
            has_try_catch: self.has_try_catch,
            has_early_return: self.has_early_return,
            has_throw: self.has_throw,
            cyclomatic_complexity: 1
                + self.branch_count
                + self.loop_count
                + self.case_count
                + self.logical_op_count,
        }
    }
}

/// Resolve/reject binding of a promise executor function.
#[derive(Debug, Clone)]
pub(super) struct ExecutorContext {
    pub resolve: Option<String>,
    pub reject: Option<String>,
    pub constructor_call: RecordHandle,
    /// The function enclosing the `new Promise(...)`.
    pub owner: Option<RecordHandle>,
}

/// Shared context of all handlers over one function body. A module-level
/// context (no function) drives the module passes through the same walker.
#[derive(Debug, Default)]
pub(super) struct FnCtx<'a> {
    /// The function under analysis; `None` for module-level walks.
    pub function: Option<RecordHandle>,
    pub is_async: bool,
    pub is_generator: bool,
    /// Parameter name → parameter index.
    pub params: HashMap<String, usize>,
    /// Parameter indexes invoked inside the body.
    pub invoked: BTreeSet<usize>,
    pub cf: ControlFlowState,
    /// Depth of conditional ancestors (if / switch / loop / try / catch).
    pub conditional_depth: usize,
    /// The function's block body, used by the throw micro-tracer.
    pub body: Option<&'a BlockStmt>,
    /// Present when this function is a registered promise executor.
    pub executor: Option<ExecutorContext>,
}

impl FnCtx<'_> {
    /// Context for module-level walks.
    pub(super) fn module() -> Self {
        Self::default()
    }
}

/// How a callable was reached, shaping name and flags of its record.
#[derive(Debug, Default)]
pub(super) struct FunctionOrigin {
    /// Name to use instead of the AST name (binding or assignment target).
    pub name_hint: Option<String>,
    pub is_assignment: bool,
    pub is_callback: bool,
    pub is_method: bool,
    /// Enclosing class name for methods.
    pub class_name: Option<String>,
}

/// A callable AST node.
pub(super) enum Callable<'a> {
    Func { ident: Option<&'a Ident>, function: &'a Function },
    Arrow(&'a ArrowExpr),
}

impl Callable<'_> {
    fn span(&self) -> Span {
        match self {
            Self::Func { function, .. } => function.span,
            Self::Arrow(arrow) => arrow.span,
        }
    }
}

/* Function body traversal */
impl<'a> ModuleAnalyzer<'a> {
    /// Walks every statement of a function body with the given context.
    pub(super) fn analyze_block(&mut self, body: &'a BlockStmt, fx: &mut FnCtx<'a>) {
        for stmt in &body.stmts {
            self.walk_stmt(stmt, fx);
        }
    }

    pub(super) fn walk_stmt(&mut self, stmt: &'a Stmt, fx: &mut FnCtx<'a>) {
        match stmt {
            Stmt::Decl(Decl::Var(var)) => self.handle_var_decl(var, fx),
            Stmt::Decl(Decl::Fn(decl)) => {
                self.process_function(
                    Callable::Func { ident: Some(&decl.ident), function: &decl.function },
                    FunctionOrigin::default(),
                );
            }
            Stmt::Decl(Decl::Class(decl)) => {
                let name = decl.ident.sym.to_string();
                self.handle_class(&name, &decl.class);
            }
            Stmt::Decl(_) => {}
            Stmt::Expr(expr_stmt) => self.walk_expr(&expr_stmt.expr, fx),
            Stmt::Return(ret) => self.handle_return(ret, fx),
            Stmt::Throw(throw) => self.handle_throw(throw, fx),
            Stmt::If(if_stmt) => self.handle_if(if_stmt, fx, None),
            Stmt::Switch(switch) => self.handle_switch(switch, fx),
            Stmt::Try(try_stmt) => self.handle_try(try_stmt, fx),
            Stmt::For(for_stmt) => self.handle_for(for_stmt, fx),
            Stmt::ForIn(for_in) => self.handle_for_in(for_in, fx),
            Stmt::ForOf(for_of) => self.handle_for_of(for_of, fx),
            Stmt::While(while_stmt) => self.handle_while(while_stmt, fx),
            Stmt::DoWhile(do_while) => self.handle_do_while(do_while, fx),
            Stmt::Block(block) => self.analyze_block(block, fx),
            Stmt::Labeled(labeled) => self.walk_stmt(&labeled.body, fx),
            _ => {}
        }
    }

    pub(super) fn walk_expr(&mut self, expr: &'a Expr, fx: &mut FnCtx<'a>) {
        match expr {
            Expr::Call(call) => {
                self.handle_call(call, fx, false);
            }
            Expr::New(new_expr) => {
                self.handle_new(new_expr, fx, false);
            }
            Expr::Await(await_expr) => match &*await_expr.arg {
                Expr::Call(call) => {
                    self.handle_call(call, fx, true);
                }
                Expr::New(new_expr) => {
                    self.handle_new(new_expr, fx, true);
                }
                other => self.walk_expr(other, fx),
            },
            Expr::Assign(assign) => self.handle_assign(assign, fx),
            Expr::Update(update) => self.record_update_expression(update),
            Expr::Member(member) => {
                self.handle_property_access(expr.span(), member.obj.as_ref(), &member.prop, false);
                self.walk_expr(&member.obj, fx);
                if let MemberProp::Computed(computed) = &member.prop {
                    self.walk_expr(&computed.expr, fx);
                }
            }
            Expr::OptChain(chain) => match &*chain.base {
                swc_ecma_ast::OptChainBase::Member(member) => {
                    self.handle_property_access(
                        chain.span,
                        member.obj.as_ref(),
                        &member.prop,
                        true,
                    );
                    self.walk_expr(&member.obj, fx);
                }
                swc_ecma_ast::OptChainBase::Call(call) => {
                    self.walk_expr(&call.callee, fx);
                    for argument in &call.args {
                        self.walk_expr(&argument.expr, fx);
                    }
                }
            },
            Expr::MetaProp(meta) if meta.kind == MetaPropKind::NewTarget => {
                self.record_new_target(meta.span);
            }
            Expr::Cond(conditional) => self.handle_ternary(conditional, fx),
            Expr::Bin(binary) => {
                self.walk_expr(&binary.left, fx);
                self.walk_expr(&binary.right, fx);
            }
            Expr::Unary(unary) => self.walk_expr(&unary.arg, fx),
            Expr::Seq(seq) => {
                for inner in &seq.exprs {
                    self.walk_expr(inner, fx);
                }
            }
            Expr::Paren(paren) => self.walk_expr(&paren.expr, fx),
            Expr::Fn(fn_expr) => {
                self.process_function(
                    Callable::Func { ident: fn_expr.ident.as_ref(), function: &fn_expr.function },
                    FunctionOrigin::default(),
                );
            }
            Expr::Arrow(arrow) => {
                self.process_function(Callable::Arrow(arrow), FunctionOrigin::default());
            }
            Expr::Class(class_expr) => {
                if let Some(ident) = &class_expr.ident {
                    let name = ident.sym.to_string();
                    self.handle_class(&name, &class_expr.class);
                }
            }
            Expr::Yield(yield_expr) => self.handle_yield(yield_expr, fx),
            Expr::Object(object) => {
                for prop in &object.props {
                    match prop {
                        swc_ecma_ast::PropOrSpread::Spread(spread) => {
                            self.walk_expr(&spread.expr, fx)
                        }
                        swc_ecma_ast::PropOrSpread::Prop(prop) => {
                            if let swc_ecma_ast::Prop::KeyValue(entry) = &**prop {
                                self.walk_expr(&entry.value, fx);
                            }
                        }
                    }
                }
            }
            Expr::Array(array) => {
                for element in array.elems.iter().flatten() {
                    self.walk_expr(&element.expr, fx);
                }
            }
            Expr::Tpl(template) => {
                for embedded in &template.exprs {
                    self.walk_expr(embedded, fx);
                }
            }
            Expr::TaggedTpl(tagged) => {
                for embedded in &tagged.tpl.exprs {
                    self.walk_expr(embedded, fx);
                }
            }
            Expr::TsAs(inner) => self.walk_expr(&inner.expr, fx),
            Expr::TsNonNull(inner) => self.walk_expr(&inner.expr, fx),
            Expr::TsConstAssertion(inner) => self.walk_expr(&inner.expr, fx),
            Expr::TsTypeAssertion(inner) => self.walk_expr(&inner.expr, fx),
            Expr::TsSatisfies(inner) => self.walk_expr(&inner.expr, fx),
            _ => {}
        }
    }

    /* 4.4.1 variables */

    pub(super) fn handle_var_decl(&mut self, var: &'a VarDecl, fx: &mut FnCtx<'a>) {
        for declarator in &var.decls {
            match &declarator.name {
                Pat::Ident(binding) => {
                    let name = binding.id.sym.to_string();
                    let constant = var.kind == VarDeclKind::Const
                        && is_constant_initializer(declarator.init.as_deref());
                    let variable = self.declare_variable(&name, binding.id.span, constant);
                    if let Some(init) = declarator.init.as_deref() {
                        if let Some(callable) = as_callable(init) {
                            self.process_function(
                                callable,
                                FunctionOrigin {
                                    name_hint: Some(name.clone()),
                                    ..Default::default()
                                },
                            );
                        }
                        let mut source = self.classify_expression(init);
                        // An anonymous function initializer takes the
                        // binding's name.
                        if let crate::analysis::ValueSource::Function { name: fn_name @ None } =
                            &mut source
                        {
                            *fn_name = Some(name);
                        }
                        let loc = self.loc(declarator.span);
                        self.records.assignments.push(AssignmentRecord {
                            variable,
                            source,
                            loc,
                        });
                        self.walk_expr(init, fx);
                    }
                }
                pattern => {
                    let bound = extract_bound_names(pattern);
                    let pairs: Vec<_> = bound
                        .into_iter()
                        .map(|name| {
                            let variable = self.declare_variable(&name.name, name.span, false);
                            (name, variable)
                        })
                        .collect();
                    if let Some(init) = declarator.init.as_deref() {
                        self.track_destructuring(&pairs, init);
                        self.walk_expr(init, fx);
                    }
                }
            }
        }
    }

    pub(super) fn declare_variable(
        &mut self,
        name: &str,
        span: Span,
        constant: bool,
    ) -> RecordHandle {
        let kind = if constant { NodeKind::Constant } else { NodeKind::Variable };
        let scope_path = self.scopes.scope_path();
        let id = self.ids.semantic(kind, name, &scope_path);
        let loc = self.loc(span);
        let index = self.records.variables.len();
        self.records.variables.push(crate::analysis::VariableRecord {
            id: id.clone(),
            kind,
            name: name.to_string(),
            loc,
            scope_id: self.current_scope_id().to_string(),
            scope_path: scope_path.clone(),
        });
        let handle = RecordHandle { buffer: BufferKind::Variable, index };
        self.ids.register(&id, handle, &scope_path);
        handle
    }

    /* 4.4.2 returns and yields */

    fn handle_return(&mut self, ret: &'a ReturnStmt, fx: &mut FnCtx<'a>) {
        let Some(function) = fx.function else {
            // Top-level return is not valid module code; nothing to record.
            if let Some(arg) = ret.arg.as_deref() {
                self.walk_expr(arg, fx);
            }
            return;
        };
        fx.cf.return_count += 1;
        let is_early = fx.conditional_depth > 0;
        if is_early {
            fx.cf.has_early_return = true;
        }
        let value = ret.arg.as_deref().map(|arg| self.classify_expression(arg));
        let loc = self.loc(ret.span);
        self.records.returns.push(ReturnRecord {
            function,
            kind: ReturnKind::Return,
            delegate: false,
            value,
            is_early,
            loc,
        });
        if let Some(arg) = ret.arg.as_deref() {
            self.walk_expr(arg, fx);
        }
    }

    fn handle_yield(&mut self, yield_expr: &'a YieldExpr, fx: &mut FnCtx<'a>) {
        let Some(function) = fx.function else { return };
        // Bare `yield;` is only recorded when delegating.
        if yield_expr.arg.is_none() && !yield_expr.delegate {
            return;
        }
        let value = yield_expr.arg.as_deref().map(|arg| self.classify_expression(arg));
        let loc = self.loc(yield_expr.span);
        self.records.returns.push(ReturnRecord {
            function,
            kind: ReturnKind::Yield,
            delegate: yield_expr.delegate,
            value,
            is_early: false,
            loc,
        });
        if let Some(arg) = yield_expr.arg.as_deref() {
            self.walk_expr(arg, fx);
        }
    }

    /* 4.4.3 throws */

    fn handle_throw(&mut self, throw: &'a ThrowStmt, fx: &mut FnCtx<'a>) {
        fx.cf.has_throw = true;
        let loc = self.loc(throw.span);
        let base_kind =
            if fx.is_async { RejectionKind::AsyncThrow } else { RejectionKind::SyncThrow };

        let record = match &*throw.arg {
            Expr::New(new_expr) => ThrowRecord {
                function: fx.function,
                kind: base_kind,
                error_class: ident_name(&new_expr.callee),
                variable: None,
                trace_path: Vec::new(),
                loc,
            },
            Expr::Ident(ident) => {
                let name = ident.sym.to_string();
                if fx.params.contains_key(&name) {
                    ThrowRecord {
                        function: fx.function,
                        kind: RejectionKind::VariableParameter,
                        error_class: None,
                        variable: Some(name),
                        trace_path: Vec::new(),
                        loc,
                    }
                } else {
                    let outcome = fx
                        .body
                        .map(|body| trace_error_class(body, &name))
                        .unwrap_or_else(|| crate::analysis::trace::TraceOutcome {
                            class_name: None,
                            path: vec![name.clone()],
                        });
                    let kind = if outcome.class_name.is_some() {
                        RejectionKind::VariableTraced
                    } else {
                        RejectionKind::VariableUnknown
                    };
                    ThrowRecord {
                        function: fx.function,
                        kind,
                        error_class: outcome.class_name,
                        variable: Some(name),
                        trace_path: outcome.path,
                        loc,
                    }
                }
            }
            _ => ThrowRecord {
                function: fx.function,
                kind: base_kind,
                error_class: None,
                variable: None,
                trace_path: Vec::new(),
                loc,
            },
        };
        self.records.throws.push(record);
        self.walk_expr(&throw.arg, fx);
    }

    /* 4.4.7 branches */

    pub(super) fn handle_if(
        &mut self,
        if_stmt: &'a IfStmt,
        fx: &mut FnCtx<'a>,
        parent_branch: Option<RecordHandle>,
    ) {
        fx.cf.branch_count += 1;
        fx.cf.logical_op_count += count_logical_ops(&if_stmt.test);

        let segment_index = self.scopes.sibling_index(ScopeKind::If.tag());
        let segment = format!("if[{segment_index}]");
        let condition = self.snippet(if_stmt.test.span());
        let scope_path = self.scopes.scope_path();
        let id = self.ids.semantic(NodeKind::Branch, &segment, &scope_path);
        let parent_id = match parent_branch {
            Some(branch) => self.records.id_of(branch).to_string(),
            None => self.current_scope_id().to_string(),
        };
        let loc = self.loc(if_stmt.span);
        let index = self.records.branches.len();
        self.records.branches.push(BranchRecord {
            id: id.clone(),
            branch_type: BranchKind::If,
            condition: Some(condition.clone()),
            parent_id,
            loc,
        });
        let branch = RecordHandle { buffer: BufferKind::Branch, index };
        self.ids.register(&id, branch, &scope_path);

        self.walk_expr(&if_stmt.test, fx);

        // Consequent body scope, parented to the branch.
        let branch_id = self.records.id_of(branch).to_string();
        self.begin_scope(ScopeKind::If, Some(&segment), &branch_id, Some(condition), if_stmt.cons.span());
        fx.conditional_depth += 1;
        self.walk_stmt(&if_stmt.cons, fx);
        fx.conditional_depth -= 1;
        self.end_scope();

        match if_stmt.alt.as_deref() {
            // `else if` chains parent the inner branch to the outer one.
            Some(Stmt::If(chained)) => self.handle_if(chained, fx, Some(branch)),
            Some(alternate) => {
                let else_index = self.scopes.sibling_index(ScopeKind::Else.tag());
                let else_segment = format!("else[{else_index}]");
                self.begin_scope(ScopeKind::Else, Some(&else_segment), &branch_id, None, alternate.span());
                fx.conditional_depth += 1;
                self.walk_stmt(alternate, fx);
                fx.conditional_depth -= 1;
                self.end_scope();
            }
            None => {}
        }
    }

    fn handle_ternary(&mut self, conditional: &'a swc_ecma_ast::CondExpr, fx: &mut FnCtx<'a>) {
        fx.cf.branch_count += 1;
        fx.cf.logical_op_count += count_logical_ops(&conditional.test);

        let segment_index = self.scopes.sibling_index("ternary");
        let segment = format!("ternary[{segment_index}]");
        let scope_path = self.scopes.scope_path();
        let id = self.ids.semantic(NodeKind::Branch, &segment, &scope_path);
        let loc = self.loc(conditional.span);
        let index = self.records.branches.len();
        self.records.branches.push(BranchRecord {
            id: id.clone(),
            branch_type: BranchKind::Ternary,
            condition: Some(self.snippet(conditional.test.span())),
            parent_id: self.current_scope_id().to_string(),
            loc,
        });
        self.ids.register(&id, RecordHandle { buffer: BufferKind::Branch, index }, &scope_path);

        self.walk_expr(&conditional.test, fx);
        fx.conditional_depth += 1;
        self.walk_expr(&conditional.cons, fx);
        self.walk_expr(&conditional.alt, fx);
        fx.conditional_depth -= 1;
    }

    fn handle_switch(&mut self, switch: &'a SwitchStmt, fx: &mut FnCtx<'a>) {
        fx.cf.branch_count += 1;

        let segment_index = self.scopes.sibling_index("switch");
        let segment = format!("switch[{segment_index}]");
        let scope_path = self.scopes.scope_path();
        let id = self.ids.semantic(NodeKind::Branch, &segment, &scope_path);
        let loc = self.loc(switch.span);
        let index = self.records.branches.len();
        self.records.branches.push(BranchRecord {
            id: id.clone(),
            branch_type: BranchKind::Switch,
            condition: Some(self.snippet(switch.discriminant.span())),
            parent_id: self.current_scope_id().to_string(),
            loc,
        });
        let branch = RecordHandle { buffer: BufferKind::Branch, index };
        self.ids.register(&id, branch, &scope_path);

        self.walk_expr(&switch.discriminant, fx);
        let branch_id = self.records.id_of(branch).to_string();

        for case in &switch.cases {
            let is_default = case.test.is_none();
            if !is_default {
                fx.cf.case_count += 1;
            }
            let is_empty = case.cons.is_empty();
            let falls_through = is_empty || !stmts_terminate(&case.cons);

            let case_index = self.scopes.sibling_index(ScopeKind::SwitchCase.tag());
            let case_segment = format!("case[{case_index}]");
            let case_path = self.scopes.scope_path();
            let case_id = self.ids.semantic(NodeKind::Case, &case_segment, &case_path);
            let case_loc = self.loc(case.span);
            let case_handle_index = self.records.cases.len();
            self.records.cases.push(CaseRecord {
                id: case_id.clone(),
                branch,
                value: case.test.as_deref().map(|test| self.snippet(test.span())),
                is_default,
                falls_through,
                is_empty,
                loc: case_loc,
            });
            self.ids.register(
                &case_id,
                RecordHandle { buffer: BufferKind::Case, index: case_handle_index },
                &case_path,
            );

            if let Some(test) = case.test.as_deref() {
                self.walk_expr(test, fx);
            }
            if !is_empty {
                self.begin_scope(
                    ScopeKind::SwitchCase,
                    Some(&case_segment),
                    &branch_id,
                    None,
                    case.span,
                );
                fx.conditional_depth += 1;
                for stmt in &case.cons {
                    self.walk_stmt(stmt, fx);
                }
                fx.conditional_depth -= 1;
                self.end_scope();
            }
        }
    }

    /* 4.4.6 try / catch / finally */

    fn handle_try(&mut self, try_stmt: &'a TryStmt, fx: &mut FnCtx<'a>) {
        fx.cf.has_try_catch = true;

        let segment_index = self.scopes.sibling_index(ScopeKind::TryBlock.tag());
        let segment = format!("try[{segment_index}]");
        let scope_path = self.scopes.scope_path();
        let id = self.ids.semantic(NodeKind::TryBlock, &segment, &scope_path);
        let loc = self.loc(try_stmt.span);
        let index = self.records.try_blocks.len();
        self.records.try_blocks.push(TryBlockRecord {
            id: id.clone(),
            parent_scope_id: self.current_scope_id().to_string(),
            loc,
        });
        let try_handle = RecordHandle { buffer: BufferKind::TryBlock, index };
        self.ids.register(&id, try_handle, &scope_path);
        let try_id = self.records.id_of(try_handle).to_string();

        self.begin_scope(ScopeKind::TryBlock, Some(&segment), &try_id, None, try_stmt.block.span);
        fx.cf.try_block_depth += 1;
        fx.conditional_depth += 1;
        self.analyze_block(&try_stmt.block, fx);
        fx.conditional_depth -= 1;
        fx.cf.try_block_depth -= 1;
        self.end_scope();

        if let Some(handler) = &try_stmt.handler {
            let catch_index = self.scopes.sibling_index(ScopeKind::CatchBlock.tag());
            let catch_segment = format!("catch[{catch_index}]");
            let catch_path = self.scopes.scope_path();
            let catch_id = self.ids.semantic(NodeKind::CatchBlock, &catch_segment, &catch_path);
            let param = handler.param.as_ref().and_then(|pat| match pat {
                Pat::Ident(binding) => Some(binding.id.sym.to_string()),
                _ => None,
            });
            let catch_record_index = self.records.catch_blocks.len();
            self.records.catch_blocks.push(CatchBlockRecord {
                id: catch_id.clone(),
                try_block: try_handle,
                param,
                loc: self.loc(handler.span),
            });
            let catch_handle =
                RecordHandle { buffer: BufferKind::CatchBlock, index: catch_record_index };
            self.ids.register(&catch_id, catch_handle, &catch_path);
            let catch_node_id = self.records.id_of(catch_handle).to_string();

            self.begin_scope(
                ScopeKind::CatchBlock,
                Some(&catch_segment),
                &catch_node_id,
                None,
                handler.body.span,
            );
            fx.conditional_depth += 1;
            self.analyze_block(&handler.body, fx);
            fx.conditional_depth -= 1;
            self.end_scope();
        }

        if let Some(finalizer) = &try_stmt.finalizer {
            let finally_index = self.scopes.sibling_index(ScopeKind::FinallyBlock.tag());
            let finally_segment = format!("finally[{finally_index}]");
            let finally_path = self.scopes.scope_path();
            let finally_id =
                self.ids.semantic(NodeKind::FinallyBlock, &finally_segment, &finally_path);
            let finally_record_index = self.records.finally_blocks.len();
            self.records.finally_blocks.push(FinallyBlockRecord {
                id: finally_id.clone(),
                try_block: try_handle,
                loc: self.loc(finalizer.span),
            });
            let finally_handle =
                RecordHandle { buffer: BufferKind::FinallyBlock, index: finally_record_index };
            self.ids.register(&finally_id, finally_handle, &finally_path);
            let finally_node_id = self.records.id_of(finally_handle).to_string();

            self.begin_scope(
                ScopeKind::FinallyBlock,
                Some(&finally_segment),
                &finally_node_id,
                None,
                finalizer.span,
            );
            self.analyze_block(finalizer, fx);
            self.end_scope();
        }
    }

    /* 4.4.5 loops */

    fn handle_for(&mut self, for_stmt: &'a ForStmt, fx: &mut FnCtx<'a>) {
        let init = for_stmt.init.as_ref().map(|init| match init {
            VarDeclOrExpr::VarDecl(var) => self.snippet(var.span),
            VarDeclOrExpr::Expr(expr) => self.snippet(expr.span()),
        });
        let test = for_stmt.test.as_deref().map(|test| self.snippet(test.span()));
        let update = for_stmt.update.as_deref().map(|update| self.snippet(update.span()));
        if let Some(test) = for_stmt.test.as_deref() {
            fx.cf.logical_op_count += count_logical_ops(test);
        }

        let (loop_handle, segment) = self.emit_loop(LoopKind::For, for_stmt.span, |record| {
            record.init = init;
            record.test = test;
            record.update = update;
        });

        self.enter_loop_body(loop_handle, &segment, for_stmt.body.span(), fx, |analyzer, fx| {
            if let Some(VarDeclOrExpr::VarDecl(var)) = &for_stmt.init {
                analyzer.declare_loop_bindings(var, fx);
            }
            if let Some(VarDeclOrExpr::Expr(expr)) = &for_stmt.init {
                analyzer.walk_expr(expr, fx);
            }
            if let Some(test) = for_stmt.test.as_deref() {
                analyzer.walk_expr(test, fx);
            }
            if let Some(update) = for_stmt.update.as_deref() {
                analyzer.walk_expr(update, fx);
            }
            analyzer.walk_stmt(&for_stmt.body, fx);
        });
    }

    fn handle_for_in(&mut self, for_in: &'a ForInStmt, fx: &mut FnCtx<'a>) {
        let iterates_over = expr_ident_name(&for_in.right)
            .unwrap_or_else(|| self.snippet(for_in.right.span()));
        let (loop_handle, segment) = self.emit_loop(LoopKind::ForIn, for_in.span, |record| {
            record.iterates_over = Some(iterates_over);
        });

        self.walk_expr(&for_in.right, fx);
        self.enter_loop_body(loop_handle, &segment, for_in.body.span(), fx, |analyzer, fx| {
            analyzer.declare_for_head(&for_in.left, fx);
            analyzer.walk_stmt(&for_in.body, fx);
        });
    }

    fn handle_for_of(&mut self, for_of: &'a ForOfStmt, fx: &mut FnCtx<'a>) {
        let iterates_over = expr_ident_name(&for_of.right)
            .unwrap_or_else(|| self.snippet(for_of.right.span()));
        let is_await = for_of.is_await;
        let (loop_handle, segment) = self.emit_loop(LoopKind::ForOf, for_of.span, |record| {
            record.iterates_over = Some(iterates_over);
            record.is_await = is_await;
        });

        self.walk_expr(&for_of.right, fx);
        self.enter_loop_body(loop_handle, &segment, for_of.body.span(), fx, |analyzer, fx| {
            analyzer.declare_for_head(&for_of.left, fx);
            analyzer.walk_stmt(&for_of.body, fx);
        });
    }

    fn handle_while(&mut self, while_stmt: &'a WhileStmt, fx: &mut FnCtx<'a>) {
        fx.cf.logical_op_count += count_logical_ops(&while_stmt.test);
        let condition = self.snippet(while_stmt.test.span());
        let (loop_handle, segment) = self.emit_loop(LoopKind::While, while_stmt.span, |record| {
            record.condition = Some(condition);
        });

        self.walk_expr(&while_stmt.test, fx);
        self.enter_loop_body(loop_handle, &segment, while_stmt.body.span(), fx, |analyzer, fx| {
            analyzer.walk_stmt(&while_stmt.body, fx);
        });
    }

    fn handle_do_while(&mut self, do_while: &'a DoWhileStmt, fx: &mut FnCtx<'a>) {
        fx.cf.logical_op_count += count_logical_ops(&do_while.test);
        let condition = self.snippet(do_while.test.span());
        let (loop_handle, segment) = self.emit_loop(LoopKind::DoWhile, do_while.span, |record| {
            record.condition = Some(condition);
        });

        self.enter_loop_body(loop_handle, &segment, do_while.body.span(), fx, |analyzer, fx| {
            analyzer.walk_stmt(&do_while.body, fx);
        });
        self.walk_expr(&do_while.test, fx);
    }

    fn emit_loop(
        &mut self,
        kind: LoopKind,
        span: Span,
        configure: impl FnOnce(&mut LoopRecord),
    ) -> (RecordHandle, String) {
        let tag = kind.body_scope().tag();
        let segment_index = self.scopes.sibling_index(tag);
        let segment = format!("{tag}[{segment_index}]");
        let scope_path = self.scopes.scope_path();
        let id = self.ids.semantic(NodeKind::Loop, &segment, &scope_path);
        let mut record = LoopRecord {
            id: id.clone(),
            kind,
            parent_scope_id: self.current_scope_id().to_string(),
            iterates_over: None,
            init: None,
            test: None,
            update: None,
            condition: None,
            is_await: false,
            loc: self.loc(span),
        };
        configure(&mut record);
        let index = self.records.loops.len();
        self.records.loops.push(record);
        let handle = RecordHandle { buffer: BufferKind::Loop, index };
        self.ids.register(&id, handle, &scope_path);
        (handle, segment)
    }

    fn enter_loop_body(
        &mut self,
        loop_handle: RecordHandle,
        segment: &str,
        body_span: Span,
        fx: &mut FnCtx<'a>,
        walk: impl FnOnce(&mut Self, &mut FnCtx<'a>),
    ) {
        let kind = self.records.loops[loop_handle.index].kind.body_scope();
        let loop_id = self.records.id_of(loop_handle).to_string();
        // The body scope reuses the loop's counted segment name.
        self.begin_scope(kind, Some(segment), &loop_id, None, body_span);
        fx.cf.loop_count += 1;
        fx.cf.loop_depth += 1;
        fx.conditional_depth += 1;
        walk(self, fx);
        fx.conditional_depth -= 1;
        fx.cf.loop_depth -= 1;
        self.end_scope();
    }

    fn declare_for_head(&mut self, head: &'a ForHead, fx: &mut FnCtx<'a>) {
        match head {
            ForHead::VarDecl(var) => self.declare_loop_bindings(var, fx),
            ForHead::Pat(pat) => {
                for name in extract_bound_names(pat) {
                    self.declare_variable(&name.name, name.span, false);
                }
            }
            ForHead::UsingDecl(using) => {
                for declarator in &using.decls {
                    for name in extract_bound_names(&declarator.name) {
                        self.declare_variable(&name.name, name.span, false);
                    }
                }
            }
        }
    }

    fn declare_loop_bindings(&mut self, var: &'a VarDecl, fx: &mut FnCtx<'a>) {
        for declarator in &var.decls {
            for name in extract_bound_names(&declarator.name) {
                // Loop bindings of a const declaration are constants.
                self.declare_variable(&name.name, name.span, var.kind == VarDeclKind::Const);
            }
            if let Some(init) = declarator.init.as_deref() {
                self.walk_expr(init, fx);
            }
        }
    }

    /* 4.4.8 calls */

    pub(super) fn handle_call(
        &mut self,
        call: &'a CallExpr,
        fx: &mut FnCtx<'a>,
        awaited: bool,
    ) -> Option<RecordHandle> {
        let range = self.parsed.byte_range(call.span);
        if !self.processed_calls.insert(range) {
            return None;
        }

        // Mutation families piggyback on the call walk.
        self.detect_array_method_call(call);
        self.detect_object_assign(call);

        let (name, object, method, computed, is_method_call) = match &call.callee {
            Callee::Expr(callee) => match &**callee {
                Expr::Ident(ident) => (ident.sym.to_string(), None, None, false, false),
                Expr::Member(member) => {
                    let object = render_receiver(&member.obj);
                    let (method, computed) = match &member.prop {
                        MemberProp::Ident(prop) => (prop.sym.to_string(), false),
                        MemberProp::PrivateName(prop) => (format!("#{}", prop.id.sym), false),
                        MemberProp::Computed(_) => (COMPUTED.to_string(), true),
                    };
                    (method.clone(), Some(object), Some(method), computed, true)
                }
                _ => (COMPLEX.to_string(), None, None, false, false),
            },
            Callee::Super(_) => ("super".to_string(), None, None, false, false),
            Callee::Import(_) => ("import".to_string(), None, None, false, false),
        };

        let scope_path = self.scopes.scope_path();
        let id = self.ids.semantic(NodeKind::Call, &name, &scope_path);
        let loc = self.loc(call.span);
        let index = self.records.calls.len();
        self.records.calls.push(CallRecord {
            id: id.clone(),
            name: name.clone(),
            object: object.clone(),
            method,
            computed,
            is_new: false,
            is_awaited: awaited,
            is_inside_try: fx.cf.try_block_depth > 0,
            is_inside_loop: awaited && fx.cf.loop_depth > 0,
            is_method_call,
            parent_scope_id: self.current_scope_id().to_string(),
            enclosing_function: fx.function,
            loc,
        });
        let handle = RecordHandle { buffer: BufferKind::Call, index };
        self.ids.register(&id, handle, &scope_path);
        let call_id = self.records.id_of(handle).to_string();

        // User-defined higher-order detection: calling a parameter.
        if !is_method_call {
            if let Some(&param_index) = fx.params.get(&name) {
                fx.invoked.insert(param_index);
            }
        }

        // Promise executor resolution: calling the registered resolve/reject.
        if !is_method_call {
            self.resolve_executor_call(call, &name, handle, fx, loc);
        }

        // Promise.reject(...) as a rejection pattern.
        if object.as_deref() == Some("Promise") && name == "reject" {
            self.record_promise_reject(call, fx, loc);
        }

        self.record_call_arguments(call, handle, &call_id);

        // Walk argument expressions for nested calls, callbacks were already
        // processed by the argument pass.
        for argument in &call.args {
            self.walk_expr(&argument.expr, fx);
        }
        if let Callee::Expr(callee) = &call.callee {
            if let Expr::Member(member) = &**callee {
                self.walk_expr(&member.obj, fx);
            }
        }

        Some(handle)
    }

    fn resolve_executor_call(
        &mut self,
        call: &'a CallExpr,
        name: &str,
        handle: RecordHandle,
        fx: &mut FnCtx<'a>,
        loc: crate::analysis::SourceLoc,
    ) {
        let Some(executor) = fx.executor.clone() else { return };
        let kind = if executor.resolve.as_deref() == Some(name) {
            ResolutionKind::Resolve
        } else if executor.reject.as_deref() == Some(name) {
            ResolutionKind::Reject
        } else {
            return;
        };

        let argument = call.args.first().map(|argument| self.classify_expression(&argument.expr));
        self.records.resolutions.push(ResolutionRecord {
            constructor_call: executor.constructor_call,
            kind,
            call: handle,
            argument,
            loc,
        });

        if kind == ResolutionKind::Reject {
            let error_class = call.args.first().and_then(|argument| {
                self.reject_error_class(&argument.expr, fx)
            });
            self.records.throws.push(ThrowRecord {
                function: executor.owner.or(fx.function),
                kind: RejectionKind::ExecutorReject,
                error_class,
                variable: None,
                trace_path: Vec::new(),
                loc,
            });
        }
    }

    fn record_promise_reject(
        &mut self,
        call: &'a CallExpr,
        fx: &mut FnCtx<'a>,
        loc: crate::analysis::SourceLoc,
    ) {
        let error_class =
            call.args.first().and_then(|argument| self.reject_error_class(&argument.expr, fx));
        self.records.throws.push(ThrowRecord {
            function: fx.function,
            kind: RejectionKind::PromiseReject,
            error_class,
            variable: None,
            trace_path: Vec::new(),
            loc,
        });
    }

    /// Resolves the error class of a rejection argument: a direct `new C()`
    /// or an identifier micro-traced through the enclosing function.
    fn reject_error_class(&mut self, argument: &Expr, fx: &FnCtx<'a>) -> Option<String> {
        match argument {
            Expr::New(new_expr) => ident_name(&new_expr.callee),
            Expr::Ident(ident) => fx
                .body
                .and_then(|body| trace_error_class(body, ident.sym.as_ref()).class_name),
            _ => None,
        }
    }

    fn record_call_arguments(&mut self, call: &'a CallExpr, handle: RecordHandle, call_id: &str) {
        for (position, argument) in call.args.iter().enumerate() {
            let value = match &*argument.expr {
                Expr::Ident(ident) => ArgValue::Variable { name: ident.sym.to_string() },
                Expr::Lit(lit) => {
                    let (value, literal_type) = literal_parts(lit);
                    ArgValue::Literal { value, literal_type }
                }
                Expr::Fn(fn_expr) => {
                    let callback = self.process_function(
                        Callable::Func {
                            ident: fn_expr.ident.as_ref(),
                            function: &fn_expr.function,
                        },
                        FunctionOrigin { is_callback: true, ..Default::default() },
                    );
                    let loc = self.records.functions[callback.index].loc;
                    ArgValue::Function {
                        name: fn_expr.ident.as_ref().map(|ident| ident.sym.to_string()),
                        line: loc.line,
                        column: loc.column,
                    }
                }
                Expr::Arrow(arrow) => {
                    let callback = self.process_function(
                        Callable::Arrow(arrow),
                        FunctionOrigin { is_callback: true, ..Default::default() },
                    );
                    let loc = self.records.functions[callback.index].loc;
                    ArgValue::Function { name: None, line: loc.line, column: loc.column }
                }
                Expr::Call(nested) => {
                    let loc = self.loc(nested.span);
                    ArgValue::Call {
                        name: crate::analysis::destructure::callee_name(nested),
                        line: loc.line,
                        column: loc.column,
                    }
                }
                Expr::New(nested) => {
                    let loc = self.loc(nested.span);
                    ArgValue::Call {
                        name: ident_name(&nested.callee).unwrap_or_else(|| COMPLEX.to_string()),
                        line: loc.line,
                        column: loc.column,
                    }
                }
                Expr::Member(member) => {
                    let (object, property, _computed, _key) = self.member_parts(member);
                    let class_name =
                        if object == "this" { self.enclosing_class_name() } else { None };
                    ArgValue::Member { object, property, class_name }
                }
                other => ArgValue::Expression { repr: self.snippet(other.span()) },
            };
            self.records.call_arguments.push(CallArgumentRecord {
                call: handle,
                call_id: call_id.to_string(),
                index: position,
                value,
                spread: argument.spread.is_some(),
            });
        }
    }

    /* 4.4.9 new expressions */

    pub(super) fn handle_new(
        &mut self,
        new_expr: &'a NewExpr,
        fx: &mut FnCtx<'a>,
        awaited: bool,
    ) -> Option<RecordHandle> {
        let range = self.parsed.byte_range(new_expr.span);
        if !self.processed_calls.insert(range) {
            return None;
        }

        let class_name = ident_name(&new_expr.callee).unwrap_or_else(|| COMPLEX.to_string());
        let loc = self.loc(new_expr.span);
        let scope_path = self.scopes.scope_path();
        let ctor_id = self.ids.constructor_call(&class_name, loc.line, loc.column);
        let ctor_index = self.records.constructor_calls.len();
        self.records.constructor_calls.push(ConstructorCallRecord {
            id: ctor_id.clone(),
            class_name: class_name.clone(),
            is_awaited: awaited,
            parent_scope_id: self.current_scope_id().to_string(),
            loc,
        });
        let ctor_handle = RecordHandle { buffer: BufferKind::ConstructorCall, index: ctor_index };
        self.ids.register(&ctor_id, ctor_handle, &scope_path);

        // A CALL twin so the normal callgraph machinery sees constructor
        // invocations too.
        let call_id = self.ids.semantic(NodeKind::Call, &class_name, &scope_path);
        let call_index = self.records.calls.len();
        self.records.calls.push(CallRecord {
            id: call_id.clone(),
            name: class_name.clone(),
            object: None,
            method: None,
            computed: false,
            is_new: true,
            is_awaited: awaited,
            is_inside_try: fx.cf.try_block_depth > 0,
            is_inside_loop: awaited && fx.cf.loop_depth > 0,
            is_method_call: false,
            parent_scope_id: self.current_scope_id().to_string(),
            enclosing_function: fx.function,
            loc,
        });
        let call_handle = RecordHandle { buffer: BufferKind::Call, index: call_index };
        self.ids.register(&call_id, call_handle, &scope_path);
        let final_call_id = self.records.id_of(call_handle).to_string();

        // Promise executor registration, keyed by the executor's byte range.
        if class_name == "Promise" {
            if let Some(args) = &new_expr.args {
                if let Some(executor) = args.first() {
                    if let Some((params, executor_span)) = executor_params(&executor.expr) {
                        self.executor_contexts.insert(
                            self.parsed.byte_range(executor_span),
                            ExecutorContext {
                                resolve: params.first().cloned(),
                                reject: params.get(1).cloned(),
                                constructor_call: ctor_handle,
                                owner: fx.function,
                            },
                        );
                    }
                }
            }
        }

        if let Some(args) = &new_expr.args {
            for (position, argument) in args.iter().enumerate() {
                let value = match &*argument.expr {
                    Expr::Ident(ident) => ArgValue::Variable { name: ident.sym.to_string() },
                    Expr::Lit(lit) => {
                        let (value, literal_type) = literal_parts(lit);
                        ArgValue::Literal { value, literal_type }
                    }
                    Expr::Fn(fn_expr) => {
                        let callback = self.process_function(
                            Callable::Func {
                                ident: fn_expr.ident.as_ref(),
                                function: &fn_expr.function,
                            },
                            FunctionOrigin { is_callback: true, ..Default::default() },
                        );
                        let cb_loc = self.records.functions[callback.index].loc;
                        ArgValue::Function {
                            name: fn_expr.ident.as_ref().map(|ident| ident.sym.to_string()),
                            line: cb_loc.line,
                            column: cb_loc.column,
                        }
                    }
                    Expr::Arrow(arrow) => {
                        let callback = self.process_function(
                            Callable::Arrow(arrow),
                            FunctionOrigin { is_callback: true, ..Default::default() },
                        );
                        let cb_loc = self.records.functions[callback.index].loc;
                        ArgValue::Function { name: None, line: cb_loc.line, column: cb_loc.column }
                    }
                    other => ArgValue::Expression { repr: self.snippet(other.span()) },
                };
                self.records.call_arguments.push(CallArgumentRecord {
                    call: call_handle,
                    call_id: final_call_id.clone(),
                    index: position,
                    value,
                    spread: argument.spread.is_some(),
                });
                self.walk_expr(&argument.expr, fx);
            }
        }

        Some(ctor_handle)
    }

    /* 4.4.10 property accesses */

    fn handle_property_access(
        &mut self,
        span: Span,
        object: &Expr,
        prop: &MemberProp,
        optional: bool,
    ) {
        let range = self.parsed.byte_range(span);
        if !self.processed_members.insert(range) {
            return;
        }
        let object_name = render_receiver(object);
        let (property, computed) = match prop {
            MemberProp::Ident(ident) => (ident.sym.to_string(), false),
            MemberProp::PrivateName(name) => (format!("#{}", name.id.sym), false),
            MemberProp::Computed(computed) => match &*computed.expr {
                Expr::Lit(Lit::Str(key)) => (key.value.to_string(), true),
                _ => (COMPUTED.to_string(), true),
            },
        };
        let loc = self.loc(span);
        let scope_path = self.scopes.scope_path();
        let id = self.ids.coordinate(NodeKind::PropertyAccess, loc.line, loc.column);
        let index = self.records.property_accesses.len();
        self.records.property_accesses.push(PropertyAccessRecord {
            id: id.clone(),
            object: object_name,
            property,
            computed,
            optional,
            is_new_target: false,
            parent_scope_id: self.current_scope_id().to_string(),
            loc,
        });
        self.ids.register(
            &id,
            RecordHandle { buffer: BufferKind::PropertyAccess, index },
            &scope_path,
        );
    }

    fn record_new_target(&mut self, span: Span) {
        let range = self.parsed.byte_range(span);
        if !self.processed_members.insert(range) {
            return;
        }
        let loc = self.loc(span);
        let scope_path = self.scopes.scope_path();
        let id = self.ids.coordinate(NodeKind::PropertyAccess, loc.line, loc.column);
        let index = self.records.property_accesses.len();
        self.records.property_accesses.push(PropertyAccessRecord {
            id: id.clone(),
            object: "new".to_string(),
            property: "target".to_string(),
            computed: false,
            optional: false,
            is_new_target: true,
            parent_scope_id: self.current_scope_id().to_string(),
            loc,
        });
        self.ids.register(
            &id,
            RecordHandle { buffer: BufferKind::PropertyAccess, index },
            &scope_path,
        );
    }

    /* assignment expressions */

    pub(super) fn handle_assign(&mut self, assign: &'a swc_ecma_ast::AssignExpr, fx: &mut FnCtx<'a>) {
        // Function bound through assignment keeps the target's name.
        if let Some(callable) = as_callable(&assign.right) {
            if let Some(target_name) = assignment_target_name(assign) {
                self.process_function(
                    callable,
                    FunctionOrigin {
                        name_hint: Some(target_name),
                        is_assignment: true,
                        ..Default::default()
                    },
                );
            }
        }

        self.detect_member_write(assign);

        // Plain reassignment of a known binding.
        if let PatOrExpr::Pat(pat) = &assign.left {
            if let Pat::Ident(binding) = &**pat {
                let name = binding.id.sym.to_string();
                if let Some(variable) = self.find_binding(&name) {
                    let source = self.classify_expression(&assign.right);
                    let loc = self.loc(assign.span);
                    self.records.assignments.push(AssignmentRecord { variable, source, loc });
                }
            }
        } else if let PatOrExpr::Expr(target) = &assign.left {
            if let Expr::Ident(ident) = &**target {
                let name = ident.sym.to_string();
                if let Some(variable) = self.find_binding(&name) {
                    let source = self.classify_expression(&assign.right);
                    let loc = self.loc(assign.span);
                    self.records.assignments.push(AssignmentRecord { variable, source, loc });
                }
            }
        }

        self.walk_expr(&assign.right, fx);
    }

    /// Innermost binding of `name` visible from the current scope.
    pub(super) fn find_binding(&self, name: &str) -> Option<RecordHandle> {
        let current = self.scopes.scope_path();
        self.records
            .variables
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, variable)| {
                variable.name == name
                    && (current == variable.scope_path
                        || current.starts_with(&format!("{}->", variable.scope_path)))
            })
            .max_by_key(|(_, variable)| variable.scope_path.len())
            .map(|(index, _)| RecordHandle { buffer: BufferKind::Variable, index })
    }

    /* 4.4.4 nested functions */

    /// Emits the FUNCTION (or METHOD) node and body scope for a callable and
    /// recurses into its body with a fresh context. Idempotent per AST node.
    pub(super) fn process_function(
        &mut self,
        callable: Callable<'a>,
        origin: FunctionOrigin,
    ) -> RecordHandle {
        let range = self.parsed.byte_range(callable.span());
        if let Some(&existing) = self.processed_functions.get(&range) {
            return existing;
        }

        let parent_scope_id = self.current_scope_id().to_string();
        let parent_path = self.scopes.scope_path();

        let (is_async, is_generator, is_arrow, ast_name) = match &callable {
            Callable::Func { ident, function } => (
                function.is_async,
                function.is_generator,
                false,
                ident.map(|ident| ident.sym.to_string()),
            ),
            Callable::Arrow(arrow) => (arrow.is_async, arrow.is_generator, true, None),
        };

        let scope_kind = if origin.is_callback {
            ScopeKind::CallbackBody
        } else if is_arrow {
            ScopeKind::ArrowBody
        } else if origin.is_method || matches!(&callable, Callable::Func { ident: Some(_), .. }) {
            ScopeKind::FunctionBody
        } else {
            ScopeKind::Closure
        };

        let name = match origin.name_hint.clone().or(ast_name) {
            Some(name) => {
                self.scopes.enter_scope(&name, scope_kind);
                name
            }
            None => {
                self.scopes.enter_counted_scope(scope_kind);
                self.scopes.current_name().to_string()
            }
        };

        let node_kind = if origin.is_method { NodeKind::Method } else { NodeKind::Function };
        let function_id = self.ids.semantic(node_kind, &name, &parent_path);
        let loc = self.loc(callable.span());
        let function_index = self.records.functions.len();
        self.records.functions.push(FunctionRecord {
            id: function_id.clone(),
            name: name.clone(),
            loc,
            is_async,
            is_generator,
            is_arrow,
            is_method: origin.is_method,
            is_assignment: origin.is_assignment,
            is_callback: origin.is_callback,
            class_name: origin.class_name.clone(),
            parent_scope_id,
            control_flow: ControlFlowSummary::default(),
            invoked_param_indexes: Vec::new(),
        });
        let function_handle = RecordHandle { buffer: BufferKind::Function, index: function_index };
        self.ids.register(&function_id, function_handle, &parent_path);
        self.processed_functions.insert(range, function_handle);

        // Body scope, parented to the function and capturing from the scope
        // the function was declared in.
        let scope_id = self.ids.semantic(NodeKind::Scope, &name, &parent_path);
        let captures_from = matches!(
            scope_kind,
            ScopeKind::Closure | ScopeKind::ArrowBody | ScopeKind::CallbackBody
        )
        .then(|| self.records.functions[function_index].parent_scope_id.clone());
        let function_node_id = self.records.id_of(function_handle).to_string();
        let scope_index = self.records.scopes.len();
        self.records.scopes.push(crate::analysis::ScopeRecord {
            id: scope_id.clone(),
            scope_type: scope_kind,
            name: name.clone(),
            conditional: false,
            condition: None,
            parent_scope_id: function_node_id.clone(),
            parent_function_id: Some(function_node_id),
            captures_from,
            loc,
        });
        let scope_handle = RecordHandle { buffer: BufferKind::Scope, index: scope_index };
        self.ids.register(&scope_id, scope_handle, &parent_path);
        self.scope_id_stack.push(self.records.id_of(scope_handle).to_string());
        self.function_stack.push(self.records.id_of(function_handle).to_string());

        // Fresh per-function context.
        let mut fx = FnCtx {
            function: Some(function_handle),
            is_async,
            is_generator,
            params: HashMap::new(),
            invoked: BTreeSet::new(),
            cf: ControlFlowState::default(),
            conditional_depth: 0,
            body: None,
            executor: self.executor_contexts.get(&range).cloned(),
        };
        match &callable {
            Callable::Func { function, .. } => {
                for (position, param) in function.params.iter().enumerate() {
                    for bound in extract_bound_names(&param.pat) {
                        fx.params.insert(bound.name, position);
                    }
                }
            }
            Callable::Arrow(arrow) => {
                for (position, param) in arrow.params.iter().enumerate() {
                    for bound in extract_bound_names(param) {
                        fx.params.insert(bound.name, position);
                    }
                }
            }
        }

        match &callable {
            Callable::Func { function, .. } => {
                if let Some(body) = &function.body {
                    fx.body = Some(body);
                    self.analyze_block(body, &mut fx);
                }
            }
            Callable::Arrow(arrow) => match &*arrow.body {
                BlockStmtOrExpr::BlockStmt(body) => {
                    fx.body = Some(body);
                    self.analyze_block(body, &mut fx);
                }
                BlockStmtOrExpr::Expr(body) => {
                    // Expression-bodied arrows return implicitly.
                    let value = self.classify_expression(body);
                    let body_loc = self.loc(body.span());
                    self.records.returns.push(ReturnRecord {
                        function: function_handle,
                        kind: ReturnKind::ImplicitReturn,
                        delegate: false,
                        value: Some(value),
                        is_early: false,
                        loc: body_loc,
                    });
                    self.walk_expr(body, &mut fx);
                }
            },
        }

        debug_assert_eq!(fx.cf.try_block_depth, 0, "try depth must return to zero");
        debug_assert_eq!(fx.cf.loop_depth, 0, "loop depth must return to zero");

        self.records.functions[function_index].control_flow = fx.cf.summary();
        self.records.functions[function_index].invoked_param_indexes =
            fx.invoked.iter().copied().collect();

        self.function_stack.pop();
        self.scope_id_stack.pop();
        self.scopes.exit_scope();

        function_handle
    }

    /// Records a class, its heritage, decorators, and methods. Shared by the
    /// module-level class pass and nested class declarations.
    pub(super) fn handle_class(&mut self, name: &str, class: &'a swc_ecma_ast::Class) {
        let name = name.to_string();
        let range = self.parsed.byte_range(class.span);
        if !self.processed_classes.insert(range) {
            return;
        }

        let scope_path = self.scopes.scope_path();
        let id = self.ids.semantic(NodeKind::Class, &name, &scope_path);
        let loc = self.loc(class.span);
        let super_class = class.super_class.as_deref().and_then(ident_name);
        let implements = class
            .implements
            .iter()
            .filter_map(|implemented| ident_name(&implemented.expr))
            .collect();
        let decorators: Vec<String> = class
            .decorators
            .iter()
            .filter_map(|decorator| decorator_name(&decorator.expr))
            .collect();
        let index = self.records.classes.len();
        self.records.classes.push(crate::analysis::ClassRecord {
            id: id.clone(),
            name: name.clone(),
            loc,
            super_class,
            implements,
            decorators: decorators.clone(),
            parent_scope_id: self.current_scope_id().to_string(),
        });
        let class_handle = RecordHandle { buffer: BufferKind::Class, index };
        self.ids.register(&id, class_handle, &scope_path);
        let class_id = self.records.id_of(class_handle).to_string();

        for decorator in decorators {
            let decorator_id = self.ids.semantic(NodeKind::Decorator, &decorator, &scope_path);
            let ts_index = self.records.ts_constructs.len();
            self.records.ts_constructs.push(crate::analysis::TsConstructRecord {
                id: decorator_id.clone(),
                kind: NodeKind::Decorator,
                name: decorator,
                loc,
                extends: Vec::new(),
                target_id: Some(class_id.clone()),
            });
            self.ids.register(
                &decorator_id,
                RecordHandle { buffer: BufferKind::TsConstruct, index: ts_index },
                &scope_path,
            );
        }

        self.scopes.enter_scope(&name, ScopeKind::Class);
        self.scope_id_stack.push(class_id);
        for member in &class.body {
            match member {
                ClassMember::Method(method) => {
                    let (method_name, _computed) =
                        crate::analysis::classify::prop_key(&method.key);
                    self.process_function(
                        Callable::Func { ident: None, function: &method.function },
                        FunctionOrigin {
                            name_hint: Some(method_name),
                            is_method: true,
                            class_name: Some(name.clone()),
                            ..Default::default()
                        },
                    );
                }
                ClassMember::Constructor(constructor) => {
                    if let Some(body) = &constructor.body {
                        // Constructors have no Function node in the AST;
                        // analyze the body under a method-like context.
                        self.process_constructor(&name, body, constructor.span);
                    }
                }
                ClassMember::PrivateMethod(method) => {
                    let method_name = format!("#{}", method.key.id.sym);
                    self.process_function(
                        Callable::Func { ident: None, function: &method.function },
                        FunctionOrigin {
                            name_hint: Some(method_name),
                            is_method: true,
                            class_name: Some(name.clone()),
                            ..Default::default()
                        },
                    );
                }
                ClassMember::ClassProp(prop) => {
                    if let Some(value) = prop.value.as_deref() {
                        if let Some(callable) = as_callable(value) {
                            let (prop_name, _computed) =
                                crate::analysis::classify::prop_key(&prop.key);
                            self.process_function(
                                callable,
                                FunctionOrigin {
                                    name_hint: Some(prop_name),
                                    is_method: true,
                                    class_name: Some(name.clone()),
                                    ..Default::default()
                                },
                            );
                        }
                    }
                }
                _ => {}
            }
        }
        self.scope_id_stack.pop();
        self.scopes.exit_scope();
    }

    fn process_constructor(&mut self, class_name: &str, body: &'a BlockStmt, span: Span) {
        let parent_path = self.scopes.scope_path();
        let parent_scope_id = self.current_scope_id().to_string();
        self.scopes.enter_scope("constructor", ScopeKind::FunctionBody);

        let id = self.ids.semantic(NodeKind::Method, "constructor", &parent_path);
        let loc = self.loc(span);
        let index = self.records.functions.len();
        self.records.functions.push(FunctionRecord {
            id: id.clone(),
            name: "constructor".to_string(),
            loc,
            is_async: false,
            is_generator: false,
            is_arrow: false,
            is_method: true,
            is_assignment: false,
            is_callback: false,
            class_name: Some(class_name.to_string()),
            parent_scope_id,
            control_flow: ControlFlowSummary::default(),
            invoked_param_indexes: Vec::new(),
        });
        let function_handle = RecordHandle { buffer: BufferKind::Function, index };
        self.ids.register(&id, function_handle, &parent_path);

        let scope_id = self.ids.semantic(NodeKind::Scope, "constructor", &parent_path);
        let function_node_id = self.records.id_of(function_handle).to_string();
        let scope_index = self.records.scopes.len();
        self.records.scopes.push(crate::analysis::ScopeRecord {
            id: scope_id.clone(),
            scope_type: ScopeKind::FunctionBody,
            name: "constructor".to_string(),
            conditional: false,
            condition: None,
            parent_scope_id: function_node_id.clone(),
            parent_function_id: Some(function_node_id),
            captures_from: None,
            loc,
        });
        let scope_handle = RecordHandle { buffer: BufferKind::Scope, index: scope_index };
        self.ids.register(&scope_id, scope_handle, &parent_path);
        self.scope_id_stack.push(self.records.id_of(scope_handle).to_string());
        self.function_stack.push(self.records.id_of(function_handle).to_string());

        let mut fx = FnCtx {
            function: Some(function_handle),
            body: Some(body),
            ..FnCtx::default()
        };
        self.analyze_block(body, &mut fx);

        self.records.functions[index].control_flow = fx.cf.summary();
        self.function_stack.pop();
        self.scope_id_stack.pop();
        self.scopes.exit_scope();
    }
}

/// CONSTANT iff declared immutable AND the initializer is a literal or a new
/// expression. Loop bindings are handled at their declaration sites.
fn is_constant_initializer(init: Option<&Expr>) -> bool {
    match init {
        Some(Expr::Lit(_)) | Some(Expr::New(_)) => true,
        Some(Expr::Paren(inner)) => is_constant_initializer(Some(&inner.expr)),
        _ => false,
    }
}

fn as_callable(expr: &Expr) -> Option<Callable<'_>> {
    match expr {
        Expr::Fn(fn_expr) => {
            Some(Callable::Func { ident: fn_expr.ident.as_ref(), function: &fn_expr.function })
        }
        Expr::Arrow(arrow) => Some(Callable::Arrow(arrow)),
        Expr::Paren(inner) => as_callable(&inner.expr),
        _ => None,
    }
}

fn assignment_target_name(assign: &swc_ecma_ast::AssignExpr) -> Option<String> {
    match &assign.left {
        PatOrExpr::Pat(pat) => match &**pat {
            Pat::Ident(binding) => Some(binding.id.sym.to_string()),
            Pat::Expr(target) => assignment_expr_name(target),
            _ => None,
        },
        PatOrExpr::Expr(target) => assignment_expr_name(target),
    }
}

fn assignment_expr_name(target: &Expr) -> Option<String> {
    match target {
        Expr::Ident(ident) => Some(ident.sym.to_string()),
        Expr::Member(member) => {
            let base = render_receiver(&member.obj);
            match &member.prop {
                MemberProp::Ident(prop) => Some(format!("{base}.{}", prop.sym)),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Parameter names and span of a promise executor callback.
fn executor_params(expr: &Expr) -> Option<(Vec<String>, Span)> {
    match expr {
        Expr::Arrow(arrow) => {
            let params = arrow
                .params
                .iter()
                .filter_map(|param| match param {
                    Pat::Ident(binding) => Some(binding.id.sym.to_string()),
                    _ => None,
                })
                .collect();
            Some((params, arrow.span))
        }
        Expr::Fn(fn_expr) => {
            let params = fn_expr
                .function
                .params
                .iter()
                .filter_map(|param| match &param.pat {
                    Pat::Ident(binding) => Some(binding.id.sym.to_string()),
                    _ => None,
                })
                .collect();
            Some((params, fn_expr.function.span))
        }
        Expr::Paren(inner) => executor_params(&inner.expr),
        _ => None,
    }
}

fn decorator_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Ident(ident) => Some(ident.sym.to_string()),
        Expr::Call(call) => match &call.callee {
            Callee::Expr(callee) => match &**callee {
                Expr::Ident(ident) => Some(ident.sym.to_string()),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    }
}

/// Counts `&&` / `||` operators in a condition expression.
fn count_logical_ops(expr: &Expr) -> u32 {
    use swc_ecma_ast::BinaryOp;
    match expr {
        Expr::Bin(binary) => {
            let own = matches!(binary.op, BinaryOp::LogicalAnd | BinaryOp::LogicalOr) as u32;
            own + count_logical_ops(&binary.left) + count_logical_ops(&binary.right)
        }
        Expr::Paren(inner) => count_logical_ops(&inner.expr),
        Expr::Unary(unary) => count_logical_ops(&unary.arg),
        _ => 0,
    }
}

/// True when a statement list cannot fall through: its last statement
/// terminates, transitively through trivial blocks and exhaustive if/else.
fn stmts_terminate(stmts: &[Stmt]) -> bool {
    stmts.last().is_some_and(stmt_terminates)
}

fn stmt_terminates(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Break(_) | Stmt::Continue(_) | Stmt::Return(_) | Stmt::Throw(_) => true,
        Stmt::Block(block) => stmts_terminate(&block.stmts),
        Stmt::If(if_stmt) => {
            if_stmt.alt.as_deref().is_some_and(stmt_terminates) && stmt_terminates(&if_stmt.cons)
        }
        _ => false,
    }
}
