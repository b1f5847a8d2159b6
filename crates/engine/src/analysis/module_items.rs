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

//! Module-level passes.
//!
//! Each pass is one walk over the top-level items, in the order fixed by the
//! analyzer. Exported declarations are unwrapped so the variable, function,
//! class, and TypeScript passes see them like plain declarations. The
//! byte-range dedup sets shared with the body walker keep later passes from
//! re-recording nodes an earlier pass already reached.

use swc_ecma_ast::{
    AwaitExpr, Decl, DefaultDecl, Expr, ForOfStmt, Function as SwcFunction, ImportSpecifier,
    Module, ModuleDecl, ModuleExportName, ModuleItem, Stmt,
};
use swc_ecma_visit::{Visit, VisitWith};

use crate::analysis::{
    body::{Callable, FnCtx, FunctionOrigin},
    BufferKind, ExportKind, ExportRecord, ExternalModuleRecord, ImportRecord, ImportSpecKind,
    ImportSpecRecord, ModuleAnalyzer, RecordHandle, TsConstructRecord,
};
use cpg_common::NodeKind;

/* Module-level passes */
impl<'a> ModuleAnalyzer<'a> {
    /// Pass 1: imports and exports.
    pub(super) fn pass_imports_exports(&mut self, module: &'a Module) {
        for item in &module.body {
            let ModuleItem::ModuleDecl(decl) = item else { continue };
            match decl {
                ModuleDecl::Import(import) => {
                    let source = import.src.value.to_string();
                    let loc = self.loc(import.span);
                    let scope_path = self.scopes.scope_path();
                    let id = self.ids.semantic(NodeKind::Import, &source, &scope_path);
                    let specifiers = import
                        .specifiers
                        .iter()
                        .map(|specifier| match specifier {
                            ImportSpecifier::Default(default) => ImportSpecRecord {
                                local: default.local.sym.to_string(),
                                imported: None,
                                kind: ImportSpecKind::Default,
                                type_only: import.type_only,
                            },
                            ImportSpecifier::Named(named) => ImportSpecRecord {
                                local: named.local.sym.to_string(),
                                imported: named.imported.as_ref().map(export_name),
                                kind: ImportSpecKind::Named,
                                type_only: import.type_only || named.is_type_only,
                            },
                            ImportSpecifier::Namespace(namespace) => ImportSpecRecord {
                                local: namespace.local.sym.to_string(),
                                imported: None,
                                kind: ImportSpecKind::Namespace,
                                type_only: import.type_only,
                            },
                        })
                        .collect();
                    let is_external = is_bare_specifier(&source);
                    let index = self.records.imports.len();
                    self.records.imports.push(ImportRecord {
                        id: id.clone(),
                        source: source.clone(),
                        is_external,
                        specifiers,
                        loc,
                    });
                    self.ids.register(
                        &id,
                        RecordHandle { buffer: BufferKind::Import, index },
                        &scope_path,
                    );
                    if is_external {
                        self.intern_external_module(&source);
                    }
                }
                ModuleDecl::ExportDecl(export) => {
                    for name in decl_names(&export.decl) {
                        self.record_export(name, ExportKind::Decl, None, export.span);
                    }
                }
                ModuleDecl::ExportNamed(named) => {
                    let source = named.src.as_deref().map(|src| src.value.to_string());
                    for specifier in &named.specifiers {
                        let name = match specifier {
                            swc_ecma_ast::ExportSpecifier::Named(entry) => entry
                                .exported
                                .as_ref()
                                .map(export_name)
                                .unwrap_or_else(|| export_name(&entry.orig)),
                            swc_ecma_ast::ExportSpecifier::Namespace(entry) => {
                                export_name(&entry.name)
                            }
                            swc_ecma_ast::ExportSpecifier::Default(entry) => {
                                entry.exported.sym.to_string()
                            }
                        };
                        self.record_export(name, ExportKind::Named, source.clone(), named.span);
                    }
                    if let Some(source) = source.filter(|source| is_bare_specifier(source)) {
                        self.intern_external_module(&source);
                    }
                }
                ModuleDecl::ExportDefaultDecl(default) => {
                    let name = match &default.decl {
                        DefaultDecl::Fn(fn_expr) => fn_expr
                            .ident
                            .as_ref()
                            .map(|ident| ident.sym.to_string())
                            .unwrap_or_else(|| "default".to_string()),
                        DefaultDecl::Class(class_expr) => class_expr
                            .ident
                            .as_ref()
                            .map(|ident| ident.sym.to_string())
                            .unwrap_or_else(|| "default".to_string()),
                        DefaultDecl::TsInterfaceDecl(interface) => interface.id.sym.to_string(),
                    };
                    self.record_export(name, ExportKind::Default, None, default.span);
                }
                ModuleDecl::ExportDefaultExpr(default) => {
                    self.record_export(
                        "default".to_string(),
                        ExportKind::Default,
                        None,
                        default.span,
                    );
                }
                ModuleDecl::ExportAll(all) => {
                    let source = all.src.value.to_string();
                    self.record_export(
                        "*".to_string(),
                        ExportKind::All,
                        Some(source.clone()),
                        all.span,
                    );
                    if is_bare_specifier(&source) {
                        self.intern_external_module(&source);
                    }
                }
                _ => {}
            }
        }
    }

    fn record_export(
        &mut self,
        name: String,
        kind: ExportKind,
        source: Option<String>,
        span: swc_common::Span,
    ) {
        let loc = self.loc(span);
        let scope_path = self.scopes.scope_path();
        let id = self.ids.semantic(NodeKind::Export, &name, &scope_path);
        let index = self.records.exports.len();
        self.records.exports.push(ExportRecord { id: id.clone(), name, kind, source, loc });
        self.ids.register(&id, RecordHandle { buffer: BufferKind::Export, index }, &scope_path);
    }

    fn intern_external_module(&mut self, name: &str) {
        if self.external_modules_by_name.contains_key(name) {
            return;
        }
        // External module ids are file-independent so backends can merge
        // references from every module.
        let id = format!("{}#{name}", NodeKind::ExternalModule.as_str());
        let index = self.records.external_modules.len();
        self.records.external_modules.push(ExternalModuleRecord {
            id: id.clone(),
            name: name.to_string(),
        });
        let handle = RecordHandle { buffer: BufferKind::ExternalModule, index };
        self.external_modules_by_name.insert(name.to_string(), handle);
    }

    /// Pass 2: top-level variable declarations.
    pub(super) fn pass_module_variables(&mut self, module: &'a Module) {
        let mut fx = FnCtx::module();
        for decl in top_level_decls(module) {
            if let Decl::Var(var) = decl {
                self.handle_var_decl(var, &mut fx);
            }
        }
    }

    /// Pass 3: function declarations, expressions, and arrows.
    pub(super) fn pass_module_functions(&mut self, module: &'a Module) {
        for decl in top_level_decls(module) {
            if let Decl::Fn(fn_decl) = decl {
                self.process_function(
                    Callable::Func { ident: Some(&fn_decl.ident), function: &fn_decl.function },
                    FunctionOrigin::default(),
                );
            }
        }
        for item in &module.body {
            if let ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(default)) = item {
                if let DefaultDecl::Fn(fn_expr) = &default.decl {
                    let hint = fn_expr.ident.is_none().then(|| "default".to_string());
                    self.process_function(
                        Callable::Func { ident: fn_expr.ident.as_ref(), function: &fn_expr.function },
                        FunctionOrigin { name_hint: hint, ..Default::default() },
                    );
                }
            }
        }
    }

    /// Pass 4: assignment expressions that bind functions or write members.
    pub(super) fn pass_module_assignments(&mut self, module: &'a Module) {
        let mut fx = FnCtx::module();
        for stmt in top_level_stmts(module) {
            if let Stmt::Expr(expr_stmt) = stmt {
                if let Expr::Assign(assign) = &*expr_stmt.expr {
                    self.handle_assign(assign, &mut fx);
                }
            }
        }
    }

    /// Pass 5: top-level update expressions.
    pub(super) fn pass_module_updates(&mut self, module: &'a Module) {
        for stmt in top_level_stmts(module) {
            if let Stmt::Expr(expr_stmt) = stmt {
                if let Expr::Update(update) = &*expr_stmt.expr {
                    self.record_update_expression(update);
                }
            }
        }
    }

    /// Pass 6: classes and their methods.
    pub(super) fn pass_classes(&mut self, module: &'a Module) {
        for decl in top_level_decls(module) {
            if let Decl::Class(class_decl) = decl {
                let name = class_decl.ident.sym.to_string();
                self.handle_class(&name, &class_decl.class);
            }
        }
        for item in &module.body {
            if let ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(default)) = item {
                if let DefaultDecl::Class(class_expr) = &default.decl {
                    let name = class_expr
                        .ident
                        .as_ref()
                        .map(|ident| ident.sym.to_string())
                        .unwrap_or_else(|| "default".to_string());
                    self.handle_class(&name, &class_expr.class);
                }
            }
        }
    }

    /// Pass 7: interfaces, type aliases, and enums.
    pub(super) fn pass_ts_constructs(&mut self, module: &'a Module) {
        for decl in top_level_decls(module) {
            let (kind, name, extends, span) = match decl {
                Decl::TsInterface(interface) => {
                    let extends = interface
                        .extends
                        .iter()
                        .filter_map(|extended| {
                            crate::analysis::classify::ident_name(&extended.expr)
                        })
                        .collect();
                    (
                        NodeKind::Interface,
                        interface.id.sym.to_string(),
                        extends,
                        interface.span,
                    )
                }
                Decl::TsTypeAlias(alias) => {
                    (NodeKind::TypeAlias, alias.id.sym.to_string(), Vec::new(), alias.span)
                }
                Decl::TsEnum(ts_enum) => {
                    (NodeKind::Enum, ts_enum.id.sym.to_string(), Vec::new(), ts_enum.span)
                }
                _ => continue,
            };
            let loc = self.loc(span);
            let scope_path = self.scopes.scope_path();
            let id = self.ids.semantic(kind, &name, &scope_path);
            let index = self.records.ts_constructs.len();
            self.records.ts_constructs.push(TsConstructRecord {
                id: id.clone(),
                kind,
                name,
                loc,
                extends,
                target_id: None,
            });
            self.ids.register(
                &id,
                RecordHandle { buffer: BufferKind::TsConstruct, index },
                &scope_path,
            );
        }
    }

    /// Pass 8: function expressions passed directly to top-level calls.
    pub(super) fn pass_inline_callbacks(&mut self, module: &'a Module) {
        for stmt in top_level_stmts(module) {
            let Stmt::Expr(expr_stmt) = stmt else { continue };
            let Expr::Call(call) = &*expr_stmt.expr else { continue };
            for argument in &call.args {
                if let Some(callable) = callable_arg(&argument.expr) {
                    self.process_function(
                        callable,
                        FunctionOrigin { is_callback: true, ..Default::default() },
                    );
                }
            }
        }
    }

    /// Pass 9: top-level call expressions.
    pub(super) fn pass_call_expressions(&mut self, module: &'a Module) {
        let mut fx = FnCtx::module();
        for stmt in top_level_stmts(module) {
            let Stmt::Expr(expr_stmt) = stmt else { continue };
            if matches!(
                &*expr_stmt.expr,
                Expr::Call(_) | Expr::Await(_) | Expr::Seq(_) | Expr::Paren(_) | Expr::OptChain(_)
            ) {
                self.walk_expr(&expr_stmt.expr, &mut fx);
            }
        }
    }

    /// Pass 10: top-level `await` detection.
    pub(super) fn pass_top_level_await(&mut self, module: &'a Module) {
        let mut finder = TopLevelAwaitFinder::default();
        module.visit_with(&mut finder);
        self.records.has_top_level_await = finder.found;
        self.records.for_await_count = finder.for_await;
    }

    /// Pass 11: top-level property accesses.
    pub(super) fn pass_property_accesses(&mut self, module: &'a Module) {
        let mut fx = FnCtx::module();
        for stmt in top_level_stmts(module) {
            let Stmt::Expr(expr_stmt) = stmt else { continue };
            if matches!(&*expr_stmt.expr, Expr::Member(_) | Expr::MetaProp(_)) {
                self.walk_expr(&expr_stmt.expr, &mut fx);
            }
        }
    }

    /// Pass 12: top-level `new` expressions, with promise-executor
    /// registration.
    pub(super) fn pass_new_expressions(&mut self, module: &'a Module) {
        let mut fx = FnCtx::module();
        for stmt in top_level_stmts(module) {
            let Stmt::Expr(expr_stmt) = stmt else { continue };
            match &*expr_stmt.expr {
                Expr::New(new_expr) => {
                    self.handle_new(new_expr, &mut fx, false);
                }
                Expr::Await(await_expr) => {
                    if let Expr::New(new_expr) = &*await_expr.arg {
                        self.handle_new(new_expr, &mut fx, true);
                    }
                }
                _ => {}
            }
        }
    }

    /// Pass 13: module-level if statements (scope creation).
    pub(super) fn pass_module_ifs(&mut self, module: &'a Module) {
        let mut fx = FnCtx::module();
        for stmt in top_level_stmts(module) {
            if let Stmt::If(if_stmt) = stmt {
                self.handle_if(if_stmt, &mut fx, None);
            }
        }
    }
}

/// Yields top-level statements, including none from module declarations.
fn top_level_stmts<'m>(module: &'m Module) -> impl Iterator<Item = &'m Stmt> {
    module.body.iter().filter_map(|item| match item {
        ModuleItem::Stmt(stmt) => Some(stmt),
        ModuleItem::ModuleDecl(_) => None,
    })
}

/// Yields top-level declarations, unwrapping `export` declarations.
fn top_level_decls<'m>(module: &'m Module) -> impl Iterator<Item = &'m Decl> {
    module.body.iter().filter_map(|item| match item {
        ModuleItem::Stmt(Stmt::Decl(decl)) => Some(decl),
        ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => Some(&export.decl),
        _ => None,
    })
}

fn callable_arg(expr: &Expr) -> Option<Callable<'_>> {
    match expr {
        Expr::Fn(fn_expr) => {
            Some(Callable::Func { ident: fn_expr.ident.as_ref(), function: &fn_expr.function })
        }
        Expr::Arrow(arrow) => Some(Callable::Arrow(arrow)),
        _ => None,
    }
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::Ident(ident) => ident.sym.to_string(),
        ModuleExportName::Str(value) => value.value.to_string(),
    }
}

fn decl_names(decl: &Decl) -> Vec<String> {
    match decl {
        Decl::Fn(fn_decl) => vec![fn_decl.ident.sym.to_string()],
        Decl::Class(class_decl) => vec![class_decl.ident.sym.to_string()],
        Decl::Var(var) => var
            .decls
            .iter()
            .flat_map(|declarator| crate::analysis::extract_bound_names(&declarator.name))
            .map(|bound| bound.name)
            .collect(),
        Decl::TsInterface(interface) => vec![interface.id.sym.to_string()],
        Decl::TsTypeAlias(alias) => vec![alias.id.sym.to_string()],
        Decl::TsEnum(ts_enum) => vec![ts_enum.id.sym.to_string()],
        _ => Vec::new(),
    }
}

/// True for package specifiers (`react`, `node:fs`), false for relative and
/// absolute paths.
fn is_bare_specifier(source: &str) -> bool {
    !source.starts_with('.') && !source.starts_with('/')
}

/// Finds `await` at the module top level without descending into functions.
#[derive(Debug, Default)]
struct TopLevelAwaitFinder {
    found: bool,
    for_await: usize,
}

impl Visit for TopLevelAwaitFinder {
    fn visit_function(&mut self, _function: &SwcFunction) {}

    fn visit_arrow_expr(&mut self, _arrow: &swc_ecma_ast::ArrowExpr) {}

    fn visit_await_expr(&mut self, await_expr: &AwaitExpr) {
        self.found = true;
        await_expr.visit_children_with(self);
    }

    fn visit_for_of_stmt(&mut self, for_of: &ForOfStmt) {
        if for_of.is_await {
            self.found = true;
            self.for_await += 1;
        }
        for_of.visit_children_with(self);
    }
}
