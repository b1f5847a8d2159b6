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

//! Per-module analysis orchestration.
//!
//! [`ModuleAnalyzer`] owns everything one module's traversal needs: the scope
//! tracker, the id generator, the record buffers, and the dedup registries.
//! [`JsAstAnalyzer`] is the long-lived front door: it decides whether a
//! module needs re-analysis (hash gate), runs the pass sequence, resolves id
//! collisions, and hands the lowered buffers to the graph store.

use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
};

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use swc_common::Span;
use thiserror::Error;
use tracing::warn;

use crate::{
    analysis::{
        body::ExecutorContext,
        log::{debug, trace, LOG_TARGET},
        BufferKind, CollisionResolver, GraphWriter, IdGenerator, ModuleRecords, RecordHandle,
        ScopeKind, ScopeRecord, ScopeTracker, SourceLoc,
    },
    parser::{ParseError, ParsedModule, SourceParser},
};
use cpg_common::{EdgeRecord, GraphError, GraphStore, NodeFilter, NodeKind, NodeRecord};

/// A module to analyze, as indexed upstream. The MODULE node already exists
/// in the graph when analysis starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// MODULE node id.
    pub id: String,
    /// Project-relative module name (also the `file` anchor of emitted nodes).
    pub name: String,
    /// Absolute path on disk.
    pub file: PathBuf,
}

/// Errors that can occur during module analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The module file could not be read.
    #[error("failed to read module: {0}")]
    Io(#[from] std::io::Error),

    /// The module could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The graph backend rejected or failed the emitted records.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Other analysis-related errors.
    #[error("other error: {0}")]
    Other(#[from] eyre::Report),
}

impl AnalysisError {
    /// True when the error is a data-quality violation that must halt the
    /// whole run rather than skip one module.
    pub fn is_data_quality(&self) -> bool {
        matches!(self, Self::Graph(error) if error.is_data_quality())
    }
}

/// Analyzer state for one module. Nothing here is shared across modules.
pub struct ModuleAnalyzer<'a> {
    pub(super) parsed: &'a ParsedModule,
    pub(super) file: String,
    pub(super) module_id: String,
    pub(super) scopes: ScopeTracker,
    pub(super) ids: IdGenerator,
    pub(super) records: ModuleRecords,
    /// Ids of the enclosing constructs, module id at the bottom.
    pub(super) scope_id_stack: Vec<String>,
    /// Ids of the enclosing functions.
    pub(super) function_stack: Vec<String>,
    /// Promise executor registrations, keyed by executor byte range.
    pub(super) executor_contexts: HashMap<(u32, u32), ExecutorContext>,
    /// Byte ranges of calls and new expressions already recorded.
    pub(super) processed_calls: HashSet<(u32, u32)>,
    /// Byte ranges of update expressions already recorded.
    pub(super) processed_updates: HashSet<(u32, u32)>,
    /// Byte ranges of member expressions already recorded.
    pub(super) processed_members: HashSet<(u32, u32)>,
    /// Byte ranges of classes already recorded.
    pub(super) processed_classes: HashSet<(u32, u32)>,
    /// Byte ranges of callables already recorded, with their handles.
    pub(super) processed_functions: HashMap<(u32, u32), RecordHandle>,
    /// External module records interned by package name.
    pub(super) external_modules_by_name: HashMap<String, RecordHandle>,
}

impl<'a> ModuleAnalyzer<'a> {
    /// Creates the analyzer for one parsed module.
    pub fn new(parsed: &'a ParsedModule, module: &ModuleInfo) -> Self {
        Self {
            parsed,
            file: module.name.clone(),
            module_id: module.id.clone(),
            scopes: ScopeTracker::new(&module.name),
            ids: IdGenerator::new(&module.name),
            records: ModuleRecords::new(&module.id, &module.name),
            scope_id_stack: vec![module.id.clone()],
            function_stack: Vec::new(),
            executor_contexts: HashMap::new(),
            processed_calls: HashSet::new(),
            processed_updates: HashSet::new(),
            processed_members: HashSet::new(),
            processed_classes: HashSet::new(),
            processed_functions: HashMap::new(),
            external_modules_by_name: HashMap::new(),
        }
    }

    /// Runs the module-level passes in order, resolves id collisions, and
    /// yields the record buffers.
    pub fn analyze(mut self) -> eyre::Result<ModuleRecords> {
        let module = &self.parsed.module;
        debug!(file = %self.file, "start module passes");

        self.pass_imports_exports(module);
        self.pass_module_variables(module);
        self.pass_module_functions(module);
        self.pass_module_assignments(module);
        self.pass_module_updates(module);
        self.pass_classes(module);
        self.pass_ts_constructs(module);
        self.pass_inline_callbacks(module);
        self.pass_call_expressions(module);
        self.pass_top_level_await(module);
        self.pass_property_accesses(module);
        self.pass_new_expressions(module);
        self.pass_module_ifs(module);

        assert_eq!(self.scopes.depth(), 0, "scope stack must return to the module root");
        assert_eq!(self.scope_id_stack.len(), 1, "scope id stack must return to the module id");

        let mut records = self.records;
        let registrations = self.ids.into_registrations();
        let remapped = CollisionResolver::resolve(&mut records, &registrations);
        if !remapped.is_empty() {
            trace!(file = %records.file, count = remapped.len(), "resolved id collisions");
        }
        debug!(file = %records.file, nodes = records.node_count(), "module passes finished");
        Ok(records)
    }

    /* shared helpers for the pass and handler files */

    pub(super) fn loc(&self, span: Span) -> SourceLoc {
        self.parsed.loc(span)
    }

    pub(super) fn snippet(&self, span: Span) -> String {
        self.parsed.snippet(span)
    }

    pub(super) fn current_scope_id(&self) -> &str {
        self.scope_id_stack.last().expect("scope id stack always holds the module id")
    }

    /// Emits a SCOPE record for a control-flow body, enters it on both the
    /// tracker and the id stack, and returns its handle. Must be paired with
    /// [`ModuleAnalyzer::end_scope`].
    pub(super) fn begin_scope(
        &mut self,
        kind: ScopeKind,
        name: Option<&str>,
        parent_id: &str,
        condition: Option<String>,
        span: Span,
    ) -> RecordHandle {
        let parent_path = self.scopes.scope_path();
        match name {
            Some(name) => self.scopes.enter_scope(name, kind),
            None => {
                self.scopes.enter_counted_scope(kind);
            }
        }
        let scope_name = self.scopes.current_name().to_string();
        let id = self.ids.semantic(NodeKind::Scope, &scope_name, &parent_path);
        let index = self.records.scopes.len();
        self.records.scopes.push(ScopeRecord {
            id: id.clone(),
            scope_type: kind,
            name: scope_name,
            conditional: kind.is_conditional(),
            condition,
            parent_scope_id: parent_id.to_string(),
            parent_function_id: self.function_stack.last().cloned(),
            captures_from: None,
            loc: self.loc(span),
        });
        let handle = RecordHandle { buffer: BufferKind::Scope, index };
        self.ids.register(&id, handle, &parent_path);
        self.scope_id_stack.push(self.records.id_of(handle).to_string());
        handle
    }

    /// Leaves the scope entered by the matching [`ModuleAnalyzer::begin_scope`].
    pub(super) fn end_scope(&mut self) {
        self.scope_id_stack.pop().expect("unbalanced end_scope");
        self.scopes.exit_scope();
    }
}

/// The per-module AST analyzer plugin.
#[derive(Debug, Default)]
pub struct JsAstAnalyzer {
    parser: SourceParser,
}

impl JsAstAnalyzer {
    /// Plugin name used in batch provenance tags.
    pub const NAME: &'static str = "JSASTAnalyzer";

    /// Creates the analyzer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the module needs (re-)analysis: forced, no stored
    /// content hash, a changed hash, or no FUNCTION nodes for the file.
    /// A changed hash is written back to the MODULE node as a side effect.
    pub async fn should_analyze(
        &self,
        module: &ModuleInfo,
        graph: &dyn GraphStore,
        force: bool,
    ) -> Result<bool, AnalysisError> {
        if force {
            return Ok(true);
        }

        let Some(mut node) = graph.node_by_id(&module.id).await? else {
            // No MODULE node yet; the indexer will create it, analyze anyway.
            return Ok(true);
        };

        let source = tokio::fs::read(&module.file).await?;
        let current_hash = content_hash(&source);
        let stored_hash =
            node.attr("contentHash").and_then(|value| value.as_str()).map(str::to_string);

        match stored_hash.as_deref() {
            None => Ok(true),
            Some(stored) if stored != current_hash => {
                node.attrs.insert("contentHash".to_string(), current_hash.into());
                graph.update_node(node).await?;
                Ok(true)
            }
            Some(_) => {
                let mut functions = graph
                    .query_nodes(NodeFilter::by_kind_in_file(NodeKind::Function, &module.name))
                    .await?;
                Ok(functions.next().await.is_none())
            }
        }
    }

    /// Analyzes one module end-to-end and hands the emitted records to the
    /// graph store. Returns the emitted node and edge counts.
    pub async fn analyze(
        &self,
        module: &ModuleInfo,
        graph: &dyn GraphStore,
    ) -> Result<(usize, usize), AnalysisError> {
        let source = tokio::fs::read_to_string(&module.file).await?;
        let records = self.collect_records(module, &source)?;
        let (nodes, edges) = GraphWriter::build(&records);
        let counts = (nodes.len(), edges.len());
        graph.add_nodes(nodes).await?;
        graph.add_edges(edges).await?;
        self.apply_module_flags(module, &records, graph).await?;
        Ok(counts)
    }

    /// Writes the module-level flags discovered during traversal back onto
    /// the MODULE node.
    pub async fn apply_module_flags(
        &self,
        module: &ModuleInfo,
        records: &ModuleRecords,
        graph: &dyn GraphStore,
    ) -> Result<(), AnalysisError> {
        let Some(mut node) = graph.node_by_id(&module.id).await? else {
            return Ok(());
        };
        node.attrs.insert("hasTopLevelAwait".to_string(), records.has_top_level_await.into());
        node.attrs.insert("forAwaitCount".to_string(), records.for_await_count.into());
        graph.update_node(node).await?;
        Ok(())
    }

    /// Parses and analyzes source text, returning the lowered node and edge
    /// buffers in emission order.
    pub fn analyze_source(
        &self,
        module: &ModuleInfo,
        source: &str,
    ) -> Result<(Vec<NodeRecord>, Vec<EdgeRecord>), AnalysisError> {
        let parsed = self.parser.parse(&module.name, source)?;
        for recovered in &parsed.recovered_errors {
            warn!(target: LOG_TARGET, file = %module.name, error = %recovered, "recovered parse error");
        }
        let records = ModuleAnalyzer::new(&parsed, module).analyze()?;
        Ok(GraphWriter::build(&records))
    }

    /// Parses and analyzes source text, returning the raw record buffers.
    /// Used by the true-parallel worker mode, which lowers on the main
    /// thread.
    pub fn collect_records(
        &self,
        module: &ModuleInfo,
        source: &str,
    ) -> Result<ModuleRecords, AnalysisError> {
        let parsed = self.parser.parse(&module.name, source)?;
        Ok(ModuleAnalyzer::new(&parsed, module).analyze()?)
    }
}

/// Hex sha256 of the raw file bytes.
pub fn content_hash(source: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::{RejectionKind, ResolutionKind};
    use cpg_common::NodeKind;

    pub(crate) fn test_module() -> ModuleInfo {
        ModuleInfo {
            id: "MODULE#test.ts".to_string(),
            name: "test.ts".to_string(),
            file: PathBuf::from("/virtual/test.ts"),
        }
    }

    /// Parses and analyzes a source snippet, returning the raw records.
    pub(crate) fn analyze_snippet(source: &str) -> ModuleRecords {
        let analyzer = JsAstAnalyzer::new();
        analyzer.collect_records(&test_module(), source).expect("analysis should succeed")
    }

    #[test]
    fn test_empty_module_emits_nothing() {
        let records = analyze_snippet("");
        assert_eq!(records.node_count(), 0);
        assert!(!records.has_top_level_await);
    }

    #[test]
    fn test_function_declaration_gets_node_and_scope() {
        let records = analyze_snippet("function greet(name) { return name; }");
        assert_eq!(records.functions.len(), 1);
        let function = &records.functions[0];
        assert_eq!(function.id, "FUNCTION#greet#test.ts");
        assert!(!function.is_async);
        assert_eq!(function.control_flow.cyclomatic_complexity, 1);
        assert_eq!(records.scopes.len(), 1);
        assert_eq!(records.scopes[0].id, "SCOPE#greet#test.ts");
        assert_eq!(records.scopes[0].parent_scope_id, "FUNCTION#greet#test.ts");
        assert_eq!(records.returns.len(), 1);
    }

    #[test]
    fn test_destructuring_over_await() {
        let records =
            analyze_snippet("async function f(req){ const { headers: { type } } = await parse(req); }");
        let function = &records.functions[0];
        assert!(function.is_async);

        let variable = records.variables.iter().find(|v| v.name == "type").expect("type bound");
        assert_eq!(variable.kind, NodeKind::Variable);

        let flow = &records.destructurings[0];
        assert_eq!(flow.variable_name, "type");
        assert_eq!(flow.property_path.as_deref(), Some("headers.type"));
        let call_source = flow.call_source.as_ref().expect("call initializer");
        assert_eq!(call_source.name, "parse");

        let call = records.calls.iter().find(|c| c.name == "parse").expect("parse call");
        assert!(call.is_awaited);
    }

    #[test]
    fn test_promise_executor_resolutions() {
        let records = analyze_snippet(
            "new Promise((ok, bad) => { if (x) ok(42); else bad(new E()); });",
        );
        assert_eq!(records.constructor_calls.len(), 2, "Promise and E");
        let promise = records
            .constructor_calls
            .iter()
            .find(|ctor| ctor.class_name == "Promise")
            .expect("promise ctor");
        assert!(promise.id.contains(":CONSTRUCTOR_CALL:Promise:"));

        assert_eq!(records.resolutions.len(), 2);
        let resolve = records
            .resolutions
            .iter()
            .find(|r| r.kind == ResolutionKind::Resolve)
            .expect("resolve record");
        assert!(matches!(
            resolve.argument,
            Some(crate::analysis::ValueSource::Literal { ref value, .. }) if value == "42"
        ));
        let reject = records
            .resolutions
            .iter()
            .find(|r| r.kind == ResolutionKind::Reject)
            .expect("reject record");
        assert_eq!(records.id_of(reject.constructor_call), promise.id);

        let throw = records
            .throws
            .iter()
            .find(|t| t.kind == RejectionKind::ExecutorReject)
            .expect("executor rejection");
        assert_eq!(throw.error_class.as_deref(), Some("E"));
    }

    #[test]
    fn test_cyclomatic_complexity_seed_scenario() {
        let records = analyze_snippet(
            "function g(a,b){ if(a && b) return 1; for(let i=0;i<10;i++){} switch(a){case 1:break;default:return 0;} }",
        );
        let function = records.functions.iter().find(|f| f.name == "g").expect("g");
        assert_eq!(function.control_flow.cyclomatic_complexity, 6);
        assert!(function.control_flow.has_branches);
        assert!(function.control_flow.has_loops);
        assert!(function.control_flow.has_early_return);
    }

    #[test]
    fn test_array_index_vs_object_write() {
        let records = analyze_snippet("arr[0] = 1; obj[key] = 2; obj.x = 3;");
        assert_eq!(records.array_mutations.len(), 1);
        let indexed = &records.array_mutations[0];
        assert_eq!(indexed.array_name, "arr");
        assert_eq!(indexed.index, Some(0.0));

        assert_eq!(records.object_mutations.len(), 2);
        let computed = records
            .object_mutations
            .iter()
            .find(|m| m.computed_var.is_some())
            .expect("computed write");
        assert_eq!(computed.computed_var.as_deref(), Some("key"));
        let property = records
            .object_mutations
            .iter()
            .find(|m| m.property.as_deref() == Some("x"))
            .expect("property write");
        assert_eq!(property.object_name, "obj");
    }

    #[test]
    fn test_await_in_loop() {
        let records =
            analyze_snippet("async function f(us){ for (const u of us) { const r = await fetch(u); } }");
        let for_of = records.loops.iter().find(|l| l.iterates_over.is_some()).expect("for-of");
        assert_eq!(for_of.iterates_over.as_deref(), Some("us"));

        let fetch = records.calls.iter().find(|c| c.name == "fetch").expect("fetch call");
        assert!(fetch.is_awaited);
        assert!(fetch.is_inside_loop);
        assert!(!fetch.is_inside_try);

        let binding = records.variables.iter().find(|v| v.name == "u").expect("loop binding");
        assert_eq!(binding.kind, NodeKind::Constant);
    }

    #[test]
    fn test_duplicate_function_ids_are_resolved() {
        let records = analyze_snippet("function handle(){}\nfunction handle(){}");
        assert_eq!(records.functions.len(), 2);
        assert_eq!(records.functions[0].id, "FUNCTION#handle#test.ts");
        assert_eq!(records.functions[1].id, "FUNCTION#handle#test.ts#2");
        assert_ne!(records.functions[0].id, records.functions[1].id);
    }

    #[test]
    fn test_parse_failure_is_an_error() {
        let source = r#"import { api } for "./api";"#;
        let analyzer = JsAstAnalyzer::new();
        assert!(analyzer.collect_records(&test_module(), source).is_err());
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let source = r#"
            import { fetchAll } from "./api";
            const limit = 10;
            async function sync(items) {
                for (const item of items) {
                    try {
                        const { data } = await fetchAll(item);
                        results.push(data);
                    } catch (err) {
                        throw err;
                    }
                }
            }
        "#;
        let first = analyze_snippet(source);
        let second = analyze_snippet(source);
        let ids = |records: &ModuleRecords| -> Vec<String> {
            records
                .functions
                .iter()
                .map(|f| f.id.clone())
                .chain(records.scopes.iter().map(|s| s.id.clone()))
                .chain(records.calls.iter().map(|c| c.id.clone()))
                .chain(records.variables.iter().map(|v| v.id.clone()))
                .collect()
        };
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_for_loop_without_condition() {
        let records = analyze_snippet("function spin(){ for(;;){} }");
        let spin_loop = &records.loops[0];
        assert_eq!(spin_loop.test, None);
        assert_eq!(spin_loop.init, None);
        assert_eq!(spin_loop.update, None);
    }

    #[test]
    fn test_throw_parameter_is_not_traced() {
        let records = analyze_snippet("function f(err){ throw err; }");
        let throw = &records.throws[0];
        assert_eq!(throw.kind, RejectionKind::VariableParameter);
        assert!(throw.trace_path.is_empty());
    }

    #[test]
    fn test_top_level_await_flag() {
        let records = analyze_snippet("const data = await load();");
        assert!(records.has_top_level_await);
        let no_await = analyze_snippet("async function f(){ await load(); }");
        assert!(!no_await.has_top_level_await);
    }

    #[test]
    fn test_empty_default_case_falls_through() {
        let records = analyze_snippet("function f(x){ switch(x){ case 1: return 1; default: } }");
        let default_case =
            records.cases.iter().find(|case| case.is_default).expect("default case");
        assert!(default_case.is_empty);
        assert!(default_case.falls_through);
        let first = records.cases.iter().find(|case| !case.is_default).expect("case 1");
        assert!(!first.falls_through);
    }
}
