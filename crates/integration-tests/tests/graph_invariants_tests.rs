// Copyright (C) 2025 Zhuo Zhang and Wuqi Zhang
// SPDX-License-Identifier: AGPL-3.0
//! Cross-cutting invariants of the emitted graph
//!
//! Id uniqueness, parenting, constant protection, determinism, and the
//! hash-gate no-op law, checked over the full pipeline.

use std::collections::HashSet;

use cpg_common::{EdgeKind, NodeFilter, NodeKind};
use cpg_engine::{EngineConfig, JsAstAnalyzer, ModuleInfo, SourceParser};
use cpg_integration_tests::test_utils::Fixture;
use serde_json::json;

const MIXED_SOURCE: &str = r#"
import { load } from "./load";

const LIMIT = 10;

async function sync(items, onDone) {
    let count = 0;
    for (const item of items) {
        try {
            const { data, meta } = await load(item);
            results.push(data);
            count++;
        } catch (err) {
            if (count > LIMIT) { throw err; }
        }
    }
    onDone(count);
    return count;
}

class Store {
    constructor() { this.entries = []; }
    add(entry) { this.entries.push(entry); }
}

export { sync, Store };
"#;

#[tokio::test]
async fn test_all_node_ids_unique_within_module() {
    let mut fixture = Fixture::new();
    fixture.add_module("mixed.ts", MIXED_SOURCE);
    let summary = fixture.run().await.unwrap();
    assert_eq!(summary.analyzed, 1);

    let nodes = fixture.graph.nodes(&NodeFilter::default());
    let mut seen = HashSet::new();
    for node in &nodes {
        assert!(!node.id.is_empty(), "node id must be non-empty");
        assert!(seen.insert(node.id.clone()), "duplicate node id: {}", node.id);
    }
}

#[tokio::test]
async fn test_every_scope_has_a_parent_construct() {
    let mut fixture = Fixture::new();
    fixture.add_module("mixed.ts", MIXED_SOURCE);
    fixture.run().await.unwrap();

    let all_ids: HashSet<String> = fixture
        .graph
        .nodes(&NodeFilter::default())
        .into_iter()
        .map(|node| node.id)
        .collect();
    for scope in fixture.nodes_of(NodeKind::Scope) {
        let parent = scope
            .attr("parentScopeId")
            .and_then(|value| value.as_str())
            .expect("scope has a parent id");
        assert!(
            all_ids.contains(parent),
            "scope {} parents unknown node {parent}",
            scope.id
        );
    }
}

#[tokio::test]
async fn test_loop_scope_parents_to_loop_not_function() {
    let mut fixture = Fixture::new();
    fixture.add_module("loop.ts", "function f(xs){ for (const x of xs) { use(x); } }");
    fixture.run().await.unwrap();

    let for_of = fixture.single_node(NodeKind::Loop);
    let body_scope = fixture
        .nodes_of(NodeKind::Scope)
        .into_iter()
        .find(|scope| scope.attr("scopeType") == Some(&json!("for-of-loop")))
        .expect("loop body scope");
    assert_eq!(body_scope.attr("parentScopeId"), Some(&json!(for_of.id)));
}

#[tokio::test]
async fn test_constants_are_never_mutation_targets() {
    let mut fixture = Fixture::new();
    fixture.add_module(
        "consts.ts",
        r#"
const FROZEN = 1;
let open = [];
function f(){ open.push(FROZEN); }
"#,
    );
    fixture.run().await.unwrap();

    let constants: HashSet<String> = fixture
        .nodes_of(NodeKind::Constant)
        .into_iter()
        .map(|node| node.id)
        .collect();
    assert!(!constants.is_empty());
    for edge in fixture.graph.edges() {
        if matches!(edge.kind, EdgeKind::Modifies | EdgeKind::WritesTo) {
            assert!(
                !constants.contains(&edge.dst),
                "mutation edge targets constant {}",
                edge.dst
            );
        }
    }
}

#[tokio::test]
async fn test_analysis_is_deterministic_across_runs() {
    let module = ModuleInfo {
        id: "MODULE#mixed.ts".to_string(),
        name: "mixed.ts".to_string(),
        file: "/virtual/mixed.ts".into(),
    };
    let analyzer = JsAstAnalyzer::new();
    let (first_nodes, first_edges) = analyzer.analyze_source(&module, MIXED_SOURCE).unwrap();
    let (second_nodes, second_edges) = analyzer.analyze_source(&module, MIXED_SOURCE).unwrap();

    let ids = |nodes: &[cpg_common::NodeRecord]| -> Vec<String> {
        nodes.iter().map(|node| node.id.clone()).collect()
    };
    assert_eq!(ids(&first_nodes), ids(&second_nodes));

    let edge_keys = |edges: &[cpg_common::EdgeRecord]| -> Vec<(EdgeKind, String, String)> {
        edges.iter().map(|edge| (edge.kind, edge.src.clone(), edge.dst.clone())).collect()
    };
    assert_eq!(edge_keys(&first_edges), edge_keys(&second_edges));
}

#[tokio::test]
async fn test_rerun_with_unchanged_hash_emits_nothing() {
    let mut fixture = Fixture::new();
    let module = fixture.add_module("stable.ts", "export function stay(){}");
    let summary = fixture.run().await.unwrap();
    assert_eq!(summary.analyzed, 1);

    // Record the hash as the indexer would after a successful pass.
    let source = std::fs::read(&module.file).unwrap();
    let mut node = fixture.graph.nodes(&NodeFilter::by_id(&module.id)).pop().unwrap();
    node.attrs
        .insert("contentHash".to_string(), cpg_engine::analysis::content_hash(&source).into());
    fixture.graph.seed_node(node);

    let nodes_before = fixture.graph.node_count();
    let edges_before = fixture.graph.edges().len();
    let summary = fixture.run().await.unwrap();
    assert_eq!(summary.analyzed, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(fixture.graph.node_count(), nodes_before);
    assert_eq!(fixture.graph.edges().len(), edges_before);
}

#[tokio::test]
async fn test_empty_module_boundary() {
    let mut fixture = Fixture::new();
    let module = fixture.add_module("empty.ts", "");
    let summary = fixture.run().await.unwrap();
    assert_eq!(summary.analyzed, 1);
    assert_eq!(summary.nodes, 0);

    let stored = fixture.graph.nodes(&NodeFilter::by_id(&module.id)).pop().unwrap();
    assert_eq!(stored.attr("hasTopLevelAwait"), Some(&json!(false)));
}

#[tokio::test]
async fn test_for_without_clauses_boundary() {
    let mut fixture = Fixture::new();
    fixture.add_module("spin.ts", "function spin(){ for(;;){} }");
    fixture.run().await.unwrap();

    let spin_loop = fixture.single_node(NodeKind::Loop);
    assert_eq!(spin_loop.attr("test"), None);
    assert_eq!(spin_loop.attr("loopType"), Some(&json!("for")));
}

#[tokio::test]
async fn test_empty_default_case_boundary() {
    let mut fixture = Fixture::new();
    fixture.add_module("switch.ts", "function f(x){ switch(x){ case 1: return 1; default: } }");
    fixture.run().await.unwrap();

    let default_case = fixture
        .nodes_of(NodeKind::Case)
        .into_iter()
        .find(|case| case.attr("isDefault") == Some(&json!(true)))
        .expect("default case");
    assert_eq!(default_case.attr("fallsThrough"), Some(&json!(true)));
    assert_eq!(default_case.attr("isEmpty"), Some(&json!(true)));
}

#[tokio::test]
async fn test_throw_parameter_boundary() {
    let module = ModuleInfo {
        id: "MODULE#p.ts".to_string(),
        name: "p.ts".to_string(),
        file: "/virtual/p.ts".into(),
    };
    let analyzer = JsAstAnalyzer::new();
    let records = analyzer.collect_records(&module, "function f(err){ throw err; }").unwrap();
    let throw = &records.throws[0];
    assert_eq!(throw.kind.as_str(), "variable_parameter");
    assert!(throw.trace_path.is_empty());
}

#[tokio::test]
async fn test_parser_accepts_jsx_and_decorators() {
    let mut fixture = Fixture::new();
    fixture.add_module(
        "widget.tsx",
        r#"
@component
class Widget {
    render() { return <div className="w">{this.props.label}</div>; }
}
"#,
    );
    let summary = fixture.run().await.unwrap();
    assert_eq!(summary.analyzed, 1);

    let class = fixture.single_node(NodeKind::Class);
    assert_eq!(class.attr("decorators"), Some(&json!(["component"])));
    let decorator = fixture.single_node(NodeKind::Decorator);
    assert!(fixture
        .graph
        .edges()
        .iter()
        .any(|e| e.kind == EdgeKind::DecoratedBy && e.src == class.id && e.dst == decorator.id));
}

#[tokio::test]
async fn test_multiple_modules_commit_independently() {
    let mut fixture = Fixture::new();
    fixture.add_module("one.ts", "export function one(){}");
    fixture.add_module("two.ts", "export function two(){}");
    fixture.add_module("broken.ts", "class {{{{");
    let summary = fixture.run().await.unwrap();

    assert_eq!(summary.analyzed, 2);
    assert_eq!(summary.failed, 1);
    let committed = fixture.graph.committed_batches();
    assert_eq!(committed.len(), 2);
    assert!(committed.iter().all(|tags| tags.plugin == "JSASTAnalyzer"));
    assert!(committed.iter().all(|tags| tags.phase == "ANALYSIS"));
}

#[tokio::test]
async fn test_parallel_mode_matches_cooperative_mode() {
    let mut cooperative = Fixture::new();
    cooperative.add_module("m.ts", MIXED_SOURCE);
    cooperative.run().await.unwrap();

    let mut parallel = Fixture::new();
    parallel.add_module("m.ts", MIXED_SOURCE);
    parallel
        .run_with(EngineConfig { mode: cpg_engine::WorkerMode::Parallel, ..EngineConfig::default() })
        .await
        .unwrap();

    let ids = |fixture: &Fixture| -> Vec<String> {
        let mut ids: Vec<String> = fixture
            .graph
            .nodes(&NodeFilter::default())
            .into_iter()
            .map(|node| node.id)
            .collect();
        ids.sort();
        ids
    };
    assert_eq!(ids(&cooperative), ids(&parallel));
}

#[tokio::test]
async fn test_scope_depth_counters_return_to_zero() {
    // Indirect check: a function ending with balanced scopes produces
    // consistent try/loop flags, and re-parsing the same body is stable.
    let source = r#"
function nest(a){
    try {
        while (a) {
            if (a > 1) { a--; } else { a = 0; }
        }
    } finally {
        done();
    }
    return a;
}
"#;
    let module = ModuleInfo {
        id: "MODULE#n.ts".to_string(),
        name: "n.ts".to_string(),
        file: "/virtual/n.ts".into(),
    };
    let records = JsAstAnalyzer::new().collect_records(&module, source).unwrap();
    let function = &records.functions[0];
    assert!(function.control_flow.has_try_catch);
    assert!(function.control_flow.has_loops);
    assert!(function.control_flow.has_branches);

    // The `done()` call in finally is not inside the try body, and the
    // `return` after try is not early.
    let done = records.calls.iter().find(|call| call.name == "done").expect("done call");
    assert!(!done.is_inside_try);

    // The parser front end is reusable across modules.
    assert!(SourceParser.parse("again.ts", source).is_ok());
}
