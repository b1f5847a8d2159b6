// Copyright (C) 2025 Zhuo Zhang and Wuqi Zhang
// SPDX-License-Identifier: AGPL-3.0
//! End-to-end scenarios for the AST analyzer
//!
//! Each test drives the full pipeline: module files on disk, hash gate,
//! per-module analysis, lowering, and batch commit into an in-memory graph.

use cpg_common::{EdgeKind, NodeKind};
use cpg_integration_tests::test_utils::Fixture;
use serde_json::json;

#[tokio::test]
async fn test_destructuring_over_await() {
    let mut fixture = Fixture::new();
    fixture.add_module(
        "req.ts",
        "async function f(req){ const { headers: { type } } = await parse(req); }",
    );
    let summary = fixture.run().await.unwrap();
    assert_eq!(summary.analyzed, 1);

    let function = fixture.single_node(NodeKind::Function);
    assert_eq!(function.name, "f");
    assert_eq!(function.attr("async"), Some(&json!(true)));

    let variables = fixture.nodes_of(NodeKind::Variable);
    let bound = variables.iter().find(|v| v.name == "type").expect("VARIABLE type");

    let call = fixture.single_node(NodeKind::Call);
    assert_eq!(call.name, "parse");
    assert_eq!(call.attr("isAwaited"), Some(&json!(true)));

    let derives = fixture
        .graph
        .edges()
        .into_iter()
        .find(|edge| edge.kind == EdgeKind::DerivesFrom)
        .expect("DERIVES_FROM edge");
    assert_eq!(derives.src, bound.id);
    assert_eq!(derives.dst, call.id);
    assert_eq!(derives.attrs["propertyPath"], json!("headers.type"));
}

#[tokio::test]
async fn test_promise_resolve_and_reject() {
    let mut fixture = Fixture::new();
    fixture.add_module(
        "promise.ts",
        "new Promise((ok, bad) => { if (x) ok(42); else bad(new E()); });",
    );
    fixture.run().await.unwrap();

    let promise = fixture
        .nodes_of(NodeKind::ConstructorCall)
        .into_iter()
        .find(|ctor| ctor.name == "Promise")
        .expect("Promise CONSTRUCTOR_CALL");

    let resolutions: Vec<_> = fixture
        .graph
        .edges()
        .into_iter()
        .filter(|edge| edge.kind == EdgeKind::ResolvesTo && edge.dst == promise.id)
        .collect();
    assert_eq!(resolutions.len(), 2, "one resolve, one reject");
    assert!(resolutions.iter().any(|edge| edge.attrs["resolutionType"] == json!("resolve")));
    assert!(resolutions.iter().any(|edge| edge.attrs["resolutionType"] == json!("reject")));

    // The literal 42 flows into the promise.
    let flows = fixture
        .graph
        .edges()
        .into_iter()
        .find(|edge| edge.kind == EdgeKind::FlowsInto && edge.dst == promise.id)
        .expect("FLOWS_INTO edge");
    let literal = fixture
        .nodes_of(NodeKind::Literal)
        .into_iter()
        .find(|node| node.id == flows.src)
        .expect("literal anchor");
    assert_eq!(literal.attr("value"), Some(&json!("42")));

    // The executor function can reject, with the traced class recorded.
    let executor = fixture.single_node(NodeKind::Function);
    let control_flow = executor.attr("controlFlow").expect("controlFlow");
    assert_eq!(control_flow["canReject"], json!(true));
    assert_eq!(control_flow["rejectedBuiltinErrors"], json!(["E"]));
}

#[tokio::test]
async fn test_cyclomatic_complexity() {
    let mut fixture = Fixture::new();
    fixture.add_module(
        "complexity.ts",
        "function g(a,b){ if(a && b) return 1; for(let i=0;i<10;i++){} switch(a){case 1:break;default:return 0;} }",
    );
    fixture.run().await.unwrap();

    let function = fixture.single_node(NodeKind::Function);
    let control_flow = function.attr("controlFlow").expect("controlFlow");
    // 1 + if + logical && + loop + switch + one non-default case.
    assert_eq!(control_flow["cyclomaticComplexity"], json!(6));
}

#[tokio::test]
async fn test_array_index_write_vs_object_write() {
    let mut fixture = Fixture::new();
    fixture.add_module("writes.ts", "arr[0] = 1; obj[key] = 2; obj.x = 3;");
    fixture.run().await.unwrap();

    let array_mutations = fixture.nodes_of(NodeKind::ArrayMutation);
    assert_eq!(array_mutations.len(), 1);
    assert_eq!(array_mutations[0].attr("index"), Some(&json!(0.0)));
    assert_eq!(array_mutations[0].attr("arrayName"), Some(&json!("arr")));

    let object_mutations = fixture.nodes_of(NodeKind::ObjectMutation);
    assert_eq!(object_mutations.len(), 2);
    let computed = object_mutations
        .iter()
        .find(|node| node.attr("computedPropertyVar").is_some())
        .expect("computed write");
    assert_eq!(computed.attr("computedPropertyVar"), Some(&json!("key")));
    let property = object_mutations
        .iter()
        .find(|node| node.attr("property") == Some(&json!("x")))
        .expect("property write");
    assert_eq!(property.attr("objectName"), Some(&json!("obj")));
}

#[tokio::test]
async fn test_await_in_loop() {
    let mut fixture = Fixture::new();
    fixture.add_module("loop.ts", "async function f(us){ for (const u of us) { const r = await fetch(u); } }");
    fixture.run().await.unwrap();

    let for_of = fixture.single_node(NodeKind::Loop);
    assert_eq!(for_of.attr("loopType"), Some(&json!("for-of")));
    assert_eq!(for_of.attr("iteratesOver"), Some(&json!("us")));

    let fetch = fixture
        .nodes_of(NodeKind::Call)
        .into_iter()
        .find(|call| call.name == "fetch")
        .expect("fetch call");
    assert_eq!(fetch.attr("isAwaited"), Some(&json!(true)));
    assert_eq!(fetch.attr("isInsideLoop"), Some(&json!(true)));
}

#[tokio::test]
async fn test_id_collision_resolution() {
    let mut fixture = Fixture::new();
    // Two same-named top-level functions: illegal at runtime, legal in source.
    fixture.add_module("dup.ts", "function handle(){}\nfunction handle(){ callers(); }");
    fixture.run().await.unwrap();

    let functions = fixture.nodes_of(NodeKind::Function);
    assert_eq!(functions.len(), 2);
    assert_ne!(functions[0].id, functions[1].id);
    assert!(functions.iter().any(|f| f.id == "FUNCTION#handle#dup.ts"));
    assert!(functions.iter().any(|f| f.id == "FUNCTION#handle#dup.ts#2"));

    // The call inside the second body survived with its caller edge intact.
    let call = fixture.single_node(NodeKind::Call);
    assert_eq!(call.name, "callers");
    assert!(fixture
        .graph
        .edges()
        .iter()
        .any(|edge| edge.kind == EdgeKind::Calls && edge.dst == call.id));
}

#[tokio::test]
async fn test_try_catch_shape() {
    let mut fixture = Fixture::new();
    fixture.add_module(
        "guard.ts",
        "async function g(){ try { await risky(); } catch (err) { report(err); } finally { done(); } }",
    );
    fixture.run().await.unwrap();

    let try_block = fixture.single_node(NodeKind::TryBlock);
    let catch_block = fixture.single_node(NodeKind::CatchBlock);
    let finally_block = fixture.single_node(NodeKind::FinallyBlock);
    assert_eq!(catch_block.attr("param"), Some(&json!("err")));

    let edges = fixture.graph.edges();
    assert!(edges
        .iter()
        .any(|e| e.kind == EdgeKind::HasCatch && e.src == try_block.id && e.dst == catch_block.id));
    assert!(edges.iter().any(
        |e| e.kind == EdgeKind::HasFinally && e.src == try_block.id && e.dst == finally_block.id
    ));

    let risky = fixture
        .nodes_of(NodeKind::Call)
        .into_iter()
        .find(|call| call.name == "risky")
        .expect("risky call");
    assert_eq!(risky.attr("isInsideTry"), Some(&json!(true)));
    assert_eq!(risky.attr("isAwaited"), Some(&json!(true)));

    // Calls in catch/finally are outside the try body.
    let report = fixture
        .nodes_of(NodeKind::Call)
        .into_iter()
        .find(|call| call.name == "report")
        .expect("report call");
    assert_eq!(report.attr("isInsideTry"), Some(&json!(false)));
}

#[tokio::test]
async fn test_imports_and_exports() {
    let mut fixture = Fixture::new();
    fixture.add_module(
        "api.ts",
        r#"
import axios from "axios";
import { join } from "./paths";
export function get(url) { return axios.get(url); }
export default get;
"#,
    );
    fixture.run().await.unwrap();

    let imports = fixture.nodes_of(NodeKind::Import);
    assert_eq!(imports.len(), 2);
    let axios = imports.iter().find(|i| i.name == "axios").expect("axios import");
    assert_eq!(axios.attr("isExternal"), Some(&json!(true)));
    let relative = imports.iter().find(|i| i.name == "./paths").expect("relative import");
    assert_eq!(relative.attr("isExternal"), Some(&json!(false)));

    let external = fixture.single_node(NodeKind::ExternalModule);
    assert_eq!(external.name, "axios");
    assert!(fixture
        .graph
        .edges()
        .iter()
        .any(|e| e.kind == EdgeKind::ImportsFrom && e.dst == external.id));

    let exports = fixture.nodes_of(NodeKind::Export);
    assert!(exports.iter().any(|e| e.name == "get"));
    assert!(exports.iter().any(|e| e.name == "default"));
}

#[tokio::test]
async fn test_class_with_methods_and_this_mutation() {
    let mut fixture = Fixture::new();
    fixture.add_module(
        "counter.ts",
        r#"
class Counter {
    constructor() { this.count = 0; }
    bump() { this.count++; }
}
new Counter();
"#,
    );
    fixture.run().await.unwrap();

    let class = fixture.single_node(NodeKind::Class);
    assert_eq!(class.name, "Counter");

    let methods = fixture.nodes_of(NodeKind::Method);
    assert_eq!(methods.len(), 2);
    assert!(methods.iter().all(|m| m.attr("className") == Some(&json!("Counter"))));

    let mutation = fixture.single_node(NodeKind::ObjectMutation);
    assert_eq!(mutation.attr("className"), Some(&json!("Counter")));
    assert_eq!(mutation.attr("property"), Some(&json!("count")));

    let update = fixture.single_node(NodeKind::UpdateExpression);
    assert_eq!(update.attr("className"), Some(&json!("Counter")));
    assert_eq!(update.attr("operator"), Some(&json!("++")));

    let ctor = fixture
        .nodes_of(NodeKind::ConstructorCall)
        .into_iter()
        .find(|c| c.name == "Counter")
        .expect("Counter constructor call");
    assert!(fixture
        .graph
        .edges()
        .iter()
        .any(|e| e.kind == EdgeKind::InstanceOf && e.src == ctor.id && e.dst == class.id));
}

#[tokio::test]
async fn test_class_and_interface_heritage_edges() {
    let mut fixture = Fixture::new();
    fixture.add_module(
        "shapes.ts",
        r#"
interface Drawable {}
interface Shape extends Drawable { area(): number; }
class Base {}
class Circle extends Base implements Shape {}
"#,
    );
    fixture.run().await.unwrap();

    let classes = fixture.nodes_of(NodeKind::Class);
    let base = classes.iter().find(|c| c.name == "Base").expect("Base class");
    let circle = classes.iter().find(|c| c.name == "Circle").expect("Circle class");
    let interfaces = fixture.nodes_of(NodeKind::Interface);
    let drawable = interfaces.iter().find(|i| i.name == "Drawable").expect("Drawable interface");
    let shape = interfaces.iter().find(|i| i.name == "Shape").expect("Shape interface");

    let edges = fixture.graph.edges();
    assert!(edges
        .iter()
        .any(|e| e.kind == EdgeKind::Extends && e.src == circle.id && e.dst == base.id));
    assert!(edges
        .iter()
        .any(|e| e.kind == EdgeKind::Implements && e.src == circle.id && e.dst == shape.id));
    assert!(edges
        .iter()
        .any(|e| e.kind == EdgeKind::Extends && e.src == shape.id && e.dst == drawable.id));
}

#[tokio::test]
async fn test_higher_order_parameter_invocation() {
    let mut fixture = Fixture::new();
    fixture.add_module("hof.ts", "function wrap(fn, label){ fn(); return label; }");
    fixture.run().await.unwrap();

    let function = fixture.single_node(NodeKind::Function);
    assert_eq!(function.attr("invokesParamIndexes"), Some(&json!([0])));
}
