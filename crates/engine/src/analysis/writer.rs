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

//! Lowering of module records into graph nodes and edges.
//!
//! Runs after collision resolution, in emission order per buffer. Coordinate
//! references produced during traversal ("the call at line/column") are
//! resolved here against secondary indexes built in one linear pass, so no
//! record ever holds a pointer into another buffer. Exact duplicate edges
//! are dropped; this relies on ambiguous computed writes always taking the
//! object-mutation path.

use std::collections::{HashMap, HashSet};

use serde_json::{json, Value};

use crate::analysis::{
    ArgValue, ExpressionDetail, ModuleRecords, RejectionKind, ReturnKind, ScopeKind, SourceLoc,
    ValueSource,
};
use cpg_common::{EdgeKind, EdgeRecord, NodeKind, NodeRecord};

/// Buffers records and lowers them into nodes and edges.
pub struct GraphWriter;

struct Lowering<'r> {
    records: &'r ModuleRecords,
    nodes: Vec<NodeRecord>,
    edges: Vec<EdgeRecord>,
    seen_edges: HashSet<(EdgeKind, String, String)>,
    emitted_literals: HashSet<String>,
    /// (line, column) → CALL node id.
    call_index: HashMap<(usize, usize), String>,
    /// (line, column) → CONSTRUCTOR_CALL node id.
    ctor_index: HashMap<(usize, usize), String>,
    /// (line, column) → FUNCTION node id.
    function_index: HashMap<(usize, usize), String>,
    /// Class name → CLASS node id (in-module only).
    class_index: HashMap<String, String>,
    /// Interface name → INTERFACE node id (in-module only).
    interface_index: HashMap<String, String>,
}

impl GraphWriter {
    /// Lowers resolved record buffers into node and edge buffers.
    pub fn build(records: &ModuleRecords) -> (Vec<NodeRecord>, Vec<EdgeRecord>) {
        let mut lowering = Lowering {
            records,
            nodes: Vec::new(),
            edges: Vec::new(),
            seen_edges: HashSet::new(),
            emitted_literals: HashSet::new(),
            call_index: HashMap::new(),
            ctor_index: HashMap::new(),
            function_index: HashMap::new(),
            class_index: HashMap::new(),
            interface_index: HashMap::new(),
        };
        lowering.build_indexes();
        lowering.lower();
        (lowering.nodes, lowering.edges)
    }
}

impl Lowering<'_> {
    fn build_indexes(&mut self) {
        for call in &self.records.calls {
            self.call_index.insert((call.loc.line, call.loc.column), call.id.clone());
        }
        for ctor in &self.records.constructor_calls {
            self.ctor_index.insert((ctor.loc.line, ctor.loc.column), ctor.id.clone());
        }
        for function in &self.records.functions {
            self.function_index
                .insert((function.loc.line, function.loc.column), function.id.clone());
        }
        for class in &self.records.classes {
            self.class_index.insert(class.name.clone(), class.id.clone());
        }
        for construct in &self.records.ts_constructs {
            if construct.kind == NodeKind::Interface {
                self.interface_index.insert(construct.name.clone(), construct.id.clone());
            }
        }
    }

    fn lower(&mut self) {
        self.lower_imports();
        self.lower_exports();
        self.lower_variables();
        self.lower_functions();
        self.lower_classes();
        self.lower_ts_constructs();
        self.lower_scopes();
        self.lower_branches();
        self.lower_cases();
        self.lower_loops();
        self.lower_try_blocks();
        self.lower_calls();
        self.lower_call_arguments();
        self.lower_constructor_calls();
        self.lower_property_accesses();
        self.lower_expressions();
        self.lower_object_literals();
        self.lower_array_literals();
        self.lower_mutations();
        self.lower_assignments();
        self.lower_destructurings();
        self.lower_returns();
        self.lower_throws();
        self.lower_resolutions();

        debug_assert!(
            {
                let mut ids = HashSet::new();
                self.nodes.iter().all(|node| ids.insert(node.id.clone()))
            },
            "node ids must be unique after collision resolution"
        );
    }

    fn push_node(&mut self, node: NodeRecord) {
        self.nodes.push(node);
    }

    fn push_edge(&mut self, edge: EdgeRecord) {
        let key = (edge.kind, edge.src.clone(), edge.dst.clone());
        if self.seen_edges.insert(key) {
            self.edges.push(edge);
        }
    }

    fn file(&self) -> &str {
        &self.records.file
    }

    fn node(&self, id: &str, kind: NodeKind, name: &str, loc: SourceLoc) -> NodeRecord {
        NodeRecord::new(id, kind, name)
            .with_file(self.file().to_string())
            .with_attr("line", loc.line)
            .with_attr("column", loc.column)
    }

    /* node families */

    fn lower_imports(&mut self) {
        for import in &self.records.imports {
            let specifiers: Vec<Value> = import
                .specifiers
                .iter()
                .map(|specifier| {
                    json!({
                        "local": specifier.local,
                        "imported": specifier.imported,
                        "kind": specifier.kind,
                        "typeOnly": specifier.type_only,
                    })
                })
                .collect();
            let node = self
                .node(&import.id, NodeKind::Import, &import.source, import.loc)
                .with_attr("source", import.source.clone())
                .with_attr("isExternal", import.is_external)
                .with_attr("specifiers", specifiers);
            self.push_node(node);
            self.push_edge(EdgeRecord::new(
                EdgeKind::Imports,
                self.records.module_id.clone(),
                import.id.clone(),
            ));
        }
        for external in &self.records.external_modules {
            self.push_node(NodeRecord::new(
                &external.id,
                NodeKind::ExternalModule,
                &external.name,
            ));
        }
        for import in &self.records.imports {
            if import.is_external {
                let dst = format!("{}#{}", NodeKind::ExternalModule.as_str(), import.source);
                self.push_edge(EdgeRecord::new(EdgeKind::ImportsFrom, import.id.clone(), dst));
            }
        }
    }

    fn lower_exports(&mut self) {
        for export in &self.records.exports {
            let mut node = self
                .node(&export.id, NodeKind::Export, &export.name, export.loc)
                .with_attr("exportKind", json!(export.kind));
            if let Some(source) = &export.source {
                node = node.with_attr("source", source.clone());
            }
            self.push_node(node);
            self.push_edge(EdgeRecord::new(
                EdgeKind::Contains,
                self.records.module_id.clone(),
                export.id.clone(),
            ));
        }
    }

    fn lower_variables(&mut self) {
        for variable in &self.records.variables {
            let node = self
                .node(&variable.id, variable.kind, &variable.name, variable.loc)
                .with_attr("scopeId", variable.scope_id.clone())
                .with_attr("scopePath", variable.scope_path.clone());
            self.push_node(node);
            self.push_edge(EdgeRecord::new(
                EdgeKind::Declares,
                variable.scope_id.clone(),
                variable.id.clone(),
            ));
        }
    }

    fn lower_functions(&mut self) {
        // Rejection aggregation per function, from throw records.
        let mut rejected: HashMap<usize, Vec<String>> = HashMap::new();
        let mut thrown: HashMap<usize, Vec<String>> = HashMap::new();
        let mut can_reject: HashSet<usize> = HashSet::new();
        let mut has_async_throw: HashSet<usize> = HashSet::new();
        for throw in &self.records.throws {
            let Some(function) = throw.function else { continue };
            let index = function.index;
            let is_reject = matches!(
                throw.kind,
                RejectionKind::PromiseReject | RejectionKind::ExecutorReject
            );
            let function_is_async = self.records.functions[index].is_async;
            if is_reject || function_is_async {
                can_reject.insert(index);
            }
            if function_is_async && !is_reject {
                has_async_throw.insert(index);
            }
            if let Some(class) = &throw.error_class {
                if is_reject {
                    rejected.entry(index).or_default().push(class.clone());
                } else {
                    thrown.entry(index).or_default().push(class.clone());
                }
            }
        }

        for (index, function) in self.records.functions.iter().enumerate() {
            let kind = if function.is_method { NodeKind::Method } else { NodeKind::Function };
            let control_flow = json!({
                "hasBranches": function.control_flow.has_branches,
                "hasLoops": function.control_flow.has_loops,
                "hasTryCatch": function.control_flow.has_try_catch,
                "hasEarlyReturn": function.control_flow.has_early_return,
                "hasThrow": function.control_flow.has_throw,
                "cyclomaticComplexity": function.control_flow.cyclomatic_complexity,
                "canReject": can_reject.contains(&index),
                "hasAsyncThrow": has_async_throw.contains(&index),
                "rejectedBuiltinErrors": rejected.get(&index).cloned().unwrap_or_default(),
                "thrownBuiltinErrors": thrown.get(&index).cloned().unwrap_or_default(),
            });
            let mut node = self
                .node(&function.id, kind, &function.name, function.loc)
                .with_attr("async", function.is_async)
                .with_attr("generator", function.is_generator)
                .with_attr("arrow", function.is_arrow)
                .with_attr("isAssignment", function.is_assignment)
                .with_attr("isCallback", function.is_callback)
                .with_attr("parentScopeId", function.parent_scope_id.clone())
                .with_attr("controlFlow", control_flow)
                .with_attr("invokesParamIndexes", json!(function.invoked_param_indexes));
            if let Some(class_name) = &function.class_name {
                node = node.with_attr("className", class_name.clone());
            }
            self.push_node(node);
            self.push_edge(EdgeRecord::new(
                EdgeKind::Contains,
                function.parent_scope_id.clone(),
                function.id.clone(),
            ));
        }
    }

    fn lower_classes(&mut self) {
        for class in &self.records.classes {
            let mut node = self.node(&class.id, NodeKind::Class, &class.name, class.loc);
            if let Some(super_class) = &class.super_class {
                node = node.with_attr("superClass", super_class.clone());
            }
            node = node
                .with_attr("implements", json!(class.implements))
                .with_attr("decorators", json!(class.decorators));
            self.push_node(node);
            self.push_edge(EdgeRecord::new(
                EdgeKind::Contains,
                class.parent_scope_id.clone(),
                class.id.clone(),
            ));
            if let Some(super_class) = &class.super_class {
                if let Some(super_id) = self.class_index.get(super_class).cloned() {
                    self.push_edge(EdgeRecord::new(EdgeKind::Extends, class.id.clone(), super_id));
                }
            }
            for implemented in &class.implements {
                if let Some(interface_id) = self.interface_index.get(implemented).cloned() {
                    self.push_edge(EdgeRecord::new(
                        EdgeKind::Implements,
                        class.id.clone(),
                        interface_id,
                    ));
                }
            }
        }
    }

    fn lower_ts_constructs(&mut self) {
        for construct in &self.records.ts_constructs {
            let mut node = self.node(&construct.id, construct.kind, &construct.name, construct.loc);
            if !construct.extends.is_empty() {
                node = node.with_attr("extends", json!(construct.extends));
            }
            self.push_node(node);
            self.push_edge(EdgeRecord::new(
                EdgeKind::Contains,
                self.records.module_id.clone(),
                construct.id.clone(),
            ));
            if construct.kind == NodeKind::Decorator {
                if let Some(target) = &construct.target_id {
                    self.push_edge(EdgeRecord::new(
                        EdgeKind::DecoratedBy,
                        target.clone(),
                        construct.id.clone(),
                    ));
                }
            }
            if construct.kind == NodeKind::Interface {
                for extended in &construct.extends {
                    if let Some(extended_id) = self.interface_index.get(extended).cloned() {
                        self.push_edge(EdgeRecord::new(
                            EdgeKind::Extends,
                            construct.id.clone(),
                            extended_id,
                        ));
                    }
                }
            }
        }
    }

    fn lower_scopes(&mut self) {
        for scope in &self.records.scopes {
            let mut node = self
                .node(&scope.id, NodeKind::Scope, &scope.name, scope.loc)
                .with_attr("scopeType", scope.scope_type.as_str())
                .with_attr("conditional", scope.conditional)
                .with_attr("semanticId", scope.id.clone())
                .with_attr("parentScopeId", scope.parent_scope_id.clone());
            if let Some(condition) = &scope.condition {
                node = node.with_attr("condition", condition.clone());
            }
            if let Some(parent_function) = &scope.parent_function_id {
                node = node.with_attr("parentFunctionId", parent_function.clone());
            }
            if let Some(captures_from) = &scope.captures_from {
                node = node.with_attr("capturesFrom", captures_from.clone());
            }
            self.push_node(node);

            let owner_edge = match scope.scope_type {
                ScopeKind::If => EdgeKind::HasConsequent,
                ScopeKind::Else => EdgeKind::HasAlternate,
                _ => EdgeKind::HasScope,
            };
            self.push_edge(EdgeRecord::new(
                owner_edge,
                scope.parent_scope_id.clone(),
                scope.id.clone(),
            ));
            if let Some(captures_from) = &scope.captures_from {
                self.push_edge(EdgeRecord::new(
                    EdgeKind::Captures,
                    scope.id.clone(),
                    captures_from.clone(),
                ));
            }
        }
    }

    fn lower_branches(&mut self) {
        for branch in &self.records.branches {
            let mut node = self
                .node(&branch.id, NodeKind::Branch, branch.branch_type.as_str(), branch.loc)
                .with_attr("branchType", branch.branch_type.as_str());
            if let Some(condition) = &branch.condition {
                node = node.with_attr("condition", condition.clone());
            }
            self.push_node(node);
            self.push_edge(EdgeRecord::new(
                EdgeKind::Contains,
                branch.parent_id.clone(),
                branch.id.clone(),
            ));
        }
    }

    fn lower_cases(&mut self) {
        for case in &self.records.cases {
            let branch_id = self.records.id_of(case.branch).to_string();
            let name = case.value.clone().unwrap_or_else(|| "default".to_string());
            let mut node = self
                .node(&case.id, NodeKind::Case, &name, case.loc)
                .with_attr("isDefault", case.is_default)
                .with_attr("fallsThrough", case.falls_through)
                .with_attr("isEmpty", case.is_empty);
            if let Some(value) = &case.value {
                node = node.with_attr("value", value.clone());
            }
            self.push_node(node);
            self.push_edge(EdgeRecord::new(EdgeKind::Contains, branch_id, case.id.clone()));
        }
    }

    fn lower_loops(&mut self) {
        for loop_record in &self.records.loops {
            let mut node = self
                .node(&loop_record.id, NodeKind::Loop, loop_record.kind.as_str(), loop_record.loc)
                .with_attr("loopType", loop_record.kind.as_str())
                .with_attr("isAwait", loop_record.is_await);
            for (key, value) in [
                ("iteratesOver", &loop_record.iterates_over),
                ("init", &loop_record.init),
                ("test", &loop_record.test),
                ("update", &loop_record.update),
                ("condition", &loop_record.condition),
            ] {
                if let Some(value) = value {
                    node = node.with_attr(key, value.clone());
                }
            }
            self.push_node(node);
            self.push_edge(EdgeRecord::new(
                EdgeKind::Contains,
                loop_record.parent_scope_id.clone(),
                loop_record.id.clone(),
            ));
            if let Some(target) = &loop_record.iterates_over {
                if let Some(binding) = self.resolve_binding(target, None) {
                    self.push_edge(EdgeRecord::new(
                        EdgeKind::IteratesOver,
                        loop_record.id.clone(),
                        binding,
                    ));
                }
            }
        }
    }

    fn lower_try_blocks(&mut self) {
        for try_block in &self.records.try_blocks {
            let node = self.node(&try_block.id, NodeKind::TryBlock, "try", try_block.loc);
            self.push_node(node);
            self.push_edge(EdgeRecord::new(
                EdgeKind::Contains,
                try_block.parent_scope_id.clone(),
                try_block.id.clone(),
            ));
        }
        for catch_block in &self.records.catch_blocks {
            let try_id = self.records.id_of(catch_block.try_block).to_string();
            let mut node = self.node(&catch_block.id, NodeKind::CatchBlock, "catch", catch_block.loc);
            if let Some(param) = &catch_block.param {
                node = node.with_attr("param", param.clone());
            }
            self.push_node(node);
            self.push_edge(EdgeRecord::new(
                EdgeKind::HasCatch,
                try_id.clone(),
                catch_block.id.clone(),
            ));
            self.push_edge(EdgeRecord::new(EdgeKind::CatchesFrom, catch_block.id.clone(), try_id));
        }
        for finally_block in &self.records.finally_blocks {
            let try_id = self.records.id_of(finally_block.try_block).to_string();
            let node =
                self.node(&finally_block.id, NodeKind::FinallyBlock, "finally", finally_block.loc);
            self.push_node(node);
            self.push_edge(EdgeRecord::new(
                EdgeKind::HasFinally,
                try_id,
                finally_block.id.clone(),
            ));
        }
    }

    fn lower_calls(&mut self) {
        for call in &self.records.calls {
            let mut node = self
                .node(&call.id, NodeKind::Call, &call.name, call.loc)
                .with_attr("isNew", call.is_new)
                .with_attr("isAwaited", call.is_awaited)
                .with_attr("isInsideTry", call.is_inside_try)
                .with_attr("isInsideLoop", call.is_inside_loop)
                .with_attr("isMethodCall", call.is_method_call)
                .with_attr("computed", call.computed);
            if let Some(object) = &call.object {
                node = node.with_attr("object", object.clone());
            }
            if let Some(method) = &call.method {
                node = node.with_attr("method", method.clone());
            }
            self.push_node(node);
            self.push_edge(EdgeRecord::new(
                EdgeKind::Contains,
                call.parent_scope_id.clone(),
                call.id.clone(),
            ));
            let caller = call
                .enclosing_function
                .map(|function| self.records.id_of(function).to_string())
                .unwrap_or_else(|| self.records.module_id.clone());
            self.push_edge(EdgeRecord::new(EdgeKind::Calls, caller, call.id.clone()));
        }
    }

    fn lower_call_arguments(&mut self) {
        for argument in &self.records.call_arguments {
            let call_id = argument.call_id.clone();
            let (dst, attrs) = self.resolve_argument(argument.index, &argument.value);
            let Some(dst) = dst else { continue };
            let mut edge = EdgeRecord::new(EdgeKind::PassesArgument, call_id.clone(), dst.clone())
                .with_attr("index", argument.index)
                .with_attr("spread", argument.spread);
            for (key, value) in attrs {
                edge = edge.with_attr(&key, value);
            }
            self.push_edge(edge);
            if matches!(argument.value, ArgValue::Function { .. }) {
                self.push_edge(EdgeRecord::new(EdgeKind::HasCallback, call_id, dst));
            }
        }
    }

    /// Resolves an argument value to a destination node, synthesizing LITERAL
    /// anchors on demand.
    fn resolve_argument(
        &mut self,
        index: usize,
        value: &ArgValue,
    ) -> (Option<String>, Vec<(String, Value)>) {
        match value {
            ArgValue::Variable { name } => (
                self.resolve_binding(name, None),
                vec![("name".to_string(), json!(name))],
            ),
            ArgValue::Literal { value, literal_type } => {
                let id = self.intern_literal(value, literal_type, index);
                (Some(id), Vec::new())
            }
            ArgValue::Function { name, line, column } => (
                self.function_index.get(&(*line, *column)).cloned(),
                vec![("callbackName".to_string(), json!(name))],
            ),
            ArgValue::Call { name, line, column } => (
                self.call_index
                    .get(&(*line, *column))
                    .or_else(|| self.ctor_index.get(&(*line, *column)))
                    .cloned(),
                vec![("calleeName".to_string(), json!(name))],
            ),
            ArgValue::Member { object, property, class_name } => (
                None,
                vec![
                    ("object".to_string(), json!(object)),
                    ("property".to_string(), json!(property)),
                    ("className".to_string(), json!(class_name)),
                ],
            ),
            ArgValue::Expression { repr } => {
                (None, vec![("repr".to_string(), json!(repr))])
            }
        }
    }

    fn lower_constructor_calls(&mut self) {
        for ctor in &self.records.constructor_calls {
            let node = self
                .node(&ctor.id, NodeKind::ConstructorCall, &ctor.class_name, ctor.loc)
                .with_attr("className", ctor.class_name.clone())
                .with_attr("isAwaited", ctor.is_awaited);
            self.push_node(node);
            self.push_edge(EdgeRecord::new(
                EdgeKind::Contains,
                ctor.parent_scope_id.clone(),
                ctor.id.clone(),
            ));
            if let Some(class_id) = self.class_index.get(&ctor.class_name).cloned() {
                self.push_edge(EdgeRecord::new(EdgeKind::InstanceOf, ctor.id.clone(), class_id));
            }
        }
    }

    fn lower_property_accesses(&mut self) {
        for access in &self.records.property_accesses {
            let name = format!("{}.{}", access.object, access.property);
            let node = self
                .node(&access.id, NodeKind::PropertyAccess, &name, access.loc)
                .with_attr("object", access.object.clone())
                .with_attr("property", access.property.clone())
                .with_attr("computed", access.computed)
                .with_attr("optional", access.optional)
                .with_attr("isNewTarget", access.is_new_target);
            self.push_node(node);
            self.push_edge(EdgeRecord::new(
                EdgeKind::Contains,
                access.parent_scope_id.clone(),
                access.id.clone(),
            ));
            if let Some(binding) = self.resolve_binding(&access.object, None) {
                self.push_edge(EdgeRecord::new(EdgeKind::ReadsFrom, access.id.clone(), binding));
            }
        }
    }

    fn lower_expressions(&mut self) {
        for expression in &self.records.expressions {
            let mut node = self
                .node(&expression.id, NodeKind::Expression, &expression.ast_kind, expression.loc)
                .with_attr("astKind", expression.ast_kind.clone());
            match &expression.detail {
                ExpressionDetail::Member { object, property, computed, computed_var } => {
                    node = node
                        .with_attr("object", object.clone())
                        .with_attr("property", property.clone())
                        .with_attr("computed", *computed);
                    if let Some(computed_var) = computed_var {
                        node = node.with_attr("computedPropertyVar", computed_var.clone());
                    }
                }
                ExpressionDetail::Binary { operator, left, right } => {
                    node = node.with_attr("operator", operator.clone());
                    if let Some(left) = left {
                        node = node.with_attr("leftName", left.clone());
                    }
                    if let Some(right) = right {
                        node = node.with_attr("rightName", right.clone());
                    }
                }
                ExpressionDetail::Conditional { consequent, alternate } => {
                    if let Some(consequent) = consequent {
                        node = node.with_attr("consequentName", consequent.clone());
                    }
                    if let Some(alternate) = alternate {
                        node = node.with_attr("alternateName", alternate.clone());
                    }
                }
                ExpressionDetail::Template { identifiers } => {
                    node = node.with_attr("identifiers", json!(identifiers));
                }
                ExpressionDetail::Other { repr } => {
                    node = node.with_attr("repr", repr.clone());
                }
            }
            self.push_node(node);
        }
    }

    fn lower_object_literals(&mut self) {
        for (index, object) in self.records.object_literals.iter().enumerate() {
            let properties: Vec<Value> = self
                .records
                .object_properties
                .iter()
                .filter(|property| property.object.index == index)
                .map(|property| {
                    json!({
                        "key": property.key,
                        "computed": property.computed,
                        "isSpread": property.is_spread,
                        "isMethod": property.is_method,
                        "value": property.value,
                    })
                })
                .collect();
            let node = self
                .node(&object.id, NodeKind::ObjectLiteral, "object", object.loc)
                .with_attr("properties", properties);
            self.push_node(node);
        }
    }

    fn lower_array_literals(&mut self) {
        for array in &self.records.array_literals {
            let node = self
                .node(&array.id, NodeKind::ArrayLiteral, "array", array.loc)
                .with_attr("elements", json!(array.elements));
            self.push_node(node);
        }
    }

    fn lower_mutations(&mut self) {
        for mutation in &self.records.array_mutations {
            let inserted: Vec<Value> = mutation
                .inserted
                .iter()
                .map(|value| json!({ "value": value.value, "spread": value.spread }))
                .collect();
            let mut node = self
                .node(&mutation.id, NodeKind::ArrayMutation, &mutation.array_name, mutation.loc)
                .with_attr("method", mutation.kind.as_str())
                .with_attr("arrayName", mutation.array_name.clone())
                .with_attr("isNested", mutation.is_nested)
                .with_attr("insertedValues", inserted)
                .with_attr("scopePath", mutation.scope_path.clone());
            if let Some(base) = &mutation.base_object {
                node = node.with_attr("baseObjectName", base.clone());
            }
            if let Some(property) = &mutation.property_name {
                node = node.with_attr("propertyName", property.clone());
            }
            if let Some(index) = mutation.index {
                node = node.with_attr("index", index);
            }
            self.push_node(node);
            if let Some(binding) =
                self.resolve_binding(&mutation.array_name, Some(&mutation.scope_path))
            {
                self.push_edge(EdgeRecord::new(EdgeKind::Modifies, mutation.id.clone(), binding));
            }
        }

        for mutation in &self.records.object_mutations {
            let mut node = self
                .node(&mutation.id, NodeKind::ObjectMutation, &mutation.object_name, mutation.loc)
                .with_attr("objectName", mutation.object_name.clone())
                .with_attr("mutationType", json!(mutation.kind))
                .with_attr("scopePath", mutation.scope_path.clone());
            if let Some(class_name) = &mutation.class_name {
                node = node.with_attr("className", class_name.clone());
            }
            if let Some(property) = &mutation.property {
                node = node.with_attr("property", property.clone());
            }
            if let Some(computed_var) = &mutation.computed_var {
                node = node.with_attr("computedPropertyVar", computed_var.clone());
            }
            if let Some(value) = &mutation.value {
                node = node.with_attr("value", serde_json::to_value(value).unwrap_or(Value::Null));
            }
            self.push_node(node);
            if let Some(binding) =
                self.resolve_binding(&mutation.object_name, Some(&mutation.scope_path))
            {
                self.push_edge(EdgeRecord::new(EdgeKind::WritesTo, mutation.id.clone(), binding));
            }
        }

        for update in &self.records.updates {
            let mut node = self
                .node(&update.id, NodeKind::UpdateExpression, &update.target, update.loc)
                .with_attr("operator", update.op.clone())
                .with_attr("prefix", update.prefix)
                .with_attr("scopePath", update.scope_path.clone());
            if let Some(object) = &update.object {
                node = node.with_attr("object", object.clone());
            }
            if let Some(property) = &update.property {
                node = node.with_attr("property", property.clone());
            }
            if let Some(computed_var) = &update.computed_var {
                node = node.with_attr("computedPropertyVar", computed_var.clone());
            }
            if let Some(class_name) = &update.class_name {
                node = node.with_attr("className", class_name.clone());
            }
            self.push_node(node);
            if update.object.is_none() {
                if let Some(binding) =
                    self.resolve_binding(&update.target, Some(&update.scope_path))
                {
                    self.push_edge(EdgeRecord::new(
                        EdgeKind::Modifies,
                        update.id.clone(),
                        binding,
                    ));
                }
            }
        }
    }

    fn lower_assignments(&mut self) {
        for assignment in &self.records.assignments {
            let variable_id = self.records.id_of(assignment.variable).to_string();
            let Some(dst) = self.resolve_value(&assignment.source, assignment.loc) else {
                continue;
            };
            self.push_edge(EdgeRecord::new(EdgeKind::AssignedFrom, variable_id, dst));
        }
    }

    fn lower_destructurings(&mut self) {
        for flow in &self.records.destructurings {
            let variable_id = self.records.id_of(flow.variable).to_string();
            let mut edge_attrs: Vec<(&str, Value)> =
                vec![("object", json!(flow.object)), ("isRest", json!(flow.is_rest))];
            if let Some(path) = &flow.property_path {
                edge_attrs.push(("propertyPath", json!(path)));
            }
            if let Some(index) = flow.array_index {
                edge_attrs.push(("arrayIndex", json!(index)));
            }

            // Call initializers point the derives-from edge at the CALL node.
            let dst = match &flow.call_source {
                Some(call_source) => {
                    self.call_index.get(&(call_source.line, call_source.column)).cloned()
                }
                None => self.resolve_binding(&flow.object, None),
            };
            let Some(dst) = dst else { continue };
            let mut edge = EdgeRecord::new(EdgeKind::DerivesFrom, variable_id, dst);
            for (key, value) in edge_attrs {
                edge = edge.with_attr(key, value);
            }
            self.push_edge(edge);
        }
    }

    fn lower_returns(&mut self) {
        for return_record in &self.records.returns {
            let function_id = self.records.id_of(return_record.function).to_string();
            let Some(value) = &return_record.value else { continue };
            let Some(dst) = self.resolve_value(value, return_record.loc) else { continue };
            let kind = match return_record.kind {
                ReturnKind::Return | ReturnKind::ImplicitReturn => EdgeKind::Returns,
                ReturnKind::Yield if return_record.delegate => EdgeKind::DelegatesTo,
                ReturnKind::Yield => EdgeKind::Yields,
            };
            let edge = EdgeRecord::new(kind, function_id, dst)
                .with_attr("isEarly", return_record.is_early)
                .with_attr("implicit", return_record.kind == ReturnKind::ImplicitReturn);
            self.push_edge(edge);
        }
    }

    fn lower_throws(&mut self) {
        for throw in &self.records.throws {
            let Some(function) = throw.function else { continue };
            let function_id = self.records.id_of(function).to_string();
            let Some(class) = &throw.error_class else { continue };
            let Some(class_id) = self.class_index.get(class).cloned() else { continue };
            let kind = match throw.kind {
                RejectionKind::PromiseReject | RejectionKind::ExecutorReject => EdgeKind::Rejects,
                _ => EdgeKind::Throws,
            };
            let edge = EdgeRecord::new(kind, function_id, class_id)
                .with_attr("patternType", throw.kind.as_str())
                .with_attr("tracePath", json!(throw.trace_path));
            self.push_edge(edge);
        }
    }

    fn lower_resolutions(&mut self) {
        for resolution in &self.records.resolutions {
            let call_id = self.records.id_of(resolution.call).to_string();
            let ctor_id = self.records.id_of(resolution.constructor_call).to_string();
            let edge = EdgeRecord::new(EdgeKind::ResolvesTo, call_id, ctor_id.clone())
                .with_attr("resolutionType", json!(resolution.kind));
            self.push_edge(edge);
            if let Some(argument) = &resolution.argument {
                if let Some(src) = self.resolve_value(argument, resolution.loc) {
                    self.push_edge(EdgeRecord::new(EdgeKind::FlowsInto, src, ctor_id.clone()));
                }
            }
        }
    }

    /* reference resolution */

    /// Resolves a classified value to an existing node, synthesizing LITERAL
    /// anchors for literal sources.
    fn resolve_value(&mut self, value: &ValueSource, loc: SourceLoc) -> Option<String> {
        match value {
            ValueSource::Literal { value, literal_type } => {
                Some(self.literal_at(value, literal_type, loc))
            }
            ValueSource::Variable { name } => self.resolve_binding(name, None),
            ValueSource::CallSite { line, column, .. }
            | ValueSource::MethodCall { line, column } => {
                self.call_index.get(&(*line, *column)).cloned()
            }
            ValueSource::ConstructorCall { line, column, .. } => {
                self.ctor_index.get(&(*line, *column)).cloned()
            }
            ValueSource::Function { name } => name
                .as_ref()
                .and_then(|name| {
                    self.records
                        .functions
                        .iter()
                        .find(|function| &function.name == name)
                        .map(|function| function.id.clone())
                }),
            ValueSource::ObjectLiteral { node }
            | ValueSource::ArrayLiteral { node }
            | ValueSource::Expression { node } => Some(self.records.id_of(*node).to_string()),
            ValueSource::Unknown => None,
        }
    }

    /// Innermost binding of `name` whose scope path contains `scope_path`
    /// (or any binding when no path is given).
    fn resolve_binding(&self, name: &str, scope_path: Option<&str>) -> Option<String> {
        self.records
            .variables
            .iter()
            .filter(|variable| {
                variable.name == name
                    && scope_path.is_none_or(|path| {
                        path == variable.scope_path
                            || path.starts_with(&format!("{}->", variable.scope_path))
                    })
            })
            .max_by_key(|variable| variable.scope_path.len())
            .map(|variable| variable.id.clone())
    }

    fn literal_at(&mut self, value: &str, literal_type: &str, loc: SourceLoc) -> String {
        let id = format!("{}:LITERAL:{}:{}", self.file(), loc.line, loc.column);
        if self.emitted_literals.insert(id.clone()) {
            let node = self
                .node(&id, NodeKind::Literal, value, loc)
                .with_attr("value", value.to_string())
                .with_attr("literalType", literal_type.to_string());
            self.push_node(node);
        }
        id
    }

    fn intern_literal(&mut self, value: &str, literal_type: &str, index: usize) -> String {
        let id = format!("{}:LITERAL:{value}:{literal_type}:{index}", self.file());
        if self.emitted_literals.insert(id.clone()) {
            let node = NodeRecord::new(&id, NodeKind::Literal, value)
                .with_file(self.file().to_string())
                .with_attr("value", value.to_string())
                .with_attr("literalType", literal_type.to_string());
            self.push_node(node);
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::tests::analyze_snippet;

    fn build(source: &str) -> (Vec<NodeRecord>, Vec<EdgeRecord>) {
        let records = analyze_snippet(source);
        GraphWriter::build(&records)
    }

    #[test]
    fn test_node_ids_unique_after_build() {
        let (nodes, _) = build(
            "function handle(){}\nfunction handle(){}\nconst x = 1;\nif (x) { handle(); }",
        );
        let mut ids: Vec<_> = nodes.iter().map(|node| node.id.clone()).collect();
        ids.sort();
        let before = ids.len();
        ids.dedup();
        assert_eq!(before, ids.len());
    }

    #[test]
    fn test_function_node_attrs() {
        let (nodes, edges) = build("async function f(){ if (x) return 1; return 2; }");
        let function = nodes
            .iter()
            .find(|node| node.kind == NodeKind::Function)
            .expect("function node");
        assert_eq!(function.attr("async"), Some(&serde_json::Value::Bool(true)));
        let control_flow = function.attr("controlFlow").expect("controlFlow");
        assert_eq!(control_flow["hasEarlyReturn"], serde_json::Value::Bool(true));
        assert!(edges
            .iter()
            .any(|edge| edge.kind == EdgeKind::HasScope && edge.src == function.id));
    }

    #[test]
    fn test_derives_from_targets_call_node() {
        let (nodes, edges) = build("async function f(req){ const { body } = await parse(req); }");
        let call = nodes
            .iter()
            .find(|node| node.kind == NodeKind::Call && node.name == "parse")
            .expect("parse call node");
        let derives = edges
            .iter()
            .find(|edge| edge.kind == EdgeKind::DerivesFrom)
            .expect("derives-from edge");
        assert_eq!(derives.dst, call.id);
        assert_eq!(derives.attrs["object"], serde_json::json!("parse()"));
    }

    #[test]
    fn test_modifies_edge_targets_binding() {
        let (nodes, edges) = build("function f(){ const xs = []; xs.push(1); }");
        let binding = nodes
            .iter()
            .find(|node| node.kind == NodeKind::Variable && node.name == "xs")
            .expect("xs binding");
        let mutation = nodes
            .iter()
            .find(|node| node.kind == NodeKind::ArrayMutation)
            .expect("array mutation node");
        assert!(edges
            .iter()
            .any(|edge| edge.kind == EdgeKind::Modifies
                && edge.src == mutation.id
                && edge.dst == binding.id));
    }

    #[test]
    fn test_implements_and_interface_extends_edges() {
        let (nodes, edges) = build(
            "interface Base {}\ninterface Shape extends Base {}\nclass Circle implements Shape {}",
        );
        let base = nodes
            .iter()
            .find(|node| node.kind == NodeKind::Interface && node.name == "Base")
            .expect("Base interface");
        let shape = nodes
            .iter()
            .find(|node| node.kind == NodeKind::Interface && node.name == "Shape")
            .expect("Shape interface");
        let circle = nodes
            .iter()
            .find(|node| node.kind == NodeKind::Class)
            .expect("Circle class");
        assert!(edges
            .iter()
            .any(|edge| edge.kind == EdgeKind::Implements
                && edge.src == circle.id
                && edge.dst == shape.id));
        assert!(edges
            .iter()
            .any(|edge| edge.kind == EdgeKind::Extends
                && edge.src == shape.id
                && edge.dst == base.id));
    }

    #[test]
    fn test_resolves_to_edge_for_executor() {
        let (nodes, edges) = build("new Promise((ok, bad) => { ok(1); });");
        let promise = nodes
            .iter()
            .find(|node| node.kind == NodeKind::ConstructorCall)
            .expect("promise ctor");
        assert!(edges
            .iter()
            .any(|edge| edge.kind == EdgeKind::ResolvesTo && edge.dst == promise.id));
    }

    #[test]
    fn test_import_edges() {
        let (nodes, edges) = build("import { readFile } from \"node:fs\";");
        let import = nodes.iter().find(|node| node.kind == NodeKind::Import).expect("import");
        let external = nodes
            .iter()
            .find(|node| node.kind == NodeKind::ExternalModule)
            .expect("external module");
        assert!(edges
            .iter()
            .any(|edge| edge.kind == EdgeKind::ImportsFrom
                && edge.src == import.id
                && edge.dst == external.id));
    }
}
