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

//! Stable identifier generation and post-traversal collision resolution.
//!
//! Semantic ids are built from the lexical scope path instead of the file
//! position, so they survive edits that shift lines without changing
//! structure. Two sibling items with the same name in the same scope collide;
//! the [`CollisionResolver`] disambiguates them after traversal by appending
//! a per-scope discriminator, rewriting the record's id slot through its
//! handle.

use std::collections::HashMap;

use crate::analysis::{ModuleRecords, RecordHandle};
use cpg_common::NodeKind;

/// One id registration: a record handle plus the id it asked for.
#[derive(Debug, Clone)]
pub struct Registration {
    /// The id as generated during traversal.
    pub id: String,
    /// The registered record.
    pub handle: RecordHandle,
    /// Scope path at registration time (diagnostics only).
    pub scope_path: String,
}

/// Produces identifiers and keeps the registration table for collision
/// resolution. One generator per module.
#[derive(Debug)]
pub struct IdGenerator {
    file: String,
    registrations: Vec<Registration>,
    legacy_counter: usize,
}

impl IdGenerator {
    /// Creates a generator for one module file.
    pub fn new(file: &str) -> Self {
        Self { file: file.to_string(), registrations: Vec::new(), legacy_counter: 0 }
    }

    /// Semantic id: `KIND#name#scopePath`.
    pub fn semantic(&self, kind: NodeKind, name: &str, scope_path: &str) -> String {
        format!("{}#{name}#{scope_path}", kind.as_str())
    }

    /// Legacy id: `KIND#name#file#line:column:counter`. Only used when no
    /// scope context exists.
    pub fn legacy(&mut self, kind: NodeKind, name: &str, line: usize, column: usize) -> String {
        self.legacy_counter += 1;
        format!("{}#{name}#{}#{line}:{column}:{}", kind.as_str(), self.file, self.legacy_counter)
    }

    /// Expression id: `<file>:EXPRESSION:<astKind>:<line>:<column>`.
    pub fn expression(&self, ast_kind: &str, line: usize, column: usize) -> String {
        format!("{}:EXPRESSION:{ast_kind}:{line}:{column}", self.file)
    }

    /// Constructor-call id: `<file>:CONSTRUCTOR_CALL:<className>:<line>:<column>`.
    pub fn constructor_call(&self, class_name: &str, line: usize, column: usize) -> String {
        format!("{}:CONSTRUCTOR_CALL:{class_name}:{line}:{column}", self.file)
    }

    /// Coordinate id for value anchors: `<file>:<KIND>:<line>:<column>`.
    pub fn coordinate(&self, kind: NodeKind, line: usize, column: usize) -> String {
        format!("{}:{}:{line}:{column}", self.file, kind.as_str())
    }

    /// Registers a record's id slot for collision resolution.
    pub fn register(&mut self, id: &str, handle: RecordHandle, scope_path: &str) {
        self.registrations.push(Registration {
            id: id.to_string(),
            handle,
            scope_path: scope_path.to_string(),
        });
    }

    /// Number of registrations so far.
    pub fn registered(&self) -> usize {
        self.registrations.len()
    }

    /// Consumes the generator, yielding the registration table.
    pub fn into_registrations(self) -> Vec<Registration> {
        self.registrations
    }
}

/// Post-traversal pass disambiguating identical ids.
///
/// The first registration of an id keeps it; every later one gets a
/// discriminator appended (`id#2`, `id#3`, ...). The rewrite goes through the
/// record handle, which also patches call-argument references to renamed
/// calls. Running the resolver on already-resolved buffers finds no
/// collisions and changes nothing.
#[derive(Debug)]
pub struct CollisionResolver;

impl CollisionResolver {
    /// Resolves collisions in place. Returns the pre/post table of rewritten
    /// ids (old id, new id).
    pub fn resolve(
        records: &mut ModuleRecords,
        registrations: &[Registration],
    ) -> Vec<(String, String)> {
        let mut occupied: HashMap<String, usize> = HashMap::new();
        let mut remapped = Vec::new();

        for registration in registrations {
            let count = occupied.entry(registration.id.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                continue;
            }

            // Later sibling with the same id: append the per-scope
            // discriminator, skipping over ids another record already holds.
            let mut discriminator = *count;
            let new_id = loop {
                let candidate = format!("{}#{discriminator}", registration.id);
                if !occupied.contains_key(&candidate) {
                    break candidate;
                }
                discriminator += 1;
            };
            occupied.insert(new_id.clone(), 1);
            records.rewrite_id(registration.handle, new_id.clone());
            remapped.push((registration.id.clone(), new_id));
        }

        remapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{BufferKind, ControlFlowSummary, FunctionRecord, SourceLoc};

    fn function_record(id: &str, line: usize) -> FunctionRecord {
        FunctionRecord {
            id: id.to_string(),
            name: "handle".to_string(),
            loc: SourceLoc::new(line, 0),
            is_async: false,
            is_generator: false,
            is_arrow: false,
            is_method: false,
            is_assignment: false,
            is_callback: false,
            class_name: None,
            parent_scope_id: "MODULE#a.ts".to_string(),
            control_flow: ControlFlowSummary::default(),
            invoked_param_indexes: Vec::new(),
        }
    }

    #[test]
    fn test_id_formats() {
        let mut ids = IdGenerator::new("src/a.ts");
        assert_eq!(ids.semantic(NodeKind::Function, "f", "a.ts->g"), "FUNCTION#f#a.ts->g");
        assert_eq!(ids.legacy(NodeKind::Variable, "x", 3, 7), "VARIABLE#x#src/a.ts#3:7:1");
        assert_eq!(ids.legacy(NodeKind::Variable, "x", 3, 7), "VARIABLE#x#src/a.ts#3:7:2");
        assert_eq!(ids.expression("MemberExpression", 4, 2), "src/a.ts:EXPRESSION:MemberExpression:4:2");
        assert_eq!(ids.constructor_call("E", 9, 12), "src/a.ts:CONSTRUCTOR_CALL:E:9:12");
    }

    #[test]
    fn test_collision_appends_discriminator_to_later_record() {
        let mut records = ModuleRecords::new("MODULE#a.ts", "a.ts");
        let id = "FUNCTION#handle#a.ts";
        records.functions.push(function_record(id, 1));
        records.functions.push(function_record(id, 5));

        let mut ids = IdGenerator::new("a.ts");
        ids.register(id, RecordHandle { buffer: BufferKind::Function, index: 0 }, "a.ts");
        ids.register(id, RecordHandle { buffer: BufferKind::Function, index: 1 }, "a.ts");

        let registrations = ids.into_registrations();
        let remapped = CollisionResolver::resolve(&mut records, &registrations);

        assert_eq!(records.functions[0].id, "FUNCTION#handle#a.ts");
        assert_eq!(records.functions[1].id, "FUNCTION#handle#a.ts#2");
        assert_eq!(remapped, vec![(id.to_string(), "FUNCTION#handle#a.ts#2".to_string())]);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut records = ModuleRecords::new("MODULE#a.ts", "a.ts");
        let id = "FUNCTION#handle#a.ts";
        records.functions.push(function_record(id, 1));
        records.functions.push(function_record(id, 5));

        let mut ids = IdGenerator::new("a.ts");
        ids.register(id, RecordHandle { buffer: BufferKind::Function, index: 0 }, "a.ts");
        ids.register(id, RecordHandle { buffer: BufferKind::Function, index: 1 }, "a.ts");
        let registrations = ids.into_registrations();
        CollisionResolver::resolve(&mut records, &registrations);

        // A second pass registers the now-distinct ids and must not touch them.
        let mut second = IdGenerator::new("a.ts");
        second.register(
            &records.functions[0].id.clone(),
            RecordHandle { buffer: BufferKind::Function, index: 0 },
            "a.ts",
        );
        second.register(
            &records.functions[1].id.clone(),
            RecordHandle { buffer: BufferKind::Function, index: 1 },
            "a.ts",
        );
        let registrations = second.into_registrations();
        let remapped = CollisionResolver::resolve(&mut records, &registrations);
        assert!(remapped.is_empty());
        assert_eq!(records.functions[1].id, "FUNCTION#handle#a.ts#2");
    }

    #[test]
    fn test_triple_collision_counts_upward() {
        let mut records = ModuleRecords::new("MODULE#a.ts", "a.ts");
        let id = "FUNCTION#handle#a.ts";
        for line in [1, 5, 9] {
            records.functions.push(function_record(id, line));
        }
        let mut ids = IdGenerator::new("a.ts");
        for index in 0..3 {
            ids.register(id, RecordHandle { buffer: BufferKind::Function, index }, "a.ts");
        }
        let registrations = ids.into_registrations();
        CollisionResolver::resolve(&mut records, &registrations);
        assert_eq!(records.functions[0].id, "FUNCTION#handle#a.ts");
        assert_eq!(records.functions[1].id, "FUNCTION#handle#a.ts#2");
        assert_eq!(records.functions[2].id, "FUNCTION#handle#a.ts#3");
    }
}
