// Copyright (C) 2025 Zhuo Zhang and Wuqi Zhang
// SPDX-License-Identifier: AGPL-3.0
//! Test utilities for integration tests

use std::io::Write;

use cpg_common::{test_utils::MemoryGraph, NodeFilter, NodeKind, NodeRecord};
use cpg_engine::{EngineConfig, ModuleInfo, ModuleTask, RunSummary, WorkerOrchestrator};
use tempfile::TempDir;

/// A workspace of source modules on disk plus a seeded in-memory graph.
pub struct Fixture {
    /// Holds the module files alive for the test.
    pub dir: TempDir,
    /// The graph store under test.
    pub graph: MemoryGraph,
    /// Modules written so far.
    pub modules: Vec<ModuleInfo>,
}

impl Fixture {
    /// Creates an empty fixture.
    pub fn new() -> Self {
        Self { dir: tempfile::tempdir().expect("tempdir"), graph: MemoryGraph::new(), modules: Vec::new() }
    }

    /// Writes a module file and seeds its MODULE node, the way the upstream
    /// indexer would.
    pub fn add_module(&mut self, name: &str, source: &str) -> ModuleInfo {
        let path = self.dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create module file");
        file.write_all(source.as_bytes()).expect("write module file");

        let module = ModuleInfo {
            id: format!("MODULE#{name}"),
            name: name.to_string(),
            file: path,
        };
        self.graph.seed_node(
            NodeRecord::new(&module.id, NodeKind::Module, name).with_file(name.to_string()),
        );
        self.modules.push(module.clone());
        module
    }

    /// Runs the orchestrator over all modules with the given config.
    pub async fn run_with(&self, config: EngineConfig) -> eyre::Result<RunSummary> {
        let orchestrator = WorkerOrchestrator::new(config);
        let tasks = self.modules.iter().cloned().map(ModuleTask::new).collect();
        Ok(orchestrator.run(tasks, &self.graph).await?)
    }

    /// Runs the orchestrator with the default config.
    pub async fn run(&self) -> eyre::Result<RunSummary> {
        self.run_with(EngineConfig::default()).await
    }

    /// All stored nodes of a kind.
    pub fn nodes_of(&self, kind: NodeKind) -> Vec<NodeRecord> {
        self.graph.nodes(&NodeFilter::by_kind(kind))
    }

    /// The single stored node of a kind, panicking otherwise.
    pub fn single_node(&self, kind: NodeKind) -> NodeRecord {
        let mut nodes = self.nodes_of(kind);
        assert_eq!(nodes.len(), 1, "expected exactly one {kind} node, got {}", nodes.len());
        nodes.pop().unwrap()
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}
