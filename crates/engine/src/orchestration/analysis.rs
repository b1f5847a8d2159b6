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

//! Orchestration of the analysis phase.
//!
//! Module analysis is embarrassingly parallel across files. Two modes are
//! offered: a cooperative pool that drains a priority queue on the runtime
//! (the safe choice when the parser must stay on one thread), and a
//! true-parallel pool where shared-nothing rayon workers parse and traverse,
//! handing record buffers back to the main thread for lowering and commit.
//! Each module commits in its own batch with analysis provenance tags; a
//! failed module aborts only its own batch.

use std::{cmp::Ordering, collections::BinaryHeap, time::Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    analysis::{AnalysisError, GraphWriter, JsAstAnalyzer, ModuleInfo},
    config::{EngineConfig, WorkerMode},
};
use cpg_common::{BatchTags, GraphStore};

/// Interval between time-based progress reports.
const PROGRESS_INTERVAL_MS: u128 = 500;
/// Completions between count-based progress reports.
const PROGRESS_EVERY: usize = 10;

/// One unit of work for the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTask {
    /// The module to analyze.
    pub module: ModuleInfo,
    /// Higher runs earlier.
    pub priority: u32,
}

impl ModuleTask {
    /// Creates a task with default priority.
    pub fn new(module: ModuleInfo) -> Self {
        Self { module, priority: 0 }
    }
}

impl Ord for ModuleTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on priority; module name breaks ties so drain order is
        // deterministic.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.module.name.cmp(&self.module.name))
    }
}

impl PartialOrd for ModuleTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Counters for one orchestrated run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Modules analyzed and committed.
    pub analyzed: usize,
    /// Modules skipped by the hash gate.
    pub skipped: usize,
    /// Modules that failed and were aborted.
    pub failed: usize,
    /// Total nodes handed to the store.
    pub nodes: usize,
    /// Total edges handed to the store.
    pub edges: usize,
}

/// Skips re-analysis when the stored content hash matches and prior FUNCTION
/// nodes exist for the file.
#[derive(Debug)]
pub struct HashGate {
    force: bool,
}

impl HashGate {
    /// Creates a gate; `force` admits everything.
    pub fn new(force: bool) -> Self {
        Self { force }
    }

    /// Returns true when the module should be analyzed.
    pub async fn admits(
        &self,
        analyzer: &JsAstAnalyzer,
        module: &ModuleInfo,
        graph: &dyn GraphStore,
    ) -> Result<bool, AnalysisError> {
        analyzer.should_analyze(module, graph, self.force).await
    }
}

/// Schedules module analysis over the configured worker pool.
#[derive(Debug, Default)]
pub struct WorkerOrchestrator {
    config: EngineConfig,
    analyzer: JsAstAnalyzer,
}

impl WorkerOrchestrator {
    /// Creates an orchestrator.
    pub fn new(config: EngineConfig) -> Self {
        Self { config, analyzer: JsAstAnalyzer::new() }
    }

    /// Runs analysis for all tasks. Per-module failures are logged and
    /// skipped; graph data-quality errors halt the run.
    pub async fn run(
        &self,
        tasks: Vec<ModuleTask>,
        graph: &dyn GraphStore,
    ) -> Result<RunSummary, AnalysisError> {
        let total = tasks.len();
        info!(modules = total, mode = ?self.config.mode, "starting analysis run");

        let summary = match self.config.mode {
            WorkerMode::Cooperative => self.run_cooperative(tasks, graph).await?,
            WorkerMode::Parallel => self.run_parallel(tasks, graph).await?,
        };

        if self.config.defer_index_rebuild && summary.analyzed > 0 {
            debug!("rebuilding deferred graph indexes");
            graph.rebuild_indexes().await?;
        }

        info!(
            analyzed = summary.analyzed,
            skipped = summary.skipped,
            failed = summary.failed,
            nodes = summary.nodes,
            edges = summary.edges,
            "analysis run finished"
        );
        Ok(summary)
    }

    /// Cooperative mode: one worker set drains the priority queue in order,
    /// each module inside its own batch.
    async fn run_cooperative(
        &self,
        tasks: Vec<ModuleTask>,
        graph: &dyn GraphStore,
    ) -> Result<RunSummary, AnalysisError> {
        let gate = HashGate::new(self.config.force);
        let mut queue: BinaryHeap<ModuleTask> = tasks.into_iter().collect();
        let total = queue.len();
        let mut summary = RunSummary::default();
        let mut progress = ProgressReporter::new(total);

        while let Some(task) = queue.pop() {
            let module = &task.module;
            match gate.admits(&self.analyzer, module, graph).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(module = %module.name, "unchanged, skipping");
                    summary.skipped += 1;
                    progress.tick(&summary);
                    continue;
                }
                Err(error) if error.is_data_quality() => return Err(error),
                Err(error) => {
                    warn!(module = %module.name, %error, "hash gate failed, skipping module");
                    summary.failed += 1;
                    progress.tick(&summary);
                    continue;
                }
            }

            graph.begin_batch().await?;
            match self.analyzer.analyze(module, graph).await {
                Ok((nodes, edges)) => {
                    graph
                        .commit_batch(
                            BatchTags::analysis(&module.name),
                            self.config.defer_index_rebuild,
                            &[],
                        )
                        .await?;
                    summary.analyzed += 1;
                    summary.nodes += nodes;
                    summary.edges += edges;
                }
                Err(error) if error.is_data_quality() => {
                    let _ = graph.abort_batch().await;
                    return Err(error);
                }
                Err(error) => {
                    warn!(module = %module.name, %error, "module analysis failed, aborting batch");
                    graph.abort_batch().await?;
                    summary.failed += 1;
                }
            }
            progress.tick(&summary);
        }

        Ok(summary)
    }

    /// True-parallel mode: rayon workers parse and traverse, the main thread
    /// lowers and commits each returned buffer.
    async fn run_parallel(
        &self,
        tasks: Vec<ModuleTask>,
        graph: &dyn GraphStore,
    ) -> Result<RunSummary, AnalysisError> {
        let gate = HashGate::new(self.config.force);
        let mut summary = RunSummary::default();

        // Gate sequentially; the gate reads the graph, the workers must not.
        let mut queue: BinaryHeap<ModuleTask> = tasks.into_iter().collect();
        let mut admitted = Vec::new();
        while let Some(task) = queue.pop() {
            match gate.admits(&self.analyzer, &task.module, graph).await {
                Ok(true) => admitted.push(task.module),
                Ok(false) => summary.skipped += 1,
                Err(error) if error.is_data_quality() => return Err(error),
                Err(error) => {
                    warn!(module = %task.module.name, %error, "hash gate failed, skipping module");
                    summary.failed += 1;
                }
            }
        }

        let workers = self.config.effective_workers();
        debug!(modules = admitted.len(), workers, "dispatching to parallel workers");
        let results = tokio::task::spawn_blocking(move || {
            admitted
                .into_par_iter()
                .map(|module| {
                    let analyzer = JsAstAnalyzer::new();
                    let records = std::fs::read_to_string(&module.file)
                        .map_err(AnalysisError::from)
                        .and_then(|source| analyzer.collect_records(&module, &source));
                    (module, records)
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|join_error| AnalysisError::Other(eyre::eyre!("worker pool failed: {join_error}")))?;

        let mut progress = ProgressReporter::new(results.len());
        for (module, result) in results {
            let records = match result {
                Ok(records) => records,
                Err(error) => {
                    warn!(module = %module.name, %error, "module analysis failed");
                    summary.failed += 1;
                    progress.tick(&summary);
                    continue;
                }
            };
            let (nodes, edges) = GraphWriter::build(&records);

            graph.begin_batch().await?;
            let outcome = async {
                graph.add_nodes(nodes.clone()).await?;
                graph.add_edges(edges.clone()).await?;
                graph
                    .commit_batch(
                        BatchTags::analysis(&module.name),
                        self.config.defer_index_rebuild,
                        &[],
                    )
                    .await
            }
            .await;
            match outcome {
                Ok(()) => {
                    self.analyzer.apply_module_flags(&module, &records, graph).await?;
                    summary.analyzed += 1;
                    summary.nodes += nodes.len();
                    summary.edges += edges.len();
                }
                Err(error) if error.is_data_quality() => {
                    let _ = graph.abort_batch().await;
                    return Err(error.into());
                }
                Err(error) => {
                    warn!(module = %module.name, %error, "commit failed, aborting batch");
                    graph.abort_batch().await?;
                    summary.failed += 1;
                }
            }
            progress.tick(&summary);
        }

        Ok(summary)
    }
}

/// Time-based (~2 Hz) and count-based (every 10 completions) progress logs.
struct ProgressReporter {
    total: usize,
    completed: usize,
    last_report: Instant,
}

impl ProgressReporter {
    fn new(total: usize) -> Self {
        Self { total, completed: 0, last_report: Instant::now() }
    }

    fn tick(&mut self, summary: &RunSummary) {
        self.completed += 1;
        let by_count = self.completed % PROGRESS_EVERY == 0;
        let by_time = self.last_report.elapsed().as_millis() >= PROGRESS_INTERVAL_MS;
        if by_count || by_time {
            self.last_report = Instant::now();
            info!(
                completed = self.completed,
                total = self.total,
                analyzed = summary.analyzed,
                skipped = summary.skipped,
                failed = summary.failed,
                "analysis progress"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpg_common::{test_utils::MemoryGraph, NodeKind, NodeRecord};
    use std::io::Write;

    fn write_module(dir: &tempfile::TempDir, name: &str, source: &str) -> ModuleInfo {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(source.as_bytes()).unwrap();
        ModuleInfo {
            id: format!("MODULE#{name}"),
            name: name.to_string(),
            file: path,
        }
    }

    fn seed_module_node(graph: &MemoryGraph, module: &ModuleInfo, hash: Option<&str>) {
        let mut node = NodeRecord::new(&module.id, NodeKind::Module, &module.name)
            .with_file(module.name.clone());
        if let Some(hash) = hash {
            node = node.with_attr("contentHash", hash.to_string());
        }
        graph.seed_node(node);
    }

    #[tokio::test]
    async fn test_cooperative_run_commits_per_module() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_module(&dir, "a.ts", "export function a(){}");
        let second = write_module(&dir, "b.ts", "export function b(){}");
        let graph = MemoryGraph::new();
        seed_module_node(&graph, &first, None);
        seed_module_node(&graph, &second, None);

        let orchestrator = WorkerOrchestrator::new(EngineConfig::default());
        let summary = orchestrator
            .run(vec![ModuleTask::new(first), ModuleTask::new(second)], &graph)
            .await
            .unwrap();

        assert_eq!(summary.analyzed, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(graph.committed_batches().len(), 2);
        assert_eq!(graph.committed_batches()[0].plugin, "JSASTAnalyzer");
        // Deferred rebuild ran exactly once at the end.
        assert_eq!(graph.index_rebuilds(), 1);
        assert!(!graph.index_dirty());
    }

    #[tokio::test]
    async fn test_parse_failure_aborts_only_that_module() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_module(&dir, "good.ts", "export const ok = 1;");
        let bad = write_module(&dir, "bad.ts", "function (((");
        let graph = MemoryGraph::new();
        seed_module_node(&graph, &good, None);
        seed_module_node(&graph, &bad, None);

        let orchestrator = WorkerOrchestrator::new(EngineConfig::default());
        let summary = orchestrator
            .run(vec![ModuleTask::new(good), ModuleTask::new(bad)], &graph)
            .await
            .unwrap();

        assert_eq!(summary.analyzed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(graph.aborted_batches(), 1);
        assert_eq!(graph.committed_batches().len(), 1);
    }

    #[tokio::test]
    async fn test_parallel_mode_produces_same_results() {
        let dir = tempfile::tempdir().unwrap();
        let module = write_module(&dir, "m.ts", "export function go(){ return 1; }");
        let graph = MemoryGraph::new();
        seed_module_node(&graph, &module, None);

        let config = EngineConfig { mode: WorkerMode::Parallel, ..EngineConfig::default() };
        let orchestrator = WorkerOrchestrator::new(config);
        let summary = orchestrator.run(vec![ModuleTask::new(module)], &graph).await.unwrap();

        assert_eq!(summary.analyzed, 1);
        assert!(summary.nodes > 0);
        assert!(graph
            .nodes(&cpg_common::NodeFilter::by_kind(NodeKind::Function))
            .iter()
            .any(|node| node.name == "go"));
    }

    #[tokio::test]
    async fn test_hash_gate_skips_unchanged_modules() {
        let dir = tempfile::tempdir().unwrap();
        let module = write_module(&dir, "m.ts", "export function go(){}");
        let graph = MemoryGraph::new();
        seed_module_node(&graph, &module, None);

        let orchestrator = WorkerOrchestrator::new(EngineConfig::default());
        let summary =
            orchestrator.run(vec![ModuleTask::new(module.clone())], &graph).await.unwrap();
        assert_eq!(summary.analyzed, 1);
        let nodes_after_first = graph.node_count();

        // Store the hash the gate expects, then re-run: nothing new.
        let source = std::fs::read(&module.file).unwrap();
        let mut node = graph
            .nodes(&cpg_common::NodeFilter::by_id(&module.id))
            .pop()
            .unwrap();
        node.attrs.insert(
            "contentHash".to_string(),
            crate::analysis::content_hash(&source).into(),
        );
        graph.seed_node(node);

        let summary =
            orchestrator.run(vec![ModuleTask::new(module.clone())], &graph).await.unwrap();
        assert_eq!(summary.analyzed, 0);
        assert_eq!(summary.skipped, 1);
        assert_eq!(graph.node_count(), nodes_after_first);

        // A forced run analyzes again.
        let config = EngineConfig { force: true, ..EngineConfig::default() };
        let orchestrator = WorkerOrchestrator::new(config);
        let summary = orchestrator.run(vec![ModuleTask::new(module)], &graph).await.unwrap();
        assert_eq!(summary.analyzed, 1);
    }

    #[tokio::test]
    async fn test_data_quality_error_halts_run() {
        let dir = tempfile::tempdir().unwrap();
        let module = write_module(&dir, "m.ts", "export function go(){}");
        let graph = MemoryGraph::new();
        seed_module_node(&graph, &module, None);
        graph.reject_kind(NodeKind::Function);

        let orchestrator = WorkerOrchestrator::new(EngineConfig::default());
        let result = orchestrator.run(vec![ModuleTask::new(module)], &graph).await;
        assert!(matches!(result, Err(error) if error.is_data_quality()));
    }

    #[test]
    fn test_task_ordering_is_priority_then_name() {
        let dir = tempfile::tempdir().unwrap();
        let a = ModuleTask { module: write_module(&dir, "a.ts", ""), priority: 1 };
        let b = ModuleTask { module: write_module(&dir, "b.ts", ""), priority: 2 };
        let c = ModuleTask { module: write_module(&dir, "c.ts", ""), priority: 1 };
        let mut heap = BinaryHeap::from([a.clone(), b.clone(), c.clone()]);
        assert_eq!(heap.pop().unwrap().module.name, "b.ts");
        assert_eq!(heap.pop().unwrap().module.name, "a.ts");
        assert_eq!(heap.pop().unwrap().module.name, "c.ts");
    }
}
