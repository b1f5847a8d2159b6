// Copyright (C) 2025 Zhuo Zhang and Wuqi Zhang
// SPDX-License-Identifier: AGPL-3.0
//! In-memory graph store used by unit and integration tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;

use crate::{
    BatchTags, EdgeRecord, GraphError, GraphStore, NodeFilter, NodeKind, NodeRecord,
};

#[derive(Debug, Default)]
struct PendingBatch {
    nodes: Vec<NodeRecord>,
    edges: Vec<EdgeRecord>,
}

#[derive(Debug, Default)]
struct MemoryGraphInner {
    nodes: BTreeMap<String, NodeRecord>,
    edges: Vec<EdgeRecord>,
    batch: Option<PendingBatch>,
    committed: Vec<BatchTags>,
    aborted: usize,
    index_rebuilds: usize,
    index_deferred: bool,
    /// When set, adding a node of this kind raises a data-quality error.
    reject_kind: Option<NodeKind>,
}

/// An in-memory [`GraphStore`].
///
/// Supports one active batch at a time, keeps a journal of committed batch
/// tags, and can inject data-quality failures for a chosen node kind.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    inner: Mutex<MemoryGraphInner>,
}

impl MemoryGraph {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `add_nodes` fail with [`GraphError::DataQuality`] whenever a
    /// node of `kind` is added.
    pub fn reject_kind(&self, kind: NodeKind) {
        self.inner.lock().reject_kind = Some(kind);
    }

    /// Seeds a node directly, bypassing the batch lifecycle. Used by tests to
    /// stand in for the upstream module indexer.
    pub fn seed_node(&self, record: NodeRecord) {
        self.inner.lock().nodes.insert(record.id.clone(), record);
    }

    /// Returns all stored nodes matching the filter.
    pub fn nodes(&self, filter: &NodeFilter) -> Vec<NodeRecord> {
        self.inner.lock().nodes.values().filter(|n| filter.matches(n)).cloned().collect()
    }

    /// Returns all stored edges.
    pub fn edges(&self) -> Vec<EdgeRecord> {
        self.inner.lock().edges.clone()
    }

    /// Returns the tags of committed batches, in commit order.
    pub fn committed_batches(&self) -> Vec<BatchTags> {
        self.inner.lock().committed.clone()
    }

    /// Returns how many batches were aborted.
    pub fn aborted_batches(&self) -> usize {
        self.inner.lock().aborted
    }

    /// Returns how many times indexes were rebuilt.
    pub fn index_rebuilds(&self) -> usize {
        self.inner.lock().index_rebuilds
    }

    /// Returns true when some committed batch deferred index maintenance and
    /// no rebuild has happened since.
    pub fn index_dirty(&self) -> bool {
        self.inner.lock().index_deferred
    }

    /// Total node count.
    pub fn node_count(&self) -> usize {
        self.inner.lock().nodes.len()
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn query_nodes(&self, filter: NodeFilter) -> Result<BoxStream<'_, NodeRecord>, GraphError> {
        let matches = self.nodes(&filter);
        Ok(stream::iter(matches).boxed())
    }

    async fn update_node(&self, record: NodeRecord) -> Result<(), GraphError> {
        let mut inner = self.inner.lock();
        if !inner.nodes.contains_key(&record.id) {
            return Err(GraphError::DataQuality(format!("update of unknown node {}", record.id)));
        }
        inner.nodes.insert(record.id.clone(), record);
        Ok(())
    }

    async fn add_nodes(&self, records: Vec<NodeRecord>) -> Result<(), GraphError> {
        let mut inner = self.inner.lock();
        if let Some(kind) = inner.reject_kind {
            if let Some(bad) = records.iter().find(|r| r.kind == kind) {
                return Err(GraphError::DataQuality(format!(
                    "injected rejection of {} node {}",
                    kind, bad.id
                )));
            }
        }
        match inner.batch.as_mut() {
            Some(batch) => batch.nodes.extend(records),
            None => {
                for record in records {
                    inner.nodes.insert(record.id.clone(), record);
                }
            }
        }
        Ok(())
    }

    async fn add_edges(&self, edges: Vec<EdgeRecord>) -> Result<(), GraphError> {
        let mut inner = self.inner.lock();
        match inner.batch.as_mut() {
            Some(batch) => batch.edges.extend(edges),
            None => inner.edges.extend(edges),
        }
        Ok(())
    }

    async fn begin_batch(&self) -> Result<(), GraphError> {
        let mut inner = self.inner.lock();
        if inner.batch.is_some() {
            return Err(GraphError::Fatal("a batch is already active".to_string()));
        }
        inner.batch = Some(PendingBatch::default());
        Ok(())
    }

    async fn commit_batch(
        &self,
        tags: BatchTags,
        defer_index: bool,
        _pinned_types: &[NodeKind],
    ) -> Result<(), GraphError> {
        let mut inner = self.inner.lock();
        let batch =
            inner.batch.take().ok_or_else(|| GraphError::Fatal("no active batch".to_string()))?;
        for record in batch.nodes {
            inner.nodes.insert(record.id.clone(), record);
        }
        inner.edges.extend(batch.edges);
        inner.committed.push(tags);
        if defer_index {
            inner.index_deferred = true;
        }
        Ok(())
    }

    async fn abort_batch(&self) -> Result<(), GraphError> {
        let mut inner = self.inner.lock();
        if inner.batch.take().is_none() {
            return Err(GraphError::Fatal("no active batch".to_string()));
        }
        inner.aborted += 1;
        Ok(())
    }

    async fn rebuild_indexes(&self) -> Result<(), GraphError> {
        let mut inner = self.inner.lock();
        inner.index_rebuilds += 1;
        inner.index_deferred = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_batch_commit_and_abort() {
        let graph = MemoryGraph::new();
        graph.begin_batch().await.unwrap();
        graph
            .add_nodes(vec![NodeRecord::new("VARIABLE#x#a.ts", NodeKind::Variable, "x")])
            .await
            .unwrap();
        // Nothing visible before commit.
        assert_eq!(graph.node_count(), 0);
        graph.commit_batch(BatchTags::analysis("a.ts"), false, &[]).await.unwrap();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.committed_batches().len(), 1);

        graph.begin_batch().await.unwrap();
        graph
            .add_nodes(vec![NodeRecord::new("VARIABLE#y#a.ts", NodeKind::Variable, "y")])
            .await
            .unwrap();
        graph.abort_batch().await.unwrap();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.aborted_batches(), 1);
    }

    #[tokio::test]
    async fn test_data_quality_injection() {
        let graph = MemoryGraph::new();
        graph.reject_kind(NodeKind::Scope);
        let err = graph
            .add_nodes(vec![NodeRecord::new("SCOPE#s#a.ts", NodeKind::Scope, "s")])
            .await
            .unwrap_err();
        assert!(err.is_data_quality());
    }

    #[tokio::test]
    async fn test_deferred_index_rebuild() {
        let graph = MemoryGraph::new();
        graph.begin_batch().await.unwrap();
        graph.commit_batch(BatchTags::analysis("a.ts"), true, &[]).await.unwrap();
        assert!(graph.index_dirty());
        graph.rebuild_indexes().await.unwrap();
        assert!(!graph.index_dirty());
        assert_eq!(graph.index_rebuilds(), 1);
    }
}
