// Copyright (C) 2025 Zhuo Zhang and Wuqi Zhang
// SPDX-License-Identifier: AGPL-3.0
//! The graph backend interface consumed by the analyzer.
//!
//! The analyzer never talks to a concrete store. It emits [`NodeRecord`] and
//! [`EdgeRecord`] buffers and drives the batch lifecycle through the
//! [`GraphStore`] trait; persistence, indexing, and cross-module resolution
//! are the backend's concern.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{EdgeKind, NodeKind};

/// A node as handed to the graph backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Unique identifier within the module after collision resolution.
    pub id: String,
    /// Node type.
    pub kind: NodeKind,
    /// Human-readable name (may be a sentinel such as `<anonymous>`).
    pub name: String,
    /// Project-relative file path, when the node is anchored to a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Kind-specific attributes.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attrs: Map<String, Value>,
}

impl NodeRecord {
    /// Creates a record with empty attributes.
    pub fn new(id: impl Into<String>, kind: NodeKind, name: impl Into<String>) -> Self {
        Self { id: id.into(), kind, name: name.into(), file: None, attrs: Map::new() }
    }

    /// Sets the file anchor.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Inserts an attribute.
    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    /// Reads an attribute.
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }
}

/// An edge as handed to the graph backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Edge type.
    pub kind: EdgeKind,
    /// Source node id.
    pub src: String,
    /// Destination node id.
    pub dst: String,
    /// Kind-specific attributes.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attrs: Map<String, Value>,
}

impl EdgeRecord {
    /// Creates an edge with empty attributes.
    pub fn new(kind: EdgeKind, src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self { kind, src: src.into(), dst: dst.into(), attrs: Map::new() }
    }

    /// Inserts an attribute.
    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }
}

/// Filter for [`GraphStore::query_nodes`]. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeFilter {
    /// Match a specific node id.
    pub id: Option<String>,
    /// Match a node kind.
    pub kind: Option<NodeKind>,
    /// Match the file anchor.
    pub file: Option<String>,
}

impl NodeFilter {
    /// Filter by id.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()), ..Self::default() }
    }

    /// Filter by kind.
    pub fn by_kind(kind: NodeKind) -> Self {
        Self { kind: Some(kind), ..Self::default() }
    }

    /// Filter by kind within one file.
    pub fn by_kind_in_file(kind: NodeKind, file: impl Into<String>) -> Self {
        Self { kind: Some(kind), file: Some(file.into()), ..Self::default() }
    }

    /// Returns true when the record matches this filter.
    pub fn matches(&self, record: &NodeRecord) -> bool {
        self.id.as_ref().is_none_or(|id| *id == record.id)
            && self.kind.is_none_or(|kind| kind == record.kind)
            && self.file.as_ref().is_none_or(|file| record.file.as_deref() == Some(file.as_str()))
    }
}

/// Provenance tags attached to a committed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTags {
    /// The plugin that produced the batch.
    pub plugin: String,
    /// The processing phase.
    pub phase: String,
    /// The file the batch belongs to.
    pub file: String,
}

impl BatchTags {
    /// Standard provenance for a per-module analysis batch.
    pub fn analysis(file: impl Into<String>) -> Self {
        Self { plugin: "JSASTAnalyzer".to_string(), phase: "ANALYSIS".to_string(), file: file.into() }
    }
}

/// Failure kinds raised by a graph backend.
///
/// `Transient` failures may be retried by the caller. `DataQuality` failures
/// indicate a schema or invariant violation in the emitted records and are
/// propagated, halting the run. `Fatal` failures abort the current module.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The backend is temporarily unavailable; the caller may retry.
    #[error("transient graph failure: {0}")]
    Transient(String),
    /// The emitted records violate the backend schema or an invariant.
    #[error("graph data-quality violation: {0}")]
    DataQuality(String),
    /// The backend failed irrecoverably for this module.
    #[error("fatal graph failure: {0}")]
    Fatal(String),
}

impl GraphError {
    /// Returns true for data-quality violations.
    pub fn is_data_quality(&self) -> bool {
        matches!(self, Self::DataQuality(_))
    }
}

/// A node/edge store with batch commit.
///
/// The store must make the `begin/commit/abort` sequence safe for concurrent
/// callers, with at most one active batch per caller. All operations may
/// suspend.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Streams nodes matching the filter.
    async fn query_nodes(&self, filter: NodeFilter) -> Result<BoxStream<'_, NodeRecord>, GraphError>;

    /// Replaces the stored record with the same id.
    async fn update_node(&self, record: NodeRecord) -> Result<(), GraphError>;

    /// Buffers nodes into the active batch (or the store directly when no
    /// batch is active).
    async fn add_nodes(&self, records: Vec<NodeRecord>) -> Result<(), GraphError>;

    /// Buffers edges into the active batch.
    async fn add_edges(&self, edges: Vec<EdgeRecord>) -> Result<(), GraphError>;

    /// Opens a batch for this caller.
    async fn begin_batch(&self) -> Result<(), GraphError>;

    /// Commits the active batch. `defer_index` postpones index maintenance
    /// until [`GraphStore::rebuild_indexes`]; `pinned_types` lists node kinds
    /// whose indexes must stay fresh regardless.
    async fn commit_batch(
        &self,
        tags: BatchTags,
        defer_index: bool,
        pinned_types: &[NodeKind],
    ) -> Result<(), GraphError>;

    /// Drops the active batch.
    async fn abort_batch(&self) -> Result<(), GraphError>;

    /// Rebuilds any indexes whose maintenance was deferred.
    async fn rebuild_indexes(&self) -> Result<(), GraphError>;

    /// Convenience lookup of a single node by id.
    async fn node_by_id(&self, id: &str) -> Result<Option<NodeRecord>, GraphError> {
        use futures::StreamExt;
        let mut stream = self.query_nodes(NodeFilter::by_id(id)).await?;
        Ok(stream.next().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches_kind_and_file() {
        let node = NodeRecord::new("FUNCTION#f#a.ts", NodeKind::Function, "f").with_file("a.ts");
        assert!(NodeFilter::by_kind(NodeKind::Function).matches(&node));
        assert!(NodeFilter::by_kind_in_file(NodeKind::Function, "a.ts").matches(&node));
        assert!(!NodeFilter::by_kind_in_file(NodeKind::Function, "b.ts").matches(&node));
        assert!(!NodeFilter::by_kind(NodeKind::Class).matches(&node));
    }

    #[test]
    fn test_analysis_tags() {
        let tags = BatchTags::analysis("src/a.ts");
        assert_eq!(tags.plugin, "JSASTAnalyzer");
        assert_eq!(tags.phase, "ANALYSIS");
        assert_eq!(tags.file, "src/a.ts");
    }
}
