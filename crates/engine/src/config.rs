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

//! Engine configuration.
//!
//! The caller constructs this directly; loading it from files or the
//! environment is out of scope for the engine.

use serde::{Deserialize, Serialize};

/// How module analysis is scheduled across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerMode {
    /// A bounded set of cooperative workers on one runtime. The safe choice
    /// when the AST library must stay on one thread.
    #[default]
    Cooperative,
    /// Shared-nothing workers that return record buffers to the main thread.
    Parallel,
}

/// Configuration for an analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Scheduling mode.
    pub mode: WorkerMode,
    /// Worker count. Zero means one worker per available core.
    pub workers: usize,
    /// Re-analyze every module regardless of content hashes.
    pub force: bool,
    /// Defer graph index maintenance until all modules committed.
    pub defer_index_rebuild: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { mode: WorkerMode::default(), workers: 0, force: false, defer_index_rebuild: true }
    }
}

impl EngineConfig {
    /// Effective worker count.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        }
    }
}
