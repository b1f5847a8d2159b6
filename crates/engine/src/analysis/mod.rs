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

mod analyzer;
pub use analyzer::*;

pub(crate) mod body;

pub(crate) mod classify;
pub use classify::{ValueSource, COMPLEX, COMPUTED};

mod destructure;

mod ids;
pub use ids::*;

mod module_items;

mod mutation;

mod patterns;
pub use patterns::*;

mod records;
pub use records::*;

mod scope;
pub use scope::*;

pub mod trace;
pub use trace::{trace_error_class, TraceOutcome};

mod writer;
pub use writer::*;

mod log {
    pub(crate) const LOG_TARGET: &str = "analysis";

    macro_rules! debug {
        ($($arg:tt)*) => {
            tracing::debug!(target: LOG_TARGET, $($arg)*)
        };
    }

    macro_rules! trace {
        ($($arg:tt)*) => {
            tracing::trace!(target: LOG_TARGET, $($arg)*)
        };
    }

    pub(crate) use debug;
    pub(crate) use trace;
}
