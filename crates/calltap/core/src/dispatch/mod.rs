// Calltap
// Copyright (C) 2025 Calltap

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Entry/exit dispatch around instrumented calls.
//!
//! [`chain::InterceptorChain`] is the public surface: it coordinates the
//! ordered interceptor bindings of one call site, either split-phase
//! (`enter_*` / `exit_*`, for a caller that owns the call boundary itself)
//! or closure-driven (`dispatch_*`, which also runs the body and rethrows
//! business errors after exit dispatch).

pub mod chain;
pub(crate) mod entry;
pub(crate) mod exit;

pub use chain::{ChainEnter, InterceptorBinding, InterceptorChain};
