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

//! Error taxonomy of the dispatch core.
//!
//! Two kinds of failure flow through a dispatch and they are never allowed
//! to mix:
//!
//! - an [`InterceptError`] is a failure of an interceptor hook. It is
//!   recovered inside the dispatcher (logged, counted, state rolled back to
//!   the last known-good value) and never reaches the caller of the
//!   instrumented code.
//! - a [`BusinessError`] is a failure of the instrumented code itself. It is
//!   observed by every interceptor in the chain and then surfaced to the
//!   caller unchanged.
//!
//! Typed errors of the support machinery ([`ResolveError`], [`ValueError`])
//! live next to the modules that produce them.

/// Boxed error type used at the dispatch boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure raised by an interceptor hook.
///
/// Always recovered locally by the dispatcher; an interceptor cannot break
/// the call it observes.
pub type InterceptError = BoxError;

/// Failure raised by the instrumented call's own body.
///
/// Routed through `on_error` of every chain entry and then rethrown to the
/// caller unchanged.
pub type BusinessError = BoxError;
