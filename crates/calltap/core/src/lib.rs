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

//! Interception and advice dispatch core of the Calltap monitoring agent.
//!
//! For every instrumented call site (static method, instance method or
//! constructor) this crate decides how the registered interceptors are
//! invoked around the original call: entry/exit coordination with
//! exactly-once pairing, the per-call context that carries an interceptor's
//! skip decision from entry to exit, in-place argument and return-value
//! rewriting, deterministic ordering across multiple interceptors on one
//! call site, and per-defining-scope resolution of interceptor instances.
//!
//! Dispatch is synchronous and inline on the calling thread. The one rule
//! everything else follows from: failures of the instrumentation are
//! recovered locally and never surface to the instrumented program, while
//! failures of the instrumented program are observed by every interceptor
//! and then surfaced to its caller unchanged.
//!
//! The machinery that rewrites binaries to call into this crate, and the
//! discovery/loading of interceptor implementations, are external
//! collaborators: the former drives [`InterceptorChain`]'s split-phase
//! API, the latter implements [`InterceptorResolver`].

pub mod call;
pub mod dispatch;
pub mod enhance;
pub mod error;
pub mod interceptor;
pub mod resolver;

pub use call::descriptor::{CallDescriptor, CallKind};
pub use call::value::{Args, Value, ValueError};
pub use dispatch::chain::{ChainEnter, InterceptorBinding, InterceptorChain};
pub use enhance::{AttachmentSlot, InstrumentedInstance};
pub use error::{BoxError, BusinessError, InterceptError};
pub use interceptor::context::InterceptContext;
pub use interceptor::{
    ConstructorInterceptor, InstanceMethodInterceptor, StaticMethodInterceptor,
};
pub use resolver::registry::{InterceptorRegistry, RegistryResolver};
pub use resolver::{InterceptorResolver, ResolveError, ScopeId};
