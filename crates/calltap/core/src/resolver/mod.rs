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

//! Interceptor resolution.
//!
//! The dispatchers never link against interceptor implementations; they ask
//! an [`InterceptorResolver`] for the instance bound to a
//! `(name, defining scope)` pair at dispatch time. Resolution failures are
//! tolerated: the dispatcher logs them and runs the call with a no-op slot.
//!
//! [`registry::RegistryResolver`] is the standard implementation, backed by
//! factories and a concurrent memo cache.

pub mod registry;

pub use registry::RegistryResolver;

use crate::error::BoxError;
use crate::interceptor::{
    ConstructorInterceptor, InstanceMethodInterceptor, StaticMethodInterceptor,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Opaque identity of a defining scope (module, loader, plugin sandbox).
///
/// The same interceptor name resolves to distinct instances under distinct
/// scopes; a cache keyed by name alone would break that isolation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ScopeId {
    fn from(id: &str) -> Self {
        ScopeId::new(id)
    }
}

/// Errors produced while resolving an interceptor binding.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no interceptor registered under name `{name}`")]
    UnknownInterceptor { name: String },

    #[error("interceptor `{name}` failed to construct")]
    Construction {
        name: String,
        #[source]
        source: BoxError,
    },
}

/// Maps `(interceptor name, defining scope)` to a shared interceptor
/// instance, one method per call kind.
///
/// Implementations memoize per `(name, scope)` pair: repeated dispatches
/// through the same call site reuse one instance, and that instance is
/// invoked from many threads at once.
pub trait InterceptorResolver: Send + Sync {
    fn resolve_static(
        &self,
        name: &str,
        scope: &ScopeId,
    ) -> Result<Arc<dyn StaticMethodInterceptor>, ResolveError>;

    fn resolve_instance(
        &self,
        name: &str,
        scope: &ScopeId,
    ) -> Result<Arc<dyn InstanceMethodInterceptor>, ResolveError>;

    fn resolve_constructor(
        &self,
        name: &str,
        scope: &ScopeId,
    ) -> Result<Arc<dyn ConstructorInterceptor>, ResolveError>;
}
