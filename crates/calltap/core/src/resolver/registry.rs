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

//! Registry-backed interceptor resolver.
//!
//! Interceptor implementations register a factory under a name; resolution
//! instantiates through the factory at most once per `(name, scope)` pair
//! and serves every later lookup from a concurrent cache.

use super::{InterceptorResolver, ResolveError, ScopeId};
use crate::error::BoxError;
use crate::interceptor::{
    ConstructorInterceptor, InstanceMethodInterceptor, StaticMethodInterceptor,
};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

type Factory<T> = Box<dyn Fn() -> Result<Arc<T>, BoxError> + Send + Sync>;

/// Factory table plus memo cache for one interceptor family.
///
/// `T` is the interceptor trait object for one call kind; the registry
/// itself is kind-agnostic.
pub struct InterceptorRegistry<T: ?Sized> {
    factories: RwLock<HashMap<String, Factory<T>>>,
    cache: DashMap<(String, ScopeId), Arc<T>>,
}

impl<T: ?Sized> InterceptorRegistry<T> {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            cache: DashMap::new(),
        }
    }

    /// Register the factory producing instances for `name`.
    ///
    /// A later registration under the same name replaces the factory but
    /// not instances already cached for some scope.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        self.factories.write().insert(name.into(), Box::new(factory));
    }

    /// Resolve `name` under `scope`, instantiating on the first lookup for
    /// that pair.
    ///
    /// Concurrent first lookups may race through the factory; the cache
    /// keeps exactly one winner, so callers still observe a single shared
    /// instance per `(name, scope)`.
    pub fn resolve(&self, name: &str, scope: &ScopeId) -> Result<Arc<T>, ResolveError> {
        let key = (name.to_owned(), scope.clone());
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }

        let instance = {
            let factories = self.factories.read();
            let factory = factories
                .get(name)
                .ok_or_else(|| ResolveError::UnknownInterceptor {
                    name: name.to_owned(),
                })?;
            factory().map_err(|source| ResolveError::Construction {
                name: name.to_owned(),
                source,
            })?
        };

        let cached = self.cache.entry(key).or_insert(instance);
        Ok(Arc::clone(cached.value()))
    }
}

impl<T: ?Sized> Default for InterceptorRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The standard [`InterceptorResolver`]: one registry per call kind.
#[derive(Default)]
pub struct RegistryResolver {
    static_methods: InterceptorRegistry<dyn StaticMethodInterceptor>,
    instance_methods: InterceptorRegistry<dyn InstanceMethodInterceptor>,
    constructors: InterceptorRegistry<dyn ConstructorInterceptor>,
}

impl RegistryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_static<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Arc<dyn StaticMethodInterceptor>, BoxError> + Send + Sync + 'static,
    {
        self.static_methods.register(name, factory);
    }

    pub fn register_instance<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Arc<dyn InstanceMethodInterceptor>, BoxError> + Send + Sync + 'static,
    {
        self.instance_methods.register(name, factory);
    }

    pub fn register_constructor<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Arc<dyn ConstructorInterceptor>, BoxError> + Send + Sync + 'static,
    {
        self.constructors.register(name, factory);
    }
}

impl InterceptorResolver for RegistryResolver {
    fn resolve_static(
        &self,
        name: &str,
        scope: &ScopeId,
    ) -> Result<Arc<dyn StaticMethodInterceptor>, ResolveError> {
        self.static_methods.resolve(name, scope)
    }

    fn resolve_instance(
        &self,
        name: &str,
        scope: &ScopeId,
    ) -> Result<Arc<dyn InstanceMethodInterceptor>, ResolveError> {
        self.instance_methods.resolve(name, scope)
    }

    fn resolve_constructor(
        &self,
        name: &str,
        scope: &ScopeId,
    ) -> Result<Arc<dyn ConstructorInterceptor>, ResolveError> {
        self.constructors.resolve(name, scope)
    }
}
