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

//! Chain coordination for call sites with one or more interceptors.
//!
//! A chain holds the ordered interceptor bindings of one call site and the
//! resolver they are looked up through. Declared order is the only ordering
//! rule, and it is identical on entry and exit:
//!
//! - entry runs every binding's `before_call` against the current argument
//!   state, so later bindings observe earlier mutations. A skip request does
//!   not short-circuit the rest of the chain: every interceptor observes
//!   every call exactly once.
//! - if any binding requested a skip, the body does not run and the
//!   override of the *first* skipping binding (in declared order) stands in
//!   for its return value. Later skip requests stay recorded in their own
//!   contexts but cannot change the value.
//! - exit runs every binding in declared order; each `after_call` receives
//!   the previous one's return value, so transformations compose
//!   left-to-right.

use crate::call::descriptor::CallDescriptor;
use crate::call::value::{Args, Value};
use crate::dispatch::entry::{self, EnterState};
use crate::dispatch::exit;
use crate::enhance::InstrumentedInstance;
use crate::error::BusinessError;
use crate::interceptor::{InstanceMethodInterceptor, StaticMethodInterceptor};
use crate::resolver::{InterceptorResolver, ScopeId};
use metrics::counter;
use std::sync::Arc;
use tracing::error;

/// One ordered chain entry: an interceptor name and the defining scope it
/// resolves under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptorBinding {
    name: String,
    scope: ScopeId,
}

impl InterceptorBinding {
    pub fn new(name: impl Into<String>, scope: ScopeId) -> Self {
        Self {
            name: name.into(),
            scope,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &ScopeId {
        &self.scope
    }
}

/// The entry phase's output, threaded opaquely to the matching exit call.
///
/// Holds one private [`InterceptContext`](crate::InterceptContext) per
/// binding, keyed by chain position; no interceptor can see another's
/// context, only the shared argument/return values.
pub struct ChainEnter<T: ?Sized> {
    slots: Vec<EnterState<T>>,
}

impl<T: ?Sized> ChainEnter<T> {
    /// Whether the original body should run: true unless some binding
    /// requested a skip.
    pub fn proceed(&self) -> bool {
        self.slots.iter().all(|slot| slot.context.is_continue())
    }

    /// The synthetic return value standing in for a skipped body: the
    /// override of the first binding, in declared order, that requested a
    /// skip.
    pub fn override_value(&self) -> Option<&Value> {
        self.slots
            .iter()
            .find(|slot| !slot.context.is_continue())
            .and_then(|slot| slot.context.override_return())
    }
}

/// The interceptors bound to one instrumented call site, in caller-declared
/// order, plus the resolver they are looked up through.
///
/// The chain itself is stateless across calls: every dispatch creates fresh
/// contexts, so one chain value serves any number of concurrent calls.
pub struct InterceptorChain {
    bindings: Vec<InterceptorBinding>,
    resolver: Arc<dyn InterceptorResolver>,
}

impl InterceptorChain {
    pub fn new(resolver: Arc<dyn InterceptorResolver>) -> Self {
        Self {
            bindings: Vec::new(),
            resolver,
        }
    }

    pub fn with_binding(mut self, binding: InterceptorBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn push_binding(&mut self, binding: InterceptorBinding) {
        self.bindings.push(binding);
    }

    /// Bindings in declared (dispatch) order.
    pub fn bindings(&self) -> &[InterceptorBinding] {
        &self.bindings
    }

    /// Entry dispatch for a static method call.
    ///
    /// Runs every binding's entry step in declared order against the
    /// current state of `args`. The caller must not run the original body
    /// when the returned state reports `proceed() == false`, and must
    /// thread the state to [`exit_static`](Self::exit_static) exactly once,
    /// whatever the body did.
    pub fn enter_static(
        &self,
        descriptor: &CallDescriptor,
        args: &mut Args,
    ) -> ChainEnter<dyn StaticMethodInterceptor> {
        counter!("calltap_dispatch_calls", 1);
        let slots = self
            .bindings
            .iter()
            .map(|binding| entry::enter_static_slot(self.resolver.as_ref(), binding, descriptor, args))
            .collect();
        let enter = ChainEnter { slots };
        if !enter.proceed() {
            counter!("calltap_dispatch_skips", 1);
        }
        enter
    }

    /// Exit dispatch for a static method call.
    ///
    /// `return_value` is the body's result, or any placeholder when the
    /// body was skipped or failed; a skip override wins over it, then every
    /// binding's exit step runs in declared order. The result is the final
    /// return value; `thrown`, if any, is still the caller's to rethrow.
    pub fn exit_static(
        &self,
        descriptor: &CallDescriptor,
        args: &Args,
        return_value: Value,
        thrown: Option<&BusinessError>,
        enter: ChainEnter<dyn StaticMethodInterceptor>,
    ) -> Value {
        let mut value = return_value;
        if let Some(override_value) = enter.override_value() {
            value = override_value.clone();
        }
        for (binding, slot) in self.bindings.iter().zip(enter.slots.iter()) {
            value = exit::exit_static_slot(binding, descriptor, args, thrown, value, slot);
        }
        value
    }

    /// Dispatch a whole static method call around `body`.
    ///
    /// The body runs only when no interceptor requested a skip. A body
    /// error is routed through every binding's `on_error`, then returned
    /// unchanged once exit dispatch completes.
    pub fn dispatch_static<F>(
        &self,
        descriptor: &CallDescriptor,
        args: &mut Args,
        body: F,
    ) -> Result<Value, BusinessError>
    where
        F: FnOnce(&mut Args) -> Result<Value, BusinessError>,
    {
        let enter = self.enter_static(descriptor, args);
        let (value, thrown) = if enter.proceed() {
            match body(args) {
                Ok(value) => (value, None),
                Err(err) => {
                    counter!("calltap_business_errors", 1);
                    (Value::Null, Some(err))
                }
            }
        } else {
            (Value::Null, None)
        };

        let value = self.exit_static(descriptor, args, value, thrown.as_ref(), enter);
        match thrown {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }

    /// Entry dispatch for an instance method call; see
    /// [`enter_static`](Self::enter_static).
    pub fn enter_instance(
        &self,
        descriptor: &CallDescriptor,
        instance: &dyn InstrumentedInstance,
        args: &mut Args,
    ) -> ChainEnter<dyn InstanceMethodInterceptor> {
        counter!("calltap_dispatch_calls", 1);
        let slots = self
            .bindings
            .iter()
            .map(|binding| {
                entry::enter_instance_slot(
                    self.resolver.as_ref(),
                    binding,
                    descriptor,
                    instance,
                    args,
                )
            })
            .collect();
        let enter = ChainEnter { slots };
        if !enter.proceed() {
            counter!("calltap_dispatch_skips", 1);
        }
        enter
    }

    /// Exit dispatch for an instance method call; see
    /// [`exit_static`](Self::exit_static).
    pub fn exit_instance(
        &self,
        descriptor: &CallDescriptor,
        instance: &dyn InstrumentedInstance,
        args: &Args,
        return_value: Value,
        thrown: Option<&BusinessError>,
        enter: ChainEnter<dyn InstanceMethodInterceptor>,
    ) -> Value {
        let mut value = return_value;
        if let Some(override_value) = enter.override_value() {
            value = override_value.clone();
        }
        for (binding, slot) in self.bindings.iter().zip(enter.slots.iter()) {
            value = exit::exit_instance_slot(
                binding, descriptor, instance, args, thrown, value, slot,
            );
        }
        value
    }

    /// Dispatch a whole instance method call around `body`; see
    /// [`dispatch_static`](Self::dispatch_static).
    pub fn dispatch_instance<F>(
        &self,
        descriptor: &CallDescriptor,
        instance: &dyn InstrumentedInstance,
        args: &mut Args,
        body: F,
    ) -> Result<Value, BusinessError>
    where
        F: FnOnce(&mut Args) -> Result<Value, BusinessError>,
    {
        let enter = self.enter_instance(descriptor, instance, args);
        let (value, thrown) = if enter.proceed() {
            match body(args) {
                Ok(value) => (value, None),
                Err(err) => {
                    counter!("calltap_business_errors", 1);
                    (Value::Null, Some(err))
                }
            }
        } else {
            (Value::Null, None)
        };

        let value = self.exit_instance(descriptor, instance, args, value, thrown.as_ref(), enter);
        match thrown {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }

    /// Dispatch the post-construction hooks of every binding.
    ///
    /// Runs after the instance exists; construction cannot be vetoed, so
    /// resolution and hook failures are logged and swallowed here.
    pub fn dispatch_construct(
        &self,
        descriptor: &CallDescriptor,
        instance: &dyn InstrumentedInstance,
        args: &Args,
    ) {
        counter!("calltap_dispatch_calls", 1);
        for binding in &self.bindings {
            let interceptor = match self
                .resolver
                .resolve_constructor(binding.name(), binding.scope())
            {
                Ok(interceptor) => interceptor,
                Err(err) => {
                    counter!("calltap_resolve_failures", 1);
                    error!(
                        interceptor = binding.name(),
                        call = %descriptor,
                        error = %err,
                        "interceptor resolution failed, slot dispatches as no-op"
                    );
                    continue;
                }
            };
            if let Err(err) = interceptor.on_construct(instance, args) {
                counter!("calltap_hook_failures_construct", 1);
                error!(
                    interceptor = binding.name(),
                    call = %descriptor,
                    error = %err,
                    "on_construct failed, construction unaffected"
                );
            }
        }
    }
}
