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

//! Entry-phase dispatch, one interceptor slot at a time.
//!
//! Every slot resolves its interceptor, creates a fresh context and runs
//! `before_call` under the fail-open policy: a resolution failure turns the
//! slot into a no-op, a hook failure restores the pre-hook arguments and a
//! default context. Entry never raises toward the instrumented call.

use crate::call::descriptor::CallDescriptor;
use crate::call::value::Args;
use crate::dispatch::chain::InterceptorBinding;
use crate::enhance::InstrumentedInstance;
use crate::interceptor::{InstanceMethodInterceptor, InterceptContext, StaticMethodInterceptor};
use crate::resolver::InterceptorResolver;
use metrics::counter;
use std::sync::Arc;
use tracing::error;

/// What one chain slot carries from entry to the matching exit step: the
/// private context, and the resolved instance so exit reuses it without a
/// second resolver round-trip.
///
/// `interceptor == None` marks a slot whose resolution failed; it stays a
/// no-op for the whole call.
pub(crate) struct EnterState<T: ?Sized> {
    pub(crate) interceptor: Option<Arc<T>>,
    pub(crate) context: InterceptContext,
}

impl<T: ?Sized> EnterState<T> {
    fn unresolved() -> Self {
        Self {
            interceptor: None,
            context: InterceptContext::new(),
        }
    }
}

pub(crate) fn enter_static_slot(
    resolver: &dyn InterceptorResolver,
    binding: &InterceptorBinding,
    descriptor: &CallDescriptor,
    args: &mut Args,
) -> EnterState<dyn StaticMethodInterceptor> {
    let interceptor = match resolver.resolve_static(binding.name(), binding.scope()) {
        Ok(interceptor) => interceptor,
        Err(err) => {
            counter!("calltap_resolve_failures", 1);
            error!(
                interceptor = binding.name(),
                call = %descriptor,
                error = %err,
                "interceptor resolution failed, slot dispatches as no-op"
            );
            return EnterState::unresolved();
        }
    };

    let mut context = InterceptContext::new();
    let snapshot = args.clone();
    if let Err(err) = interceptor.before_call(descriptor, args, &mut context) {
        counter!("calltap_hook_failures_before", 1);
        error!(
            interceptor = binding.name(),
            call = %descriptor,
            error = %err,
            "before_call failed, arguments restored"
        );
        *args = snapshot;
        context = InterceptContext::new();
    }

    EnterState {
        interceptor: Some(interceptor),
        context,
    }
}

pub(crate) fn enter_instance_slot(
    resolver: &dyn InterceptorResolver,
    binding: &InterceptorBinding,
    descriptor: &CallDescriptor,
    instance: &dyn InstrumentedInstance,
    args: &mut Args,
) -> EnterState<dyn InstanceMethodInterceptor> {
    let interceptor = match resolver.resolve_instance(binding.name(), binding.scope()) {
        Ok(interceptor) => interceptor,
        Err(err) => {
            counter!("calltap_resolve_failures", 1);
            error!(
                interceptor = binding.name(),
                call = %descriptor,
                error = %err,
                "interceptor resolution failed, slot dispatches as no-op"
            );
            return EnterState::unresolved();
        }
    };

    let mut context = InterceptContext::new();
    let snapshot = args.clone();
    if let Err(err) = interceptor.before_call(instance, descriptor, args, &mut context) {
        counter!("calltap_hook_failures_before", 1);
        error!(
            interceptor = binding.name(),
            call = %descriptor,
            error = %err,
            "before_call failed, arguments restored"
        );
        *args = snapshot;
        context = InterceptContext::new();
    }

    EnterState {
        interceptor: Some(interceptor),
        context,
    }
}
