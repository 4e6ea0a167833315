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

//! Exit-phase dispatch, one interceptor slot at a time.
//!
//! Runs `on_error` when the body failed, then always `after_call`, both
//! under the fail-open policy: an `on_error` failure never masks the
//! business error or prevents `after_call`; an `after_call` failure keeps
//! the last known-good return value.

use crate::call::descriptor::CallDescriptor;
use crate::call::value::{Args, Value};
use crate::dispatch::chain::InterceptorBinding;
use crate::dispatch::entry::EnterState;
use crate::enhance::InstrumentedInstance;
use crate::error::BusinessError;
use crate::interceptor::{InstanceMethodInterceptor, StaticMethodInterceptor};
use metrics::counter;
use tracing::error;

pub(crate) fn exit_static_slot(
    binding: &InterceptorBinding,
    descriptor: &CallDescriptor,
    args: &Args,
    thrown: Option<&BusinessError>,
    return_value: Value,
    slot: &EnterState<dyn StaticMethodInterceptor>,
) -> Value {
    let Some(interceptor) = slot.interceptor.as_ref() else {
        return return_value;
    };

    if let Some(business_err) = thrown {
        if let Err(err) = interceptor.on_error(descriptor, args, business_err) {
            counter!("calltap_hook_failures_on_error", 1);
            error!(
                interceptor = binding.name(),
                call = %descriptor,
                error = %err,
                "on_error failed, business error still propagates"
            );
        }
    }

    match interceptor.after_call(descriptor, args, return_value.clone()) {
        Ok(value) => value,
        Err(err) => {
            counter!("calltap_hook_failures_after", 1);
            error!(
                interceptor = binding.name(),
                call = %descriptor,
                error = %err,
                "after_call failed, keeping previous return value"
            );
            return_value
        }
    }
}

pub(crate) fn exit_instance_slot(
    binding: &InterceptorBinding,
    descriptor: &CallDescriptor,
    instance: &dyn InstrumentedInstance,
    args: &Args,
    thrown: Option<&BusinessError>,
    return_value: Value,
    slot: &EnterState<dyn InstanceMethodInterceptor>,
) -> Value {
    let Some(interceptor) = slot.interceptor.as_ref() else {
        return return_value;
    };

    if let Some(business_err) = thrown {
        if let Err(err) = interceptor.on_error(instance, descriptor, args, business_err) {
            counter!("calltap_hook_failures_on_error", 1);
            error!(
                interceptor = binding.name(),
                call = %descriptor,
                error = %err,
                "on_error failed, business error still propagates"
            );
        }
    }

    match interceptor.after_call(instance, descriptor, args, return_value.clone()) {
        Ok(value) => value,
        Err(err) => {
            counter!("calltap_hook_failures_after", 1);
            error!(
                interceptor = binding.name(),
                call = %descriptor,
                error = %err,
                "after_call failed, keeping previous return value"
            );
            return_value
        }
    }
}
