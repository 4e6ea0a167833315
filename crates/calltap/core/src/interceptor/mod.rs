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

//! The interceptor contract, one trait per call kind.
//!
//! Interceptors are registered under a name, resolved at dispatch time and
//! shared: one instance observes many concurrent calls, so every hook takes
//! `&self` and an implementation performs its own synchronization for any
//! internal state.
//!
//! Hook failures are reported as `Err` and recovered by the dispatcher; an
//! interceptor has no way to abort or corrupt the call it observes.

pub mod context;

pub use context::InterceptContext;

use crate::call::descriptor::CallDescriptor;
use crate::call::value::{Args, Value};
use crate::enhance::InstrumentedInstance;
use crate::error::{BusinessError, InterceptError};

/// Observer of instrumented static method calls.
pub trait StaticMethodInterceptor: Send + Sync {
    /// Runs before the original body. May mutate `args` in place or call
    /// [`InterceptContext::define_return_value`] to skip the body.
    fn before_call(
        &self,
        _descriptor: &CallDescriptor,
        _args: &mut Args,
        _context: &mut InterceptContext,
    ) -> Result<(), InterceptError> {
        Ok(())
    }

    /// Runs after the original body (or its skip substitute). The returned
    /// value becomes the call's return value for the rest of the chain.
    fn after_call(
        &self,
        _descriptor: &CallDescriptor,
        _args: &Args,
        return_value: Value,
    ) -> Result<Value, InterceptError> {
        Ok(return_value)
    }

    /// Observes a failure of the original body. The error is read-only and
    /// is rethrown by the dispatcher once exit dispatch completes.
    fn on_error(
        &self,
        _descriptor: &CallDescriptor,
        _args: &Args,
        _error: &BusinessError,
    ) -> Result<(), InterceptError> {
        Ok(())
    }
}

/// Observer of instrumented instance method calls.
///
/// Identical to [`StaticMethodInterceptor`] with the receiver in scope; the
/// receiver's attachment slot is where state correlated across calls on the
/// same object lives.
pub trait InstanceMethodInterceptor: Send + Sync {
    fn before_call(
        &self,
        _instance: &dyn InstrumentedInstance,
        _descriptor: &CallDescriptor,
        _args: &mut Args,
        _context: &mut InterceptContext,
    ) -> Result<(), InterceptError> {
        Ok(())
    }

    fn after_call(
        &self,
        _instance: &dyn InstrumentedInstance,
        _descriptor: &CallDescriptor,
        _args: &Args,
        return_value: Value,
    ) -> Result<Value, InterceptError> {
        Ok(return_value)
    }

    fn on_error(
        &self,
        _instance: &dyn InstrumentedInstance,
        _descriptor: &CallDescriptor,
        _args: &Args,
        _error: &BusinessError,
    ) -> Result<(), InterceptError> {
        Ok(())
    }
}

/// Observer of instrumented constructions.
///
/// Construction cannot be vetoed or rewritten, so the contract is a single
/// post-construction hook with no context and no return value.
pub trait ConstructorInterceptor: Send + Sync {
    fn on_construct(
        &self,
        instance: &dyn InstrumentedInstance,
        args: &Args,
    ) -> Result<(), InterceptError>;
}
