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

//! Per-call invocation context.

use crate::call::value::Value;

/// State one interceptor carries from the entry phase of a call to the
/// matching exit phase.
///
/// A fresh context is created for every (interceptor, call) pair right
/// before `before_call` runs, and consumed by the matching exit step. It is
/// never shared across calls, threads or chain positions.
#[derive(Debug)]
pub struct InterceptContext {
    proceed: bool,
    override_return: Option<Value>,
}

impl InterceptContext {
    pub fn new() -> Self {
        Self {
            proceed: true,
            override_return: None,
        }
    }

    /// Request that the original body is skipped and `value` returned in
    /// its place.
    ///
    /// The override only takes effect for the first interceptor in chain
    /// order that requests a skip; it is inert while the context reports
    /// `is_continue() == true`.
    pub fn define_return_value(&mut self, value: Value) {
        self.proceed = false;
        self.override_return = Some(value);
    }

    /// Whether the original body should still run.
    pub fn is_continue(&self) -> bool {
        self.proceed
    }

    /// The value standing in for the skipped body, read by exit dispatch.
    pub(crate) fn override_return(&self) -> Option<&Value> {
        self.override_return.as_ref()
    }
}

impl Default for InterceptContext {
    fn default() -> Self {
        Self::new()
    }
}
