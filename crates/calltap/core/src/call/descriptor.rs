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

//! Identity of an instrumented call site.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of call site being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    StaticMethod,
    InstanceMethod,
    Constructor,
}

/// Identifies the call site a dispatch runs for: owning type, member name,
/// declared parameter types and call kind.
///
/// Resolved once per call site and immutable afterwards; every failure log
/// emitted by the dispatchers carries this identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallDescriptor {
    owner: String,
    member: String,
    parameter_types: Box<[String]>,
    kind: CallKind,
}

impl CallDescriptor {
    pub fn static_method(
        owner: impl Into<String>,
        member: impl Into<String>,
        parameter_types: &[&str],
    ) -> Self {
        Self::new(owner, member, parameter_types, CallKind::StaticMethod)
    }

    pub fn instance_method(
        owner: impl Into<String>,
        member: impl Into<String>,
        parameter_types: &[&str],
    ) -> Self {
        Self::new(owner, member, parameter_types, CallKind::InstanceMethod)
    }

    pub fn constructor(owner: impl Into<String>, parameter_types: &[&str]) -> Self {
        Self::new(owner, "new", parameter_types, CallKind::Constructor)
    }

    fn new(
        owner: impl Into<String>,
        member: impl Into<String>,
        parameter_types: &[&str],
        kind: CallKind,
    ) -> Self {
        Self {
            owner: owner.into(),
            member: member.into(),
            parameter_types: parameter_types
                .iter()
                .map(|t| (*t).to_owned())
                .collect(),
            kind,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }
}

impl fmt::Display for CallDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({})",
            self.owner,
            self.member,
            self.parameter_types.join(", ")
        )
    }
}
