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

//! Capabilities of instrumented receivers.
//!
//! An instrumented object exposes exactly one thing to the interception
//! layer: an opaque per-object attachment slot. Interceptors use it to
//! correlate state across calls on the same receiver (a constructor
//! interceptor stashes a value, a method interceptor picks it up later).
//! The dispatch core itself never reads or interprets the slot.

use crate::call::value::Value;
use parking_lot::Mutex;

/// Implemented by receivers of instrumented instance methods and
/// constructors.
///
/// The slot is shared across threads together with its owner, so access
/// goes through `&self`.
pub trait InstrumentedInstance: Send + Sync {
    /// Read the current attachment, if any.
    fn attachment(&self) -> Option<Value>;

    /// Replace the attachment.
    fn set_attachment(&self, value: Value);
}

/// Ready-made attachment storage.
///
/// Embed one and implement [`InstrumentedInstance`] by delegation:
///
/// ```
/// use calltap_core::{AttachmentSlot, InstrumentedInstance, Value};
///
/// struct Greeter {
///     attachment: AttachmentSlot,
/// }
///
/// impl InstrumentedInstance for Greeter {
///     fn attachment(&self) -> Option<Value> {
///         self.attachment.get()
///     }
///     fn set_attachment(&self, value: Value) {
///         self.attachment.set(value)
///     }
/// }
/// ```
#[derive(Debug, Default)]
pub struct AttachmentSlot {
    slot: Mutex<Option<Value>>,
}

impl AttachmentSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Value> {
        self.slot.lock().clone()
    }

    pub fn set(&self, value: Value) {
        *self.slot.lock() = Some(value);
    }

    /// Remove and return the current attachment.
    pub fn take(&self) -> Option<Value> {
        self.slot.lock().take()
    }
}
