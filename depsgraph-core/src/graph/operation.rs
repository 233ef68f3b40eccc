//! Operation Nodes
//!
//! The atomic unit of evaluation work.

use std::fmt;

use super::node::{ComponentRef, EvalCallback, OpCode, OperationFlags, OperationKey};

/// One schedulable evaluation step.
pub struct OperationNode {
    key: OperationKey,

    /// Evaluation function. `None` for no-op placeholders that only exist
    /// to anchor relations.
    callback: Option<EvalCallback>,

    /// Scheduling and update flags.
    pub flags: OperationFlags,

    /// Component that owns this operation.
    owner: ComponentRef,
}

impl OperationNode {
    pub(crate) fn new(key: OperationKey, callback: Option<EvalCallback>, owner: ComponentRef) -> Self {
        Self {
            key,
            callback,
            flags: OperationFlags::empty(),
            owner,
        }
    }

    pub fn key(&self) -> &OperationKey {
        &self.key
    }

    pub fn opcode(&self) -> OpCode {
        self.key.opcode
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn name_tag(&self) -> i32 {
        self.key.name_tag
    }

    pub fn owner(&self) -> ComponentRef {
        self.owner
    }

    pub fn callback(&self) -> Option<&EvalCallback> {
        self.callback.as_ref()
    }

    pub fn is_pinned(&self) -> bool {
        self.flags.contains(OperationFlags::PINNED)
    }

    pub fn is_muted(&self) -> bool {
        self.flags.contains(OperationFlags::MUTE)
    }

    pub fn is_entry(&self) -> bool {
        self.flags.contains(OperationFlags::ENTRY)
    }

    pub fn is_exit(&self) -> bool {
        self.flags.contains(OperationFlags::EXIT)
    }

    pub fn needs_update(&self) -> bool {
        self.flags.contains(OperationFlags::NEEDS_UPDATE)
    }

    pub fn identifier(&self) -> String {
        self.key.to_string()
    }
}

impl fmt::Debug for OperationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationNode")
            .field("key", &self.key)
            .field("flags", &self.flags)
            .field("has_callback", &self.callback.is_some())
            .field("owner", &self.owner)
            .finish()
    }
}
