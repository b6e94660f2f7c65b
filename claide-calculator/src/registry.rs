// ABOUTME: Process-wide table mapping integer IDs to live calculator handles.
// ABOUTME: Makes stale, double-destroyed and concurrently used handles reportable errors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};

use crate::error::CalcError;
use crate::handle::CalculatorHandle;

/// Identifier handed to C callers. 0 is never issued.
pub type ClaideCalculatorId = u64;

type Slot = Arc<Mutex<CalculatorHandle>>;

/// Live calculator handles keyed by ID. IDs are never reused, so a destroyed
/// ID stays invalid for the life of the process.
pub struct HandleRegistry {
    handles: RwLock<HashMap<ClaideCalculatorId, Slot>>,
    next_id: AtomicU64,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self {
            handles: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handle and return its new ID.
    pub fn insert(&self, handle: CalculatorHandle) -> ClaideCalculatorId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handles.write().insert(id, Arc::new(Mutex::new(handle)));
        tracing::debug!(id, "calculator handle created");
        id
    }

    /// Run `f` with exclusive access to the handle behind `id`.
    ///
    /// Fails fast with `HandleInUse` instead of blocking when another thread
    /// is already using the handle.
    pub fn with_handle<R>(
        &self,
        id: ClaideCalculatorId,
        f: impl FnOnce(&mut CalculatorHandle) -> R,
    ) -> Result<R, CalcError> {
        let slot = self.slot(id)?;
        let mut handle = slot.try_lock().ok_or_else(|| {
            tracing::warn!(id, "calculator handle is busy");
            CalcError::HandleInUse(id)
        })?;
        Ok(f(&mut handle))
    }

    /// Destroy the handle behind `id`. A handle that is mid-evaluation is left live.
    pub fn remove(&self, id: ClaideCalculatorId) -> Result<(), CalcError> {
        let mut handles = self.handles.write();
        let busy = match handles.get(&id) {
            Some(slot) => slot.try_lock().is_none(),
            None => {
                tracing::warn!(id, "destroy on unknown calculator handle");
                return Err(CalcError::InvalidHandle(id));
            }
        };
        if busy {
            tracing::warn!(id, "destroy on busy calculator handle");
            return Err(CalcError::HandleInUse(id));
        }
        let slot = handles.remove(&id);
        drop(handles);
        // Engine state is freed outside the table lock.
        drop(slot);
        tracing::debug!(id, "calculator handle destroyed");
        Ok(())
    }

    pub fn contains(&self, id: ClaideCalculatorId) -> bool {
        self.handles.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, id: ClaideCalculatorId) -> Result<Slot, CalcError> {
        self.handles.read().get(&id).cloned().ok_or_else(|| {
            tracing::warn!(id, "unknown calculator handle");
            CalcError::InvalidHandle(id)
        })
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_REGISTRY: OnceLock<HandleRegistry> = OnceLock::new();

/// Registry backing the C API and `Calculator`.
pub fn global_registry() -> &'static HandleRegistry {
    GLOBAL_REGISTRY.get_or_init(HandleRegistry::new)
}
