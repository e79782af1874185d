//! Per-instance hook state.
//!
//! Hooks are identified by call order. The first render fixes the sequence;
//! any later render that calls a different hook at a position, or a different
//! number of hooks, is rejected.

use super::error::RuntimeError;
use super::value::{same_value, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub(crate) enum HookSlot {
    State {
        cell: Rc<RefCell<Value>>,
        setter: Value,
    },
    Effect {
        deps: Option<Vec<Value>>,
        cleanup: Option<Value>,
    },
    Ref(Value),
    /// Shared by `useMemo` and `useCallback`.
    Memo {
        hook: &'static str,
        deps: Option<Vec<Value>>,
        value: Value,
    },
}

impl HookSlot {
    fn kind(&self) -> &'static str {
        match self {
            HookSlot::State { .. } => "useState",
            HookSlot::Effect { .. } => "useEffect",
            HookSlot::Ref(_) => "useRef",
            HookSlot::Memo { hook, .. } => *hook,
        }
    }
}

#[derive(Default)]
pub struct HookStore {
    pub(crate) slots: Vec<HookSlot>,
    /// Set once a render has completed; the slot count is then fixed.
    pub(crate) rendered: bool,
    /// Raised by state setters.
    pub(crate) dirty: Rc<Cell<bool>>,
}

impl HookStore {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Remove every pending effect cleanup, in slot order.
    pub(crate) fn take_cleanups(&mut self) -> Vec<Value> {
        self.slots
            .iter_mut()
            .filter_map(|slot| match slot {
                HookSlot::Effect { cleanup, .. } => cleanup.take(),
                _ => None,
            })
            .collect()
    }
}

/// An effect whose dependencies changed during the current render.
pub(crate) struct PendingEffect {
    pub index: usize,
    pub callback: Value,
    pub deps: Option<Vec<Value>>,
}

/// Hook bookkeeping for one render pass.
pub struct RenderFrame {
    pub(crate) store: HookStore,
    cursor: usize,
    pub(crate) pending: Vec<PendingEffect>,
}

impl RenderFrame {
    pub fn new(store: HookStore) -> Self {
        Self {
            store,
            cursor: 0,
            pending: Vec::new(),
        }
    }

    /// Claim the next position. `Some(slot)` when a slot of this kind already
    /// exists; `None` when the caller must create it with [`push_slot`].
    ///
    /// [`push_slot`]: RenderFrame::push_slot
    pub(crate) fn next_slot(
        &mut self,
        kind: &'static str,
    ) -> Result<(usize, Option<&mut HookSlot>), RuntimeError> {
        let index = self.cursor;
        self.cursor += 1;
        let rendered = self.store.rendered;
        match self.store.slots.get_mut(index) {
            Some(slot) if slot.kind() == kind => Ok((index, Some(slot))),
            Some(slot) => Err(RuntimeError::HookOrderChanged {
                index,
                detail: format!("expected {}, called {}", slot.kind(), kind),
            }),
            None if rendered => Err(RuntimeError::HookOrderChanged {
                index,
                detail: "more hooks than the previous render".to_string(),
            }),
            None => Ok((index, None)),
        }
    }

    pub(crate) fn push_slot(&mut self, index: usize, slot: HookSlot) -> Result<(), RuntimeError> {
        if self.store.slots.len() != index {
            return Err(RuntimeError::HookOrderChanged {
                index,
                detail: "hook called while initializing another hook".to_string(),
            });
        }
        self.store.slots.push(slot);
        Ok(())
    }

    /// Close the pass. The store comes back either way so state survives a
    /// failed render.
    pub(crate) fn finish(
        self,
    ) -> Result<(HookStore, Vec<PendingEffect>), (HookStore, RuntimeError)> {
        if self.store.rendered && self.cursor < self.store.slots.len() {
            let index = self.cursor;
            return Err((
                self.store,
                RuntimeError::HookOrderChanged {
                    index,
                    detail: "fewer hooks than the previous render".to_string(),
                },
            ));
        }
        Ok((self.store, self.pending))
    }
}

/// Dependency array argument; anything but an array means "every render".
pub(crate) fn read_deps(value: Option<&Value>) -> Option<Vec<Value>> {
    match value {
        Some(Value::Array(items)) => Some(items.borrow().clone()),
        _ => None,
    }
}

pub(crate) fn deps_changed(old: &Option<Vec<Value>>, new: &Option<Vec<Value>>) -> bool {
    match (old, new) {
        (Some(old), Some(new)) => {
            old.len() != new.len() || old.iter().zip(new).any(|(a, b)| !same_value(a, b))
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_comparison() {
        let a = Some(vec![Value::Number(1.0), Value::string("x")]);
        let b = Some(vec![Value::Number(1.0), Value::string("x")]);
        assert!(!deps_changed(&a, &b));
        assert!(deps_changed(&a, &Some(vec![Value::Number(2.0), Value::string("x")])));
        assert!(deps_changed(&a, &None));
        assert!(!deps_changed(&Some(vec![]), &Some(vec![])));
    }

    #[test]
    fn order_is_fixed_after_first_render() {
        let mut frame = RenderFrame::new(HookStore::default());
        let (index, slot) = frame.next_slot("useRef").unwrap();
        assert!(slot.is_none());
        frame.push_slot(index, HookSlot::Ref(Value::Null)).unwrap();
        let (mut store, _) = frame.finish().map_err(|(_, e)| e).unwrap();
        store.rendered = true;

        let mut frame = RenderFrame::new(store);
        let err = frame.next_slot("useState").map(|_| ()).unwrap_err();
        assert!(matches!(err, RuntimeError::HookOrderChanged { index: 0, .. }));

        let Ok((store, _)) = frame.finish() else {
            panic!("a rejected call still advances the cursor");
        };
        let frame = RenderFrame::new(store);
        let (_, err) = frame.finish().map(|_| ()).unwrap_err();
        assert!(err.to_string().contains("fewer hooks"));
    }
}
