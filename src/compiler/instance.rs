//! A mounted component: hook state plus the render/invoke/unmount lifecycle.

use super::error::RuntimeError;
use super::hooks::{HookSlot, HookStore, PendingEffect, RenderFrame};
use super::interpreter::{Interpreter, Interrupt};
use super::tree::Node;
use super::value::{from_json, to_json, PropertyMap, Value};
use super::CompilerSettings;
use crate::types::Size;
use serde_json::{Map, Value as JsonValue};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// Props handed to the entry point on each render.
#[derive(Debug, Clone)]
pub struct RenderProps {
    /// Effective configuration (schema defaults merged with stored values).
    pub config: Map<String, JsonValue>,
    pub size: Size,
}

impl RenderProps {
    pub fn new(config: Map<String, JsonValue>, size: Size) -> Self {
        Self { config, size }
    }
}

pub struct ComponentInstance {
    entry: Value,
    settings: CompilerSettings,
    hooks: HookStore,
    config_changes: Rc<RefCell<Vec<Map<String, JsonValue>>>>,
    on_config_change: Value,
    mounted: bool,
}

impl ComponentInstance {
    pub(crate) fn new(entry: Value, settings: CompilerSettings) -> Self {
        let config_changes: Rc<RefCell<Vec<Map<String, JsonValue>>>> = Rc::default();
        let on_config_change = {
            let changes = config_changes.clone();
            Value::native("onConfigChange", move |_, args| {
                if let Some(JsonValue::Object(patch)) = args.first().and_then(to_json) {
                    changes.borrow_mut().push(patch);
                }
                Ok(Value::Undefined)
            })
        };
        Self {
            entry,
            settings,
            hooks: HookStore::default(),
            config_changes,
            on_config_change,
            mounted: true,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// State changed or a config change is waiting since the last render.
    pub fn needs_render(&self) -> bool {
        self.mounted && (self.hooks.is_dirty() || !self.config_changes.borrow().is_empty())
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Config patches requested through `onConfigChange`, oldest first.
    pub fn take_config_changes(&mut self) -> Vec<Map<String, JsonValue>> {
        std::mem::take(&mut *self.config_changes.borrow_mut())
    }

    fn props_value(&self, props: &RenderProps) -> Value {
        let mut size = PropertyMap::new();
        size.set("w", Value::Number(props.size.w as f64));
        size.set("h", Value::Number(props.size.h as f64));
        let mut map = PropertyMap::new();
        map.set("config", from_json(&JsonValue::Object(props.config.clone())));
        map.set("onConfigChange", self.on_config_change.clone());
        map.set("size", Value::object(size));
        Value::object(map)
    }

    /// Run the entry point, then any effects whose dependencies changed.
    pub fn render(&mut self, props: &RenderProps) -> Result<Node, RuntimeError> {
        if !self.mounted {
            return Err(RuntimeError::Unmounted);
        }
        let store = std::mem::take(&mut self.hooks);
        store.dirty.set(false);
        let mut interp = Interpreter::new(&self.settings);
        interp.frame = Some(RenderFrame::new(store));

        let result = interp.call_function(&self.entry, vec![self.props_value(props)]);

        let Some(frame) = interp.frame.take() else {
            return Err(RuntimeError::HookOutsideRender("render"));
        };
        let (mut store, pending) = match frame.finish() {
            Ok(done) => done,
            Err((store, err)) => {
                self.hooks = store;
                return Err(result.err().map_or(err, Interrupt::into_runtime_error));
            }
        };
        let value = match result {
            Ok(value) => value,
            Err(interrupt) => {
                self.hooks = store;
                return Err(interrupt.into_runtime_error());
            }
        };
        store.rendered = true;
        self.hooks = store;

        let node = Node::from_value(&value).map_err(RuntimeError::InvalidRender)?;
        self.run_effects(&mut interp, pending)?;
        debug!(steps = interp.steps(), hooks = self.hooks.len(), "component rendered");
        Ok(node)
    }

    fn run_effects(
        &mut self,
        interp: &mut Interpreter,
        pending: Vec<PendingEffect>,
    ) -> Result<(), RuntimeError> {
        for PendingEffect {
            index,
            callback,
            deps,
        } in pending
        {
            let previous = match self.hooks.slots.get_mut(index) {
                Some(HookSlot::Effect { cleanup, .. }) => cleanup.take(),
                _ => None,
            };
            if let Some(cleanup) = previous {
                interp
                    .call_function(&cleanup, Vec::new())
                    .map_err(Interrupt::into_runtime_error)?;
            }
            let returned = interp
                .call_function(&callback, Vec::new())
                .map_err(Interrupt::into_runtime_error)?;
            if let Some(HookSlot::Effect {
                deps: stored,
                cleanup,
            }) = self.hooks.slots.get_mut(index)
            {
                *stored = deps;
                *cleanup = returned.is_function().then_some(returned);
            }
        }
        Ok(())
    }

    /// Call a handler taken from a rendered tree, e.g. an `onClick` prop.
    pub fn invoke(&mut self, handler: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        if !self.mounted {
            return Err(RuntimeError::Unmounted);
        }
        let mut interp = Interpreter::new(&self.settings);
        interp
            .call_value(handler, args, "handler")
            .map_err(Interrupt::into_runtime_error)
    }

    /// Run every outstanding effect cleanup. The first failure is reported
    /// after all cleanups have had a chance to run.
    pub fn unmount(&mut self) -> Result<(), RuntimeError> {
        if !self.mounted {
            return Ok(());
        }
        self.mounted = false;
        let mut interp = Interpreter::new(&self.settings);
        let mut first_error = None;
        for cleanup in self.hooks.take_cleanups() {
            if let Err(err) = interp.call_function(&cleanup, Vec::new()) {
                first_error.get_or_insert(err.into_runtime_error());
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for ComponentInstance {
    fn drop(&mut self) {
        if let Err(err) = self.unmount() {
            debug!(error = %err, "effect cleanup failed during drop");
        }
    }
}
