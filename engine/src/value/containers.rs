use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;

use super::{HashedValue, Value};

fn frozen_error(verb: &str, type_name: &str) -> String {
    format!("cannot {} frozen {}", verb, type_name)
}

#[derive(Default)]
pub struct List {
    items: Mutex<Vec<Value>>,
    frozen: AtomicBool,
}

impl List {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: Mutex::new(items),
            frozen: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> Vec<Value> {
        self.items.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.lock().get(index).cloned()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Runs `f` on the items unless the list is frozen. `verb` names the
    /// operation in the error message.
    pub fn mutate<R>(&self, verb: &str, f: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R, String> {
        if self.is_frozen() {
            return Err(frozen_error(verb, "list"));
        }
        Ok(f(&mut self.items.lock()))
    }

    pub(crate) fn freeze(&self) {
        if !self.frozen.swap(true, Ordering::AcqRel) {
            self.snapshot().iter().for_each(Value::freeze);
        }
    }
}

#[derive(Default)]
pub struct Dict {
    entries: Mutex<IndexMap<HashedValue, Value>>,
    frozen: AtomicBool,
}

impl Dict {
    pub fn snapshot(&self) -> Vec<(Value, Value)> {
        self.entries
            .lock()
            .iter()
            .map(|(k, v)| (k.value().clone(), v.clone()))
            .collect()
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries
            .lock()
            .keys()
            .map(|k| k.value().clone())
            .collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn get(&self, key: &Value) -> Result<Option<Value>, String> {
        let key = HashedValue::new(key.clone())?;
        Ok(self.entries.lock().get(&key).cloned())
    }

    pub fn contains(&self, key: &Value) -> Result<bool, String> {
        let key = HashedValue::new(key.clone())?;
        Ok(self.entries.lock().contains_key(&key))
    }

    pub fn insert(&self, key: Value, value: Value) -> Result<(), String> {
        let key = HashedValue::new(key)?;
        self.mutate("insert into", |entries| {
            entries.insert(key, value);
        })
    }

    pub fn remove(&self, key: &Value) -> Result<Option<Value>, String> {
        let key = HashedValue::new(key.clone())?;
        self.mutate("delete from", |entries| entries.shift_remove(&key))
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    pub fn mutate<R>(
        &self,
        verb: &str,
        f: impl FnOnce(&mut IndexMap<HashedValue, Value>) -> R,
    ) -> Result<R, String> {
        if self.is_frozen() {
            return Err(frozen_error(verb, "dict"));
        }
        Ok(f(&mut self.entries.lock()))
    }

    pub(crate) fn freeze(&self) {
        if !self.frozen.swap(true, Ordering::AcqRel) {
            for (key, value) in self.snapshot() {
                key.freeze();
                value.freeze();
            }
        }
    }
}

#[derive(Default)]
pub struct Set {
    items: Mutex<IndexSet<HashedValue>>,
    frozen: AtomicBool,
}

impl Set {
    pub fn snapshot(&self) -> Vec<Value> {
        self.items.lock().iter().map(|k| k.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn contains(&self, item: &Value) -> Result<bool, String> {
        let item = HashedValue::new(item.clone())?;
        Ok(self.items.lock().contains(&item))
    }

    pub fn insert(&self, item: Value) -> Result<(), String> {
        let item = HashedValue::new(item)?;
        self.mutate("insert into", |items| {
            items.insert(item);
        })
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    pub fn mutate<R>(&self, verb: &str, f: impl FnOnce(&mut IndexSet<HashedValue>) -> R) -> Result<R, String> {
        if self.is_frozen() {
            return Err(frozen_error(verb, "set"));
        }
        Ok(f(&mut self.items.lock()))
    }

    pub(crate) fn freeze(&self) {
        if !self.frozen.swap(true, Ordering::AcqRel) {
            self.snapshot().iter().for_each(Value::freeze);
        }
    }
}
