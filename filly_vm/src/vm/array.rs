//! ArrayValue - the growable, reference-semantic container behind
//! `Value::Array`.
//!
//! An array owns an ordered sequence of cells, every cell a defined `Value`.
//! Handles are `Arc<RwLock<_>>`: cloning a handle shares the container, which
//! is how reference semantics surface to scripts, and the lock tolerates the
//! rare host thread that reads an array directly while the interpreter owns
//! the write side.

use std::sync::{Arc, RwLock};

use super::value::Value;

pub type ArrayRef = Arc<RwLock<ArrayValue>>;

/// Wrap cells in a fresh shared handle.
pub fn new_array_ref(cells: Vec<Value>) -> ArrayRef {
    Arc::new(RwLock::new(ArrayValue::new(cells)))
}

#[derive(Debug, Default)]
pub struct ArrayValue {
    cells: Vec<Value>,
}

impl ArrayValue {
    pub fn new(cells: Vec<Value>) -> Self {
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Read cell `index`. Negative and out-of-range reads yield `None`;
    /// the caller decides how loudly to report them.
    pub fn get(&self, index: i64) -> Option<Value> {
        if index < 0 {
            return None;
        }
        self.cells.get(index as usize).cloned()
    }

    /// Write cell `index`, growing the array as needed. Cells introduced by
    /// the growth are `I64(0)`. A negative index is a no-op and reports
    /// `false`.
    pub fn set(&mut self, index: i64, value: Value) -> bool {
        if index < 0 {
            return false;
        }
        let index = index as usize;
        if index >= self.cells.len() {
            self.cells.resize_with(index + 1, || Value::I64(0));
        }
        self.cells[index] = value;
        true
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Remove cell `index`, splicing the tail left. Yields the removed cell,
    /// or `None` on a negative or out-of-range index.
    pub fn delete_at(&mut self, index: i64) -> Option<Value> {
        if index < 0 || index as usize >= self.cells.len() {
            return None;
        }
        Some(self.cells.remove(index as usize))
    }

    /// Insert `value` before cell `index`, splicing the tail right.
    /// `index == len` appends. Reports `false` on a negative or past-the-end
    /// index.
    pub fn insert_at(&mut self, index: i64, value: Value) -> bool {
        if index < 0 || index as usize > self.cells.len() {
            return false;
        }
        self.cells.insert(index as usize, value);
        true
    }

    pub fn cells(&self) -> &[Value] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|&v| Value::I64(v)).collect()
    }

    fn as_ints(arr: &ArrayValue) -> Vec<i64> {
        arr.cells()
            .iter()
            .map(|v| v.coerce_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_set_auto_expands_and_zero_fills() {
        let mut arr = ArrayValue::default();
        assert!(arr.set(4, Value::I64(9)));
        assert_eq!(arr.len(), 5);
        assert_eq!(as_ints(&arr), vec![0, 0, 0, 0, 9]);
    }

    #[test]
    fn test_set_preserves_existing_cells() {
        let mut arr = ArrayValue::new(ints(&[1, 2, 3]));
        arr.set(5, Value::I64(7));
        assert_eq!(as_ints(&arr), vec![1, 2, 3, 0, 0, 7]);
    }

    #[test]
    fn test_negative_index_is_refused() {
        let mut arr = ArrayValue::new(ints(&[1]));
        assert!(!arr.set(-1, Value::I64(5)));
        assert_eq!(arr.get(-1), None);
        assert_eq!(arr.len(), 1);
    }

    #[test]
    fn test_out_of_range_read_is_none() {
        let arr = ArrayValue::new(ints(&[1, 2]));
        assert!(arr.get(2).is_none());
        assert!(arr.get(1).is_some());
    }

    #[test]
    fn test_insert_then_delete_round_trips() {
        for i in 0..=3i64 {
            let mut arr = ArrayValue::new(ints(&[10, 20, 30]));
            assert!(arr.insert_at(i, Value::I64(99)));
            assert_eq!(arr.len(), 4);
            assert!(arr.delete_at(i).is_some());
            assert_eq!(as_ints(&arr), vec![10, 20, 30]);
        }
    }

    #[test]
    fn test_insert_at_len_appends() {
        let mut arr = ArrayValue::new(ints(&[1]));
        assert!(arr.insert_at(1, Value::I64(2)));
        assert_eq!(as_ints(&arr), vec![1, 2]);
        assert!(!arr.insert_at(5, Value::I64(3)));
    }

    #[test]
    fn test_delete_out_of_range_fails() {
        let mut arr = ArrayValue::new(ints(&[1]));
        assert!(arr.delete_at(1).is_none());
        assert!(arr.delete_at(-1).is_none());
    }

    #[test]
    fn test_clear_then_set() {
        let mut arr = ArrayValue::new(ints(&[1, 2, 3]));
        arr.clear();
        assert!(arr.is_empty());
        arr.set(0, Value::I64(5));
        assert_eq!(arr.len(), 1);
        assert_eq!(as_ints(&arr), vec![5]);
    }

    #[test]
    fn test_shared_handle_observes_mutation() {
        let a = new_array_ref(ints(&[1, 2, 3]));
        let b = Arc::clone(&a);
        b.write().unwrap().set(2, Value::I64(99));
        assert_eq!(as_ints(&a.read().unwrap()), vec![1, 2, 99]);
    }
}
