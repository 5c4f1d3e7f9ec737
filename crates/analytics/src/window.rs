//! Rolling windows
//!
//! Ordered buffers in insertion (time) order. A bounded window evicts its
//! oldest item once it holds more than `capacity` items.

use std::collections::vec_deque::{self, VecDeque};

#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    items: VecDeque<T>,
    capacity: Option<usize>,
}

impl<T> RollingWindow<T> {
    /// Window holding at most `capacity` items (a capacity of 0 is treated as 1)
    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity: Some(capacity),
        }
    }

    /// Window that never evicts
    pub fn unbounded() -> Self {
        Self {
            items: VecDeque::new(),
            capacity: None,
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
        if let Some(capacity) = self.capacity {
            while self.items.len() > capacity {
                self.items.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T: Clone> RollingWindow<T> {
    /// Owned copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<'a, T> IntoIterator for &'a RollingWindow<T> {
    type Item = &'a T;
    type IntoIter = vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
