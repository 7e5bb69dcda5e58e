//! Fixed-capacity backpointer history
//!
//! One row of backpointers per processed block, stored in a single flat
//! buffer. When full, the oldest row is overwritten.

/// Ring of backpointer rows
#[derive(Debug, Clone)]
pub struct PathHistory {
    width: usize,
    capacity: usize,
    data: Vec<u32>,
    /// Slot the next row is written to
    head: usize,
    len: usize,
}

impl PathHistory {
    pub fn new(width: usize, capacity: usize) -> Self {
        Self {
            width,
            capacity,
            data: vec![0; width * capacity],
            head: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a row, overwriting the oldest when full.
    ///
    /// Rows shorter than the width are zero padded; longer rows are cut.
    pub fn push(&mut self, row: &[u32]) {
        if self.capacity == 0 || self.width == 0 {
            return;
        }
        let start = self.head * self.width;
        let slot = &mut self.data[start..start + self.width];
        let n = row.len().min(self.width);
        slot[..n].copy_from_slice(&row[..n]);
        slot[n..].fill(0);

        self.head = (self.head + 1) % self.capacity;
        self.len = (self.len + 1).min(self.capacity);
    }

    /// Row pushed `age` blocks ago (0 = newest)
    pub fn row(&self, age: usize) -> Option<&[u32]> {
        if age >= self.len {
            return None;
        }
        let slot = (self.head + self.capacity - 1 - age) % self.capacity;
        let start = slot * self.width;
        Some(&self.data[start..start + self.width])
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Trace a path back from `last` through the retained rows.
    ///
    /// Returned oldest first, ending on `last`. Holds `len() + 1` entries
    /// when at least one row is retained.
    pub fn trace(&self, last: usize) -> Vec<usize> {
        let mut path = Vec::with_capacity(self.len + 1);
        let mut state = last;
        path.push(state);
        for age in 0..self.len {
            let Some(row) = self.row(age) else { break };
            let Some(&prev) = row.get(state) else { break };
            state = prev as usize;
            path.push(state);
        }
        path.reverse();
        path
    }
}
