//! # Sequence Window
//!
//! A fixed-capacity ring buffer turning a stream of vectors into fixed-length
//! batches for a recurrent layer. Slots are overwritten in place; once the
//! window has seen `capacity` pushes every further push yields the latest
//! `capacity` vectors, oldest first.

use crate::error::{CoreError, Result};
use crate::tensor::{Sequence, Vector};

#[derive(Debug, Clone)]
pub struct Window {
    slots: Vec<Vector>,
    capacity: usize,
    cursor: usize,
}

impl Window {
    /// Create an empty window. A zero capacity is rejected.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CoreError::config("window capacity must be at least 1"));
        }
        Ok(Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of vectors pushed so far.
    pub fn pushes(&self) -> usize {
        self.cursor
    }

    pub fn is_ready(&self) -> bool {
        self.cursor >= self.capacity
    }

    /// Write `v` and return the current batch once the window is full.
    pub fn push(&mut self, v: Vector) -> Option<Sequence> {
        let slot = self.cursor % self.capacity;
        if slot < self.slots.len() {
            self.slots[slot] = v;
        } else {
            self.slots.push(v);
        }
        self.cursor += 1;

        if !self.is_ready() {
            return None;
        }
        // the oldest element sits right after the slot just written
        let start = self.cursor % self.capacity;
        Some(
            (0..self.capacity)
                .map(|i| self.slots[(start + i) % self.capacity].clone())
                .collect(),
        )
    }
}

/// Split a batch into `(inputs, expected)` for next-step prediction:
/// the batch without its last row and the batch without its first row.
pub fn split_window(batch: &[Vector]) -> Result<(Sequence, Sequence)> {
    if batch.len() < 2 {
        return Err(CoreError::EmptySequence { op: "split_window" });
    }
    Ok((
        batch[..batch.len() - 1].to_vec(),
        batch[1..].to_vec(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f64) -> Vector {
        Vector::from([x])
    }

    #[test]
    fn test_not_ready_until_full() {
        let mut w = Window::new(3).unwrap();
        assert!(w.push(v(1.0)).is_none());
        assert!(w.push(v(2.0)).is_none());
        assert!(!w.is_ready());

        let batch = w.push(v(3.0)).unwrap();
        assert_eq!(batch, vec![v(1.0), v(2.0), v(3.0)]);
        assert_eq!(w.pushes(), 3);
    }

    #[test]
    fn test_rolls_in_chronological_order() {
        let mut w = Window::new(3).unwrap();
        for i in 0..3 {
            w.push(v(i as f64));
        }
        let batch = w.push(v(3.0)).unwrap();
        assert_eq!(batch, vec![v(1.0), v(2.0), v(3.0)]);

        let batch = w.push(v(4.0)).unwrap();
        assert_eq!(batch, vec![v(2.0), v(3.0), v(4.0)]);
    }

    #[test]
    fn test_capacity_one() {
        let mut w = Window::new(1).unwrap();
        assert_eq!(w.push(v(5.0)).unwrap(), vec![v(5.0)]);
        assert_eq!(w.push(v(6.0)).unwrap(), vec![v(6.0)]);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(Window::new(0), Err(CoreError::InvalidConfig { .. })));
    }

    #[test]
    fn test_split_window() {
        let batch = vec![v(1.0), v(2.0), v(3.0)];
        let (inputs, expected) = split_window(&batch).unwrap();
        assert_eq!(inputs, vec![v(1.0), v(2.0)]);
        assert_eq!(expected, vec![v(2.0), v(3.0)]);

        assert!(split_window(&batch[..1]).is_err());
    }
}
