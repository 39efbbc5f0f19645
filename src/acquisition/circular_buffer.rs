//! Fixed-capacity tri-axial sample ring
//!
//! The write cursor always points at the last-written slot. The first push
//! lands in slot 0, so the slot before the first push is `capacity - 1`.
//! Each time a write reaches the last slot a full lap of `capacity` fresh
//! samples is available and the overflow flag rises; it stays raised until
//! the consumer acknowledges it.

use crate::processing::ProcessingError;
use crate::types::{Axis, Sample3, Triaxial};

#[derive(Debug, Clone)]
pub struct CircularBuffer {
    axes: Triaxial<Vec<f32>>,
    capacity: usize,
    cursor: usize,
    len: usize,
    overflowed: bool,
}

impl CircularBuffer {
    pub fn new(capacity: usize) -> Result<Self, ProcessingError> {
        if capacity == 0 {
            return Err(ProcessingError::InvalidCapacity(capacity));
        }
        Ok(Self {
            axes: Triaxial::from_fn(|_| vec![0.0; capacity]),
            capacity,
            cursor: capacity - 1,
            len: 0,
            overflowed: false,
        })
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots holding real samples (saturates at capacity).
    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Index of the last-written slot.
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    pub const fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Consumer side: the pending full window has been scheduled.
    pub fn acknowledge_overflow(&mut self) {
        self.overflowed = false;
    }

    /// Store one sample after advancing the cursor. Returns the overflow flag.
    pub fn push(&mut self, sample: Sample3) -> bool {
        self.cursor = self.successor(self.cursor);
        for (axis, data) in self.axes.iter_mut() {
            data[self.cursor] = sample[axis];
        }
        self.len = (self.len + 1).min(self.capacity);
        if self.cursor == self.capacity - 1 {
            self.overflowed = true;
        }
        self.overflowed
    }

    /// Drop all samples; the next push lands in slot 0 again.
    pub fn clear(&mut self) {
        for (_, data) in self.axes.iter_mut() {
            data.fill(0.0);
        }
        self.cursor = self.capacity - 1;
        self.len = 0;
        self.overflowed = false;
    }

    /// Reallocate for a new capacity, discarding content.
    pub fn resize(&mut self, capacity: usize) -> Result<(), ProcessingError> {
        *self = Self::new(capacity)?;
        Ok(())
    }

    /// Slot written just before `index`, wrapping at 0.
    pub const fn predecessor(&self, index: usize) -> usize {
        if index == 0 {
            self.capacity - 1
        } else {
            index - 1
        }
    }

    pub const fn successor(&self, index: usize) -> usize {
        if index + 1 >= self.capacity {
            0
        } else {
            index + 1
        }
    }

    /// Slot of the oldest of the `count` most recent samples.
    pub const fn start_of_recent(&self, count: usize) -> usize {
        let back = count.saturating_sub(1) % self.capacity;
        (self.cursor + self.capacity - back) % self.capacity
    }

    pub fn get(&self, index: usize) -> Result<Sample3, ProcessingError> {
        self.check_index(index)?;
        Ok(Sample3::new(
            self.axes.x[index],
            self.axes.y[index],
            self.axes.z[index],
        ))
    }

    /// Raw slot storage for one axis.
    pub fn axis(&self, axis: Axis) -> &[f32] {
        &self.axes[axis]
    }

    /// Real samples available in a backward walk ending at `end_index`.
    pub const fn available_ending_at(&self, end_index: usize) -> usize {
        if self.len == self.capacity {
            self.capacity
        } else if end_index < self.len {
            end_index + 1
        } else {
            0
        }
    }

    /// Copy the `out.len()` samples ending at `end_index` into `out`,
    /// oldest first.
    pub fn extract_axis(
        &self,
        axis: Axis,
        end_index: usize,
        out: &mut [f32],
    ) -> Result<(), ProcessingError> {
        self.check_window(out.len(), end_index)?;
        let data = &self.axes[axis];
        let mut index = end_index;
        for slot in out.iter_mut().rev() {
            *slot = data[index];
            index = self.predecessor(index);
        }
        Ok(())
    }

    /// All three axes of the `count` samples ending at `end_index`, oldest first.
    pub fn extract_window(
        &self,
        count: usize,
        end_index: usize,
    ) -> Result<Triaxial<Vec<f32>>, ProcessingError> {
        self.check_window(count, end_index)?;
        let mut window = Triaxial::from_fn(|_| vec![0.0; count]);
        for (axis, out) in window.iter_mut() {
            self.extract_axis(axis, end_index, out)?;
        }
        Ok(window)
    }

    fn check_index(&self, index: usize) -> Result<(), ProcessingError> {
        if index >= self.capacity {
            return Err(ProcessingError::IndexOutOfRange {
                index,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    fn check_window(&self, count: usize, end_index: usize) -> Result<(), ProcessingError> {
        if count > self.capacity {
            return Err(ProcessingError::WindowExceedsCapacity {
                requested: count,
                capacity: self.capacity,
            });
        }
        self.check_index(end_index)?;
        let available = self.available_ending_at(end_index);
        if count > available {
            return Err(ProcessingError::InsufficientData {
                needed: count,
                available,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_x(v: f32) -> Sample3 {
        Sample3::new(v, 0.0, 0.0)
    }

    #[test]
    fn test_wrap_scenario_capacity_four() {
        let mut buf = CircularBuffer::new(4).unwrap();
        let flags: Vec<bool> = (1..=5).map(|v| buf.push(on_x(v as f32))).collect();
        assert_eq!(flags, vec![false, false, false, true, true]);
        assert_eq!(buf.cursor(), 0);
        assert!(buf.overflowed());
        let window = buf.extract_window(4, 0).unwrap();
        assert_eq!(window.x, vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_overflow_rises_once_per_lap() {
        let mut buf = CircularBuffer::new(8).unwrap();
        let mut rises = Vec::new();
        for i in 0..24 {
            if buf.push(on_x(i as f32)) {
                rises.push(i + 1);
                buf.acknowledge_overflow();
            }
        }
        assert_eq!(rises, vec![8, 16, 24]);
    }

    #[test]
    fn test_chronological_after_many_wraps() {
        let mut buf = CircularBuffer::new(5).unwrap();
        for i in 0..23 {
            buf.push(on_x(i as f32));
        }
        let mut out = [0.0; 5];
        buf.extract_axis(Axis::X, buf.cursor(), &mut out).unwrap();
        assert_eq!(out, [18.0, 19.0, 20.0, 21.0, 22.0]);
    }

    #[test]
    fn test_extract_errors() {
        let mut buf = CircularBuffer::new(4).unwrap();
        buf.push(on_x(1.0));
        buf.push(on_x(2.0));
        assert_eq!(
            buf.extract_window(5, 1),
            Err(ProcessingError::WindowExceedsCapacity {
                requested: 5,
                capacity: 4
            })
        );
        assert_eq!(
            buf.extract_window(3, 1),
            Err(ProcessingError::InsufficientData {
                needed: 3,
                available: 2
            })
        );
        assert!(matches!(
            buf.extract_window(1, 4),
            Err(ProcessingError::IndexOutOfRange { .. })
        ));
        assert_eq!(buf.extract_window(2, 1).unwrap().x, vec![1.0, 2.0]);
    }

    #[test]
    fn test_index_helpers() {
        let mut buf = CircularBuffer::new(4).unwrap();
        assert_eq!(buf.predecessor(0), 3);
        assert_eq!(buf.successor(3), 0);
        for v in 1..=6 {
            buf.push(on_x(v as f32));
        }
        // cursor at slot 1 holding 6; three most recent are 4, 5, 6
        assert_eq!(buf.cursor(), 1);
        let start = buf.start_of_recent(3);
        assert_eq!(buf.get(start).unwrap().x, 4.0);
        assert_eq!(buf.get(buf.predecessor(buf.cursor())).unwrap().x, 5.0);
    }

    #[test]
    fn test_clear_and_resize() {
        let mut buf = CircularBuffer::new(4).unwrap();
        for v in 0..4 {
            buf.push(on_x(v as f32));
        }
        buf.clear();
        assert!(buf.is_empty());
        assert!(!buf.overflowed());
        buf.push(on_x(9.0));
        assert_eq!(buf.cursor(), 0);
        buf.resize(16).unwrap();
        assert_eq!(buf.capacity(), 16);
        assert!(buf.resize(0).is_err());
    }
}
