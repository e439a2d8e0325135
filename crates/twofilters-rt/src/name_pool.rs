//! Rotating pool of fixed-size name buffers.
//!
//! Messages are plain `Copy` values, so a patch name travels as a
//! [`NameHandle`] into this pool instead of an owned string. Slots are reused
//! round-robin; a handle stays readable until its slot is written again.

use std::fmt;
use std::sync::atomic::{fence, AtomicU32, AtomicU8, AtomicUsize, Ordering};

/// Bytes per name including the implicit terminator slot.
pub const NAME_CAPACITY: usize = 256;
const MAX_NAME_BYTES: usize = NAME_CAPACITY - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("name slot {slot} does not exist")]
    InvalidSlot { slot: u32 },
    #[error("name slot {slot} was overwritten before it was read")]
    Overwritten { slot: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameHandle {
    slot: u32,
    sequence: u32,
}

/// Fixed-capacity UTF-8 name storage that never allocates.
#[derive(Clone, Copy)]
pub struct NameBuffer {
    bytes: [u8; NAME_CAPACITY],
    len: usize,
}

impl Default for NameBuffer {
    fn default() -> Self {
        Self {
            bytes: [0; NAME_CAPACITY],
            len: 0,
        }
    }
}

impl NameBuffer {
    pub fn new(name: &str) -> Self {
        let mut buffer = Self::default();
        buffer.set(name);
        buffer
    }

    /// Stores `name`, truncated on a character boundary to 255 bytes.
    pub fn set(&mut self, name: &str) {
        let len = truncated_len(name);
        self.bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
        self.len = len;
    }

    pub fn as_str(&self) -> &str {
        // Only ever filled from `&str` on a char boundary or from a pool slot
        // written the same way.
        std::str::from_utf8(&self.bytes[..self.len]).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for NameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NameBuffer").field(&self.as_str()).finish()
    }
}

impl PartialEq for NameBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

fn truncated_len(name: &str) -> usize {
    if name.len() <= MAX_NAME_BYTES {
        return name.len();
    }
    let mut len = MAX_NAME_BYTES;
    while !name.is_char_boundary(len) {
        len -= 1;
    }
    len
}

struct NameSlot {
    // Odd while a write is in progress.
    sequence: AtomicU32,
    len: AtomicUsize,
    bytes: [AtomicU8; NAME_CAPACITY],
}

impl NameSlot {
    fn new() -> Self {
        Self {
            sequence: AtomicU32::new(0),
            len: AtomicUsize::new(0),
            bytes: std::array::from_fn(|_| AtomicU8::new(0)),
        }
    }
}

/// Pool shared by one writing thread and one reading thread.
pub struct NamePool {
    slots: Box<[NameSlot]>,
    next: AtomicUsize,
}

impl NamePool {
    pub fn new(slots: usize) -> Self {
        Self {
            slots: (0..slots.max(1)).map(|_| NameSlot::new()).collect(),
            next: AtomicUsize::new(0),
        }
    }

    pub fn slots(&self) -> usize {
        self.slots.len()
    }

    /// Copies `name` into the next slot. Does not allocate.
    pub fn write(&self, name: &str) -> NameHandle {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        let slot = &self.slots[index];
        let len = truncated_len(name);
        if len < name.len() {
            tracing::debug!(len = name.len(), "patch name truncated");
        }

        let start = slot.sequence.load(Ordering::Relaxed);
        slot.sequence.store(start.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        for (dst, src) in slot.bytes.iter().zip(&name.as_bytes()[..len]) {
            dst.store(*src, Ordering::Relaxed);
        }
        slot.len.store(len, Ordering::Relaxed);
        let sequence = start.wrapping_add(2);
        slot.sequence.store(sequence, Ordering::Release);

        NameHandle {
            slot: index as u32,
            sequence,
        }
    }

    /// Copies the name behind `handle` into `out`. Fails if the slot has been
    /// reused since the handle was issued, leaving `out` untouched.
    pub fn read(&self, handle: NameHandle, out: &mut NameBuffer) -> Result<(), NameError> {
        let slot = self
            .slots
            .get(handle.slot as usize)
            .ok_or(NameError::InvalidSlot { slot: handle.slot })?;
        let overwritten = NameError::Overwritten { slot: handle.slot };

        if slot.sequence.load(Ordering::Acquire) != handle.sequence {
            return Err(overwritten);
        }
        let len = slot.len.load(Ordering::Relaxed).min(MAX_NAME_BYTES);
        let mut scratch = [0u8; NAME_CAPACITY];
        for (dst, src) in scratch.iter_mut().zip(&slot.bytes[..len]) {
            *dst = src.load(Ordering::Relaxed);
        }
        fence(Ordering::Acquire);
        if slot.sequence.load(Ordering::Relaxed) != handle.sequence {
            return Err(overwritten);
        }

        let text = match std::str::from_utf8(&scratch[..len]) {
            Ok(text) => text,
            Err(_) => return Err(overwritten),
        };
        out.set(text);
        Ok(())
    }

    pub fn read_to_string(&self, handle: NameHandle) -> Result<String, NameError> {
        let mut buffer = NameBuffer::default();
        self.read(handle, &mut buffer)?;
        Ok(buffer.as_str().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundary() {
        let name = "é".repeat(200);
        let buffer = NameBuffer::new(&name);
        assert_eq!(buffer.len(), 254);
        assert!(buffer.as_str().chars().all(|c| c == 'é'));
    }
}
