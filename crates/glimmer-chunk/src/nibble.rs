use std::sync::atomic::{AtomicU8, Ordering};

use glimmer_geom::MAX_LIGHT;

/// Packed 4-bit values, two per byte. Reads and writes are per-nibble atomic:
/// a write is a CAS on the containing byte and never disturbs its sibling.
#[derive(Debug)]
pub struct NibbleArray {
    data: Box<[AtomicU8]>,
    len: usize,
}

impl NibbleArray {
    pub fn new(len: usize) -> Self {
        Self::filled(len, 0)
    }

    pub fn filled(len: usize, value: u8) -> Self {
        debug_assert!(value <= MAX_LIGHT);
        let v = value & 0x0F;
        let byte = v | (v << 4);
        let data = (0..len.div_ceil(2)).map(|_| AtomicU8::new(byte)).collect();
        Self { data, len }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, i: usize) -> u8 {
        let byte = self.data[i >> 1].load(Ordering::Relaxed);
        if i & 1 == 0 { byte & 0x0F } else { byte >> 4 }
    }

    /// Stores `value` and returns the previous one.
    #[inline]
    pub fn set(&self, i: usize, value: u8) -> u8 {
        debug_assert!(value <= MAX_LIGHT, "light value {value} out of range");
        let value = value & 0x0F;
        let shift = (i & 1) * 4;
        let mask = 0x0F_u8 << shift;
        let prev = self.data[i >> 1]
            .fetch_update(Ordering::AcqRel, Ordering::Relaxed, |byte| {
                Some((byte & !mask) | (value << shift))
            })
            .unwrap_or_else(|byte| byte);
        (prev & mask) >> shift
    }

    pub fn fill(&self, value: u8) {
        debug_assert!(value <= MAX_LIGHT);
        let v = value & 0x0F;
        let byte = v | (v << 4);
        for cell in self.data.iter() {
            cell.store(byte, Ordering::Relaxed);
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        (0..self.len).map(|i| self.get(i)).collect()
    }
}
