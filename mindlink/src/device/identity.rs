//! Stable display identity per device: the first device seen gets the first
//! palette slot, and keeps it for as long as the registry lives. Slots are
//! not reused when a device goes away, so a reconnecting headset keeps its
//! color.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const DEFAULT_PALETTE: [Rgb; 8] = [
    Rgb(0x4e, 0x79, 0xa7),
    Rgb(0xf2, 0x8e, 0x2b),
    Rgb(0xe1, 0x57, 0x59),
    Rgb(0x76, 0xb7, 0xb2),
    Rgb(0x59, 0xa1, 0x4f),
    Rgb(0xed, 0xc9, 0x48),
    Rgb(0xb0, 0x7a, 0xa1),
    Rgb(0xff, 0x9d, 0xa7),
];

pub struct IdentityRegistry {
    palette: Vec<Rgb>,
    slots: HashMap<String, usize>,
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        IdentityRegistry::new(DEFAULT_PALETTE.to_vec())
    }
}

impl IdentityRegistry {
    /// An empty palette falls back to `DEFAULT_PALETTE`.
    pub fn new(palette: Vec<Rgb>) -> IdentityRegistry {
        IdentityRegistry {
            palette: if palette.is_empty() {
                DEFAULT_PALETTE.to_vec()
            } else {
                palette
            },
            slots: HashMap::new(),
        }
    }

    /// Index of `device` in order of first appearance.
    pub fn slot(&mut self, device: &str) -> usize {
        let next = self.slots.len();
        *self.slots.entry(device.to_string()).or_insert(next)
    }

    /// Color of `device`. Wraps around the palette past its length.
    pub fn color(&mut self, device: &str) -> Rgb {
        let slot = self.slot(device);
        self.palette[slot % self.palette.len()]
    }

    pub fn known(&self, device: &str) -> bool {
        self.slots.contains_key(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_are_stable_and_distinct() {
        let mut ids = IdentityRegistry::default();
        let a = ids.color("A");
        let b = ids.color("B");
        assert_ne!(a, b);
        assert_eq!(ids.color("A"), a);
        assert_eq!(ids.slot("B"), 1);
    }

    #[test]
    fn palette_wraps() {
        let mut ids = IdentityRegistry::new(vec![Rgb(1, 1, 1), Rgb(2, 2, 2)]);
        ids.color("A");
        ids.color("B");
        assert_eq!(ids.color("C"), Rgb(1, 1, 1));
        assert!(ids.known("C"));
        assert!(!ids.known("D"));
    }
}
