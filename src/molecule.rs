//! The atom of the world: a packed 32-bit value with a type tag, a value
//! payload and an ownership-transfer marker.

use serde::{Deserialize, Serialize};

/// Low 24 bits hold the value payload.
pub const VALUE_MASK: u32 = 0x00FF_FFFF;
/// The type tag occupies bits 24..28.
pub const TYPE_SHIFT: u32 = 24;
const TYPE_MASK: u32 = 0x0F;
/// The ownership-transfer marker occupies the top 4 bits.
pub const MARKER_SHIFT: u32 = 28;
pub const MARKER_MASK: u32 = 0x0F;

/// The closed set of molecule type tags. At most eight values fit in the
/// four type bits; `Reserved` exists so future types don't need a layout
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MoleculeType {
    Code = 0,
    Data = 1,
    Energy = 2,
    Structure = 3,
    Label = 4,
    LabelRef = 5,
    Register = 6,
    Reserved = 7,
}

impl MoleculeType {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0 => MoleculeType::Code,
            1 => MoleculeType::Data,
            2 => MoleculeType::Energy,
            3 => MoleculeType::Structure,
            4 => MoleculeType::Label,
            5 => MoleculeType::LabelRef,
            6 => MoleculeType::Register,
            _ => MoleculeType::Reserved,
        }
    }
}

/// A packed molecule word: `[marker|type|value]`. Value-typed and freely
/// copied; the zero word is the canonical empty cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Molecule(u32);

impl Molecule {
    pub const EMPTY: Molecule = Molecule(0);

    pub fn new(kind: MoleculeType, value: u32, marker: u8) -> Self {
        let packed = (value & VALUE_MASK)
            | ((kind as u32) << TYPE_SHIFT)
            | (((marker as u32) & MARKER_MASK) << MARKER_SHIFT);
        Molecule(packed)
    }

    pub fn from_int(raw: u32) -> Self {
        Molecule(raw)
    }

    pub fn to_int(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn kind(self) -> MoleculeType {
        MoleculeType::from_bits((self.0 >> TYPE_SHIFT) & TYPE_MASK)
    }

    pub fn value(self) -> u32 {
        self.0 & VALUE_MASK
    }

    pub fn marker(self) -> u8 {
        ((self.0 >> MARKER_SHIFT) & MARKER_MASK) as u8
    }

    pub fn with_marker(self, marker: u8) -> Self {
        Molecule::new(self.kind(), self.value(), marker)
    }

    pub fn is_code(self) -> bool {
        self.kind() == MoleculeType::Code
    }

    pub fn is_label(self) -> bool {
        self.kind() == MoleculeType::Label
    }

    /// Interprets the value payload as a sign-extended two's-complement
    /// integer. Used by vector/label operand cells, which encode signed
    /// axis offsets in the same 24 value bits that unsigned operands use.
    pub fn value_signed(self) -> i64 {
        let raw = self.value();
        let sign_bit = 1u32 << 23;
        if raw & sign_bit != 0 {
            i64::from(raw) - i64::from(VALUE_MASK) - 1
        } else {
            i64::from(raw)
        }
    }

    pub fn new_signed(kind: MoleculeType, value: i64, marker: u8) -> Self {
        let wrapped = (value & i64::from(VALUE_MASK)) as u32;
        Molecule::new(kind, wrapped, marker)
    }
}

impl Default for Molecule {
    fn default() -> Self {
        Molecule::EMPTY
    }
}
