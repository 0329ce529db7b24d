//! Opcode id encoding: `family`/`operation`/`variant` subfields packed into
//! a dense `u32`, generalizing the teacher's flat `#[repr(u8)] enum OpCode`
//! (`vm/bytecode.rs`) into a table keyed by an id the gene-mutation
//! subsystem can decompose and re-encode.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::molecule::VALUE_MASK;

const OPERATION_SHIFT: u32 = 8;
const FAMILY_SHIFT: u32 = 16;
const FIELD_MASK: u32 = 0xFF;

/// Coarse grouping the thermodynamic policy layer and gene substitution
/// both walk: "family override" in the policy resolution order, and the
/// scope of a CODE mutation's family-flip mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromPrimitive)]
#[repr(u8)]
pub enum Family {
    Arithmetic = 1,
    Control = 2,
    Stack = 3,
    WorldAccess = 4,
    DataMovement = 5,
    Reproduction = 6,
}

/// Addressing-mode / arity group. Two opcodes in the same variant always
/// have the same operand signature shape, so a variant-flip mutation never
/// changes instruction length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromPrimitive)]
#[repr(u8)]
pub enum Variant {
    Immediate = 1,
    Register = 2,
    Plain = 3,
}

/// A dense opcode id: `[family|operation|variant]`, value bits only (the
/// marker bits of the molecule that carries it are never part of the id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpcodeId(pub u32);

impl OpcodeId {
    pub fn encode(family: Family, operation: u8, variant: Variant) -> Self {
        let id = ((family as u32) << FAMILY_SHIFT)
            | ((u32::from(operation) & FIELD_MASK) << OPERATION_SHIFT)
            | (variant as u32);
        debug_assert!(id <= VALUE_MASK, "opcode id must fit in the molecule value bits");
        OpcodeId(id)
    }

    pub fn family_bits(self) -> u8 {
        ((self.0 >> FAMILY_SHIFT) & FIELD_MASK) as u8
    }

    pub fn operation_bits(self) -> u8 {
        ((self.0 >> OPERATION_SHIFT) & FIELD_MASK) as u8
    }

    pub fn variant_bits(self) -> u8 {
        (self.0 & FIELD_MASK) as u8
    }

    /// Decodes the family subfield into its enum, or `None` for an id whose
    /// family bits don't name one of the known families.
    pub fn family(self) -> Option<Family> {
        Family::from_u8(self.family_bits())
    }

    /// Decodes the variant subfield into its enum, or `None` for an id
    /// whose variant bits don't name one of the known variants.
    pub fn variant(self) -> Option<Variant> {
        Variant::from_u8(self.variant_bits())
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trips_subfields() {
        let id = OpcodeId::encode(Family::Arithmetic, 3, Variant::Register);
        assert_eq!(id.family_bits(), Family::Arithmetic as u8);
        assert_eq!(id.operation_bits(), 3);
        assert_eq!(id.variant_bits(), Variant::Register as u8);
    }

    #[test]
    fn encoded_id_fits_in_value_mask() {
        let id = OpcodeId::encode(Family::Reproduction, 255, Variant::Plain);
        assert!(id.value() <= VALUE_MASK);
    }

    #[test]
    fn family_and_variant_decode_back_from_an_encoded_id() {
        let id = OpcodeId::encode(Family::WorldAccess, 7, Variant::Immediate);
        assert_eq!(id.family(), Some(Family::WorldAccess));
        assert_eq!(id.variant(), Some(Variant::Immediate));
    }
}
