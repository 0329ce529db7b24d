//! The compiler frontend's output, as consumed by the runtime. The core
//! never parses EvoASM; it only places molecules from this map and reads
//! labels back for debug display.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::coord::Coord;

/// Placeable program artifact produced by the (out-of-scope) EvoASM
/// compiler frontend: initial world contents, label name bindings and
/// debug metadata, all read-only from the runtime's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramArtifact {
    pub program_id: String,
    pub machine_code_layout: HashMap<Coord, u32>,
    pub label_name_to_value: HashMap<String, i64>,
    pub debug_metadata: HashMap<String, String>,
}

impl ProgramArtifact {
    pub fn new(program_id: impl Into<String>) -> Self {
        ProgramArtifact {
            program_id: program_id.into(),
            machine_code_layout: HashMap::new(),
            label_name_to_value: HashMap::new(),
            debug_metadata: HashMap::new(),
        }
    }

    pub fn with_cell(mut self, coord: Coord, packed: u32) -> Self {
        self.machine_code_layout.insert(coord, packed);
        self
    }

    pub fn with_label(mut self, name: impl Into<String>, value: i64) -> Self {
        self.label_name_to_value.insert(name.into(), value);
        self
    }

    pub fn label_value(&self, name: &str) -> Option<i64> {
        self.label_name_to_value.get(name).copied()
    }
}
