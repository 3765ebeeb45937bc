use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::runtime::{
    data_type::DataType,
    gc::{HeapData, HeapStats, Identifier},
};

use super::MachineState;

/// Serializable view of one environment frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSnapshot {
    pub id: Identifier,
    pub label: String,
    pub parent: Option<Identifier>,
    pub bindings: BTreeMap<String, String>,
    pub constants: Vec<String>,
}

/// Serializable view of one live heap node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub id: Identifier,
    pub data_type: DataType,
    pub ref_count: usize,
    pub dependencies: Vec<Identifier>,
    pub summary: String,
}

/// Serializable view of a whole machine state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub control: Vec<String>,
    pub stash: Vec<String>,
    pub current_frame: Identifier,
    pub frames: Vec<FrameSnapshot>,
    pub heap: Vec<NodeSnapshot>,
    pub stats: HeapStats,
}

impl StateSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// SHA-256 of the JSON encoding, as lowercase hex.
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(to_hex(&hasher.finalize()))
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

impl<F: Clone> MachineState<F> {
    pub fn snapshot(&self) -> StateSnapshot {
        let mut frames = Vec::new();
        let mut heap = Vec::new();
        for (id, node) in self.heap.iter() {
            let Some(data) = &node.data else {
                continue;
            };
            if let HeapData::Frame(frame) = data {
                frames.push(FrameSnapshot {
                    id,
                    label: frame.label.clone(),
                    parent: frame.parent,
                    bindings: frame
                        .bindings
                        .iter()
                        .map(|(name, value)| (name.clone(), value.to_string()))
                        .collect(),
                    constants: frame
                        .constant
                        .iter()
                        .filter(|(_, constant)| **constant)
                        .map(|(name, _)| name.clone())
                        .collect(),
                });
            }
            heap.push(NodeSnapshot {
                id,
                data_type: node.data_type,
                ref_count: node.ref_count,
                dependencies: node.dependencies.iter().copied().collect(),
                summary: data.summary(),
            });
        }

        StateSnapshot {
            control: self.control.iter().map(|i| i.to_string()).collect(),
            stash: self.stash.iter().map(|v| v.to_string()).collect(),
            current_frame: self.current_frame,
            frames,
            heap,
            stats: self.heap.stats(),
        }
    }
}
