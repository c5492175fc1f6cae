/// In-process multi-node harness, for the behaviors a single node can't exercise.
pub mod network;

pub use network::{MeshNode, MeshTestnet};
