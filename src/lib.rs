//! SAT-driven redundancy analysis for combinational AIGs.
//!
//! Load a circuit from its AAG form (or build one with [`CircuitBuilder`]),
//! then run [`rar::find_alternatives`] to search for alternative wires and
//! gate pairs. The lower layers are usable on their own: [`dfs`] for
//! canonical topological traversal, [`cnf`] for the solver encoding and
//! [`ma`] for mandatory-assignment propagation.

pub mod circuit;
pub mod cnf;
pub mod dfs;
pub mod ma;
pub mod rar;

// Re-exporting symbols and modules.
pub use circuit::{
    Circuit, CircuitBuilder, CircuitError, FaninId, Fanout, Gate, GateEdge, GateRef, LoaderError,
    NodeId, Result,
};
