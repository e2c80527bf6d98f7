pub mod circuit;
pub mod loader;
pub mod schema;

pub use circuit::ResolvedCircuit;
pub use loader::{CircuitBundle, DataLoadError, Format, load_circuit, load_circuit_dir, parse_circuit};
