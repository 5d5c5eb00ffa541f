//! Category index reconciliation and mutation

pub mod mutator;
pub mod reader;

pub use mutator::{compute_index, IndexAction, IndexChange, IndexMutator, MutationOutcome};
pub use reader::{reconcile, IndexReader, IndexSource, ReconciledIndex};
