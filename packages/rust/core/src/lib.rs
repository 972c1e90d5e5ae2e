//! Analysis job orchestration for LexRisk.
//!
//! This crate ties together chunking, per-chunk reasoning, document
//! classification, and the per-user job registry into a single cancellable
//! analysis job (see [`Orchestrator`]).

pub mod chunker;
pub mod classifier;
pub mod collaborators;
pub mod laws;
pub mod orchestrator;
pub mod registry;

pub use collaborators::{Indexer, Reasoner};
pub use orchestrator::{
    AnalysisOptions, AnalysisProgress, JobPhase, Orchestrator, RunningJob, SEPARATOR,
    SilentProgress,
};
pub use registry::{JobHandle, JobId, JobRegistry};
