// src/processing/mod.rs
pub mod accumulate;
pub mod fit;
pub mod normalize;
pub mod parallel;
pub mod pixel;

// Re-export main components
pub use accumulate::accumulate;
pub use fit::{Family, FitError, FittedModel};
pub use parallel::{IndexCube, OutcomeTally, SpeiProcessor};
pub use pixel::{compute_indices, GapPolicy, IndexParams, PixelIndices, SkipReason};
