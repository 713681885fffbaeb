//! Promote module - moves license-cleared packages into release repositories.
//!
//! This module provides the promotion engine:
//! - **Classification**: ecosystem and package type from BOM properties via [`classifier`]
//! - **Ecosystems**: per-ecosystem layout and search rules via [`ecosystem::EcosystemRules`]
//! - **Search**: artifact lookups through the store's query API via [`ArtifactSearch`]
//! - **Store**: HTTP client for search and copy/move via [`HttpArtifactStore`]
//! - **Pipeline**: sequential orchestrator via [`TransferPipeline`]
//! - **Report**: counters, per-ecosystem buckets and BOM patching via [`PromotionReport`]

pub mod classifier;
pub mod ecosystem;
pub mod pipeline;
pub mod report;
pub mod search;
pub mod store;
pub mod traits;

#[cfg(test)]
mod mock;

// Re-export commonly used types
pub use traits::{
    ArtifactLocation, BuildError, ComponentTransferRequest, Ecosystem, OutcomeBucket, PackageType,
    RunError, SearchMatch, TransferOperation, TransferOutcome, TransferState,
};

pub use classifier::{classify, Classification};
pub use ecosystem::{build_transfer_urls, EcosystemRules, SearchStrategy, TransferUrls};
pub use pipeline::{ResolutionStrategy, TransferPipeline};
pub use report::{Counters, EcosystemBuckets, ExitStatus, OutcomeAggregator, PromotionReport};
pub use search::{ArtifactSearch, SearchQuery};
pub use store::HttpArtifactStore;
