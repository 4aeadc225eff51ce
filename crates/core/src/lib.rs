pub mod config;
pub mod error;
pub mod handler;
pub mod locator;
pub mod models;
pub mod normalizer;
pub mod routing;
pub mod scorer;
pub mod stores;
pub mod traits;

pub use config::ResolverConfig;
pub use error::{ConfigError, ResolveError, StoreError};
pub use handler::PreviewRequestHandler;
pub use locator::{CandidateLocator, ACCEPTANCE_FLOOR, HIGH_CONFIDENCE_SCORE};
pub use models::{
    CandidateObject, ListPage, ListedObject, NormalizedTarget, Phase, PreviewRequest,
    PreviewResponse, PreviewType, ResolutionResult, ScoredCandidate,
};
pub use normalizer::KeyNormalizer;
pub use routing::{parse_partition, Partition, RoutingTable};
pub use scorer::{score, SimilarityScorer};
pub use stores::{GatewayStore, LocalDirStore, MemoryStore};
pub use traits::ObjectStore;
pub use tokio_util::sync::CancellationToken;
