//! Conductor: the AI request orchestration core
//!
//! Accepts chat, search and research requests, plans them as graphs or task
//! DAGs, dispatches model work through the model manager, and returns fully
//! materialized results with cost, latency and confidence accounting.
//!
//! The HTTP edge, caching backend, analytics storage and concrete external
//! providers live outside this workspace; [`Services`] carries the narrow
//! interfaces they implement. No global singletons: everything a request
//! needs is injected at construction.

pub mod analytics;
pub mod api;
pub mod config;
pub mod envelope;
pub mod error;
pub mod requests;
pub mod responses;

pub use analytics::{AnalyticsEvent, AnalyticsSink, NoopSink, TracingSink};
pub use api::{Conductor, Services};
pub use config::ConductorConfig;
pub use error::ConductorError;
pub use requests::{ChatRequest, ResearchRequest, SearchRequest};
pub use responses::{
    ChatResult, ErrorEntry, ResearchResult, ResponseMetadata, ResponseStatus, SearchResult,
    SearchResultItem, ServiceError,
};
