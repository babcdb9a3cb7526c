//! Request pipelines for conductor
//!
//! The concrete graphs a request flows through, plus the routing brain and
//! the collaborator seams they depend on:
//!
//! - [`SmartRouter`] - pure query analysis and budget-aware strategy
//!   selection for search pipelines; never performs I/O
//! - [`chat`] - context -> intent -> generate -> cache-update
//! - [`search`] - route -> search -> enhance -> synthesize, or the direct
//!   no-external-call path when the budget will not cover a search
//! - [`KvCache`] / [`SearchProvider`] - the narrow interfaces the cache and
//!   external search collaborators implement; both ship no-op stand-ins so
//!   their absence is never fatal

pub mod cache;
pub mod chat;
pub mod intent;
pub mod providers;
pub mod router;
pub mod search;

pub use cache::{conversation_key, research_key, search_key, KvCache, MemoryCache, NoopCache};
pub use providers::{ProviderError, SearchHit, SearchProvider, StaticProvider, UnavailableProvider};
pub use router::{CostTable, QueryAnalysis, QueryKind, SearchStrategy, SmartRouter};
