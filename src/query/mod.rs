//! Matchup Query Engine
//!
//! Answers "how often did these champions win against those champions":
//!
//! - **Query**: winners and losers, validated before evaluation
//! - **Engine**: set algebra over one index snapshot, with optional
//!   exploration of every champion not in the query
//! - **Cancellation**: evaluations check a shared flag between set operations
//!
//! ## Example
//!
//! ```rust,ignore
//! use cleo::query::{CancelToken, Query, QueryEngine};
//!
//! let engine = QueryEngine::new(handle.snapshot().await);
//! let query = Query::from_ids(&[412], &[1]);
//! let result = engine.evaluate(&query, &CancelToken::new())?;
//!
//! println!("{}/{} of {} games", result.matching, result.eligible, result.total);
//! ```

mod engine;
mod error;

pub use engine::{CancelToken, Exploration, Query, QueryEngine, QueryResult, RequestState};
pub use error::{EngineResult, QueryError};
