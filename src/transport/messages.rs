//! Wire messages exchanged on query streams

use crate::query::{Exploration, Query, QueryResult};
use serde::{Deserialize, Serialize};

/// One matchup question. `query_process` and `query_id` identify the caller
/// and are echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query_process: u64,
    pub query_id: u64,
    pub winners: Vec<u16>,
    pub losers: Vec<u16>,
    /// Also evaluate the query once per extra winner
    pub explore: bool,
}

impl QueryRequest {
    pub fn query(&self) -> Query {
        Query::from_ids(&self.winners, &self.losers)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query_process: u64,
    pub query_id: u64,
    pub successful: bool,
    pub matching: u32,
    pub eligible: u32,
    pub total: u32,
    pub explorations: Vec<Exploration>,
}

impl QueryResponse {
    pub fn answered(request: &QueryRequest, result: QueryResult, explorations: Vec<Exploration>) -> Self {
        Self {
            query_process: request.query_process,
            query_id: request.query_id,
            successful: true,
            matching: result.matching,
            eligible: result.eligible,
            total: result.total,
            explorations,
        }
    }

    /// Rejection with zero counts
    pub fn failed(request: &QueryRequest) -> Self {
        Self {
            query_process: request.query_process,
            query_id: request.query_id,
            successful: false,
            matching: 0,
            eligible: 0,
            total: 0,
            explorations: Vec::new(),
        }
    }

    pub fn result(&self) -> QueryResult {
        QueryResult {
            matching: self.matching,
            eligible: self.eligible,
            total: self.total,
        }
    }
}
