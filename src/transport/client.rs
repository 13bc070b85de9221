//! Query client: one session, one stream per request

use crate::champion::Champion;
use crate::transport::error::{TransportError, TransportResult};
use crate::transport::frame::{read_message, write_message, MessageDecoder, DEFAULT_MAX_FRAME};
use crate::transport::messages::{QueryRequest, QueryResponse};
use crate::transport::mux::{Role, Session};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::{TcpStream, ToSocketAddrs};

pub struct QueryClient {
    session: Session,
    process: u64,
    next_query: AtomicU64,
    max_frame: usize,
}

impl QueryClient {
    /// Dial a query server
    pub async fn connect(addr: impl ToSocketAddrs) -> TransportResult<Self> {
        let socket = TcpStream::connect(addr).await?;
        socket.set_nodelay(true)?;
        Ok(Self::from_session(Session::new(socket, Role::Client)))
    }

    pub fn from_session(session: Session) -> Self {
        Self {
            session,
            process: u64::from(std::process::id()),
            next_query: AtomicU64::new(1),
            max_frame: DEFAULT_MAX_FRAME,
        }
    }

    /// Override the caller id echoed in responses
    pub fn with_process(mut self, process: u64) -> Self {
        self.process = process;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Build a request with the next query id
    pub fn request(&self, winners: &[Champion], losers: &[Champion], explore: bool) -> QueryRequest {
        QueryRequest {
            query_process: self.process,
            query_id: self.next_query.fetch_add(1, Ordering::Relaxed),
            winners: winners.iter().map(|c| c.id()).collect(),
            losers: losers.iter().map(|c| c.id()).collect(),
            explore,
        }
    }

    pub async fn query(
        &self,
        winners: &[Champion],
        losers: &[Champion],
        explore: bool,
    ) -> TransportResult<QueryResponse> {
        self.send(self.request(winners, losers, explore)).await
    }

    /// Send a prepared request on a fresh stream and wait for its response
    pub async fn send(&self, request: QueryRequest) -> TransportResult<QueryResponse> {
        let mut stream = self.session.open_stream()?;
        write_message(&mut stream, &request)?;

        let mut decoder = MessageDecoder::new(self.max_frame);
        let response: QueryResponse = read_message(&mut stream, &mut decoder)
            .await?
            .ok_or(TransportError::NoResponse(stream.id()))?;
        let _ = stream.close();

        if response.query_id != request.query_id || response.query_process != request.query_process {
            return Err(TransportError::Mismatched {
                expected: request.query_id,
                got: response.query_id,
            });
        }

        tracing::debug!(
            stream_id = stream.id(),
            query_id = request.query_id,
            successful = response.successful,
            "Query response received"
        );
        Ok(response)
    }

    /// End the session
    pub fn close(&self) {
        self.session.close();
    }
}
