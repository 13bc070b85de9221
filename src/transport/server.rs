//! Query server
//!
//! Accepts connections, turns each into a [`Session`] and answers every
//! stream the peer opens with exactly one [`QueryResponse`].

use crate::config::ServerConfig;
use crate::index::IndexHandle;
use crate::query::{CancelToken, EngineResult, Exploration, QueryEngine, QueryResult, RequestState};
use crate::transport::error::TransportResult;
use crate::transport::frame::{read_message, write_message, MessageDecoder};
use crate::transport::messages::{QueryRequest, QueryResponse};
use crate::transport::mux::{Role, Session, Stream};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct QueryServer {
    listener: TcpListener,
    index: Arc<IndexHandle>,
    config: ServerConfig,
}

impl QueryServer {
    /// Bind the listening socket from `config`
    pub async fn bind(config: ServerConfig, index: Arc<IndexHandle>) -> TransportResult<Self> {
        let listener = TcpListener::bind(config.address()).await?;
        tracing::info!(
            address = %listener.local_addr()?,
            concurrent_sessions = config.concurrent_sessions,
            "Query server listening"
        );

        Ok(Self {
            listener,
            index,
            config,
        })
    }

    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn index(&self) -> &Arc<IndexHandle> {
        &self.index
    }

    /// Serve until the process ends
    pub async fn run(self) -> TransportResult<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> TransportResult<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                accepted = self.listener.accept() => accepted,
                _ = &mut shutdown => break,
            };

            let (socket, peer) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            };
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(error = %e, "Could not disable Nagle");
            }

            let session = Session::with_config(socket, Role::Server, self.config.session());
            tracing::info!(session_id = %session.id(), %peer, "Session accepted");

            let task = serve_session(session, Arc::clone(&self.index), self.config.max_frame_bytes);
            if self.config.concurrent_sessions {
                tokio::spawn(task);
            } else {
                tokio::select! {
                    _ = task => {}
                    _ = &mut shutdown => break,
                }
            }
        }

        tracing::info!("Query server stopped");
        Ok(())
    }
}

/// Dispatch every stream of one session to its own task
async fn serve_session(mut session: Session, index: Arc<IndexHandle>, max_frame: usize) {
    let session_id = session.id();
    let mut streams = 0u64;

    while let Some(stream) = session.accept().await {
        streams += 1;
        tokio::spawn(handle_stream(stream, Arc::clone(&index), max_frame));
    }

    tracing::info!(%session_id, streams, "Session ended");
}

async fn handle_stream(mut stream: Stream, index: Arc<IndexHandle>, max_frame: usize) {
    let stream_id = stream.id();
    let session_id = stream.session_id();
    let mut decoder = MessageDecoder::new(max_frame);

    let request: QueryRequest = match read_message(&mut stream, &mut decoder).await {
        Ok(Some(request)) => request,
        Ok(None) => {
            tracing::debug!(%session_id, stream_id, "Stream closed before a request");
            return;
        }
        Err(e) => {
            tracing::warn!(%session_id, stream_id, error = %e, "Discarding unreadable request");
            let _ = stream.close();
            return;
        }
    };

    let query_id = request.query_id;
    let (response, state) = answer(&mut stream, &request, &index).await;

    let Some(response) = response else {
        tracing::info!(%session_id, stream_id, query_id, "Caller went away, query abandoned");
        return;
    };

    if let Err(e) = write_message(&mut stream, &response).and_then(|_| stream.close()) {
        tracing::debug!(%session_id, stream_id, query_id, error = %e, "Failed to send response");
        return;
    }

    tracing::debug!(
        %session_id,
        stream_id,
        query_id,
        ?state,
        successful = response.successful,
        matching = response.matching,
        eligible = response.eligible,
        "Query answered"
    );
}

/// Evaluate one request. `None` when the caller abandoned the stream.
async fn answer(
    stream: &mut Stream,
    request: &QueryRequest,
    index: &IndexHandle,
) -> (Option<QueryResponse>, RequestState) {
    let state = RequestState::Received;
    let query = request.query();

    if let Err(e) = query.validate() {
        tracing::debug!(query_id = request.query_id, error = %e, "Rejected query");
        return (Some(QueryResponse::failed(request)), advance(state, RequestState::Responded));
    }

    let state = advance(state, RequestState::Computing);
    let engine = QueryEngine::new(index.snapshot().await);
    let cancel = CancelToken::new();
    let explore = request.explore;

    let task = {
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || -> EngineResult<(QueryResult, Vec<Exploration>)> {
            let result = engine.evaluate(&query, &cancel)?;
            let explorations = if explore {
                engine.explore(&query, &cancel)?
            } else {
                Vec::new()
            };
            Ok((result, explorations))
        })
    };

    let joined = tokio::select! {
        joined = task => joined,
        _ = stream.peer_gone() => {
            cancel.cancel();
            return (None, advance(state, RequestState::Failed));
        }
    };

    match joined {
        Ok(Ok((result, explorations))) => (
            Some(QueryResponse::answered(request, result, explorations)),
            advance(state, RequestState::Responded),
        ),
        Ok(Err(e)) => {
            tracing::warn!(query_id = request.query_id, error = %e, "Query failed");
            (Some(QueryResponse::failed(request)), advance(state, RequestState::Failed))
        }
        Err(e) => {
            tracing::error!(query_id = request.query_id, error = %e, "Query evaluation panicked");
            (Some(QueryResponse::failed(request)), advance(state, RequestState::Failed))
        }
    }
}

fn advance(from: RequestState, to: RequestState) -> RequestState {
    from.advance(to).unwrap_or(RequestState::Failed)
}
