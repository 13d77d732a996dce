use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::config::NodeEndpoint;
use crate::protocol::{
    md5_password, AuthRequest, BackendMessage, FrontendMessage, MessageCodec, ServerError,
};

/// A single connection to a PostgreSQL node
///
/// Connections are throwaway: the monitor opens one per operation and
/// closes it before the tick ends. There is no pooling or reuse.
pub struct PgConnection {
    framed: Framed<TcpStream, MessageCodec>,
}

impl PgConnection {
    /// Connect and authenticate against a node
    ///
    /// Supports trust, cleartext and md5 authentication. The whole
    /// exchange is bounded by `connect_timeout`: a node that accepts
    /// TCP but never answers the startup packet must not wedge the
    /// caller.
    pub async fn connect(
        endpoint: &NodeEndpoint,
        connect_timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        timeout(connect_timeout, Self::handshake(endpoint))
            .await
            .map_err(|_| ConnectionError::ConnectTimeout)?
    }

    /// Dial and run the startup/auth exchange to ReadyForQuery
    async fn handshake(endpoint: &NodeEndpoint) -> Result<Self, ConnectionError> {
        let addr = endpoint.addr();
        debug!(addr = %addr, "Connecting to node");

        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| ConnectionError::Connect(e.to_string()))?;

        let mut framed = Framed::new(stream, MessageCodec);

        framed
            .send(FrontendMessage::Startup {
                user: endpoint.user.clone(),
                database: endpoint.database.clone(),
            })
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        loop {
            match recv(&mut framed).await? {
                BackendMessage::Authentication(AuthRequest::Ok) => {}
                BackendMessage::Authentication(AuthRequest::CleartextPassword) => {
                    framed
                        .send(FrontendMessage::Password(endpoint.password.clone()))
                        .await
                        .map_err(|e| ConnectionError::Io(e.to_string()))?;
                }
                BackendMessage::Authentication(AuthRequest::Md5Password { salt }) => {
                    let digest = md5_password(&endpoint.user, &endpoint.password, &salt);
                    framed
                        .send(FrontendMessage::Password(digest))
                        .await
                        .map_err(|e| ConnectionError::Io(e.to_string()))?;
                }
                BackendMessage::Authentication(AuthRequest::Unsupported(code)) => {
                    return Err(ConnectionError::Auth(format!(
                        "Unsupported authentication request: {}",
                        code
                    )));
                }
                BackendMessage::ErrorResponse(e) => return Err(ConnectionError::Server(e)),
                BackendMessage::ReadyForQuery(_) => break,
                // ParameterStatus, BackendKeyData, notices
                _ => {}
            }
        }

        debug!(addr = %addr, "Node authentication successful");
        Ok(Self { framed })
    }

    /// Run one simple-protocol query and collect its result
    ///
    /// Always drains the stream to ReadyForQuery, so the connection is
    /// left in a clean state even when the server rejects the query.
    pub async fn simple_query(&mut self, sql: &str) -> Result<QueryResult, ConnectionError> {
        self.framed
            .send(FrontendMessage::Query(sql.to_string()))
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        let mut result = QueryResult::default();
        let mut server_error: Option<ServerError> = None;

        loop {
            match recv(&mut self.framed).await? {
                BackendMessage::DataRow(columns) => {
                    result.rows.push(
                        columns
                            .iter()
                            .map(|c| c.as_ref().map(|b| String::from_utf8_lossy(b).into_owned()))
                            .collect(),
                    );
                }
                BackendMessage::CommandComplete(tag) => result.command_tag = Some(tag),
                BackendMessage::EmptyQueryResponse => {}
                BackendMessage::ErrorResponse(e) => server_error = Some(e),
                BackendMessage::ReadyForQuery(_) => break,
                // RowDescription, notices, parameter changes
                _ => {}
            }
        }

        match server_error {
            Some(e) => Err(ConnectionError::Server(e)),
            None => Ok(result),
        }
    }

    /// Send Terminate and drop the stream; close errors are ignored
    pub async fn close(mut self) {
        let _ = self.framed.send(FrontendMessage::Terminate).await;
    }
}

async fn recv(
    framed: &mut Framed<TcpStream, MessageCodec>,
) -> Result<BackendMessage, ConnectionError> {
    let frame = framed
        .next()
        .await
        .ok_or(ConnectionError::Disconnected)?
        .map_err(|e| ConnectionError::Io(e.to_string()))?;

    BackendMessage::parse(frame)
        .ok_or_else(|| ConnectionError::Protocol("Malformed backend message".into()))
}

/// Rows and command tag collected from one simple query
#[derive(Debug, Default)]
pub struct QueryResult {
    pub rows: Vec<Vec<Option<String>>>,
    pub command_tag: Option<String>,
}

impl QueryResult {
    /// First column of the first row, if any
    pub fn first_value(&self) -> Option<&str> {
        self.rows.first()?.first()?.as_deref()
    }
}

/// Connection errors
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Connect or startup exchange timed out")]
    ConnectTimeout,

    #[error("IO error: {0}")]
    Io(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Server error: {0}")]
    Server(ServerError),

    #[error("Connection disconnected")]
    Disconnected,
}
