mod connection;
#[cfg(test)]
pub(crate) mod testserver;

pub use connection::{ConnectionError, PgConnection, QueryResult};
