use std::fmt;
use std::time::Duration;

use error_stack::{IntoReport, Report, ResultExt};
use tokio::net::TcpStream;
use tracing::debug;

#[derive(Debug)]
pub struct NetworkError;
impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Network error")
    }
}
impl std::error::Error for NetworkError {}

pub type NetworkResult<T> = error_stack::Result<T, NetworkError>;

/// Opens (and drops) a TCP connection to `host:port`.
pub async fn ensure_reachable(host: &str, port: u16, timeout: Duration) -> NetworkResult<()> {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(connection) => {
            connection
                .into_report()
                .change_context(NetworkError)
                .attach_printable_lazy(|| format!("Could not connect to {host}:{port}"))?;
            debug!("{host}:{port} is reachable");
            Ok(())
        }
        Err(_) => Err(Report::new(NetworkError).attach_printable(format!(
            "Timed out after {}s connecting to {host}:{port}",
            timeout.as_secs()
        ))),
    }
}
