use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use super::tcp::socket_addr;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub fn connection_error_message(endpoint: &Url) -> String {
    format!("Language server connection to '{endpoint}' failed.")
}

/// Fire-and-forget reachability check of a language server endpoint.
///
/// The outcome arrives over a channel. Dropping the probe abandons it; a late result is then
/// discarded by the background thread.
#[derive(Debug)]
pub struct ConnectivityProbe {
    outcome: Option<Receiver<Result<(), String>>>,
}

impl ConnectivityProbe {
    pub fn spawn(endpoint: &Url, timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        let target = endpoint.clone();
        let spawned = thread::Builder::new()
            .name("lspfield-probe".into())
            .spawn(move || {
                let _ = tx.send(check(&target, timeout));
            });
        match spawned {
            Ok(_) => Self { outcome: Some(rx) },
            Err(err) => {
                warn!(%err, "failed to start connectivity probe");
                Self { outcome: None }
            }
        }
    }

    /// Returns the connection error message once the probe has failed.
    pub fn poll(&mut self) -> Option<String> {
        let outcome = self.outcome.as_ref()?.try_recv().ok()?;
        self.outcome = None;
        outcome.err()
    }

    pub fn is_settled(&self) -> bool {
        self.outcome.is_none()
    }
}

fn check(endpoint: &Url, timeout: Duration) -> Result<(), String> {
    let message = connection_error_message(endpoint);
    let addr = socket_addr(endpoint).map_err(|err| {
        debug!(%endpoint, %err, "probe could not resolve endpoint");
        message.clone()
    })?;
    match TcpStream::connect_timeout(&addr, timeout) {
        Ok(_) => Ok(()),
        Err(err) => {
            debug!(%endpoint, %err, "probe failed");
            Err(message)
        }
    }
}
