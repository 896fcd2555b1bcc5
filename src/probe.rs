use crate::types::{Endpoint, ProbeResult, ProbeSample};
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

/// Opens a connection to `host:port` and closes it again.
///
/// Probing only measures how long the dial takes, so implementations must not
/// exchange any data.
pub trait Dialer: Send + Sync + 'static {
    fn dial(&self, addr: &str) -> impl Future<Output = io::Result<()>> + Send;
}

/// Plain TCP connect, used for every scheme.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    fn dial(&self, addr: &str) -> impl Future<Output = io::Result<()>> + Send {
        let addr = addr.to_owned();
        async move {
            let stream = TcpStream::connect(addr).await?;
            drop(stream);
            Ok(())
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeConfig {
    pub attempts: u32,
    pub dial_timeout: Duration,
    pub attempt_delay: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            dial_timeout: Duration::from_secs(3),
            attempt_delay: Duration::from_millis(150),
        }
    }
}

/// Returns the `host:port` part of an endpoint URI, or `None` when there is
/// no `://` separator or nothing after it.
pub fn dial_address(uri: &str) -> Option<&str> {
    let (_, rest) = uri.split_once("://")?;
    let end = rest.find(|c: char| matches!(c, '/' | '?' | '#')).unwrap_or(rest.len());
    let authority = &rest[..end];
    (!authority.is_empty()).then_some(authority)
}

/// Dials `endpoint` `config.attempts` times in sequence and summarizes the
/// latencies of the attempts that connected.
pub async fn probe<D: Dialer>(dialer: &D, endpoint: &Endpoint, config: &ProbeConfig) -> ProbeResult {
    let Some(addr) = dial_address(endpoint.as_str()) else {
        debug!("Skipping malformed endpoint {}", endpoint);
        return ProbeResult::unreachable(endpoint.clone());
    };

    let mut samples = Vec::with_capacity(config.attempts as usize);
    for attempt in 0..config.attempts {
        let start = Instant::now();
        let sample = match time::timeout(config.dial_timeout, dialer.dial(addr)).await {
            Ok(Ok(())) => ProbeSample::success(start.elapsed()),
            Ok(Err(e)) => {
                trace!("Attempt {} to {} failed: {}", attempt + 1, endpoint, e);
                ProbeSample::failure()
            }
            Err(_) => {
                trace!("Attempt {} to {} timed out", attempt + 1, endpoint);
                ProbeSample::failure()
            }
        };
        samples.push(sample);

        if attempt + 1 < config.attempts {
            time::sleep(config.attempt_delay).await;
        }
    }

    ProbeResult::from_samples(endpoint.clone(), &samples)
}
