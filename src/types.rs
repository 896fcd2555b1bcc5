use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

/// Average latency reported for an endpoint that never answered.
pub const UNREACHABLE_LATENCY: Duration = Duration::from_secs(999);

/// Matches `scheme://host[:port]` where host is a DNS name, an IPv4 literal
/// or a bracketed IPv6 literal.
pub fn endpoint_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(tcp|tls|quic|ws|wss|udp)://(\[[0-9a-fA-F:.]+\]|[a-zA-Z0-9.\-]+)(:[0-9]+)?")
            .expect("endpoint pattern is valid")
    })
}

/// A peer connection URI. Compared by exact string match, never normalized.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the whole URI is something the peer block reader can extract again.
    pub fn is_well_formed(&self) -> bool {
        endpoint_regex()
            .find(&self.0)
            .map(|m| m.start() == 0 && m.end() == self.0.len())
            .unwrap_or(false)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Endpoint {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Endpoint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Outcome of a single connection attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbeSample {
    /// Dial time, present only when the attempt connected.
    pub elapsed: Option<Duration>,
}

impl ProbeSample {
    pub fn success(elapsed: Duration) -> Self {
        Self {
            elapsed: Some(elapsed),
        }
    }

    pub fn failure() -> Self {
        Self { elapsed: None }
    }
}

/// Latency profile of one endpoint across all attempts of a probing run.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ProbeResult {
    pub endpoint: Endpoint,
    #[serde(rename = "latency_ms", serialize_with = "as_millis")]
    pub latency: Duration,
    #[serde(rename = "min_latency_ms", serialize_with = "as_millis")]
    pub min_latency: Duration,
    #[serde(rename = "max_latency_ms", serialize_with = "as_millis")]
    pub max_latency: Duration,
    #[serde(rename = "jitter_ms", serialize_with = "as_millis")]
    pub jitter: Duration,
    /// Coefficient of variation in `[0, 1]`, lower is better.
    pub stability: f64,
    pub successes: u32,
}

impl ProbeResult {
    /// Worst-case result used when an endpoint is malformed or never connects.
    pub fn unreachable(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            latency: UNREACHABLE_LATENCY,
            min_latency: Duration::ZERO,
            max_latency: Duration::ZERO,
            jitter: Duration::ZERO,
            stability: 1.0,
            successes: 0,
        }
    }

    /// Folds the successful samples into average, extremes, jitter and stability.
    pub fn from_samples(endpoint: Endpoint, samples: &[ProbeSample]) -> Self {
        let latencies: Vec<Duration> = samples.iter().filter_map(|s| s.elapsed).collect();
        if latencies.is_empty() {
            return Self::unreachable(endpoint);
        }

        let count = latencies.len() as u32;
        let total: Duration = latencies.iter().sum();
        let average = total / count;
        let min_latency = latencies.iter().copied().min().unwrap_or(average);
        let max_latency = latencies.iter().copied().max().unwrap_or(average);

        let mean = average.as_secs_f64();
        let variance = latencies
            .iter()
            .map(|lat| {
                let diff = lat.as_secs_f64() - mean;
                diff * diff
            })
            .sum::<f64>()
            / f64::from(count);
        let std_dev = variance.sqrt();

        let stability = if mean > 0.0 {
            (std_dev / mean).min(1.0)
        } else {
            0.0
        };

        Self {
            endpoint,
            latency: average,
            min_latency,
            max_latency,
            jitter: Duration::from_secs_f64(std_dev),
            stability,
            successes: count,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.successes > 0
    }
}

/// A probe result that passed the acceptance ceiling, with its composite score.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct RankedPeer {
    #[serde(flatten)]
    pub result: ProbeResult,
    pub score: f64,
    pub label: StabilityLabel,
}

impl RankedPeer {
    pub fn endpoint(&self) -> &Endpoint {
        &self.result.endpoint
    }

    /// Stability expressed as a percentage where 100 is perfectly steady.
    pub fn stability_percent(&self) -> f64 {
        (1.0 - self.result.stability) * 100.0
    }
}

/// Qualitative bucket for a stability value.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StabilityLabel {
    Excellent,
    Good,
    Fair,
    Unstable,
}

impl StabilityLabel {
    pub const EXCELLENT_MAX: f64 = 0.15;
    pub const GOOD_MAX: f64 = 0.30;
    pub const FAIR_MAX: f64 = 0.50;

    pub fn for_stability(stability: f64) -> Self {
        if stability <= Self::EXCELLENT_MAX {
            StabilityLabel::Excellent
        } else if stability <= Self::GOOD_MAX {
            StabilityLabel::Good
        } else if stability <= Self::FAIR_MAX {
            StabilityLabel::Fair
        } else {
            StabilityLabel::Unstable
        }
    }
}

impl fmt::Display for StabilityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StabilityLabel::Excellent => "excellent",
            StabilityLabel::Good => "good",
            StabilityLabel::Fair => "fair",
            StabilityLabel::Unstable => "unstable",
        };
        f.write_str(s)
    }
}

fn as_millis<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(d.as_nanos() as f64 / 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn stats_from_mixed_samples() {
        let samples = [
            ProbeSample::success(ms(10)),
            ProbeSample::failure(),
            ProbeSample::success(ms(20)),
            ProbeSample::success(ms(30)),
        ];
        let r = ProbeResult::from_samples(Endpoint::from("tcp://a:1"), &samples);
        assert_eq!(r.successes, 3);
        assert_eq!(r.latency, ms(20));
        assert_eq!(r.min_latency, ms(10));
        assert_eq!(r.max_latency, ms(30));
        // population std dev of {10, 20, 30} ms
        let expected_jitter = (200.0f64 / 3.0).sqrt() / 1000.0;
        assert!((r.jitter.as_secs_f64() - expected_jitter).abs() < 1e-6);
        assert!((r.stability - expected_jitter / 0.020).abs() < 1e-6);
    }

    #[test]
    fn no_successes_is_sentinel() {
        let samples = [ProbeSample::failure(); 5];
        let r = ProbeResult::from_samples(Endpoint::from("tcp://a:1"), &samples);
        assert_eq!(r.latency, UNREACHABLE_LATENCY);
        assert_eq!(r.stability, 1.0);
        assert_eq!(r.jitter, Duration::ZERO);
        assert!(!r.is_reachable());
    }

    #[test]
    fn stability_is_clamped() {
        let samples = [
            ProbeSample::success(ms(1)),
            ProbeSample::success(ms(1)),
            ProbeSample::success(ms(1)),
            ProbeSample::success(ms(1)),
            ProbeSample::success(ms(1000)),
        ];
        let r = ProbeResult::from_samples(Endpoint::from("tcp://a:1"), &samples);
        assert!(r.stability <= 1.0);
    }

    #[test]
    fn labels_follow_thresholds() {
        assert_eq!(StabilityLabel::for_stability(0.0), StabilityLabel::Excellent);
        assert_eq!(StabilityLabel::for_stability(0.15), StabilityLabel::Excellent);
        assert_eq!(StabilityLabel::for_stability(0.2), StabilityLabel::Good);
        assert_eq!(StabilityLabel::for_stability(0.3), StabilityLabel::Good);
        assert_eq!(StabilityLabel::for_stability(0.45), StabilityLabel::Fair);
        assert_eq!(StabilityLabel::for_stability(0.51), StabilityLabel::Unstable);
        assert_eq!(StabilityLabel::Unstable.to_string(), "unstable");
    }

    #[test]
    fn well_formed_endpoints() {
        assert!(Endpoint::from("tls://[2001:db8::1]:5678").is_well_formed());
        assert!(Endpoint::from("tcp://1.2.3.4:1234").is_well_formed());
        assert!(Endpoint::from("tls://[::ffff:1.2.3.4]:1").is_well_formed());
        assert!(Endpoint::from("quic://peer.example.org").is_well_formed());
        assert!(!Endpoint::from("http://1.2.3.4:80").is_well_formed());
        assert!(!Endpoint::from("1.2.3.4:80").is_well_formed());
        assert!(!Endpoint::from("tcp://1.2.3.4:80?key=abc").is_well_formed());
    }

    #[test]
    fn ranked_peer_serializes_milliseconds() {
        let result = ProbeResult::from_samples(
            Endpoint::from("tcp://a:1"),
            &[ProbeSample::success(ms(50))],
        );
        let ranked = RankedPeer {
            label: StabilityLabel::for_stability(result.stability),
            result,
            score: 0.05,
        };
        let json = serde_json::to_value(&ranked).unwrap();
        assert_eq!(json["endpoint"], "tcp://a:1");
        assert_eq!(json["latency_ms"], 50.0);
        assert_eq!(json["successes"], 1);
        assert_eq!(json["label"], "excellent");
    }
}
