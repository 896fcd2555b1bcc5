use crate::types::{ProbeResult, RankedPeer, StabilityLabel};
use std::time::Duration;

/// Results averaging at or above this latency are dropped from the ranking.
pub const DEFAULT_ACCEPT_CEILING: Duration = Duration::from_secs(5);

/// Composite of raw delay and inconsistency, lower is better.
pub fn score(result: &ProbeResult) -> f64 {
    result.latency.as_secs_f64() * (1.0 + result.stability)
}

/// Drops results at or above `ceiling` and orders the rest by ascending score.
///
/// The sort is stable, so results with equal scores keep their input order.
pub fn rank(results: Vec<ProbeResult>, ceiling: Duration) -> Vec<RankedPeer> {
    let mut ranked: Vec<RankedPeer> = results
        .into_iter()
        .filter(|r| r.latency < ceiling)
        .map(|result| RankedPeer {
            score: score(&result),
            label: StabilityLabel::for_stability(result.stability),
            result,
        })
        .collect();
    ranked.sort_by(|a, b| a.score.total_cmp(&b.score));
    ranked
}

#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    pub tested: usize,
    pub accepted: usize,
    pub best_latency: Option<Duration>,
    pub best_stability_percent: Option<f64>,
}

pub fn summarize(tested: usize, ranked: &[RankedPeer]) -> Summary {
    let best = ranked.first();
    Summary {
        tested,
        accepted: ranked.len(),
        best_latency: best.map(|p| p.result.latency),
        best_stability_percent: best.map(|p| p.stability_percent()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::testing::ScriptedDialer;
    use crate::types::{Endpoint, ProbeSample};
    use crate::workers::{schedule_all, SchedulerConfig};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn result(uri: &str, latency: Duration, stability: f64) -> ProbeResult {
        let mut r = ProbeResult::from_samples(Endpoint::from(uri), &[ProbeSample::success(latency)]);
        r.stability = stability;
        r
    }

    #[test]
    fn orders_by_composite_score() {
        let results = vec![
            result("tcp://slow:1", ms(200), 0.0),
            result("tcp://jittery:1", ms(100), 0.9),
            result("tcp://fast:1", ms(100), 0.1),
        ];
        let ranked = rank(results, DEFAULT_ACCEPT_CEILING);
        let order: Vec<&str> = ranked.iter().map(|p| p.endpoint().as_str()).collect();
        // 110ms, 190ms, 200ms
        assert_eq!(order, vec!["tcp://fast:1", "tcp://jittery:1", "tcp://slow:1"]);
        assert!((ranked[0].score - 0.11).abs() < 1e-9);
    }

    #[test]
    fn excludes_results_at_or_above_ceiling() {
        let results = vec![
            result("tcp://a:1", ms(4_999), 0.0),
            result("tcp://b:1", ms(5_000), 0.0),
            ProbeResult::unreachable(Endpoint::from("tcp://c:1")),
        ];
        let ranked = rank(results, DEFAULT_ACCEPT_CEILING);
        assert_eq!(ranked.len(), 1);
        assert!(ranked.iter().all(|p| p.result.latency < DEFAULT_ACCEPT_CEILING));
    }

    #[test]
    fn equal_scores_keep_input_order_and_ranking_is_repeatable() {
        let results: Vec<ProbeResult> = ["tcp://a:1", "tcp://b:1", "tcp://c:1", "tcp://d:1"]
            .iter()
            .map(|uri| result(uri, ms(80), 0.25))
            .collect();

        let first = rank(results.clone(), DEFAULT_ACCEPT_CEILING);
        let second = rank(results, DEFAULT_ACCEPT_CEILING);

        let order: Vec<&str> = first.iter().map(|p| p.endpoint().as_str()).collect();
        assert_eq!(order, vec!["tcp://a:1", "tcp://b:1", "tcp://c:1", "tcp://d:1"]);
        assert_eq!(first, second);
    }

    #[test]
    fn summary_reports_best_peer() {
        let ranked = rank(
            vec![result("tcp://a:1", ms(60), 0.2), result("tcp://b:1", ms(40), 0.0)],
            DEFAULT_ACCEPT_CEILING,
        );
        let summary = summarize(7, &ranked);
        assert_eq!(summary.tested, 7);
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.best_latency, Some(ms(40)));
        assert_eq!(summary.best_stability_percent, Some(100.0));

        let empty = summarize(3, &[]);
        assert_eq!(empty.accepted, 0);
        assert_eq!(empty.best_latency, None);
    }

    #[tokio::test(start_paused = true)]
    async fn three_of_ten_reachable_rank_by_latency() {
        let endpoints: Vec<Endpoint> = (1..=10)
            .map(|i| Endpoint::from(format!("tcp://10.1.0.{}:7000", i)))
            .collect();
        let dialer = Arc::new(ScriptedDialer::new([
            ("10.1.0.7:7000", ms(200)),
            ("10.1.0.2:7000", ms(50)),
            ("10.1.0.9:7000", ms(80)),
        ]));

        let results = schedule_all(dialer, endpoints, SchedulerConfig::default(), CancellationToken::new()).await;
        assert_eq!(results.len(), 10);

        let ranked = rank(results, DEFAULT_ACCEPT_CEILING);
        let order: Vec<(&str, Duration)> = ranked
            .iter()
            .map(|p| (p.endpoint().as_str(), p.result.latency))
            .collect();
        assert_eq!(
            order,
            vec![
                ("tcp://10.1.0.2:7000", ms(50)),
                ("tcp://10.1.0.9:7000", ms(80)),
                ("tcp://10.1.0.7:7000", ms(200)),
            ]
        );
        assert!(ranked.iter().all(|p| p.result.stability == 0.0));
    }
}
