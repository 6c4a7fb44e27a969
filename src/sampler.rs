use std::{future::Future, time::Duration};

use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::{codec::SAMPLE_RATE_ALWAYS, exporter::MetricSink, source::CounterSource};

pub const NAMESPACE: &str = "logstash.";
pub const METRIC_NAME: &str = "RateOut";

/// How a reading of exactly zero is treated while no baseline has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaselinePolicy {
    /// Any successful reading, zero included, becomes the baseline.
    #[default]
    Explicit,
    /// A stored count of zero counts as "no baseline yet".
    ZeroIsUnset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerPhase {
    AwaitingFirstSample,
    Steady,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    FetchFailed,
    Baseline(f64),
    Emitted(f64),
    Discarded(f64),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SamplerState {
    last_count: Option<f64>,
}
impl SamplerState {
    pub fn new() -> Self {
        Self { last_count: None }
    }

    pub fn last_count(&self) -> Option<f64> {
        self.last_count
    }

    pub fn phase(&self, policy: BaselinePolicy) -> SamplerPhase {
        match self.baseline(policy) {
            Some(_) => SamplerPhase::Steady,
            None => SamplerPhase::AwaitingFirstSample,
        }
    }

    fn baseline(&self, policy: BaselinePolicy) -> Option<f64> {
        match policy {
            BaselinePolicy::Explicit => self.last_count,
            BaselinePolicy::ZeroIsUnset => self.last_count.filter(|count| *count != 0.0),
        }
    }
}

/// First difference of two counter readings over one sampling interval.
pub fn rate(last: f64, curr: f64, interval: Duration) -> f64 {
    (curr - last) / interval.as_secs_f64()
}

/// The first tick slot strictly after `deadline` that is still ahead of `now`.
///
/// Slots stay aligned to `deadline + k * period`; slots already in the past are skipped.
pub fn next_tick_after(deadline: Instant, now: Instant, period: Duration) -> Instant {
    let next = deadline + period;
    if now < next {
        return next;
    }
    let behind = now.duration_since(deadline).as_nanos();
    let missed = behind / period.as_nanos();
    let skip = u32::try_from(missed).unwrap_or(u32::MAX);
    deadline + period * skip + period
}

/// Samples a counter once per tick and reports the per-second rate between consecutive samples.
///
/// The tick schedule is the only clock: the rate always assumes exactly one `period` elapsed.
/// When a cycle overruns the period the next tick's deadline has already passed by the time the
/// rate is known, and that rate is dropped instead of being reported.
#[derive(Debug)]
pub struct RateSampler<S, K> {
    source: S,
    sink: K,
    state: SamplerState,
    policy: BaselinePolicy,
    period: Duration,
    next_tick: Instant,
    tags: Vec<String>,
}
impl<S, K> RateSampler<S, K>
where
    S: CounterSource,
    K: MetricSink,
{
    /// The first tick fires one `period` from now. `period` must be non-zero.
    pub fn new(source: S, sink: K, period: Duration, tags: Vec<String>) -> anyhow::Result<Self> {
        if period.is_zero() {
            anyhow::bail!("sampling period must be greater than zero");
        }
        let next_tick = Instant::now() + period;
        Ok(Self {
            source,
            sink,
            state: SamplerState::new(),
            policy: BaselinePolicy::default(),
            period,
            next_tick,
            tags,
        })
    }

    pub fn with_baseline_policy(mut self, policy: BaselinePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> &SamplerState {
        &self.state
    }
    pub fn phase(&self) -> SamplerPhase {
        self.state.phase(self.policy)
    }
    pub fn source(&self) -> &S {
        &self.source
    }
    pub fn sink(&self) -> &K {
        &self.sink
    }
    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Samples until `shutdown` resolves. `shutdown` is only observed while waiting for a tick.
    pub async fn run_until(&mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        loop {
            self.sample().await;
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("Shutdown requested, sampler stopped.");
                    return;
                }
                () = sleep_until(self.next_tick) => self.consume_tick(),
            }
        }
    }

    /// One full cycle: [`Self::sample`] followed by the wait for the next tick.
    pub async fn cycle(&mut self) -> CycleOutcome {
        let outcome = self.sample().await;
        sleep_until(self.next_tick).await;
        self.consume_tick();
        outcome
    }

    pub async fn sample(&mut self) -> CycleOutcome {
        let curr = match self.source.fetch().await {
            Ok(sample) => sample.value,
            Err(e) => {
                error!("Error getting event stats: {e:#}");
                return CycleOutcome::FetchFailed;
            }
        };

        let Some(last) = self.state.baseline(self.policy) else {
            debug!(count = curr, "Recorded baseline.");
            self.state.last_count = Some(curr);
            return CycleOutcome::Baseline(curr);
        };

        let rate = rate(last, curr, self.period);
        self.state.last_count = Some(curr);

        if self.tick_pending() {
            warn!(rate, "Tick happened before rate could be calculated, discarding value.");
            self.consume_tick();
            return CycleOutcome::Discarded(rate);
        }

        debug!(rate = %format_args!("{rate:.3}"), tags = ?self.tags, "Emitting rate.");
        self.sink.gauge(METRIC_NAME, rate, &self.tags, SAMPLE_RATE_ALWAYS);
        CycleOutcome::Emitted(rate)
    }

    fn tick_pending(&self) -> bool {
        Instant::now() >= self.next_tick
    }

    fn consume_tick(&mut self) {
        self.next_tick = next_tick_after(self.next_tick, Instant::now(), self.period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_is_first_difference_over_period() {
        assert_eq!(rate(100.0, 140.0, Duration::from_secs(10)), 4.0);
        assert_eq!(rate(140.0, 140.0, Duration::from_secs(10)), 0.0);
        assert_eq!(rate(50.0, 30.0, Duration::from_secs(5)), -4.0);
        assert_eq!(rate(0.0, 1.0, Duration::from_millis(500)), 2.0);
    }

    #[test]
    fn test_next_tick_after_keeps_schedule_alignment() {
        let period = Duration::from_secs(10);
        let deadline = Instant::now();
        let at = |secs| deadline + Duration::from_secs(secs);

        assert_eq!(next_tick_after(deadline, deadline, period), at(10));
        assert_eq!(next_tick_after(deadline, at(3), period), at(10));
        assert_eq!(next_tick_after(deadline, at(15), period), at(20));
        assert_eq!(next_tick_after(deadline, at(20), period), at(30));
        assert_eq!(next_tick_after(deadline, at(47), period), at(50));
    }

    #[test]
    fn test_fresh_state_awaits_first_sample() {
        let state = SamplerState::new();
        assert_eq!(state.last_count(), None);
        assert_eq!(
            state.phase(BaselinePolicy::Explicit),
            SamplerPhase::AwaitingFirstSample
        );
    }

    #[test]
    fn test_zero_baseline_depends_on_policy() {
        let state = SamplerState {
            last_count: Some(0.0),
        };
        assert_eq!(state.phase(BaselinePolicy::Explicit), SamplerPhase::Steady);
        assert_eq!(
            state.phase(BaselinePolicy::ZeroIsUnset),
            SamplerPhase::AwaitingFirstSample
        );

        let state = SamplerState {
            last_count: Some(12.0),
        };
        assert_eq!(state.phase(BaselinePolicy::ZeroIsUnset), SamplerPhase::Steady);
    }
}
