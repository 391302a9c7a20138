//! Rate-limited existence-check pipeline
//!
//! raw identifiers -> exclusion -> normalizer -> known/duplicate filter ->
//! scheduler (ceiling, spacing, rotation) -> existence checker -> aggregator

use std::collections::HashSet;

use futures_util::stream::{FuturesUnordered, StreamExt};
use shared::{logging, stage_debug, stage_error, stage_info, stage_warn, Identifier, RotationStrategy, Stage};
use tokio::time::Instant;

use crate::config::CheckerConfig;
use crate::core::{aggregate, ExclusionFilter, InstanceRotator, Normalizer, Step};
use crate::error::CheckerResult;
use crate::services::ExistenceChecker;
use crate::state::{Job, PipelineState};
use crate::traits::LookupClient;
use crate::types::{
    CheckResult, CheckState, KnownSet, LinkTemplate, Outcome, ResultEntry, ResultSet, RunReport, RunSummary,
    SchedulePolicy,
};

/// Pipeline with an injected lookup client
pub struct Pipeline<L: LookupClient> {
    checker: ExistenceChecker<L>,
    normalizer: Normalizer,
    exclusion: ExclusionFilter,
    policy: SchedulePolicy,
    rotation: RotationStrategy,
    template: LinkTemplate,
}

impl<L: LookupClient> Pipeline<L> {
    /// Create a pipeline from validated configuration
    pub fn new(client: L, config: &CheckerConfig) -> CheckerResult<Self> {
        config.validate()?;
        let policy = config.schedule_policy();

        Ok(Self {
            checker: ExistenceChecker::new(client, config.retry_policy()).with_jitter(policy.jitter),
            normalizer: Normalizer::new(config.direction),
            exclusion: ExclusionFilter::for_direction(config.direction).with_extra(&config.exclude_suffixes),
            policy,
            rotation: config.rotation_strategy(),
            template: config.link_template()?,
        })
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Build the known set from previously recorded entries
    pub fn known_set<I, S>(&self, entries: I) -> KnownSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.normalizer.known_set(entries)
    }

    /// Convert identifiers to targets and links without any lookup
    pub fn convert(&self, raw: &[String], known: &KnownSet) -> ResultSet {
        let mut seen = HashSet::new();
        raw.iter()
            .filter(|entry| !entry.trim().is_empty() && !self.exclusion.is_excluded(entry))
            .map(|entry| self.normalizer.normalize(entry))
            .filter(|target| !known.contains(target) && seen.insert(target.clone()))
            .map(|target| ResultEntry { link: self.template.render(&target), identifier: target })
            .collect()
    }

    /// Check every identifier and aggregate the confirmed ones.
    ///
    /// Never fails on lookup problems: retryable failures are absorbed, and a
    /// malformed rate-limit directive stops intake but still returns every
    /// result gathered so far.
    pub async fn run(&self, raw: &[String], known: &KnownSet) -> CheckerResult<RunReport> {
        let mut summary = RunSummary { submitted: raw.len(), ..RunSummary::default() };
        let mut state = PipelineState::new(InstanceRotator::new(&self.rotation)?);

        self.intake(raw, known, &mut state, &mut summary);
        let total = state.queued();
        stage_info!(
            Stage::Intake,
            "📥 {} submitted, {} to check ({} excluded, {} known, {} duplicates)",
            summary.submitted,
            total,
            summary.excluded,
            summary.known,
            summary.duplicates
        );

        let mut in_flight = FuturesUnordered::new();
        let mut done = 0usize;

        loop {
            // Requests leave only once their start time has come, so a halt
            // stops everything not yet on the wire
            let mut wake_at = None;
            while state.in_flight() < self.policy.max_in_flight {
                let Some(ready_at) = state.ready_at(self.policy.request_spacing) else {
                    break;
                };
                if ready_at > Instant::now() {
                    wake_at = Some(ready_at);
                    break;
                }
                let Some(mut job) = state.next_job(self.policy.max_in_flight) else {
                    break;
                };
                let instance = state.rotator.assign();
                state.mark_started(Instant::now());
                job.attempts += 1;
                stage_debug!(Stage::Scheduler, "dispatching {} to {} (attempt {})", job.target, instance, job.attempts);
                in_flight.push(self.dispatch(job, instance));
            }

            let (mut job, instance, outcome) = tokio::select! {
                Some(finished) = in_flight.next(), if !in_flight.is_empty() => finished,
                _ = tokio::time::sleep_until(wake_at.unwrap_or_else(Instant::now)), if wake_at.is_some() => continue,
                else => break,
            };
            state.finish_one();

            match self.checker.retry_policy().next_step(&outcome, job.attempts) {
                Step::Finish => {
                    done += 1;
                    logging::log_progress(done, total, job.target.as_str(), &describe(&outcome));
                    state.record(job.finish(instance, &outcome));
                }
                Step::Retry { delay, rotate } => {
                    let Some(not_before) = Instant::now().checked_add(delay) else {
                        done += 1;
                        let reason = format!("backoff of {}s is out of range", delay.as_secs());
                        stage_error!(Stage::Scheduler, "🛑 stopping intake: {}", reason);
                        state.record(job.fail(instance, CheckState::FatalFailure, reason.clone()));
                        state.halt(reason);
                        continue;
                    };
                    if rotate {
                        summary.rate_limited_events += 1;
                        job.rate_limited = true;
                        if state.rotator.report_rate_limited(&instance) {
                            stage_warn!(Stage::Scheduler, "🔄 {} rate limited us, rotating to {}", instance, state.rotator.current());
                        }
                    }
                    stage_warn!(
                        Stage::Scheduler,
                        "⏳ {} for {} (attempt {}), retrying in {}ms",
                        outcome.error_message().unwrap_or_default(),
                        job.target,
                        job.attempts,
                        delay.as_millis()
                    );
                    job.not_before = Some(not_before);
                    state.requeue(job);
                }
                Step::GiveUp { reason } => {
                    done += 1;
                    logging::log_progress(done, total, job.target.as_str(), &reason);
                    state.record(job.fail(instance, CheckState::TransientFailure, reason));
                }
                Step::Halt { reason } => {
                    done += 1;
                    stage_error!(Stage::Scheduler, "🛑 stopping intake: {}", reason);
                    state.record(job.fail(instance, CheckState::FatalFailure, reason.clone()));
                    state.halt(reason);
                }
            }
        }

        if let Some(reason) = state.halted().map(str::to_string) {
            for job in state.drain_queue() {
                state.record(job.not_checked(&reason));
            }
        }

        stage_debug!(Stage::Scheduler, "peak in flight {}", state.peak_in_flight());
        let (completed, fatal) = state.into_parts();
        tally(&completed, &mut summary);

        let (results, errors) = aggregate(&completed, known, &self.template);
        log_summary(&summary, fatal.as_deref());

        Ok(RunReport { results, errors, summary, fatal })
    }

    /// Exclusion first, then normalization, then known/duplicate filtering
    fn intake(&self, raw: &[String], known: &KnownSet, state: &mut PipelineState, summary: &mut RunSummary) {
        let mut seen = HashSet::new();

        for (position, entry) in raw.iter().enumerate() {
            if self.exclusion.is_excluded(entry) {
                stage_debug!(Stage::Intake, "skipping bridge artifact {}", entry.trim());
                summary.excluded += 1;
                continue;
            }
            let Ok(identifier) = Identifier::new(entry) else {
                summary.excluded += 1;
                continue;
            };

            let target = self.normalizer.normalize(identifier.as_str());
            if known.contains(&target) {
                summary.known += 1;
                continue;
            }
            if !seen.insert(target.clone()) {
                summary.duplicates += 1;
                continue;
            }

            state.enqueue(Job::new(position, identifier, target));
        }
    }

    async fn dispatch(&self, job: Job, instance: String) -> (Job, String, Outcome) {
        let outcome = self.checker.attempt(&job.target, &instance).await;
        (job, instance, outcome)
    }
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Confirmed => "exists".to_string(),
        Outcome::Absent => "does not exist".to_string(),
        other => format!("treated as absent: {}", other.error_message().unwrap_or_default()),
    }
}

fn tally(completed: &[CheckResult], summary: &mut RunSummary) {
    for result in completed {
        match (result.state, &result.error) {
            (CheckState::Confirmed, _) => summary.confirmed += 1,
            (CheckState::Absent, None) => summary.absent += 1,
            _ => summary.errored += 1,
        }
    }
}

fn log_summary(summary: &RunSummary, fatal: Option<&str>) {
    stage_info!(
        Stage::Aggregator,
        "🏁 {} confirmed, {} absent, {} errored ({} rate-limit events)",
        summary.confirmed,
        summary.absent,
        summary.errored,
        summary.rate_limited_events
    );
    if let Some(reason) = fatal {
        stage_error!(Stage::Aggregator, "run stopped early: {}", reason);
    }
}
