//! Counterexample replay
//!
//! Stored counterexamples are decoded back into typed values and run against
//! the current property. Entries that pass now are fixed and can be removed;
//! entries that still fail are regressions. Shrinking a failing value to a
//! smaller one is delegated to a caller-provided [`Shrinker`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::common::error::Result;
use crate::database::CounterexampleDatabase;
use crate::storage::entry::{CounterexampleEntry, EntryId};

/// Outcome of one property evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl From<bool> for Verdict {
    fn from(passed: bool) -> Self {
        if passed {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

/// A property checked against a single value
pub trait Property<T: ?Sized> {
    fn evaluate(&self, value: &T) -> Verdict;
}

impl<T: ?Sized, F> Property<T> for F
where
    F: Fn(&T) -> bool,
{
    fn evaluate(&self, value: &T) -> Verdict {
        Verdict::from(self(value))
    }
}

/// Produces simpler candidates for a failing value, most promising first
pub trait Shrinker<T> {
    fn shrink(&self, value: &T) -> Vec<T>;
}

impl<T, F> Shrinker<T> for F
where
    F: Fn(&T) -> Vec<T>,
{
    fn shrink(&self, value: &T) -> Vec<T> {
        self(value)
    }
}

/// A property that panics counts as failing
fn check<T: ?Sized, P: Property<T> + ?Sized>(property: &P, value: &T) -> Verdict {
    catch_unwind(AssertUnwindSafe(|| property.evaluate(value))).unwrap_or(Verdict::Fail)
}

/// Classification of one replayed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    StillFailing,
    Fixed,
    /// The value could not be decompressed or deserialized
    Unreadable,
}

/// How unreadable entries are counted by `replay_all`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnreadablePolicy {
    /// Assume the entry is stale: it is not reported as still failing
    #[default]
    Skip,
    /// Report the entry as still failing
    TreatAsFailing,
}

/// Entries of one test partitioned by replay outcome
#[derive(Debug, Clone, Default)]
pub struct ReplayReport {
    pub still_failing: Vec<CounterexampleEntry>,
    pub fixed: Vec<CounterexampleEntry>,
    pub unreadable: Vec<CounterexampleEntry>,
}

impl ReplayReport {
    pub fn total(&self) -> usize {
        self.still_failing.len() + self.fixed.len() + self.unreadable.len()
    }

    /// No stored counterexample fails any more
    pub fn is_clean(&self) -> bool {
        self.still_failing.is_empty()
    }
}

/// Limits for a shrink walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinimizeConfig {
    /// Upper bound on adopted shrink steps
    pub max_shrink_attempts: usize,
    pub timeout: Duration,
}

impl Default for MinimizeConfig {
    fn default() -> Self {
        Self {
            max_shrink_attempts: 1000,
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinimizeResult<T> {
    /// Smallest failing value found
    pub value: T,
    pub shrink_steps: usize,
    pub duration: Duration,
    pub timed_out: bool,
}

/// Result of [`CounterexampleReplayer::replay_and_minimize`]
#[derive(Debug, Clone)]
pub struct MinimizedCounterexample<T> {
    pub result: MinimizeResult<T>,
    /// Id of the newly stored entry, when shrinking found a smaller value
    pub stored: Option<EntryId>,
}

/// Greedy shrink walk
///
/// Candidates are tried in the order the shrinker returns them; the first one
/// that still fails becomes the current value and the walk restarts from it.
/// Stops when no candidate fails, after `max_shrink_attempts` adopted steps,
/// or once `timeout` has elapsed.
pub fn minimize<T, P, S>(
    value: T,
    property: &P,
    shrinker: &S,
    config: &MinimizeConfig,
) -> MinimizeResult<T>
where
    P: Property<T> + ?Sized,
    S: Shrinker<T> + ?Sized,
{
    let start = Instant::now();
    let mut current = value;
    let mut steps = 0;

    'walk: while steps < config.max_shrink_attempts {
        for candidate in shrinker.shrink(&current) {
            if start.elapsed() > config.timeout {
                return MinimizeResult {
                    value: current,
                    shrink_steps: steps,
                    duration: start.elapsed(),
                    timed_out: true,
                };
            }
            if check(property, &candidate) == Verdict::Fail {
                current = candidate;
                steps += 1;
                continue 'walk;
            }
        }
        break;
    }

    MinimizeResult {
        value: current,
        shrink_steps: steps,
        duration: start.elapsed(),
        timed_out: false,
    }
}

/// Replays stored counterexamples against a property
#[derive(Debug, Clone)]
pub struct CounterexampleReplayer {
    database: Arc<CounterexampleDatabase>,
    unreadable_policy: UnreadablePolicy,
}

impl CounterexampleReplayer {
    pub fn new(database: Arc<CounterexampleDatabase>) -> Self {
        Self {
            database,
            unreadable_policy: UnreadablePolicy::default(),
        }
    }

    pub fn with_unreadable_policy(mut self, policy: UnreadablePolicy) -> Self {
        self.unreadable_policy = policy;
        self
    }

    pub fn unreadable_policy(&self) -> UnreadablePolicy {
        self.unreadable_policy
    }

    pub fn database(&self) -> &Arc<CounterexampleDatabase> {
        &self.database
    }

    /// Decode one entry and run the property on it
    pub fn replay<T, P>(&self, entry: &CounterexampleEntry, property: &P) -> ReplayOutcome
    where
        T: DeserializeOwned,
        P: Property<T> + ?Sized,
    {
        let Some(value) = self.database.decompress_typed::<T>(entry) else {
            debug!(test = %entry.test_name, id = entry.id(), "counterexample is unreadable");
            return ReplayOutcome::Unreadable;
        };

        match check(property, &value) {
            Verdict::Fail => ReplayOutcome::StillFailing,
            Verdict::Pass => ReplayOutcome::Fixed,
        }
    }

    /// Whether an outcome counts as still failing under the current policy
    pub fn counts_as_failing(&self, outcome: ReplayOutcome) -> bool {
        match outcome {
            ReplayOutcome::StillFailing => true,
            ReplayOutcome::Fixed => false,
            ReplayOutcome::Unreadable => self.unreadable_policy == UnreadablePolicy::TreatAsFailing,
        }
    }

    /// Entries of `test_name` that still fail
    pub fn replay_all<T, P>(&self, test_name: &str, property: &P) -> Vec<CounterexampleEntry>
    where
        T: DeserializeOwned,
        P: Property<T> + ?Sized,
    {
        self.database
            .get_by_test(test_name)
            .into_iter()
            .filter(|entry| self.counts_as_failing(self.replay::<T, P>(entry, property)))
            .collect()
    }

    /// Every entry of `test_name`, partitioned by outcome
    pub fn replay_report<T, P>(&self, test_name: &str, property: &P) -> ReplayReport
    where
        T: DeserializeOwned,
        P: Property<T> + ?Sized,
    {
        let mut report = ReplayReport::default();
        for entry in self.database.get_by_test(test_name) {
            match self.replay::<T, P>(&entry, property) {
                ReplayOutcome::StillFailing => report.still_failing.push(entry),
                ReplayOutcome::Fixed => report.fixed.push(entry),
                ReplayOutcome::Unreadable => report.unreadable.push(entry),
            }
        }

        debug!(
            test = test_name,
            still_failing = report.still_failing.len(),
            fixed = report.fixed.len(),
            unreadable = report.unreadable.len(),
            "replayed counterexamples"
        );
        report
    }

    /// Delete exactly the given entries of `test_name`
    ///
    /// Entries of other tests in `fixed_entries` are ignored. Every other
    /// entry of `test_name` is kept.
    pub fn remove_fixed(&self, test_name: &str, fixed_entries: &[CounterexampleEntry]) -> usize {
        let ids: Vec<EntryId> = fixed_entries
            .iter()
            .filter(|entry| entry.test_name == test_name)
            .map(|entry| entry.id())
            .collect();
        if ids.is_empty() {
            return 0;
        }

        let removed = self.database.remove_entries(&ids);
        info!(test = test_name, removed, "removed fixed counterexamples");
        removed
    }

    /// Replay an entry and, if it still fails, shrink its value
    ///
    /// A smaller failing value is stored as a new counterexample for the same
    /// test and property. Returns `None` when the entry no longer fails or
    /// cannot be decoded.
    pub fn replay_and_minimize<T, P, S>(
        &self,
        entry: &CounterexampleEntry,
        property: &P,
        shrinker: &S,
        config: &MinimizeConfig,
    ) -> Result<Option<MinimizedCounterexample<T>>>
    where
        T: Serialize + DeserializeOwned + Clone + PartialEq,
        P: Property<T> + ?Sized,
        S: Shrinker<T> + ?Sized,
    {
        let Some(value) = self.database.decompress_typed::<T>(entry) else {
            return Ok(None);
        };
        if check(property, &value) == Verdict::Pass {
            return Ok(None);
        }

        let result = minimize(value.clone(), property, shrinker, config);
        if result.value == value {
            return Ok(Some(MinimizedCounterexample {
                result,
                stored: None,
            }));
        }

        let mut metadata = entry.metadata.clone();
        metadata.insert("minimized_from".to_string(), entry.timestamp.to_rfc3339());
        metadata.insert("shrink_steps".to_string(), result.shrink_steps.to_string());
        let id = self.database.store_typed(
            &entry.test_name,
            &entry.property_name,
            &result.value,
            &entry.error_message,
            metadata,
        )?;
        info!(
            test = %entry.test_name,
            steps = result.shrink_steps,
            timed_out = result.timed_out,
            "stored minimized counterexample"
        );

        Ok(Some(MinimizedCounterexample {
            result,
            stored: Some(id),
        }))
    }
}
