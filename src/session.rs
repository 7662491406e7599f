use itertools::Itertools;

use crate::metrics::{self, Metrics};
use crate::passages::Difficulty;

/// Lifecycle of a single typing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Active,
    Finished,
}

/// A practice passage as handed out by the store. The session keeps a
/// read-only copy for the duration of the attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceText {
    pub id: i64,
    pub content: String,
    pub difficulty: Difficulty,
}

/// One sample of the live WPM curve, for the results chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WpmPoint {
    pub t: f64,
    pub wpm: f64,
}

/// The finished measurement handed to the store. Produced at most once per
/// session.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub user_id: i64,
    pub text_id: i64,
    pub wpm: f64,
    pub accuracy: f64,
    pub mistakes: usize,
    pub duration: f64,
}

/// One typing attempt from passage assignment through completion.
///
/// All timestamps are monotonic seconds supplied by the caller, so the
/// whole machine is deterministic: the runtime owns the clock, the session
/// owns the state. Each `observe` call is a full recomputation from the
/// snapshot it is given, never an incremental update, so repeated calls
/// with the same snapshot are idempotent.
#[derive(Debug)]
pub struct TypingSession {
    user_id: i64,
    status: Status,
    reference: Option<ReferenceText>,
    typed: String,
    started_at: Option<f64>,
    finished_at: Option<f64>,
    live_wpm: f64,
    live_accuracy: f64,
    wpm_series: Vec<WpmPoint>,
    final_metrics: Option<Metrics>,
    consistency: f64,
    emitted: bool,
}

impl TypingSession {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            status: Status::Idle,
            reference: None,
            typed: String::new(),
            started_at: None,
            finished_at: None,
            live_wpm: 0.0,
            live_accuracy: 100.0,
            wpm_series: Vec::new(),
            final_metrics: None,
            consistency: 0.0,
            emitted: false,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn reference(&self) -> Option<&ReferenceText> {
        self.reference.as_ref()
    }

    pub fn typed(&self) -> &str {
        &self.typed
    }

    pub fn started_at(&self) -> Option<f64> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<f64> {
        self.finished_at
    }

    pub fn live_wpm(&self) -> f64 {
        self.live_wpm
    }

    pub fn live_accuracy(&self) -> f64 {
        self.live_accuracy
    }

    pub fn wpm_series(&self) -> &[WpmPoint] {
        &self.wpm_series
    }

    pub fn final_metrics(&self) -> Option<Metrics> {
        self.final_metrics
    }

    /// Standard deviation of the per-second WPM samples, 0.0 until finished.
    pub fn consistency(&self) -> f64 {
        self.consistency
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn has_finished(&self) -> bool {
        self.status == Status::Finished
    }

    /// Start a new attempt on `reference`. Clears all per-attempt state,
    /// including the emission guard. Valid from any state: starting a new
    /// test discards whatever came before.
    pub fn assign(&mut self, reference: ReferenceText) {
        self.clear();
        self.reference = Some(reference);
        self.status = Status::Active;
    }

    /// The Active self-loop: take the current keystroke snapshot and
    /// recompute live metrics. The clock starts on the first non-blank
    /// snapshot. Completes the attempt when the snapshot equals the
    /// reference. Ignored outside Active.
    pub fn observe(&mut self, typed: &str, now_secs: f64) {
        if self.status != Status::Active {
            return;
        }
        let Some(reference) = self.reference.clone() else {
            return;
        };

        self.typed.clear();
        self.typed.push_str(typed);

        if self.started_at.is_none() && !self.typed.trim().is_empty() {
            self.started_at = Some(now_secs);
        }

        if let Some(started) = self.started_at {
            let elapsed = now_secs - started;
            self.live_wpm = metrics::live_wpm(self.typed.chars().count(), elapsed);
            self.live_accuracy = metrics::live_accuracy(&self.typed, &reference.content);
            if elapsed > 0.0 {
                self.wpm_series.push(WpmPoint {
                    t: elapsed,
                    wpm: self.live_wpm,
                });
            }
        }

        if self.typed == reference.content {
            self.finish(now_secs);
        }
    }

    /// Manual submission: finish the attempt with whatever has been typed.
    /// Ignored outside Active.
    pub fn submit(&mut self, now_secs: f64) {
        if self.status == Status::Active {
            self.finish(now_secs);
        }
    }

    fn finish(&mut self, now_secs: f64) {
        let reference = match &self.reference {
            Some(r) => r.content.clone(),
            None => String::new(),
        };
        let started = self.started_at.unwrap_or(now_secs);
        self.finished_at = Some(now_secs);
        self.final_metrics = Some(metrics::compute(started, now_secs, &self.typed, &reference));
        self.consistency = self.per_second_consistency();
        self.status = Status::Finished;
    }

    // Bucket the live samples by whole second, keep the last sample of each
    // bucket, and take the spread of those.
    fn per_second_consistency(&self) -> f64 {
        let per_second: Vec<f64> = self
            .wpm_series
            .iter()
            .map(|p| (p.t.ceil().max(1.0) as i64, p.wpm))
            .into_group_map()
            .into_iter()
            .sorted_by_key(|(sec, _)| *sec)
            .filter_map(|(_, samples)| samples.last().copied())
            .collect();

        metrics::std_dev(&per_second).unwrap_or(0.0)
    }

    /// Yield the finished result exactly once. Every later call returns
    /// `None`, no matter how many ticks or observations follow. The caller
    /// hands the record to the store; a failed insert does not reopen the
    /// session.
    pub fn take_result(&mut self) -> Option<ResultRecord> {
        if self.status != Status::Finished || self.emitted {
            return None;
        }
        let reference = self.reference.as_ref()?;
        let m = self.final_metrics?;
        self.emitted = true;
        Some(ResultRecord {
            user_id: self.user_id,
            text_id: reference.id,
            wpm: m.wpm,
            accuracy: m.accuracy,
            mistakes: m.mistakes,
            duration: m.duration,
        })
    }

    /// Explicit return to Idle. The next `assign` starts a fresh attempt.
    pub fn reset(&mut self) {
        self.clear();
        self.status = Status::Idle;
    }

    fn clear(&mut self) {
        self.reference = None;
        self.typed.clear();
        self.started_at = None;
        self.finished_at = None;
        self.live_wpm = 0.0;
        self.live_accuracy = 100.0;
        self.wpm_series.clear();
        self.final_metrics = None;
        self.consistency = 0.0;
        self.emitted = false;
    }
}
