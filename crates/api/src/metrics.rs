use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub struct Metrics {
    // Counters
    questions: AtomicUsize,
    answered: AtomicUsize,
    empty_result_answers: AtomicUsize,

    // Failures by kind
    validation_failures: AtomicUsize,
    generation_failures: AtomicUsize,
    execution_failures: AtomicUsize,
    model_failures: AtomicUsize,
    other_failures: AtomicUsize,

    // Timing (in microseconds)
    total_pipeline_time_us: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            questions: AtomicUsize::new(0),
            answered: AtomicUsize::new(0),
            empty_result_answers: AtomicUsize::new(0),
            validation_failures: AtomicUsize::new(0),
            generation_failures: AtomicUsize::new(0),
            execution_failures: AtomicUsize::new(0),
            model_failures: AtomicUsize::new(0),
            other_failures: AtomicUsize::new(0),
            total_pipeline_time_us: AtomicU64::new(0),
        })
    }

    /// `record_count` is `None` when the answer was produced without keeping the context.
    pub fn record_answer(&self, duration: Duration, record_count: Option<usize>) {
        self.questions.fetch_add(1, Ordering::Relaxed);
        self.answered.fetch_add(1, Ordering::Relaxed);
        if record_count == Some(0) {
            self.empty_result_answers.fetch_add(1, Ordering::Relaxed);
        }
        self.total_pipeline_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, kind: &str, duration: Duration) {
        self.questions.fetch_add(1, Ordering::Relaxed);
        let counter = match kind {
            "validation" => &self.validation_failures,
            "generation" => &self.generation_failures,
            "execution" => &self.execution_failures,
            "model" => &self.model_failures,
            _ => &self.other_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.total_pipeline_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let questions = self.questions.load(Ordering::Relaxed);
        let total_us = self.total_pipeline_time_us.load(Ordering::Relaxed) as f64;

        MetricsSnapshot {
            questions,
            answered: self.answered.load(Ordering::Relaxed),
            empty_result_answers: self.empty_result_answers.load(Ordering::Relaxed),
            failures: FailureCounts {
                validation: self.validation_failures.load(Ordering::Relaxed),
                generation: self.generation_failures.load(Ordering::Relaxed),
                execution: self.execution_failures.load(Ordering::Relaxed),
                model: self.model_failures.load(Ordering::Relaxed),
                other: self.other_failures.load(Ordering::Relaxed),
            },
            avg_pipeline_time_ms: if questions > 0 {
                total_us / questions as f64 / 1000.0 // Convert to ms
            } else {
                0.0
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub questions: usize,
    pub answered: usize,
    pub empty_result_answers: usize,
    pub failures: FailureCounts,
    pub avg_pipeline_time_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct FailureCounts {
    pub validation: usize,
    pub generation: usize,
    pub execution: usize,
    pub model: usize,
    pub other: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
