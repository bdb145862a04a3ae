use serde::Deserialize;

use glimmer_lighting::WorkQueue;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 0 picks one less than the available parallelism, at least 1.
    pub worker_threads: usize,
    /// Entries per propagation work queue.
    pub queue_capacity: usize,
    /// Tasks allowed in flight at once; further requests are rejected.
    pub max_in_flight: usize,
    /// Completion reports kept until drained; further reports are dropped and counted.
    /// 0 turns reports off.
    pub report_capacity: usize,
    pub thread_name_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            queue_capacity: WorkQueue::DEFAULT_CAPACITY,
            max_in_flight: 16_384,
            report_capacity: 4096,
            thread_name_prefix: "glimmer-light".into(),
        }
    }
}

impl SchedulerConfig {
    pub fn resolved_workers(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(1)
            .max(1)
    }
}
