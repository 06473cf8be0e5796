//! Cooperative work queue with generation-based cancellation.
//!
//! Long jobs are split into units and executed a bounded batch at a time, so
//! the host decides when the next batch runs. Every queue holds a
//! [`CancellationToken`] issued by a [`Generation`]; advancing the generation
//! cancels every token issued before it.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Moves to a new generation and returns it.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            issued: self.current(),
            generation: Arc::clone(&self.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CancellationToken {
    issued: u64,
    generation: Arc<AtomicU64>,
}

impl CancellationToken {
    pub fn generation(&self) -> u64 {
        self.issued
    }

    pub fn is_cancelled(&self) -> bool {
        self.generation.load(Ordering::SeqCst) != self.issued
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Pending { completed: usize, total: usize },
    Complete,
    Cancelled { completed: usize, total: usize },
}

#[derive(Debug)]
pub struct WorkQueue<T> {
    pending: VecDeque<T>,
    total: usize,
    batch_size: usize,
    token: CancellationToken,
}

impl<T> WorkQueue<T> {
    pub fn new<I>(units: I, batch_size: usize, token: CancellationToken) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let pending = units.into_iter().collect::<VecDeque<_>>();
        Self {
            total: pending.len(),
            pending,
            batch_size: batch_size.max(1),
            token,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.total - self.pending.len()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Runs at most one batch. A cancelled queue drops its remaining units
    /// without running them.
    pub fn run_batch<F>(&mut self, mut work: F) -> Step
    where
        F: FnMut(T),
    {
        if self.token.is_cancelled() {
            let completed = self.completed();
            self.pending.clear();
            return Step::Cancelled {
                completed,
                total: self.total,
            };
        }
        let take = self.batch_size.min(self.pending.len());
        for unit in self.pending.drain(..take) {
            work(unit);
        }
        if self.pending.is_empty() {
            Step::Complete
        } else {
            Step::Pending {
                completed: self.completed(),
                total: self.total,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_in_bounded_batches() {
        let generation = Generation::new();
        let mut queue = WorkQueue::new(0..60, 25, generation.token());
        let mut seen = Vec::new();
        assert_eq!(
            queue.run_batch(|n| seen.push(n)),
            Step::Pending {
                completed: 25,
                total: 60
            }
        );
        assert_eq!(
            queue.run_batch(|n| seen.push(n)),
            Step::Pending {
                completed: 50,
                total: 60
            }
        );
        assert_eq!(queue.run_batch(|n| seen.push(n)), Step::Complete);
        assert_eq!(seen, (0..60).collect::<Vec<_>>());
    }

    #[test]
    fn advancing_generation_cancels_older_tokens() {
        let generation = Generation::new();
        let mut queue = WorkQueue::new(0..10, 4, generation.token());
        let mut ran = 0;
        queue.run_batch(|_| ran += 1);
        let fresh = generation.advance();
        assert_eq!(
            queue.run_batch(|_| ran += 1),
            Step::Cancelled {
                completed: 4,
                total: 10
            }
        );
        assert_eq!(ran, 4);
        assert!(!generation.token().is_cancelled());
        assert_eq!(generation.token().generation(), fresh);
    }

    #[test]
    fn empty_queue_completes_immediately() {
        let mut queue = WorkQueue::new(Vec::<u8>::new(), 25, Generation::new().token());
        assert_eq!(queue.total(), 0);
        assert_eq!(queue.run_batch(|_| {}), Step::Complete);
    }
}
