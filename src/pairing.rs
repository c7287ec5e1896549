//! Start/End pairing for repetition records
//!
//! Parallel runs log Start and End lines of different repetitions
//! interleaved, and the same repetition id can legitimately appear more than
//! once (e.g. when several database sizes are appended to one log). Pairing
//! therefore keeps a FIFO of pending Start records per id and matches each
//! End against the oldest one.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::parser::{Action, LogRecord};

/// A matched Start/End record pair for one repetition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RepetitionPair {
    /// Repetition id shared by both records
    pub repetition: u32,
    /// The Start record
    pub start: LogRecord,
    /// The End record
    pub end: LogRecord,
}

impl RepetitionPair {
    /// Sort key restoring chronological order.
    #[must_use]
    pub const fn line_key(&self) -> (usize, usize) {
        (self.start.line, self.end.line)
    }
}

/// Result of pairing one log.
///
/// Unmatched records are not errors; the counts only feed the run summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairingOutcome {
    /// Pairs sorted by `(start.line, end.line)` ascending
    pub pairs: Vec<RepetitionPair>,
    /// End records that arrived with no pending Start of the same id
    pub dropped_ends: usize,
    /// Start records still pending when the log ended
    pub unmatched_starts: usize,
}

/// Pair Start and End records in first-seen order.
///
/// # Example
///
/// ```
/// use perflog::pairing::pair_records;
/// use perflog::parser::parse_ram_log;
///
/// let log = "Start of repetition 1: RAM Usage: 10 MB\n\
///            Start of repetition 2: RAM Usage: 11 MB\n\
///            End of repetition 2: RAM Usage: 40 MB\n\
///            End of repetition 1: RAM Usage: 30 MB\n";
/// let outcome = pair_records(&parse_ram_log(log));
/// assert_eq!(outcome.pairs.len(), 2);
/// assert_eq!(outcome.pairs[0].repetition, 1);
/// ```
#[must_use]
pub fn pair_records(records: &[LogRecord]) -> PairingOutcome {
    let mut pending: HashMap<u32, VecDeque<LogRecord>> = HashMap::new();
    let mut outcome = PairingOutcome::default();

    for record in records {
        match record.action {
            Action::Start => pending.entry(record.repetition).or_default().push_back(*record),
            Action::End => {
                match pending.get_mut(&record.repetition).and_then(VecDeque::pop_front) {
                    Some(start) => outcome.pairs.push(RepetitionPair {
                        repetition: record.repetition,
                        start,
                        end: *record,
                    }),
                    None => {
                        tracing::debug!(
                            repetition = record.repetition,
                            line = record.line,
                            "End without pending Start, dropped"
                        );
                        outcome.dropped_ends += 1;
                    }
                }
            }
        }
    }

    outcome.unmatched_starts = pending.values().map(VecDeque::len).sum();
    outcome.pairs.sort_by_key(RepetitionPair::line_key);

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(action: Action, repetition: u32, value: f64, line: usize) -> LogRecord {
        LogRecord {
            action,
            repetition,
            value,
            line,
        }
    }

    #[test]
    fn test_sequential_pairs() {
        let records = vec![
            rec(Action::Start, 1, 10.0, 0),
            rec(Action::End, 1, 30.0, 1),
            rec(Action::Start, 2, 20.0, 2),
            rec(Action::End, 2, 40.0, 3),
        ];
        let outcome = pair_records(&records);
        assert_eq!(outcome.pairs.len(), 2);
        assert_eq!(outcome.pairs[0].line_key(), (0, 1));
        assert_eq!(outcome.pairs[1].line_key(), (2, 3));
        assert_eq!(outcome.dropped_ends, 0);
        assert_eq!(outcome.unmatched_starts, 0);
    }

    #[test]
    fn test_interleaved_parallel_log_restores_start_order() {
        // Ends finish out of order, as happens with a worker pool.
        let records = vec![
            rec(Action::Start, 1, 10.0, 0),
            rec(Action::Start, 2, 11.0, 1),
            rec(Action::Start, 3, 12.0, 2),
            rec(Action::End, 3, 52.0, 3),
            rec(Action::End, 1, 50.0, 4),
            rec(Action::End, 2, 51.0, 5),
        ];
        let outcome = pair_records(&records);
        let reps: Vec<u32> = outcome.pairs.iter().map(|p| p.repetition).collect();
        assert_eq!(reps, vec![1, 2, 3]);
        assert!((outcome.pairs[2].end.value - 52.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_duplicate_ids_match_fifo() {
        let records = vec![
            rec(Action::Start, 1, 1.0, 0),
            rec(Action::Start, 1, 2.0, 1),
            rec(Action::End, 1, 3.0, 2),
            rec(Action::End, 1, 4.0, 3),
        ];
        let outcome = pair_records(&records);
        assert_eq!(outcome.pairs[0].line_key(), (0, 2));
        assert_eq!(outcome.pairs[1].line_key(), (1, 3));
    }

    #[test]
    fn test_unmatched_end_is_dropped() {
        let records = vec![
            rec(Action::End, 7, 3.0, 0),
            rec(Action::Start, 1, 1.0, 1),
            rec(Action::End, 1, 2.0, 2),
            rec(Action::Start, 9, 1.0, 3),
        ];
        let outcome = pair_records(&records);
        assert_eq!(outcome.pairs.len(), 1);
        assert_eq!(outcome.dropped_ends, 1);
        assert_eq!(outcome.unmatched_starts, 1);
    }

    #[test]
    fn test_end_before_start_of_same_id_is_not_paired_backwards() {
        let records = vec![rec(Action::End, 1, 2.0, 0), rec(Action::Start, 1, 1.0, 1)];
        let outcome = pair_records(&records);
        assert!(outcome.pairs.is_empty());
        assert_eq!(outcome.dropped_ends, 1);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(pair_records(&[]), PairingOutcome::default());
    }
}
