//! CPU-usage sequencing
//!
//! CPU logs carry no usable Start/End distinction once collapsed to
//! `(Repetition, Max_CPU_Usage_us)` rows, so rows are paired by id alone:
//! each unmatched row takes the nearest later row with the same id.

use std::collections::{HashMap, VecDeque};

use crate::{Error, Result};

/// Pair CPU rows and flatten them into `(id, start), (id, end)` rows.
///
/// Pairs keep the encounter order of their first row. Each row is consumed
/// at most once; a row that never finds a later partner is dropped.
///
/// # Errors
///
/// Returns [`Error::Format`] if a value is not a number.
///
/// # Example
///
/// ```
/// use perflog::sequencer::sequence_cpu_usage;
///
/// let rows = [(1, "10"), (2, "20"), (1, "30"), (2, "40")];
/// let paired = sequence_cpu_usage(&rows).unwrap();
/// assert_eq!(paired, vec![(1, 10.0), (1, 30.0), (2, 20.0), (2, 40.0)]);
/// ```
pub fn sequence_cpu_usage<S: AsRef<str>>(rows: &[(u32, S)]) -> Result<Vec<(u32, f64)>> {
    let values = rows
        .iter()
        .map(|(id, raw)| {
            let raw = raw.as_ref().trim();
            raw.parse::<f64>().map(|v| (*id, v)).map_err(|_| {
                Error::Format(format!("CPU usage {raw:?} for repetition {id} is not a number"))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(sequence_values(&values))
}

/// Same as [`sequence_cpu_usage`] for rows that are already numeric.
#[must_use]
pub fn sequence_values(rows: &[(u32, f64)]) -> Vec<(u32, f64)> {
    // Indices of rows per id, in order; the nearest following row with the
    // same id is always the next entry of that queue.
    let mut by_id: HashMap<u32, VecDeque<usize>> = HashMap::new();
    for (idx, (id, _)) in rows.iter().enumerate() {
        by_id.entry(*id).or_default().push_back(idx);
    }

    let mut consumed = vec![false; rows.len()];
    let mut out = Vec::with_capacity(rows.len());

    for (idx, &(id, value)) in rows.iter().enumerate() {
        if consumed[idx] {
            continue;
        }
        let Some(queue) = by_id.get_mut(&id) else {
            continue;
        };
        // Drop our own index (always at the front for an unconsumed row).
        queue.pop_front();
        consumed[idx] = true;

        match queue.pop_front() {
            Some(partner) => {
                consumed[partner] = true;
                out.push((id, value));
                out.push((id, rows[partner].1));
            }
            None => tracing::debug!(repetition = id, "CPU row without partner, dropped"),
        }
    }

    out
}
