//! Line grammars for benchmark logs
//!
//! Every `parse_*_line` function is total: a line that does not match its
//! grammar yields `None` and the caller skips it. Only a value that matched
//! a grammar but cannot be interpreted (e.g. `Execution Time: 3parsecs`)
//! surfaces as [`Error::Format`].
//!
//! ## Grammars
//!
//! ```text
//! <Start|End> of repetition <N>: RAM Usage: <N> MB
//! <Start|End> of repetition <N>: ... Cpu(s): <F> us
//! %Cpu(s): <F> us
//! Execution Time: <F>ms | <F>s | <N>m<F>s
//! <YYYY/MM/DD HH:MM:SS> Merkle preprocessing evaluation for dbLen <N> bits
//! ```
//!
//! The benchmark harness spelled "repetition" three different ways over its
//! lifetime, so all of `repetition`, `repitition` and `repition` are accepted.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Timestamp layout of Go's default `log` prefix.
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

macro_rules! line_pattern {
    ($name:ident, $regex_str:expr) => {
        static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($regex_str).ok());
    };
}

line_pattern!(
    RE_RAM,
    r"(?i)\b(start|end) of rep(?:etition|itition|ition) (\d+):\s*RAM Usage:\s*(\d+(?:\.\d+)?)\s*MB"
);

line_pattern!(
    RE_MARKER,
    r"(?i)\b(start|end) of rep(?:etition|itition|ition) (\d+):"
);

line_pattern!(RE_CPU_US, r"Cpu\(s\):\s*(\d+(?:\.\d+)?)\s*us");

line_pattern!(RE_EXEC_TIME, r"Execution Time:\s*(\S+)");

line_pattern!(
    RE_PREPROCESSING,
    r"(\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2}) Merkle preprocessing evaluation for dbLen (\d+) bits"
);

line_pattern!(
    RE_TERMINATED,
    r"(\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2}) simulation terminated successfully"
);

/// Which side of a repetition a record marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Emitted before the measured work.
    Start,
    /// Emitted after the measured work.
    End,
}

impl Action {
    fn from_keyword(keyword: &str) -> Option<Self> {
        if keyword.eq_ignore_ascii_case("start") {
            Some(Self::Start)
        } else if keyword.eq_ignore_ascii_case("end") {
            Some(Self::End)
        } else {
            None
        }
    }
}

/// One Start/End measurement parsed from a log line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Start or End marker
    pub action: Action,
    /// Repetition number as printed by the harness (1-based)
    pub repetition: u32,
    /// Measured value (MB for RAM logs, `us` percent for CPU logs)
    pub value: f64,
    /// Zero-based line index in the source file
    pub line: usize,
}

/// A line of a CPU usage log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CpuLine {
    /// `Start/End of repetition N: ...`, possibly carrying the first `top` sample inline
    Marker {
        /// Start or End marker
        action: Action,
        /// Repetition number
        repetition: u32,
        /// `us` value printed on the marker line itself, if any
        sample: Option<f64>,
    },
    /// A bare `%Cpu(s): F us` line following a marker
    Sample(f64),
}

/// A Merkle preprocessing log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessingEvent {
    /// Wall-clock time the evaluation started
    pub timestamp: NaiveDateTime,
    /// Database length in bits
    pub db_len_bits: u64,
}

fn captures<'h>(pattern: &LazyLock<Option<Regex>>, line: &'h str) -> Option<regex::Captures<'h>> {
    pattern.as_ref()?.captures(line)
}

/// Parse `"<Start|End> of repetition <N>: RAM Usage: <N> MB"`.
#[must_use]
pub fn parse_ram_line(line: &str, line_index: usize) -> Option<LogRecord> {
    let caps = captures(&RE_RAM, line)?;
    Some(LogRecord {
        action: Action::from_keyword(&caps[1])?,
        repetition: caps[2].parse().ok()?,
        value: caps[3].parse().ok()?,
        line: line_index,
    })
}

/// Parse a line of a CPU usage log (marker or bare sample).
#[must_use]
pub fn parse_cpu_line(line: &str) -> Option<CpuLine> {
    let sample = captures(&RE_CPU_US, line).and_then(|caps| caps[1].parse::<f64>().ok());

    if let Some(caps) = captures(&RE_MARKER, line) {
        return Some(CpuLine::Marker {
            action: Action::from_keyword(&caps[1])?,
            repetition: caps[2].parse().ok()?,
            sample,
        });
    }

    sample.map(CpuLine::Sample)
}

/// Parse `"Execution Time: <duration>"`.
///
/// Returns `None` when the line is not an execution-time line and
/// `Some(Err(..))` when it is but the duration is malformed.
#[must_use]
pub fn parse_execution_time_line(line: &str) -> Option<Result<f64>> {
    let caps = captures(&RE_EXEC_TIME, line)?;
    Some(parse_duration_ms(&caps[1]))
}

/// Convert a Go-style duration string to milliseconds.
///
/// Accepts `1500.0ms`, `2.5s`, `1m2.5s` as well as the other forms Go's
/// `time.Duration` printer produces (`1h2m3s`, `350µs`, `350us`, `12ns`).
///
/// # Errors
///
/// Returns [`Error::Format`] if the string is empty, has a component without
/// digits, or uses an unknown unit.
///
/// # Example
///
/// ```
/// use perflog::parser::parse_duration_ms;
///
/// assert!((parse_duration_ms("1m2.5s").unwrap() - 62_500.0).abs() < 1e-9);
/// assert!(parse_duration_ms("bad").is_err());
/// ```
pub fn parse_duration_ms(text: &str) -> Result<f64> {
    let text = text.trim();
    let malformed = || Error::Format(format!("malformed execution time {text:?}"));

    if text.is_empty() {
        return Err(malformed());
    }

    let mut total = 0.0;
    let mut rest = text;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if digits_end == 0 {
            return Err(malformed());
        }
        let value: f64 = rest[..digits_end].parse().map_err(|_| malformed())?;
        rest = &rest[digits_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let factor = match &rest[..unit_end] {
            "h" => 3_600_000.0,
            "m" => 60_000.0,
            "s" => 1_000.0,
            "ms" => 1.0,
            "us" | "µs" | "μs" => 1e-3,
            "ns" => 1e-6,
            _ => return Err(malformed()),
        };
        rest = &rest[unit_end..];
        total += value * factor;
    }

    Ok(total)
}

/// Parse `"<YYYY/MM/DD HH:MM:SS> Merkle preprocessing evaluation for dbLen <N> bits"`.
#[must_use]
pub fn parse_preprocessing_line(line: &str) -> Option<PreprocessingEvent> {
    let caps = captures(&RE_PREPROCESSING, line)?;
    Some(PreprocessingEvent {
        timestamp: NaiveDateTime::parse_from_str(&caps[1], LOG_TIMESTAMP_FORMAT).ok()?,
        db_len_bits: caps[2].parse().ok()?,
    })
}

/// Parse `"<YYYY/MM/DD HH:MM:SS> simulation terminated successfully"`.
#[must_use]
pub fn parse_termination_line(line: &str) -> Option<NaiveDateTime> {
    let caps = captures(&RE_TERMINATED, line)?;
    NaiveDateTime::parse_from_str(&caps[1], LOG_TIMESTAMP_FORMAT).ok()
}

/// Parse every RAM record of a log, skipping lines that do not match.
#[must_use]
pub fn parse_ram_log(text: &str) -> Vec<LogRecord> {
    text.lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let record = parse_ram_line(line, idx);
            if record.is_none() && !line.trim().is_empty() {
                tracing::trace!(line = idx, "skipping non-RAM line");
            }
            record
        })
        .collect()
}

/// Collapse a CPU log into `(repetition, max us)` rows, one per marker.
///
/// Samples preceding the first marker are ignored. A marker block with no
/// samples at all is dropped.
#[must_use]
pub fn parse_cpu_log(text: &str) -> Vec<(u32, f64)> {
    let mut rows = Vec::new();
    let mut current: Option<(u32, Option<f64>)> = None;

    let flush = |block: Option<(u32, Option<f64>)>, rows: &mut Vec<(u32, f64)>| {
        match block {
            Some((repetition, Some(max))) => rows.push((repetition, max)),
            Some((repetition, None)) => {
                tracing::debug!(repetition, "CPU marker without samples, dropped");
            }
            None => {}
        }
    };

    for (idx, line) in text.lines().enumerate() {
        match parse_cpu_line(line) {
            Some(CpuLine::Marker { repetition, sample, .. }) => {
                flush(current.take(), &mut rows);
                current = Some((repetition, sample));
            }
            Some(CpuLine::Sample(us)) => match current.as_mut() {
                Some((_, max)) => *max = Some(max.map_or(us, |m: f64| m.max(us))),
                None => tracing::trace!(line = idx, "CPU sample before first marker"),
            },
            None => {
                if !line.trim().is_empty() {
                    tracing::trace!(line = idx, "skipping non-CPU line");
                }
            }
        }
    }
    flush(current, &mut rows);

    rows
}

/// Parse every execution time of a log, in file order.
///
/// # Errors
///
/// Returns [`Error::Format`] on the first malformed duration.
pub fn parse_execution_time_log(text: &str) -> Result<Vec<f64>> {
    text.lines().filter_map(parse_execution_time_line).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ram_line() {
        let record = parse_ram_line("Start of repetition 3: RAM Usage: 7450 MB", 12).unwrap();
        assert_eq!(record.action, Action::Start);
        assert_eq!(record.repetition, 3);
        assert!((record.value - 7450.0).abs() < f64::EPSILON);
        assert_eq!(record.line, 12);
    }

    #[test]
    fn test_parse_ram_line_accepts_harness_misspellings() {
        let a = parse_ram_line("End of repitition 1: RAM Usage: 28 MB", 0).unwrap();
        let b = parse_ram_line("End of repition 1: RAM Usage: 28 MB", 0).unwrap();
        assert_eq!(a.action, Action::End);
        assert_eq!(a.repetition, b.repetition);
    }

    #[test]
    fn test_parse_ram_line_not_applicable() {
        assert!(parse_ram_line("start repetition 1 out of 10", 0).is_none());
        assert!(parse_ram_line("", 0).is_none());
        assert!(parse_ram_line("Start of repetition 1: Goroutines: 8", 0).is_none());
    }

    #[test]
    fn test_parse_cpu_marker_with_inline_sample() {
        let line =
            "Start of repetition 2: Goroutines: %!d(string=%Cpu(s):  3.4 us,  0.5 sy,  0.0 ni";
        assert_eq!(
            parse_cpu_line(line),
            Some(CpuLine::Marker {
                action: Action::Start,
                repetition: 2,
                sample: Some(3.4),
            })
        );
    }

    #[test]
    fn test_parse_cpu_sample() {
        let line = "%Cpu(s): 12.5 us,  1.0 sy,  0.0 ni, 86.0 id";
        assert_eq!(parse_cpu_line(line), Some(CpuLine::Sample(12.5)));
        assert_eq!(parse_cpu_line("MiB Mem : 15890.1 total"), None);
    }

    #[test]
    fn test_parse_cpu_log_takes_block_maximum() {
        let log = "\
Start of repetition 1: Goroutines: %Cpu(s):  1.0 us
%Cpu(s):  7.5 us,  0.2 sy
%Cpu(s):  2.0 us,  0.2 sy
End of repetition 1: Goroutines: %Cpu(s):  4.0 us
%Cpu(s):  3.0 us
";
        assert_eq!(parse_cpu_log(log), vec![(1, 7.5), (1, 4.0)]);
    }

    #[test]
    fn test_parse_cpu_log_drops_marker_without_samples() {
        let log = "Start of repetition 1: Goroutines: Error measuring CPU usage\n%Cpu(s): 1.0 us\n";
        // The sample belongs to the marker block, so it is kept.
        assert_eq!(parse_cpu_log(log), vec![(1, 1.0)]);
        let log = "Start of repetition 1: Goroutines: Error measuring CPU usage\n";
        assert!(parse_cpu_log(log).is_empty());
    }

    #[test]
    fn test_parse_duration_ms_forms() {
        assert!((parse_duration_ms("1500.0ms").unwrap() - 1500.0).abs() < 1e-9);
        assert!((parse_duration_ms("2.5s").unwrap() - 2500.0).abs() < 1e-9);
        assert!((parse_duration_ms("1m2.5s").unwrap() - 62_500.0).abs() < 1e-9);
        assert!((parse_duration_ms("1h0m1s").unwrap() - 3_601_000.0).abs() < 1e-9);
        assert!((parse_duration_ms("250µs").unwrap() - 0.25).abs() < 1e-9);
        assert!((parse_duration_ms("500ns").unwrap() - 0.0005).abs() < 1e-12);
    }

    #[test]
    fn test_parse_duration_ms_rejects_garbage() {
        for bad in ["bad", "", "12", "1x", "ms", "1..2s", "1m2.5"] {
            assert!(
                matches!(parse_duration_ms(bad), Err(Error::Format(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_execution_time_line() {
        let parsed = parse_execution_time_line("Execution Time: 2.5s").unwrap().unwrap();
        assert!((parsed - 2500.0).abs() < 1e-9);
        assert!(parse_execution_time_line("Execution Time: soon").unwrap().is_err());
        assert!(parse_execution_time_line("RAM Usage: 3 MB").is_none());
    }

    #[test]
    fn test_parse_preprocessing_line() {
        let event = parse_preprocessing_line(
            "2024/12/08 19:50:08 Merkle preprocessing evaluation for dbLen 8589934592 bits",
        )
        .unwrap();
        assert_eq!(event.db_len_bits, 8_589_934_592);
        assert_eq!(event.timestamp.to_string(), "2024-12-08 19:50:08");
    }

    #[test]
    fn test_parse_termination_line() {
        assert!(
            parse_termination_line("2024/12/09 00:56:35 simulation terminated successfully.")
                .is_some()
        );
        assert!(parse_termination_line("simulation terminated successfully").is_none());
    }
}
