//! # perflog: Benchmark Log Aligner & Reporter
//!
//! Post-processes the text logs written by the VPIR simulation harness
//! (elliptic-curve, LWE, LWE128 and Merkle preprocessing runs) into aligned
//! CSV tables, merges a sequential and a parallel run side by side, and
//! renders comparison charts.
//!
//! ## Data flow
//!
//! ```text
//! raw log ─▶ parser ─▶ pairing / sequencer ─▶ table (CSV) ─▶ merge ─▶ plot
//! ```
//!
//! ## Example
//!
//! ```rust
//! use perflog::pairing::pair_records;
//! use perflog::parser::parse_ram_log;
//!
//! let log = "Start of repetition 1: RAM Usage: 745 MB\n\
//!            End of repetition 1: RAM Usage: 2800 MB\n";
//! let outcome = pair_records(&parse_ram_log(log));
//! assert_eq!(outcome.pairs.len(), 1);
//! assert!((outcome.pairs[0].end.value - 2800.0).abs() < f64::EPSILON);
//! ```
//!
//! End-to-end processing of one category folder goes through
//! [`pipeline::run`] with a [`config::ReportConfig`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod pairing;
pub mod parser;
pub mod pipeline;
pub mod plot;
pub mod report;
pub mod sequencer;
pub mod table;

pub use config::{Category, ReportConfig};
pub use error::{Error, Result};
