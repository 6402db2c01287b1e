//! dumpscope library crate: tcpdump transcript parsing, aggregation and
//! threat heuristics. The binary and the benchmarks both link against it.

pub mod analysis;
pub mod config;
pub mod display;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod run;
pub mod transcript;
