//! Counting and threshold heuristics over parsed traffic records.

pub mod anomaly;
pub mod counter;

pub use anomaly::{Alert, AlertKind, AlertSet, AnomalyDetector};
pub use counter::{count, count_where, Dimension, FrequencyCounter};
