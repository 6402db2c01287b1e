//! Terminal output for a finished run.

use crate::analysis::anomaly::AlertSet;
use crate::analysis::counter::{Dimension, FrequencyCounter};
use crate::run::RunOutput;

pub fn print_summary(output: &RunOutput) {
    println!("{}", "=".repeat(50));
    println!("Analysis complete.");
    println!("  Capture format:    {}", output.format);
    println!("  Lines read:        {}", output.stats.total());
    println!("  Records parsed:    {}", output.stats.parsed);
    println!("  Lines skipped:     {}", output.stats.skipped);
    println!("  Success rate:      {:.1}%", output.stats.success_rate());
    println!("{}", "=".repeat(50));
}

/// Print up to `top_n` rows (0 = all) of one counter.
pub fn print_counter(dimension: Dimension, counter: &FrequencyCounter, top_n: usize) {
    println!();
    println!(
        "{} ({} distinct, {} total)",
        dimension.label(),
        counter.len(),
        counter.total()
    );
    println!("{}", "-".repeat(50));
    if counter.is_empty() {
        println!("  (none)");
        return;
    }
    for (rank, (key, n)) in counter.most_common(top_n).into_iter().enumerate() {
        println!("  {:>3}. {:<36} {:>8}", rank + 1, key, n);
    }
}

pub fn print_alerts(output: &RunOutput) {
    println!();
    println!("Alerts");
    println!("{}", "-".repeat(50));
    let marker = match output.alerts {
        AlertSet::Flagged(_) => "[!] ",
        AlertSet::Clear | AlertSet::NotRun => "",
    };
    for message in output.alerts.messages() {
        println!("  {}{}", marker, message);
    }
}

pub fn print_report(output: &RunOutput, top_n: usize) {
    print_summary(output);
    for (dimension, counter) in &output.counters {
        print_counter(*dimension, counter, top_n);
    }
    print_alerts(output);
}
