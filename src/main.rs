mod cli;

use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use dumpscope::config::{self, Config};
use dumpscope::display;
use dumpscope::report;
use dumpscope::run::{RunContext, RunOutput};

fn main() {
    let args = cli::Cli::parse();

    // Initialize tracing/logging
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(e) = run_analysis(&config) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run_analysis(config: &RuntimeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let started = Instant::now();
    let context = RunContext::new(config.config.clone());
    let output = context.run(&config.input)?;
    tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "run finished");

    let output_config = &config.config.output;
    if !output_config.quiet {
        display::print_report(&output, output_config.top_n);
    }

    export(&output, output_config)
}

fn export(output: &RunOutput, config: &config::OutputConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = &config.export_csv {
        report::write_records_csv(path, &output.records)?;
        println!("  Record export (CSV):      {}", path.display());
    }
    if let Some(path) = &config.export_json {
        report::write_report_json(path, output)?;
        println!("  Report export (JSON):     {}", path.display());
    }
    if let Some(path) = &config.export_markdown {
        report::write_markdown(path, output, config.top_n)?;
        println!("  Report export (Markdown): {}", path.display());
    }
    if let Some(path) = &config.alerts_jsonl {
        report::write_alerts_jsonl(path, &output.alerts)?;
        println!("  Alerts (JSONL):           {}", path.display());
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct RuntimeConfig {
    input: PathBuf,
    config: Config,
}

fn load_config(args: &cli::Cli) -> Result<RuntimeConfig, config::ConfigError> {
    let base = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let mut parser = base.parser.clone();
    let mut analysis = base.analysis.clone();
    let mut output = base.output.clone();

    if let Some(value) = args.format {
        parser.format = value;
    }
    if let Some(value) = args.numeric_suffix {
        parser.numeric_suffix = value;
    }
    if let Some(value) = args.workers {
        parser.workers = value;
    }
    if !args.dimension.is_empty() {
        analysis.dimensions = args.dimension.clone();
    }
    if let Some(value) = args.top {
        output.top_n = value;
    }
    if let Some(value) = &args.export_csv {
        output.export_csv = Some(value.clone());
    }
    if let Some(value) = &args.export_json {
        output.export_json = Some(value.clone());
    }
    if let Some(value) = &args.export_markdown {
        output.export_markdown = Some(value.clone());
    }
    if let Some(value) = &args.alerts_jsonl {
        output.alerts_jsonl = Some(value.clone());
    }
    if args.quiet {
        output.quiet = true;
    }

    Ok(RuntimeConfig {
        input: args.input.clone(),
        config: Config {
            parser,
            analysis,
            output,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alerts_jsonl_flag_overrides_config() {
        let args = cli::Cli::try_parse_from(["dumpscope", "capture.txt", "--alerts-jsonl", "alerts.jsonl"]).unwrap();
        let runtime = load_config(&args).unwrap();
        assert_eq!(runtime.config.output.alerts_jsonl, Some(PathBuf::from("alerts.jsonl")));
        assert_eq!(runtime.input, PathBuf::from("capture.txt"));
    }

    #[test]
    fn empty_alerts_jsonl_is_rejected_by_the_parser() {
        let parsed = cli::Cli::try_parse_from(["dumpscope", "capture.txt", "--alerts-jsonl", ""]);
        assert!(parsed.is_err());
    }
}
