use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use course_scheduler::parser::{load_input_from_dir, load_json_file, validate_input};
use course_scheduler::reporter::{
    generate_json_summary, generate_reports, print_summary, OutputFormat,
};
use course_scheduler::scheduler::{pipeline_progress_bar, schedule_with_progress};
use course_scheduler::types::ScheduleResult;
use course_scheduler::validator::validate_schedule;
use indicatif::ProgressBar;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "course-scheduler")]
#[command(about = "Staged greedy university course timetable generator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a schedule from an input directory
    Schedule {
        /// Directory containing streams.json, rooms.csv and configuration
        #[arg(short, long)]
        data: PathBuf,

        /// Output directory for schedule files
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Output format(s): json, text, or all
        #[arg(short, long, default_value = "all")]
        format: String,

        /// Suppress progress output, print JSON summary only
        #[arg(short, long)]
        quiet: bool,
    },

    /// Validate an existing schedule against the hard constraints
    Validate {
        /// Path to schedule.json
        #[arg(short, long)]
        schedule: PathBuf,

        /// Directory containing the input data the schedule was built from
        #[arg(short, long)]
        data: PathBuf,

        /// Show per-reason unscheduled breakdown
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Schedule {
            data,
            output,
            format,
            quiet,
        } => run_schedule(&data, &output, &format, quiet),
        Commands::Validate {
            schedule,
            data,
            verbose,
        } => run_validate(&schedule, &data, verbose),
    }
}

fn run_schedule(data: &PathBuf, output: &PathBuf, format: &str, quiet: bool) -> Result<()> {
    let input = load_input_from_dir(data).context("Failed to load input data")?;

    let validation = validate_input(&input)?;
    if !quiet {
        for warning in &validation.warnings {
            println!("{} {}", "Warning:".yellow(), warning);
        }
        println!(
            "Loaded {} streams, {} rooms",
            input.streams.len(),
            input.config.rooms.len()
        );
    }

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        pipeline_progress_bar()
    };
    let result = schedule_with_progress(&input.streams, &input.config, &progress)?;
    progress.finish_with_message("Schedule generated");

    let report = validate_schedule(&result, &input.streams, &input.config);

    generate_reports(&result, output, &parse_formats(format))?;

    if quiet {
        println!("{}", generate_json_summary(&result)?);
    } else {
        print_summary(&result, &report);
        println!(
            "Reports written to: {}",
            output.display().to_string().green()
        );
    }

    Ok(())
}

fn run_validate(schedule_path: &PathBuf, data: &PathBuf, verbose: bool) -> Result<()> {
    let input = load_input_from_dir(data).context("Failed to load input data")?;
    let result: ScheduleResult =
        load_json_file(schedule_path).context("Failed to load schedule")?;

    let report = validate_schedule(&result, &input.streams, &input.config);

    if report.is_valid() {
        println!("{}", "✓ Schedule is valid".green().bold());
    } else {
        println!("{}", "✗ Schedule has violations".red().bold());
        for v in &report.violations {
            println!("  - {}: {}", v.constraint.red(), v.message);
        }
    }

    if verbose {
        println!("\n{}", "Statistics:".bold());
        println!("  Assignments: {}", result.assignments.len());
        println!(
            "  Hours: {} / {} expected",
            result.statistics.scheduled_hours, result.statistics.expected_hours
        );
        println!("  Unscheduled: {}", result.unscheduled_streams.len());
        for (reason, count) in course_scheduler::reporter::unscheduled_by_reason(&result) {
            println!("    {reason}: {count}");
        }
    }

    if !report.is_valid() {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_formats(format: &str) -> Vec<OutputFormat> {
    if format == "all" {
        return vec![OutputFormat::Json, OutputFormat::Text];
    }
    format
        .split(',')
        .filter_map(|f| match f.trim().to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "text" | "txt" => Some(OutputFormat::Text),
            _ => None,
        })
        .collect()
}
