use crate::error::Result;
use crate::types::{ScheduleResult, UnscheduledReason};
use crate::validator::ValidationReport;
use colored::Colorize;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Output formats the CLI can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Text,
}

/// Write the schedule in the requested formats into `output_dir`
pub fn generate_reports(
    result: &ScheduleResult,
    output_dir: &Path,
    formats: &[OutputFormat],
) -> Result<()> {
    fs::create_dir_all(output_dir)?;

    if formats.contains(&OutputFormat::Json) {
        let json = serde_json::to_string_pretty(result)?;
        fs::write(output_dir.join("schedule.json"), json)?;
    }
    if formats.contains(&OutputFormat::Text) {
        fs::write(output_dir.join("summary.txt"), text_summary(result))?;
    }
    Ok(())
}

/// One-line JSON summary for quiet mode
pub fn generate_json_summary(result: &ScheduleResult) -> Result<String> {
    let summary = serde_json::json!({
        "assignments": result.assignments.len(),
        "unscheduled": result.unscheduled_streams.len(),
        "expected_hours": result.statistics.expected_hours,
        "scheduled_hours": result.statistics.scheduled_hours,
        "solver_time_seconds": result.statistics.solver_time_seconds,
    });
    Ok(summary.to_string())
}

/// Plain-text summary of the board
pub fn text_summary(result: &ScheduleResult) -> String {
    let stats = &result.statistics;
    let mut out = String::new();

    let _ = writeln!(out, "Schedule generated: {}", result.generation_date);
    let _ = writeln!(out, "Assignments: {}", result.assignments.len());
    let _ = writeln!(
        out,
        "Hours: {} scheduled of {} expected",
        stats.scheduled_hours, stats.expected_hours
    );
    let _ = writeln!(out, "Unscheduled streams: {}", result.unscheduled_streams.len());

    let _ = writeln!(out, "\nBy day:");
    for (day, count) in &stats.by_day {
        let _ = writeln!(out, "  {day}: {count}");
    }
    let _ = writeln!(out, "\nBy shift:");
    for (shift, count) in &stats.by_shift {
        let _ = writeln!(out, "  {shift}: {count}");
    }
    let _ = writeln!(out, "\nBy building:");
    for (address, count) in &stats.room_utilization {
        let _ = writeln!(out, "  {address}: {count}");
    }
    let _ = writeln!(out, "\nBy stage:");
    for (stage, count) in &stats.by_stage {
        let _ = writeln!(out, "  stage {stage}: {count}");
    }

    if !result.unscheduled_streams.is_empty() {
        let _ = writeln!(out, "\nUnscheduled:");
        for u in &result.unscheduled_streams {
            let _ = writeln!(
                out,
                "  {} ({}, {}): {} - {}",
                u.stream_id, u.subject, u.instructor, u.reason, u.details
            );
        }
    }
    out
}

/// Colored terminal summary after a run
pub fn print_summary(result: &ScheduleResult, validation: &ValidationReport) {
    let stats = &result.statistics;

    println!("\n{}", "Schedule Summary".bold().cyan());
    println!("{}", "─".repeat(40));
    println!("Assignments:        {}", result.assignments.len());
    println!(
        "Hours:              {} / {} expected",
        stats.scheduled_hours, stats.expected_hours
    );
    if let Some(seconds) = stats.solver_time_seconds {
        println!("Solve time:         {seconds:.2}s");
    }

    let unscheduled = result.unscheduled_streams.len();
    if unscheduled == 0 {
        println!("Unscheduled:        {}", "0".green());
    } else {
        println!("Unscheduled:        {}", unscheduled.to_string().yellow());
        for (reason, count) in unscheduled_by_reason(result) {
            println!("  {reason}: {count}");
        }
    }

    if validation.is_valid() {
        println!("Validation:         {}", "passed".green().bold());
    } else {
        println!("Validation:         {}", "violations found".red().bold());
        for v in &validation.violations {
            println!("  - {}: {}", v.constraint.red(), v.message);
        }
    }
}

/// Unscheduled counts grouped by reason, most frequent first
pub fn unscheduled_by_reason(result: &ScheduleResult) -> Vec<(UnscheduledReason, usize)> {
    let mut counts: BTreeMap<&'static str, (UnscheduledReason, usize)> = BTreeMap::new();
    for u in &result.unscheduled_streams {
        counts
            .entry(u.reason.as_str())
            .and_modify(|(_, c)| *c += 1)
            .or_insert((u.reason, 1));
    }
    counts
        .into_values()
        .sorted_by_key(|(_, count)| std::cmp::Reverse(*count))
        .collect()
}
