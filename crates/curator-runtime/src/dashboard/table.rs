use std::fmt::Write;

use chrono::{DateTime, Utc};

use super::{QueueRow, ScheduleRow};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn time(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Left-aligned plain text table with a dashed header rule.
fn render(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let line = |out: &mut String, cells: Vec<String>| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect();
        let _ = writeln!(out, "{}", padded.join("  ").trim_end());
    };

    line(&mut out, headers.iter().map(|h| h.to_string()).collect());
    line(&mut out, widths.iter().map(|w| "-".repeat(*w)).collect());
    for row in rows {
        line(&mut out, row);
    }
    out
}

/// Render schedules as `job | queue | schedule | last run | next run | running | runs`.
pub fn render_schedule_table(rows: &[ScheduleRow]) -> String {
    render(
        &["JOB", "QUEUE", "SCHEDULE", "LAST RUN", "NEXT RUN", "RUNNING", "RUNS"],
        rows.iter()
            .map(|r| {
                vec![
                    r.job.clone(),
                    r.queue.clone(),
                    r.schedule.clone(),
                    time(r.last_run),
                    time(r.next_run),
                    if r.is_running { "yes" } else { "no" }.to_string(),
                    r.runs.to_string(),
                ]
            })
            .collect(),
    )
}

/// Render queued and executing jobs.
pub fn render_queue_table(rows: &[QueueRow]) -> String {
    render(
        &["JOB", "QUEUE", "STATE", "ADDED", "STARTED", "ID"],
        rows.iter()
            .map(|r| {
                vec![
                    r.job.clone(),
                    r.queue.clone(),
                    r.state.clone(),
                    time(Some(r.added)),
                    time(r.started),
                    r.id.to_string(),
                ]
            })
            .collect(),
    )
}
