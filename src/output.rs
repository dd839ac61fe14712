use clap::ValueEnum;
use colored::Colorize;

use crate::board::Board;
use crate::error::Result;
use crate::model::Tracker;
use crate::sync::coordinator::SyncStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
    Minimal,
}

fn progress_bar(progress: u8) -> String {
    let filled = (progress.min(100) as usize + 5) / 10;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(10 - filled))
}

fn marker(tracker: &Tracker) -> String {
    if tracker.completed {
        "done".green().to_string()
    } else if tracker.in_progress {
        "active".yellow().to_string()
    } else {
        "open".normal().to_string()
    }
}

/// First eight characters of an id; ids from the cloud need not be ASCII.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((cut, _)) => &id[..cut],
        None => id,
    }
}

pub fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() > max_len {
        let truncated: String = title.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    } else {
        title.to_string()
    }
}

fn minimal_line(tracker: &Tracker) -> String {
    let deadline = tracker
        .deadline
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".into());
    format!(
        "{:8} {:20} {:>4}% {:10} {}",
        short_id(&tracker.id),
        truncate_title(&tracker.title, 20),
        tracker.progress,
        deadline,
        tracker.group.join(",")
    )
}

pub fn print_tracker(tracker: &Tracker, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(tracker)?),
        Format::Pretty => {
            println!(
                "[{}] {} ({})",
                short_id(&tracker.id),
                tracker.title.bold(),
                marker(tracker)
            );
            if !tracker.description.is_empty() {
                println!("  {}", tracker.description);
            }
            println!(
                "  progress: {} {}% | estimate: {}",
                progress_bar(tracker.progress),
                tracker.progress,
                tracker.time_estimate
            );
            if let Some(deadline) = tracker.deadline {
                println!("  deadline: {}", deadline.format("%Y-%m-%d %H:%M"));
            }
            if !tracker.group.is_empty() {
                println!("  group: {}", tracker.group.join(" / "));
            }
            if !tracker.subtasks.is_empty() {
                println!(
                    "  subtasks: {}/{}",
                    tracker.completed_subtasks(),
                    tracker.subtasks.len()
                );
            }
            for (i, subtask) in tracker.subtasks.iter().enumerate() {
                let check = if subtask.completed { "x" } else { " " };
                let active = if subtask.in_progress { " *" } else { "" };
                println!("  {:>2}. [{}] {}{}", i + 1, check, subtask.text, active);
            }
        }
        Format::Minimal => println!("{}", minimal_line(tracker)),
    }
    Ok(())
}

pub fn print_trackers(trackers: &[Tracker], format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(trackers)?),
        Format::Pretty => {
            for tracker in trackers {
                print_tracker(tracker, Format::Pretty)?;
                println!();
            }
        }
        Format::Minimal => {
            println!(
                "{:8} {:20} {:>5} {:10} GROUP",
                "ID", "TITLE", "DONE", "DEADLINE"
            );
            println!("{}", "-".repeat(56));
            for tracker in trackers {
                println!("{}", minimal_line(tracker));
            }
        }
    }
    Ok(())
}

pub fn print_board(board: &Board, format: Format) -> Result<()> {
    if format == Format::Json {
        println!("{}", serde_json::to_string(board)?);
        return Ok(());
    }
    for column in &board.columns {
        println!(
            "{} ({})",
            column.column.to_string().to_uppercase().bold(),
            column.trackers.len()
        );
        for tracker in &column.trackers {
            match format {
                Format::Pretty => println!(
                    "  {} {} {}",
                    progress_bar(tracker.progress),
                    tracker.title,
                    marker(tracker)
                ),
                _ => println!("  {}", minimal_line(tracker)),
            }
        }
    }
    let stats = &board.stats;
    println!(
        "{} total, {} done, {} active, {} overdue, {}% average",
        stats.total, stats.completed, stats.in_progress, stats.overdue, stats.average_progress
    );
    Ok(())
}

pub fn print_status(status: &SyncStatus, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(status)?),
        _ => {
            println!("state: {}", status.state);
            println!(
                "signed in: {}",
                status.owner_id.as_deref().unwrap_or("no")
            );
            println!("remote: {}", if status.remote_configured { "configured" } else { "none" });
            if let Some(at) = status.synced_at {
                println!("synced at: {}", at.format("%Y-%m-%d %H:%M:%S"));
            }
            println!("trackers: {}", status.trackers);
            if let Some(ref error) = status.error {
                println!("{} {}", "sync error:".red(), error);
            }
        }
    }
    Ok(())
}
