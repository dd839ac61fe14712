use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use clap::ValueEnum;
use serde::Serialize;

use crate::model::Tracker;

/// Time-based column a tracker is shown in, chosen by its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "snake_case")]
pub enum Column {
    Today,
    Month,
    Year,
    Custom,
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Today => write!(f, "today"),
            Self::Month => write!(f, "month"),
            Self::Year => write!(f, "year"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl Column {
    pub const ALL: [Column; 4] = [Column::Today, Column::Month, Column::Year, Column::Custom];
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .map(|d| d.and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

/// Overdue or due today lands in `Today`; the rest of this month in `Month`;
/// the rest of this year in `Year`; anything later or undated in `Custom`.
pub fn classify(tracker: &Tracker, now: DateTime<Utc>) -> Column {
    let Some(deadline) = tracker.deadline else {
        return Column::Custom;
    };
    let today = now.date_naive();
    let end_of_today = start_of(today) + Duration::days(1);
    let end_of_month = next_month(today)
        .map(start_of)
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    let end_of_year = NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
        .map(start_of)
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    if deadline < end_of_today {
        Column::Today
    } else if deadline < end_of_month {
        Column::Month
    } else if deadline < end_of_year {
        Column::Year
    } else {
        Column::Custom
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardColumn {
    pub column: Column,
    pub trackers: Vec<Tracker>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoardStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub overdue: usize,
    pub average_progress: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct Board {
    pub columns: Vec<BoardColumn>,
    pub stats: BoardStats,
}

/// Lay trackers out in columns, optionally keeping only one group label.
/// Within a column trackers are ordered by deadline, undated last.
pub fn build_board(trackers: &[Tracker], group: Option<&str>, now: DateTime<Utc>) -> Board {
    let selected: Vec<&Tracker> = trackers
        .iter()
        .filter(|t| group.is_none_or(|g| t.group.iter().any(|label| label == g)))
        .collect();

    let columns = Column::ALL
        .iter()
        .map(|&column| {
            let mut in_column: Vec<Tracker> = selected
                .iter()
                .filter(|t| classify(t, now) == column)
                .map(|t| (*t).clone())
                .collect();
            in_column.sort_by_key(|t| (t.deadline.is_none(), t.deadline, t.created_at));
            BoardColumn {
                column,
                trackers: in_column,
            }
        })
        .collect();

    Board {
        columns,
        stats: stats(&selected, now),
    }
}

fn stats(trackers: &[&Tracker], now: DateTime<Utc>) -> BoardStats {
    if trackers.is_empty() {
        return BoardStats::default();
    }
    let total = trackers.len();
    let progress_sum: usize = trackers.iter().map(|t| t.progress as usize).sum();
    BoardStats {
        total,
        completed: trackers.iter().filter(|t| t.completed).count(),
        in_progress: trackers.iter().filter(|t| t.in_progress).count(),
        overdue: trackers
            .iter()
            .filter(|t| !t.completed && t.deadline.is_some_and(|d| d < now))
            .count(),
        average_progress: ((2 * progress_sum + total) / (2 * total)) as u8,
    }
}
