//! Due-date and age labels shown next to follow-ups and instalments.

use chrono::{DateTime, NaiveDate, Utc};

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

pub fn due_label(due: NaiveDate, today: NaiveDate) -> String {
    let days = (due - today).num_days();
    match days {
        0 => "Due today".to_string(),
        1 => "Due tomorrow".to_string(),
        d if d > 1 => format!("Due in {} days", d),
        d => format!("Overdue by {}", plural(-d, "day")),
    }
}

pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - then;
    let seconds = elapsed.num_seconds();

    if seconds < 60 {
        return "just now".to_string();
    }
    if elapsed.num_minutes() < 60 {
        return format!("{} ago", plural(elapsed.num_minutes(), "minute"));
    }
    if elapsed.num_hours() < 24 {
        return format!("{} ago", plural(elapsed.num_hours(), "hour"));
    }
    format!("{} ago", plural(elapsed.num_days(), "day"))
}
