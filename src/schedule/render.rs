use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde_json::Value;

use super::parser::{OutageInterval, intervals_for_day};
use super::region_time::{day_key, region_now};

const WEEKDAYS_UK: [&str; 7] = [
    "Понеділок",
    "Вівторок",
    "Середа",
    "Четвер",
    "П'ятниця",
    "Субота",
    "Неділя",
];

pub fn weekday_name(date: NaiveDate) -> &'static str {
    WEEKDAYS_UK[date.weekday().num_days_from_monday() as usize]
}

/// Caption used when no schedule text could be produced.
pub fn fallback_caption(group: Option<&str>) -> String {
    match group {
        Some(group) => format!("💡Оновлено графік для черги {group}"),
        None => "💡Оновлено графік".to_string(),
    }
}

fn push_intervals(text: &mut String, intervals: &[OutageInterval]) {
    for interval in intervals {
        text.push_str(&format!("🪫 {interval}\n"));
    }
}

/// Update message for today and, when it has data, tomorrow, in the
/// region's local calendar.
pub fn render_schedule_text(schedule: &Value, group: &str, now: DateTime<Utc>) -> String {
    let today = region_now(now).date();
    let today_intervals = intervals_for_day(schedule, group, day_key(today));

    let mut text = format!(
        "💡Оновлено графік відключень на сьогодні, {} ({}), для черги {group}:\n\n",
        today.format("%d.%m.%Y"),
        weekday_name(today)
    );
    if today_intervals.is_empty() {
        text.push_str("✅ Відключень не заплановано\n");
    } else {
        push_intervals(&mut text, &today_intervals);
    }

    if let Some(tomorrow) = today.succ_opt() {
        let tomorrow_intervals = intervals_for_day(schedule, group, day_key(tomorrow));
        if !tomorrow_intervals.is_empty() {
            text.push_str(&format!(
                "\n💡Оновлено графік відключень на завтра, {} ({}), для черги {group}:\n\n",
                tomorrow.format("%d.%m.%Y"),
                weekday_name(tomorrow)
            ));
            push_intervals(&mut text, &tomorrow_intervals);
        }
    }

    text
}
