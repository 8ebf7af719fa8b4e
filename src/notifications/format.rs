//! Ukrainian duration formatting and notification phrasing.

use rand::seq::IndexedRandom;
use rand::Rng;

const MILLISECONDS_PER_SECOND: i64 = 1000;
const SECONDS_PER_MINUTE: i64 = 60;
const MINUTES_PER_HOUR: i64 = 60;
const HOURS_PER_DAY: i64 = 24;

pub const PHRASES_POWER_APPEARED_BASE: &[&str] = &[
    "Повернулось після",
    "Очікували",
    "Світла не було",
    "Дочекались за",
    "Без світла:",
    "Час без електроенергії:",
    "Відключення тривало",
    "Період знеструмлення:",
];

pub const PHRASES_POWER_APPEARED_VARIATIONS: &[&str] = &[
    "Без світла були",
    "Нарешті зʼявилось після",
    "Світло взяло паузу на",
    "Зробило перерву на",
];

pub const PHRASES_POWER_GONE_BASE: &[&str] = &[
    "Світло трималось",
    "Світло було",
    "Протрималось",
    "Пішло на паузу після",
    "Зі світлом було",
    "Період зі світлом:",
    "Електроенергія була",
];

pub const PHRASES_POWER_GONE_VARIATIONS: &[&str] = &[
    "Було, але недовго —",
    "Тайм-аут після",
    "Світло сказало \"па-па\" через",
    "Протрималось, скільки змогло —",
    "Пішло на перерву через",
    "Знову пішло після",
    "Вистачило рівно на",
    "Побуло з нами",
    "Подача тривала",
    "Інтервал зі світлом:",
];

/// Picks from `base` 70% of the time and from `variations` otherwise.
pub fn random_phrase(base: &[&'static str], variations: &[&'static str]) -> &'static str {
    let mut rng = rand::rng();
    let pool = if rng.random_bool(0.7) { base } else { variations };
    pool.choose(&mut rng).copied().unwrap_or_default()
}

fn plural<'a>(n: i64, one: &'a str, few: &'a str, many: &'a str) -> &'a str {
    if n % 10 == 1 && n % 100 != 11 {
        one
    } else if (2..=4).contains(&(n % 10)) && !(12..=14).contains(&(n % 100)) {
        few
    } else {
        many
    }
}

/// Long form, e.g. `2 години 5 хвилин`, `1 день`.
pub fn format_duration(milliseconds: i64) -> String {
    let seconds = milliseconds.max(0) / MILLISECONDS_PER_SECOND;
    let minutes = seconds / SECONDS_PER_MINUTE;
    let hours = minutes / MINUTES_PER_HOUR;
    let days = hours / HOURS_PER_DAY;

    if days > 0 {
        let remaining_hours = hours % HOURS_PER_DAY;
        let day_part = format!("{days} {}", plural(days, "день", "дні", "днів"));
        if remaining_hours > 0 {
            return format!(
                "{day_part} {remaining_hours} {}",
                plural(remaining_hours, "година", "години", "годин")
            );
        }
        return day_part;
    }

    if hours > 0 {
        let remaining_minutes = minutes % MINUTES_PER_HOUR;
        let hour_part = format!("{hours} {}", plural(hours, "година", "години", "годин"));
        if remaining_minutes > 0 {
            return format!(
                "{hour_part} {remaining_minutes} {}",
                plural(remaining_minutes, "хвилина", "хвилини", "хвилин")
            );
        }
        return hour_part;
    }

    if minutes > 0 {
        return format!("{minutes} {}", plural(minutes, "хвилина", "хвилини", "хвилин"));
    }

    format!("{seconds} секунд")
}

/// Short form, e.g. `3год 15хв`, `45с`.
pub fn format_duration_short(milliseconds: i64) -> String {
    let seconds = milliseconds.max(0) / MILLISECONDS_PER_SECOND;
    let minutes = seconds / SECONDS_PER_MINUTE;
    let hours = minutes / MINUTES_PER_HOUR;
    let remaining_minutes = minutes % MINUTES_PER_HOUR;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours}год"));
    }
    if remaining_minutes > 0 {
        parts.push(format!("{remaining_minutes}хв"));
    }
    if parts.is_empty() {
        parts.push(format!("{seconds}с"));
    }
    parts.join(" ")
}
