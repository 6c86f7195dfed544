use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::models::location::{LocationAvailability, SiteAvailability};

const TIME_FORMAT: &str = "%H:%M:%S";

pub fn london_drugs_lines(slots: &[DateTime<Utc>], tz: Tz) -> Vec<String> {
    let mut lines = vec!["London Drugs".to_string()];
    if slots.is_empty() {
        lines.push("No openings at London Drugs".to_string());
    }
    lines.extend(slots.iter().map(|slot| local_time(slot, tz)));
    lines
}

/// Lines for one Costco location, printed as soon as that location is done.
pub fn costco_lines(result: &LocationAvailability, tz: Tz) -> Vec<String> {
    let mut lines = vec![format!(
        "Costco {} ({})",
        result.location.name, result.location.address
    )];
    match result.next_available_date {
        Some(next) => lines.push(format!("Earliest available time is {next}")),
        None => lines.push("No earliest available time given".to_string()),
    }
    lines.extend(
        result
            .bookable_days
            .iter()
            .map(|day| day.format("%a %Y-%m-%d").to_string()),
    );

    if result.beyond_horizon {
        lines.push("No bookings in the next month".to_string());
        return lines;
    }
    if !result.skipped_days.is_empty() {
        lines.push(format!("Skipping {} later dates", result.skipped_days.len()));
    }
    for day in &result.checked_days {
        lines.push(format!(
            "Available appointments for {}",
            day.date.format("%b %d, %Y")
        ));
        lines.extend(day.slots.iter().map(|slot| local_time(slot, tz)));
    }
    lines
}

pub const SAFEWAY_HEADER: &str = "Safeway";
pub const NO_SAFEWAY_SITES: &str = "There are no locations with upcoming availabilities";

/// Lines for one Safeway site. Slot times are shown in the display zone.
pub fn safeway_lines(site: &SiteAvailability, tz: Tz) -> Vec<String> {
    let mut lines = vec![site.location.name.clone()];
    if site.days.is_empty() {
        lines.push("No openings in the next month".to_string());
    }
    for day in &site.days {
        lines.push(format!("{}, {}", site.location.name, day.date.format("%Y-%m-%d")));
        if let Some(times) = &day.times {
            lines.extend(times.iter().map(|t| local_time(t, tz)));
        }
    }
    lines
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

fn local_time(slot: &DateTime<Utc>, tz: Tz) -> String {
    slot.with_timezone(&tz).format(TIME_FORMAT).to_string()
}
