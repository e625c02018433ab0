use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use thali_core::models::{DailyTotals, FoodLogEntry};
use thali_core::service::ThaliService;

use super::helpers::{exit_not_found, parse_date, print_log_table};

#[derive(Serialize)]
struct DayView {
    entries: Vec<FoodLogEntry>,
    totals: DailyTotals,
}

pub(crate) fn cmd_show(
    service: &ThaliService,
    user_id: &str,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let entries = service.logs_for_date(user_id, date)?;
    let totals = service.daily_totals(user_id, date)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&DayView { entries, totals })?
        );
        return Ok(());
    }

    if entries.is_empty() {
        exit_not_found(&format!("No entries for {date}"), false);
    }

    println!("=== {date} ===\n");
    print_log_table(&entries);
    println!(
        "\n  TOTAL: {} kcal | P:{}g C:{}g F:{}g ({} entries)",
        totals.calories, totals.protein, totals.carbs, totals.fats, totals.entries
    );
    Ok(())
}

pub(crate) fn cmd_weekly(service: &ThaliService, user_id: &str, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct WeekRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Calories")]
        calories: i64,
    }

    let days = service.weekly_calories(user_id, Local::now().date_naive())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&days)?);
        return Ok(());
    }

    if days.iter().all(|d| d.calories == 0) {
        exit_not_found("No entries in the last 7 days", false);
    }

    let rows: Vec<WeekRow> = days
        .into_iter()
        .map(|d| WeekRow {
            date: d.date,
            calories: d.calories,
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
