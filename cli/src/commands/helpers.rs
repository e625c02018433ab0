use anyhow::Result;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use thali_core::models::{FoodLogEntry, Suggestion};

/// Accepts `today`, `yesterday`, `tomorrow` or `YYYY-MM-DD`; today when absent.
pub(crate) fn parse_date(date_str: Option<&str>) -> Result<NaiveDate> {
    let today = Local::now().date_naive();
    match date_str.map(str::trim) {
        None | Some("today") => Ok(today),
        Some("yesterday") => Ok(today - chrono::Duration::days(1)),
        Some("tomorrow") => Ok(today + chrono::Duration::days(1)),
        Some(s) => Ok(thali_core::service::parse_date(s)?),
    }
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Report a not-found outcome and exit with status 2.
pub(crate) fn exit_not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// `2`, `1.5`: whole quantities print without decimals.
pub(crate) fn format_quantity(qty: f64, unit: &str) -> String {
    let qty = if qty.fract() == 0.0 {
        format!("{qty:.0}")
    } else {
        format!("{qty}")
    };
    if unit == "g" {
        format!("{qty}g")
    } else {
        format!("{qty} {unit}")
    }
}

pub(crate) fn print_log_table(entries: &[FoodLogEntry]) {
    #[derive(Tabled)]
    struct LogRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Meal")]
        meal: String,
        #[tabled(rename = "Food")]
        food: String,
        #[tabled(rename = "Portion")]
        portion: String,
        #[tabled(rename = "Grams")]
        grams: String,
        #[tabled(rename = "Cal")]
        calories: i64,
        #[tabled(rename = "P")]
        protein: i64,
        #[tabled(rename = "C")]
        carbs: i64,
        #[tabled(rename = "F")]
        fats: i64,
    }

    let rows: Vec<LogRow> = entries
        .iter()
        .map(|e| LogRow {
            id: e.id,
            meal: e.meal_type.clone(),
            food: truncate(&e.food_name, 35),
            portion: format_quantity(e.quantity, &e.unit),
            grams: format!("{:.0}", e.grams),
            calories: e.calories,
            protein: e.protein,
            carbs: e.carbs,
            fats: e.fats,
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_suggestion_table(suggestions: &[Suggestion]) {
    #[derive(Tabled)]
    struct SuggestionRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Cal/100g")]
        calories: String,
        #[tabled(rename = "P/100g")]
        protein: String,
        #[tabled(rename = "C/100g")]
        carbs: String,
        #[tabled(rename = "F/100g")]
        fats: String,
    }

    let rows: Vec<SuggestionRow> = suggestions
        .iter()
        .enumerate()
        .map(|(i, s)| SuggestionRow {
            idx: i + 1,
            name: truncate(&s.name, 40),
            calories: format!("{:.0}", s.calories),
            protein: format!("{:.1}", s.protein),
            carbs: format!("{:.1}", s.carbs),
            fats: format!("{:.1}", s.fats),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}
