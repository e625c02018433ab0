use anyhow::{Result, bail};

use thali_core::error::FoodError;
use thali_core::models::{AddFood, FoodLogEntry, UpdateFoodLog};
use thali_core::providers::ProviderChain;
use thali_core::service::ThaliService;

use super::helpers::{exit_not_found, format_quantity, parse_date};

fn print_entry(verb: &str, entry: &FoodLogEntry) {
    let portion = format_quantity(entry.quantity, &entry.unit);
    println!(
        "{verb} [{}] {} {portion} ({:.0}g) for {} on {}: {} kcal | P:{}g C:{}g F:{}g",
        entry.id,
        entry.food_name,
        entry.grams,
        entry.meal_type,
        entry.date,
        entry.calories,
        entry.protein,
        entry.carbs,
        entry.fats,
    );
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_log(
    service: &ThaliService,
    chain: &ProviderChain,
    user_id: &str,
    food: &str,
    quantity: f64,
    unit: &str,
    meal: &str,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let req = AddFood {
        food_name: food.to_string(),
        quantity,
        unit: unit.to_string(),
        meal_type: meal.to_string(),
        date: Some(date.format("%Y-%m-%d").to_string()),
    };

    let entry = match service.add_food(Some(chain), user_id, &req) {
        Ok(entry) => entry,
        Err(FoodError::NotInCatalog(name)) => exit_not_found(
            &format!("No nutrition data found for '{name}'. Try `thali suggest {name}`"),
            json,
        ),
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print_entry("Logged", &entry);
    }
    Ok(())
}

pub(crate) fn cmd_update(
    service: &ThaliService,
    user_id: &str,
    entry_id: i64,
    update: &UpdateFoodLog,
    json: bool,
) -> Result<()> {
    if update.quantity.is_none() && update.unit.is_none() && update.meal_type.is_none() {
        bail!("Nothing to update. Provide at least one of --quantity, --unit, or --meal");
    }

    match service.update_log(user_id, entry_id, update)? {
        Some(entry) if json => println!("{}", serde_json::to_string_pretty(&entry)?),
        Some(entry) => print_entry("Updated", &entry),
        None => exit_not_found(&format!("Entry {entry_id} not found"), json),
    }
    Ok(())
}

pub(crate) fn cmd_delete(
    service: &ThaliService,
    user_id: &str,
    entry_id: i64,
    json: bool,
) -> Result<()> {
    if !service.delete_log(user_id, entry_id)? {
        exit_not_found(&format!("Entry {entry_id} not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": entry_id }));
    } else {
        println!("Deleted entry {entry_id}");
    }
    Ok(())
}
