use anyhow::Result;

use thali_core::error::FoodError;
use thali_core::providers::ProviderChain;
use thali_core::service::ThaliService;

use super::helpers::{exit_not_found, print_suggestion_table};

pub(crate) fn cmd_suggest(
    service: &ThaliService,
    query: &str,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let suggestions = service.suggest(query, limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&suggestions)?);
        return Ok(());
    }
    if suggestions.is_empty() {
        exit_not_found(&format!("No catalog matches for '{query}'"), false);
    }
    print_suggestion_table(&suggestions);
    Ok(())
}

pub(crate) fn cmd_resolve(
    service: &ThaliService,
    chain: &ProviderChain,
    food: &str,
    json: bool,
) -> Result<()> {
    let master = match service.resolve_food(Some(chain), food) {
        Ok(master) => master,
        Err(FoodError::NotInCatalog(name)) => {
            exit_not_found(&format!("No nutrition data found for '{name}'"), json)
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&master)?);
        return Ok(());
    }

    let m = &master.macros;
    let p = master.profile();
    println!("{} (source: {})", master.name, master.source);
    println!(
        "  per 100g: {:.0} kcal | P:{:.1}g C:{:.1}g F:{:.1}g",
        m.calories, m.protein, m.carbs, m.fats
    );
    println!(
        "  grams per unit: cup {:.0} | bowl {:.0} | piece {:.0} | glass {:.0} | katori {:.0}",
        p.grams_per_cup, p.grams_per_bowl, p.grams_per_piece, p.grams_per_glass, p.grams_per_katori
    );
    Ok(())
}
