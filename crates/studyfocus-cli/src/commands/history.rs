use chrono::{Duration, Utc};
use studyfocus_core::Database;

pub fn run(limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let entries = db.history(limit)?;
    let minutes_last_24h = db.minutes_since(Utc::now() - Duration::hours(24))?;
    let json = serde_json::json!({
        "entries": entries,
        "minutes_last_24h": minutes_last_24h,
    });
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
