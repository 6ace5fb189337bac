use procura_db::{MarketplaceSeedDataset, SeedResult};
use serde_json::json;

use crate::commands::{with_database, CommandResult, Failure};

pub fn run() -> CommandResult {
    let result = with_database("seed", |_, pool| async move {
        let seed_result = MarketplaceSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = MarketplaceSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        if !verification.all_present {
            return Err(("seed_verification", verification_message(&verification.checks), 6u8));
        }
        Ok::<_, Failure>(seed_result)
    });

    match result {
        Ok(seeded) => CommandResult::success_with_data(
            "seed",
            summary(&seeded),
            Some(json!({
                "open_rfq_id": seeded.open_rfq_id,
                "rfqs": seeded.rfqs_seeded,
                "suppliers": seeded.suppliers_seeded,
                "historical_matches": seeded.historical_matches_seeded,
            })),
        ),
        Err(failure) => failure,
    }
}

fn summary(seeded: &SeedResult) -> String {
    format!(
        "marketplace seed loaded: {} rfqs, {} suppliers, {} historical matches (open rfq: {})",
        seeded.rfqs_seeded,
        seeded.suppliers_seeded,
        seeded.historical_matches_seeded,
        seeded.open_rfq_id
    )
}

fn verification_message(checks: &[(&str, bool)]) -> String {
    let failed_checks =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
