use procura_core::domain::rfq::RfqId;
use procura_core::matching::DEFAULT_RECOMMENDATION_LIMIT;

use crate::commands::{
    application_failure, matching_service, to_data, with_database, CommandResult, Failure,
};

pub fn run(rfq_id: String, limit: Option<usize>) -> CommandResult {
    if rfq_id.trim().is_empty() {
        return CommandResult::failure("recommendations", "validation", "--rfq must not be empty", 6);
    }
    let limit = limit.unwrap_or(DEFAULT_RECOMMENDATION_LIMIT);

    let result = with_database("recommendations", |config, pool| async move {
        let service = matching_service(&config, pool)?;
        let rfq_id = RfqId::new(rfq_id.trim());
        let rows = service
            .get_recommendations_with_suppliers(&rfq_id, limit)
            .await
            .map_err(application_failure)?;
        let data = to_data(&rows)?;
        Ok::<_, Failure>((rfq_id, rows.len(), data))
    });

    match result {
        Ok((rfq_id, count, data)) => CommandResult::success_with_data(
            "recommendations",
            format!("{count} stored recommendations for rfq `{rfq_id}`"),
            Some(data),
        ),
        Err(failure) => failure,
    }
}
