use procura_core::domain::rfq::RfqId;
use procura_core::matching::MatchOptions;

use crate::commands::{
    application_failure, matching_service, to_data, with_database, CommandResult, Failure,
};

#[derive(Debug, Clone)]
pub struct MatchArgs {
    pub rfq_id: String,
    pub limit: Option<usize>,
    pub basic: bool,
}

pub fn run(args: MatchArgs) -> CommandResult {
    if args.rfq_id.trim().is_empty() {
        return CommandResult::failure("match", "validation", "--rfq must not be empty", 6);
    }
    if args.limit == Some(0) {
        return CommandResult::failure("match", "validation", "--limit must be at least 1", 6);
    }

    let result = with_database("match", |config, pool| async move {
        let service = matching_service(&config, pool)?;
        let options = MatchOptions {
            limit: args.limit.unwrap_or(config.matching.default_limit),
            use_advanced: !args.basic && config.matching.use_advanced,
        };
        let rfq_id = RfqId::new(args.rfq_id.trim());
        let recommendations = service
            .find_matching_suppliers(&rfq_id, options)
            .await
            .map_err(application_failure)?;
        let data = to_data(&recommendations)?;
        Ok::<_, Failure>((rfq_id, recommendations.len(), options, data))
    });

    match result {
        Ok((rfq_id, count, options, data)) => CommandResult::success_with_data(
            "match",
            format!(
                "stored {count} recommendations for rfq `{rfq_id}` ({} mode)",
                if options.use_advanced { "advanced" } else { "basic" }
            ),
            Some(data),
        ),
        Err(failure) => failure,
    }
}
