use procura_core::domain::history::MatchFeedback;
use procura_core::domain::rfq::RfqId;
use procura_core::domain::supplier::SupplierId;

use crate::commands::{
    application_failure, matching_service, to_data, with_database, CommandResult, Failure,
};

#[derive(Debug, Clone)]
pub struct FeedbackArgs {
    pub rfq_id: String,
    pub supplier_id: String,
    pub success: bool,
    pub buyer_rating: Option<u8>,
    pub supplier_rating: Option<u8>,
    pub notes: Option<String>,
}

pub fn run(args: FeedbackArgs) -> CommandResult {
    let feedback = MatchFeedback {
        rfq_id: RfqId::new(args.rfq_id.trim()),
        supplier_id: SupplierId::new(args.supplier_id.trim()),
        success: args.success,
        buyer_feedback: args.buyer_rating,
        supplier_feedback: args.supplier_rating,
        notes: args.notes,
    };

    let result = with_database("feedback", |config, pool| async move {
        let service = matching_service(&config, pool)?;
        let record = service.record_match_feedback(feedback).await.map_err(application_failure)?;
        let data = to_data(&record)?;
        Ok::<_, Failure>((record, data))
    });

    match result {
        Ok((record, data)) => CommandResult::success_with_data(
            "feedback",
            format!(
                "recorded {} outcome for rfq `{}` and supplier `{}`",
                if record.success { "successful" } else { "failed" },
                record.rfq_id,
                record.supplier_id
            ),
            Some(data),
        ),
        Err(failure) => failure,
    }
}
