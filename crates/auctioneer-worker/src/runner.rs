//! Rule runner.
//!
//! One run reads the keyword bids a rule targets, recalculates them, writes
//! them back and summarizes the acknowledgements into a [`RunOutcome`].

use auctioneer_gateway::{DirectGateway, GatewayConfig, OAuthGateway};
use std::path::Path;

use auctioneer_models::{BidRule, BidRuleRecord, ModelError, RunOutcome, TaskId};
use tracing::{debug, Instrument};

use crate::calculator::BidCalculator;
use crate::config::TokenSource;
use crate::error::{WorkerError, WorkerResult};
use crate::keyword_bids::calculate_keyword_bids;
use crate::logging::RunLogger;

/// Run a rule with the default calculator.
pub async fn run_rule(
    gateway: &DirectGateway,
    rule: &BidRule,
    task_id: TaskId,
) -> WorkerResult<RunOutcome> {
    run_rule_with(gateway, &BidCalculator::default(), rule, task_id).await
}

/// Run a rule with a custom calculator.
///
/// Fails with [`WorkerError::NoResponse`] when the write produced no
/// acknowledgements.
pub async fn run_rule_with(
    gateway: &DirectGateway,
    calculator: &BidCalculator,
    rule: &BidRule,
    task_id: TaskId,
) -> WorkerResult<RunOutcome> {
    let logger = RunLogger::new(rule.id(), &task_id);
    let span = logger.create_span();

    async {
        logger.log_start(&format!(
            "{} {} target(s), formulas {:?}",
            rule.target_ids().len(),
            rule.target_type().as_str(),
            calculator.formula_names()
        ));

        let calculated = match calculate_keyword_bids(gateway, calculator, rule).await {
            Ok(calculated) => calculated,
            Err(e) => {
                logger.log_error(&e.to_string());
                return Err(e);
            }
        };
        logger.log_progress(&format!(
            "{} bid(s) recalculated, {} update(s) written, {} acknowledged",
            calculated.read,
            calculated.updates.len(),
            calculated.acks.len()
        ));

        if calculated.acks.is_empty() {
            let err = WorkerError::no_response(format!("rule {} produced no acknowledgements", rule.id()));
            logger.log_error(&err.to_string());
            return Err(err);
        }

        let outcome = RunOutcome::from_acknowledgements(
            task_id.clone(),
            rule.id(),
            calculated.updates.len(),
            &calculated.acks,
        )?;
        logger.log_outcome(&outcome);
        Ok(outcome)
    }
    .instrument(span)
    .await
}

/// Load a stored rule from a JSON file.
pub async fn load_rule(path: &Path) -> WorkerResult<BidRule> {
    let raw = tokio::fs::read_to_string(path).await?;
    let record: BidRuleRecord = serde_json::from_str(&raw).map_err(ModelError::from)?;
    let rule = record.into_rule()?;
    debug!(rule_id = rule.id(), path = %path.display(), "Loaded rule");
    Ok(rule)
}

/// Resolve the API token, exchanging an authorization code if needed.
pub async fn obtain_token(source: TokenSource, config: &GatewayConfig) -> WorkerResult<String> {
    match source {
        TokenSource::Token(token) => Ok(token),
        TokenSource::AuthorizationCode {
            client_id,
            client_secret,
            code,
        } => {
            let oauth = OAuthGateway::new(config, client_id, client_secret)?;
            Ok(oauth.exchange_authorization_code(&code).await?)
        }
    }
}
