//! Optional remote plan optimizer.
//!
//! The optimizer is a plain request/response collaborator: it receives the
//! request JSON and may answer with a plan in the wire shape. Its answer is
//! never trusted. Anything that fails to arrive, parse or validate is
//! replaced by the generator's output, which is compliant by construction.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use super::wire::{parse_response, WirePlan};
use super::{generate, validate, Plan, StudyRequest};
use crate::error::{CoreError, Result};
use crate::rules::RuleSet;

/// Where a displayed plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    Generated,
    Optimizer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub plan: Plan,
    pub source: PlanSource,
    /// Why the optimizer's answer was not used, if one was asked for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

pub struct OptimizerClient {
    client: Client,
    endpoint: Url,
}

impl OptimizerClient {
    /// # Errors
    /// Returns `CoreError::Optimizer` for an unparseable endpoint or when the
    /// HTTP client cannot be built.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| CoreError::Optimizer(format!("bad optimizer url '{endpoint}': {e}")))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST the request and parse whatever comes back.
    ///
    /// `Ok(None)` means the optimizer answered but declined (`{"plan": null}`).
    ///
    /// # Errors
    /// Transport failures, non-success statuses and undecodable bodies.
    pub async fn request_plan(&self, request: &StudyRequest) -> Result<Option<WirePlan>> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CoreError::Optimizer(format!("optimizer returned {status}")));
        }
        let body = resp.text().await?;
        Ok(parse_response(&body)?)
    }
}

/// Produce a plan, preferring the optimizer's when it is available and
/// passes validation.
///
/// # Errors
/// Only `CoreError::Validation` for a malformed request; optimizer problems
/// never surface as errors.
pub async fn plan_with_fallback(
    request: &StudyRequest,
    rules: &RuleSet,
    optimizer: Option<&OptimizerClient>,
) -> Result<PlanOutcome> {
    rules.check()?;
    request.validate(rules)?;

    let Some(optimizer) = optimizer else {
        return Ok(PlanOutcome {
            plan: generate(request, rules)?,
            source: PlanSource::Generated,
            fallback_reason: None,
        });
    };

    let reason = match optimizer.request_plan(request).await {
        Ok(Some(wire)) => match wire
            .into_plan(request, rules)
            .and_then(|plan| validate(&plan, request, rules).map(|()| plan))
        {
            Ok(plan) => {
                info!(endpoint = %optimizer.endpoint(), "using optimizer plan");
                return Ok(PlanOutcome {
                    plan,
                    source: PlanSource::Optimizer,
                    fallback_reason: None,
                });
            }
            Err(violation) => CoreError::from(violation).to_string(),
        },
        Ok(None) => "optimizer returned no plan".to_string(),
        Err(e) => e.to_string(),
    };

    warn!(%reason, "falling back to generated plan");
    Ok(PlanOutcome {
        plan: generate(request, rules)?,
        source: PlanSource::Generated,
        fallback_reason: Some(reason),
    })
}
