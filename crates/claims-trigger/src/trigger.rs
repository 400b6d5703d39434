//! Issuance event handling
//!
//! Only `response.claimsAndScopeOverrideDetails.{idTokenGeneration,
//! accessTokenGeneration}` is written. Every other part of the event,
//! including sibling keys under `claimsAndScopeOverrideDetails`, passes
//! through untouched.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::config::TriggerConfig;

/// Claim changes for one token.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimOverride {
    pub claims_to_add_or_override: BTreeMap<String, String>,
    pub claims_to_suppress: Vec<String>,
}

/// Claim and scope changes for the access token.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGeneration {
    #[serde(flatten)]
    pub claims: ClaimOverride,
    pub scopes_to_add: Vec<String>,
    pub scopes_to_suppress: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimOverrideDetails {
    pub id_token_generation: ClaimOverride,
    pub access_token_generation: TokenGeneration,
}

impl ClaimOverrideDetails {
    pub fn for_config(config: &TriggerConfig) -> Self {
        let scp = (String::from("scp"), config.scope_claim.clone());

        let id_token_generation = ClaimOverride {
            claims_to_add_or_override: BTreeMap::from([scp.clone()]),
            claims_to_suppress: Vec::new(),
        };
        let access_token_generation = TokenGeneration {
            claims: ClaimOverride {
                claims_to_add_or_override: BTreeMap::from([
                    scp,
                    (String::from("aud"), config.audience.clone()),
                ]),
                claims_to_suppress: Vec::new(),
            },
            scopes_to_add: Vec::new(),
            scopes_to_suppress: Vec::new(),
        };

        Self {
            id_token_generation,
            access_token_generation,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum TriggerError {
    #[error("event is not a JSON object")]
    EventNotObject,

    #[error("{0} is not a JSON object")]
    NotObject(&'static str),

    #[error("serializing overrides: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Augment an issuance event with the claim overrides.
///
/// Always returns an event with a `response` object. When the overrides
/// cannot be applied the failure is logged and `response` is left empty (or
/// as it was, if it was already an object).
pub fn handle(event: Value, config: &TriggerConfig) -> Value {
    let Value::Object(mut event) = event else {
        error!(error = %TriggerError::EventNotObject, "claim injection skipped");
        return serde_json::json!({ "response": {} });
    };

    if let Err(e) = apply(&mut event, config) {
        error!(error = %e, "claim injection failed, returning event without overrides");
        if !event.get("response").is_some_and(Value::is_object) {
            event.insert("response".into(), Value::Object(Map::new()));
        }
    }

    Value::Object(event)
}

fn apply(event: &mut Map<String, Value>, config: &TriggerConfig) -> Result<(), TriggerError> {
    let response = object_entry(event, "response")?;
    let details = object_entry(response, "claimsAndScopeOverrideDetails")?;

    let overrides = ClaimOverrideDetails::for_config(config);
    let Value::Object(overrides) = serde_json::to_value(overrides)? else {
        return Err(TriggerError::NotObject("claim overrides"));
    };
    details.extend(overrides);

    debug!(
        user = event.get("userName").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
        trigger_source = event.get("triggerSource").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
        "claims injected"
    );
    Ok(())
}

/// The object at `key`, created when absent or null.
fn object_entry<'a>(
    parent: &'a mut Map<String, Value>,
    key: &'static str,
) -> Result<&'a mut Map<String, Value>, TriggerError> {
    let slot = parent.entry(key).or_insert(Value::Null);
    if slot.is_null() {
        *slot = Value::Object(Map::new());
    }
    slot.as_object_mut().ok_or(TriggerError::NotObject(key))
}
