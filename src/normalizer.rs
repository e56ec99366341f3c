//! Reply normalization.
//!
//! The API returns a bare object when exactly one record matches and a list
//! when several do. Everything leaving this module is a sequence, with each
//! lead's nested attribute list flattened through [`codec::decode`].

use crate::codec;
use crate::errors::ClientError;
use crate::models::{
    value_as_i64, Campaign, LeadPage, NormalizedLead, OneOrMany, SyncResult, SyncStatus,
};
use serde::Deserialize;
use serde_json::{Map, Value};

const ATTRIBUTE_LIST: &str = "leadAttributeList";

static NULL: Value = Value::Null;

/// Views a single-or-many reply element as a sequence. `null` is empty.
pub fn as_sequence(value: &Value) -> Vec<&Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// Normalizes the `leadRecordList` of a `getLead` or `getMultipleLeads` reply.
pub fn normalize_leads(reply: &Value) -> Result<Vec<NormalizedLead>, ClientError> {
    let result = result_of(reply)?;
    let list = result
        .get("leadRecordList")
        .ok_or_else(|| ClientError::MalformedReply("reply has no leadRecordList".to_string()))?;

    let records = list.get("leadRecord").unwrap_or(&NULL);
    as_sequence(records)
        .into_iter()
        .map(normalize_record)
        .collect()
}

/// Normalizes a lead query reply together with its paging metadata.
pub fn lead_page(reply: &Value) -> Result<LeadPage, ClientError> {
    let leads = normalize_leads(reply)?;
    let result = result_of(reply)?;

    Ok(LeadPage {
        return_count: result.get("returnCount").and_then(value_as_i64),
        remaining_count: result.get("remainingCount").and_then(value_as_i64),
        new_stream_position: result
            .get("newStreamPosition")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        leads,
    })
}

/// Replaces a record's nested attribute list with a flat mapping.
pub fn normalize_record(record: &Value) -> Result<NormalizedLead, ClientError> {
    let object = record.as_object().ok_or_else(|| {
        ClientError::MalformedReply(format!("lead record must be an object, got {}", record))
    })?;

    let attributes = match object.get(ATTRIBUTE_LIST) {
        None | Some(Value::Null) => Default::default(),
        Some(list) => codec::decode(list.get("attribute").unwrap_or(&NULL))?,
    };

    let fields: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| key.as_str() != ATTRIBUTE_LIST)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(NormalizedLead { fields, attributes })
}

/// Reads a `syncLead` reply. The lead is always requested back, so a missing
/// `leadRecord` is a structural error.
pub fn sync_result(reply: &Value) -> Result<SyncResult, ClientError> {
    let result = result_of(reply)?;

    let record = result
        .get("leadRecord")
        .filter(|r| !r.is_null())
        .ok_or_else(|| ClientError::MalformedReply("sync reply has no leadRecord".to_string()))?;

    let sync_status = match result.get("syncStatus") {
        None | Some(Value::Null) => None,
        Some(status) => Some(SyncStatus::deserialize(status).map_err(|e| {
            ClientError::MalformedReply(format!("invalid syncStatus: {}", e))
        })?),
    };

    Ok(SyncResult {
        lead_id: result.get("leadId").and_then(value_as_i64),
        sync_status,
        lead: normalize_record(record)?,
    })
}

/// Reads the campaign records of a `getCampaignsForSource` reply.
pub fn campaigns(reply: &Value) -> Result<Vec<Campaign>, ClientError> {
    let result = result_of(reply)?;

    let records = match result.get("campaignRecordList") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(list) => list.get("campaignRecord").unwrap_or(&NULL),
    };
    if records.is_null() {
        return Ok(Vec::new());
    }

    OneOrMany::<Campaign>::deserialize(records)
        .map(OneOrMany::into_vec)
        .map_err(|e| ClientError::MalformedReply(format!("invalid campaign record: {}", e)))
}

/// Reads the `success` flag of a `requestCampaign` reply.
pub fn campaign_success(reply: &Value) -> Result<bool, ClientError> {
    match result_of(reply)?.get("success") {
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") || s == "1" => Ok(true),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") || s == "0" => Ok(false),
        Some(other) => Err(ClientError::MalformedReply(format!(
            "success flag must be boolean, got {}",
            other
        ))),
        None => Err(ClientError::MalformedReply(
            "campaign reply has no success flag".to_string(),
        )),
    }
}

fn result_of(reply: &Value) -> Result<&Value, ClientError> {
    reply
        .get("result")
        .filter(|r| r.is_object())
        .ok_or_else(|| ClientError::MalformedReply("reply has no result element".to_string()))
}
