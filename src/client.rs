use crate::auth::AuthHeader;
use crate::codec;
use crate::config::Config;
use crate::errors::{ClientError, ResultExt};
use crate::models::{
    AttrValue, Campaign, CampaignTarget, GetCampaignsParams, GetLeadParams,
    GetMultipleLeadsParams, LeadIdentifier, LeadKey, LeadPage, LeadRecord, ListQueryArgs,
    NormalizedLead, RequestCampaignParams, SyncLeadParams, SyncResult,
};
use crate::normalizer;
use crate::trace_log::{TraceLog, TracingTraceLog};
use crate::transport::{GatewayTransport, Transport, TransportError};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Fault code the API uses for "no matching records".
pub const NO_RECORDS_CODE: &str = "20103";

/// Client for the lead and campaign operations of the SOAP API.
///
/// Every call is signed with a fresh [`AuthHeader`] and performs exactly one
/// round trip through the configured [`Transport`].
#[derive(Clone)]
pub struct MktowsClient {
    user_id: String,
    encryption_key: String,
    transport: Arc<dyn Transport>,
    trace_log: Option<Arc<dyn TraceLog>>,
}

impl MktowsClient {
    /// Creates a new `MktowsClient`.
    ///
    /// # Arguments
    ///
    /// * `user_id` - The API access key.
    /// * `encryption_key` - The shared secret used for signing.
    /// * `transport` - Collaborator that performs the remote calls.
    pub fn new(
        user_id: impl Into<String>,
        encryption_key: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            encryption_key: encryption_key.into(),
            transport,
            trace_log: None,
        }
    }

    /// Builds a client that talks to the configured gateway.
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        let transport =
            GatewayTransport::new(config.gateway_url.clone(), config.endpoint(), config.timeout())?;
        let client = Self::new(
            config.user_id.clone(),
            config.encryption_key.clone(),
            Arc::new(transport),
        );

        Ok(if config.debug {
            client.with_trace_log(Arc::new(TracingTraceLog))
        } else {
            client
        })
    }

    /// Traces the raw request and response of every call to `trace_log`.
    pub fn with_trace_log(mut self, trace_log: Arc<dyn TraceLog>) -> Self {
        self.trace_log = Some(trace_log);
        self
    }

    /// Gets the leads of a static list.
    ///
    /// Returns `Ok(None)` when the list holds no leads.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let args = ListQueryArgs::new("Twitter List")
    ///     .include_attributes(["Email", "MarketoSocialTwitterDisplayName"]);
    /// let leads = client.get_leads_by_list(&args).await?;
    /// ```
    pub async fn get_leads_by_list(
        &self,
        args: &ListQueryArgs,
    ) -> Result<Option<Vec<NormalizedLead>>, ClientError> {
        Ok(self.get_lead_page(args).await?.map(|page| page.leads))
    }

    /// Gets one page of a static list, including the stream position to pass
    /// back for the next page.
    pub async fn get_lead_page(&self, args: &ListQueryArgs) -> Result<Option<LeadPage>, ClientError> {
        tracing::info!("Fetching leads from static list '{}'", args.list_name);

        let params = GetMultipleLeadsParams::from(args);
        let reply = match lookup("getMultipleLeads", self.request("getMultipleLeads", &params).await)? {
            Some(reply) => reply,
            None => {
                tracing::info!("No leads found in list '{}'", args.list_name);
                return Ok(None);
            }
        };

        let page = normalizer::lead_page(&reply).context("getMultipleLeads")?;
        tracing::info!(
            "Fetched {} leads from '{}' ({} remaining)",
            page.leads.len(),
            args.list_name,
            page.remaining_count.unwrap_or(0)
        );
        Ok(Some(page))
    }

    /// Gets a lead by one of its keys, e.g. `get_lead_by("email", "ben@benubois.com")`.
    ///
    /// Returns `Ok(None)` when no lead matches.
    pub async fn get_lead_by(
        &self,
        key_type: &str,
        key_value: &str,
    ) -> Result<Option<Vec<NormalizedLead>>, ClientError> {
        let lead_key = LeadKey::parse(key_type, key_value)?;
        tracing::info!("Fetching lead by {}", lead_key.key_type);

        let params = GetLeadParams { lead_key };
        let reply = match lookup("getLead", self.request("getLead", &params).await)? {
            Some(reply) => reply,
            None => {
                tracing::info!("No lead found for {}", params.lead_key.key_type);
                return Ok(None);
            }
        };

        normalizer::normalize_leads(&reply)
            .context("getLead")
            .map(Some)
    }

    /// Creates or updates a lead.
    ///
    /// Without `lead_key` or `cookie` a new lead is created; a blank
    /// `lead_key` counts as absent. A numeric `lead_key` identifies the lead
    /// by id, anything else by email.
    pub async fn sync_lead<I, K>(
        &self,
        attributes: I,
        lead_key: Option<&str>,
        cookie: Option<&str>,
    ) -> Result<SyncResult, ClientError>
    where
        I: IntoIterator<Item = (K, AttrValue)>,
        K: Into<String>,
    {
        let identifier = lead_key
            .filter(|key| !key.trim().is_empty())
            .map(LeadIdentifier::parse);
        let params = SyncLeadParams {
            lead_record: LeadRecord::new(identifier, codec::encode(attributes)),
            return_lead: true,
            marketo_cookie: cookie.map(str::to_string),
        };
        tracing::info!(
            "Syncing lead with {} attributes",
            params.lead_record.attribute_list.attribute.len()
        );

        let reply = self
            .request("syncLead", &params)
            .await
            .map_err(|e| hard_failure("syncLead", e))?;

        let result = normalizer::sync_result(&reply).context("syncLead")?;
        if let Some(status) = &result.sync_status {
            tracing::info!("Lead {:?} sync status: {}", result.lead_id, status.status);
        }
        Ok(result)
    }

    /// Gets the campaigns available to this client, optionally only the one
    /// with exactly `name`.
    pub async fn get_campaigns(&self, name: Option<&str>) -> Result<Vec<Campaign>, ClientError> {
        tracing::info!("Fetching campaigns (filter: {:?})", name);

        let params = GetCampaignsParams::new(name);
        let reply = self
            .request("getCampaignsForSource", &params)
            .await
            .map_err(|e| hard_failure("getCampaignsForSource", e))?;

        normalizer::campaigns(&reply).context("getCampaignsForSource")
    }

    /// Adds leads to a campaign. Returns the remote success flag.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let keys = LeadKey::from_value(&json!([
    ///     {"idnum": "123456"},
    ///     {"sfdcleadid": "001d000000FXkBt"}
    /// ]))?;
    /// client.request_campaign(&CampaignTarget::new("321", keys)).await?;
    /// ```
    pub async fn request_campaign(&self, target: &CampaignTarget) -> Result<bool, ClientError> {
        if target.lead_keys.is_empty() {
            return Err(ClientError::InvalidArgument(
                "at least one lead key is required".to_string(),
            ));
        }
        tracing::info!(
            "Requesting campaign {:?} for {} leads",
            target.campaign_key,
            target.lead_keys.len()
        );

        let params = RequestCampaignParams::from(target);
        let reply = self
            .request("requestCampaign", &params)
            .await
            .map_err(|e| hard_failure("requestCampaign", e))?;

        normalizer::campaign_success(&reply).context("requestCampaign")
    }

    /// Signs and performs one call, tracing the raw exchange when enabled.
    async fn request<P: Serialize>(
        &self,
        operation: &str,
        params: &P,
    ) -> Result<Value, TransportError> {
        let payload = serde_json::to_value(params).map_err(|e| {
            TransportError::Failure(format!("Failed to encode {} parameters: {}", operation, e))
        })?;

        let header = AuthHeader::build(&self.user_id, &self.encryption_key);
        let result = self.transport.call(operation, payload, &header).await;

        if let Some(trace_log) = &self.trace_log {
            if let Some(exchange) = self.transport.last_exchange() {
                trace_log.record(&exchange.request, "Request");
                trace_log.record(&exchange.response, "Response");
            }
        }

        result
    }
}

/// Resolves the reserved "no records" fault to `None`; every other failure
/// stays an error.
fn lookup(
    operation: &str,
    result: Result<Value, TransportError>,
) -> Result<Option<Value>, ClientError> {
    match result {
        Ok(reply) => Ok(Some(reply)),
        Err(TransportError::Fault(fault)) if fault.code.as_deref() == Some(NO_RECORDS_CODE) => {
            Ok(None)
        }
        Err(e) => Err(hard_failure(operation, e)),
    }
}

fn hard_failure(operation: &str, err: TransportError) -> ClientError {
    tracing::error!("{} failed: {}", operation, err);
    ClientError::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SoapFault;
    use serde_json::json;

    #[test]
    fn test_lookup_resolves_no_records_fault() {
        let outcome = lookup("getLead", Err(TransportError::Fault(SoapFault::new(
            Some(NO_RECORDS_CODE),
            "Lead not found",
        ))));
        assert_eq!(outcome, Ok(None));
    }

    #[test]
    fn test_lookup_keeps_other_faults() {
        let outcome = lookup("getLead", Err(TransportError::Fault(SoapFault::new(
            Some("20014"),
            "Authentication failed",
        ))));
        assert_eq!(
            outcome,
            Err(ClientError::RemoteFault {
                code: Some("20014".to_string()),
                message: "Authentication failed".to_string(),
            })
        );

        let outcome = lookup("getLead", Err(TransportError::Fault(SoapFault::new(None, "boom"))));
        assert!(matches!(outcome, Err(ClientError::RemoteFault { code: None, .. })));
    }

    #[test]
    fn test_lookup_passes_reply_through() {
        let reply = json!({"result": {}});
        assert_eq!(lookup("getLead", Ok(reply.clone())), Ok(Some(reply)));
    }

    #[test]
    fn test_lookup_keeps_transport_failures() {
        let outcome = lookup("getLead", Err(TransportError::Failure("timed out".to_string())));
        assert_eq!(outcome, Err(ClientError::Transport("timed out".to_string())));
    }
}
