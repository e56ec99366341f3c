/// Client tests against a scripted in-memory transport
/// Covers parameter building, fault classification and reply normalization per operation
use async_trait::async_trait;
use mktows_client::auth::{sign, AuthHeader};
use mktows_client::models::{AttrValue, CampaignTarget, LeadKey, ListQueryArgs};
use mktows_client::trace_log::TraceLog;
use mktows_client::transport::{Exchange, SoapFault, Transport, TransportError};
use mktows_client::{ClientError, MktowsClient};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const USER_ID: &str = "bigcorp1_461839624B16E06BA2D663";
const SECRET: &str = "899756834129871744AAEE88DDCC77CDEEDEC1AAAD66";

#[derive(Debug, Clone)]
struct RecordedCall {
    operation: String,
    params: Value,
    header: AuthHeader,
}

#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<Value, TransportError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    fn replying(replies: Vec<Result<Value, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(
        &self,
        operation: &str,
        params: Value,
        header: &AuthHeader,
    ) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            operation: operation.to_string(),
            params,
            header: header.clone(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted reply left")
    }

    fn last_exchange(&self) -> Option<Exchange> {
        let calls = self.calls.lock().unwrap();
        calls.last().map(|call| Exchange {
            request: call.params.to_string(),
            response: "<scripted>".to_string(),
        })
    }
}

fn client(transport: Arc<ScriptedTransport>) -> MktowsClient {
    MktowsClient::new(USER_ID, SECRET, transport)
}

fn fault(code: &str) -> Result<Value, TransportError> {
    Err(TransportError::Fault(SoapFault::new(Some(code), format!("fault {}", code))))
}

fn lead_record(id: i64, email: &str) -> Value {
    json!({
        "Id": id,
        "Email": email,
        "ForeignSysPersonId": null,
        "ForeignSysType": null,
        "leadAttributeList": {
            "attribute": [
                {"attrName": "FirstName", "attrType": "string", "attrValue": "Ben"},
                {"attrName": "AnnualRevenue", "attrType": "float", "attrValue": "1000.5"},
                {"attrName": "Unsubscribed", "attrType": "boolean", "attrValue": "0"}
            ]
        }
    })
}

fn leads_reply(records: Value) -> Value {
    json!({
        "result": {
            "returnCount": 1,
            "remainingCount": 0,
            "newStreamPosition": "",
            "leadRecordList": {"leadRecord": records}
        }
    })
}

#[tokio::test]
async fn test_get_lead_by_builds_upper_cased_key() {
    let transport = ScriptedTransport::replying(vec![Ok(leads_reply(lead_record(
        42,
        "ben@benubois.com",
    )))]);

    let leads = client(transport.clone())
        .get_lead_by("email", "ben@benubois.com")
        .await
        .unwrap()
        .expect("lead should be found");

    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].id(), Some(42));
    assert_eq!(leads[0].attribute("FirstName"), Some(&AttrValue::from("Ben")));
    assert_eq!(leads[0].attribute("AnnualRevenue"), Some(&AttrValue::Float(1000.5)));
    assert_eq!(leads[0].attribute("Unsubscribed"), Some(&AttrValue::Boolean(false)));

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].operation, "getLead");
    assert_eq!(
        calls[0].params,
        json!({"leadKey": {"keyType": "EMAIL", "keyValue": "ben@benubois.com"}})
    );
}

#[tokio::test]
async fn test_no_records_fault_is_not_found_for_lookups() {
    let transport = ScriptedTransport::replying(vec![fault("20103"), fault("20103")]);
    let client = client(transport.clone());

    let by_key = client.get_lead_by("idnum", "999").await;
    assert_eq!(by_key, Ok(None));

    let by_list = client
        .get_leads_by_list(&ListQueryArgs::new("Empty List"))
        .await;
    assert_eq!(by_list, Ok(None));

    assert_eq!(transport.calls().len(), 2);
}

#[tokio::test]
async fn test_other_fault_codes_are_remote_faults() {
    let transport = ScriptedTransport::replying(vec![fault("20014"), fault("20013")]);
    let client = client(transport);

    let err = client.get_lead_by("email", "a@b.c").await.unwrap_err();
    assert_eq!(err.fault_code(), Some("20014"));
    assert!(matches!(err, ClientError::RemoteFault { .. }));

    let err = client
        .get_leads_by_list(&ListQueryArgs::new("Twitter List"))
        .await
        .unwrap_err();
    assert_eq!(err.fault_code(), Some("20013"));
}

#[tokio::test]
async fn test_fault_without_code_is_hard_error() {
    let transport = ScriptedTransport::replying(vec![Err(TransportError::Fault(
        SoapFault::new(None, "Server was unable to process request"),
    ))]);

    let err = client(transport).get_lead_by("email", "a@b.c").await.unwrap_err();
    assert_eq!(
        err,
        ClientError::RemoteFault {
            code: None,
            message: "Server was unable to process request".to_string(),
        }
    );
}

#[tokio::test]
async fn test_transport_failure_propagates() {
    let transport = ScriptedTransport::replying(vec![Err(TransportError::Failure(
        "getLead timed out after 20s".to_string(),
    ))]);

    let err = client(transport).get_lead_by("email", "a@b.c").await.unwrap_err();
    assert_eq!(
        err,
        ClientError::Transport("getLead timed out after 20s".to_string())
    );
}

#[tokio::test]
async fn test_unknown_key_type_never_calls_transport() {
    let transport = ScriptedTransport::replying(vec![]);

    let err = client(transport.clone())
        .get_lead_by("twitter", "@ben")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::InvalidArgument(_)));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_list_query_single_and_multiple_records() {
    let transport = ScriptedTransport::replying(vec![
        Ok(leads_reply(lead_record(1, "a@b.c"))),
        Ok(leads_reply(json!([lead_record(1, "a@b.c"), lead_record(1, "a@b.c")]))),
    ]);
    let client = client(transport.clone());
    let args = ListQueryArgs::new("Twitter List")
        .batch_size(2)
        .include_attributes(["Email", "MarketoSocialTwitterDisplayName"]);

    let one = client.get_leads_by_list(&args).await.unwrap().unwrap();
    let two = client.get_leads_by_list(&args).await.unwrap().unwrap();

    assert_eq!(one.len(), 1);
    assert_eq!(two.len(), 2);
    assert_eq!(one[0], two[0]);

    let calls = transport.calls();
    assert_eq!(calls[0].operation, "getMultipleLeads");
    assert_eq!(
        calls[0].params,
        json!({
            "leadSelector": {"xsi:type": "StaticListSelector", "staticListName": "Twitter List"},
            "includeAttributes": {"stringItem": ["Email", "MarketoSocialTwitterDisplayName"]},
            "batchSize": 2
        })
    );
}

#[tokio::test]
async fn test_lead_page_carries_stream_position() {
    let transport = ScriptedTransport::replying(vec![Ok(json!({
        "result": {
            "returnCount": 1,
            "remainingCount": 3,
            "newStreamPosition": "id:77:ts:1265834423",
            "leadRecordList": {"leadRecord": lead_record(77, "p@q.r")}
        }
    }))]);

    let page = client(transport.clone())
        .get_lead_page(&ListQueryArgs::new("Big List").stream_position("id:76:ts:1265834400"))
        .await
        .unwrap()
        .unwrap();

    assert!(page.has_more());
    assert_eq!(page.new_stream_position.as_deref(), Some("id:77:ts:1265834423"));
    assert_eq!(
        transport.calls()[0].params["streamPosition"],
        "id:76:ts:1265834400"
    );
}

#[tokio::test]
async fn test_malformed_list_reply_fails_fast() {
    let transport = ScriptedTransport::replying(vec![Ok(json!({"result": {"returnCount": 1}}))]);

    let err = client(transport)
        .get_leads_by_list(&ListQueryArgs::new("Twitter List"))
        .await
        .unwrap_err();

    assert!(matches!(err.root(), ClientError::MalformedReply(_)));
}

#[tokio::test]
async fn test_sync_lead_encodes_attributes_and_email_key() {
    let transport = ScriptedTransport::replying(vec![Ok(json!({
        "result": {
            "leadId": 42,
            "syncStatus": {"leadId": 42, "status": "UPDATED", "error": null},
            "leadRecord": {
                "Id": 42,
                "Email": "ben@benubois.com",
                "leadAttributeList": {
                    "attribute": {"attrName": "Unsubscribed", "attrType": "boolean", "attrValue": "0"}
                }
            }
        }
    }))]);

    let result = client(transport.clone())
        .sync_lead(
            vec![
                ("Email", AttrValue::from("ben@benubois.com")),
                ("Unsubscribed", AttrValue::from(false)),
            ],
            Some("ben@benubois.com"),
            Some("id:561-HYG-937&token:_mch-marketo.com-1258067434006-50277"),
        )
        .await
        .unwrap();

    assert_eq!(result.lead_id, Some(42));
    assert_eq!(result.sync_status.as_ref().unwrap().status, "UPDATED");
    assert_eq!(
        result.lead.attribute("Unsubscribed"),
        Some(&AttrValue::Boolean(false))
    );

    let calls = transport.calls();
    assert_eq!(calls[0].operation, "syncLead");
    assert_eq!(
        calls[0].params,
        json!({
            "leadRecord": {
                "Email": "ben@benubois.com",
                "leadAttributeList": {
                    "attribute": [
                        {"attrName": "Email", "attrValue": "ben@benubois.com", "attrType": null},
                        {"attrName": "Unsubscribed", "attrValue": "0", "attrType": "boolean"}
                    ]
                }
            },
            "returnLead": true,
            "marketoCookie": "id:561-HYG-937&token:_mch-marketo.com-1258067434006-50277"
        })
    );
}

#[tokio::test]
async fn test_sync_lead_numeric_key_routes_to_id() {
    let transport = ScriptedTransport::replying(vec![Ok(json!({
        "result": {"leadId": 7, "leadRecord": {"Id": 7}}
    }))]);

    client(transport.clone())
        .sync_lead(vec![("FirstName", AttrValue::from("Ben"))], Some("7"), None)
        .await
        .unwrap();

    let params = &transport.calls()[0].params;
    assert_eq!(params["leadRecord"]["Id"], 7);
    assert!(params["leadRecord"].get("Email").is_none());
    assert!(params.get("marketoCookie").is_none());
}

#[tokio::test]
async fn test_sync_lead_blank_key_creates_new_lead() {
    let transport = ScriptedTransport::replying(vec![
        Ok(json!({"result": {"leadId": 8, "leadRecord": {"Id": 8}}})),
        Ok(json!({"result": {"leadId": 9, "leadRecord": {"Id": 9}}})),
    ]);
    let client = client(transport.clone());

    for key in ["", "   "] {
        client
            .sync_lead(vec![("FirstName", AttrValue::from("Ben"))], Some(key), None)
            .await
            .unwrap();
    }

    for call in transport.calls() {
        let record = &call.params["leadRecord"];
        assert!(record.get("Email").is_none());
        assert!(record.get("Id").is_none());
        assert_eq!(
            record["leadAttributeList"]["attribute"][0]["attrName"],
            "FirstName"
        );
    }
}

#[tokio::test]
async fn test_sync_lead_has_no_not_found_branch() {
    let transport = ScriptedTransport::replying(vec![fault("20103")]);

    let err = client(transport)
        .sync_lead(vec![("Email", AttrValue::from("a@b.c"))], None, None)
        .await
        .unwrap_err();

    assert_eq!(err.fault_code(), Some("20103"));
}

#[tokio::test]
async fn test_get_campaigns_with_exact_name() {
    let transport = ScriptedTransport::replying(vec![Ok(json!({
        "result": {
            "returnCount": 1,
            "campaignRecordList": {
                "campaignRecord": {"id": 1001, "name": "Spring Promo", "description": "Trigger"}
            }
        }
    }))]);

    let campaigns = client(transport.clone())
        .get_campaigns(Some("Spring Promo"))
        .await
        .unwrap();

    assert_eq!(campaigns.len(), 1);
    assert_eq!(campaigns[0].id, 1001);

    let call = &transport.calls()[0];
    assert_eq!(call.operation, "getCampaignsForSource");
    assert_eq!(
        call.params,
        json!({"source": "MKTOWS", "name": "Spring Promo", "exactName": true})
    );
}

#[tokio::test]
async fn test_get_campaigns_without_filter() {
    let transport = ScriptedTransport::replying(vec![Ok(json!({
        "result": {
            "returnCount": 2,
            "campaignRecordList": {
                "campaignRecord": [
                    {"id": 1001, "name": "Spring Promo"},
                    {"id": "1002", "name": "Welcome"}
                ]
            }
        }
    }))]);

    let campaigns = client(transport.clone()).get_campaigns(None).await.unwrap();

    assert_eq!(campaigns.len(), 2);
    assert_eq!(campaigns[1].id, 1002);
    assert_eq!(transport.calls()[0].params, json!({"source": "MKTOWS"}));
}

#[tokio::test]
async fn test_request_campaign_by_id_with_mixed_keys() {
    let transport = ScriptedTransport::replying(vec![Ok(json!({"result": {"success": true}}))]);
    let keys = LeadKey::from_value(&json!([
        {"idnum": "123456"},
        {"sfdcleadid": "001d000000FXkBt"}
    ]))
    .unwrap();

    let ok = client(transport.clone())
        .request_campaign(&CampaignTarget::new("321", keys).token("{{my.Speaker}}", "Ben"))
        .await
        .unwrap();

    assert!(ok);
    let call = &transport.calls()[0];
    assert_eq!(call.operation, "requestCampaign");
    assert_eq!(
        call.params,
        json!({
            "leadList": [
                {"keyType": "IDNUM", "keyValue": "123456"},
                {"keyType": "SFDCLEADID", "keyValue": "001d000000FXkBt"}
            ],
            "source": "MKTOWS",
            "programTokenList": {"attrib": [{"name": "{{my.Speaker}}", "value": "Ben"}]},
            "campaignId": 321
        })
    );
}

#[tokio::test]
async fn test_request_campaign_by_name() {
    let transport = ScriptedTransport::replying(vec![Ok(json!({"result": {"success": false}}))]);
    let keys = LeadKey::from_mapping([("idnum", "123456")]).unwrap();

    let ok = client(transport.clone())
        .request_campaign(&CampaignTarget::new("Spring Promo", keys).program_name("Webinars"))
        .await
        .unwrap();

    assert!(!ok);
    let params = &transport.calls()[0].params;
    assert_eq!(params["campaignName"], "Spring Promo");
    assert_eq!(params["programName"], "Webinars");
    assert!(params.get("campaignId").is_none());
}

#[tokio::test]
async fn test_request_campaign_requires_lead_keys() {
    let transport = ScriptedTransport::replying(vec![]);

    let err = client(transport.clone())
        .request_campaign(&CampaignTarget::new("321", vec![]))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::InvalidArgument(_)));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_every_call_gets_a_valid_signature() {
    let transport = ScriptedTransport::replying(vec![fault("20103"), fault("20103")]);
    let client = client(transport.clone());

    client.get_lead_by("email", "a@b.c").await.unwrap();
    client.get_lead_by("email", "a@b.c").await.unwrap();

    for call in transport.calls() {
        assert_eq!(call.header.user_id, USER_ID);
        assert_eq!(
            call.header.signature,
            sign(SECRET, &call.header.timestamp, USER_ID)
        );
        assert!(chrono::DateTime::parse_from_rfc3339(&call.header.timestamp).is_ok());
    }
}

#[derive(Default)]
struct MemoryTraceLog {
    entries: Mutex<Vec<(String, String)>>,
}

impl TraceLog for MemoryTraceLog {
    fn record(&self, content: &str, label: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((label.to_string(), content.to_string()));
    }
}

#[tokio::test]
async fn test_trace_log_receives_request_and_response() {
    let transport = ScriptedTransport::replying(vec![fault("20103")]);
    let trace_log = Arc::new(MemoryTraceLog::default());
    let client = client(transport).with_trace_log(trace_log.clone());

    client.get_lead_by("email", "a@b.c").await.unwrap();

    let entries = trace_log.entries.lock().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].0, "Request");
    assert!(entries[0].1.contains("a@b.c"));
    assert_eq!(entries[1], ("Response".to_string(), "<scripted>".to_string()));
}
