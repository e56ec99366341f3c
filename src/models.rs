use crate::errors::ClientError;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Timestamp layout the API expects (ISO-8601 with numeric offset).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Source tag identifying this client to the campaign operations.
pub const CAMPAIGN_SOURCE: &str = "MKTOWS";

// ============ Attribute Models ============

/// Native value of a lead attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// The remote side returns blank fields without a value.
    Null,
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Float(f) => Some(*f),
            AttrValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::String(s)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Boolean(b)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Integer(i)
    }
}

impl From<i32> for AttrValue {
    fn from(i: i32) -> Self {
        AttrValue::Integer(i64::from(i))
    }
}

impl From<f64> for AttrValue {
    fn from(f: f64) -> Self {
        AttrValue::Float(f)
    }
}

/// Declared type of a lead attribute (`attrType` on the wire).
///
/// Only the first four kinds are coerced on decode; everything else
/// (`date`, `datetime`, `text`, `email`, ...) is carried as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttrType {
    String,
    Integer,
    Boolean,
    Float,
    Other(String),
}

impl AttrType {
    pub fn as_str(&self) -> &str {
        match self {
            AttrType::String => "string",
            AttrType::Integer => "integer",
            AttrType::Boolean => "boolean",
            AttrType::Float => "float",
            AttrType::Other(other) => other,
        }
    }

    /// Whether decode converts values of this type.
    pub fn is_coercible(&self) -> bool {
        !matches!(self, AttrType::Other(_))
    }
}

impl From<String> for AttrType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "string" => AttrType::String,
            "integer" => AttrType::Integer,
            "boolean" => AttrType::Boolean,
            "float" => AttrType::Float,
            _ => AttrType::Other(s),
        }
    }
}

impl From<AttrType> for String {
    fn from(t: AttrType) -> Self {
        t.as_str().to_string()
    }
}

/// One `{attrName, attrValue, attrType}` record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadAttribute {
    #[serde(rename = "attrName")]
    pub name: String,
    #[serde(rename = "attrValue")]
    pub value: AttrValue,
    /// `None` leaves the type for the remote side to infer.
    #[serde(rename = "attrType")]
    pub declared_type: Option<AttrType>,
}

/// Wrapper matching the `leadAttributeList` element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeList {
    pub attribute: Vec<LeadAttribute>,
}

// ============ Lead Identification ============

/// How a lead is identified in the upsert path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadIdentifier {
    Id(i64),
    Email(String),
}

impl LeadIdentifier {
    /// Numeric keys identify by lead id, anything else is treated as an email.
    pub fn parse(key: &str) -> Self {
        match key.trim().parse::<i64>() {
            Ok(id) => LeadIdentifier::Id(id),
            Err(_) => LeadIdentifier::Email(key.to_string()),
        }
    }
}

/// Lead record sent with `syncLead`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadRecord {
    #[serde(rename = "Id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "Email", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "leadAttributeList")]
    pub attribute_list: AttributeList,
}

impl LeadRecord {
    pub fn new(identifier: Option<LeadIdentifier>, attributes: Vec<LeadAttribute>) -> Self {
        let (id, email) = match identifier {
            Some(LeadIdentifier::Id(id)) => (Some(id), None),
            Some(LeadIdentifier::Email(email)) => (None, Some(email)),
            None => (None, None),
        };

        Self {
            id,
            email,
            attribute_list: AttributeList {
                attribute: attributes,
            },
        }
    }
}

/// Kind of key a lead can be looked up or enrolled by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LeadKeyType {
    /// The remote lead ID.
    Idnum,
    /// The entire `_mkto_trk` tracking cookie.
    Cookie,
    Email,
    /// Salesforce contact ID.
    Sfdccontactid,
    /// Salesforce lead ID.
    Sfdcleadid,
}

impl LeadKeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadKeyType::Idnum => "IDNUM",
            LeadKeyType::Cookie => "COOKIE",
            LeadKeyType::Email => "EMAIL",
            LeadKeyType::Sfdccontactid => "SFDCCONTACTID",
            LeadKeyType::Sfdcleadid => "SFDCLEADID",
        }
    }
}

impl FromStr for LeadKeyType {
    type Err = ClientError;

    /// Parses caller input case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "IDNUM" => Ok(LeadKeyType::Idnum),
            "COOKIE" => Ok(LeadKeyType::Cookie),
            "EMAIL" => Ok(LeadKeyType::Email),
            "SFDCCONTACTID" => Ok(LeadKeyType::Sfdccontactid),
            "SFDCLEADID" => Ok(LeadKeyType::Sfdcleadid),
            other => Err(ClientError::InvalidArgument(format!(
                "unknown lead key type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for LeadKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{keyType, keyValue}` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadKey {
    #[serde(rename = "keyType")]
    pub key_type: LeadKeyType,
    #[serde(rename = "keyValue")]
    pub key_value: String,
}

impl LeadKey {
    pub fn new(key_type: LeadKeyType, key_value: impl Into<String>) -> Self {
        Self {
            key_type,
            key_value: key_value.into(),
        }
    }

    /// Builds a key from a caller-supplied type string such as `"email"`.
    pub fn parse(key_type: &str, key_value: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self::new(key_type.parse()?, key_value))
    }

    /// Builds keys from a flat mapping: every entry becomes one key.
    pub fn from_mapping<I, K, V>(entries: I) -> Result<Vec<Self>, ClientError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        entries
            .into_iter()
            .map(|(k, v)| Self::parse(k.as_ref(), v))
            .collect()
    }

    /// Builds keys from a sequence of single-entry mappings.
    pub fn from_entries<I, M, K, V>(entries: I) -> Result<Vec<Self>, ClientError>
    where
        I: IntoIterator<Item = M>,
        M: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        entries
            .into_iter()
            .map(|mapping| {
                let mut keys = Self::from_mapping(mapping)?;
                if keys.len() != 1 {
                    return Err(ClientError::InvalidArgument(format!(
                        "lead key entry must hold exactly one id type, got {}",
                        keys.len()
                    )));
                }
                Ok(keys.remove(0))
            })
            .collect()
    }

    /// Accepts either a flat JSON object or an array of single-entry objects.
    pub fn from_value(value: &Value) -> Result<Vec<Self>, ClientError> {
        fn entry_pairs(map: &Map<String, Value>) -> Result<Vec<(&str, String)>, ClientError> {
            map.iter()
                .map(|(k, v)| match v {
                    Value::String(s) => Ok((k.as_str(), s.clone())),
                    Value::Number(n) => Ok((k.as_str(), n.to_string())),
                    other => Err(ClientError::InvalidArgument(format!(
                        "lead key '{}' must be a string or number, got {}",
                        k, other
                    ))),
                })
                .collect()
        }

        match value {
            Value::Object(map) => Self::from_mapping(entry_pairs(map)?),
            Value::Array(items) => {
                let mappings = items
                    .iter()
                    .map(|item| match item {
                        Value::Object(map) => entry_pairs(map),
                        other => Err(ClientError::InvalidArgument(format!(
                            "lead key entry must be an object, got {}",
                            other
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Self::from_entries(mappings)
            }
            other => Err(ClientError::InvalidArgument(format!(
                "lead keys must be an object or array, got {}",
                other
            ))),
        }
    }
}

// ============ Query Arguments ============

/// Options for a static-list lead query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQueryArgs {
    pub list_name: String,
    /// Number of entries per page; remote default is 100.
    pub batch_size: Option<u32>,
    /// Restrict the returned attributes to these field names.
    pub include_attributes: Option<BTreeSet<String>>,
    pub last_updated_at: Option<DateTime<FixedOffset>>,
    /// Paging cursor from a previous reply. When present the remote side
    /// ignores `last_updated_at`.
    pub stream_position: Option<String>,
}

impl ListQueryArgs {
    pub fn new(list_name: impl Into<String>) -> Self {
        Self {
            list_name: list_name.into(),
            ..Default::default()
        }
    }

    pub fn batch_size(mut self, size: u32) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn include_attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_attributes = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn last_updated_at(mut self, at: DateTime<FixedOffset>) -> Self {
        self.last_updated_at = Some(at);
        self
    }

    pub fn stream_position(mut self, position: impl Into<String>) -> Self {
        self.stream_position = Some(position.into());
        self
    }
}

/// A campaign addressed either by id or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampaignKey {
    Id(i64),
    Name(String),
}

impl CampaignKey {
    /// Numeric strings address the campaign by id, anything else by name.
    pub fn parse(key: &str) -> Self {
        match key.trim().parse::<i64>() {
            Ok(id) => CampaignKey::Id(id),
            Err(_) => CampaignKey::Name(key.to_string()),
        }
    }
}

impl From<i64> for CampaignKey {
    fn from(id: i64) -> Self {
        CampaignKey::Id(id)
    }
}

impl From<&str> for CampaignKey {
    fn from(key: &str) -> Self {
        CampaignKey::parse(key)
    }
}

/// Named value substituted into campaign content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramToken {
    pub name: String,
    pub value: String,
}

/// Everything needed to enroll leads into a campaign.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignTarget {
    pub campaign_key: CampaignKey,
    pub lead_keys: Vec<LeadKey>,
    pub program_name: Option<String>,
    pub tokens: Vec<ProgramToken>,
}

impl CampaignTarget {
    pub fn new(campaign_key: impl Into<CampaignKey>, lead_keys: Vec<LeadKey>) -> Self {
        Self {
            campaign_key: campaign_key.into(),
            lead_keys,
            program_name: None,
            tokens: Vec::new(),
        }
    }

    pub fn program_name(mut self, name: impl Into<String>) -> Self {
        self.program_name = Some(name.into());
        self
    }

    /// Adds a program token; tokens are sent in insertion order.
    pub fn token(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tokens.push(ProgramToken {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

// ============ Request Parameters ============

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StringList {
    #[serde(rename = "stringItem")]
    pub string_item: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticListSelector {
    #[serde(rename = "xsi:type")]
    pub selector_type: &'static str,
    #[serde(rename = "staticListName")]
    pub static_list_name: String,
}

/// Parameters of `getMultipleLeads`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMultipleLeadsParams {
    pub lead_selector: StaticListSelector,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_attributes: Option<StringList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_position: Option<String>,
}

impl From<&ListQueryArgs> for GetMultipleLeadsParams {
    fn from(args: &ListQueryArgs) -> Self {
        Self {
            lead_selector: StaticListSelector {
                selector_type: "StaticListSelector",
                static_list_name: args.list_name.clone(),
            },
            include_attributes: args.include_attributes.as_ref().map(|names| StringList {
                string_item: names.iter().cloned().collect(),
            }),
            batch_size: args.batch_size,
            last_updated_at: args
                .last_updated_at
                .map(|at| at.format(TIMESTAMP_FORMAT).to_string()),
            stream_position: args.stream_position.clone(),
        }
    }
}

/// Parameters of `getLead`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetLeadParams {
    pub lead_key: LeadKey,
}

/// Parameters of `syncLead`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLeadParams {
    pub lead_record: LeadRecord,
    pub return_lead: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marketo_cookie: Option<String>,
}

/// Parameters of `getCampaignsForSource`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCampaignsParams {
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact_name: Option<bool>,
}

impl GetCampaignsParams {
    pub fn new(name: Option<&str>) -> Self {
        Self {
            source: CAMPAIGN_SOURCE,
            name: name.map(str::to_string),
            exact_name: name.map(|_| true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramTokenList {
    pub attrib: Vec<ProgramToken>,
}

/// Parameters of `requestCampaign`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCampaignParams {
    pub lead_list: Vec<LeadKey>,
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_token_list: Option<ProgramTokenList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_name: Option<String>,
}

impl From<&CampaignTarget> for RequestCampaignParams {
    fn from(target: &CampaignTarget) -> Self {
        let (campaign_id, campaign_name) = match &target.campaign_key {
            CampaignKey::Id(id) => (Some(*id), None),
            CampaignKey::Name(name) => (None, Some(name.clone())),
        };

        Self {
            lead_list: target.lead_keys.clone(),
            source: CAMPAIGN_SOURCE,
            program_name: target.program_name.clone(),
            program_token_list: (!target.tokens.is_empty()).then(|| ProgramTokenList {
                attrib: target.tokens.clone(),
            }),
            campaign_id,
            campaign_name,
        }
    }
}

// ============ Reply Models ============

/// Reply element that is a bare object for one record and a list for many.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    /// Convert to a vec for uniform processing
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// Lead as handed back to callers: remote identifier fields plus a flat
/// attribute mapping.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NormalizedLead {
    /// Top-level record fields (`Id`, `Email`, `ForeignSysPersonId`, ...).
    pub fields: Map<String, Value>,
    pub attributes: BTreeMap<String, AttrValue>,
}

impl NormalizedLead {
    pub fn id(&self) -> Option<i64> {
        self.fields.get("Id").and_then(value_as_i64)
    }

    pub fn email(&self) -> Option<&str> {
        self.fields.get("Email").and_then(Value::as_str)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }
}

/// One page of a static-list query.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LeadPage {
    pub return_count: Option<i64>,
    pub remaining_count: Option<i64>,
    /// Cursor to pass back as `stream_position` for the next page.
    pub new_stream_position: Option<String>,
    pub leads: Vec<NormalizedLead>,
}

impl LeadPage {
    pub fn has_more(&self) -> bool {
        self.remaining_count.map(|n| n > 0).unwrap_or(false)
    }
}

/// `syncStatus` element of a `syncLead` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    #[serde(rename = "leadId", default, deserialize_with = "lenient_i64")]
    pub lead_id: Option<i64>,
    /// `CREATED`, `UPDATED` or `FAILED`.
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Outcome of an upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncResult {
    pub lead_id: Option<i64>,
    pub sync_status: Option<SyncStatus>,
    pub lead: NormalizedLead,
}

/// Campaign record from `getCampaignsForSource`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    #[serde(deserialize_with = "required_i64")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Reads an integer the transport may have left as a string.
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_i64))
}

fn required_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_as_i64(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected integer, got {}", value)))
}
