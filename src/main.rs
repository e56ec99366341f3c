//! Command-line access to the lead and campaign operations.
//!
//! ```text
//! mktows lead <key-type> <key-value>
//! mktows list <static-list-name> [batch-size]
//! mktows campaigns [exact-name]
//! mktows enroll <campaign-id-or-name> <key-type>=<key-value>...
//! ```

use mktows_client::config::Config;
use mktows_client::models::{CampaignTarget, LeadKey, ListQueryArgs};
use mktows_client::MktowsClient;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: mktows <lead|list|campaigns|enroll> [args...]";

/// Main entry point for the CLI.
///
/// Loads configuration from the environment, runs one operation and prints
/// the result as JSON. "No records" prints `null`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mktows_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or_default();

    let config = Config::from_env()?;
    let client = MktowsClient::from_config(&config)?;

    let rest = args.get(1..).unwrap_or_default();

    match (command, rest) {
        ("lead", [key_type, key_value]) => {
            print_json(&client.get_lead_by(key_type, key_value).await?)?;
        }
        ("list", [list_name, extra @ ..]) => {
            let mut query = ListQueryArgs::new(list_name.as_str());
            if let Some(size) = extra.first() {
                query = query.batch_size(
                    size.parse()
                        .map_err(|_| anyhow::anyhow!("batch size must be a number"))?,
                );
            }
            print_json(&client.get_lead_page(&query).await?)?;
        }
        ("campaigns", []) => print_json(&client.get_campaigns(None).await?)?,
        ("campaigns", [name]) => print_json(&client.get_campaigns(Some(name.as_str())).await?)?,
        ("enroll", [campaign, keys @ ..]) if !keys.is_empty() => {
            let pairs = keys
                .iter()
                .map(|pair| {
                    pair.split_once('=')
                        .ok_or_else(|| anyhow::anyhow!("lead key '{}' must be type=value", pair))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            let lead_keys = LeadKey::from_mapping(pairs)?;
            let target = CampaignTarget::new(campaign.as_str(), lead_keys);
            print_json(&client.request_campaign(&target).await?)?;
        }
        _ => anyhow::bail!(USAGE),
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
