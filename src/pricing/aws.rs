use super::{price_list, union_of, PricingProvider, SpotPrices};
use arc_swap::{ArcSwap, ArcSwapOption};
use aws_sdk_ec2::{model::SpotPrice, types::DateTime as SdkDateTime, Client as Ec2Client};
use aws_sdk_pricing::{
    model::{Filter, FilterType},
    Client as PricingClient,
};
use chrono::{DateTime, Utc};
use failure::Error;
use std::{collections::HashMap, sync::Arc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

const EC2_SERVICE_CODE: &str = "AmazonEC2";
const SPOT_PRODUCT_DESCRIPTIONS: [&str; 2] = ["Linux/UNIX", "Linux/UNIX (Amazon VPC)"];

/// The pricing API is only served from a handful of regions.
pub fn pricing_api_region(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "cn-northwest-1"
    } else if region.starts_with("ap-") {
        "ap-south-1"
    } else {
        "us-east-1"
    }
}

#[derive(Default)]
struct PricingState {
    on_demand: ArcSwap<HashMap<String, f64>>,
    spot: ArcSwap<SpotPrices>,
    on_demand_updated: ArcSwapOption<DateTime<Utc>>,
    spot_updated: ArcSwapOption<DateTime<Utc>>,
}

/// Prices fetched from the AWS pricing and EC2 APIs.
///
/// On-demand and spot prices are fetched on their own background tasks, started
/// by [`AwsPricingProvider::start`]. Until a fetch succeeds its price category
/// is empty and its "last updated" timestamp is unset.
pub struct AwsPricingProvider {
    region: String,
    state: Arc<PricingState>,
    tasks: Vec<JoinHandle<()>>,
}

impl AwsPricingProvider {
    /// Loads the shared AWS config for `region` and starts fetching prices.
    pub async fn from_env(region: &str) -> Self {
        let shared_config = aws_config::from_env()
            .region(aws_sdk_ec2::Region::new(region.to_string()))
            .load()
            .await;
        let ec2 = Ec2Client::new(&shared_config);
        let pricing_config = aws_sdk_pricing::config::Builder::from(&shared_config)
            .region(aws_sdk_pricing::Region::new(pricing_api_region(region)))
            .build();
        let pricing = PricingClient::from_conf(pricing_config);
        Self::start(pricing, ec2, region)
    }

    /// Spawns the on-demand and spot refreshes. Must be called within a tokio runtime.
    pub fn start(pricing: PricingClient, ec2: Ec2Client, region: impl Into<String>) -> Self {
        let region = region.into();
        let state = Arc::new(PricingState::default());

        let on_demand_task = {
            let state = state.clone();
            let region = region.clone();
            tokio::spawn(async move {
                match fetch_on_demand_prices(&pricing, &region).await {
                    Ok(prices) => {
                        info!(instance_types = prices.len(), "updated on-demand pricing");
                        state.on_demand.store(Arc::new(prices));
                        state.on_demand_updated.store(Some(Arc::new(Utc::now())));
                    }
                    Err(e) => error!("updating on-demand pricing, {}", e),
                }
            })
        };

        let spot_task = {
            let state = state.clone();
            tokio::spawn(async move {
                match fetch_spot_prices(&ec2).await {
                    Ok(prices) => {
                        info!(instance_types = prices.len(), "updated spot pricing");
                        state.spot.store(Arc::new(prices));
                        state.spot_updated.store(Some(Arc::new(Utc::now())));
                    }
                    Err(e) => error!("updating spot pricing, {}", e),
                }
            })
        };

        AwsPricingProvider {
            region,
            state,
            tasks: vec![on_demand_task, spot_task],
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

impl Drop for AwsPricingProvider {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl PricingProvider for AwsPricingProvider {
    fn instance_types(&self) -> Vec<String> {
        union_of(&self.state.on_demand.load(), &self.state.spot.load())
    }

    fn on_demand_price(&self, instance_type: &str) -> Option<f64> {
        self.state.on_demand.load().get(instance_type).copied()
    }

    fn spot_price(&self, instance_type: &str, zone: &str) -> Option<f64> {
        self.state.spot.load().get(instance_type)?.get(zone).copied()
    }

    fn on_demand_last_updated(&self) -> Option<DateTime<Utc>> {
        self.state.on_demand_updated.load_full().map(|at| *at)
    }

    fn spot_last_updated(&self) -> Option<DateTime<Utc>> {
        self.state.spot_updated.load_full().map(|at| *at)
    }
}

fn term_match(field: &str, value: &str) -> Filter {
    Filter::builder()
        .r#type(FilterType::TermMatch)
        .field(field)
        .value(value)
        .build()
}

fn on_demand_filters(region: &str) -> Vec<Filter> {
    vec![
        term_match("regionCode", region),
        term_match("serviceCode", EC2_SERVICE_CODE),
        term_match("preInstalledSw", "NA"),
        term_match("operatingSystem", "Linux"),
        term_match("capacitystatus", "Used"),
        term_match("marketoption", "OnDemand"),
        term_match("tenancy", "Shared"),
    ]
}

#[instrument(level = "debug", skip(client))]
async fn fetch_on_demand_prices(
    client: &PricingClient,
    region: &str,
) -> Result<HashMap<String, f64>, Error> {
    let filters = on_demand_filters(region);
    let mut prices = HashMap::new();
    let mut skipped = 0;
    let mut next_token: Option<String> = None;
    loop {
        let resp = client
            .get_products()
            .service_code(EC2_SERVICE_CODE)
            .format_version("aws_v1")
            .set_filters(Some(filters.clone()))
            .set_next_token(next_token.take())
            .send()
            .await?;
        for document in resp.price_list().unwrap_or_default() {
            match price_list::on_demand_price(document) {
                Some((instance_type, price)) => {
                    prices.insert(instance_type, price);
                }
                None => skipped += 1,
            }
        }
        next_token = resp.next_token().map(str::to_string);
        if next_token.is_none() {
            break;
        }
    }
    debug!(skipped, "skipped price list entries without an on-demand price");

    if prices.is_empty() {
        return Err(failure::err_msg(format!(
            "no on-demand pricing found for region {}",
            region
        )));
    }
    Ok(prices)
}

#[instrument(level = "debug", skip(client))]
async fn fetch_spot_prices(client: &Ec2Client) -> Result<SpotPrices, Error> {
    let started = Utc::now().timestamp();
    let mut history: Vec<SpotPrice> = vec![];
    let mut next_token: Option<String> = None;
    loop {
        let mut request = client
            .describe_spot_price_history()
            .start_time(SdkDateTime::from_secs(started))
            .set_next_token(next_token.take());
        for description in SPOT_PRODUCT_DESCRIPTIONS {
            request = request.product_descriptions(description);
        }
        let resp = request.send().await?;
        history.extend(resp.spot_price_history().unwrap_or_default().iter().cloned());
        next_token = resp
            .next_token()
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        if next_token.is_none() {
            break;
        }
    }

    let prices = latest_spot_prices(&history);
    if prices.is_empty() {
        return Err(failure::err_msg("no spot pricing found"));
    }
    Ok(prices)
}

/// Keeps the most recent price per instance type and availability zone.
fn latest_spot_prices(history: &[SpotPrice]) -> SpotPrices {
    let mut latest: HashMap<(String, String), ((i64, u32), f64)> = HashMap::new();
    for entry in history {
        let (instance_type, zone, price, timestamp) = match (
            entry.instance_type(),
            entry.availability_zone(),
            entry.spot_price(),
            entry.timestamp(),
        ) {
            (Some(instance_type), Some(zone), Some(price), Some(timestamp)) => {
                (instance_type, zone, price, timestamp)
            }
            _ => continue,
        };
        let price = match price.parse::<f64>() {
            Ok(price) => price,
            Err(_) => continue,
        };

        let at = (timestamp.secs(), timestamp.subsec_nanos());
        let key = (instance_type.as_str().to_string(), zone.to_string());
        match latest.get(&key) {
            Some((seen, _)) if *seen >= at => {}
            _ => {
                latest.insert(key, (at, price));
            }
        }
    }

    let mut prices = SpotPrices::new();
    for ((instance_type, zone), (_, price)) in latest {
        prices.entry(instance_type).or_default().insert(zone, price);
    }
    prices
}
