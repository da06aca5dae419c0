//! Pricing providers: where instance types, their prices and the time those
//! prices were last refreshed come from.

pub mod aws;
pub mod price_list;

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

pub use self::aws::AwsPricingProvider;

pub trait PricingProvider {
    /// Every instance type the provider knows a price for, on-demand or spot.
    fn instance_types(&self) -> Vec<String>;

    fn on_demand_price(&self, instance_type: &str) -> Option<f64>;

    fn spot_price(&self, instance_type: &str, zone: &str) -> Option<f64>;

    fn on_demand_last_updated(&self) -> Option<DateTime<Utc>>;

    fn spot_last_updated(&self) -> Option<DateTime<Utc>>;
}

/// True once both the on-demand and spot prices were refreshed after `start`.
pub fn refreshed_since<P: PricingProvider + ?Sized>(provider: &P, start: DateTime<Utc>) -> bool {
    let after = |updated: Option<DateTime<Utc>>| updated.map_or(false, |at| at > start);
    after(provider.on_demand_last_updated()) && after(provider.spot_last_updated())
}

/// Spot prices keyed by instance type, then availability zone.
pub type SpotPrices = HashMap<String, HashMap<String, f64>>;

/// Fixed, in-memory prices.
#[derive(Debug, Clone, Default)]
pub struct StaticPricing {
    on_demand: HashMap<String, f64>,
    spot: SpotPrices,
    on_demand_updated: Option<DateTime<Utc>>,
    spot_updated: Option<DateTime<Utc>>,
}

impl StaticPricing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on_demand(mut self, instance_type: impl Into<String>, price: f64) -> Self {
        self.on_demand.insert(instance_type.into(), price);
        self
    }

    pub fn with_spot(mut self, instance_type: impl Into<String>, zone: impl Into<String>, price: f64) -> Self {
        self.spot
            .entry(instance_type.into())
            .or_default()
            .insert(zone.into(), price);
        self
    }

    /// Marks both price categories as refreshed at `at`.
    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.on_demand_updated = Some(at);
        self.spot_updated = Some(at);
        self
    }
}

impl PricingProvider for StaticPricing {
    fn instance_types(&self) -> Vec<String> {
        union_of(&self.on_demand, &self.spot)
    }

    fn on_demand_price(&self, instance_type: &str) -> Option<f64> {
        self.on_demand.get(instance_type).copied()
    }

    fn spot_price(&self, instance_type: &str, zone: &str) -> Option<f64> {
        self.spot.get(instance_type)?.get(zone).copied()
    }

    fn on_demand_last_updated(&self) -> Option<DateTime<Utc>> {
        self.on_demand_updated
    }

    fn spot_last_updated(&self) -> Option<DateTime<Utc>> {
        self.spot_updated
    }
}

pub(crate) fn union_of(on_demand: &HashMap<String, f64>, spot: &SpotPrices) -> Vec<String> {
    on_demand
        .keys()
        .chain(spot.keys())
        .cloned()
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn instance_types_are_the_sorted_union() {
        let pricing = StaticPricing::new()
            .with_on_demand("m5.large", 0.096)
            .with_on_demand("c5.large", 0.085)
            .with_spot("c5.large", "us-east-1a", 0.031)
            .with_spot("inf1.xlarge", "us-east-1b", 0.12);

        assert_eq!(
            pricing.instance_types(),
            vec!["c5.large", "inf1.xlarge", "m5.large"]
        );
        assert_eq!(pricing.on_demand_price("inf1.xlarge"), None);
        assert_eq!(pricing.spot_price("c5.large", "us-east-1a"), Some(0.031));
        assert_eq!(pricing.spot_price("c5.large", "us-east-1b"), None);
    }

    #[test]
    fn refreshed_since_requires_both_timestamps_after_start() {
        let start = Utc::now();
        assert!(!refreshed_since(&StaticPricing::new(), start));
        assert!(!refreshed_since(&StaticPricing::new().updated_at(start), start));
        assert!(refreshed_since(
            &StaticPricing::new().updated_at(start + Duration::seconds(1)),
            start
        ));

        let mut half = StaticPricing::new().updated_at(start + Duration::seconds(1));
        half.spot_updated = Some(start - Duration::seconds(1));
        assert!(!refreshed_since(&half, start));
    }
}
