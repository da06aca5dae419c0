//! Parsing of the JSON documents returned in the pricing API's `PriceList`.

use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Deserialize, Debug)]
struct PriceListItem {
    product: Product,
    terms: Terms,
}

#[derive(Deserialize, Debug)]
struct Product {
    attributes: Attributes,
}

#[derive(Deserialize, Debug)]
struct Attributes {
    #[serde(rename = "instanceType")]
    instance_type: String,
}

#[derive(Deserialize, Debug)]
struct Terms {
    #[serde(rename = "OnDemand", default)]
    on_demand: BTreeMap<String, Term>,
}

#[derive(Deserialize, Debug)]
struct Term {
    #[serde(rename = "priceDimensions")]
    price_dimensions: BTreeMap<String, PriceDimension>,
}

#[derive(Deserialize, Debug)]
struct PriceDimension {
    #[serde(rename = "pricePerUnit")]
    price_per_unit: BTreeMap<String, String>,
}

/// Extracts `(instance type, USD hourly price)` from one price list document.
///
/// Returns `None` for documents that don't describe a priced instance type,
/// including zero-priced entries.
pub fn on_demand_price(document: &str) -> Option<(String, f64)> {
    let item: PriceListItem = serde_json::from_str(document).ok()?;
    let price = item
        .terms
        .on_demand
        .values()
        .flat_map(|term| term.price_dimensions.values())
        .find_map(|dimension| dimension.price_per_unit.get("USD"))
        .and_then(|usd| usd.parse::<f64>().ok())?;

    if price == 0.0 || item.product.attributes.instance_type.is_empty() {
        return None;
    }
    Some((item.product.attributes.instance_type, price))
}
