use crate::render::write_pricing;
use chrono::{DateTime, SecondsFormat, Utc};
use failure::Error;
use gtmpl::template;
use gtmpl_derive::Gtmpl;

include!(concat!(env!("OUT_DIR"), "/header_template.rs"));

/// Name of the generated on-demand price map.
pub const ON_DEMAND_VAR: &str = "initialOnDemandPrices";

#[derive(Debug, Clone)]
pub struct Header {
    pub package: String,
    pub region: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Gtmpl)]
struct Context {
    package: String,
    region: String,
    generated_at: String,
}

pub fn render_header(header: &Header) -> Result<String, Error> {
    let context = Context {
        package: header.package.clone(),
        region: header.region.clone(),
        generated_at: header
            .generated_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    };

    let src = template(HEADER_TEMPLATE, context)?;
    Ok(src)
}

/// Renders the complete, unformatted Go file: header followed by the
/// on-demand price map. Returns the source and the number of priced entries.
pub fn render_source<I, S, F>(
    header: &Header,
    instance_types: I,
    lookup: F,
) -> Result<(String, usize), Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: Fn(&str) -> Option<f64>,
{
    let mut src = render_header(header)?;
    let entries = write_pricing(&mut src, instance_types, ON_DEMAND_VAR, lookup)?;
    Ok((src, entries))
}
