use crate::gofmt::SourceFormatter;
use crate::header::{render_source, Header};
use crate::output::write_atomic;
use crate::pricing::{refreshed_since, PricingProvider};
use crate::wait::wait_until;
use chrono::{DateTime, Utc};
use failure::Error;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Where the formatted Go file is written.
    pub output: PathBuf,
    pub region: String,
    /// Go package clause of the generated file.
    pub package: String,
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,
}

/// Waits for `provider` to refresh after `update_started`, then renders,
/// formats and writes the on-demand price table. Returns the number of
/// priced instance types written.
#[instrument(level = "debug", skip(provider, formatter, cancel))]
pub async fn generate<P, F, C>(
    provider: &P,
    formatter: &F,
    options: &GenerateOptions,
    update_started: DateTime<Utc>,
    cancel: C,
) -> Result<usize, Error>
where
    P: PricingProvider,
    F: SourceFormatter,
    C: Future<Output = ()>,
{
    wait_until(
        "pricing update",
        options.poll_interval,
        options.timeout,
        cancel,
        || refreshed_since(provider, update_started),
    )
    .await?;

    let header = Header {
        package: options.package.clone(),
        region: options.region.clone(),
        generated_at: Utc::now(),
    };
    let instance_types = provider.instance_types();
    let (src, entries) = render_source(&header, &instance_types, |instance_type| {
        provider.on_demand_price(instance_type)
    })?;
    info!(
        instance_types = instance_types.len(),
        entries, "rendered on-demand pricing"
    );

    let formatted = formatter.format(&src).await?;
    write_atomic(&options.output, formatted.as_bytes())?;
    info!("pricing written to {}", options.output.display());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gofmt::Identity;
    use crate::pricing::StaticPricing;
    use crate::wait::WaitError;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::fs;
    use std::future::pending;
    use tempfile::TempDir;

    fn options(dir: &TempDir) -> GenerateOptions {
        GenerateOptions {
            output: dir.path().join("zz_generated.pricing.go"),
            region: "us-east-1".to_string(),
            package: "aws".to_string(),
            poll_interval: Duration::from_millis(5),
            timeout: Some(Duration::from_millis(50)),
        }
    }

    #[tokio::test]
    async fn writes_header_and_on_demand_table() {
        let dir = TempDir::new().unwrap();
        let started = Utc::now();
        let provider = StaticPricing::new()
            .with_on_demand("c5.large", 0.085)
            .with_on_demand("c5.xlarge", 0.17)
            .with_on_demand("m5.large", 0.096)
            .with_spot("inf1.xlarge", "us-east-1a", 0.07)
            .updated_at(started + ChronoDuration::seconds(1));
        let options = options(&dir);

        let entries = generate(&provider, &Identity, &options, started, pending())
            .await
            .unwrap();
        assert_eq!(entries, 3);

        let src = fs::read_to_string(&options.output).unwrap();
        assert!(src.starts_with("//go:build !ignore_autogenerated\npackage aws\nimport \"time\"\n"));
        assert!(src.contains(" for us-east-1\n"));
        assert!(src.contains(
            "var initialOnDemandPrices = map[string]float64{\n\
             // c5 family\n\
             \"c5.large\":0.085000, \"c5.xlarge\":0.170000, \n\
             // m5 family\n\
             \"m5.large\":0.096000, \n\
             }\n\n"
        ));
        assert!(!src.contains("inf1"));
    }

    #[tokio::test]
    async fn stale_prices_time_out_without_output() {
        let dir = TempDir::new().unwrap();
        let started = Utc::now();
        let provider = StaticPricing::new()
            .with_on_demand("m5.large", 0.096)
            .updated_at(started - ChronoDuration::seconds(1));
        let options = options(&dir);

        let err = generate(&provider, &Identity, &options, started, pending())
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<WaitError>().is_some());
        assert!(!options.output.exists());
    }

    #[tokio::test]
    async fn malformed_instance_type_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let started = Utc::now();
        let provider = StaticPricing::new()
            .with_on_demand("m5.large", 0.096)
            .with_on_demand("m5", 0.1)
            .updated_at(started + ChronoDuration::seconds(1));
        let options = options(&dir);
        fs::write(&options.output, "previous").unwrap();

        let err = generate(&provider, &Identity, &options, started, pending())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("parsing instance family m5"));
        assert_eq!(fs::read_to_string(&options.output).unwrap(), "previous");
    }

    struct Tagged;

    #[async_trait]
    impl SourceFormatter for Tagged {
        async fn format(&self, src: &str) -> Result<String, Error> {
            Ok(format!("{}// formatted\n", src))
        }
    }

    #[tokio::test]
    async fn writes_formatter_output() {
        let dir = TempDir::new().unwrap();
        let started = Utc::now();
        let provider = StaticPricing::new()
            .with_on_demand("m5.large", 0.096)
            .updated_at(started + ChronoDuration::seconds(1));
        let options = options(&dir);

        generate(&provider, &Tagged, &options, started, pending())
            .await
            .unwrap();
        let src = fs::read_to_string(&options.output).unwrap();
        assert!(src.ends_with("}\n\n// formatted\n"));
    }

    struct Broken;

    #[async_trait]
    impl SourceFormatter for Broken {
        async fn format(&self, _src: &str) -> Result<String, Error> {
            Err(failure::err_msg("expected declaration"))
        }
    }

    #[tokio::test]
    async fn formatting_failure_leaves_target_alone() {
        let dir = TempDir::new().unwrap();
        let started = Utc::now();
        let provider = StaticPricing::new()
            .with_on_demand("m5.large", 0.096)
            .updated_at(started + ChronoDuration::seconds(1));
        let options = options(&dir);

        let err = generate(&provider, &Broken, &options, started, pending())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "expected declaration");
        assert!(!options.output.exists());
    }
}
