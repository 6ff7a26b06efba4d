//! Reachability checks for help-center locators.

use std::time::Duration;

use reqwest::Client;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use groundwork_shared::{Passage, Result, SourceKind, ValidationConfig};
use groundwork_sources::build_client;

/// Drops help-center passages whose locator no longer resolves.
#[derive(Debug, Clone)]
pub struct LinkValidator {
    client: Client,
}

impl LinkValidator {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }

    /// `None` when validation is disabled.
    pub fn from_config(config: &ValidationConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        Self::new(Duration::from_secs(config.timeout_secs)).map(Some)
    }

    /// HEAD the locator; any 2xx (after redirects) counts as reachable.
    pub async fn is_reachable(&self, locator: &str) -> bool {
        check(&self.client, locator).await
    }

    /// Check every help-center passage concurrently, keeping input order.
    ///
    /// Other sources pass through unchecked. Dropping the returned future
    /// aborts checks still in flight.
    #[instrument(skip_all, fields(count = passages.len()))]
    pub async fn validate(&self, passages: Vec<Passage>) -> Vec<Passage> {
        let mut checks = JoinSet::new();
        for (index, passage) in passages.iter().enumerate() {
            if passage.source != SourceKind::PublicDocs {
                continue;
            }
            let client = self.client.clone();
            let locator = passage.locator.clone();
            checks.spawn(async move { (index, check(&client, &locator).await) });
        }

        let mut reachable: Vec<bool> = passages
            .iter()
            .map(|p| p.source != SourceKind::PublicDocs)
            .collect();
        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok((index, ok)) => reachable[index] = ok,
                Err(e) => warn!(error = %e, "link check task failed"),
            }
        }

        let before = passages.len();
        let kept: Vec<Passage> = passages
            .into_iter()
            .zip(reachable)
            .filter_map(|(p, ok)| ok.then_some(p))
            .collect();
        if kept.len() < before {
            debug!(dropped = before - kept.len(), "dropped unreachable passages");
        }
        kept
    }
}

async fn check(client: &Client, locator: &str) -> bool {
    match client.head(locator).send().await {
        Ok(response) if response.status().is_success() => true,
        Ok(response) => {
            debug!(locator, status = response.status().as_u16(), "locator unreachable");
            false
        }
        Err(e) => {
            debug!(locator, error = %e, "locator check failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn passage(source: SourceKind, locator: String) -> Passage {
        Passage::new(source, "Title", locator, "body")
    }

    #[tokio::test]
    async fn drops_unreachable_help_center_links_only() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/live"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/internal"))
            .respond_with(ResponseTemplate::new(404))
            .expect(0)
            .mount(&server)
            .await;

        let validator = LinkValidator::new(Duration::from_secs(3)).unwrap();
        let kept = validator
            .validate(vec![
                passage(SourceKind::PublicDocs, format!("{}/gone", server.uri())),
                passage(SourceKind::InternalPages, format!("{}/internal", server.uri())),
                passage(SourceKind::PublicDocs, format!("{}/live", server.uri())),
            ])
            .await;

        let locators: Vec<String> = kept.into_iter().map(|p| p.locator).collect();
        assert_eq!(
            locators,
            vec![format!("{}/internal", server.uri()), format!("{}/live", server.uri())]
        );
    }

    #[tokio::test]
    async fn checks_run_concurrently_and_time_out() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let validator = LinkValidator::new(Duration::from_millis(500)).unwrap();
        let passages = (0..5)
            .map(|i| passage(SourceKind::PublicDocs, format!("{}/slow/{i}", server.uri())))
            .collect();

        let started = Instant::now();
        assert!(validator.validate(passages).await.is_empty());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn disabled_config_builds_no_validator() {
        let config = ValidationConfig {
            enabled: false,
            ..ValidationConfig::default()
        };
        assert!(LinkValidator::from_config(&config).unwrap().is_none());
    }
}
