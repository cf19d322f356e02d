use crate::error::{ErrorKind, Result};
use crate::retry::RetryPolicy;
use crate::source::{FeedSource, parse_shard};
use async_trait::async_trait;
use exn::ResultExt;
use tracing::instrument;
use vigil_config::FeedConfig;

const PLACEHOLDER: &str = "{shard}";

/// The VirusShare hash lists, over HTTP(S).
pub struct HttpFeed {
    client: reqwest::Client,
    url_template: String,
    shards: u32,
    retry: RetryPolicy,
}

impl HttpFeed {
    pub fn new(config: &FeedConfig, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .or_raise(|| ErrorKind::Network)?;
        Ok(Self {
            client,
            url_template: config.url_template.clone(),
            shards: config.shards,
            retry,
        })
    }

    /// Address of shard `index`, zero-padded to five digits.
    pub fn shard_url(&self, index: u32) -> String {
        self.url_template.replace(PLACEHOLDER, &format!("{index:05}"))
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await.or_raise(|| ErrorKind::Network)?;
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::Status(status.as_u16()));
        }
        response.text().await.or_raise(|| ErrorKind::Network)
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    fn name(&self) -> &str {
        "http"
    }

    fn shard_count(&self) -> u32 {
        self.shards
    }

    #[instrument(skip(self))]
    async fn fetch(&self, index: u32) -> Result<Vec<String>> {
        if index >= self.shards {
            exn::bail!(ErrorKind::NoSuchShard(index));
        }
        let url = self.shard_url(index);
        let body = self.retry.run(|| self.fetch_once(&url)).await?;
        Ok(parse_shard(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn feed(template: &str) -> HttpFeed {
        let config = FeedConfig {
            url_template: template.to_string(),
            ..FeedConfig::default()
        };
        HttpFeed::new(&config, RetryPolicy::none()).unwrap()
    }

    #[rstest]
    #[case(0, "https://virusshare.com/hashfiles/VirusShare_00000.md5")]
    #[case(7, "https://virusshare.com/hashfiles/VirusShare_00007.md5")]
    #[case(487, "https://virusshare.com/hashfiles/VirusShare_00487.md5")]
    #[case(123456, "https://virusshare.com/hashfiles/VirusShare_123456.md5")]
    fn test_shard_url(#[case] index: u32, #[case] expected: &str) {
        let feed = feed(vigil_config::DEFAULT_URL_TEMPLATE);
        assert_eq!(feed.shard_url(index), expected);
    }

    #[tokio::test]
    async fn test_out_of_range_shard() {
        let feed = feed("http://127.0.0.1:9/{shard}");
        let err = feed.fetch(488).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NoSuchShard(488)));
    }

    #[tokio::test]
    async fn test_unreachable_feed_is_a_network_error() {
        // Port 9 is "discard"; nothing listens there on a test machine.
        let feed = feed("http://127.0.0.1:9/{shard}");
        let err = feed.fetch(0).await.unwrap_err();
        // One attempt only, so the transport error surfaces wrapped in the
        // exhaustion error.
        assert!(matches!(&*err, ErrorKind::RetriesExhausted(1)));
    }
}
