//! The guest HTTP session shared by every request of a run.

use tracing::{debug, info, warn};
use url::Url;

use crate::{config::Config, error::Result};

/// Login form endpoint, relative to the portal base.
pub const LOGIN_PATH: &str = "bits-cms/login/index.php";
/// Course index page, relative to the portal base.
pub const INDEX_PATH: &str = "bits-cms/";

const GUEST_USERNAME: &str = "guest";
const GUEST_PASSWORD: &str = "guest";

/// A fetched HTML page and the URL it was finally served from.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub body: String,
}

/// Cookie-carrying client bound to one portal.
///
/// Cookies set by [`login`](Self::login) are replayed on every later request,
/// so all fetches of a run must go through the same session.
#[derive(Debug)]
pub struct Session {
    client: reqwest::Client,
    portal: Url,
}

impl Session {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .connect_timeout(config.request_timeout)
            .read_timeout(config.request_timeout)
            .user_agent(concat!("coursesync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            portal: config.portal.clone(),
        })
    }

    /// Logs in with the guest credentials.
    ///
    /// # Errors
    ///
    /// Fails only when the portal cannot be reached; an unexpected status is
    /// logged and left for the following requests to expose.
    pub async fn login(&self) -> Result<()> {
        let url = self.portal.join(LOGIN_PATH)?;
        info!("logging in as guest at {url}");
        let response = self
            .client
            .post(url)
            .form(&[("username", GUEST_USERNAME), ("password", GUEST_PASSWORD)])
            .send()
            .await?;
        if !response.status().is_success() {
            warn!("guest login answered {}", response.status());
        }
        Ok(())
    }

    pub fn index_url(&self) -> Result<Url> {
        Ok(self.portal.join(INDEX_PATH)?)
    }

    /// Fetches an HTML page. Non-success statuses are errors.
    pub async fn page(&self, url: &Url) -> Result<Page> {
        let response = self.fetch(url).await?;
        let url = response.url().clone();
        let body = response.text().await?;
        Ok(Page { url, body })
    }

    /// Starts a GET for `url`, leaving the body unread.
    pub async fn fetch(&self, url: &Url) -> Result<reqwest::Response> {
        debug!("GET {url}");
        let response = self.client.get(url.clone()).send().await?;
        Ok(response.error_for_status()?)
    }
}
