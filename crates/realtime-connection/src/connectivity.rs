use std::time::Duration;

use async_trait::async_trait;

/// The boundary the retry path consults before restarting a connect
/// attempt. Pulled out as a trait, rather than calling `ConnectivityProbe`
/// directly, so tests can force either outcome without a real HTTP request.
#[async_trait]
pub trait ConnectivityCheck: Send + Sync {
	async fn check(&self) -> bool;
}

/// The real endpoint Ably's own clients probe, and the one whose response
/// body is special-cased to a literal "yes" check. A custom
/// `connectivity_check_url` is only checked for a successful status code,
/// since only this default endpoint guarantees the "yes" body contract.
pub const DEFAULT_CONNECTIVITY_CHECK_URL: &str = "https://internet-up.ably-realtime.com/is-the-internet-up.txt";

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Probes general internet reachability before committing to a connection
/// attempt.
#[derive(Debug, Clone)]
pub struct ConnectivityProbe {
	client: reqwest::Client,
	url: String,
}

impl ConnectivityProbe {
	#[must_use]
	pub fn new(url: String) -> Self {
		Self { client: reqwest::Client::new(), url }
	}

	#[must_use]
	pub fn default_url() -> Self {
		Self::new(DEFAULT_CONNECTIVITY_CHECK_URL.to_string())
	}

	/// Returns `true` only if the endpoint is reachable and, for the default
	/// URL, its body contains "yes". Any transport error, non-2xx status, or
	/// read failure counts as unreachable rather than propagating an error —
	/// the caller only needs a boolean to decide whether to keep retrying.
	async fn check_inner(&self) -> bool {
		let response = match self.client.get(&self.url).timeout(CHECK_TIMEOUT).send().await {
			Ok(response) => response,
			Err(error) => {
				tracing::debug!(%error, url = %self.url, "connectivity check request failed");
				return false;
			}
		};

		if !response.status().is_success() {
			tracing::debug!(status = %response.status(), url = %self.url, "connectivity check got non-2xx");
			return false;
		}

		if self.url != DEFAULT_CONNECTIVITY_CHECK_URL {
			return true;
		}

		match response.text().await {
			Ok(body) => body.trim() == "yes",
			Err(error) => {
				tracing::debug!(%error, "connectivity check body read failed");
				false
			}
		}
	}
}

#[async_trait]
impl ConnectivityCheck for ConnectivityProbe {
	async fn check(&self) -> bool {
		self.check_inner().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_url_is_the_ably_internet_check() {
		let probe = ConnectivityProbe::default_url();
		assert_eq!(probe.url, DEFAULT_CONNECTIVITY_CHECK_URL);
	}
}
