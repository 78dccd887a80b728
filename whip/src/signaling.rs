//! WHIP HTTP signaling: POST the SDP offer, read back the answer and the
//! resource `Location`, DELETE the resource on teardown.
//!
//! Offer exchange failures are fatal to session setup; a failed DELETE is
//! not — a republish should not be blocked by a signaling server that is
//! slow or unreachable to tear the old resource down.

use crate::error::{Result, WhipError};
use logging::Logger;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, LOCATION};
use whip_sdp::MAX_SDP_SIZE;

pub struct WhipSignaling {
    client: Client,
    endpoint: String,
    authorization: Option<String>,
}

impl WhipSignaling {
    pub fn new(endpoint: impl Into<String>, authorization: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            authorization,
        }
    }

    /// POSTs the SDP offer and returns the resource URL (from `Location`,
    /// resolved against the endpoint if relative) and the answer body.
    pub fn publish(&self, offer: &str, logger: &Logger) -> Result<(String, String)> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(CACHE_CONTROL, "no-cache")
            .header(CONTENT_TYPE, "application/sdp")
            .body(offer.to_string());

        if let Some(token) = &self.authorization {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request
            .send()
            .map_err(|e| WhipError::Io(std::io::Error::other(format!("WHIP POST failed: {e}"))))?;

        if !response.status().is_success() {
            return Err(WhipError::InvalidData(format!(
                "WHIP endpoint rejected offer with status {}",
                response.status()
            )));
        }

        let resource_url = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|location| self.resolve_location(location))
            .unwrap_or_else(|| self.endpoint.clone());

        let answer = response
            .text()
            .map_err(|e| WhipError::Io(std::io::Error::other(format!("failed to read WHIP answer body: {e}"))))?;

        if answer.len() > MAX_SDP_SIZE {
            return Err(WhipError::InvalidData(format!(
                "WHIP answer exceeds {MAX_SDP_SIZE} bytes ({})",
                answer.len()
            )));
        }
        if !answer.starts_with("v=") {
            return Err(WhipError::InvalidData("WHIP answer is not a valid SDP body".to_string()));
        }

        logger.info(&format!("WHIP offer accepted, resource at {resource_url}"));
        Ok((resource_url, answer))
    }

    /// DELETEs the session resource. Failures are logged, never propagated:
    /// a teardown that can't reach the signaling server shouldn't block the
    /// caller from exiting.
    pub fn teardown(&self, resource_url: &str, logger: &Logger) {
        let result = self.client.delete(resource_url).send();
        match result {
            Ok(response) if response.status().is_success() => {
                logger.info(&format!("WHIP resource {resource_url} disposed"));
            }
            Ok(response) => {
                logger.warn(&format!(
                    "WHIP DELETE of {resource_url} returned status {}",
                    response.status()
                ));
            }
            Err(err) => {
                logger.warn(&format!("WHIP DELETE of {resource_url} failed: {err}"));
            }
        }
    }

    fn resolve_location(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            return location.to_string();
        }
        match reqwest::Url::parse(&self.endpoint).and_then(|base| base.join(location)) {
            Ok(resolved) => resolved.to_string(),
            Err(_) => location.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_location_against_endpoint() {
        let signaling = WhipSignaling::new("https://whip.example.com/publish", None);
        let resolved = signaling.resolve_location("/resource/abc123");
        assert_eq!(resolved, "https://whip.example.com/resource/abc123");
    }

    #[test]
    fn absolute_location_is_used_verbatim() {
        let signaling = WhipSignaling::new("https://whip.example.com/publish", None);
        let resolved = signaling.resolve_location("https://other.example.com/r/1");
        assert_eq!(resolved, "https://other.example.com/r/1");
    }
}
