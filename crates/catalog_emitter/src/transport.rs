use core::future::Future;
use core::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use crate::EmitError;

/// Per-request timeout for catalog calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// The two catalog operations the emitter relies on.
pub trait CatalogTransport {
    /// Ingests one snapshot payload. Ingestion is idempotent on the catalog
    /// side: resubmitting a payload overwrites the same aspects.
    fn ingest(&self, payload: &Value) -> impl Future<Output = Result<(), EmitError>> + Send;

    /// Reads an entity by URN; `None` if the catalog does not know it.
    fn get_entity(&self, urn: &str) -> impl Future<Output = Result<Option<Value>, EmitError>> + Send;
}

/// REST transport for the catalog's metadata service.
pub struct HttpTransport {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpTransport {
    /// Creates a transport for the service at `gms_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be created.
    pub fn new(gms_url: &str, token: Option<&str>) -> Result<Self, EmitError> {
        let base = Url::parse(gms_url.trim_end_matches('/'))
            .map_err(|e| EmitError::Transport(format!("invalid catalog URL {gms_url:?}: {e}")))?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base,
            token: token.map(str::to_string),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, EmitError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| EmitError::Transport(format!("catalog URL {} cannot have a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `{base}/entities/<urn>` with every reserved character of the URN
    /// percent-encoded, so the catalog reads it as a single key.
    fn entity_url(&self, urn: &str) -> Result<Url, EmitError> {
        let mut url = self.url(&["entities"])?;
        let path = format!("{}/{}", url.path(), urlencoding::encode(urn));
        url.set_path(&path);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("X-RestLi-Protocol-Version", "2.0.0");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl CatalogTransport for HttpTransport {
    async fn ingest(&self, payload: &Value) -> Result<(), EmitError> {
        let mut url = self.url(&["entities"])?;
        url.set_query(Some("action=ingest"));

        let response = self
            .authorize(self.client.post(url))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmitError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    async fn get_entity(&self, urn: &str) -> Result<Option<Value>, EmitError> {
        let url = self.entity_url(urn)?;
        debug!(%url, "Reading entity");

        let response = self.authorize(self.client.get(url)).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmitError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Some(response.json().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_url_encodes_urn() {
        let transport = HttpTransport::new("http://localhost:9002/api/gms/", None).unwrap();

        let url = transport
            .entity_url("urn:li:mlModel:(urn:li:dataPlatform:llm,OpenAI/gpt-4,PROD)")
            .unwrap();

        assert_eq!(
            url.as_str(),
            "http://localhost:9002/api/gms/entities/\
             urn%3Ali%3AmlModel%3A%28urn%3Ali%3AdataPlatform%3Allm%2COpenAI%2Fgpt-4%2CPROD%29"
        );
    }

    #[test]
    fn test_entity_url_is_one_segment() {
        let transport = HttpTransport::new("http://localhost:8080", None).unwrap();

        let url = transport
            .entity_url("urn:li:mlModel:(urn:li:dataPlatform:llm,proj_gpt-4,PROD)")
            .unwrap();

        let segments: Vec<&str> = url.path_segments().unwrap().collect();
        assert_eq!(segments.len(), 2);
        assert!(!segments[1].contains([',', ':', '(', ')']));
    }

    #[test]
    fn test_ingest_url() {
        let transport = HttpTransport::new("http://localhost:8080", None).unwrap();

        let url = transport.url(&["entities"]).unwrap();

        assert_eq!(url.as_str(), "http://localhost:8080/entities");
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            HttpTransport::new("not a url", None),
            Err(EmitError::Transport(_))
        ));
    }
}
