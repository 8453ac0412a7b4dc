use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use shared::error::ApiFailure;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin JSON client for the catering API. Every request carries the bearer
/// token once one is set; non-success responses become [`ApiFailure`].
pub struct ApiClient {
    http: Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid API base url '{base_url}'"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("API base url '{base_url}' cannot carry a path"));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Base url extended with `segments`, each percent-encoded on its own.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("API base url '{}' cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        self.get_with_query(segments, &()).await
    }

    pub async fn get_with_query<T, Q>(&self, segments: &[&str], query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let builder = self.request(Method::GET, segments).await?.query(query);
        let response = self.execute(Method::GET, segments, builder).await?;
        decode(response).await
    }

    pub async fn send<B, T>(&self, method: Method, segments: &[&str], body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(method.clone(), segments).await?.json(body);
        let response = self.execute(method, segments, builder).await?;
        decode(response).await
    }

    pub async fn send_discarding<B>(&self, method: Method, segments: &[&str], body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let builder = self.request(method.clone(), segments).await?.json(body);
        self.execute(method, segments, builder).await?;
        Ok(())
    }

    pub async fn delete(&self, segments: &[&str]) -> Result<()> {
        let builder = self.request(Method::DELETE, segments).await?;
        self.execute(Method::DELETE, segments, builder).await?;
        Ok(())
    }

    async fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.endpoint(segments)?;
        let mut builder = self.http.request(method, url);
        if let Some(token) = self.token.read().await.as_deref() {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn execute(
        &self,
        method: Method,
        segments: &[&str],
        builder: RequestBuilder,
    ) -> Result<Response> {
        let request_id = Uuid::new_v4();
        let path = segments.join("/");
        debug!(%request_id, %method, path, "api: sending request");

        let response = builder
            .header("x-request-id", request_id.to_string())
            .send()
            .await
            .with_context(|| format!("{method} /{path} could not reach the server"))?;
        let status = response.status();
        if status.is_success() {
            debug!(%request_id, status = status.as_u16(), "api: request succeeded");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let failure = ApiFailure::from_body(
            status.as_u16(),
            &body,
            status.canonical_reason().unwrap_or("request failed"),
        );
        warn!(
            %request_id,
            %method,
            path,
            status = failure.status,
            message = %failure.message,
            "api: request rejected"
        );
        Err(failure.into())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let url = response.url().clone();
    response
        .json::<T>()
        .await
        .with_context(|| format!("unexpected response body from {url}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_encodes_each_segment() {
        let api = ApiClient::new("http://localhost:5000/api", DEFAULT_REQUEST_TIMEOUT).expect("api");
        let url = api
            .endpoint(&["menu", "categories", "Hot Drinks/Tea"])
            .expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:5000/api/menu/categories/Hot%20Drinks%2FTea"
        );
    }

    #[test]
    fn endpoint_tolerates_trailing_slash_on_base() {
        let api = ApiClient::new("http://localhost:5000/api/", DEFAULT_REQUEST_TIMEOUT).expect("api");
        let url = api.endpoint(&["work", "w1"]).expect("url");
        assert_eq!(url.as_str(), "http://localhost:5000/api/work/w1");
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(ApiClient::new("not a url", DEFAULT_REQUEST_TIMEOUT).is_err());
        assert!(ApiClient::new("mailto:ops@example.com", DEFAULT_REQUEST_TIMEOUT).is_err());
    }
}
