use std::sync::Arc;

use http::Extensions;
use reqwest::{header, Request, Response};
use reqwest_middleware::{Middleware, Next};
use tracing::warn;

use crate::auth::source::ServiceAccountTokenSource;

/// Authorizes every outgoing request with a freshly exchanged access token.
#[derive(Clone)]
pub struct AuthMiddleware {
    tokens: Arc<ServiceAccountTokenSource>,
}

impl AuthMiddleware {
    pub fn new(tokens: Arc<ServiceAccountTokenSource>) -> Self {
        Self { tokens }
    }

    async fn get_token(&self) -> Result<String, anyhow::Error> {
        let token = self.tokens.access_token().await?;
        Ok(token.as_str().to_string())
    }
}

#[async_trait::async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let token = self.get_token().await.map_err(|e| {
            warn!(url = %req.url(), error = %e, "could not authorize request");
            reqwest_middleware::Error::Middleware(anyhow::anyhow!("Failed to get auth token: {}", e))
        })?;

        let value = header::HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
            reqwest_middleware::Error::Middleware(anyhow::anyhow!("Invalid auth token: {}", e))
        })?;
        req.headers_mut().insert(header::AUTHORIZATION, value);

        next.run(req, extensions).await
    }
}
