//! Remote decision maker reached over HTTP

use crate::SourceResult;
use meteo_core::{DecisionError, DecisionMaker, DecisionOutcome, DecisionRequest};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Posts the decision request as JSON and reads back the outcome
///
/// Request body: `{polygonId, currentData, newData, threshold}`.
/// Response body: `{updatedData, significantChanges}`.
pub struct HttpDecisionMaker {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpDecisionMaker {
    pub fn new(endpoint: &str, timeout: Duration) -> SourceResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: Url::parse(endpoint)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl DecisionMaker for HttpDecisionMaker {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, request), fields(polygon = %request.polygon_id))]
    async fn evaluate(&self, request: &DecisionRequest) -> Result<DecisionOutcome, DecisionError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DecisionError::Timeout
                } else {
                    DecisionError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DecisionError::Unavailable(format!("status {}", status)));
        }

        let outcome: DecisionOutcome = response
            .json()
            .await
            .map_err(|e| DecisionError::InvalidResponse(e.to_string()))?;
        debug!(significant = outcome.significant_changes, "decision received");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meteo_core::PolygonId;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> DecisionRequest {
        DecisionRequest {
            polygon_id: PolygonId::new("p1"),
            current_data: vec![10.0, 11.0],
            new_data: vec![14.0],
            threshold: 1.0,
        }
    }

    #[tokio::test]
    async fn test_evaluate() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/decide"))
            .and(body_json(json!({
                "polygonId": "p1",
                "currentData": [10.0, 11.0],
                "newData": [14.0],
                "threshold": 1.0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "updatedData": [14.0],
                "significantChanges": true
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let maker = HttpDecisionMaker::new(
            &format!("{}/decide", mock_server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();

        let outcome = maker.evaluate(&request()).await.unwrap();
        assert_eq!(
            outcome,
            DecisionOutcome {
                updated_data: vec![14.0],
                significant_changes: true
            }
        );
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let maker = HttpDecisionMaker::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            maker.evaluate(&request()).await,
            Err(DecisionError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_garbage_response_is_invalid() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "yes"})))
            .mount(&mock_server)
            .await;

        let maker = HttpDecisionMaker::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            maker.evaluate(&request()).await,
            Err(DecisionError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"updatedData": [], "significantChanges": false}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let maker =
            HttpDecisionMaker::new(&mock_server.uri(), Duration::from_millis(50)).unwrap();
        assert_eq!(maker.evaluate(&request()).await, Err(DecisionError::Timeout));
    }
}
