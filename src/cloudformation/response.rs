use reqwest::header;
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use super::model::CloudFormationResponse;

/// Failure to deliver a response to CloudFormation.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to send response: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CloudFormation response failed with {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

/// PUTs `response` to the presigned `url`. Single attempt.
pub async fn send(client: &reqwest::Client, url: Url, response: &CloudFormationResponse) -> Result<(), SignalError> {
    let response_json = serde_json::to_vec(response)?;
    debug!("sending {} bytes to {}", response_json.len(), url.path());

    // The presigned URL is signed without a content type
    let reply = client
        .put(url)
        .header(header::CONTENT_TYPE, "")
        .body(response_json)
        .send()
        .await?;

    let status = reply.status();
    if status.is_success() {
        Ok(())
    } else {
        let body = reply.text().await.unwrap_or_default();
        error!("S3 response: {} {}", status, body);
        Err(SignalError::Rejected { status, body })
    }
}
