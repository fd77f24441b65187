//! CloudFormation custom resources.
//!
//! A [`CustomResourceHandler`] implements the lifecycle of a resource; the
//! [`CustomResourceSignaler`] calls it and reports the outcome to the
//! presigned URL CloudFormation is waiting on. Whatever the handler does,
//! including failing or panicking, a response is sent.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::OnceLock;

use async_trait::async_trait;
use futures::FutureExt;
use lambda_runtime::{Context, LambdaEvent};

use crate::{Error, Map};

pub mod model;
mod response;

pub use self::model::{CloudFormationResponse, CustomResourceEvent, RequestType, Response, Status};
pub use self::response::{send, SignalError};

const SERVICE_TOKEN_KEY: &str = "ServiceToken";

#[async_trait]
pub trait CustomResourceHandler: Send + Sync {
    type Error: fmt::Display + Send;

    async fn create(&self, event: &CustomResourceEvent, context: &Context) -> Result<Response, Self::Error>;
    async fn update(&self, event: &CustomResourceEvent, context: &Context) -> Result<Response, Self::Error>;
    async fn delete(&self, event: &CustomResourceEvent, context: &Context) -> Result<Response, Self::Error>;

    /// Called when the response could not be delivered. It is not retried.
    fn on_send_failure(
        &self,
        event: &CustomResourceEvent,
        _context: &Context,
        _response: &CloudFormationResponse,
        error: &SignalError,
    ) {
        error!(
            "unable to send response for {} ({}): {}",
            event.logical_resource_id, event.request_id, error
        );
    }
}

#[derive(Clone, Debug, Default)]
pub struct CustomResourceSignaler {
    client: reqwest::Client,
}

impl CustomResourceSignaler {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        CustomResourceSignaler { client }
    }

    /// Runs `handler` for the event and signals the result.
    ///
    /// Returns the body that was sent, whether or not delivery succeeded.
    pub async fn handle<H>(&self, handler: &H, mut event: CustomResourceEvent, context: &Context) -> CloudFormationResponse
    where
        H: CustomResourceHandler + ?Sized,
    {
        // Not part of the resource and can conflict with strict property decoding
        event.resource_properties.remove(SERVICE_TOKEN_KEY);
        event.old_resource_properties.remove(SERVICE_TOKEN_KEY);

        let outcome = dispatch(handler, &event, context).await;
        if let Err(ref reason) = outcome {
            warn!("{:?} of {} failed: {}", event.request_type, event.logical_resource_id, reason);
        }

        let body = build_response(&event, log_stream_name(context), outcome);
        info!(
            "signaling {:?} for {} with physical resource id {}",
            body.status, body.logical_resource_id, body.physical_resource_id
        );

        if let Err(err) = response::send(&self.client, event.response_url.clone(), &body).await {
            handler.on_send_failure(&event, context, &body, &err);
        }
        body
    }
}

/// Entry point for `lambda_runtime::service_fn`.
pub async fn handle_event<H>(handler: &H, event: LambdaEvent<CustomResourceEvent>) -> Result<CloudFormationResponse, Error>
where
    H: CustomResourceHandler + ?Sized,
{
    static SIGNALER: OnceLock<CustomResourceSignaler> = OnceLock::new();

    let LambdaEvent { payload, context } = event;
    let signaler = SIGNALER.get_or_init(CustomResourceSignaler::new);
    Ok(signaler.handle(handler, payload, &context).await)
}

pub fn log_stream_name(context: &Context) -> &str {
    &context.env_config.log_stream
}

async fn dispatch<H>(handler: &H, event: &CustomResourceEvent, context: &Context) -> Result<Response, String>
where
    H: CustomResourceHandler + ?Sized,
{
    let outcome = AssertUnwindSafe(async {
        match event.request_type {
            RequestType::Create => handler.create(event, context).await,
            RequestType::Update => handler.update(event, context).await,
            RequestType::Delete => handler.delete(event, context).await,
        }
    })
    .catch_unwind()
    .await;

    match outcome {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(err)) => Err(err.to_string()),
        Err(panic) => Err(panic_message(panic)),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".into()
    }
}

/// Turns a handler outcome into the body CloudFormation expects.
pub fn build_response(
    event: &CustomResourceEvent,
    log_stream_name: &str,
    outcome: Result<Response, String>,
) -> CloudFormationResponse {
    let (status, physical_resource_id, reason, data, no_echo) = match outcome {
        Ok(response) => (
            response.status,
            response.physical_resource_id,
            response.reason,
            response.data,
            response.no_echo,
        ),
        Err(reason) => (Status::Failed, None, Some(reason), Map::new(), false),
    };

    let reason = match status {
        Status::Failed => Some(reason.unwrap_or_else(|| {
            format!("See the details in CloudWatch Log Stream: {}", log_stream_name)
        })),
        Status::Success => reason,
    };

    CloudFormationResponse {
        status,
        reason,
        physical_resource_id: resolve_physical_resource_id(
            event.request_type,
            physical_resource_id,
            event.physical_resource_id.as_deref(),
            log_stream_name,
        ),
        stack_id: event.stack_id.clone(),
        request_id: event.request_id.clone(),
        logical_resource_id: event.logical_resource_id.clone(),
        no_echo,
        data,
    }
}

/// An id chosen by the handler always wins. Otherwise a new resource is
/// named after the log stream and an existing one keeps its id.
pub fn resolve_physical_resource_id(
    request_type: RequestType,
    from_handler: Option<String>,
    from_event: Option<&str>,
    log_stream_name: &str,
) -> String {
    match (request_type, from_handler, from_event) {
        (_, Some(id), _) => id,
        (RequestType::Create, None, _) => log_stream_name.to_owned(),
        (_, None, Some(id)) => id.to_owned(),
        // CloudFormation always sends one on Update/Delete
        (_, None, None) => log_stream_name.to_owned(),
    }
}
