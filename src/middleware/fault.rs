//! Last-resort error responder.
//!
//! Handler errors and panics both surface as a 500 carrying a `HandlerFault`
//! extension. The boundary logs the fault and re-renders the body, adding
//! the detail message outside production. Streaming responses have already
//! committed their head, so they are forwarded untouched.

use std::any::Any;

use axum::{
    body::HttpBody,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::config::Environment;
use crate::error::{AppError, HandlerFault};

pub async fn fault_boundary(
    State(environment): State<Environment>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;
    render_fault(response, environment)
}

/// Rewrite a faulted response; anything else passes through.
pub fn render_fault(response: Response, environment: Environment) -> Response {
    let Some(fault) = response.extensions().get::<HandlerFault>().cloned() else {
        return response;
    };
    error!(kind = fault.kind, detail = %fault.detail, "unhandled error");

    if is_committed(&response) {
        warn!(kind = fault.kind, "response already committed; forwarding fault");
        return response;
    }
    fault.into_response_with(!environment.is_production())
}

fn is_committed(response: &Response) -> bool {
    response.body().size_hint().exact().is_none()
}

/// `CatchPanicLayer` callback.
pub fn panic_fault(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::Panic(message).into_response()
}
