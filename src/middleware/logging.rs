use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    time::Instant,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Paths polled by load balancers; logged at debug level only.
const QUIET_PATHS: &[&str] = &["/health", "/api/v1/health"];

/// Logs the start and completion of every request, tagged with a fresh request id
/// and the session key (caller IP) the voice handlers use.
pub struct RequestLogging;

impl<S, B> Transform<S, ServiceRequest> for RequestLogging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggingMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggingMiddleware { service }))
    }
}

pub struct RequestLoggingMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggingMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let request_id = Uuid::new_v4();
        let method = req.method().to_string();
        let path = req.path().to_string();
        let session_id = req
            .peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let quiet = QUIET_PATHS.contains(&path.as_str());

        if quiet {
            debug!(method = %method, path = %path, request_id = %request_id, "Request started");
        } else {
            info!(
                method = %method,
                path = %path,
                request_id = %request_id,
                session_id = %session_id,
                "Request started"
            );
        }

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let duration_ms = start_time.elapsed().as_millis() as u64;

            match &result {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if response.status().is_server_error() {
                        warn!(
                            method = %method,
                            path = %path,
                            request_id = %request_id,
                            session_id = %session_id,
                            status,
                            duration_ms,
                            "Request completed with server error"
                        );
                    } else if quiet {
                        debug!(method = %method, path = %path, status, duration_ms, "Request completed");
                    } else {
                        info!(
                            method = %method,
                            path = %path,
                            request_id = %request_id,
                            session_id = %session_id,
                            status,
                            duration_ms,
                            "Request completed"
                        );
                    }
                }
                Err(err) => {
                    error!(
                        method = %method,
                        path = %path,
                        request_id = %request_id,
                        session_id = %session_id,
                        duration_ms,
                        error = %err,
                        "Request failed"
                    );
                }
            }

            result
        })
    }
}
