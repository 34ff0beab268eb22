//! Request routing
//!
//! Maps a framed request onto an engine operation and the engine's result
//! onto a response.
//!
//! ## Routes
//! ```text
//! PUT      /data/<source-uuid>        submit one observation
//! PUT      /heartbeat/<source-uuid>   refresh liveness
//! GET|PUT  /shutdown/<source-uuid>    evict now
//! GET      /weather/<station>         latest for a station
//! GET      /weather/recent            latest overall (also /weather and /)
//! POST|DELETE anything                405
//! ```

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::{error, trace, warn};

use crate::engine::Engine;
use crate::error::{HubError, Result};
use crate::protocol::{headers, status, Method, Request, Response};
use crate::store::{ApplyOutcome, SourceId};

/// Turns requests into responses
///
/// Implementations must always produce a well-formed response.
pub trait RequestHandler: Send + Sync {
    /// Answer one routed request
    fn handle(&self, request: &Request) -> Response;

    /// Answer a request that could not be framed
    fn framing_error(&self, error: &HubError) -> Response;
}

/// A resolved route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Submit(SourceId),
    Heartbeat(SourceId),
    Shutdown(SourceId),
    Station(String),
    Recent,
}

impl Route {
    /// Resolve a verb and target (query string ignored)
    pub fn resolve(method: Method, target: &str) -> Result<Self> {
        if matches!(method, Method::Post | Method::Delete) {
            return Err(HubError::UnsupportedMethod(method.to_string()));
        }

        let path = target.split('?').next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let route = match (method, segments.as_slice()) {
            (Method::Put, ["data", id]) => Route::Submit(SourceId::parse(id)?),
            (Method::Put, ["heartbeat", id]) => Route::Heartbeat(SourceId::parse(id)?),
            (Method::Get | Method::Put, ["shutdown", id]) => Route::Shutdown(SourceId::parse(id)?),
            (Method::Get, []) | (Method::Get, ["weather"]) | (Method::Get, ["weather", "recent"]) => {
                Route::Recent
            }
            (Method::Get, ["weather", station]) => Route::Station(station.to_string()),
            _ => {
                return Err(HubError::UnknownRoute {
                    method: method.to_string(),
                    target: target.to_string(),
                })
            }
        };

        Ok(route)
    }
}

/// Handler backed by the aggregation engine
pub struct AggregationHandler {
    engine: Arc<Engine>,
    server_name: String,
}

impl AggregationHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            server_name: format!("weatherhub/{}", crate::VERSION),
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    fn dispatch(&self, route: Route, request: &Request) -> Result<Response> {
        match route {
            Route::Submit(source_id) => {
                if request.body.is_empty() {
                    return Ok(Response::new(status::NO_CONTENT));
                }
                let receipt = self.engine.submit(source_id, request.clock(), &request.body)?;
                let response = match receipt.outcome {
                    ApplyOutcome::Created => Response::text(
                        status::CREATED,
                        format!("Created station {}", receipt.station_id),
                    ),
                    ApplyOutcome::Updated => Response::text(
                        status::OK,
                        format!("Updated station {}", receipt.station_id),
                    ),
                    ApplyOutcome::Discarded => Response::text(
                        status::OK,
                        format!("Superseded update for station {}", receipt.station_id),
                    ),
                };
                Ok(response)
            }
            Route::Heartbeat(source_id) => {
                self.engine.heartbeat(source_id)?;
                Ok(Response::text(status::OK, "Heartbeat acknowledged"))
            }
            Route::Shutdown(source_id) => {
                let eviction = self.engine.shutdown_source(source_id)?;
                Ok(Response::text(
                    status::OK,
                    format!(
                        "Removed source {} ({} stations)",
                        source_id,
                        eviction.stations_removed.len()
                    ),
                ))
            }
            Route::Station(station_id) => match self.engine.latest(&station_id) {
                Some(observation) => Ok(Response::json(status::OK, observation.payload)),
                None => Err(HubError::NotFound(format!("station {}", station_id))),
            },
            Route::Recent => match self.engine.latest_overall() {
                Some(observation) => Ok(Response::json(status::OK, observation.payload)),
                None => Err(HubError::NotFound("no observations".to_string())),
            },
        }
    }

    fn error_response(&self, error: &HubError) -> Response {
        let code = error.status_code();
        if code == status::INTERNAL_SERVER_ERROR {
            error!(error = %error, "Request failed");
            Response::text(code, failure_message())
        } else {
            trace!(error = %error, status = code, "Request rejected");
            Response::text(code, error.to_string())
        }
    }

    /// Add the headers every response carries
    fn stamp(&self, response: Response) -> Response {
        response
            .with_header(headers::SERVER, self.server_name.as_str())
            .with_header(headers::LAMPORT_CLOCK, self.engine.clock().peek().to_string())
    }
}

impl RequestHandler for AggregationHandler {
    fn handle(&self, request: &Request) -> Response {
        trace!(method = %request.method, target = %request.target, "Handling request");

        let response = Route::resolve(request.method, &request.target)
            .and_then(|route| self.dispatch(route, request))
            .unwrap_or_else(|e| self.error_response(&e));

        self.stamp(response)
    }

    fn framing_error(&self, error: &HubError) -> Response {
        warn!(error = %error, "Framing error");
        self.stamp(Response::text(status::INTERNAL_SERVER_ERROR, failure_message()))
    }
}

fn failure_message() -> String {
    format!(
        "Aggregation server failed to process request at {}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}
