//! Mode-based routing of requests to the local engine, the mirror, or both.
//!
//! In a mirror-using mode the raw request frame is relayed before local
//! handling starts, so the mirror always sees the bytes the client sent even
//! if a handler rewrites the decoded request. In the dual modes both responses
//! are logged and, when the log level allows, diffed.

mod diff;
mod errors;
mod local;

use std::sync::Arc;

use docket_config::{MirrorEndpoint, Mode};
use docket_wire::decode_frame;
use tracing::{Level, warn};

pub use self::diff::DiffReport;
pub use self::errors::{RouteError, RouterError};
use self::local::LocalRoute;
use crate::cancel::CancellationToken;
use crate::dispatch::CommandTable;
use crate::message::{ConnectionInfo, Request, Response, ResponseIds};
use crate::metrics::ConnMetrics;
use crate::mirror::{MirrorClient, MirrorInterrupt};

pub(crate) const ROUTER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::router");

macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {{
        let level = $level;
        if level == Level::ERROR {
            tracing::error!($($arg)+);
        } else if level == Level::WARN {
            tracing::warn!($($arg)+);
        } else if level == Level::INFO {
            tracing::info!($($arg)+);
        } else if level == Level::DEBUG {
            tracing::debug!($($arg)+);
        } else {
            tracing::trace!($($arg)+);
        }
    }};
}

fn level_enabled(level: Level) -> bool {
    if level == Level::ERROR {
        tracing::enabled!(target: ROUTER_TARGET, Level::ERROR)
    } else if level == Level::WARN {
        tracing::enabled!(target: ROUTER_TARGET, Level::WARN)
    } else if level == Level::INFO {
        tracing::enabled!(target: ROUTER_TARGET, Level::INFO)
    } else if level == Level::DEBUG {
        tracing::enabled!(target: ROUTER_TARGET, Level::DEBUG)
    } else {
        tracing::enabled!(target: ROUTER_TARGET, Level::TRACE)
    }
}

/// Produces one response per request for a single connection.
#[derive(Debug)]
pub struct ModeRouter {
    mode: Mode,
    table: Arc<CommandTable>,
    metrics: Arc<ConnMetrics>,
    mirror: Option<MirrorClient>,
}

impl ModeRouter {
    /// Builds a router, connecting to the mirror when `mode` needs one.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::MirrorRequired`] when a mirror-using mode has no
    /// endpoint, or the connection error when the mirror is unreachable.
    pub fn new(
        mode: Mode,
        mirror: Option<&MirrorEndpoint>,
        table: Arc<CommandTable>,
        metrics: Arc<ConnMetrics>,
    ) -> Result<Self, RouterError> {
        let mirror = if mode.uses_mirror() {
            let endpoint = mirror.ok_or(RouterError::MirrorRequired { mode })?;
            Some(MirrorClient::connect(endpoint)?)
        } else {
            None
        };
        Ok(Self {
            mode,
            table,
            metrics,
            mirror,
        })
    }

    /// Routing mode.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Resolves the response for `request`.
    ///
    /// # Errors
    ///
    /// A failed mirror relay is returned as [`RouteError`] and must end the
    /// connection.
    ///
    /// # Panics
    ///
    /// Panics when the mode selects a response that was never produced, or a
    /// response that has no body yet keeps the connection open.
    pub fn route(
        &mut self,
        token: &CancellationToken,
        connection: &ConnectionInfo,
        request: &Request,
        ids: &mut ResponseIds,
    ) -> Result<Response, RouteError> {
        let candidates = self.candidates(token, connection, request, ids)?;

        let mut diff_level = Level::DEBUG;
        if let Some(response) = &candidates.local {
            diff_level = diff_level.min(log_response("response", response));
        }
        if let Some(response) = &candidates.mirror {
            diff_level = diff_level.min(log_response("mirror response", response));
        }
        if self.mode.is_dual()
            && level_enabled(diff_level)
            && let Some(report) = candidates.diff()
        {
            log_at!(
                diff_level,
                target: ROUTER_TARGET,
                identical = report.is_empty(),
                "{report}"
            );
        }

        Ok(select(self.mode, candidates.local, candidates.mirror))
    }

    /// Produces the local and mirror answers the mode asks for.
    ///
    /// Both answers share one response id, so only their content can differ.
    fn candidates(
        &mut self,
        token: &CancellationToken,
        connection: &ConnectionInfo,
        request: &Request,
        ids: &mut ResponseIds,
    ) -> Result<Candidates, RouteError> {
        let response_id = ids.next_id();
        let mirror = match self.mirror.as_mut() {
            Some(client) => Some(relay(client, token, request, response_id)?),
            None => None,
        };

        let local = self.mode.handles_locally().then(|| {
            LocalRoute {
                table: &self.table,
                metrics: &self.metrics,
            }
            .handle(token, connection, request, response_id)
        });
        Ok(Candidates { local, mirror })
    }

    /// Handle that aborts a relay in progress, when this router has a mirror.
    #[must_use]
    pub fn mirror_interrupt(&self) -> Option<MirrorInterrupt> {
        let client = self.mirror.as_ref()?;
        client
            .interrupt_handle()
            .inspect_err(|error| {
                warn!(
                    target: ROUTER_TARGET,
                    addr = client.addr(),
                    error = %error,
                    "cannot watch the mirror for cancellation"
                );
            })
            .ok()
    }

    /// Closes the mirror connection, if any.
    pub fn close(&mut self) {
        if let Some(client) = self.mirror.as_mut() {
            client.close();
        }
    }
}

/// Answers produced for one request before the mode picks one.
#[derive(Debug)]
struct Candidates {
    local: Option<Response>,
    mirror: Option<Response>,
}

impl Candidates {
    fn diff(&self) -> Option<DiffReport> {
        match (&self.local, &self.mirror) {
            (Some(local), Some(mirror)) => Some(DiffReport::between(local, mirror)),
            _ => None,
        }
    }
}

fn relay(
    client: &mut MirrorClient,
    token: &CancellationToken,
    request: &Request,
    response_id: i32,
) -> Result<Response, RouteError> {
    let frame = client.relay(token, &request.raw)?;
    let (mut header, body) = decode_frame(&frame).map_err(RouteError::MirrorFrame)?;
    header.request_id = response_id;
    Ok(Response {
        header,
        body: Some(body),
        close_connection: false,
    })
}

fn select(mode: Mode, local: Option<Response>, mirror: Option<Response>) -> Response {
    let selected = match mode {
        Mode::LocalOnly | Mode::DualPreferLocal => local,
        Mode::MirrorOnly => mirror,
        Mode::DualPreferMirror => mirror.map(|mut response| {
            response.close_connection = local.is_some_and(|local| local.close_connection);
            response
        }),
    };
    let Some(response) = selected else {
        panic!("mode {mode} selected a response that was never produced");
    };
    assert!(
        response.body.is_some() || response.close_connection,
        "response to request {} has no body but keeps the connection open",
        response.header.response_to
    );
    response
}

fn log_response(who: &str, response: &Response) -> Level {
    let level = response.log_level();
    if level_enabled(level) {
        let body = response
            .body
            .as_ref()
            .map(docket_wire::MsgBody::render)
            .unwrap_or_default();
        log_at!(
            level,
            target: ROUTER_TARGET,
            who,
            header = %response.header,
            close_connection = response.close_connection,
            "{who}:\n{body}"
        );
    }
    level
}
