use std::{io, time::Duration};

use axum::{
    Router,
    body::{Body, HttpBody},
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use tokio::{net::TcpListener, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::lifecycle::{DrainOutcome, ListenerKind};

/// How long cut-off connections get to close after a forced drain before the
/// listener task is aborted.
const CUT_OFF_GRACE: Duration = Duration::from_secs(1);

/// Starts serving `app` on `listener` in a background task.
///
/// The listener stops accepting as soon as `drain` is cancelled and the task
/// finishes once every open connection is done.
pub(crate) fn spawn(
    kind: ListenerKind,
    listener: TcpListener,
    app: Router,
    drain: CancellationToken,
) -> JoinHandle<io::Result<()>> {
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(drain.cancelled_owned())
            .await
            .inspect(|_| log::debug!("The {kind} listener stopped"))
    })
}

/// Answers 503 for any request still running once `force` is cancelled.
///
/// A streamed response body that is still being sent at that point is ended early.
pub(crate) async fn cut_off(State(force): State<CancellationToken>, request: Request, next: Next) -> Response {
    let response = tokio::select! {
        response = next.run(request) => response,
        _ = force.cancelled() => {
            return (StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down").into_response();
        }
    };

    if response.body().size_hint().exact().is_some() {
        return response;
    }

    let (parts, body) = response.into_parts();
    let body = body.into_data_stream().take_until(force.cancelled_owned());

    Response::from_parts(parts, Body::from_stream(body))
}

/// Waits for a listener task to finish until `deadline`.
///
/// `exited` holds the result if the task already finished before draining started.
/// Past the deadline, `force` is cancelled and the connections get a short grace
/// to close before the task is aborted.
pub(crate) async fn drain(
    kind: ListenerKind,
    mut handle: JoinHandle<io::Result<()>>,
    exited: Option<io::Result<()>>,
    deadline: Instant,
    force: &CancellationToken,
) -> DrainOutcome {
    let result = match exited {
        Some(result) => Ok(result),
        None => match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(joined) => joined.map_err(|e| e.to_string()),
            Err(_) => {
                log::warn!("The {kind} listener did not drain before the shutdown timeout, cutting off open requests");

                force.cancel();

                if tokio::time::timeout(CUT_OFF_GRACE, &mut handle).await.is_err() {
                    log::warn!("The {kind} listener still had open connections after cutting off, aborting it");
                    handle.abort();
                }

                return DrainOutcome::Forced;
            }
        },
    };

    match result {
        Ok(Ok(())) => DrainOutcome::Clean,
        Ok(Err(e)) => {
            log::error!("The {kind} listener failed while draining: {e}");
            DrainOutcome::Failed(e.to_string())
        }
        Err(e) => {
            log::error!("The {kind} listener task panicked: {e}");
            DrainOutcome::Failed(e)
        }
    }
}
