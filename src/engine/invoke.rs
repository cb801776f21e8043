//! Guarded execution of user method bodies
//!
//! Each body runs on its own detached thread so a blocked body never holds an
//! async worker and never holds up runtime shutdown. A body that outlives its
//! limit is abandoned, not killed: the outcome is recorded as a timeout and the
//! thread finishes on its own.

use chrono::{DateTime, Utc};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::warn;

use crate::models::{Failure, Invocation, MethodBody, Status};
use crate::utils::Timer;

/// Result of one guarded body execution
#[derive(Clone, Debug)]
pub struct Execution {
    pub result: Status,
    pub failure: Option<Failure>,
    pub elapsed: Duration,
    pub started_at: DateTime<Utc>,
}

type BodyResult = Result<anyhow::Result<()>, Box<dyn Any + Send>>;

/// Run `body` with `invocation`, classifying the result
pub async fn run_guarded(body: MethodBody, invocation: Invocation, limit: Duration) -> Execution {
    let started_at = Utc::now();
    let method = invocation.method_name.clone();
    let timer = Timer::start(method.clone());

    let (result, failure) = match spawn_body(body, invocation) {
        Ok(rx) => match tokio::time::timeout(limit, rx).await {
            Ok(Ok(Ok(Ok(())))) => (Status::Passed, None),
            Ok(Ok(Ok(Err(err)))) => (Status::Failed, Some(Failure::error(&err))),
            Ok(Ok(Err(payload))) => (Status::Failed, Some(Failure::panic(panic_message(payload)))),
            Ok(Err(_)) => (
                Status::Failed,
                Some(Failure::panic("method thread exited without a result")),
            ),
            Err(_) => {
                warn!("'{}' exceeded {}ms and was abandoned", method, limit.as_millis());
                (Status::Failed, Some(Failure::timeout(limit)))
            }
        },
        Err(err) => (Status::Failed, Some(Failure::error(&err))),
    };

    Execution {
        result,
        failure,
        elapsed: timer.stop(),
        started_at,
    }
}

/// Start `body` on a detached thread. The receiver yields its result, or an
/// error if the thread is gone without sending one.
fn spawn_body(body: MethodBody, invocation: Invocation) -> anyhow::Result<oneshot::Receiver<BodyResult>> {
    let (tx, rx) = oneshot::channel();
    thread::Builder::new()
        .name(format!("method-{}", invocation.method_name))
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| body(&invocation)));
            // Receiver is gone once the body was abandoned
            let _ = tx.send(result);
        })
        .map_err(|e| anyhow::anyhow!("failed to start method thread: {e}"))?;
    Ok(rx)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
