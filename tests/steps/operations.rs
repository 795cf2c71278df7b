//! Long-running operation step definitions.

use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when, World};
use gapic_runtime::convert::pack;
use gapic_runtime::retry::parse_code;
use gapic_runtime::test_utils::StubOperations;
use gapic_runtime::{CallOptions, Error, Operation, OperationError, OperationStatus, Result};
use prost_types::{Duration as ProtoDuration, Timestamp};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::Code;

const NAME: &str = "projects/p1/operations/feature-1";

#[derive(Debug)]
enum Planned {
    Succeed(i64),
    Fail(Code),
}

/// Test context for operation scenarios.
#[derive(Debug, World)]
#[world(init = Self::new)]
pub struct OperationsWorld {
    stub: Arc<StubOperations>,
    pending_polls: u32,
    planned: Option<Planned>,
    progress: Option<i64>,
    unavailable_polls: u32,
    operation: Option<Operation<ProtoDuration, Timestamp>>,
    last: Option<Result<Option<ProtoDuration>>>,
    elapsed: Duration,
}

impl OperationsWorld {
    fn new() -> Self {
        Self {
            stub: Arc::new(StubOperations::new()),
            pending_polls: 0,
            planned: None,
            progress: None,
            unavailable_polls: 0,
            operation: None,
            last: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Script the stub from the Given steps and create the handle.
    async fn operation(&mut self) -> &mut Operation<ProtoDuration, Timestamp> {
        if self.operation.is_none() {
            for _ in 0..self.unavailable_polls {
                self.stub
                    .push_failure(NAME, Code::Unavailable, "backend restarting")
                    .await;
            }
            for _ in 0..self.pending_polls {
                let mut status = OperationStatus::pending(NAME);
                if let Some(progress) = self.progress {
                    status = status.with_metadata(pack(
                        "google.protobuf.Timestamp",
                        &Timestamp {
                            seconds: progress,
                            nanos: 0,
                        },
                    ));
                }
                self.stub.push_status(status).await;
            }
            let terminal = match self.planned.as_ref().expect("operation outcome planned") {
                Planned::Succeed(seconds) => OperationStatus::succeeded(
                    NAME,
                    pack(
                        "google.protobuf.Duration",
                        &ProtoDuration {
                            seconds: *seconds,
                            nanos: 0,
                        },
                    ),
                ),
                Planned::Fail(code) => {
                    OperationStatus::failed(NAME, OperationError::new(*code, "job rejected"))
                }
            };
            self.stub.push_status(terminal).await;
            self.operation = Some(Operation::from_name(NAME, self.stub.clone()));
        }
        self.operation.as_mut().expect("operation created above")
    }

    async fn wait(&mut self, interval: Duration, opts: CallOptions) {
        let start = Instant::now();
        let result = self
            .operation()
            .await
            .wait_with_interval(&opts, interval)
            .await;
        self.elapsed = start.elapsed();
        self.last = Some(result.map(Some));
    }
}

// --- Given steps ---

#[given(expr = "an operation that is pending for {int} polls and then succeeds with {int}")]
async fn given_succeeds(world: &mut OperationsWorld, polls: u32, seconds: i64) {
    world.pending_polls = polls;
    world.planned = Some(Planned::Succeed(seconds));
}

#[given(expr = "an operation that is pending for {int} polls and then fails with {word}")]
async fn given_fails(world: &mut OperationsWorld, polls: u32, code: String) {
    world.pending_polls = polls;
    world.planned = Some(Planned::Fail(parse_code(&code).expect("known status code")));
}

#[given(expr = "the pending polls report progress {int}")]
async fn given_progress(world: &mut OperationsWorld, progress: i64) {
    world.progress = Some(progress);
}

#[given(expr = "the service is unavailable for the next {int} polls")]
async fn given_unavailable(world: &mut OperationsWorld, polls: u32) {
    world.unavailable_polls = polls;
}

// --- When steps ---

#[when("I poll the operation")]
async fn when_poll(world: &mut OperationsWorld) {
    let start = Instant::now();
    let result = world.operation().await.poll(&CallOptions::new()).await;
    world.elapsed = start.elapsed();
    world.last = Some(result);
}

#[when(expr = "I wait for the operation every {int} seconds")]
async fn when_wait(world: &mut OperationsWorld, secs: u64) {
    world
        .wait(Duration::from_secs(secs), CallOptions::new())
        .await;
}

#[when(expr = "I wait for the operation every {int} seconds but cancel after {int} seconds")]
async fn when_wait_cancelled(world: &mut OperationsWorld, secs: u64, cancel_after: u64) {
    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(cancel_after)).await;
            token.cancel();
        })
    };
    world
        .wait(
            Duration::from_secs(secs),
            CallOptions::new().with_cancellation(token),
        )
        .await;
    canceller.await.expect("canceller task");
}

// --- Then steps ---

#[then(expr = "the operation result is {int}")]
async fn then_result(world: &mut OperationsWorld, seconds: i64) {
    match world.last.as_ref().expect("operation was polled") {
        Ok(Some(response)) => assert_eq!(response.seconds, seconds),
        other => panic!("expected a response, got {:?}", other),
    }
}

#[then("the operation is still pending")]
async fn then_pending(world: &mut OperationsWorld) {
    assert!(matches!(world.last, Some(Ok(None))));
}

#[then(expr = "the service was polled {int} times")]
async fn then_polled(world: &mut OperationsWorld, n: usize) {
    assert_eq!(world.stub.get_calls(), n);
}

#[then(expr = "{int} seconds elapsed")]
async fn then_elapsed(world: &mut OperationsWorld, secs: u64) {
    assert_eq!(world.elapsed, Duration::from_secs(secs));
}

#[then("the operation is done")]
async fn then_done(world: &mut OperationsWorld) {
    assert!(world.operation().await.done());
}

#[then("the operation is not done")]
async fn then_not_done(world: &mut OperationsWorld) {
    assert!(!world.operation().await.done());
}

#[then(expr = "the wait fails with operation error {word}")]
async fn then_operation_error(world: &mut OperationsWorld, code: String) {
    let err = match world.last.take().expect("operation was waited on") {
        Err(err) => err,
        Ok(value) => panic!("expected failure, got {:?}", value),
    };
    let cause = err.operation_error().expect("terminal operation failure");
    assert_eq!(Some(cause.code()), parse_code(&code));
}

#[then("the operation has no metadata")]
async fn then_no_metadata(world: &mut OperationsWorld) {
    assert_eq!(world.operation().await.metadata().expect("decodable"), None);
}

#[then(expr = "the operation metadata is {int}")]
async fn then_metadata(world: &mut OperationsWorld, progress: i64) {
    let metadata = world.operation().await.metadata().expect("decodable");
    assert_eq!(metadata.map(|m| m.seconds), Some(progress));
}

#[then("the wait is cancelled")]
async fn then_cancelled(world: &mut OperationsWorld) {
    assert!(matches!(world.last, Some(Err(Error::Cancelled))));
}
