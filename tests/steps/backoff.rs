//! Retry and backoff step definitions.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when, World};
use gapic_runtime::retry::parse_code;
use gapic_runtime::{Backoff, CallOptions, Error, Result, RetryPolicy};
use tokio::time::Instant;
use tonic::{Code, Status};

/// Test context for backoff scenarios.
#[derive(Debug, World)]
#[world(init = Self::new)]
pub struct BackoffWorld {
    backoff: Backoff,
    fail_code: Code,
    fail_times: u32,
    attempts: Arc<AtomicU32>,
    outcome: Option<Result<&'static str>>,
    elapsed: Duration,
}

impl BackoffWorld {
    fn new() -> Self {
        Self {
            backoff: Backoff::default(),
            fail_code: Code::Unavailable,
            fail_times: 0,
            attempts: Arc::new(AtomicU32::new(0)),
            outcome: None,
            elapsed: Duration::ZERO,
        }
    }

    async fn invoke(&mut self, opts: CallOptions) {
        let attempts = self.attempts.clone();
        let code = self.fail_code;
        let fail_times = self.fail_times;

        let start = Instant::now();
        let outcome = RetryPolicy::default()
            .invoke(&opts, || {
                let attempts = attempts.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) < fail_times {
                        Err(Error::from(Status::new(code, "scripted failure")))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;
        self.elapsed = start.elapsed();
        self.outcome = Some(outcome);
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

// --- Given steps ---

#[given(expr = "a backoff starting at {int} ms capped at {int} ms growing by {float}")]
async fn given_backoff(world: &mut BackoffWorld, initial: u64, max: u64, multiplier: f64) {
    world.backoff = Backoff::new(
        Duration::from_millis(initial),
        Duration::from_millis(max),
        multiplier,
    );
}

#[given(expr = "a call that fails with {word} {int} times before succeeding")]
async fn given_failing_call(world: &mut BackoffWorld, code: String, times: u32) {
    world.fail_code = parse_code(&code).expect("known status code");
    world.fail_times = times;
}

// --- When steps ---

#[when("I invoke it with the default retry policy")]
async fn when_invoke(world: &mut BackoffWorld) {
    world.invoke(CallOptions::new()).await;
}

#[when(expr = "I invoke it with the default retry policy and a {int} second deadline")]
async fn when_invoke_with_deadline(world: &mut BackoffWorld, secs: u64) {
    world
        .invoke(CallOptions::new().with_timeout(Duration::from_secs(secs)))
        .await;
}

// --- Then steps ---

#[then(expr = "the first {int} delays are {int}, {int}, {int}, {int} ms")]
async fn then_first_delays(
    world: &mut BackoffWorld,
    count: usize,
    d1: u64,
    d2: u64,
    d3: u64,
    d4: u64,
) {
    let delays: Vec<u64> = world
        .backoff
        .iter()
        .take(count)
        .map(|d| d.as_millis() as u64)
        .collect();
    assert_eq!(delays, vec![d1, d2, d3, d4]);
}

#[then(expr = "delay {int} and every later delay is {int} ms")]
async fn then_capped(world: &mut BackoffWorld, nth: usize, max: u64) {
    let delays: Vec<Duration> = world.backoff.iter().take(nth + 20).collect();
    assert!(delays[nth - 2] < Duration::from_millis(max));
    assert!(delays[nth - 1..]
        .iter()
        .all(|d| *d == Duration::from_millis(max)));
}

#[then(expr = "the call succeeds after {int} attempts")]
async fn then_succeeds(world: &mut BackoffWorld, attempts: u32) {
    assert!(matches!(world.outcome, Some(Ok("ok"))));
    assert_eq!(world.attempts(), attempts);
}

#[then(expr = "{int} ms elapsed")]
async fn then_elapsed(world: &mut BackoffWorld, millis: u64) {
    assert_eq!(world.elapsed, Duration::from_millis(millis));
}

#[then(expr = "the call fails with {word} after {int} attempts")]
async fn then_fails_with(world: &mut BackoffWorld, code: String, attempts: u32) {
    let err = match world.outcome.take() {
        Some(Err(err)) => err,
        other => panic!("expected failure, got {:?}", other),
    };
    assert_eq!(err.code(), parse_code(&code));
    assert_eq!(world.attempts(), attempts);
}

#[then(expr = "the call fails with a deadline error after {int} attempts")]
async fn then_deadline(world: &mut BackoffWorld, attempts: u32) {
    assert!(matches!(world.outcome, Some(Err(Error::DeadlineExceeded))));
    assert_eq!(world.attempts(), attempts);
}
