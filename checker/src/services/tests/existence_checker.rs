use std::time::Duration;

use mockall::Sequence;

use super::common::{identifier, target, INSTANCE};
use crate::core::RetryPolicy;
use crate::services::ExistenceChecker;
use crate::traits::MockLookupClient;
use crate::types::{CheckState, LookupFailure, LookupReply, Outcome};

fn policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        rate_limit_backoff: Duration::from_millis(100),
        network_backoff: Duration::from_secs(1),
    }
}

#[tokio::test]
async fn test_attempt_classifies_reply() {
    let mut client = MockLookupClient::new();
    client
        .expect_lookup()
        .withf(|instance, target| instance == INSTANCE && target.as_str() == "alice.ap.brid.gy")
        .times(1)
        .returning(|_, _| Ok(LookupReply::found()));

    let checker = ExistenceChecker::new(client, policy());
    let outcome = checker.attempt(&target("alice.ap.brid.gy"), INSTANCE).await;

    assert_eq!(outcome, Outcome::Confirmed);
}

#[tokio::test(start_paused = true)]
async fn test_check_retries_then_confirms() {
    let mut client = MockLookupClient::new();
    let mut seq = Sequence::new();
    client
        .expect_lookup()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(LookupReply::rate_limited(Some("2"))));
    client
        .expect_lookup()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(LookupFailure::Transport("connection reset".into())));
    client
        .expect_lookup()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(LookupReply::found()));

    let checker = ExistenceChecker::new(client, policy());
    let started = tokio::time::Instant::now();
    let result = checker.check(1, &identifier("alice"), &target("alice.ap.brid.gy"), INSTANCE).await;

    assert_eq!(result.position, 1);
    assert_eq!(result.state, CheckState::Confirmed);
    assert!(result.exists);
    assert!(result.rate_limited);
    assert_eq!(result.attempts, 3);
    assert_eq!(result.error, None);
    // 2s from retry-after plus the 1s network backoff
    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_check_gives_up_after_max_attempts() {
    let mut client = MockLookupClient::new();
    client
        .expect_lookup()
        .times(3)
        .returning(|_, _| Err(LookupFailure::Transport("timed out".into())));

    let checker = ExistenceChecker::new(client, policy());
    let result = checker.check(2, &identifier("bob"), &target("bob.ap.brid.gy"), INSTANCE).await;

    assert_eq!(result.state, CheckState::TransientFailure);
    assert!(!result.exists);
    assert_eq!(result.attempts, 3);
    assert!(result.error.unwrap().starts_with("gave up after 3 attempts"));
}

#[tokio::test]
async fn test_unclassified_is_absent_with_error() {
    let mut client = MockLookupClient::new();
    client
        .expect_lookup()
        .times(1)
        .returning(|_, _| Ok(LookupReply::with_status(503)));

    let checker = ExistenceChecker::new(client, policy());
    let result = checker.check(3, &identifier("carol"), &target("carol.ap.brid.gy"), INSTANCE).await;

    assert_eq!(result.state, CheckState::Absent);
    assert!(!result.exists);
    assert_eq!(result.error.as_deref(), Some("unexpected HTTP status 503"));
}

#[tokio::test]
async fn test_malformed_directive_is_fatal() {
    let mut client = MockLookupClient::new();
    client
        .expect_lookup()
        .times(1)
        .returning(|_, _| Ok(LookupReply::rate_limited(Some("soon-ish"))));

    let checker = ExistenceChecker::new(client, policy());
    let result = checker.check(4, &identifier("dave"), &target("dave.ap.brid.gy"), INSTANCE).await;

    assert_eq!(result.state, CheckState::FatalFailure);
    assert!(result.error.unwrap().contains("retry-after"));
}

#[tokio::test]
async fn test_not_found_is_absent() {
    let mut client = MockLookupClient::new();
    client
        .expect_lookup()
        .times(1)
        .returning(|_, _| Ok(LookupReply::with_status(400)));

    let checker = ExistenceChecker::new(client, policy());
    let result = checker.check(5, &identifier("erin"), &target("erin.ap.brid.gy"), INSTANCE).await;

    assert_eq!(result.state, CheckState::Absent);
    assert_eq!(result.error, None);
    assert_eq!(result.attempts, 1);
}
