//! Ledger behaviour against a fault-injecting in-process service.


use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use muster_core::{
  authority::AuthorityLevel::{self, Associate, Member},
  enrollment::EnrollmentStatus,
  request::{OperationKind, OperationRequest, Outcome},
  service::Conflict,
  time::TzOffset,
};

use self::fake::{FakeLedger, Fault};
use crate::{
  Coordinator, LedgerConfig, LedgerError, Verdict,
  coordinator::{derive_key, entry_id_for},
};

fn config() -> LedgerConfig {
  LedgerConfig {
    attempt_timeout_ms: 200,
    initial_backoff_ms: 1,
    max_backoff_ms: 5,
    verify_backoff_ms: 1,
    ..LedgerConfig::default()
  }
}

fn coordinator(fake: &FakeLedger) -> Coordinator<FakeLedger> {
  Coordinator::new(fake.clone(), &config())
}

fn at(h: u32, m: u32) -> NaiveDateTime {
  NaiveDate::from_ymd_opt(2026, 10, 16)
    .unwrap()
    .and_hms_opt(h, m, 0)
    .unwrap()
}

fn request(kind: OperationKind, level: AuthorityLevel, ts: NaiveDateTime) -> OperationRequest {
  OperationRequest::new(kind, "42", "1", "Admin", level, ts, TzOffset::ZERO)
}

fn check_in(ts: NaiveDateTime) -> OperationRequest {
  request(OperationKind::TimeCheckIn, Associate, ts)
}

fn check_out(ts: NaiveDateTime) -> OperationRequest {
  request(OperationKind::TimeCheckOut { note: None }, Associate, ts)
}

fn register() -> OperationRequest {
  request(OperationKind::ActivityRegister { activity_id: "a1".into() }, Member, at(9, 0))
}

fn activity_check_in(level: AuthorityLevel) -> OperationRequest {
  request(OperationKind::ActivityCheckIn { activity_id: "a1".into() }, level, at(9, 5))
}

// ─── Time ledger ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn check_in_then_out_credits_the_interval() {
  let fake = FakeLedger::default();
  let c = coordinator(&fake);

  let Verdict::Confirmed(Outcome::CheckedIn(entry)) = c.submit(check_in(at(9, 0))).await.unwrap()
  else {
    panic!("check-in not confirmed");
  };
  assert!(entry.is_open());
  assert_eq!(entry.started_at, at(9, 0));

  let out = request(
    OperationKind::TimeCheckOut { note: Some("set-up crew".into()) },
    Associate,
    at(10, 35),
  );
  let Verdict::Confirmed(Outcome::CheckedOut(closed)) = c.submit(out).await.unwrap() else {
    panic!("check-out not confirmed");
  };
  assert_eq!(closed.entry.id, entry.id);
  assert_eq!(closed.duration(), chrono::TimeDelta::minutes(95));
  assert_eq!(closed.entry.note.as_deref(), Some("set-up crew"));

  let summary = c.summary("42", 5).await.unwrap();
  assert_eq!(summary.total_minutes, 95);
  assert!(summary.open.is_none());
}

#[tokio::test]
async fn replayed_check_in_creates_one_interval() {
  let fake = FakeLedger::default();
  let c = coordinator(&fake);

  let first = c.submit(check_in(at(9, 0))).await.unwrap();
  let second = c.submit(check_in(at(9, 0))).await.unwrap();
  assert_eq!(first, second);
  assert_eq!(fake.entries("42").len(), 1);
  assert_eq!(fake.calls("record_time"), 1);
}

#[tokio::test]
async fn check_in_while_open_is_refused() {
  let fake = FakeLedger::default();
  let c = coordinator(&fake);
  c.submit(check_in(at(9, 0))).await.unwrap();

  let err = c.submit(check_in(at(9, 30))).await.unwrap_err();
  assert_eq!(err, LedgerError::AlreadyOpen { subject_id: "42".into() });
  assert_eq!(fake.entries("42").len(), 1);
}

#[tokio::test]
async fn check_out_while_closed_is_refused() {
  let fake = FakeLedger::default();
  let err = coordinator(&fake).submit(check_out(at(10, 0))).await.unwrap_err();
  assert_eq!(err, LedgerError::NoOpenEntry { subject_id: "42".into() });
  assert_eq!(fake.calls("record_time"), 0);
}

#[tokio::test]
async fn negative_duration_leaves_entry_open() {
  let fake = FakeLedger::default();
  let c = coordinator(&fake);
  c.submit(check_in(at(12, 0))).await.unwrap();

  // Same clock reading, but the device claims to be three hours ahead.
  let mut out = check_out(at(12, 0));
  out.tz_offset = TzOffset::from_hours(3.0).unwrap();
  let err = c.submit(out).await.unwrap_err();

  assert!(matches!(err, LedgerError::NegativeDuration { .. }));
  let entries = fake.entries("42");
  assert_eq!(entries.len(), 1);
  assert!(entries[0].is_open());
}

#[tokio::test]
async fn offsets_normalise_to_reference_zone() {
  let fake = FakeLedger::default();
  let mut req = check_in(at(12, 0));
  req.tz_offset = TzOffset::from_hours(-2.5).unwrap();
  let Verdict::Confirmed(Outcome::CheckedIn(entry)) = coordinator(&fake).submit(req).await.unwrap()
  else {
    panic!("check-in not confirmed");
  };
  assert_eq!(entry.started_at, at(14, 30));
}

#[tokio::test]
async fn low_authority_is_rejected_before_any_write() {
  let fake = FakeLedger::default();
  let err = coordinator(&fake)
    .submit(request(OperationKind::TimeCheckIn, Member, at(9, 0)))
    .await
    .unwrap_err();
  assert_eq!(err, LedgerError::InsufficientAuthority { required: Associate, actual: Member });
  assert_eq!(fake.calls("query_open_entry"), 0);
  assert_eq!(fake.calls("record_time"), 0);
}

// ─── Retries ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn transient_failures_recover_within_budget() {
  let fake = FakeLedger::default();
  fake.inject("record_time", [Fault::Unavailable, Fault::Unavailable]);

  let verdict = coordinator(&fake).submit(check_in(at(9, 0))).await.unwrap();
  assert!(verdict.is_confirmed());
  assert_eq!(fake.calls("record_time"), 3);
  assert_eq!(fake.entries("42").len(), 1);
}

#[tokio::test]
async fn exhaustion_is_reported_and_not_cached() {
  let fake = FakeLedger::default();
  fake.inject("record_time", [Fault::Unavailable; 4]);
  let c = coordinator(&fake);

  let err = c.submit(check_in(at(9, 0))).await.unwrap_err();
  assert!(matches!(err, LedgerError::RetryExhausted { attempts: 4, .. }));
  assert!(fake.entries("42").is_empty());

  // Same key again: the ledger is consulted, not the cache.
  assert!(c.submit(check_in(at(9, 0))).await.unwrap().is_confirmed());
  assert_eq!(fake.entries("42").len(), 1);
}

#[tokio::test]
async fn conflicts_are_attempted_once() {
  let fake = FakeLedger::default();
  fake.inject("record_time", [Fault::Reject(Conflict::AlreadyOpen)]);

  let err = coordinator(&fake).submit(check_in(at(9, 0))).await.unwrap_err();
  assert_eq!(err, LedgerError::AlreadyOpen { subject_id: "42".into() });
  assert_eq!(fake.calls("record_time"), 1);
}

#[tokio::test]
async fn fatal_service_errors_are_not_retried() {
  let fake = FakeLedger::default();
  fake.inject("record_time", [Fault::Malformed]);

  let err = coordinator(&fake).submit(check_in(at(9, 0))).await.unwrap_err();
  assert!(matches!(err, LedgerError::Service(_)));
  assert_eq!(fake.calls("record_time"), 1);
}

#[tokio::test]
async fn slow_attempts_time_out_and_retry() {
  let fake = FakeLedger::default();
  fake.inject("record_time", [Fault::Stall(Duration::from_secs(2))]);

  let verdict = coordinator(&fake).submit(check_in(at(9, 0))).await.unwrap();
  assert!(verdict.is_confirmed());
  assert_eq!(fake.calls("record_time"), 2);
  assert_eq!(fake.entries("42").len(), 1);
}

#[tokio::test]
async fn lost_check_in_ack_does_not_duplicate() {
  let fake = FakeLedger::default();
  fake.inject("record_time", [Fault::LoseAck]);
  let c = coordinator(&fake);
  let req = check_in(at(9, 0));
  let expected_id = entry_id_for(&c.idempotency_key(&req));

  let Verdict::Confirmed(Outcome::CheckedIn(entry)) = c.submit(req).await.unwrap() else {
    panic!("check-in not confirmed");
  };
  assert_eq!(entry.id, expected_id);
  assert_eq!(fake.calls("record_time"), 2);
  assert_eq!(fake.entries("42").len(), 1);
}

#[tokio::test]
async fn lost_check_out_ack_is_verified() {
  let fake = FakeLedger::default();
  let c = coordinator(&fake);
  c.submit(check_in(at(9, 0))).await.unwrap();

  fake.inject("record_time", [Fault::LoseAck]);
  let Verdict::Confirmed(Outcome::CheckedOut(closed)) = c.submit(check_out(at(11, 0))).await.unwrap()
  else {
    panic!("check-out not confirmed");
  };
  assert_eq!(closed.duration_secs, 2 * 3600);
  assert!(fake.entries("42").iter().all(|e| !e.is_open()));
}

#[tokio::test]
async fn check_in_is_read_back() {
  let fake = FakeLedger::default();
  coordinator(&fake).submit(check_in(at(9, 0))).await.unwrap();
  assert!(fake.calls("query_entries") >= 2);
}

#[tokio::test]
async fn stale_open_entry_read_is_rechecked() {
  let fake = FakeLedger::default();
  let c = coordinator(&fake);
  c.submit(check_in(at(9, 0))).await.unwrap();

  // The first read misses the open entry; the second one sees it.
  fake.serve_stale_entries(1);
  let out = c.submit(check_out(at(10, 0))).await.unwrap();
  let Verdict::Confirmed(Outcome::CheckedOut(closed)) = &out else {
    panic!("check-out not confirmed: {out:?}");
  };
  assert_eq!(closed.duration_secs, 3600);
  assert!(fake.entries("42").iter().all(|e| !e.is_open()));

  // The replay gets the confirmed outcome, not a remembered conflict.
  assert_eq!(c.submit(check_out(at(10, 0))).await.unwrap(), out);
}

#[tokio::test]
async fn unconfirmed_check_in_is_indeterminate_and_not_cached() {
  let fake = FakeLedger::default();
  let c = coordinator(&fake);

  fake.serve_stale_entries(100);
  let verdict = c.submit(check_in(at(9, 0))).await.unwrap();
  assert!(matches!(verdict, Verdict::Indeterminate { .. }), "{verdict:?}");
  assert_eq!(fake.entries("42").len(), 1);

  fake.serve_stale_entries(0);
  let Verdict::Confirmed(Outcome::CheckedIn(entry)) = c.submit(check_in(at(9, 0))).await.unwrap()
  else {
    panic!("check-in not confirmed on re-check");
  };
  assert!(entry.is_open());
  assert_eq!(fake.calls("record_time"), 2);
  assert_eq!(fake.entries("42").len(), 1);
}

// ─── Enrollment ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn check_in_before_register_is_refused() {
  let fake = FakeLedger::default();
  let err = coordinator(&fake).submit(activity_check_in(Associate)).await.unwrap_err();
  assert_eq!(err, LedgerError::NotRegistered {
    activity_id: "a1".into(),
    subject_id:  "42".into(),
  });
  assert_eq!(fake.enrollment("a1", "42").status, EnrollmentStatus::NotRegistered);
}

#[tokio::test]
async fn register_then_check_in() {
  let fake = FakeLedger::default();
  let c = coordinator(&fake);

  let Verdict::Confirmed(Outcome::Registered(record)) = c.submit(register()).await.unwrap() else {
    panic!("registration not confirmed");
  };
  assert_eq!(record.status, EnrollmentStatus::Registered);
  assert!(record.registered_at.is_some());

  let Verdict::Confirmed(Outcome::ActivityCheckedIn(record)) =
    c.submit(activity_check_in(Associate)).await.unwrap()
  else {
    panic!("check-in not confirmed");
  };
  assert_eq!(record.status, EnrollmentStatus::CheckedIn);
  assert!(record.checked_in_at.is_some());

  let err = c
    .submit(activity_check_in(Associate).with_idempotency_key("again"))
    .await
    .unwrap_err();
  assert!(matches!(err, LedgerError::AlreadyCheckedIn { .. }));
}

#[tokio::test]
async fn second_registration_returns_existing_record() {
  let fake = FakeLedger::default();
  let c = coordinator(&fake);

  let first = c.submit(register().with_idempotency_key("r1")).await.unwrap();
  let second = c.submit(register().with_idempotency_key("r2")).await.unwrap();
  assert_eq!(first, second);
  assert_eq!(fake.calls("enroll_activity"), 1);
}

#[tokio::test]
async fn coordinator_check_in_registers_implicitly() {
  let fake = FakeLedger::default();
  let verdict = coordinator(&fake).submit(activity_check_in(AuthorityLevel::Coordinator)).await.unwrap();
  assert!(verdict.is_confirmed());

  let record = fake.enrollment("a1", "42");
  assert_eq!(record.status, EnrollmentStatus::CheckedIn);
  assert!(record.registered_at.is_some());
}

#[tokio::test]
async fn racing_registration_is_confirmed() {
  let fake = FakeLedger::default();
  let c = coordinator(&fake);
  c.submit(register().with_idempotency_key("r1")).await.unwrap();

  // Our first read is stale, so the service answers AlreadyRegistered.
  fake.serve_stale_enrollment(1);
  let verdict = c.submit(register().with_idempotency_key("r2")).await.unwrap();
  assert!(verdict.is_confirmed());
  assert_eq!(fake.calls("enroll_activity"), 2);
}

#[tokio::test]
async fn stale_reads_are_indeterminate_and_not_cached() {
  let fake = FakeLedger::default();
  let c = coordinator(&fake);

  fake.serve_stale_enrollment(100);
  let verdict = c.submit(register()).await.unwrap();
  assert!(matches!(verdict, Verdict::Indeterminate { .. }));

  fake.serve_stale_enrollment(0);
  let Verdict::Confirmed(Outcome::Registered(record)) = c.submit(register()).await.unwrap() else {
    panic!("registration not confirmed on re-check");
  };
  assert_eq!(record.status, EnrollmentStatus::Registered);
  assert_eq!(fake.calls("enroll_activity"), 1);
}

// ─── Coordination ────────────────────────────────────────────────────────────

#[tokio::test]
async fn dropped_caller_still_caches_outcome() {
  let fake = FakeLedger::default();
  fake.inject("enroll_activity", [Fault::Stall(Duration::from_millis(100))]);
  let c = coordinator(&fake);

  let abandoned = tokio::time::timeout(Duration::from_millis(10), c.submit(register())).await;
  assert!(abandoned.is_err());

  tokio::time::sleep(Duration::from_millis(400)).await;
  assert_eq!(fake.enrollment("a1", "42").status, EnrollmentStatus::Registered);
  let reads = fake.calls("query_enrollment");

  assert!(c.submit(register()).await.unwrap().is_confirmed());
  assert_eq!(fake.calls("query_enrollment"), reads);
  assert_eq!(fake.calls("enroll_activity"), 1);
}

#[tokio::test]
async fn concurrent_calls_with_one_key_collapse() {
  let fake = FakeLedger::default();
  let c = coordinator(&fake);

  let (a, b) = tokio::join!(c.submit(check_in(at(9, 0))), c.submit(check_in(at(9, 0))));
  assert_eq!(a.unwrap(), b.unwrap());
  assert_eq!(fake.calls("record_time"), 1);
}

#[tokio::test]
async fn concurrent_check_ins_for_one_subject_serialise() {
  let fake = FakeLedger::default();
  let c = coordinator(&fake);

  let (a, b) = tokio::join!(
    c.submit(check_in(at(9, 0)).with_idempotency_key("a")),
    c.submit(check_in(at(9, 0)).with_idempotency_key("b")),
  );
  let results = [a, b];
  assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
  assert!(results.iter().any(|r| matches!(r, Err(LedgerError::AlreadyOpen { .. }))));
  assert_eq!(fake.entries("42").len(), 1);
}

#[tokio::test]
async fn cached_failures_are_replayed() {
  let fake = FakeLedger::default();
  let c = coordinator(&fake);

  let first = c.submit(check_out(at(10, 0))).await.unwrap_err();
  let second = c.submit(check_out(at(10, 0))).await.unwrap_err();
  assert_eq!(first, second);
  // An absent entry is read twice before it is believed; the replay reads nothing.
  assert_eq!(fake.calls("query_open_entry"), 2);
}

#[test]
fn derived_keys_bucket_by_minute() {
  let key = |kind: OperationKind, ts: NaiveDateTime| derive_key(&request(kind, Associate, ts), 60);
  let base = at(9, 0);

  let a = key(OperationKind::TimeCheckIn, base + chrono::TimeDelta::seconds(10));
  let b = key(OperationKind::TimeCheckIn, base + chrono::TimeDelta::seconds(50));
  let c = key(OperationKind::TimeCheckIn, base + chrono::TimeDelta::seconds(61));
  let d = key(OperationKind::TimeCheckOut { note: None }, base);

  assert_eq!(a, b);
  assert_ne!(a, c);
  assert_ne!(a, d);
  assert_eq!(a.len(), 64);
  assert!(a.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_uppercase()));
}
