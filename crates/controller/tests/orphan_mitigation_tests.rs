//! Orphan mitigation: which bind outcomes require it, how it runs, and that
//! it never gives up.

mod common;

use common::*;
use controller::controller::reconciler::ReconcilerError;
use controller::crd::{
    ConditionStatus, ServiceBindingCondition, ServiceBindingConditionType,
    ServiceBindingOperation, ServiceBindingStatus,
};
use k8s_openapi::api::core::v1::Secret;

fn mitigating_binding() -> controller::crd::ServiceBinding {
    let mut binding = test_binding();
    binding.status = Some(ServiceBindingStatus {
        orphan_mitigation_in_progress: true,
        ..ServiceBindingStatus::default()
    });
    binding
}

fn ready(binding: &controller::crd::ServiceBinding) -> ServiceBindingCondition {
    binding
        .status
        .as_ref()
        .unwrap()
        .conditions
        .iter()
        .find(|c| c.r#type == ServiceBindingConditionType::Ready)
        .cloned()
        .expect("Ready condition expected")
}

#[tokio::test]
async fn ambiguous_bind_failure_triggers_mitigation_in_the_same_pass() {
    let h = harness(FakeResolver::full(), FakeBroker::failing_bind(protocol_error(500)));

    let result = h.reconciler.reconcile(&test_binding()).await;
    assert!(result.is_ok());

    // the compensating unbind already ran
    assert_eq!(h.broker.unbind_call_count(), 1);
    let last = h.status.last_update();
    let status = last.status.as_ref().unwrap();
    assert!(!status.orphan_mitigation_in_progress);
    assert_eq!(ready(&last).reason.as_deref(), Some("OrphanMitigationSuccessful"));

    // the bind itself stays terminally failed
    let failed = status
        .conditions
        .iter()
        .find(|c| c.r#type == ServiceBindingConditionType::Failed)
        .expect("Failed condition expected");
    assert_eq!(failed.status, ConditionStatus::True);
    assert!(h
        .events
        .reasons()
        .contains(&"ServiceBindingNeedsOrphanMitigation".to_string()));
}

#[tokio::test]
async fn outcome_table_decides_when_mitigation_runs() {
    // (bind status, mitigation expected)
    let cases = [
        (201_u16, true),
        (300, false),
        (400, false),
        (408, true),
        (409, false),
        (422, false),
        (500, true),
        (501, true),
    ];
    for (status_code, expect_mitigation) in cases {
        let h = harness(
            FakeResolver::full(),
            FakeBroker::failing_bind(protocol_error(status_code)),
        );
        h.reconciler
            .reconcile(&test_binding())
            .await
            .unwrap_or_else(|err| panic!("status {status_code}: {err}"));
        let expected = usize::from(expect_mitigation);
        assert_eq!(
            h.broker.unbind_call_count(),
            expected,
            "status {status_code}"
        );
    }
}

#[tokio::test]
async fn transport_bind_failure_does_not_trigger_mitigation() {
    let h = harness(FakeResolver::full(), FakeBroker::failing_bind(transport_error()));

    let result = h.reconciler.reconcile(&test_binding()).await;
    assert!(result.is_err());
    assert_eq!(h.broker.unbind_call_count(), 0);
    assert!(!h
        .status
        .last_update()
        .status
        .as_ref()
        .unwrap()
        .orphan_mitigation_in_progress);
}

#[tokio::test]
async fn pending_mitigation_flag_takes_precedence_on_the_next_pass() {
    let secret = {
        let mut s = Secret::default();
        s.metadata.name = Some(SECRET_NAME.to_string());
        s
    };
    let secrets = FakeSecretStore::with_secret(NAMESPACE, secret);
    let h = harness_with_secrets(FakeResolver::full(), FakeBroker::default(), secrets);

    let result = h.reconciler.reconcile(&mitigating_binding()).await;
    assert!(result.is_ok());

    // no bind attempt; straight to the compensating unbind
    assert_eq!(h.broker.bind_call_count(), 0);
    assert_eq!(h.broker.unbind_call_count(), 1);
    assert!(h.secrets.secret(NAMESPACE, SECRET_NAME).is_none());

    let last = h.status.last_update();
    let status = last.status.as_ref().unwrap();
    assert!(!status.orphan_mitigation_in_progress);
    assert!(status.current_operation.is_none());
    assert_eq!(ready(&last).reason.as_deref(), Some("OrphanMitigationSuccessful"));
    assert_eq!(h.events.reasons(), vec!["OrphanMitigationSuccessful"]);
}

#[tokio::test]
async fn mitigation_stages_an_unbind_operation() {
    let h = harness(FakeResolver::full(), FakeBroker::default());
    h.reconciler.reconcile(&mitigating_binding()).await.unwrap();

    let staged = h.status.updates.lock().unwrap()[0].clone();
    let status = staged.status.as_ref().unwrap();
    assert_eq!(
        status.current_operation,
        Some(ServiceBindingOperation::Unbind)
    );
    assert!(status.operation_start_time.is_some());
}

#[tokio::test]
async fn failed_mitigation_keeps_the_flag_and_reschedules() {
    let h = harness(
        FakeResolver::full(),
        FakeBroker::failing_unbind(transport_error()),
    );

    let result = h.reconciler.reconcile(&mitigating_binding()).await;
    assert!(matches!(result, Err(ReconcilerError::Broker(_))));

    let last = h.status.last_update();
    let status = last.status.as_ref().unwrap();
    assert!(status.orphan_mitigation_in_progress);
    let ready = ready(&last);
    assert_eq!(ready.status, ConditionStatus::Unknown);
    assert_eq!(ready.reason.as_deref(), Some("UnbindCallFailed"));
}

#[tokio::test]
async fn mitigation_ignores_the_retry_deadline() {
    let h = harness(
        FakeResolver::full(),
        FakeBroker::failing_unbind(transport_error()),
    );

    let mut binding = mitigating_binding();
    let stale = (chrono::Utc::now() - chrono::Duration::days(8)).to_rfc3339();
    binding.status.as_mut().unwrap().current_operation = Some(ServiceBindingOperation::Unbind);
    binding.status.as_mut().unwrap().operation_start_time = Some(stale);

    // a week past the window, mitigation still retries rather than failing
    // terminally
    let result = h.reconciler.reconcile(&binding).await;
    assert!(result.is_err());
    let status = h.status.last_update().status.as_ref().unwrap().clone();
    assert!(status.orphan_mitigation_in_progress);
    assert!(status
        .conditions
        .iter()
        .all(|c| c.r#type != ServiceBindingConditionType::Failed));
}

#[tokio::test]
async fn repeated_mitigation_resolve_failures_report_once() {
    let resolver = FakeResolver {
        broker: None,
        ..FakeResolver::full()
    };
    let h = harness(resolver, FakeBroker::default());

    let result = h.reconciler.reconcile(&mitigating_binding()).await;
    assert!(result.is_err());
    assert_eq!(h.events.event_count(), 1);
    assert_eq!(h.events.reasons(), vec!["ReferencedNonExistentBroker"]);
    let first = h.status.last_update();
    let ready = ready(&first);
    assert_eq!(ready.status, ConditionStatus::Unknown);
    assert!(first.status.as_ref().unwrap().orphan_mitigation_in_progress);

    // the requeued pass sees the reason already recorded and stays quiet
    let result = h.reconciler.reconcile(&first).await;
    assert!(result.is_err());
    assert_eq!(h.events.event_count(), 1);
    assert_eq!(h.status.update_count(), 1);
}

#[tokio::test]
async fn mitigation_runs_before_deletion_handling() {
    let h = harness(FakeResolver::full(), FakeBroker::default());

    let mut binding = deleted_binding();
    binding.status = Some(ServiceBindingStatus {
        orphan_mitigation_in_progress: true,
        ..ServiceBindingStatus::default()
    });

    h.reconciler.reconcile(&binding).await.unwrap();
    // the pass resolved the unknown broker state instead of short-circuiting
    // into finalizer removal
    assert_eq!(h.broker.unbind_call_count(), 1);
    assert!(!h
        .status
        .last_update()
        .status
        .as_ref()
        .unwrap()
        .orphan_mitigation_in_progress);
}
