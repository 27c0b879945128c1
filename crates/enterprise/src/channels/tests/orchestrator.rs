use std::sync::Arc;

use uuid::Uuid;

use super::common::*;
use crate::channels::{
    AuditRepository, ResolutionError, TransmissionReport, TransmissionRequest, FAILURE_STATUS,
};
use crate::consent::{ConsentKey, ConsentRecord, ConsentRepository};
use crate::channels::export::{CoursePacing, LearnerProgress};

fn dummy_uuid() -> Uuid {
    Uuid::parse_str("0c5b7cc6-3a15-4b4f-9e1b-6d2f0e3b7a41").expect("valid uuid")
}

#[test]
fn one_failing_configuration_does_not_stop_the_next() {
    let veridian = customer(customer_uuid(), "Veridian Dynamics", Some(1));
    let dummy = customer(dummy_uuid(), "Dummy Enterprise", Some(2));
    let store = store_with(&[veridian.clone(), dummy.clone()]);
    store.insert_catalog_course(1, demo_course("course-v1:X+1")).unwrap();
    store.insert_catalog_course(2, demo_course(DEMO_COURSE)).unwrap();
    store.insert_channel_configuration(sap_configuration(1, veridian.uuid)).unwrap();
    store.insert_channel_configuration(sap_configuration(2, dummy.uuid)).unwrap();

    let failing = RecordingClient::failing();
    let succeeding = RecordingClient::succeeding();
    let clients = FakeClients::default().with(1, &failing).with(2, &succeeding);

    let report = orchestrator(&store, clients)
        .transmit_courseware(&TransmissionRequest::new(ACTING_USER))
        .unwrap();

    assert_eq!(
        report,
        TransmissionReport {
            processed: 2,
            succeeded: 1,
            failed: 1,
            ..TransmissionReport::default()
        }
    );
    assert_eq!(failing.course_imports().len(), 1);
    assert_eq!(succeeding.course_imports().len(), 1);
    assert!(succeeding.course_imports()[0].contains(DEMO_COURSE));

    let failed = store.catalog_audits(&veridian.uuid).unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error_message, "error occurred");
    let succeeded = store.catalog_audits(&dummy.uuid).unwrap();
    assert!(succeeded[0].is_successful());
}

#[test]
fn unreachable_catalog_service_records_a_failed_audit() {
    let veridian = customer(customer_uuid(), "Veridian Dynamics", Some(1));
    let store = store_with(&[veridian.clone()]);
    store.insert_channel_configuration(sap_configuration(1, veridian.uuid)).unwrap();
    let client = RecordingClient::succeeding();

    let report = orchestrator_with_catalog(
        &store,
        Arc::new(OfflineCatalog),
        FakeClients::default().with(1, &client),
    )
    .transmit_courseware(&TransmissionRequest::new(ACTING_USER))
    .unwrap();

    assert_eq!(
        report,
        TransmissionReport {
            processed: 1,
            failed: 1,
            ..TransmissionReport::default()
        }
    );
    assert!(client.course_imports().is_empty());

    let audits = store.catalog_audits(&veridian.uuid).unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].status, FAILURE_STATUS);
    assert_eq!(audits[0].error_message, "catalog service unavailable: connection refused");
    assert_eq!(audits[0].total_courses, 0);
    assert!(audits[0].audit_summary.is_empty());
}

#[test]
fn unfiltered_runs_skip_customers_without_a_catalog() {
    let veridian = customer(customer_uuid(), "Veridian Dynamics", None);
    let store = store_with(&[veridian.clone()]);
    store.insert_channel_configuration(sap_configuration(1, veridian.uuid)).unwrap();
    let client = RecordingClient::succeeding();

    let report = orchestrator(&store, FakeClients::default().with(1, &client))
        .transmit_courseware(&TransmissionRequest::new(ACTING_USER))
        .unwrap();

    assert_eq!(report.processed, 0);
    assert_eq!(report.skipped, 1);
    assert!(client.course_imports().is_empty());
    assert!(store.catalog_audits(&veridian.uuid).unwrap().is_empty());
}

#[test]
fn runs_without_configurations_do_nothing() {
    let store = store_with(&[customer(customer_uuid(), "Veridian Dynamics", Some(1))]);
    let report = orchestrator(&store, FakeClients::default())
        .transmit_courseware(&TransmissionRequest::new(ACTING_USER))
        .unwrap();
    assert_eq!(report, TransmissionReport::default());
}

#[test]
fn resolution_errors_abort_with_readable_messages() {
    let veridian = customer(customer_uuid(), "Veridian Dynamics", Some(1));
    let mut inactive = customer(dummy_uuid(), "Dummy Enterprise", Some(2));
    inactive.active = false;
    let store = store_with(&[veridian.clone(), inactive]);
    let orchestrator = orchestrator(&store, FakeClients::default());

    let err = orchestrator
        .transmit_courseware(&TransmissionRequest::new("R2-D2"))
        .unwrap_err();
    assert_eq!(err.to_string(), "A user with the username R2-D2 was not found.");

    let err = orchestrator
        .transmit_courseware(&TransmissionRequest::new(ACTING_USER).for_customer(dummy_uuid().to_string()))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("Enterprise customer {} not found, or not active", dummy_uuid())
    );

    let err = orchestrator
        .transmit_learner_data(
            &TransmissionRequest::new(ACTING_USER).on_channel("abc"),
            &*store,
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid integrated channel: ABC");

    let err = orchestrator
        .transmit_courseware(&TransmissionRequest::new(ACTING_USER).for_customer(veridian.uuid.to_string()))
        .unwrap_err();
    assert!(matches!(err, ResolutionError::NoActiveChannel(uuid) if uuid == veridian.uuid));
}

#[test]
fn channel_codes_are_case_insensitive() {
    let veridian = customer(customer_uuid(), "Veridian Dynamics", Some(1));
    let store = store_with(&[veridian.clone()]);
    store.insert_catalog_course(1, demo_course(DEMO_COURSE)).unwrap();
    store.insert_channel_configuration(sap_configuration(1, veridian.uuid)).unwrap();
    let client = RecordingClient::succeeding();

    let report = orchestrator(&store, FakeClients::default().with(1, &client))
        .transmit_courseware(
            &TransmissionRequest::new(ACTING_USER)
                .for_customer(veridian.uuid.to_string())
                .on_channel("sap"),
        )
        .unwrap();
    assert_eq!(report.succeeded, 1);
}

#[test]
fn learner_runs_suppress_already_reported_completions() {
    let veridian = customer(customer_uuid(), "Veridian Dynamics", Some(1));
    let store = store_with(&[veridian.clone()]);
    store.insert_channel_configuration(sap_configuration(1, veridian.uuid)).unwrap();
    store
        .insert_enrollment(enrollment(1, veridian.uuid, "alice", DEMO_COURSE))
        .unwrap();
    store
        .insert_enrollment(enrollment(2, veridian.uuid, "bob", DEMO_COURSE))
        .unwrap();

    let mut consent = ConsentRecord::unsaved(ConsentKey::new("alice", DEMO_COURSE, veridian.uuid));
    consent.granted = Some(true);
    store.upsert(consent).unwrap();
    store
        .insert_progress(LearnerProgress {
            username: "alice".to_string(),
            course_id: DEMO_COURSE.to_string(),
            pacing: CoursePacing::SelfPaced,
            end: None,
            passed: true,
            certificate: None,
        })
        .unwrap();

    let client = RecordingClient::succeeding();
    let orchestrator = orchestrator(&store, FakeClients::default().with(1, &client));
    let request = TransmissionRequest::new(ACTING_USER);

    let first = orchestrator.transmit_learner_data(&request, &*store).unwrap();
    assert_eq!(first.succeeded, 1);
    assert_eq!(first.skipped, 1);

    let second = orchestrator.transmit_learner_data(&request, &*store).unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(second.suppressed, 1);
    assert_eq!(client.completions().len(), 1);
    assert_eq!(store.learner_audits(1).unwrap().len(), 1);
}
