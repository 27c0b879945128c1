use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use enterprise::catalog::CatalogCourse;
use enterprise::consent::{consent_router, ConsentPolicyEngine, ConsentService, CONSENT_PATH};
use enterprise::enterprise::EnterpriseCustomer;
use enterprise::store::SnapshotStore;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const COURSE: &str = "course-v1:edX+DemoX+Demo_Course";

fn open_store(path: &Path) -> Arc<SnapshotStore> {
    Arc::new(SnapshotStore::open(path).expect("store opens"))
}

fn seed(store: &SnapshotStore) -> Uuid {
    let uuid = Uuid::new_v4();
    let mut customer = EnterpriseCustomer::new(uuid, "Veridian Dynamics");
    customer.enable_data_sharing_consent = true;
    customer.catalog = Some(1);
    store.insert_customer(customer).expect("customer stored");
    store
        .insert_catalog_course(1, CatalogCourse::new(COURSE, "edX Demonstration Course"))
        .expect("course stored");
    uuid
}

fn engine(store: &Arc<SnapshotStore>) -> ConsentPolicyEngine {
    ConsentPolicyEngine::new(store.clone(), store.clone(), store.clone())
}

fn router(store: &Arc<SnapshotStore>) -> axum::Router {
    consent_router(Arc::new(ConsentService::new(engine(store))))
}

fn query(uuid: Uuid) -> String {
    format!(
        "{CONSENT_PATH}?username=bob&course_id={}&enterprise_customer_uuid={uuid}",
        COURSE.replace('+', "%2B")
    )
}

async fn body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn granted_consent_survives_a_restart() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("enterprise.json");
    let store = open_store(&path);
    let uuid = seed(&store);

    let before = router(&store)
        .oneshot(Request::get(query(uuid)).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(
        body(before).await,
        json!({
            "username": "bob",
            "enterprise_customer_uuid": uuid.to_string(),
            "course_id": COURSE,
            "exists": false,
            "consent_provided": false,
            "consent_required": true,
        })
    );

    let post = Request::post(CONSENT_PATH)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "username": "bob",
                "course_id": COURSE,
                "enterprise_customer_uuid": uuid.to_string(),
            })
            .to_string(),
        ))
        .unwrap();
    let granted = router(&store).oneshot(post).await.unwrap();
    assert_eq!(granted.status(), StatusCode::OK);
    let granted = body(granted).await;
    assert_eq!(granted["exists"], json!(true));
    assert_eq!(granted["consent_provided"], json!(true));
    assert_eq!(granted["consent_required"], json!(false));
    drop(store);

    let reopened = open_store(&path);
    assert!(engine(&reopened)
        .consent_provided("bob", COURSE, &uuid)
        .unwrap());

    let after = router(&reopened)
        .oneshot(Request::get(query(uuid)).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let after = body(after).await;
    assert_eq!(after["exists"], json!(true));
    assert_eq!(after["consent_provided"], json!(true));
}

#[tokio::test]
async fn refusing_missing_consent_creates_a_refusal() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = open_store(&dir.path().join("enterprise.json"));
    let uuid = seed(&store);

    let response = router(&store)
        .oneshot(Request::delete(query(uuid)).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let refused = body(response).await;
    assert_eq!(refused["exists"], json!(true));
    assert_eq!(refused["consent_provided"], json!(false));
    assert_eq!(refused["consent_required"], json!(true));

    let snapshot = store.snapshot().unwrap();
    assert_eq!(snapshot.consents.len(), 1);
    assert_eq!(snapshot.consents[0].granted, Some(false));
}
