//! Integration tests for the HTTP client against a live server.

mod common;

use common::TestRegistry;
use corral_proto::{
    AdmissionConstraint, ClusterState, ErrorCode, RegisterRequest, UpdateProperty, Workload,
};
use corral_scheduler::{ClusterClient, SchedulerError};

#[tokio::test]
async fn agent_lifecycle_over_http() {
    let registry = TestRegistry::new();
    let client = ClusterClient::with_url(registry.serve().await).unwrap();

    assert!(client.health().await.unwrap());

    let request = RegisterRequest::new("eu-1", "https://eu-1.example.com");
    let status = client.register(&request).await.unwrap();
    assert_eq!(status.state, ClusterState::Available);

    let err = client.register(&request).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyExists);

    let again = client.register_idempotent(&request).await.unwrap();
    assert_eq!(again.name, "eu-1");

    client
        .update("eu-1", &UpdateProperty::Cordoned(true))
        .await
        .unwrap();
    assert_eq!(
        client.get("eu-1").await.unwrap().state,
        ClusterState::Cordoned
    );

    client.deregister("eu-1", false).await.unwrap();
    let err = client.get("eu-1").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert!(client.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn schedule_over_http_carries_rejections() {
    let registry = TestRegistry::new();
    let client = ClusterClient::with_url(registry.serve().await).unwrap();

    client
        .register(
            &RegisterRequest::new("gated", "https://gated.example.com")
                .with_constraint(AdmissionConstraint::HasFeaturePreview),
        )
        .await
        .unwrap();

    match client.schedule(&Workload::new()).await.unwrap_err() {
        SchedulerError::NoCapacity { rejections } => {
            assert_eq!(rejections.len(), 1);
            assert_eq!(rejections[0].constraint, AdmissionConstraint::HasFeaturePreview);
        }
        other => panic!("expected NoCapacity, got {other}"),
    }

    let report = client
        .admission(&Workload::new().with_feature_preview())
        .await
        .unwrap();
    assert_eq!(report.eligible, ["gated"]);
    assert!(report.rejected.is_empty());

    let report = client.admission(&Workload::new()).await.unwrap();
    assert!(report.eligible.is_empty());
    assert_eq!(report.rejected[0].cluster, "gated");

    client.drain("gated").await.unwrap();
    let err = client
        .update("gated", &UpdateProperty::Cordoned(true))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn dot_names_are_rejected_before_reaching_a_url() {
    let registry = TestRegistry::new();
    let client = ClusterClient::with_url(registry.serve().await).unwrap();

    for name in [".", "..", "..."] {
        let err = client
            .register(&RegisterRequest::new(name, "https://dots.example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument, "{name}");
    }
    assert!(client.list().await.unwrap().is_empty());

    client
        .register(&RegisterRequest::new("a.b", "https://dots.example.com"))
        .await
        .unwrap();
    assert_eq!(client.get("a.b").await.unwrap().name, "a.b");
}
