//! Unit tests for the admission webhook
//!
//! Requests go through `Adjudicator::adjudicate` exactly as the HTTP server
//! hands them over, so every gate is exercised from the outside.

use axum::http::{Method, StatusCode};
use namespace_guard::webhooks::DECODE_FAILURE_PREFIX;
use namespace_guard::webhooks::review::AdmissionReviewResponse;
use namespace_guard::{Adjudication, BYPASS_ANNOTATION_KEY, HealthState};
use std::sync::Arc;
use std::time::Duration;
use serde_json::json;

use crate::common::*;

// =============================================================================
// Helper Functions
// =============================================================================

async fn post(cluster: &FakeCluster, body: &[u8]) -> Adjudication {
    cluster
        .adjudicator()
        .adjudicate(&Method::POST, "/", body)
        .await
}

fn review(outcome: &Adjudication) -> AdmissionReviewResponse {
    outcome.decode_review().expect("response is an AdmissionReview")
}

// =============================================================================
// Transport gates
// =============================================================================

mod transport_gates {
    use super::*;

    #[tokio::test]
    async fn test_wrong_method_is_405() {
        let outcome = FakeCluster::new("ns1")
            .adjudicator()
            .adjudicate(&Method::GET, "/namespaces", b"")
            .await;
        assert_eq!(outcome.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            String::from_utf8(outcome.body).unwrap(),
            "Incoming request method GET is not supported, only POST is supported"
        );
    }

    #[tokio::test]
    async fn test_wrong_path_is_404() {
        let outcome = FakeCluster::new("ns1")
            .adjudicator()
            .adjudicate(&Method::POST, "/namespaces", &delete_body("ns1"))
            .await;
        assert_eq!(outcome.status, StatusCode::NOT_FOUND);
        assert!(
            String::from_utf8(outcome.body)
                .unwrap()
                .contains("/namespaces 404 Not Found")
        );
    }

    #[tokio::test]
    async fn test_empty_body_is_malformed() {
        let outcome = post(&FakeCluster::new("ns1"), b"").await;
        assert_eq!(outcome.status, StatusCode::BAD_REQUEST);

        let resp = review(&outcome);
        assert!(!resp.response.allowed);
        assert!(resp.response.reason().starts_with(DECODE_FAILURE_PREFIX));
    }

    #[tokio::test]
    async fn test_review_without_request_is_malformed() {
        let body = to_body(&json!({"apiVersion": "admission.k8s.io/v1", "kind": "AdmissionReview"}));
        let outcome = post(&FakeCluster::new("ns1"), &body).await;
        assert!(outcome.status.is_client_error());
        assert!(review(&outcome).response.reason().starts_with(DECODE_FAILURE_PREFIX));
    }

    #[tokio::test]
    async fn test_malformed_body_never_queries_cluster() {
        let cluster = FakeCluster::new("ns1").with_count("pods", 1);
        post(&cluster, b"{not json").await;
        assert_eq!(cluster.query_calls(), 0);
    }
}

// =============================================================================
// Policy gates
// =============================================================================

mod policy_gates {
    use super::*;

    #[tokio::test]
    async fn test_admit_all_allows_despite_workloads() {
        let cluster = FakeCluster::new("ns1").with_every_kind(2).admit_all();
        let outcome = post(&cluster, &delete_body("ns1")).await;
        assert_eq!(outcome.status, StatusCode::OK);
        assert!(review(&outcome).response.allowed);
        assert_eq!(cluster.query_calls(), 0);
    }

    #[tokio::test]
    async fn test_admit_all_overrides_wrong_resource() {
        let mut body = review_json("ns1", "CREATE");
        body["request"]["resource"] = json!({"group": "", "version": "v1", "resource": "pods"});
        let outcome = post(&FakeCluster::new("ns1").admit_all(), &to_body(&body)).await;
        assert!(review(&outcome).response.allowed);
    }

    #[tokio::test]
    async fn test_non_namespace_resource_denied() {
        let mut body = review_json("ns1", "DELETE");
        body["request"]["resource"] = json!({"group": "", "version": "v1", "resource": "pods"});
        let outcome = post(&FakeCluster::new("ns1"), &to_body(&body)).await;

        assert_eq!(outcome.status, StatusCode::OK);
        let resp = review(&outcome);
        assert!(!resp.response.allowed);
        assert!(
            resp.response
                .reason()
                .contains("Incoming resource is not a Namespace: { v1 pods}")
        );
    }

    #[tokio::test]
    async fn test_non_delete_operation_denied() {
        let outcome = post(
            &FakeCluster::new("test-namespace"),
            &to_body(&review_json("test-namespace", "CREATE")),
        )
        .await;
        let resp = review(&outcome);
        assert!(!resp.response.allowed);
        assert!(resp.response.reason().contains(
            "Incoming operation is CREATE on namespace test-namespace. Only DELETE is currently supported."
        ));
    }

    #[tokio::test]
    async fn test_missing_namespace_allowed() {
        let cluster = FakeCluster::new("ns1").with_count("pods", 1).missing();
        let outcome = post(&cluster, &delete_body("ns1")).await;
        assert!(review(&outcome).response.allowed);
        assert_eq!(cluster.query_calls(), 0);
    }

    #[tokio::test]
    async fn test_namespace_lookup_failure_denied() {
        let cluster = FakeCluster::new("ns1").lookup_failing("etcd timeout");
        let outcome = post(&cluster, &delete_body("ns1")).await;
        let resp = review(&outcome);
        assert!(!resp.response.allowed);
        assert!(
            resp.response
                .reason()
                .starts_with("Error occurred while retrieving the namespace ns1: ")
        );
        assert!(resp.response.reason().contains("etcd timeout"));
        assert_eq!(cluster.query_calls(), 0);
    }

    #[tokio::test]
    async fn test_bypass_annotation_true_allows() {
        let cluster = FakeCluster::new("test-namespace")
            .with_count("pods", 1)
            .with_annotation(BYPASS_ANNOTATION_KEY, "true");
        let outcome = post(&cluster, &delete_body("test-namespace")).await;
        assert!(review(&outcome).response.allowed);
        assert_eq!(cluster.query_calls(), 0);
    }

    #[tokio::test]
    async fn test_bypass_annotation_other_values_evaluate() {
        for value in ["false", "True", "TRUE", "yes", " true", ""] {
            let cluster = FakeCluster::new("test-namespace")
                .with_count("pods", 1)
                .with_annotation(BYPASS_ANNOTATION_KEY, value);
            let resp = review(&post(&cluster, &delete_body("test-namespace")).await);
            assert!(!resp.response.allowed, "value {:?} must not bypass", value);
            assert!(resp.response.reason().contains(
                "The namespace test-namespace you are trying to remove contains one or more of these resources: [pods(1)]. Please delete them and try again."
            ));
        }
    }

    #[tokio::test]
    async fn test_unrelated_annotation_ignored() {
        let cluster = FakeCluster::new("ns1")
            .with_count("services", 1)
            .with_annotation("owner", "team-a");
        assert!(!review(&post(&cluster, &delete_body("ns1")).await).response.allowed);
    }
}

// =============================================================================
// Workload evaluation through the webhook
// =============================================================================

mod evaluation {
    use super::*;

    #[tokio::test]
    async fn test_empty_namespace_allowed() {
        let cluster = FakeCluster::new("ns1");
        let outcome = post(&cluster, &delete_body("ns1")).await;
        let resp = review(&outcome);
        assert!(resp.response.allowed);
        assert_eq!(resp.response.reason(), "");
        assert!(resp.response.status.is_none());
        assert_eq!(cluster.query_calls(), 8);
    }

    #[tokio::test]
    async fn test_single_pod_denied() {
        let cluster = FakeCluster::new("ns1").with_count("pods", 1);
        let resp = review(&post(&cluster, &delete_body("ns1")).await);
        assert!(!resp.response.allowed);

        let reason = resp.response.reason();
        assert!(reason.contains("pods(1)"));
        for other in [
            "services",
            "replicasets",
            "deployments",
            "statefulsets",
            "daemonsets",
            "ingresses",
            "horizontalpodautoscalers",
        ] {
            assert!(!reason.contains(other), "reason mentions {}", other);
        }
    }

    #[tokio::test]
    async fn test_every_kind_listed_in_order() {
        let cluster = FakeCluster::new("test-namespace").with_every_kind(1);
        let resp = review(&post(&cluster, &delete_body("test-namespace")).await);
        assert!(!resp.response.allowed);
        assert!(resp.response.reason().contains(
            "The namespace test-namespace you are trying to remove contains one or more of these resources: [pods(1) services(1) replicasets(1) deployments(1) statefulsets(1) daemonsets(1) ingresses(1) horizontalpodautoscalers(1)]. Please delete them and try again."
        ));
    }

    #[tokio::test]
    async fn test_query_error_denies_when_otherwise_empty() {
        let cluster = FakeCluster::new("ns1").with_failing("ingresses", "the server could not find the requested resource");
        let resp = review(&post(&cluster, &delete_body("ns1")).await);
        assert!(!resp.response.allowed);
        assert!(resp.response.reason().contains(
            "The following error(s) occurred while validating the DELETE operation on the namespace ns1: [error listing ingresses, "
        ));
        assert!(
            resp.response
                .reason()
                .contains("the server could not find the requested resource")
        );
        assert_eq!(cluster.query_calls(), 8);
    }

    #[tokio::test]
    async fn test_denial_names_bypass_command() {
        let cluster = FakeCluster::new("ns1").with_count("deployments", 4);
        let resp = review(&post(&cluster, &delete_body("ns1")).await);
        assert!(resp.response.reason().ends_with(
            " WARNING: If you know what you are doing, run `kubectl annotate namespace ns1 k8s-namespace-guard.admission.yahoo.com/allow-cascade-delete=true` to bypass this policy check."
        ));
    }

    #[tokio::test]
    async fn test_response_echoes_uid_and_version() {
        let mut body = review_json("ns1", "DELETE");
        body["apiVersion"] = json!("admission.k8s.io/v1beta1");
        let resp = review(&post(&FakeCluster::new("ns1"), &to_body(&body)).await);
        assert_eq!(resp.api_version, "admission.k8s.io/v1beta1");
        assert_eq!(resp.kind, "AdmissionReview");
        assert_eq!(resp.response.uid, "uid-ns1");
    }

    #[tokio::test]
    async fn test_same_request_same_verdict() {
        let cluster = FakeCluster::new("ns1")
            .with_count("pods", 2)
            .with_failing("services", "connection reset");
        let adjudicator = cluster.adjudicator();
        let body = delete_body("ns1");

        let first = adjudicator.adjudicate(&Method::POST, "/", &body).await;
        let second = adjudicator.adjudicate(&Method::POST, "/", &body).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_admit_all_is_per_adjudicator() {
        let strict = FakeCluster::new("ns1").with_count("pods", 1);
        let lenient = FakeCluster::new("ns1").with_count("pods", 1).admit_all();

        let body = delete_body("ns1");
        let (strict_outcome, lenient_outcome) =
            tokio::join!(post(&strict, &body), post(&lenient, &body));
        assert!(!review(&strict_outcome).response.allowed);
        assert!(review(&lenient_outcome).response.allowed);
    }

    #[tokio::test]
    async fn test_abandoned_evaluation_emits_no_verdict() {
        let cluster = FakeCluster::new("ns1")
            .with_count("pods", 1)
            .with_hanging("ingresses");
        let state = Arc::new(HealthState::new());
        let adjudicator = cluster.adjudicator().with_health_state(state.clone());
        let body = delete_body("ns1");

        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            adjudicator.adjudicate(&Method::POST, "/", &body),
        )
        .await;

        assert!(outcome.is_err());
        assert!(!state.metrics.encode().contains("verdict="));
    }
}
