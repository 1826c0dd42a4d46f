//! End-to-end pipeline tests: archive text in, cluster calls out

use k8s_openapi::api::core::v1::Pod;
use opkit_core::create_archive;
use opkit_kube::{
    AgentConfig, ClusterCall, DeploymentRequest, InstallOptions, KubeError, MockCluster,
    OperatorClient, UninstallResult,
};
use serde_json::json;

const NAMESPACE: &str = r#"apiVersion: v1
kind: Namespace
metadata:
  name: widget-system
"#;

const ROLE: &str = r#"apiVersion: rbac.authorization.k8s.io/v1
kind: Role
metadata:
  name: widget-role
rules:
  - apiGroups: ["example.com"]
    resources: ["widgets"]
    verbs: ["get", "list", "watch"]
"#;

const ROLE_BINDING: &str = r#"apiVersion: rbac.authorization.k8s.io/v1
kind: RoleBinding
metadata:
  name: widget-binding
roleRef:
  apiGroup: rbac.authorization.k8s.io
  kind: Role
  name: widget-role
subjects:
  - kind: ServiceAccount
    name: widget-operator
"#;

const DEPLOYMENT: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: widget-operator
spec:
  replicas: 1
  selector:
    matchLabels:
      app: widget-operator
  template:
    metadata:
      labels:
        app: widget-operator
    spec:
      serviceAccountName: widget-operator
      containers:
        - name: operator
          image: example/widget-operator:1.2.0
        - name: metrics
          image: example/metrics-proxy:0.4
"#;

/// The operator Deployment with bare-number resource quantities
fn deployment_with_numeric_quantities() -> String {
    DEPLOYMENT.replace(
        "          image: example/widget-operator:1.2.0\n",
        "          image: example/widget-operator:1.2.0
          resources:
            limits:
              cpu: 1
              memory: 512
            requests:
              cpu: 0.25
",
    )
}

const SERVICE_ACCOUNT: &str = r#"apiVersion: v1
kind: ServiceAccount
metadata:
  name: widget-operator
"#;

const CRD: &str = r#"apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: widgets.example.com
spec:
  group: example.com
  names:
    kind: Widget
    listKind: WidgetList
    plural: widgets
    singular: widget
  scope: Namespaced
  versions:
    - name: v1
      served: true
      storage: true
      schema:
        openAPIV3Schema:
          type: object
          x-kubernetes-preserve-unknown-fields: true
"#;

const WIDGET: &str = r#"apiVersion: example.com/v1
kind: Widget
metadata:
  name: widget-sample
spec:
  size: 3
"#;

const CONFIG_MAP: &str = r#"apiVersion: v1
kind: ConfigMap
metadata:
  name: widget-settings
data:
  mode: edge
"#;

const OPERATOR_GROUP: &str = r#"apiVersion: operators.coreos.com/v1
kind: OperatorGroup
metadata:
  name: widget-group
"#;

/// One object of every base kind, in reverse install order, plus
/// unstructured objects
fn full_bundle() -> String {
    [
        WIDGET,
        CRD,
        SERVICE_ACCOUNT,
        DEPLOYMENT,
        ROLE_BINDING,
        ROLE,
        NAMESPACE,
        CONFIG_MAP,
        OPERATOR_GROUP,
    ]
    .iter()
    .map(|doc| doc.trim())
    .collect::<Vec<_>>()
    .join("\n---\n")
}

fn archive(files: &[(&str, &str)]) -> String {
    create_archive(files).expect("archive builds")
}

fn bundle_archive() -> String {
    archive(&[("bundle.yaml", full_bundle().as_str())])
}

fn client(cluster: MockCluster) -> OperatorClient<MockCluster> {
    OperatorClient::new(cluster, AgentConfig::default())
}

fn kinds(objects: &[(String, String)]) -> Vec<&str> {
    objects.iter().map(|(kind, _)| kind.as_str()).collect()
}

mod install {
    use super::*;

    #[tokio::test]
    async fn test_base_kinds_installed_in_fixed_order() {
        let client = client(MockCluster::new());
        let request = DeploymentRequest::new(bundle_archive(), "ag-1");

        let report = client
            .install(&request, &InstallOptions::default())
            .await
            .unwrap();

        assert_eq!(report.namespace, "widget-system");
        assert_eq!(
            kinds(&client.cluster().created()),
            vec![
                "Namespace",
                "Role",
                "RoleBinding",
                "Deployment",
                "ServiceAccount",
                "CustomResourceDefinition",
                "Widget",
                "ConfigMap",
            ]
        );
        // OperatorGroup is skipped, never sent to the cluster
        assert!(!client.cluster().contains("OperatorGroup", Some("widget-system"), "widget-group"));
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].kind.as_deref(), Some("OperatorGroup"));
        assert_eq!(report.skipped[0].source.as_deref(), Some("bundle.yaml"));
        assert_eq!(report.skipped[0].reason, opkit_core::SkipReason::UnsupportedKind);
    }

    #[tokio::test]
    async fn test_crd_established_before_custom_resources() {
        let client = client(MockCluster::new());
        let request = DeploymentRequest::new(bundle_archive(), "ag-1");
        let options = InstallOptions::new().with_cr_install_timeout(std::time::Duration::from_secs(7));

        client.install(&request, &options).await.unwrap();

        let calls = client.cluster().calls();
        let wait = calls
            .iter()
            .position(|c| matches!(c, ClusterCall::WaitForCrd { .. }))
            .expect("waited for CRD");
        let widget = calls
            .iter()
            .position(|c| c.object() == Some(("Widget", "widget-sample")))
            .expect("created widget");
        assert!(wait < widget);
        assert_eq!(
            calls[wait],
            ClusterCall::WaitForCrd {
                name: "widgets.example.com".to_string(),
                timeout: std::time::Duration::from_secs(7),
            }
        );
    }

    #[tokio::test]
    async fn test_first_failure_stops_install_without_rollback() {
        let cluster = MockCluster::new().fail_create_of("Deployment", "widget-operator");
        let client = client(cluster);
        let request = DeploymentRequest::new(bundle_archive(), "ag-1");

        let err = client
            .install(&request, &InstallOptions::default())
            .await
            .unwrap_err();

        assert!(err.is_cluster_error());
        assert_eq!(err.status_code(), Some(500));

        let created = client.cluster().created();
        assert_eq!(
            kinds(&created),
            vec!["Namespace", "Role", "RoleBinding", "Deployment"]
        );
        assert!(client.cluster().contains("Role", Some("widget-system"), "widget-role"));
        assert!(client.cluster().deleted().is_empty());
    }

    #[tokio::test]
    async fn test_namespace_conflict_has_no_side_effects() {
        let config = AgentConfig {
            namespace: "edge-agent".to_string(),
            ..Default::default()
        };
        let client = OperatorClient::new(MockCluster::new(), config);
        let request = DeploymentRequest::new(bundle_archive(), "ag-1");

        let err = client
            .install(&request, &InstallOptions::new().with_env_var("A", "1"))
            .await
            .unwrap_err();

        match err {
            KubeError::NamespaceConflict {
                namespace,
                node_namespace,
                ..
            } => {
                assert_eq!(namespace, "widget-system");
                assert_eq!(node_namespace, "edge-agent");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(client.cluster().calls().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_namespace_wins_over_archive() {
        let client = client(MockCluster::new());
        let request = DeploymentRequest::new(bundle_archive(), "ag-1")
            .with_metadata_entry("namespace", json!("from-metadata"));

        let report = client
            .install(&request, &InstallOptions::default())
            .await
            .unwrap();

        assert_eq!(report.namespace, "from-metadata");
        assert!(client.cluster().contains("Namespace", None, "from-metadata"));
        assert!(client.cluster().contains("Role", Some("from-metadata"), "widget-role"));
    }

    #[tokio::test]
    async fn test_multiple_files_keep_archive_order() {
        let client = client(MockCluster::new());
        let request = DeploymentRequest::new(
            archive(&[
                ("b-settings.yaml", CONFIG_MAP),
                ("a-widget.yaml", WIDGET),
                ("role.yaml", ROLE),
            ]),
            "ag-1",
        );

        client
            .install(&request, &InstallOptions::default())
            .await
            .unwrap();

        assert_eq!(
            kinds(&client.cluster().created()),
            vec!["Role", "ConfigMap", "Widget"]
        );
    }

    #[tokio::test]
    async fn test_malformed_manifest_creates_nothing() {
        let client = client(MockCluster::new());
        let request = DeploymentRequest::new(
            archive(&[("role.yaml", ROLE), ("broken.yaml", "kind: Widget\nspec: [oops\n")]),
            "ag-1",
        );

        let err = client
            .install(&request, &InstallOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, KubeError::Processing(_)));
        assert!(client.cluster().calls().is_empty());
    }
}

mod environment {
    use super::*;

    #[tokio::test]
    async fn test_env_config_created_and_referenced() {
        let client = client(MockCluster::new());
        let request = DeploymentRequest::new(archive(&[("deploy.yaml", DEPLOYMENT)]), "ag-42");
        let options = InstallOptions::new()
            .with_env_var("", "dropped")
            .with_env_var("HZN_ORG_ID", "acme")
            .with_env_var("HZN_DEVICE_ID", "node-7");

        client.install(&request, &options).await.unwrap();

        let config_map = client
            .cluster()
            .get("ConfigMap", Some("openhorizon-agent"), "hzn-env-vars-ag-42")
            .expect("config map created");
        assert_eq!(
            config_map.data["data"],
            json!({"HZN_DEVICE_ID": "node-7", "HZN_ORG_ID": "acme"})
        );

        let deployment = client
            .cluster()
            .get("Deployment", Some("openhorizon-agent"), "widget-operator")
            .expect("deployment created");
        let containers = deployment.data["spec"]["template"]["spec"]["containers"]
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(containers.len(), 2);
        for container in containers {
            assert_eq!(
                container["env"],
                json!([{"name": "HZN_ENV_VARS", "value": "hzn-env-vars-ag-42"}])
            );
        }
    }

    #[tokio::test]
    async fn test_numeric_quantities_still_get_env_config() {
        let client = client(MockCluster::new());
        let body = deployment_with_numeric_quantities();
        let request = DeploymentRequest::new(archive(&[("deploy.yaml", body.as_str())]), "ag-7");

        client
            .install(&request, &InstallOptions::new().with_env_var("A", "1"))
            .await
            .unwrap();

        assert_eq!(
            kinds(&client.cluster().created()),
            vec!["ConfigMap", "Deployment"]
        );
        let deployment = client
            .cluster()
            .get("Deployment", Some("openhorizon-agent"), "widget-operator")
            .expect("deployment created");
        let operator = &deployment.data["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(
            operator["env"],
            json!([{"name": "HZN_ENV_VARS", "value": "hzn-env-vars-ag-7"}])
        );
        assert_eq!(
            operator["resources"],
            json!({"limits": {"cpu": "1", "memory": "512"}, "requests": {"cpu": "0.25"}})
        );
    }

    #[tokio::test]
    async fn test_only_empty_names_means_no_config_map() {
        let client = client(MockCluster::new());
        let request = DeploymentRequest::new(archive(&[("deploy.yaml", DEPLOYMENT)]), "ag-1");

        client
            .install(&request, &InstallOptions::new().with_env_var("", "x"))
            .await
            .unwrap();

        assert_eq!(kinds(&client.cluster().created()), vec!["Deployment"]);
        let deployment = client
            .cluster()
            .get("Deployment", Some("openhorizon-agent"), "widget-operator")
            .unwrap();
        assert!(deployment.data["spec"]["template"]["spec"]["containers"][0]["env"].is_null());
    }

    #[tokio::test]
    async fn test_second_install_collides_on_config_map() {
        let client = client(MockCluster::new());
        let request = DeploymentRequest::new(archive(&[("deploy.yaml", DEPLOYMENT)]), "ag-1");
        let options = InstallOptions::new().with_env_var("A", "1");

        client.install(&request, &options).await.unwrap();
        let err = client.install(&request, &options).await.unwrap_err();

        assert!(matches!(err, KubeError::ConfigCreation { .. }));
    }
}

mod uninstall {
    use super::*;

    #[tokio::test]
    async fn test_crds_removed_first_then_reverse_order() {
        let client = client(MockCluster::new());
        let request = DeploymentRequest::new(bundle_archive(), "ag-1");
        client
            .install(&request, &InstallOptions::default())
            .await
            .unwrap();
        client.cluster().reset_calls();

        let report = client.uninstall(&request).await.unwrap();

        assert!(report.is_success());
        assert_eq!(
            kinds(&client.cluster().deleted()),
            vec![
                "CustomResourceDefinition",
                "ServiceAccount",
                "Deployment",
                // environment config map of the workload
                "ConfigMap",
                "RoleBinding",
                "Role",
                "Namespace",
                "Widget",
                "ConfigMap",
            ]
        );
        assert_eq!(client.cluster().object_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_delete_does_not_abort() {
        let cluster = MockCluster::new().fail_delete_of("Deployment", "widget-operator");
        let client = client(cluster);
        let request = DeploymentRequest::new(bundle_archive(), "ag-1");
        client
            .install(&request, &InstallOptions::default())
            .await
            .unwrap();

        let report = client.uninstall(&request).await.unwrap();

        assert!(!report.is_success());
        let failed: Vec<_> = report.failed().map(|o| o.display_name()).collect();
        assert_eq!(failed, vec!["Deployment/widget-operator"]);

        let deleted = client.cluster().deleted();
        let after_failure: Vec<_> = deleted
            .iter()
            .skip_while(|(kind, _)| kind != "Deployment")
            .skip(1)
            .map(|(kind, _)| kind.as_str())
            .collect();
        assert_eq!(
            after_failure,
            vec!["ConfigMap", "RoleBinding", "Role", "Namespace", "Widget", "ConfigMap"]
        );
    }

    #[tokio::test]
    async fn test_missing_objects_are_skipped() {
        let client = client(MockCluster::new());
        let request = DeploymentRequest::new(bundle_archive(), "ag-1");

        let report = client.uninstall(&request).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.outcomes.len(), 8);
        assert!(
            report
                .outcomes
                .iter()
                .all(|o| matches!(o.result, UninstallResult::Skipped(_)))
        );
    }

    #[tokio::test]
    async fn test_deployment_uninstall_removes_env_config() {
        let client = client(MockCluster::new());
        let request = DeploymentRequest::new(archive(&[("deploy.yaml", DEPLOYMENT)]), "ag-1");
        client
            .install(&request, &InstallOptions::new().with_env_var("A", "1"))
            .await
            .unwrap();

        client.uninstall(&request).await.unwrap();

        assert!(!client
            .cluster()
            .contains("ConfigMap", Some("openhorizon-agent"), "hzn-env-vars-ag-1"));
    }

    #[tokio::test]
    async fn test_objects_from_an_earlier_run_are_deleted() {
        let cluster = MockCluster::new();
        let stored = |value: serde_json::Value| -> kube::core::DynamicObject {
            serde_json::from_value(value).unwrap()
        };
        cluster
            .insert(
                Some("openhorizon-agent"),
                stored(json!({
                    "apiVersion": "apps/v1",
                    "kind": "Deployment",
                    "metadata": {"name": "widget-operator", "namespace": "openhorizon-agent"}
                })),
            )
            .unwrap();
        cluster
            .insert(
                Some("openhorizon-agent"),
                stored(json!({
                    "apiVersion": "v1",
                    "kind": "ConfigMap",
                    "metadata": {"name": "hzn-env-vars-ag-1", "namespace": "openhorizon-agent"}
                })),
            )
            .unwrap();
        let client = client(cluster);
        let request = DeploymentRequest::new(archive(&[("deploy.yaml", DEPLOYMENT)]), "ag-1");

        let report = client.uninstall(&request).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].result, UninstallResult::Deleted);
        assert_eq!(
            kinds(&client.cluster().deleted()),
            vec!["Deployment", "ConfigMap"]
        );
        assert_eq!(client.cluster().object_count(), 0);
    }
}

mod status {
    use super::*;
    use opkit_kube::ContainerState;

    fn operator_pod() -> Pod {
        serde_json::from_value(json!({
            "metadata": {
                "name": "widget-operator-7d4b9",
                "labels": {"app": "widget-operator"}
            },
            "status": {
                "containerStatuses": [
                    {
                        "name": "operator",
                        "image": "example/widget-operator:1.2.0",
                        "imageID": "",
                        "ready": true,
                        "restartCount": 0,
                        "state": {"running": {"startedAt": "2024-05-01T12:30:00Z"}}
                    },
                    {
                        "name": "metrics",
                        "image": "example/metrics-proxy:0.4",
                        "imageID": "",
                        "ready": false,
                        "restartCount": 2,
                        "state": {"waiting": {"reason": "CrashLoopBackOff"}}
                    }
                ]
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_status_reports_containers_in_order() {
        let cluster = MockCluster::new().with_pods("openhorizon-agent", vec![operator_pod()]);
        let client = client(cluster);
        let request = DeploymentRequest::new(archive(&[("deploy.yaml", DEPLOYMENT)]), "ag-1");

        let statuses = client.status(&request).await.unwrap();

        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].name, "operator");
        assert!(matches!(statuses[0].state, ContainerState::Running { started_at: Some(_) }));
        assert_eq!(statuses[0].created_time(), 1714566600);
        assert_eq!(statuses[1].name, "metrics");
        assert_eq!(statuses[1].state, ContainerState::Waiting);
    }

    #[tokio::test]
    async fn test_operator_status_is_raw_pod_list() {
        let cluster = MockCluster::new().with_pods("openhorizon-agent", vec![operator_pod()]);
        let client = client(cluster);
        let request = DeploymentRequest::new(archive(&[("deploy.yaml", DEPLOYMENT)]), "ag-1");

        let payload = client.operator_status(&request).await.unwrap();

        assert_eq!(payload["kind"], "PodList");
        assert_eq!(payload["items"][0]["metadata"]["name"], "widget-operator-7d4b9");
    }

    #[tokio::test]
    async fn test_no_pods_is_empty_not_error() {
        let client = client(MockCluster::new());
        let request = DeploymentRequest::new(archive(&[("deploy.yaml", DEPLOYMENT)]), "ag-1");

        assert!(client.status(&request).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_deployments_is_not_found() {
        let client = client(MockCluster::new());
        let request = DeploymentRequest::new(archive(&[("role.yaml", ROLE)]), "ag-1");

        assert!(matches!(
            client.status(&request).await.unwrap_err(),
            KubeError::NotFound { .. }
        ));
        assert!(matches!(
            client.operator_status(&request).await.unwrap_err(),
            KubeError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_status_uses_requested_namespace() {
        let cluster = MockCluster::new().with_pods("tenant-a", vec![operator_pod()]);
        let client = client(cluster);
        let request = DeploymentRequest::new(archive(&[("deploy.yaml", DEPLOYMENT)]), "ag-1")
            .with_namespace("tenant-a");

        let statuses = client.status(&request).await.unwrap();
        assert_eq!(statuses.len(), 2);
        assert!(client.cluster().calls().contains(&ClusterCall::ListPods {
            namespace: "tenant-a".to_string(),
            selector: "app=widget-operator".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_numeric_quantities_do_not_hide_the_deployment() {
        let cluster = MockCluster::new().with_pods("openhorizon-agent", vec![operator_pod()]);
        let client = client(cluster);
        let body = deployment_with_numeric_quantities();
        let request = DeploymentRequest::new(archive(&[("deploy.yaml", body.as_str())]), "ag-1");

        let statuses = client.status(&request).await.unwrap();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].name, "operator");
    }

    #[tokio::test]
    async fn test_expression_selector_ignores_unrelated_pods() {
        let postgres: Pod = serde_json::from_value(json!({
            "metadata": {"name": "postgres-0", "labels": {"app": "postgres"}},
            "status": {
                "containerStatuses": [{
                    "name": "postgres",
                    "image": "postgres:16",
                    "imageID": "",
                    "ready": true,
                    "restartCount": 0,
                    "state": {"running": {"startedAt": "2024-05-01T12:00:00Z"}}
                }]
            }
        }))
        .unwrap();
        let cluster = MockCluster::new().with_pods("openhorizon-agent", vec![postgres]);
        let client = client(cluster);
        let body = DEPLOYMENT.replace(
            "    matchLabels:\n      app: widget-operator\n",
            "    matchExpressions:\n      - key: app\n        operator: In\n        values: [widget-operator]\n",
        );
        let request = DeploymentRequest::new(archive(&[("deploy.yaml", body.as_str())]), "ag-1");

        assert!(client.status(&request).await.unwrap().is_empty());
        assert!(client.cluster().calls().contains(&ClusterCall::ListPods {
            namespace: "openhorizon-agent".to_string(),
            selector: "app in (widget-operator)".to_string(),
        }));

        let cluster = MockCluster::new().with_pods("openhorizon-agent", vec![operator_pod()]);
        let client = super::client(cluster);
        assert_eq!(client.status(&request).await.unwrap().len(), 2);
    }
}
