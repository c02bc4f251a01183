//! S3 store integration tests - actually call AWS APIs
//!
//! These tests are marked `#[ignore]` and only run with:
//! ```
//! AWS_PROFILE=your_profile KLUSTER_TEST_BUCKET=my-bucket/kluster-tests \
//!     cargo test -p kluster-core --test s3_store_integration -- --ignored
//! ```

use kluster_core::aws::S3Client;
use kluster_core::cluster::{AwsCluster, ClusterManager};
use kluster_core::config::{ManagerConfig, StoreSettings};
use kluster_core::executor::{ProvisionExecutor, TaskState};
use kluster_core::provisioner::ProvisionerRegistry;
use kluster_core::store::{ConfigStore, StorageKind, StoreError};
use kluster_test_utils::{
    RecordingProvisioner, demo_aws_cluster, get_test_bucket, get_test_region, test_cluster_name,
};

fn bucket_or_skip() -> Option<String> {
    let bucket = get_test_bucket();
    if bucket.is_none() {
        eprintln!("KLUSTER_TEST_BUCKET not set, skipping");
    }
    bucket
}

/// Test the document lifecycle directly against the store
#[tokio::test]
#[ignore]
async fn test_store_document_lifecycle() {
    let Some(bucket) = bucket_or_skip() else {
        return;
    };
    let region = get_test_region();
    let file_name = format!("aws-{}.yaml", test_cluster_name());
    let store = ConfigStore::new(StorageKind::S3, &file_name, &bucket, &region);

    store.validate_config().expect("Handle should validate");
    assert!(!store.check_config_exists().await.expect("Should probe"));

    store
        .create_config(&serde_yaml::Value::String("hello".to_string()))
        .await
        .expect("Should write document");
    assert!(store.check_config_exists().await.expect("Should probe"));
    assert_eq!(store.get_config().await.expect("Should read"), b"hello\n");

    let listed = store.list_configs("aws-").await.expect("Should list");
    assert!(listed.contains(&file_name));

    store.delete_config().await.expect("Should delete");
    assert!(matches!(
        store.delete_config().await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.get_config().await,
        Err(StoreError::NotFound { .. })
    ));
}

/// Test create / get / destroy through the manager on S3
#[tokio::test]
#[ignore]
async fn test_manager_on_s3() {
    let Some(bucket) = bucket_or_skip() else {
        return;
    };
    let region = get_test_region();
    let registry = ProvisionerRegistry::builder()
        .register("aws", RecordingProvisioner::new())
        .build();
    let (executor, worker) = ProvisionExecutor::spawn();
    let manager = ClusterManager::new(
        StoreSettings::s3(&bucket, &region),
        registry,
        executor.clone(),
        ManagerConfig::default(),
    );

    let cluster = AwsCluster {
        clustername: test_cluster_name(),
        ..demo_aws_cluster()
    };

    let mut task = manager.create(&cluster).await.expect("Should create");
    assert_eq!(task.wait().await, TaskState::Succeeded);

    let stored: AwsCluster = manager
        .get(&cluster.clustername)
        .await
        .expect("Should read back");
    assert_eq!(stored, cluster);

    let mut task = manager
        .destroy::<AwsCluster>(&cluster.clustername)
        .await
        .expect("Should destroy");
    assert_eq!(task.wait().await, TaskState::Succeeded);

    let err = manager
        .get::<AwsCluster>(&cluster.clustername)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    executor.shutdown();
    worker.await.unwrap();
}

/// Test the raw client on a missing object
#[tokio::test]
#[ignore]
async fn test_missing_object() {
    let Some(bucket) = bucket_or_skip() else {
        return;
    };
    let bucket = bucket.split('/').next().unwrap_or_default().to_string();
    let client = S3Client::new(&get_test_region()).await;

    let key = format!("{}.yaml", test_cluster_name());
    let exists = client
        .object_exists(&bucket, &key)
        .await
        .expect("AWS credentials required");
    assert!(!exists);

    let body = client
        .download_bytes(&bucket, &key)
        .await
        .expect("Should download");
    assert_eq!(body, None);
}
