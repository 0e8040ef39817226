use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::error::FetchError;
use crate::model::{ResourceSummary, ViewKind};

/// Operations the dashboard needs from the cluster.
///
/// Cluster-scoped kinds ignore the `namespace` argument.
pub trait ResourceProvider: Send + Sync + 'static {
    fn list_pods(
        &self,
        namespace: &str,
    ) -> impl Future<Output = Result<Vec<ResourceSummary>, FetchError>> + Send;

    fn list_stateful_workloads(
        &self,
        namespace: &str,
    ) -> impl Future<Output = Result<Vec<ResourceSummary>, FetchError>> + Send;

    fn list_custom_resource_definitions(
        &self,
    ) -> impl Future<Output = Result<Vec<ResourceSummary>, FetchError>> + Send;

    fn list_namespaces(&self)
    -> impl Future<Output = Result<Vec<ResourceSummary>, FetchError>> + Send;

    fn delete_resource(
        &self,
        kind: ViewKind,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Result<(), FetchError>> + Send;

    /// Full log text of the pod so far.
    fn stream_logs(
        &self,
        namespace: &str,
        pod_name: &str,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;

    fn describe_resource(
        &self,
        kind: ViewKind,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;
}

pub async fn list_view<P: ResourceProvider>(
    provider: &P,
    view: ViewKind,
    namespace: &str,
) -> Result<Vec<ResourceSummary>, FetchError> {
    match view {
        ViewKind::Pods => provider.list_pods(namespace).await,
        ViewKind::StatefulWorkloads => provider.list_stateful_workloads(namespace).await,
        ViewKind::CustomResourceDefinitions => provider.list_custom_resource_definitions().await,
        ViewKind::Namespaces => provider.list_namespaces().await,
    }
}

/// Runs a remote call under a deadline; expiry becomes `FetchError::Timeout`.
pub async fn bounded<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    match timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout { operation, limit }),
    }
}
