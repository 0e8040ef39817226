use std::path::Path;

use anyhow::{Context, Result};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Event, Namespace, Pod};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::api::{DeleteParams, ListParams, LogParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, ResourceExt};
use tracing::debug;

use crate::error::FetchError;
use crate::model::{ResourceSummary, ViewKind};
use crate::provider::ResourceProvider;
use crate::ui::truncate;

const EVENT_LINES: usize = 8;

#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    context: String,
    cluster: String,
    default_namespace: String,
}

impl KubeGateway {
    /// Connects using `kubeconfig` when given, otherwise the usual kubeconfig
    /// discovery, otherwise in-cluster configuration.
    pub async fn connect(kubeconfig: Option<&Path>, context: Option<String>) -> Result<Self> {
        let kubeconfig = match kubeconfig {
            Some(path) => Some(
                Kubeconfig::read_from(path)
                    .with_context(|| format!("failed to read kubeconfig {}", path.display()))?,
            ),
            None => Kubeconfig::read().ok(),
        };

        let config = if let Some(kubeconfig_value) = kubeconfig.clone() {
            let options = KubeConfigOptions {
                context: context.clone(),
                cluster: None,
                user: None,
            };
            Config::from_custom_kubeconfig(kubeconfig_value, &options)
                .await
                .context("failed to infer Kubernetes configuration")?
        } else {
            if context.is_some() {
                anyhow::bail!("kubeconfig not found; --context cannot be applied");
            }
            Config::infer()
                .await
                .context("failed to infer Kubernetes configuration")?
        };

        let cluster = config.cluster_url.to_string();
        let default_namespace = config.default_namespace.clone();
        let client = Client::try_from(config).context("failed to initialize Kubernetes client")?;

        let context = context
            .or_else(|| {
                kubeconfig
                    .as_ref()
                    .and_then(|cfg| cfg.current_context.clone())
            })
            .unwrap_or_else(|| "in-cluster".to_string());

        Ok(Self {
            client,
            context,
            cluster,
            default_namespace,
        })
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    async fn related_events(
        &self,
        namespace: &str,
        kind: &str,
        name: &str,
    ) -> Result<Vec<Event>, kube::Error> {
        let events: Api<Event> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().fields(&format!(
            "involvedObject.kind={kind},involvedObject.name={name}"
        ));
        Ok(events.list(&params).await?.items)
    }

    async fn describe_pod(&self, namespace: &str, name: &str) -> Result<String, kube::Error> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let (pod, events) = futures::try_join!(
            pods.get(name),
            self.related_events(namespace, "Pod", name)
        )?;
        Ok(describe_pod_text(&pod, &events))
    }

    async fn describe_statefulset(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<String, kube::Error> {
        let statefulsets: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
        let (statefulset, events) = futures::try_join!(
            statefulsets.get(name),
            self.related_events(namespace, "StatefulSet", name)
        )?;
        Ok(describe_statefulset_text(&statefulset, &events))
    }
}

impl ResourceProvider for KubeGateway {
    async fn list_pods(&self, namespace: &str) -> Result<Vec<ResourceSummary>, FetchError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&list_params())
            .await
            .map_err(|error| FetchError::remote(format!("list pods in {namespace}"), error))?;
        Ok(sorted(list.iter().map(pod_summary).collect()))
    }

    async fn list_stateful_workloads(
        &self,
        namespace: &str,
    ) -> Result<Vec<ResourceSummary>, FetchError> {
        let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&list_params()).await.map_err(|error| {
            FetchError::remote(format!("list statefulsets in {namespace}"), error)
        })?;
        Ok(sorted(list.iter().map(statefulset_summary).collect()))
    }

    async fn list_custom_resource_definitions(&self) -> Result<Vec<ResourceSummary>, FetchError> {
        let api: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        let list = api
            .list(&list_params())
            .await
            .map_err(|error| FetchError::remote("list customresourcedefinitions", error))?;
        Ok(sorted(list.iter().map(crd_summary).collect()))
    }

    async fn list_namespaces(&self) -> Result<Vec<ResourceSummary>, FetchError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api
            .list(&list_params())
            .await
            .map_err(|error| FetchError::remote("list namespaces", error))?;
        Ok(sorted(list.iter().map(namespace_summary).collect()))
    }

    async fn delete_resource(
        &self,
        kind: ViewKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), FetchError> {
        let params = DeleteParams::default();
        let result = match kind {
            ViewKind::Pods => {
                let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
                api.delete(name, &params).await.map(|_| ())
            }
            ViewKind::StatefulWorkloads => {
                let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
                api.delete(name, &params).await.map(|_| ())
            }
            ViewKind::CustomResourceDefinitions => {
                let api: Api<CustomResourceDefinition> = Api::all(self.client.clone());
                api.delete(name, &params).await.map(|_| ())
            }
            ViewKind::Namespaces => {
                let api: Api<Namespace> = Api::all(self.client.clone());
                api.delete(name, &params).await.map(|_| ())
            }
        };

        debug!(kind = kind.short_token(), %name, ok = result.is_ok(), "delete requested");
        result.map_err(|error| {
            FetchError::remote(
                format!("delete {} {}", kind.short_token(), qualified(kind, namespace, name)),
                error,
            )
        })
    }

    async fn stream_logs(&self, namespace: &str, pod_name: &str) -> Result<String, FetchError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        pods.logs(pod_name, &LogParams::default())
            .await
            .map_err(|error| FetchError::remote(format!("logs {namespace}/{pod_name}"), error))
    }

    async fn describe_resource(
        &self,
        kind: ViewKind,
        namespace: &str,
        name: &str,
    ) -> Result<String, FetchError> {
        let result = match kind {
            ViewKind::Pods => self.describe_pod(namespace, name).await,
            ViewKind::StatefulWorkloads => self.describe_statefulset(namespace, name).await,
            ViewKind::CustomResourceDefinitions => {
                let api: Api<CustomResourceDefinition> = Api::all(self.client.clone());
                api.get(name).await.map(|crd| describe_crd_text(&crd))
            }
            ViewKind::Namespaces => {
                let api: Api<Namespace> = Api::all(self.client.clone());
                api.get(name)
                    .await
                    .map(|namespace| describe_namespace_text(&namespace))
            }
        };

        result.map_err(|error| {
            FetchError::remote(
                format!("describe {} {}", kind.short_token(), qualified(kind, namespace, name)),
                error,
            )
        })
    }
}

fn pod_summary(pod: &Pod) -> ResourceSummary {
    let phase = pod
        .status
        .as_ref()
        .and_then(|status| status.phase.clone())
        .unwrap_or_else(|| "Unknown".to_string());
    ResourceSummary::new(pod.name_any(), "Pod", phase)
}

fn statefulset_summary(statefulset: &StatefulSet) -> ResourceSummary {
    let (ready, desired) = statefulset_replicas(statefulset);
    ResourceSummary::new(
        statefulset.name_any(),
        "StatefulSet",
        format!("{ready}/{desired}"),
    )
}

fn crd_summary(crd: &CustomResourceDefinition) -> ResourceSummary {
    let status = if crd_established(crd) {
        "Established"
    } else {
        "NotEstablished"
    };
    ResourceSummary::new(crd.name_any(), crd.spec.names.kind.clone(), status)
}

fn namespace_summary(namespace: &Namespace) -> ResourceSummary {
    let phase = namespace
        .status
        .as_ref()
        .and_then(|status| status.phase.clone())
        .unwrap_or_else(|| "Active".to_string());
    ResourceSummary::new(namespace.name_any(), "Namespace", phase)
}

fn sorted(mut items: Vec<ResourceSummary>) -> Vec<ResourceSummary> {
    items.sort_by(|left, right| left.name.cmp(&right.name));
    items
}

fn statefulset_replicas(statefulset: &StatefulSet) -> (i32, i32) {
    let desired = statefulset
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(1);
    let ready = statefulset
        .status
        .as_ref()
        .and_then(|status| status.ready_replicas)
        .unwrap_or(0);
    (ready, desired)
}

fn crd_established(crd: &CustomResourceDefinition) -> bool {
    crd.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|condition| condition.type_ == "Established" && condition.status == "True")
        })
}

fn describe_pod_text(pod: &Pod, events: &[Event]) -> String {
    let phase = pod
        .status
        .as_ref()
        .and_then(|status| status.phase.clone())
        .unwrap_or_else(|| "Unknown".to_string());
    let node = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.node_name.clone())
        .unwrap_or_else(|| "-".to_string());
    let pod_ip = pod
        .status
        .as_ref()
        .and_then(|status| status.pod_ip.clone())
        .unwrap_or_else(|| "-".to_string());
    let (ready, total, restarts) = pod.status.as_ref().map(pod_readiness).unwrap_or((0, 0, 0));

    let mut lines = identity_lines("Pod", &pod.metadata);
    lines.push(format!("Status:     {phase}"));
    lines.push(format!("Ready:      {ready}/{total}"));
    lines.push(format!("Restarts:   {restarts}"));
    lines.push(format!("Node:       {node}"));
    lines.push(format!("Pod IP:     {pod_ip}"));
    lines.push(String::new());
    lines.push("Containers:".to_string());
    let containers = pod
        .spec
        .as_ref()
        .map(|spec| spec.containers.as_slice())
        .unwrap_or(&[]);
    if containers.is_empty() {
        lines.push("  -".to_string());
    }
    for container in containers {
        lines.push(format!(
            "  {}  {}",
            container.name,
            container.image.as_deref().unwrap_or("-")
        ));
    }
    lines.extend(event_section(events));
    lines.join("\n")
}

fn describe_statefulset_text(statefulset: &StatefulSet, events: &[Event]) -> String {
    let (ready, desired) = statefulset_replicas(statefulset);
    let status = statefulset.status.as_ref();
    let current = status
        .and_then(|status| status.current_replicas)
        .unwrap_or(0);
    let updated = status
        .and_then(|status| status.updated_replicas)
        .unwrap_or(0);
    let service = statefulset
        .spec
        .as_ref()
        .and_then(|spec| spec.service_name.clone())
        .unwrap_or_else(|| "-".to_string());
    let images = statefulset
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .map(|spec| {
            spec.containers
                .iter()
                .map(|container| container.image.clone().unwrap_or_else(|| "-".to_string()))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|images| !images.is_empty())
        .unwrap_or_else(|| "-".to_string());

    let mut lines = identity_lines("StatefulSet", &statefulset.metadata);
    lines.push(format!("Replicas:   {ready}/{desired} ready"));
    lines.push(format!("Current:    {current}"));
    lines.push(format!("Updated:    {updated}"));
    lines.push(format!("Service:    {service}"));
    lines.push(format!("Images:     {}", truncate(&images, 180)));
    lines.extend(event_section(events));
    lines.join("\n")
}

fn describe_crd_text(crd: &CustomResourceDefinition) -> String {
    let spec = &crd.spec;
    let versions = spec
        .versions
        .iter()
        .map(|version| {
            let mut flags = Vec::new();
            if version.served {
                flags.push("served");
            }
            if version.storage {
                flags.push("storage");
            }
            if flags.is_empty() {
                version.name.clone()
            } else {
                format!("{} ({})", version.name, flags.join(","))
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    let established = if crd_established(crd) {
        "Established"
    } else {
        "NotEstablished"
    };

    let mut lines = identity_lines("CustomResourceDefinition", &crd.metadata);
    lines.push(format!("Group:      {}", spec.group));
    lines.push(format!("Kind:       {}", spec.names.kind));
    lines.push(format!("Plural:     {}", spec.names.plural));
    lines.push(format!("Scope:      {}", spec.scope));
    lines.push(format!(
        "Versions:   {}",
        if versions.is_empty() {
            "-"
        } else {
            versions.as_str()
        }
    ));
    lines.push(format!("Status:     {established}"));
    lines.join("\n")
}

fn describe_namespace_text(namespace: &Namespace) -> String {
    let summary = namespace_summary(namespace);
    let mut lines = identity_lines("Namespace", &namespace.metadata);
    lines.push(format!("Status:     {}", summary.status));
    lines.join("\n")
}

fn identity_lines(kind: &str, metadata: &ObjectMeta) -> Vec<String> {
    let mut lines = vec![format!(
        "Name:       {}",
        metadata.name.as_deref().unwrap_or("-")
    )];
    if let Some(namespace) = metadata.namespace.as_deref() {
        lines.push(format!("Namespace:  {namespace}"));
    }
    lines.push(format!("Kind:       {kind}"));
    lines.push(format!("Labels:     {}", label_line(metadata)));
    lines.push(format!(
        "Age:        {}",
        human_age(metadata.creation_timestamp.as_ref())
    ));
    lines
}

fn label_line(metadata: &ObjectMeta) -> String {
    let Some(labels) = metadata.labels.as_ref().filter(|labels| !labels.is_empty()) else {
        return "-".to_string();
    };
    let pairs = labels
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>();
    truncate(&pairs.join(", "), 180)
}

fn event_section(events: &[Event]) -> Vec<String> {
    let mut lines = vec![String::new(), "Events:".to_string()];
    if events.is_empty() {
        lines.push("  -".to_string());
        return lines;
    }

    let mut recent = events.iter().collect::<Vec<_>>();
    recent.sort_by_key(|event| std::cmp::Reverse(event_timestamp_seconds(event)));
    lines.extend(recent.into_iter().take(EVENT_LINES).map(|event| {
        format!(
            "  [{}] {} {} {}",
            event_age(event),
            event.type_.as_deref().unwrap_or("-"),
            event.reason.as_deref().unwrap_or("-"),
            truncate(event.message.as_deref().unwrap_or("-"), 120)
        )
    }));
    lines
}

fn qualified(kind: ViewKind, namespace: &str, name: &str) -> String {
    if kind.namespaced() {
        format!("{namespace}/{name}")
    } else {
        name.to_string()
    }
}

fn list_params() -> ListParams {
    ListParams::default().limit(500)
}

fn pod_readiness(status: &k8s_openapi::api::core::v1::PodStatus) -> (usize, usize, i32) {
    let container_statuses = status.container_statuses.as_deref().unwrap_or(&[]);
    let total = container_statuses.len();
    let ready = container_statuses
        .iter()
        .filter(|container| container.ready)
        .count();
    let restarts = container_statuses
        .iter()
        .map(|container| container.restart_count)
        .sum();

    (ready, total, restarts)
}

fn event_age(event: &Event) -> String {
    if let Some(event_time) = event.event_time.as_ref() {
        return human_age_timestamp(event_time.0);
    }

    if let Some(last_timestamp) = event.last_timestamp.as_ref() {
        return human_age(Some(last_timestamp));
    }

    if let Some(first_timestamp) = event.first_timestamp.as_ref() {
        return human_age(Some(first_timestamp));
    }

    human_age(event.metadata.creation_timestamp.as_ref())
}

fn event_timestamp_seconds(event: &Event) -> i64 {
    event
        .event_time
        .as_ref()
        .map(|time| time.0.as_second())
        .or_else(|| event.last_timestamp.as_ref().map(|time| time.0.as_second()))
        .or_else(|| {
            event
                .first_timestamp
                .as_ref()
                .map(|time| time.0.as_second())
        })
        .or_else(|| {
            event
                .metadata
                .creation_timestamp
                .as_ref()
                .map(|time| time.0.as_second())
        })
        .unwrap_or(0)
}

fn human_age(timestamp: Option<&Time>) -> String {
    let Some(timestamp) = timestamp else {
        return "-".to_string();
    };

    human_age_timestamp(timestamp.0)
}

fn human_age_timestamp(ts: k8s_openapi::jiff::Timestamp) -> String {
    let elapsed_seconds = (k8s_openapi::jiff::Timestamp::now().as_second() - ts.as_second()).max(0);
    format_elapsed_seconds(elapsed_seconds)
}

fn format_elapsed_seconds(seconds: i64) -> String {
    if seconds >= 86_400 {
        return format!("{}d", seconds / 86_400);
    }

    if seconds >= 3_600 {
        return format!("{}h", seconds / 3_600);
    }

    if seconds >= 60 {
        return format!("{}m", seconds / 60);
    }

    format!("{seconds}s")
}
