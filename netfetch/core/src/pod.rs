use crate::{Labels, Map};
use serde::Serialize;
use std::fmt;

/// Uniquely identifies a pod within the cluster.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PodId {
    pub namespace: String,
    pub name: String,
}

/// The subset of a pod's state that coverage evaluation depends on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pod {
    pub id: PodId,
    pub labels: Labels,
    pub phase: Phase,
    pub ip: Option<String>,
    pub ports: Vec<ContainerPort>,
}

/// A port declared by one of the pod's containers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub container_port: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

/// A pod's identity, labels and declared ports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    pub labels: Map,
    pub ports: Vec<ContainerPort>,
}

/// A pod that no applicable policy covers, as reported to callers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct UnprotectedPod {
    pub namespace: String,
    pub name: String,
    pub ip: Option<String>,
}

// === impl PodId ===

impl PodId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// === impl Pod ===

impl Pod {
    #[inline]
    pub fn namespace(&self) -> &str {
        &self.id.namespace
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.id.name
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }
}

impl From<&Pod> for UnprotectedPod {
    fn from(pod: &Pod) -> Self {
        Self {
            namespace: pod.id.namespace.clone(),
            name: pod.id.name.clone(),
            ip: pod.ip.clone(),
        }
    }
}

impl From<&Pod> for PodInfo {
    fn from(pod: &Pod) -> Self {
        Self {
            name: pod.id.name.clone(),
            namespace: pod.id.namespace.clone(),
            labels: pod.labels.as_ref().clone(),
            ports: pod.ports.clone(),
        }
    }
}

// === impl Phase ===

impl std::str::FromStr for Phase {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        })
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => "Pending".fmt(f),
            Self::Running => "Running".fmt(f),
            Self::Succeeded => "Succeeded".fmt(f),
            Self::Failed => "Failed".fmt(f),
            Self::Unknown => "Unknown".fmt(f),
        }
    }
}
