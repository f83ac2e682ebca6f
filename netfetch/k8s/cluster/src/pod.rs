use netfetch_core::{ContainerPort, Labels, Phase, Pod, PodId};
use netfetch_k8s_api::{self as k8s, ResourceExt};

/// Converts a Kubernetes pod. Pods without a namespace are ignored.
pub fn convert(pod: k8s::Pod) -> Option<Pod> {
    let namespace = pod.namespace()?;
    let name = pod.name_any();
    let ports = pod
        .spec
        .iter()
        .flat_map(|spec| &spec.containers)
        .flat_map(|c| c.ports.iter().flatten())
        .map(|p| ContainerPort {
            name: p.name.clone(),
            container_port: p.container_port,
            protocol: p.protocol.clone(),
        })
        .collect();
    let status = pod.status.unwrap_or_default();
    let phase = status
        .phase
        .as_deref()
        .map(|p| p.parse::<Phase>().unwrap_or_default())
        .unwrap_or_default();

    Some(Pod {
        id: PodId::new(namespace, name),
        labels: Labels::from(pod.metadata.labels),
        phase,
        ip: status.pod_ip,
        ports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::{btreemap, convert_args};
    use netfetch_core::Map;
    use netfetch_k8s_api::{api::core::v1::Container, ObjectMeta, PodSpec, PodStatus};

    #[test]
    fn converts_running_pod() {
        let pod = convert(k8s::Pod {
            metadata: ObjectMeta {
                namespace: Some("shop".to_string()),
                name: Some("web-0".to_string()),
                labels: Some(convert_args!(btreemap!("app" => "web"))),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                pod_ip: Some("10.0.0.7".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        })
        .expect("pod must convert");

        assert_eq!(pod.id, PodId::new("shop", "web-0"));
        assert!(pod.is_running());
        assert_eq!(pod.ip.as_deref(), Some("10.0.0.7"));
        let labels: Map = convert_args!(btreemap!("app" => "web"));
        assert_eq!(pod.labels.as_ref(), &labels);
    }

    #[test]
    fn collects_container_ports() {
        let port = |name: Option<&str>, container_port| k8s::api::core::v1::ContainerPort {
            name: name.map(str::to_string),
            container_port,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        };
        let pod = convert(k8s::Pod {
            metadata: ObjectMeta {
                namespace: Some("shop".to_string()),
                name: Some("web-0".to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![
                    Container {
                        name: "web".to_string(),
                        ports: Some(vec![port(Some("http"), 8080), port(None, 9090)]),
                        ..Default::default()
                    },
                    Container {
                        name: "sidecar".to_string(),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }),
            ..Default::default()
        })
        .expect("pod must convert");

        assert_eq!(
            pod.ports,
            vec![
                ContainerPort {
                    name: Some("http".to_string()),
                    container_port: 8080,
                    protocol: Some("TCP".to_string()),
                },
                ContainerPort {
                    name: None,
                    container_port: 9090,
                    protocol: Some("TCP".to_string()),
                },
            ]
        );
    }

    #[test]
    fn pending_pod_without_status() {
        let pod = convert(k8s::Pod {
            metadata: ObjectMeta {
                namespace: Some("shop".to_string()),
                name: Some("web-1".to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
        .expect("pod must convert");
        assert_eq!(pod.phase, Phase::Unknown);
        assert_eq!(pod.ip, None);
        assert!(pod.labels.as_ref().is_empty());
    }
}
