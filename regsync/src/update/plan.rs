use std::collections::HashMap;

use k8s_openapi::api::core::v1::{Container, PodSpec};
use tracing::{info, warn};

use crate::cluster::workload::WorkloadKind;
use crate::diff::is_excluded;
use crate::types::short_name_of;

/// Rewrites every container and init-container image of a pod spec against
/// the registry lookup.
///
/// Per container: an excluded short name is skipped; a short name found in
/// the lookup with a differing full reference is rewritten; an identical
/// reference is a no-op; a short name missing from the lookup is logged as a
/// warning and left alone. When anything changed, the image pull secrets are
/// cleared, since the mirrored registry does not require them.
///
/// Returns whether any image changed.
pub fn rewrite_pod_spec(
    kind: WorkloadKind,
    resource_name: &str,
    spec: &mut PodSpec,
    exclusions: &[String],
    registry_lookup: &HashMap<String, String>,
) -> bool {
    let mut changed = rewrite_containers(
        kind,
        resource_name,
        &mut spec.containers,
        exclusions,
        registry_lookup,
    );

    if let Some(init_containers) = spec.init_containers.as_mut() {
        changed |= rewrite_containers(
            kind,
            resource_name,
            init_containers,
            exclusions,
            registry_lookup,
        );
    }

    if changed {
        spec.image_pull_secrets = None;
    }

    changed
}

fn rewrite_containers(
    kind: WorkloadKind,
    resource_name: &str,
    containers: &mut [Container],
    exclusions: &[String],
    registry_lookup: &HashMap<String, String>,
) -> bool {
    let mut changed = false;

    for container in containers {
        let Some(image) = container.image.as_ref() else {
            continue;
        };
        let short_name = short_name_of(image);

        if is_excluded(short_name, exclusions) {
            info!(
                kind = %kind,
                resource = resource_name,
                image = %image,
                "image is in the excluded list"
            );
            continue;
        }

        match registry_lookup.get(short_name) {
            Some(target) if target == image => {
                info!(
                    kind = %kind,
                    resource = resource_name,
                    image = %image,
                    "image is already up to date"
                );
            }
            Some(target) => {
                info!(
                    kind = %kind,
                    resource = resource_name,
                    old_image = %image,
                    new_image = %target,
                    "rewriting image"
                );
                container.image = Some(target.clone());
                changed = true;
            }
            None => {
                warn!(
                    kind = %kind,
                    resource = resource_name,
                    image = %image,
                    "image not found in the registry inventory"
                );
            }
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::LocalObjectReference;

    fn container(image: &str) -> Container {
        Container {
            image: Some(image.to_owned()),
            ..Default::default()
        }
    }

    fn spec(images: &[&str]) -> PodSpec {
        PodSpec {
            containers: images.iter().map(|image| container(image)).collect(),
            image_pull_secrets: Some(vec![LocalObjectReference {
                name: "harbor-pull".to_owned(),
            }]),
            ..Default::default()
        }
    }

    fn lookup(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_matching_image_is_rewritten_and_pull_secrets_cleared() {
        let mut spec = spec(&["harbor/ns/app:v1"]);
        let changed = rewrite_pod_spec(
            WorkloadKind::Deployment,
            "app",
            &mut spec,
            &[],
            &lookup(&[("app:v1", "reg/mirror/app:v1")]),
        );

        assert!(changed);
        assert_eq!(spec.containers[0].image.as_deref(), Some("reg/mirror/app:v1"));
        assert!(spec.image_pull_secrets.is_none());
    }

    #[test]
    fn test_excluded_image_is_left_alone() {
        let mut spec = spec(&["harbor/ns/excluded-app:v1"]);
        let changed = rewrite_pod_spec(
            WorkloadKind::Deployment,
            "app",
            &mut spec,
            &["excluded-app".to_owned()],
            &lookup(&[("excluded-app:v1", "reg/mirror/excluded-app:v1")]),
        );

        assert!(!changed);
        assert_eq!(
            spec.containers[0].image.as_deref(),
            Some("harbor/ns/excluded-app:v1")
        );
        assert!(spec.image_pull_secrets.is_some());
    }

    #[test]
    fn test_identical_image_is_a_noop() {
        let mut spec = spec(&["reg/mirror/app:v1"]);
        let changed = rewrite_pod_spec(
            WorkloadKind::Deployment,
            "app",
            &mut spec,
            &[],
            &lookup(&[("app:v1", "reg/mirror/app:v1")]),
        );

        assert!(!changed);
        assert!(spec.image_pull_secrets.is_some());
    }

    #[test]
    fn test_unknown_image_is_left_with_a_warning() {
        let mut spec = spec(&["harbor/ns/unknown:v1"]);
        let changed = rewrite_pod_spec(
            WorkloadKind::Deployment,
            "app",
            &mut spec,
            &[],
            &lookup(&[("other:v1", "reg/mirror/other:v1")]),
        );

        assert!(!changed);
        assert_eq!(
            spec.containers[0].image.as_deref(),
            Some("harbor/ns/unknown:v1")
        );
    }

    #[test]
    fn test_init_containers_are_rewritten_too() {
        let mut spec = spec(&["reg/mirror/app:v1"]);
        spec.init_containers = Some(vec![container("harbor/ns/init:v1")]);

        let changed = rewrite_pod_spec(
            WorkloadKind::Deployment,
            "app",
            &mut spec,
            &[],
            &lookup(&[
                ("app:v1", "reg/mirror/app:v1"),
                ("init:v1", "reg/mirror/init:v1"),
            ]),
        );

        assert!(changed);
        assert_eq!(
            spec.init_containers.as_ref().unwrap()[0].image.as_deref(),
            Some("reg/mirror/init:v1")
        );
    }
}
