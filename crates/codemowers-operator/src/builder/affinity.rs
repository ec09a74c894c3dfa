use k8s_openapi::{
    api::core::v1::{Affinity, PodAffinityTerm, PodAntiAffinity},
    apimachinery::pkg::apis::meta::v1::LabelSelector,
};

/// Spreads pods across zones unless the class overrides the key.
pub const DEFAULT_TOPOLOGY_KEY: &str = "topology.kubernetes.io/zone";

/// Forbids two pods matching `selector` within one `topology_key` domain.
pub fn required_pod_anti_affinity(selector: LabelSelector, topology_key: &str) -> Affinity {
    Affinity {
        pod_anti_affinity: Some(PodAntiAffinity {
            required_during_scheduling_ignored_during_execution: Some(vec![PodAffinityTerm {
                label_selector: Some(selector),
                topology_key: topology_key.to_owned(),
                ..PodAffinityTerm::default()
            }]),
            preferred_during_scheduling_ignored_during_execution: None,
        }),
        ..Affinity::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::Labels;

    #[test]
    fn anti_affinity_uses_selector() {
        let labels = Labels::common("redis", "cache1").unwrap();
        let affinity = required_pod_anti_affinity(labels.selector(), DEFAULT_TOPOLOGY_KEY);

        let terms = affinity
            .pod_anti_affinity
            .unwrap()
            .required_during_scheduling_ignored_during_execution
            .unwrap();
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].topology_key, "topology.kubernetes.io/zone");
        assert_eq!(terms[0].label_selector, Some(labels.selector()));
    }
}
