//! The phase of an instance and the `Ready` condition reporting it.
use k8s_openapi::{
    apimachinery::pkg::apis::meta::v1::{Condition, Time},
    chrono::{DateTime, Utc},
};
use kube::core::DynamicObject;
use serde::{Deserialize, Serialize};

pub const READY_CONDITION: &str = "Ready";

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, strum::Display, strum::EnumString,
)]
pub enum Phase {
    /// Waiting for a prerequisite, usually the class.
    Pending,
    Reconciling,
    Ready,
    Failed,
    Terminating,
}

impl Phase {
    /// Whether a reconcile starting from `current` is announced as
    /// [`Phase::Reconciling`] before the children are applied. Ready instances
    /// stay Ready while they are re-checked.
    pub fn announces_reconcile(current: Option<Self>) -> bool {
        matches!(current, None | Some(Self::Pending | Self::Failed))
    }

    fn condition_status(self) -> &'static str {
        match self {
            Self::Ready => "True",
            Self::Reconciling => "Unknown",
            Self::Pending | Self::Failed | Self::Terminating => "False",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CreationStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Phase>,
}

/// The `status` of instances and claims.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation: Option<CreationStatus>,
}

impl InstanceStatus {
    /// Reads the status of an object. A status that does not parse is treated
    /// as absent and gets overwritten with the next transition.
    pub fn of(object: &DynamicObject) -> Self {
        object
            .data
            .get("status")
            .cloned()
            .and_then(|status| serde_json::from_value(status).ok())
            .unwrap_or_default()
    }

    pub fn phase(&self) -> Option<Phase> {
        self.creation.as_ref().and_then(|creation| creation.state)
    }

    /// The status after moving to `phase`, or [`None`] if the instance
    /// already is in that phase at `generation`.
    ///
    /// The `lastTransitionTime` of the Ready condition is kept when its
    /// status does not change.
    pub fn transition(
        &self,
        phase: Phase,
        reason: &str,
        message: impl Into<String>,
        generation: Option<i64>,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        if self.phase() == Some(phase) && self.observed_generation == generation {
            return None;
        }

        let status = phase.condition_status();
        let previous = self
            .conditions
            .iter()
            .find(|condition| condition.type_ == READY_CONDITION);
        let last_transition_time = match previous {
            Some(previous) if previous.status == status => previous.last_transition_time.clone(),
            _ => Time(now),
        };

        let mut conditions: Vec<_> = self
            .conditions
            .iter()
            .filter(|condition| condition.type_ != READY_CONDITION)
            .cloned()
            .collect();
        conditions.push(Condition {
            type_: READY_CONDITION.to_owned(),
            status: status.to_owned(),
            reason: reason.to_owned(),
            message: message.into(),
            observed_generation: generation,
            last_transition_time,
        });

        Some(Self {
            conditions,
            observed_generation: generation,
            creation: Some(CreationStatus { state: Some(phase) }),
        })
    }

    /// The merge patch writing this status.
    pub fn patch(&self) -> serde_json::Value {
        serde_json::json!({ "status": self })
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::chrono::TimeZone;
    use rstest::rstest;

    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    #[rstest]
    #[case(None, true)]
    #[case(Some(Phase::Pending), true)]
    #[case(Some(Phase::Failed), true)]
    #[case(Some(Phase::Ready), false)]
    #[case(Some(Phase::Reconciling), false)]
    fn reconcile_announcement(#[case] current: Option<Phase>, #[case] expected: bool) {
        assert_eq!(Phase::announces_reconcile(current), expected);
    }

    #[test]
    fn unchanged_phase_is_not_written() {
        let status = InstanceStatus::default()
            .transition(Phase::Ready, "Reconciled", "", Some(1), at(0))
            .unwrap();
        assert_eq!(
            status.transition(Phase::Ready, "Reconciled", "", Some(1), at(10)),
            None
        );
    }

    #[test]
    fn new_generation_is_observed() {
        let status = InstanceStatus::default()
            .transition(Phase::Ready, "Reconciled", "", Some(1), at(0))
            .unwrap();
        let edited = status
            .transition(Phase::Ready, "Reconciled", "", Some(2), at(10))
            .unwrap();

        assert_eq!(edited.observed_generation, Some(2));
        assert_eq!(edited.conditions[0].observed_generation, Some(2));
        assert_eq!(edited.conditions[0].last_transition_time, Time(at(0)));
        assert_eq!(edited.phase(), Some(Phase::Ready));
    }

    #[test]
    fn transition_time_follows_condition_status() {
        let failed = InstanceStatus::default()
            .transition(Phase::Failed, "UnsupportedTopology", "3 replicas", Some(1), at(0))
            .unwrap();
        let pending = failed
            .transition(Phase::Pending, "ClassNotFound", "class gone", Some(1), at(10))
            .unwrap();
        let ready = pending
            .transition(Phase::Ready, "Reconciled", "", Some(2), at(20))
            .unwrap();

        assert_eq!(pending.conditions.len(), 1);
        assert_eq!(pending.conditions[0].last_transition_time, Time(at(0)));
        assert_eq!(pending.conditions[0].reason, "ClassNotFound");
        assert_eq!(ready.conditions[0].last_transition_time, Time(at(20)));
        assert_eq!(ready.conditions[0].status, "True");
        assert_eq!(ready.observed_generation, Some(2));
        assert_eq!(ready.phase(), Some(Phase::Ready));
    }

    #[test]
    fn patch_shape() {
        let status = InstanceStatus::default()
            .transition(Phase::Reconciling, "Reconciling", "", None, at(0))
            .unwrap();
        let patch = status.patch();
        assert_eq!(patch["status"]["creation"]["state"], "Reconciling");
        assert_eq!(patch["status"]["conditions"][0]["type"], "Ready");
        assert_eq!(patch["status"]["conditions"][0]["status"], "Unknown");
    }

    #[test]
    fn status_of_object() {
        let object: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "codemowers.io/v1alpha1",
            "kind": "Redis",
            "metadata": {"name": "cache1", "namespace": "app"},
            "spec": {},
            "status": {"creation": {"state": "Failed"}},
        }))
        .unwrap();
        assert_eq!(InstanceStatus::of(&object).phase(), Some(Phase::Failed));
    }
}
