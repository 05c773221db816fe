use std::fmt;

use serde::{Deserialize, Serialize};

use super::oracle::{EligibleInstances, PolicyDecision};

// ---------------------------------------------------------------------------
// InstanceType
// ---------------------------------------------------------------------------

/// Resource kind a start/stop action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceType {
    /// Compute tier.
    Ec2,
    /// Database tier.
    Rds,
}

impl InstanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ec2 => "ec2",
            Self::Rds => "rds",
        }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ResourceActionParameters
// ---------------------------------------------------------------------------

/// The executor's input for one resource kind. Serializes to exactly
/// `{ "is_start": bool, "instance_type": "ec2"|"rds", "instance_ids": [..] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceActionParameters {
    pub is_start: bool,
    pub instance_type: InstanceType,
    pub instance_ids: Vec<String>,
}

/// One parameter set per resource kind, built once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionParameters {
    pub ec2: ResourceActionParameters,
    pub rds: ResourceActionParameters,
}

impl ActionParameters {
    pub fn for_kind(&self, kind: InstanceType) -> &ResourceActionParameters {
        match kind {
            InstanceType::Ec2 => &self.ec2,
            InstanceType::Rds => &self.rds,
        }
    }
}

/// Reshape the policy decision and the eligible instances into per-kind
/// executor parameters. Ids are copied verbatim, order preserved.
pub fn build(decision: &PolicyDecision, instances: &EligibleInstances) -> ActionParameters {
    ActionParameters {
        ec2: ResourceActionParameters {
            is_start: decision.is_start,
            instance_type: InstanceType::Ec2,
            instance_ids: instances.ec2.clone(),
        },
        rds: ResourceActionParameters {
            is_start: decision.is_start,
            instance_type: InstanceType::Rds,
            instance_ids: instances.rds.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instances(ec2: &[&str], rds: &[&str]) -> EligibleInstances {
        EligibleInstances {
            ec2: ec2.iter().map(|s| s.to_string()).collect(),
            rds: rds.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn ids_are_copied_in_order_for_both_directions() {
        let eligible = instances(&["i-3", "i-1", "i-2"], &["db-b", "db-a"]);
        for is_start in [true, false] {
            let params = build(&PolicyDecision { is_start }, &eligible);
            assert_eq!(params.ec2.instance_ids, eligible.ec2);
            assert_eq!(params.rds.instance_ids, eligible.rds);
            assert_eq!(params.ec2.is_start, is_start);
            assert_eq!(params.rds.is_start, is_start);
            assert_eq!(params.ec2.instance_type, InstanceType::Ec2);
            assert_eq!(params.rds.instance_type, InstanceType::Rds);
        }
    }

    #[test]
    fn empty_sequences_stay_empty() {
        let params = build(&PolicyDecision { is_start: false }, &instances(&["i-9"], &[]));
        assert!(params.rds.instance_ids.is_empty());
        assert_eq!(params.for_kind(InstanceType::Ec2).instance_ids, vec!["i-9"]);
    }

    #[test]
    fn executor_wire_shape() {
        let params = build(&PolicyDecision { is_start: true }, &instances(&[], &["db-1"]));
        assert_eq!(
            serde_json::to_value(&params.rds).unwrap(),
            json!({"is_start": true, "instance_type": "rds", "instance_ids": ["db-1"]})
        );
    }
}
