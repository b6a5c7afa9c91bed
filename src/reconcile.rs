//! Desired/observed state table for `vmware_vm`.

use std::fmt;
use std::str::FromStr;
use vsm_vsphere::types::VmPowerState;

/// State requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DesiredState {
    Absent,
    Present,
    Maintenance,
    Stopped,
    Restarted,
}

impl DesiredState {
    pub const ALL: [Self; 5] =
        [Self::Absent, Self::Present, Self::Maintenance, Self::Stopped, Self::Restarted];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Present => "present",
            Self::Maintenance => "maintenance",
            Self::Stopped => "stopped",
            Self::Restarted => "restarted",
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DesiredState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| {
                format!("expected one of absent, present, maintenance, stopped, restarted; got '{s}'")
            })
    }
}

/// State of the named VM on the management plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservedState {
    Absent,
    /// Powered on or suspended.
    Present,
    Stopped,
    Maintenance,
}

impl ObservedState {
    pub const ALL: [Self; 4] = [Self::Absent, Self::Present, Self::Stopped, Self::Maintenance];

    pub fn from_power(power: VmPowerState) -> Self {
        match power {
            VmPowerState::PoweredOff => Self::Stopped,
            _ => Self::Present,
        }
    }
}

impl fmt::Display for ObservedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Absent => "absent",
            Self::Present => "present",
            Self::Stopped => "stopped",
            Self::Maintenance => "maintenance",
        })
    }
}

/// What the module has to do to converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    NoOp,
    Create,
    Destroy,
    PowerOff,
    /// Recognised, performs no work.
    Maintenance,
    /// Recognised, performs no work.
    Restart,
    /// The transition needs a VM that does not exist.
    Reject,
}

impl Action {
    /// Whether dry-run reports this action as a change.
    pub fn reports_change(self) -> bool {
        matches!(self, Self::Create | Self::Destroy | Self::PowerOff)
    }
}

/// Total over every (desired, observed) pair.
pub fn plan(desired: DesiredState, observed: ObservedState) -> Action {
    use DesiredState as D;
    use ObservedState as O;

    match (desired, observed) {
        (D::Absent, O::Absent) => Action::NoOp,
        (D::Absent, _) => Action::Destroy,

        (D::Present, O::Absent) => Action::Create,
        (D::Present, _) => Action::NoOp,

        (_, O::Absent) => Action::Reject,

        (D::Maintenance, O::Maintenance) => Action::NoOp,
        (D::Maintenance, _) => Action::Maintenance,

        (D::Stopped, O::Stopped) => Action::NoOp,
        (D::Stopped, _) => Action::PowerOff,

        (D::Restarted, _) => Action::Restart,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DesiredState as D;
    use ObservedState as O;

    #[test]
    fn full_table() {
        let expected = [
            (D::Absent, [Action::NoOp, Action::Destroy, Action::Destroy, Action::Destroy]),
            (D::Present, [Action::Create, Action::NoOp, Action::NoOp, Action::NoOp]),
            (D::Maintenance, [Action::Reject, Action::Maintenance, Action::Maintenance, Action::NoOp]),
            (D::Stopped, [Action::Reject, Action::PowerOff, Action::NoOp, Action::PowerOff]),
            (D::Restarted, [Action::Reject, Action::Restart, Action::Restart, Action::Restart]),
        ];
        for (desired, row) in expected {
            for (observed, action) in O::ALL.into_iter().zip(row) {
                assert_eq!(plan(desired, observed), action, "{desired} over {observed}");
            }
        }
    }

    #[test]
    fn absent_vm_only_accepts_absent_or_present() {
        for desired in D::ALL {
            let action = plan(desired, O::Absent);
            let allowed = matches!(desired, D::Absent | D::Present);
            assert_eq!(action != Action::Reject, allowed, "{desired}");
        }
    }

    #[test]
    fn power_state_mapping() {
        assert_eq!(O::from_power(VmPowerState::PoweredOn), O::Present);
        assert_eq!(O::from_power(VmPowerState::Suspended), O::Present);
        assert_eq!(O::from_power(VmPowerState::PoweredOff), O::Stopped);
    }

    #[test]
    fn desired_state_parses_lowercase_only() {
        assert_eq!("restarted".parse::<D>(), Ok(D::Restarted));
        assert!("Present".parse::<D>().is_err());
    }

    #[test]
    fn only_real_work_reports_change() {
        assert!(Action::Create.reports_change());
        assert!(Action::Destroy.reports_change());
        assert!(Action::PowerOff.reports_change());
        assert!(!Action::Restart.reports_change());
        assert!(!Action::Maintenance.reports_change());
        assert!(!Action::NoOp.reports_change());
    }
}
