// Canonical change-request vocabulary: statuses, transitions and resolutions.
// Names coming back from the tracker are matched after compaction
// (lowercased, non-alphanumerics dropped), so "Awaiting implementation",
// "AWAITING_IMPLEMENTATION" and "awaiting-implementation" are the same value.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Raised when a name matches no member of a catalog enum
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{value:?} is not a valid {kind}")]
pub struct InvalidEnumValue {
    pub kind: &'static str,
    pub value: String,
}

/// Lowercase a string and drop everything that is not alphanumeric
pub fn compact(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether `candidate` equals any entry of `names` after compaction
pub fn compact_contains<S: AsRef<str>>(names: &[S], candidate: &str) -> bool {
    let needle = compact(candidate);
    names.iter().any(|name| compact(name.as_ref()) == needle)
}

macro_rules! catalog_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Canonical display name, as the tracker spells it
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            fn lookup_table() -> &'static HashMap<String, $name> {
                static TABLE: std::sync::OnceLock<HashMap<String, $name>> = std::sync::OnceLock::new();
                TABLE.get_or_init(|| {
                    Self::ALL
                        .iter()
                        .map(|member| (compact(member.as_str()), *member))
                        .collect()
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = InvalidEnumValue;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::lookup_table()
                    .get(&compact(value))
                    .copied()
                    .ok_or_else(|| InvalidEnumValue {
                        kind: $kind,
                        value: value.to_string(),
                    })
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }
    };
}

catalog_enum!(
    /// Lifecycle status of a change request
    IssueStatus, "IssueStatus", {
        Unknown => "Unknown",
        AwaitingImplementation => "Awaiting Implementation",
        Implementing => "Implementing",
        Completed => "Completed",
        Canceled => "Canceled",
    }
);

catalog_enum!(
    /// Named workflow edges offered by the tracker
    IssueTransition, "IssueTransition", {
        NormalChange => "Normal Change",
        StandardChange => "Standard Change",
        Implement => "Implement",
        Complete => "Complete",
        MarkAsCanceled => "Mark as Canceled",
    }
);

catalog_enum!(
    /// Resolution values accepted when closing a request
    IssueResolution, "IssueResolution", {
        Done => "Done",
        Declined => "Declined",
        Duplicate => "Duplicate",
        Successful => "Successful",
        SuccessfulWithIssues => "Successful with Issues",
        PartiallySuccessful => "Partially Successful",
        Failed => "Failed",
        CannotReproduce => "Cannot Reproduce",
    }
);

impl IssueStatus {
    /// Parse a tracker status name, mapping anything unrecognised to `Unknown`
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or(IssueStatus::Unknown)
    }

    /// Still waiting on a deploy: eligible for supersession
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            IssueStatus::AwaitingImplementation | IssueStatus::Implementing
        )
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, IssueStatus::Completed | IssueStatus::Canceled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_strips_case_and_punctuation() {
        assert_eq!(compact("Awaiting Implementation"), "awaitingimplementation");
        assert_eq!(compact("Proof_Of_Success"), "proofofsuccess");
        assert_eq!(compact("customfield_10042"), "customfield10042");
        assert_eq!(compact(""), "");
    }

    #[test]
    fn test_status_lookup_is_insensitive() {
        assert_eq!(
            "awaiting implementation".parse::<IssueStatus>(),
            Ok(IssueStatus::AwaitingImplementation)
        );
        assert_eq!(
            "AWAITING_IMPLEMENTATION".parse::<IssueStatus>(),
            Ok(IssueStatus::AwaitingImplementation)
        );
        assert_eq!("canceled".parse::<IssueStatus>(), Ok(IssueStatus::Canceled));
    }

    #[test]
    fn test_unknown_member_is_rejected() {
        let err = "Waiting for approval".parse::<IssueStatus>().unwrap_err();
        assert_eq!(err.kind, "IssueStatus");
        assert_eq!(err.value, "Waiting for approval");
        assert_eq!(
            err.to_string(),
            "\"Waiting for approval\" is not a valid IssueStatus"
        );
        assert_eq!(IssueStatus::from_name("Waiting for approval"), IssueStatus::Unknown);
    }

    #[test]
    fn test_transition_and_resolution_names() {
        assert_eq!(
            "mark as canceled".parse::<IssueTransition>(),
            Ok(IssueTransition::MarkAsCanceled)
        );
        assert_eq!(
            "successful with issues".parse::<IssueResolution>(),
            Ok(IssueResolution::SuccessfulWithIssues)
        );
        assert!("Won't Do".parse::<IssueResolution>().is_err());
    }

    #[test]
    fn test_compact_contains() {
        let names = [IssueStatus::AwaitingImplementation, IssueStatus::Implementing];
        assert!(compact_contains(&names, "IMPLEMENTING"));
        assert!(!compact_contains(&names, "Completed"));
        let empty: [&str; 0] = [];
        assert!(!compact_contains(&empty, "Completed"));
    }

    #[test]
    fn test_status_groups() {
        assert!(IssueStatus::Implementing.is_pending());
        assert!(!IssueStatus::Completed.is_pending());
        assert!(IssueStatus::Canceled.is_closed());
        assert!(!IssueStatus::Unknown.is_closed());
    }
}
