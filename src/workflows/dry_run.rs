use tracing::info;

/// Process-wide dry-run switch.
///
/// Callers ask before a mutating step; when enabled the intended actions are
/// logged and the whole step is skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DryRun {
    enabled: bool,
}

impl DryRun {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Log each action as `DRY RUN: Would <action>` and return true when the
    /// caller must skip them
    pub fn would(&self, actions: &[String]) -> bool {
        if self.enabled {
            for action in actions {
                info!("DRY RUN: Would {action}");
            }
        }
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_never_skips() {
        assert!(!DryRun::new(false).would(&["delete everything".to_string()]));
        assert!(!DryRun::default().is_enabled());
    }

    #[test]
    fn test_enabled_always_skips() {
        assert!(DryRun::new(true).would(&[]));
        assert!(DryRun::new(true).would(&["label PR #1".to_string()]));
    }
}
