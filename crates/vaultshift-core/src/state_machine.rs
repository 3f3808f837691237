//! Integration status transitions

use crate::error::IntegrationError;
use crate::types::IntegrationStatus;

/// Validates a status transition.
///
/// Re-assessment from any settled pre-migration status is allowed so that
/// readiness can be recomputed after the legacy data changes.
pub fn validate_transition(
    from: IntegrationStatus,
    to: IntegrationStatus,
) -> Result<(), IntegrationError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IntegrationError::IllegalTransition { from, to })
    }
}

pub fn allowed_transitions(from: IntegrationStatus) -> Vec<IntegrationStatus> {
    use IntegrationStatus::*;
    match from {
        NotInitialized => vec![NoData, NoLegacyData, PendingMigration, MigrationCompleted],
        NoData | NoLegacyData | PendingMigration | Ready | ValidationFailed | MigrationFailed => {
            let mut next = vec![Ready, ValidationFailed, NoLegacyData];
            if from == Ready {
                next.push(Migrating);
            }
            next
        }
        Migrating => vec![MigrationCompleted, MigrationFailed],
        MigrationCompleted => vec![Ready],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use IntegrationStatus::*;

    #[test]
    fn only_ready_may_start_migrating() {
        for from in [NoData, NoLegacyData, PendingMigration, ValidationFailed, MigrationFailed] {
            assert!(validate_transition(from, Migrating).is_err(), "{from}");
        }
        assert!(validate_transition(Ready, Migrating).is_ok());
    }

    #[test]
    fn migrating_resolves_to_terminal_status() {
        assert!(validate_transition(Migrating, MigrationCompleted).is_ok());
        assert!(validate_transition(Migrating, MigrationFailed).is_ok());
        assert!(validate_transition(Migrating, Ready).is_err());
    }

    #[test]
    fn completed_only_rolls_back_to_ready() {
        assert_eq!(allowed_transitions(MigrationCompleted), vec![Ready]);
        assert!(validate_transition(MigrationCompleted, Migrating).is_err());
    }

    #[test]
    fn startup_targets() {
        assert!(validate_transition(NotInitialized, PendingMigration).is_ok());
        assert!(validate_transition(NotInitialized, MigrationCompleted).is_ok());
        assert!(validate_transition(NotInitialized, Ready).is_err());
    }
}
