use crate::entities::profile::Role;

/// Project status codes at or above this value are past the proposal stage;
/// uploads made from then on default to private.
pub const POST_PROPOSAL_STATUS: i32 = 30;

/// Write-time rule: early-stage intake documents are shareable, later
/// contractual/financial documents are not visible to clients by default.
pub fn is_private_for_status(status: i32) -> bool {
    status >= POST_PROPOSAL_STATUS
}

/// Read-time rule. A null flag reads as public; those rows predate the flag.
pub fn visible_to(is_private: Option<bool>, role: Role) -> bool {
    role.can_view_private() || !is_private.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privacy_flips_at_post_proposal_threshold() {
        assert!(!is_private_for_status(10));
        assert!(!is_private_for_status(29));
        assert!(is_private_for_status(30));
        assert!(is_private_for_status(70));
    }

    #[test]
    fn staff_and_admin_see_private_files() {
        assert!(visible_to(Some(true), Role::Admin));
        assert!(visible_to(Some(true), Role::Staff));
        assert!(!visible_to(Some(true), Role::Client));
    }

    #[test]
    fn missing_flag_reads_as_public() {
        assert!(visible_to(None, Role::Client));
        assert!(visible_to(Some(false), Role::Client));
    }
}
