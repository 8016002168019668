//! Access control policy.
//!
//! Every access rule of the vault lives here. The policy is pure: it
//! looks only at the principal's identity and role and at the target
//! file descriptor.

use ironvault_common::{Principal, Role};

use crate::model::{AuditScope, FileScope, VaultFile};

/// Vault action subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Upload,
    Download,
    Delete,
    List,
    Search,
    Audit,
}

/// Role- and ownership-based access decisions.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy;

impl AccessPolicy {
    fn is_elevated(principal: &Principal) -> bool {
        matches!(principal.role, Role::Manager | Role::Admin)
    }

    fn is_admin(principal: &Principal) -> bool {
        principal.role == Role::Admin
    }

    pub fn can_list_all(principal: &Principal) -> bool {
        Self::is_elevated(principal)
    }

    pub fn can_search_all(principal: &Principal) -> bool {
        Self::is_elevated(principal)
    }

    pub fn can_download(principal: &Principal, file: &VaultFile) -> bool {
        Self::is_elevated(principal) || file.is_owned_by(&principal.id)
    }

    /// Deletion is an admin privilege; owning a file does not grant it.
    pub fn can_delete(principal: &Principal, _file: &VaultFile) -> bool {
        Self::is_admin(principal)
    }

    pub fn can_delete_all(principal: &Principal) -> bool {
        Self::is_admin(principal)
    }

    pub fn can_upload(_principal: &Principal) -> bool {
        true
    }

    pub fn can_audit_all(principal: &Principal) -> bool {
        Self::is_admin(principal)
    }

    /// Single entry point over the named rules.
    ///
    /// Actions that target a file are denied when no file is given.
    pub fn authorize(principal: &Principal, action: Action, file: Option<&VaultFile>) -> bool {
        match (action, file) {
            (Action::Upload, _) => Self::can_upload(principal),
            (Action::Download, Some(file)) => Self::can_download(principal, file),
            (Action::Delete, Some(file)) => Self::can_delete(principal, file),
            (Action::Download | Action::Delete, None) => false,
            (Action::List | Action::Search | Action::Audit, None) => true,
            (Action::List | Action::Search | Action::Audit, Some(file)) => {
                Self::file_scope(principal, action).contains(file)
            }
        }
    }

    /// Files visible to `principal` for `action`.
    pub fn file_scope(principal: &Principal, action: Action) -> FileScope {
        let all = match action {
            Action::Search => Self::can_search_all(principal),
            Action::Delete => Self::can_delete_all(principal),
            _ => Self::can_list_all(principal),
        };
        if all {
            FileScope::All
        } else {
            FileScope::OwnedBy(principal.id.clone())
        }
    }

    /// Audit records visible to `principal`.
    pub fn audit_scope(principal: &Principal) -> AuditScope {
        if Self::can_audit_all(principal) {
            AuditScope::All
        } else {
            AuditScope::FilesOwnedBy(principal.id.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironvault_common::UserId;

    fn principal(id: &str, role: Role) -> Principal {
        Principal::new(UserId::new(id).unwrap(), id, role)
    }

    fn file_of(owner: &str) -> VaultFile {
        VaultFile::new(UserId::new(owner).unwrap(), "report.pdf", 3)
    }

    #[test]
    fn test_list_and_search_all_require_elevation() {
        assert!(!AccessPolicy::can_list_all(&principal("u", Role::User)));
        assert!(AccessPolicy::can_list_all(&principal("m", Role::Manager)));
        assert!(AccessPolicy::can_list_all(&principal("a", Role::Admin)));

        assert!(!AccessPolicy::can_search_all(&principal("u", Role::User)));
        assert!(AccessPolicy::can_search_all(&principal("m", Role::Manager)));
        assert!(AccessPolicy::can_search_all(&principal("a", Role::Admin)));
    }

    #[test]
    fn test_download_owner_or_elevated() {
        let file = file_of("alice");

        assert!(AccessPolicy::can_download(&principal("alice", Role::User), &file));
        assert!(!AccessPolicy::can_download(&principal("bob", Role::User), &file));
        assert!(AccessPolicy::can_download(&principal("mia", Role::Manager), &file));
        assert!(AccessPolicy::can_download(&principal("root", Role::Admin), &file));
    }

    #[test]
    fn test_delete_is_admin_only() {
        let file = file_of("alice");

        assert!(!AccessPolicy::can_delete(&principal("alice", Role::User), &file));
        assert!(!AccessPolicy::can_delete(&principal("mia", Role::Manager), &file));
        assert!(AccessPolicy::can_delete(&principal("root", Role::Admin), &file));
    }

    #[test]
    fn test_everyone_can_upload() {
        for role in [Role::User, Role::Manager, Role::Admin] {
            assert!(AccessPolicy::can_upload(&principal("x", role)));
        }
    }

    #[test]
    fn test_authorize_without_target_file() {
        let alice = principal("alice", Role::User);

        assert!(AccessPolicy::authorize(&alice, Action::Upload, None));
        assert!(!AccessPolicy::authorize(&alice, Action::Download, None));
        assert!(!AccessPolicy::authorize(&alice, Action::Delete, None));
    }

    #[test]
    fn test_authorize_list_checks_scope() {
        let file = file_of("alice");

        assert!(AccessPolicy::authorize(&principal("alice", Role::User), Action::List, Some(&file)));
        assert!(!AccessPolicy::authorize(&principal("bob", Role::User), Action::List, Some(&file)));
        assert!(AccessPolicy::authorize(&principal("mia", Role::Manager), Action::Search, Some(&file)));
    }

    #[test]
    fn test_scopes() {
        let alice = principal("alice", Role::User);
        let mia = principal("mia", Role::Manager);
        let root = principal("root", Role::Admin);

        assert_eq!(
            AccessPolicy::file_scope(&alice, Action::List),
            FileScope::OwnedBy(alice.id.clone())
        );
        assert_eq!(AccessPolicy::file_scope(&mia, Action::List), FileScope::All);
        assert_eq!(
            AccessPolicy::file_scope(&mia, Action::Delete),
            FileScope::OwnedBy(mia.id.clone())
        );
        assert_eq!(AccessPolicy::file_scope(&root, Action::Delete), FileScope::All);

        assert_eq!(
            AccessPolicy::audit_scope(&mia),
            AuditScope::FilesOwnedBy(mia.id.clone())
        );
        assert_eq!(AccessPolicy::audit_scope(&root), AuditScope::All);
    }
}
