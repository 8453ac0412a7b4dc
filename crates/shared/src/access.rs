//! Advisory role gating for which controls a front end offers. The API
//! enforces the real rules; nothing here is a security boundary.

use crate::domain::Role;

const SUPERADMIN_ASSIGNABLE: &[Role] = &[Role::Admin, Role::Manager, Role::Staff];
const ADMIN_ASSIGNABLE: &[Role] = &[Role::Staff];

pub fn can_edit_or_delete(actor: Role, target: Role) -> bool {
    match actor {
        Role::Superadmin => target != Role::Superadmin,
        Role::Admin => target == Role::Staff,
        Role::Manager | Role::Staff => false,
    }
}

pub fn role_options(actor: Role) -> &'static [Role] {
    match actor {
        Role::Superadmin => SUPERADMIN_ASSIGNABLE,
        Role::Admin => ADMIN_ASSIGNABLE,
        Role::Manager | Role::Staff => &[],
    }
}

pub fn can_assign_role(actor: Role, target: Role, new_role: Role) -> bool {
    can_edit_or_delete(actor, target) && role_options(actor).contains(&new_role)
}

/// Roles a new account may be created with from the management screen.
pub fn creatable_roles() -> &'static [Role] {
    &[Role::Admin, Role::Staff]
}

pub fn can_manage_menu(actor: Role) -> bool {
    matches!(actor, Role::Admin | Role::Superadmin)
}

/// Editing a work order, recording payments and seeing its budget.
pub fn can_manage_work(actor: Role) -> bool {
    actor == Role::Admin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superadmin_edits_everyone_but_superadmins() {
        assert!(can_edit_or_delete(Role::Superadmin, Role::Admin));
        assert!(can_edit_or_delete(Role::Superadmin, Role::Manager));
        assert!(can_edit_or_delete(Role::Superadmin, Role::Staff));
        assert!(!can_edit_or_delete(Role::Superadmin, Role::Superadmin));
    }

    #[test]
    fn admin_only_touches_staff() {
        assert!(can_edit_or_delete(Role::Admin, Role::Staff));
        assert!(!can_edit_or_delete(Role::Admin, Role::Admin));
        assert!(!can_edit_or_delete(Role::Admin, Role::Manager));
        assert_eq!(role_options(Role::Admin), &[Role::Staff]);
        assert!(!can_assign_role(Role::Admin, Role::Staff, Role::Admin));
        assert!(can_assign_role(Role::Admin, Role::Staff, Role::Staff));
    }

    #[test]
    fn other_roles_cannot_mutate_users() {
        for actor in [Role::Manager, Role::Staff] {
            for target in [Role::Staff, Role::Admin, Role::Manager, Role::Superadmin] {
                assert!(!can_edit_or_delete(actor, target));
            }
            assert!(role_options(actor).is_empty());
        }
    }

    #[test]
    fn superadmin_can_promote_to_manager() {
        assert!(can_assign_role(Role::Superadmin, Role::Staff, Role::Manager));
        assert!(!can_assign_role(Role::Superadmin, Role::Staff, Role::Superadmin));
    }

    #[test]
    fn menu_and_work_controls() {
        assert!(can_manage_menu(Role::Superadmin));
        assert!(can_manage_menu(Role::Admin));
        assert!(!can_manage_menu(Role::Staff));
        assert!(can_manage_work(Role::Admin));
        assert!(!can_manage_work(Role::Manager));
    }
}
