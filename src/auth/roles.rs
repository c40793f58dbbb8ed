use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Closed set of platform roles.
///
/// `SuperAdmin` includes `Admin`, which includes `Educator`. `Student` stands
/// on its own branch and is included by nothing but itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Educator,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Educator => "educator",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    /// Whether a holder of `self` is at least `other` in the role order.
    pub fn includes(self, other: Role) -> bool {
        match (self, other) {
            (a, b) if a == b => true,
            (Role::SuperAdmin, Role::Admin | Role::Educator) => true,
            (Role::Admin, Role::Educator) => true,
            _ => false,
        }
    }

    /// Roles a user may pick for themselves at signup.
    pub fn is_self_assignable(self) -> bool {
        matches!(self, Role::Student | Role::Educator)
    }

    /// Whether `self` may provision an account holding `target`.
    pub fn can_assign(self, target: Role) -> bool {
        match self {
            Role::SuperAdmin => true,
            Role::Admin => target.is_self_assignable(),
            Role::Educator | Role::Student => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "educator" => Ok(Role::Educator),
            "admin" => Ok(Role::Admin),
            "super_admin" => Ok(Role::SuperAdmin),
            other => anyhow::bail!("unknown role: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_partial() {
        assert!(Role::SuperAdmin.includes(Role::Admin));
        assert!(Role::SuperAdmin.includes(Role::Educator));
        assert!(Role::Admin.includes(Role::Educator));
        assert!(!Role::Admin.includes(Role::SuperAdmin));
        assert!(!Role::Educator.includes(Role::Admin));
        assert!(!Role::SuperAdmin.includes(Role::Student));
        assert!(!Role::Student.includes(Role::Educator));
        assert!(Role::Student.includes(Role::Student));
    }

    #[test]
    fn parses_what_it_prints() {
        for role in [Role::Student, Role::Educator, Role::Admin, Role::SuperAdmin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("Admin".parse::<Role>().is_err());
    }

    #[test]
    fn admins_cannot_mint_admins() {
        assert!(Role::Admin.can_assign(Role::Student));
        assert!(Role::Admin.can_assign(Role::Educator));
        assert!(!Role::Admin.can_assign(Role::Admin));
        assert!(Role::SuperAdmin.can_assign(Role::Admin));
        assert!(!Role::Educator.can_assign(Role::Student));
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&Role::SuperAdmin).unwrap();
        assert_eq!(json, "\"super_admin\"");
    }
}
