use strum_macros::Display;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin = 1,
    Officer = 2,
    Employee = 3,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Officer),
            3 => Some(Role::Employee),
            _ => None,
        }
    }

    /// The attendance-officer capability: may edit other employees' records,
    /// reassign them, and change company overtime settings.
    pub fn is_officer(self) -> bool {
        matches!(self, Role::Admin | Role::Officer)
    }
}
