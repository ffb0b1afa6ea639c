/// The authenticated caller, as established by the identity gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub is_admin: bool,
}

impl Actor {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_admin: false,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_admin: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Provider,
    Admin,
}

/// Every relationship an actor holds towards one booking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleSet {
    pub client: bool,
    pub provider: bool,
    pub admin: bool,
}

impl RoleSet {
    pub fn contains(&self, role: Role) -> bool {
        match role {
            Role::Client => self.client,
            Role::Provider => self.provider,
            Role::Admin => self.admin,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.client || self.provider || self.admin)
    }

    pub fn is_party(&self) -> bool {
        self.client || self.provider
    }
}
