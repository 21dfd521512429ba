//! Identity collaborator: who is acting, and with which role.

use std::sync::RwLock;

use vetcare_domain::{Actor, Role};

use crate::{CoreError, CoreResult};

/// Supplies the acting user for trazability fields and authorization gates.
pub trait IdentityProvider: Send + Sync {
    fn current_actor(&self) -> Option<Actor>;

    fn require_actor(&self) -> CoreResult<Actor> {
        self.current_actor()
            .ok_or_else(|| CoreError::Unauthorized("no user is signed in".into()))
    }
}

/// Session-scoped identity holding at most one signed-in actor.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    actor: RwLock<Option<Actor>>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(actor: Actor) -> Self {
        Self {
            actor: RwLock::new(Some(actor)),
        }
    }

    pub fn sign_in(&self, actor: Actor) {
        if let Ok(mut slot) = self.actor.write() {
            *slot = Some(actor);
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut slot) = self.actor.write() {
            *slot = None;
        }
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_actor(&self) -> Option<Actor> {
        self.actor.read().ok().and_then(|slot| slot.clone())
    }
}

/// Rejects actors whose role is not among `allowed`.
pub fn require_role(actor: &Actor, allowed: &[Role]) -> CoreResult<()> {
    if allowed.contains(&actor.role) {
        Ok(())
    } else {
        Err(CoreError::Unauthorized(format!(
            "{} ({}) may not perform this action",
            actor.username, actor.role
        )))
    }
}

pub fn require_admin(actor: &Actor) -> CoreResult<()> {
    require_role(actor, &[Role::Administrator])
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn actor(role: Role) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            username: "maria".into(),
            role,
        }
    }

    #[test]
    fn session_tracks_sign_in_and_out() {
        let session = SessionIdentity::new();
        assert!(session.require_actor().is_err());
        session.sign_in(actor(Role::Receptionist));
        assert_eq!(
            session.current_actor().map(|a| a.role),
            Some(Role::Receptionist)
        );
        session.sign_out();
        assert!(session.current_actor().is_none());
    }

    #[test]
    fn admin_gate_rejects_other_roles() {
        assert!(require_admin(&actor(Role::Administrator)).is_ok());
        assert!(matches!(
            require_admin(&actor(Role::Veterinarian)),
            Err(CoreError::Unauthorized(_))
        ));
    }
}
