//! Staff accounts: registration, sign-in and administrator-only management.
//!
//! At least one active Administrator must exist once the first account has
//! been registered; every operation that would break this is rejected with
//! [`CoreError::Unauthorized`].

use chrono::{DateTime, Utc};
use uuid::Uuid;
use vetcare_domain::{Actor, ClinicRecords, Role, User, MIN_PASSWORD_LEN};

use crate::{
    identity::require_admin,
    input::{FieldError, FieldErrorKind, FormInput},
    CoreError, CoreResult,
};

pub const MIN_USERNAME_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct NewUserInput {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role: Role,
    pub active: bool,
    /// Veterinarian profile to link when the role is Veterinarian.
    pub veterinarian_id: Option<Uuid>,
}

impl NewUserInput {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        full_name: impl Into<String>,
        password: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            full_name: full_name.into(),
            password: password.into(),
            role,
            active: true,
            veterinarian_id: None,
        }
    }
}

impl TryFrom<&FormInput> for NewUserInput {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        let username = form.text("username")?.to_lowercase();
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(FieldError::new(
                "username",
                FieldErrorKind::TooShort {
                    min: MIN_USERNAME_LEN,
                },
            ));
        }
        let password = form.secret("password", MIN_PASSWORD_LEN)?;
        if form.raw("confirm_password").is_some_and(|confirm| confirm != password) {
            return Err(FieldError::new(
                "confirm_password",
                FieldErrorKind::Mismatch {
                    other: "password".into(),
                },
            ));
        }
        Ok(Self {
            username,
            email: form.email("email")?,
            full_name: form.text("full_name")?,
            password,
            role: form.optional_choice("role")?.unwrap_or(Role::Receptionist),
            active: form.raw("active").map_or(true, |_| form.flag("active")),
            veterinarian_id: form.optional_id("veterinarian_id")?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleCounts {
    pub administrators: usize,
    pub veterinarians: usize,
    pub receptionists: usize,
}

pub struct UserService;

impl UserService {
    /// Registers an account.
    ///
    /// The very first account becomes Administrator whatever role was asked
    /// for; afterwards only an active Administrator may register users.
    pub fn register(
        records: &mut ClinicRecords,
        input: NewUserInput,
        actor: Option<&Actor>,
        now: DateTime<Utc>,
    ) -> CoreResult<Uuid> {
        let bootstrap = records.users.is_empty();
        if !bootstrap {
            let actor = actor.ok_or_else(|| {
                CoreError::Unauthorized("only administrators can register users".into())
            })?;
            Self::acting_admin(records, actor)?;
        }
        Self::ensure_unique(records, None, &input.username, &input.email)?;
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CoreError::Validation(format!(
                "password must have at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let role = if bootstrap { Role::Administrator } else { input.role };
        let mut user = User::new(
            input.username.trim().to_lowercase(),
            input.email.trim().to_lowercase(),
            input.full_name.trim(),
            role,
            &input.password,
            now,
        );
        user.active = bootstrap || input.active;
        let user_id = user.id;

        if let (Some(vet_id), Role::Veterinarian) = (input.veterinarian_id, role) {
            let vet = records
                .veterinarian_mut(vet_id)
                .ok_or_else(|| CoreError::not_found("veterinarian", vet_id))?;
            if vet.user_id.is_some() {
                return Err(CoreError::Conflict(format!(
                    "veterinarian {} already has an account",
                    vet.full_name
                )));
            }
            vet.user_id = Some(user_id);
        }
        records.users.push(user);
        Ok(user_id)
    }

    /// Verifies credentials of an active account and stamps `last_login`.
    pub fn authenticate(
        records: &mut ClinicRecords,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Actor> {
        let invalid = || CoreError::Unauthorized("invalid username or password".into());
        let user_id = records
            .user_by_username(username)
            .filter(|user| user.verify_password(password))
            .map(|user| user.id)
            .ok_or_else(invalid)?;
        let user = records.user_mut(user_id).ok_or_else(invalid)?;
        if !user.active {
            return Err(CoreError::Unauthorized(format!(
                "account {} is deactivated",
                user.username
            )));
        }
        user.last_login = Some(now);
        Ok(user.actor())
    }

    pub fn update_role(
        records: &mut ClinicRecords,
        actor: &Actor,
        user_id: Uuid,
        role: Role,
    ) -> CoreResult<()> {
        Self::acting_admin(records, actor)?;
        let user = Self::user(records, user_id)?;
        if user.is_active_admin() && role != Role::Administrator {
            Self::ensure_other_admin(records, user_id, "demote")?;
        }
        Self::user_mut(records, user_id)?.role = role;
        Ok(())
    }

    pub fn set_active(
        records: &mut ClinicRecords,
        actor: &Actor,
        user_id: Uuid,
        active: bool,
    ) -> CoreResult<()> {
        Self::acting_admin(records, actor)?;
        let user = Self::user(records, user_id)?;
        if !active {
            if user_id == actor.user_id {
                return Err(CoreError::Precondition(
                    "you cannot deactivate your own account".into(),
                ));
            }
            if user.is_active_admin() {
                Self::ensure_other_admin(records, user_id, "deactivate")?;
            }
        }
        Self::user_mut(records, user_id)?.active = active;
        Ok(())
    }

    /// Soft delete: the account is kept but can no longer sign in.
    pub fn delete(records: &mut ClinicRecords, actor: &Actor, user_id: Uuid) -> CoreResult<()> {
        Self::acting_admin(records, actor)?;
        if user_id == actor.user_id {
            return Err(CoreError::Precondition(
                "you cannot delete your own account".into(),
            ));
        }
        if Self::user(records, user_id)?.is_active_admin() {
            Self::ensure_other_admin(records, user_id, "delete")?;
        }
        Self::user_mut(records, user_id)?.active = false;
        Ok(())
    }

    /// Replaces the password with a generated temporary one and returns it.
    pub fn reset_password(
        records: &mut ClinicRecords,
        actor: &Actor,
        user_id: Uuid,
    ) -> CoreResult<String> {
        Self::acting_admin(records, actor)?;
        let temporary: String = Uuid::new_v4().simple().to_string().chars().take(10).collect();
        Self::user_mut(records, user_id)?.set_password(&temporary);
        Ok(temporary)
    }

    pub fn change_password(
        records: &mut ClinicRecords,
        actor: &Actor,
        current: &str,
        replacement: &str,
    ) -> CoreResult<()> {
        if replacement.chars().count() < MIN_PASSWORD_LEN {
            return Err(CoreError::InvalidInput(FieldError::new(
                "password",
                FieldErrorKind::TooShort {
                    min: MIN_PASSWORD_LEN,
                },
            )));
        }
        let user = Self::user_mut(records, actor.user_id)?;
        if !user.verify_password(current) {
            return Err(CoreError::Unauthorized("current password is incorrect".into()));
        }
        user.set_password(replacement);
        Ok(())
    }

    pub fn list(records: &ClinicRecords, role: Option<Role>) -> Vec<&User> {
        let mut users: Vec<&User> = records
            .users
            .iter()
            .filter(|user| role.map_or(true, |role| user.role == role))
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    /// Active accounts per role.
    pub fn role_counts(records: &ClinicRecords) -> RoleCounts {
        records
            .users
            .iter()
            .filter(|user| user.active)
            .fold(RoleCounts::default(), |mut counts, user| {
                match user.role {
                    Role::Administrator => counts.administrators += 1,
                    Role::Veterinarian => counts.veterinarians += 1,
                    Role::Receptionist => counts.receptionists += 1,
                }
                counts
            })
    }

    /// The actor must hold the role and still be an active administrator on record.
    fn acting_admin(records: &ClinicRecords, actor: &Actor) -> CoreResult<()> {
        require_admin(actor)?;
        match records.user(actor.user_id) {
            Some(user) if user.is_active_admin() => Ok(()),
            _ => Err(CoreError::Unauthorized(format!(
                "{} is no longer an active administrator",
                actor.username
            ))),
        }
    }

    fn ensure_other_admin(records: &ClinicRecords, user_id: Uuid, action: &str) -> CoreResult<()> {
        let others = records
            .users
            .iter()
            .filter(|user| user.id != user_id && user.is_active_admin())
            .count();
        if others == 0 {
            Err(CoreError::Unauthorized(format!(
                "cannot {} the only active administrator",
                action
            )))
        } else {
            Ok(())
        }
    }

    fn ensure_unique(
        records: &ClinicRecords,
        exclude: Option<Uuid>,
        username: &str,
        email: &str,
    ) -> CoreResult<()> {
        let username = username.trim().to_lowercase();
        let email = email.trim().to_lowercase();
        for user in records.users.iter().filter(|user| Some(user.id) != exclude) {
            if user.username.to_lowercase() == username {
                return Err(CoreError::Conflict(format!(
                    "username `{}` is already taken",
                    username
                )));
            }
            if user.email.to_lowercase() == email {
                return Err(CoreError::Conflict(format!(
                    "email `{}` is already registered",
                    email
                )));
            }
        }
        Ok(())
    }

    fn user(records: &ClinicRecords, user_id: Uuid) -> CoreResult<&User> {
        records
            .user(user_id)
            .ok_or_else(|| CoreError::not_found("user", user_id))
    }

    fn user_mut(records: &mut ClinicRecords, user_id: Uuid) -> CoreResult<&mut User> {
        records
            .user_mut(user_id)
            .ok_or_else(|| CoreError::not_found("user", user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn bootstrap() -> (ClinicRecords, Actor) {
        let mut records = ClinicRecords::new();
        let admin_id = UserService::register(
            &mut records,
            NewUserInput::new("admin", "admin@clinic.pe", "Ana Admin", "secret1", Role::Receptionist),
            None,
            now(),
        )
        .expect("bootstrap user");
        let actor = records.user(admin_id).unwrap().actor();
        (records, actor)
    }

    #[test]
    fn first_user_becomes_administrator() {
        let (records, actor) = bootstrap();
        assert_eq!(actor.role, Role::Administrator);
        assert_eq!(records.active_admin_count(), 1);
    }

    #[test]
    fn later_registrations_need_an_administrator() {
        let (mut records, admin) = bootstrap();
        let err = UserService::register(
            &mut records,
            NewUserInput::new("mallory", "m@clinic.pe", "Mallory", "secret1", Role::Administrator),
            None,
            now(),
        )
        .expect_err("anonymous registration");
        assert!(matches!(err, CoreError::Unauthorized(_)));

        let vet_id = UserService::register(
            &mut records,
            NewUserInput::new("dr.vega", "vega@clinic.pe", "Dr. Vega", "secret1", Role::Veterinarian),
            Some(&admin),
            now(),
        )
        .expect("admin registers vet");
        let vet = records.user(vet_id).unwrap().actor();
        let err = UserService::register(
            &mut records,
            NewUserInput::new("desk", "desk@clinic.pe", "Desk", "secret1", Role::Receptionist),
            Some(&vet),
            now(),
        )
        .expect_err("vets cannot register users");
        assert!(matches!(err, CoreError::Unauthorized(_)));
    }

    #[test]
    fn duplicate_username_or_email_conflicts() {
        let (mut records, admin) = bootstrap();
        let err = UserService::register(
            &mut records,
            NewUserInput::new("ADMIN", "other@clinic.pe", "Copy", "secret1", Role::Receptionist),
            Some(&admin),
            now(),
        )
        .expect_err("duplicate username");
        assert!(err.is_conflict());
    }

    #[test]
    fn sole_administrator_cannot_be_deactivated() {
        let (mut records, admin) = bootstrap();
        let other_id = UserService::register(
            &mut records,
            NewUserInput::new("helper", "helper@clinic.pe", "Helper", "secret1", Role::Receptionist),
            Some(&admin),
            now(),
        )
        .expect("helper");
        UserService::update_role(&mut records, &admin, other_id, Role::Administrator)
            .expect("promote");
        let helper = records.user(other_id).unwrap().actor();

        UserService::set_active(&mut records, &helper, admin.user_id, false)
            .expect("two admins, one may go");
        let err = UserService::set_active(&mut records, &admin, other_id, false)
            .expect_err("deactivated admin cannot act");
        assert!(matches!(err, CoreError::Unauthorized(_)));

        let err = UserService::update_role(&mut records, &helper, other_id, Role::Receptionist)
            .expect_err("last admin cannot be demoted");
        assert!(matches!(err, CoreError::Unauthorized(_)));
        let stored = records.user(other_id).unwrap();
        assert!(stored.active);
        assert_eq!(stored.role, Role::Administrator);
    }

    #[test]
    fn administrators_cannot_deactivate_themselves() {
        let (mut records, admin) = bootstrap();
        let err = UserService::set_active(&mut records, &admin, admin.user_id, false)
            .expect_err("self deactivation");
        assert!(matches!(err, CoreError::Precondition(_)));
        assert!(records.user(admin.user_id).unwrap().active);
    }

    #[test]
    fn authenticate_checks_password_and_active_flag() {
        let (mut records, admin) = bootstrap();
        let actor =
            UserService::authenticate(&mut records, "Admin", "secret1", now()).expect("sign in");
        assert_eq!(actor.user_id, admin.user_id);
        assert_eq!(records.user(admin.user_id).unwrap().last_login, Some(now()));

        let err = UserService::authenticate(&mut records, "admin", "wrong", now())
            .expect_err("bad password");
        assert!(matches!(err, CoreError::Unauthorized(_)));
    }

    #[test]
    fn form_rejects_short_username_and_mismatched_confirmation() {
        let form = FormInput::new()
            .with("username", "ab")
            .with("email", "ab@clinic.pe")
            .with("full_name", "A B")
            .with("password", "secret1");
        let err = NewUserInput::try_from(&form).expect_err("short username");
        assert_eq!(err.field, "username");

        let form = form
            .with("username", "abc")
            .with("confirm_password", "secret2");
        let err = NewUserInput::try_from(&form).expect_err("mismatch");
        assert!(matches!(err.kind, FieldErrorKind::Mismatch { .. }));
    }
}
