//! Single-owner authorization.
//!
//! The rule is simply "you may change it if you created it". Callers are expected to
//! have already resolved the identity and confirmed the resource exists; these
//! functions only compare.

use super::auth::AuthenticatedUser;
use crate::error::AppError;
use uuid::Uuid;

/// Ok if `identity` is the recorded `owner`, `Forbidden` otherwise.
pub fn authorize(identity: Uuid, owner: Uuid) -> Result<(), AppError> {
    if identity == owner {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Same rule, but the owner comes straight from a path segment such as
/// `/users/{user_id}/account`.
///
/// A segment that isn't even a UUID can't be the caller's id, so it's `Forbidden`
/// as well.
pub fn authorize_path(identity: Uuid, raw_owner: &str) -> Result<(), AppError> {
    match Uuid::parse_str(raw_owner.trim()) {
        Ok(owner) => authorize(identity, owner),
        Err(_) => Err(AppError::Forbidden),
    }
}

impl AuthenticatedUser {
    pub fn authorize(&self, owner: Uuid) -> Result<(), AppError> {
        authorize(self.user_id, owner)
    }

    pub fn authorize_path(&self, raw_owner: &str) -> Result<(), AppError> {
        authorize_path(self.user_id, raw_owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_is_allowed() {
        let me = Uuid::new_v4();
        assert!(authorize(me, me).is_ok());
    }

    #[test]
    fn anyone_else_is_forbidden() {
        let err = authorize(Uuid::new_v4(), Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[test]
    fn path_variant_compares_the_parsed_identity() {
        let me = Uuid::new_v4();
        assert!(authorize_path(me, &me.to_string()).is_ok());
        // Same identity, different spelling.
        assert!(authorize_path(me, &me.to_string().to_uppercase()).is_ok());
        assert!(matches!(
            authorize_path(me, &Uuid::new_v4().to_string()),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn unparsable_path_identity_is_forbidden() {
        assert!(matches!(authorize_path(Uuid::new_v4(), "alice"), Err(AppError::Forbidden)));
    }
}
