use crate::db::{IdentityStore, Lookup};
use crate::error::{AppError, AuthFailure};
use crate::state::AppState;
use crate::utils::token::{IssuedToken, TokenCodec};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use time::OffsetDateTime;
use uuid::Uuid;

/// Name of the cookie that carries the credential.
pub const AUTH_COOKIE: &str = "jwt";

/// The caller, after their credential has been verified against the store.
///
/// Use this as a handler parameter and Axum will:
/// 1. Pull the `jwt` cookie
/// 2. Verify the token (signature, algorithm, expiry)
/// 3. Make sure the account still exists
///
/// and reject with 401 if any of that fails. Handlers that need to validate their
/// body before touching the store call `resolve` themselves instead.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
}

/// Works out who is calling.
///
/// A token for an account that no longer exists is treated exactly like a bad token.
/// That is how deleted accounts lose access without a revocation list. Only a genuine
/// store failure becomes a 500.
pub async fn resolve<S>(
    tokens: &TokenCodec,
    store: &S,
    jar: &CookieJar,
) -> Result<AuthenticatedUser, AppError>
where
    S: IdentityStore + ?Sized,
{
    // 1. Extract the credential
    let cookie = jar
        .get(AUTH_COOKIE)
        .ok_or(AppError::Unauthenticated(AuthFailure::MissingCredential))?;

    // 2. Verify it. Why it failed doesn't matter to the client.
    let user_id = tokens
        .parse(cookie.value())
        .map_err(|_| AppError::Unauthenticated(AuthFailure::InvalidCredential))?;

    // 3. Does the account still exist?
    match store.find_user(user_id).await? {
        Lookup::Found(user) => Ok(AuthenticatedUser {
            user_id: user.id,
            username: user.username,
        }),
        Lookup::NotFound => Err(AppError::Unauthenticated(AuthFailure::UnknownSubject)),
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        resolve(&state.tokens, &*state.db, &jar).await
    }
}

fn to_offset(at: DateTime<Utc>) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(at.timestamp()).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

fn base_cookie(value: String, expires: OffsetDateTime, production: bool) -> Cookie<'static> {
    let builder = Cookie::build((AUTH_COOKIE, value))
        .path("/")
        .http_only(true)
        .expires(expires);

    // Cross-site frontends only get the cookie back if it is Secure + SameSite=None.
    // Browsers refuse that combination over plain http, so it's production only.
    if production {
        builder.secure(true).same_site(SameSite::None).build()
    } else {
        builder.build()
    }
}

/// The cookie handed out on login. Expires together with the token.
pub fn session_cookie(issued: &IssuedToken, production: bool) -> Cookie<'static> {
    base_cookie(issued.token.clone(), to_offset(issued.expires_at), production)
}

/// Overwrites the credential with an empty value that has already expired.
pub fn logout_cookie(production: bool) -> Cookie<'static> {
    base_cookie(String::new(), OffsetDateTime::UNIX_EPOCH, production)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, StoreError, StoreResult};
    use crate::models::user::{NewUser, User};
    use async_trait::async_trait;

    fn codec() -> TokenCodec {
        TokenCodec::new("resolver-secret").unwrap()
    }

    fn jar_with(token: &str) -> CookieJar {
        CookieJar::new().add(Cookie::new(AUTH_COOKIE, token.to_string()))
    }

    async fn store_with_user() -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                id: Uuid::new_v4(),
                username: "alice".to_string(),
                password_hash: "irrelevant".to_string(),
            })
            .await
            .unwrap();
        (store, user.id)
    }

    /// A store whose every read blows up, like a database that went away.
    struct BrokenStore;

    #[async_trait]
    impl IdentityStore for BrokenStore {
        async fn create_user(&self, _user: NewUser) -> StoreResult<User> {
            Err(StoreError::Backend(anyhow::anyhow!("connection refused")))
        }
        async fn find_user(&self, _id: Uuid) -> StoreResult<Lookup<User>> {
            Err(StoreError::Backend(anyhow::anyhow!("connection refused")))
        }
        async fn find_user_by_username(&self, _username: &str) -> StoreResult<Lookup<User>> {
            Err(StoreError::Backend(anyhow::anyhow!("connection refused")))
        }
    }

    #[tokio::test]
    async fn resolves_an_existing_identity() {
        let codec = codec();
        let (store, id) = store_with_user().await;
        let token = codec.issue(id).unwrap().token;

        let user = resolve(&codec, &store, &jar_with(&token)).await.unwrap();

        assert_eq!(user.user_id, id);
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn missing_cookie_is_unauthenticated() {
        let (store, _) = store_with_user().await;
        let err = resolve(&codec(), &store, &CookieJar::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(AuthFailure::MissingCredential)));
    }

    #[tokio::test]
    async fn garbage_cookie_is_unauthenticated() {
        let (store, _) = store_with_user().await;
        let err = resolve(&codec(), &store, &jar_with("garbage")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(AuthFailure::InvalidCredential)));
    }

    #[tokio::test]
    async fn valid_token_for_unknown_account_is_unauthenticated_not_internal() {
        let codec = codec();
        let (store, _) = store_with_user().await;
        let ghost = codec.issue(Uuid::new_v4()).unwrap().token;

        let err = resolve(&codec, &store, &jar_with(&ghost)).await.unwrap_err();

        assert!(matches!(err, AppError::Unauthenticated(AuthFailure::UnknownSubject)));
    }

    #[tokio::test]
    async fn store_outage_is_internal() {
        let codec = codec();
        let token = codec.issue(Uuid::new_v4()).unwrap().token;

        let err = resolve(&codec, &BrokenStore, &jar_with(&token)).await.unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn bad_token_never_reaches_the_store() {
        // If the token is rejected first, the broken store is never asked.
        let err = resolve(&codec(), &BrokenStore, &jar_with("garbage")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[test]
    fn session_cookie_attributes() {
        let issued = codec().issue(Uuid::new_v4()).unwrap();

        let dev = session_cookie(&issued, false);
        assert_eq!(dev.name(), AUTH_COOKIE);
        assert_eq!(dev.value(), issued.token);
        assert_eq!(dev.http_only(), Some(true));
        assert_eq!(dev.path(), Some("/"));
        assert_ne!(dev.secure(), Some(true));
        assert_eq!(
            dev.expires_datetime().map(|t| t.unix_timestamp()),
            Some(issued.expires_at.timestamp())
        );

        let prod = session_cookie(&issued, true);
        assert_eq!(prod.secure(), Some(true));
        assert_eq!(prod.same_site(), Some(SameSite::None));
    }

    #[test]
    fn logout_cookie_is_empty_and_expired() {
        let cookie = logout_cookie(false);
        assert_eq!(cookie.value(), "");
        assert!(cookie.expires_datetime().unwrap() < OffsetDateTime::now_utc());
    }
}
