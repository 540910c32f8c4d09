use axum::extract::FromRef;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        jwt::{JwtKeys, TokenPair},
        password::{hash_password, verify_password},
    },
    error::ApiError,
    mailer::reset_password_body,
    state::AppState,
};

use super::dto::{
    ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest, UpdateRoleRequest,
    UpdateRollRequest,
};
use super::query::ListQuery;
use super::repo_types::User;

pub const MAX_LOGIN_ATTEMPTS: i32 = 10;
pub const LOCK_MINUTES: i32 = 30;

fn lock_active(lock_until: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    lock_until.is_some_and(|until| until > now)
}

fn locked_until_message(until: OffsetDateTime) -> String {
    let stamp = until
        .format(&Rfc3339)
        .unwrap_or_else(|_| until.to_string());
    format!("Account is locked until {stamp}")
}

pub async fn register(state: &AppState, req: RegisterRequest) -> Result<TokenPair, ApiError> {
    req.validate()?;
    let password_hash = hash_password(&req.password, &state.config.hash)?;
    let user = User::create(&state.db, &req, &password_hash).await?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(JwtKeys::from_ref(state).sign_pair(&user)?)
}

/// The only real state machine in the system: {Active, Locked}. Ten
/// consecutive mismatches lock the account for thirty minutes; the lock
/// check runs before the password comparison, so a correct password
/// submitted while locked is still rejected. The lock clears by time
/// alone, re-evaluated on the next attempt.
pub async fn login(state: &AppState, req: LoginRequest) -> Result<TokenPair, ApiError> {
    req.validate()?;

    let Some(login) = User::login_state_by_email(&state.db, &req.email).await? else {
        return Err(ApiError::NotFound("User does not exist".into()));
    };
    debug!(
        user_id = %login.id,
        failed_attempts = login.failed_login_attempts,
        "login state fetched"
    );

    let now = OffsetDateTime::now_utc();
    if lock_active(login.lock_until, now) {
        warn!(user_id = %login.id, "login attempt on locked account");
        let until = login.lock_until.unwrap_or(now);
        return Err(ApiError::Unauthorized(locked_until_message(until)));
    }

    if !verify_password(&req.password, &login.password_hash)? {
        let lockout =
            User::record_failed_attempt(&state.db, &login.email, MAX_LOGIN_ATTEMPTS, LOCK_MINUTES)
                .await?;
        if lockout.failed_login_attempts >= MAX_LOGIN_ATTEMPTS {
            warn!(
                user_id = %login.id,
                attempts = lockout.failed_login_attempts,
                lock_until = ?lockout.lock_until,
                "account locked"
            );
            return Err(ApiError::Unauthorized(format!(
                "Account locked. Too many failed attempts. Try again in {LOCK_MINUTES} minutes."
            )));
        }
        warn!(user_id = %login.id, attempts = lockout.failed_login_attempts, "incorrect password");
        return Err(ApiError::Unauthorized(format!(
            "Incorrect password. The account locks after {MAX_LOGIN_ATTEMPTS} failed attempts."
        )));
    }

    User::clear_lockout(&state.db, &login.email).await?;

    let user = User::find_by_email(&state.db, &login.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User information not found".into()))?;
    info!(user_id = %user.id, "user logged in");
    Ok(JwtKeys::from_ref(state).sign_pair(&user)?)
}

/// The presented token is verified against the refresh secret before any
/// claim in it is trusted.
pub async fn refresh(state: &AppState, token: &str) -> Result<TokenPair, ApiError> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys
        .verify_refresh(token)
        .map_err(|_| ApiError::Unauthorized("Invalid refresh token".into()))?;

    let user = User::find_by_email(&state.db, &claims.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User does not exist".into()))?;
    info!(user_id = %user.id, "token pair refreshed");
    Ok(keys.sign_pair(&user)?)
}

pub async fn forgot_password(
    state: &AppState,
    req: ForgotPasswordRequest,
) -> Result<String, ApiError> {
    req.validate()?;
    let owner = User::password_owner_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("No account is registered with this email".into()))?;

    let token = JwtKeys::from_ref(state).sign_reset(owner.id)?;
    let reset_link = format!("{}{}", state.config.reset_link_base, token);
    let body = reset_password_body(&owner.name, &reset_link);
    state
        .mailer
        .send(&owner.email, "Reset Password Link", &body)
        .await?;
    info!(user_id = %owner.id, "reset link dispatched");
    Ok("Check your email!".into())
}

pub async fn reset_password(state: &AppState, req: ResetPasswordRequest) -> Result<(), ApiError> {
    req.validate()?;
    let user = User::find_by_id(&state.db, req.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user matches this id".into()))?;

    let claims = JwtKeys::from_ref(state)
        .verify_reset(&req.token)
        .map_err(|_| ApiError::Unauthorized("Reset token is invalid or expired".into()))?;
    if claims.sub != user.id {
        return Err(ApiError::Unauthorized(
            "Reset token does not belong to this user".into(),
        ));
    }

    let password_hash = hash_password(&req.password, &state.config.hash)?;
    User::set_password_hash(&state.db, user.id, &password_hash).await?;
    info!(user_id = %user.id, "password reset");
    Ok(())
}

pub async fn search(
    state: &AppState,
    query: ListQuery,
) -> Result<(super::dto::PageMeta, Vec<User>), ApiError> {
    let resolved = query.resolve();
    let (users, total) = User::search(&state.db, &resolved).await?;
    Ok((
        super::dto::PageMeta {
            page: resolved.page,
            limit: resolved.limit,
            total,
        },
        users,
    ))
}

pub async fn get_by_id(state: &AppState, id: Uuid) -> Result<User, ApiError> {
    if let Some(user) = state.profile_cache.get(&id) {
        return Ok(user);
    }
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user matches this id".into()))?;
    state.profile_cache.insert(id, user.clone());
    Ok(user)
}

pub async fn update_role(
    state: &AppState,
    id: Uuid,
    req: UpdateRoleRequest,
) -> Result<User, ApiError> {
    req.validate()?;
    let user = User::update_role(&state.db, id, &req.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user matches this id".into()))?;
    state.profile_cache.invalidate(&id);
    info!(user_id = %user.id, role = %req.role, "role updated");
    Ok(user)
}

pub async fn update_roll(
    state: &AppState,
    id: Uuid,
    req: UpdateRollRequest,
) -> Result<User, ApiError> {
    req.validate()?;
    if let Some(existing) = User::find_by_roll(&state.db, &req.roll).await? {
        if existing.id != id {
            return Err(ApiError::Conflict("This roll already exists".into()));
        }
    }
    let user = User::update_roll(&state.db, id, &req.roll)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user matches this id".into()))?;
    state.profile_cache.invalidate(&id);
    info!(user_id = %user.id, roll = %req.roll, "roll updated");
    Ok(user)
}

pub async fn delete(state: &AppState, id: Uuid) -> Result<u64, ApiError> {
    let deleted = User::delete_by_id(&state.db, id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("User not found".into()));
    }
    state.profile_cache.invalidate(&id);
    info!(user_id = %id, "user deleted");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration as TimeDuration;

    #[test]
    fn lock_is_active_only_until_expiry() {
        let now = OffsetDateTime::now_utc();
        assert!(!lock_active(None, now));
        assert!(lock_active(Some(now + TimeDuration::minutes(5)), now));
        assert!(!lock_active(Some(now - TimeDuration::seconds(1)), now));
    }

    #[test]
    fn locked_message_names_the_expiry() {
        let until = OffsetDateTime::UNIX_EPOCH + TimeDuration::days(19_000);
        let message = locked_until_message(until);
        assert!(message.starts_with("Account is locked until "));
        assert!(message.contains("2022"));
    }

    #[test]
    fn lockout_thresholds_match_policy() {
        assert_eq!(MAX_LOGIN_ATTEMPTS, 10);
        assert_eq!(LOCK_MINUTES, 30);
    }
}
