use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::jwt::TokenPair,
    config::AppConfig,
    error::{ApiError, FieldError},
    response::ApiResponse,
    state::AppState,
};

use super::dto::{
    AccessTokenBody, DeleteResult, ForgotPasswordRequest, LoginRequest, Paginated,
    RegisterRequest, ResetPasswordRequest, UpdateRoleRequest, UpdateRollRequest,
};
use super::query::ListQuery;
use super::repo_types::User;
use super::services;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create-user", post(create_user))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/forgotPass", post(forgot_password))
        .route("/resetpassword", post(reset_password))
        .route("/", get(list_users))
        .route("/:id", get(get_user).patch(update_role).delete(delete_user))
        .route("/roll/:id", patch(update_roll))
}

fn refresh_cookie(config: &AppConfig, token: &str) -> String {
    let mut cookie = format!("refreshToken={token}; HttpOnly; Path=/; SameSite=Lax");
    if config.is_production() {
        cookie.push_str("; Secure");
    }
    cookie
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').map(str::trim).find_map(|pair| {
        pair.strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::to_string)
    })
}

type TokenPairResponse = (HeaderMap, Json<ApiResponse<AccessTokenBody>>);

/// The access token goes in the body; the refresh token only in the
/// httpOnly cookie.
fn token_pair_response(
    config: &AppConfig,
    pair: TokenPair,
    message: &str,
) -> Result<TokenPairResponse, ApiError> {
    let mut headers = HeaderMap::new();
    let cookie = refresh_cookie(config, &pair.refresh_token);
    headers.insert(
        header::SET_COOKIE,
        cookie
            .parse()
            .map_err(|_| ApiError::Internal("refresh cookie is not a valid header".into()))?,
    );
    Ok((
        headers,
        Json(ApiResponse::ok(
            message,
            AccessTokenBody {
                access_token: pair.access_token,
            },
        )),
    ))
}

#[instrument(skip(state, payload))]
async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<TokenPairResponse, ApiError> {
    let pair = services::register(&state, payload).await?;
    token_pair_response(&state.config, pair, "Registration completed")
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<TokenPairResponse, ApiError> {
    let pair = services::login(&state, payload).await?;
    token_pair_response(&state.config, pair, "User logged in successfully")
}

#[instrument(skip(state, headers))]
async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<TokenPairResponse, ApiError> {
    let token = cookie_value(&headers, "refreshToken").ok_or_else(|| {
        ApiError::Validation(vec![FieldError::new(
            "refreshToken",
            "Refresh token is required",
        )])
    })?;
    let pair = services::refresh(&state, &token).await?;
    token_pair_response(&state.config, pair, "Token refreshed successfully")
}

#[instrument(skip(state, payload))]
async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let message = services::forgot_password(&state, payload).await?;
    Ok(Json(ApiResponse::message(message)))
}

#[instrument(skip(state, payload))]
async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    services::reset_password(&state, payload).await?;
    Ok(Json(ApiResponse::message("Password reset successfully")))
}

#[instrument(skip(state))]
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Paginated<User>>>, ApiError> {
    let (meta, data) = services::search(&state, query).await?;
    Ok(Json(ApiResponse::ok(
        "Users fetched successfully",
        Paginated { meta, data },
    )))
}

#[instrument(skip(state))]
async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = services::get_by_id(&state, id).await?;
    Ok(Json(ApiResponse::ok("User fetched successfully", user)))
}

#[instrument(skip(state, payload))]
async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = services::update_role(&state, id, payload).await?;
    Ok(Json(ApiResponse::ok("User role updated", user)))
}

#[instrument(skip(state, payload))]
async fn update_roll(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRollRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = services::update_roll(&state, id, payload).await?;
    Ok(Json(ApiResponse::ok("Roll set up successfully", user)))
}

#[instrument(skip(state))]
async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DeleteResult>>, ApiError> {
    let deleted = services::delete(&state, id).await?;
    Ok(Json(ApiResponse::ok(
        "User deleted successfully",
        DeleteResult { deleted },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_value_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "sessionId=xyz; refreshToken=tok123; theme=dark".parse().expect("header"),
        );
        assert_eq!(
            cookie_value(&headers, "refreshToken"),
            Some("tok123".to_string())
        );
        assert_eq!(cookie_value(&headers, "theme"), Some("dark".to_string()));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn cookie_value_ignores_prefix_collisions() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "refreshTokenOld=stale; refreshToken=fresh".parse().expect("header"),
        );
        assert_eq!(
            cookie_value(&headers, "refreshToken"),
            Some("fresh".to_string())
        );
    }

    #[test]
    fn refresh_cookie_is_http_only() {
        let config = AppConfig::for_tests();
        let cookie = refresh_cookie(&config, "tok");
        assert!(cookie.starts_with("refreshToken=tok"));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn refresh_cookie_is_secure_in_production() {
        let mut config = AppConfig::for_tests();
        config.environment = "production".into();
        assert!(refresh_cookie(&config, "tok").contains("; Secure"));
    }
}
