use crate::handlers::{
    auth::{login, logout, signup},
    comments::{create_comment, delete_comment, list_comments, update_comment_content},
    health::health_check,
    threads::{create_thread, delete_thread, get_thread, list_threads, update_thread_content},
    users::{get_account, get_user_info},
};
use crate::middleware::rate_limit;
use crate::state::AppState;
use crate::utils::pagination::TOTAL_COUNT_HEADER;
use axum::{
    Router,
    handler::Handler,
    http::{HeaderValue, Method, header},
    routing::{delete, get, patch, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn create_routes(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    // Rate limit configurations
    let login_conf = rate_limit::create_login_config();
    let signup_conf = rate_limit::create_signup_config();
    let post_conf = rate_limit::create_post_config();

    let user_routes = Router::new()
        .route(
            "/",
            post(signup.layer(rate_limit::limit(signup_conf))),
        )
        .route(
            "/auth",
            post(login.layer(rate_limit::limit(login_conf))),
        )
        .route("/unauth", get(logout))
        .route("/{user_id}", get(get_user_info))
        .route("/{user_id}/account", get(get_account));

    let thread_routes = Router::new()
        .route(
            "/",
            get(list_threads).post(create_thread.layer(rate_limit::limit(post_conf.clone()))),
        )
        .route("/{thread_id}", get(get_thread).delete(delete_thread))
        .route("/{thread_id}/content", patch(update_thread_content));

    let comment_routes = Router::new()
        .route(
            "/",
            get(list_comments).post(create_comment.layer(rate_limit::limit(post_conf))),
        )
        .route("/{comment_id}", delete(delete_comment))
        .route("/{comment_id}/content", patch(update_comment_content));

    let api = Router::new()
        .route("/health", get(health_check))
        .nest("/users", user_routes)
        .nest("/threads", thread_routes)
        .nest("/comments", comment_routes);

    Router::new()
        .nest("/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// No configured origins: anything goes, but the browser won't send cookies.
/// Configured origins: only those, with credentials. Credentialed CORS can't use
/// wildcards, so methods and headers are spelled out.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().expose_headers([TOTAL_COUNT_HEADER.clone()]);

    if origins.is_empty() {
        return base
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring unusable CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(allowed)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_layers_build_for_both_modes() {
        cors_layer(&[]);
        cors_layer(&["https://app.example".to_string(), "bad\norigin".to_string()]);
    }
}
