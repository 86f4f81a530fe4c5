use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use domain::services::{
    Clock, ComplaintLifecycle, ConnectionRegistry, NotificationEngine, OtpStore,
};
use domain::Stores;
use shared::jwt::{JwtConfig, JwtError};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, require_admin,
    require_user_auth, security_headers_middleware, trace_id, RateLimiterState,
};
use crate::routes::{
    auth, comments, complaints, health, notifications, password_reset, profile, ws,
};
use crate::services::{AuthService, EmailService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stores: Stores,
    pub jwt: Arc<JwtConfig>,
    pub lifecycle: ComplaintLifecycle,
    pub notifications: NotificationEngine,
    pub otp: Arc<OtpStore>,
    pub auth: AuthService,
    pub email: EmailService,
    pub rate_limiter: Option<Arc<RateLimiterState<i64>>>,
}

impl AppState {
    /// Wires the services over a set of stores. The connection registry and
    /// OTP store live as long as the returned state.
    pub fn new(config: Config, stores: Stores, clock: Arc<dyn Clock>) -> Result<Self, JwtError> {
        let config = Arc::new(config);
        let jwt = Arc::new(JwtConfig::new(
            &config.jwt.secret,
            config.jwt.expiry_secs,
            config.jwt.leeway_secs,
        )?);

        let registry = Arc::new(ConnectionRegistry::new());
        let notifications = NotificationEngine::new(stores.notifications.clone(), registry);
        let lifecycle = ComplaintLifecycle::new(
            stores.complaints.clone(),
            stores.users.clone(),
            stores.comments.clone(),
            notifications.clone(),
            clock.clone(),
        );

        let otp = Arc::new(OtpStore::new(clock, config.otp.policy()));
        let email = EmailService::new(config.email.clone());
        let auth = AuthService::new(
            stores.users.clone(),
            stores.security_keys.clone(),
            jwt.clone(),
            otp.clone(),
            Arc::new(RateLimiterState::per_hour(config.security.otp_sends_per_hour)),
            email.clone(),
        );

        // Rate limiting is off when rate_limit_per_minute is 0
        let rate_limiter = (config.security.rate_limit_per_minute > 0).then(|| {
            Arc::new(RateLimiterState::per_minute(
                config.security.rate_limit_per_minute,
            ))
        });

        Ok(Self {
            config,
            stores,
            jwt,
            lifecycle,
            notifications,
            otp,
            auth,
            email,
            rate_limiter,
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Asm-only handlers check the role through the AsmUser extractor.
    // Middleware order: auth runs first, then rate limiting (which needs the auth info)
    let asm_routes = Router::new()
        .route(
            "/api/asm/complaints",
            post(complaints::asm_submit).get(complaints::asm_list),
        )
        .route(
            "/api/asm/complaints/:id",
            get(complaints::asm_get).patch(complaints::asm_update),
        )
        .route("/api/asm/my-stats", get(complaints::asm_stats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    let admin_routes = Router::new()
        .route(
            "/api/complaints",
            get(complaints::admin_list).post(complaints::admin_submit),
        )
        .route("/api/complaints/stats", get(complaints::admin_stats))
        .route(
            "/api/complaints/:id",
            get(complaints::admin_get).patch(complaints::admin_update),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    // Any authenticated user
    let user_routes = Router::new()
        .route("/api/complaints/options", get(complaints::options))
        .route("/api/complaints/:id/history", get(complaints::history))
        .route(
            "/api/complaints/:id/comments",
            get(comments::list_comments).post(comments::add_comment),
        )
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/unread", get(notifications::unread))
        .route("/api/notifications/:id/read", post(notifications::mark_read))
        .route(
            "/api/notifications/mark-all-read",
            post(notifications::mark_all_read),
        )
        .route(
            "/api/profile",
            get(profile::get_profile).put(profile::update_profile),
        )
        .route("/api/change-password", post(auth::change_password))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler))
        .route("/api/asm/register", post(auth::register))
        .route("/api/asm/login", post(auth::asm_login))
        .route("/api/admin/login", post(auth::admin_login))
        .route(
            "/api/forgot-password/send-otp",
            post(password_reset::send_otp),
        )
        .route(
            "/api/forgot-password/verify-otp",
            post(password_reset::verify_otp),
        )
        .route(
            "/api/forgot-password/reset-password",
            post(password_reset::reset_password),
        )
        // Authenticates through its hello message
        .route("/ws", get(ws::ws_handler));

    Router::new()
        .merge(public_routes)
        .merge(asm_routes)
        .merge(admin_routes)
        .merge(user_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
