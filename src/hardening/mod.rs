pub mod directory;
pub mod gate;
pub mod handlers;
pub mod middleware;
pub mod notice;
pub mod settings;
pub mod store;
pub mod throttle;

use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;

use self::{
    directory::UserDirectory,
    gate::ResetGate,
    handlers::{authentication, backend, health},
    settings::Settings,
    store::{CounterStore, FailedLogins, ResetFlags},
    throttle::LoginThrottle,
};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Both policies wired to the same collaborators.
#[derive(Clone)]
pub struct Policies {
    settings: Arc<Settings>,
    directory: Arc<dyn UserDirectory>,
    gate: Arc<ResetGate>,
    throttle: Arc<LoginThrottle>,
}

impl Policies {
    #[must_use]
    pub fn new(
        settings: Settings,
        directory: Arc<dyn UserDirectory>,
        store: Arc<dyn CounterStore>,
    ) -> Self {
        let settings = Arc::new(settings);

        let gate = Arc::new(ResetGate::new(
            settings.clone(),
            directory.clone(),
            ResetFlags::new(store.clone()),
        ));
        let throttle = Arc::new(LoginThrottle::new(
            settings.clone(),
            directory.clone(),
            FailedLogins::new(store),
        ));

        Self {
            settings,
            directory,
            gate,
            throttle,
        }
    }
}

/// Build the router: stand-in backend pages behind the reset gate and the
/// authentication outcome endpoints behind the throttle.
#[must_use]
pub fn router(policies: &Policies) -> Router {
    let prefix = policies.settings.route_prefix();

    let primary = Router::new()
        .route(&format!("{prefix}/ui"), get(backend::home))
        .route_layer(from_fn_with_state(
            policies.gate.clone(),
            middleware::primary_entry,
        ));

    let modules = Router::new()
        .route(&format!("{prefix}/:module"), get(backend::module))
        .route(&format!("{prefix}/:module/*action"), get(backend::module))
        .route_layer(from_fn_with_state(
            policies.gate.clone(),
            middleware::module_entry,
        ));

    let authentication = Router::new()
        .route(
            &format!("{prefix}/authentication/failure"),
            post(authentication::failure),
        )
        .route(
            &format!("{prefix}/authentication/success"),
            post(authentication::success),
        )
        .layer(Extension(policies.throttle.clone()));

    Router::new()
        .route("/health", get(health::health))
        .merge(primary)
        .merge(modules)
        .merge(authentication)
        .layer(from_fn_with_state(
            policies.directory.clone(),
            middleware::authenticate,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID_HEADER),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID_HEADER,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(policies.settings.clone())),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to bind or serve
pub async fn new(port: u16, policies: Policies) -> Result<()> {
    let app = router(&policies);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {err}");
                std::future::pending::<()>().await;
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
