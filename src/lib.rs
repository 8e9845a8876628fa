pub mod application;
pub mod config;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod openapi;

use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::order_service::OrderService;
use domain::ports::OrderRepository;
use errors::AppError;
use infrastructure::kv::KvStore;
use infrastructure::order_repo::KvOrderRepository;

pub use config::Settings;

/// Shared per-server state handed to every handler.
pub struct AppState {
    pub orders: OrderService<Arc<dyn OrderRepository>>,
    pub store: Arc<dyn KvStore>,
}

impl AppState {
    /// Wires an order repository over `store`; every store call made on
    /// behalf of a request is bounded by `deadline`.
    pub fn new<S: KvStore>(store: Arc<S>, deadline: Duration) -> Self {
        let repo: Arc<dyn OrderRepository> = Arc::new(KvOrderRepository::new(store.clone()));
        Self {
            orders: OrderService::new(repo, deadline),
            store,
        }
    }
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().body("order store")
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    match state.store.ping().await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "status": "ok" })),
        Err(e) => {
            log::warn!("health check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(serde_json::json!({ "status": "unavailable" }))
        }
    }
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server. On SIGINT/SIGTERM in-flight requests get
/// `shutdown_timeout_secs` to finish.
pub fn build_server(
    state: AppState,
    host: &str,
    port: u16,
    shutdown_timeout_secs: u64,
) -> std::io::Result<actix_web::dev::Server> {
    let state = web::Data::new(state);
    let openapi = openapi::ApiDoc::openapi();

    Ok(HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                AppError::BadRequest(err.to_string()).into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                AppError::BadRequest(err.to_string()).into()
            }))
            .wrap(Logger::default())
            .route("/", web::get().to(index))
            .route("/health", web::get().to(health))
            .service(
                web::scope("/orders")
                    .route("", web::post().to(handlers::orders::create_order))
                    .route("", web::get().to(handlers::orders::list_orders))
                    .route("/{id}", web::get().to(handlers::orders::get_order))
                    .route("/{id}", web::put().to(handlers::orders::update_order))
                    .route("/{id}", web::delete().to(handlers::orders::delete_order)),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind((host.to_string(), port))?
    .shutdown_timeout(shutdown_timeout_secs)
    .run())
}
