pub mod application;
pub mod db;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::order_service::OrderService;
use infrastructure::order_repo::DieselOrderRepository;

pub use db::{create_pool, DbPool};

/// The service as wired in production: the Diesel repository behind the
/// lifecycle facade.
pub type AppService = OrderService<DieselOrderRepository>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) {
    let mut conn = pool.get().expect("Failed to get DB connection for migrations");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run database migrations");
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::create_order,
        handlers::orders::update_order,
        handlers::orders::delete_order,
        handlers::orders::mark_to_do,
        handlers::orders::mark_in_progress,
        handlers::orders::mark_prepared,
        handlers::orders::mark_delivered,
        handlers::orders::mark_cancelled,
    ),
    components(schemas(
        handlers::orders::OrderRequest,
        handlers::orders::OrderLineRequest,
        handlers::orders::OrderResponse,
        handlers::orders::OrderLineResponse,
    )),
    tags((name = "orders", description = "Order lifecycle operations"))
)]
struct ApiDoc;

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    pool: DbPool,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let service = web::Data::new(OrderService::new(DieselOrderRepository::new(pool)));

    Ok(HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
            .service(
                // Status routes first: "/{id}" would otherwise swallow them.
                web::scope("/orders")
                    .route("", web::get().to(handlers::orders::list_orders))
                    .route("", web::post().to(handlers::orders::create_order))
                    .route("/todo/{id}", web::put().to(handlers::orders::mark_to_do))
                    .route(
                        "/inprogress/{id}",
                        web::put().to(handlers::orders::mark_in_progress),
                    )
                    .route(
                        "/prepared/{id}",
                        web::put().to(handlers::orders::mark_prepared),
                    )
                    .route(
                        "/delivered/{id}",
                        web::put().to(handlers::orders::mark_delivered),
                    )
                    .route(
                        "/cancelled/{id}",
                        web::put().to(handlers::orders::mark_cancelled),
                    )
                    .route("/{id}", web::get().to(handlers::orders::get_order))
                    .route("/{id}", web::put().to(handlers::orders::update_order))
                    .route("/{id}", web::delete().to(handlers::orders::delete_order)),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
