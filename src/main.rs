use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use ian_ecosystem::{
    adapters::{MemoryStore, MongoStore},
    api,
    config::{Config, StorageBackend},
    database, middleware,
    ports::Storage,
};

fn startup_error(message: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, message.to_string())
}

fn cors(origins: &[String]) -> Cors {
    if origins.is_empty() {
        return Cors::permissive();
    }

    origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "OPTIONS"])
        .allowed_headers(vec![
            actix_web::http::header::AUTHORIZATION,
            actix_web::http::header::CONTENT_TYPE,
            actix_web::http::header::ACCEPT,
        ])
        .expose_headers(vec![actix_web::http::header::CONTENT_TYPE])
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(startup_error)?;

    log::info!("🚀 Starting IAN Ecosystem API...");

    let storage = match config.backend {
        StorageBackend::MongoDB => {
            let uri = config
                .mongodb_uri
                .as_deref()
                .ok_or_else(|| startup_error("MONGODB_URI must be set"))?;
            let db = database::MongoDB::new(uri).await.map_err(startup_error)?;
            log::info!("✅ MongoDB connected successfully");
            Storage::from_adapter(MongoStore::new(db))
        }
        StorageBackend::Memory => {
            log::warn!("⚠️  Using in-memory storage, data is lost on restart");
            Storage::from_adapter(MemoryStore::new())
        }
    };

    let storage_data = web::Data::new(storage);
    let auth_data = web::Data::new(config.auth.clone());
    let cors_origins = config.cors_origins.clone();
    let bind_address = config.bind_address();

    log::info!("🌐 Server starting on {}", bind_address);
    log::info!("📚 Swagger UI available at: http://{}/swagger-ui/", bind_address);
    log::info!("📄 OpenAPI spec at: http://{}/api-docs/openapi.json", bind_address);

    // Start HTTP server
    HttpServer::new(move || {
        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(storage_data.clone())
            .app_data(auth_data.clone())
            .wrap(cors(&cors_origins))
            .wrap(middleware::SecurityHeaders)
            .wrap(Logger::default())
            .wrap(Logger::new("%a %{User-Agent}i"))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
            .configure(api::configure)
    })
    .bind(&bind_address)?
    .run()
    .await
}
