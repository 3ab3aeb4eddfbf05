use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod error;
mod jwt;
mod middleware;
mod models;
mod rate_limiter;
mod repositories;
mod routes;
mod session;
mod validation;

use tokio::net::TcpListener;

use crate::jwt::{JwtConfig, JwtService};
use crate::models::{NewUser, Role};
use crate::rate_limiter::{RateLimiter, RateLimiterConfig};
use crate::repositories::{UserRepository, UserStore};
use crate::session::SessionService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionService<UserRepository>,
    pub rate_limiter: RateLimiter,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting authentication service");

    // Initialize database connection pool
    let db_config = common::database::DatabaseConfig::from_env()?;
    let pool = common::database::init_pool(&db_config).await?;

    // Check database connectivity
    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    // Initialize JWT service
    let jwt_config = JwtConfig::from_env()?;
    let jwt_service = JwtService::new(jwt_config);

    let user_repository = UserRepository::new(pool.clone());

    // Provision the initial admin account on first run, if configured
    if let Ok(password) = std::env::var("BOOTSTRAP_ADMIN_PASSWORD") {
        bootstrap_admin(&user_repository, &password).await?;
    }

    let sessions = SessionService::new(user_repository, jwt_service);
    let rate_limiter = RateLimiter::new(RateLimiterConfig::default());

    let app_state = AppState {
        sessions,
        rate_limiter,
    };

    info!("Authentication service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Authentication service listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the default admin account if it does not exist yet
///
/// User rows are otherwise provisioned by the fleet administration tooling;
/// this only covers a fresh deployment that has no accounts at all.
async fn bootstrap_admin(repo: &UserRepository, password: &str) -> Result<()> {
    if repo.find_by_username("admin").await?.is_some() {
        return Ok(());
    }

    let admin = NewUser {
        username: "admin".to_string(),
        email: "admin@motorpool.dev".to_string(),
        password: password.to_string(),
        role: Role::Admin,
    };
    let created = repo.create(&admin).await?;
    info!("Bootstrapped admin account {}", created.id);

    Ok(())
}
