use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use issuedesk::{
    AppState,
    config::Config,
    database::PgRateLimitStore,
    rate_limit::{
        CleanupMode, MemoryRateLimitStore, RateLimitStore, RateLimiterRegistry, SystemClock,
        spawn_sweeper,
    },
    router::create_router,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 限流计数存储：有数据库时使用 Postgres，否则退化为进程内存储
    let store: Arc<dyn RateLimitStore> = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .after_connect(|conn, _meta| {
                    Box::pin(async move {
                        conn.execute("SET application_name = 'issuedesk_backend';")
                            .await?;
                        Ok(())
                    })
                })
                .connect(database_url)
                .await
                .expect("Failed to connect to Postgres");

            let store = PgRateLimitStore::new(pool);
            store
                .ensure_schema()
                .await
                .expect("Failed to create rate_limits table");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, rate limits are kept in memory per process");
            Arc::new(MemoryRateLimitStore::new())
        }
    };

    // 设置限流器
    let clock = Arc::new(SystemClock);
    let cleanup = config.cleanup_mode();
    if let CleanupMode::Background { interval } = cleanup {
        spawn_sweeper(store.clone(), clock.clone(), interval);
    }
    let limiters = RateLimiterRegistry::new(config.rate_limit_policies(), store, clock, cleanup);
    tracing::info!("Rate limit policies: {:?}", limiters.names());

    // 设置应用状态
    let state = AppState {
        config: config.clone(),
        limiters: Arc::new(limiters),
    };

    let router = create_router(state).expect("Rate limit policy missing");

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
