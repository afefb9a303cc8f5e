use axum::Router;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use mango_bots_server::bots::BotDataService;
use mango_bots_server::mango::accounts::MangoInstructionBuilder;
use mango_bots_server::mango::decoder::InstructionDecoder;
use mango_bots_server::mango::group::GroupCache;
use mango_bots_server::solana::feed::SignatureFeed;
use mango_bots_server::solana::{IngestionPipeline, SolanaClient};
use mango_bots_server::watch::{AccountWatchRegistry, WebhookClient};
use mango_bots_server::ws::FanoutRegistry;
use mango_bots_server::{config, db, docs, router, AppState};

#[tokio::main]
async fn main() {
    // 初始化日志，stdout + 按天滚动的文件
    // Logging init, stdout plus a daily rolling file
    let file_appender = tracing_appender::rolling::daily("logs", "mango-bots-server.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mango_bots_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    tracing::info!("启动 Mango Bots Server...");

    // 加载配置
    let config = match config::Config::new() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ 配置加载失败: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("✅ 配置加载成功");

    let program_id = match Pubkey::from_str(&config.mango.program_id) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("❌ 无效的program_id / Invalid program id: {}", e);
            std::process::exit(1);
        }
    };
    let group = match Pubkey::from_str(&config.mango.group) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("❌ 无效的group地址 / Invalid group pubkey: {}", e);
            std::process::exit(1);
        }
    };

    // 初始化 RocksDB
    let db_storage = match db::RocksDbStorage::new(&config) {
        Ok(storage) => storage,
        Err(e) => {
            tracing::error!("❌ RocksDB 初始化失败: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("✅ RocksDB 初始化成功");

    let event_storage = Arc::new(db_storage.create_event_storage());
    let account_storage = Arc::new(db_storage.create_account_storage());

    // Solana RPC客户端
    let client = match SolanaClient::new(
        config.solana.rpc_url.clone(),
        config.solana.commitment.clone(),
    ) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("❌ Solana客户端初始化失败: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = client.check_connection().await {
        tracing::warn!("⚠️ Solana RPC不可达，启动继续: {}", e);
    }

    // Group快照必须先就位，解码全靠它
    let group_cache = GroupCache::new(&config);
    if let Err(e) = group_cache.refresh().await {
        tracing::error!("❌ Group快照初始化失败 / Initial group snapshot failed: {}", e);
        std::process::exit(1);
    }
    group_cache.spawn_refresh(config.mango.group_refresh_secs);

    // 账户监听表，本地与远端webhook对齐
    let webhook = WebhookClient::new(&config.webhook);
    let registry = Arc::new(AccountWatchRegistry::new(
        Arc::clone(&account_storage),
        webhook,
    ));
    if let Err(e) = registry.warm_up().await {
        tracing::warn!("⚠️ 监听表预热失败 / Watch registry warm-up failed: {}", e);
    }

    let fanout = Arc::new(FanoutRegistry::new());
    let bots = Arc::new(BotDataService::new(
        Arc::clone(&account_storage),
        Arc::clone(&event_storage),
    ));

    let decoder = InstructionDecoder::new(group_cache.clone());
    let pipeline = Arc::new(IngestionPipeline::new(
        &config,
        client.clone(),
        decoder,
        Arc::clone(&event_storage),
        Arc::clone(&account_storage),
        Arc::clone(&registry),
        Arc::clone(&fanout),
        Arc::clone(&bots),
    ));

    // 实时签名流，ctrl_c时翻转shutdown信号
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let feed = SignatureFeed::new(&config, Arc::clone(&pipeline));
    tokio::spawn(async move { feed.run(shutdown_rx).await });
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let state = Arc::new(AppState {
        config: config.clone(),
        event_storage,
        account_storage,
        registry,
        fanout,
        bots,
        client,
        pipeline,
        group: group_cache,
        builder: MangoInstructionBuilder::new(program_id, group),
    });

    // 创建 CORS 层
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // 创建路由
    let api_router = router::create_router(state);

    // 创建 Swagger UI
    let swagger_ui =
        SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", docs::ApiDoc::openapi());

    // 组合所有路由
    let app = Router::new().merge(swagger_ui).merge(api_router).layer(cors);

    // 绑定地址
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("❌ 端口绑定失败 {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("服务器启动成功！");
    tracing::info!("访问 http://localhost:{}/health 测试接口", config.server.port);
    tracing::info!(
        "访问 http://localhost:{}/swagger-ui 查看 API 文档",
        config.server.port
    );
    tracing::info!("WebSocket 入口 ws://localhost:{}/ws", config.server.port);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("❌ 服务器异常退出: {}", e);
        std::process::exit(1);
    }
}
