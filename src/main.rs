use std::sync::Arc;

use fashion_backend::features::catalog::LocalAssetStore;
use fashion_backend::storage::Repositories;
use fashion_backend::{AppConfig, AppState, ShutdownManager, build_router};

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "fashion_backend={},tower_http=info",
            config.logging.level
        )
        .into()
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format.eq_ignore_ascii_case("compact") {
        builder.compact().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config init failed: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(&config);
    tracing::info!("配置已加载（配置文件: {:?}）", AppConfig::get_config_path());

    let shutdown_manager = ShutdownManager::new();
    if let Err(e) = shutdown_manager.start_signal_handler() {
        tracing::error!("信号处理器启动失败: {}", e);
        std::process::exit(1);
    }

    let repos = match Repositories::open(&config.storage).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("存储初始化失败: {}", e);
            std::process::exit(1);
        }
    };

    let assets = LocalAssetStore::new(config.uploads_path());
    if let Err(e) = assets.ensure_root().await {
        tracing::error!("上传目录不可用 {:?}: {}", config.uploads_path(), e);
        std::process::exit(1);
    }

    let state = AppState::new(&repos, Arc::new(assets), &config);
    let app = build_router(state, &config);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Bind address failed {}: {}", addr, e);
            std::process::exit(1);
        });

    tracing::info!("Server: http://{}", addr);
    tracing::info!("Docs: http://{}/docs", addr);
    tracing::info!("Health: http://{}/health", addr);
    tracing::info!("Catalog API: http://{}{}/products", addr, config.api.prefix);
    tracing::info!("Uploads: {:?} -> {}", config.uploads_path(), config.uploads.public_prefix);

    let graceful = axum::serve(listener, app).with_graceful_shutdown({
        let manager = shutdown_manager.clone();
        async move {
            let reason = manager.wait_for_shutdown().await;
            tracing::info!("接收到退出信号: {:?}，开始优雅关闭HTTP服务器...", reason);
        }
    });

    // 信号到达后，在途请求有 timeout_secs 的时间完成
    let server = tokio::spawn(async move { graceful.await });
    let result = tokio::select! {
        res = server => res,
        _ = async {
            shutdown_manager.wait_for_shutdown().await;
            tokio::time::sleep(config.shutdown.timeout_duration()).await;
        } => {
            tracing::warn!("优雅退出超时，强制退出");
            repos.close().await;
            std::process::exit(1);
        }
    };

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!("服务器运行错误: {}", e);
            repos.close().await;
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!("服务器任务异常: {}", e);
            repos.close().await;
            std::process::exit(1);
        }
    }

    repos.close().await;
    tracing::info!("服务器已优雅关闭");
}
