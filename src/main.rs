use std::net::SocketAddr;

use apm_capture::{
    ApmState, ChannelSink, Config, LogSink, TransactionSink, apm_middleware,
};
use axum::{
    Json, Router,
    extract::Path,
    middleware,
    routing::{get, post},
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "apm-capture-demo", version, about = "APM 请求采集演示服务")]
struct Args {
    /// 配置文件路径
    #[arg(short, long, default_value = Config::default_config_path())]
    config: String,

    /// 监听地址（覆盖配置文件）
    #[arg(long)]
    host: Option<String>,

    /// 监听端口（覆盖配置文件）
    #[arg(long)]
    port: Option<u16>,
}

async fn index() -> &'static str {
    "ok"
}

async fn echo(body: String) -> String {
    body
}

async fn get_user(Path(id): Path<u64>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "id": id, "name": format!("user-{}", id) }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::load(&args.config)?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    // 后台批量消费事件，模拟外部 APM 客户端
    let (sink, mut receiver) = ChannelSink::new(config.channel_capacity);
    tokio::spawn(async move {
        while let Some(first) = receiver.recv().await {
            let mut batch = vec![first];
            while let Ok(event) = receiver.try_recv() {
                batch.push(event);
                if batch.len() >= 100 {
                    break;
                }
            }
            tracing::debug!("上报 {} 条事务事件", batch.len());
            for event in batch {
                LogSink.record(event);
            }
        }
    });

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = ApmState::new(config, sink);
    tracing::info!(
        service = %state.config().service_name,
        capture_body = ?state.config().capture_body,
        "APM 采集已启用"
    );

    let app = Router::new()
        .route("/", get(index))
        .route("/echo", post(echo))
        .route("/users/{id}", get(get_user))
        .layer(middleware::from_fn_with_state(state, apm_middleware));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("监听 {}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
