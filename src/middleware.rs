//! APM 插桩中间件
//!
//! 每个请求开启一个事务，响应返回后采集请求/响应上下文，
//! 以 `<METHOD> <路由模板>` 命名，结果按状态码分组，最后交给 sink。

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::{MatchedPath, State},
    http::{HeaderMap, Request, header::CONTENT_TYPE},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use futures::stream;

use crate::capture::{
    AppConfigSnapshot, AxumRequest, AxumResponse, CaptureSettings, RequestInfo,
    build_request_info, build_response_info, is_discarded_content_type,
};
use crate::event::{
    FrameworkInfo, TRANSACTION_TYPE_REQUEST, TransactionContext, TransactionEvent,
    build_transaction_name, transaction_result,
};
use crate::model::config::Config;
use crate::sink::TransactionSink;
use crate::trace_parent::{TRACEPARENT_HEADER, TraceParent};

/// 中间件共享状态
#[derive(Clone)]
pub struct ApmState {
    config: Arc<Config>,
    sink: Arc<dyn TransactionSink>,
    app_config: AppConfigSnapshot,
}

impl ApmState {
    pub fn new(config: Config, sink: impl TransactionSink + 'static) -> Self {
        let app_config = AppConfigSnapshot::from_config(&config);
        Self {
            config: Arc::new(config),
            sink: Arc::new(sink),
            app_config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn skip_headers(&self) -> Option<&[String]> {
        Some(self.config.skip_headers.as_slice()).filter(|skip| !skip.is_empty())
    }
}

/// 读取上游传入的 traceparent，格式错误时开启新的追踪
fn incoming_trace_parent(headers: &HeaderMap) -> Option<TraceParent> {
    let raw = headers.get(TRACEPARENT_HEADER)?.to_str().ok()?;
    match TraceParent::parse(raw) {
        Ok(trace_parent) => Some(trace_parent),
        Err(e) => {
            tracing::debug!("忽略无效的 traceparent 头 {:?}: {}", raw, e);
            None
        }
    }
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// body 长度上限已知且不超过 `max_bytes`
fn body_within_limit(body: &Body, max_bytes: usize) -> bool {
    body.size_hint()
        .upper()
        .is_some_and(|upper| upper <= max_bytes as u64)
}

/// 响应 body 是否可以缓冲
///
/// 流式响应（SSE 或长度未知）不缓冲，避免破坏流式传输
fn response_body_bufferable(headers: &HeaderMap, body: &Body, max_bytes: usize) -> bool {
    if content_type(headers)
        .to_ascii_lowercase()
        .starts_with("text/event-stream")
    {
        return false;
    }
    body_within_limit(body, max_bytes)
}

/// 缓冲 body，返回采集到的字节和交给下游的 body
///
/// 读取中途出错时不采集，下游拿到的 body 会重放同一个错误
async fn buffer_body(body: Body, max_bytes: usize) -> (Option<Bytes>, Body) {
    match axum::body::to_bytes(body, max_bytes).await {
        Ok(bytes) => (Some(bytes.clone()), Body::from(bytes)),
        Err(e) => {
            tracing::warn!("缓冲 body 失败，本次不采集 body: {}", e);
            let replay = stream::iter([Err::<Bytes, axum::Error>(e)]);
            (None, Body::from_stream(replay))
        }
    }
}

/// 采集错误事件的请求上下文（body 按 errors 规则采集）
pub async fn capture_error_context(
    state: &ApmState,
    request: &AxumRequest,
) -> anyhow::Result<RequestInfo> {
    let settings = CaptureSettings::for_errors(&state.config);
    let request = request.clone().with_app_config(state.app_config.clone());
    build_request_info(&settings, &request, state.skip_headers()).await
}

/// APM 插桩中间件
pub async fn apm_middleware(
    State(state): State<ApmState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.should_instrument() {
        return next.run(request).await;
    }

    let started_at = Instant::now();
    let timestamp = Utc::now().to_rfc3339();
    let incoming = incoming_trace_parent(request.headers());
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string());
    let settings = CaptureSettings::for_transactions(&state.config);
    let max_body_bytes = state.config.max_body_bytes;

    let (parts, body) = request.into_parts();
    // multipart/octet-stream 只记 [DISCARDED]，不需要读 body；
    // 超限或长度未知的 body 原样放行，记为 [REDACTED]
    let discarded = is_discarded_content_type(content_type(&parts.headers));
    let buffer_request = settings.wants_request_body(parts.method.as_str())
        && !discarded
        && body_within_limit(&body, max_body_bytes);
    let (request_bytes, body) = if buffer_request {
        buffer_body(body, max_body_bytes).await
    } else {
        (None, body)
    };
    let request_settings = CaptureSettings {
        capture_body: settings.capture_body && (discarded || request_bytes.is_some()),
        ..settings.clone()
    };
    let captured_request =
        AxumRequest::from_parts(&parts, request_bytes.unwrap_or_default())
            .with_app_config(state.app_config.clone());
    let method = parts.method.to_string();

    let response = next.run(Request::from_parts(parts, body)).await;

    let (parts, body) = response.into_parts();
    let (response_bytes, body) = if settings.capture_body
        && response_body_bufferable(&parts.headers, &body, max_body_bytes)
    {
        buffer_body(body, max_body_bytes).await
    } else {
        (None, body)
    };
    // 未缓冲的响应 body 一律隐去
    let response_settings = CaptureSettings {
        capture_body: response_bytes.is_some(),
        ..settings.clone()
    };
    let captured_response = AxumResponse::from_parts(&parts, response_bytes.unwrap_or_default());
    let status = parts.status.as_u16();
    let response = Response::from_parts(parts, body);

    let skip_headers = state.skip_headers();
    let request_info = build_request_info(&request_settings, &captured_request, skip_headers).await;
    let response_info =
        build_response_info(&response_settings, &captured_response, skip_headers).await;

    let context = match (request_info, response_info) {
        (Ok(request), Ok(response_info)) => TransactionContext {
            request,
            response: response_info,
        },
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!("采集事务上下文失败，丢弃本次事务: {}", e);
            return response;
        }
    };

    let (trace, parent_id) = match incoming {
        Some(parent) => (parent.child(), Some(parent.span_id)),
        None => (TraceParent::new_root(), None),
    };

    state.sink.record(TransactionEvent {
        id: trace.span_id.clone(),
        sampled: trace.is_sampled(),
        trace_id: trace.trace_id,
        parent_id,
        name: build_transaction_name(&method, route.as_deref()),
        transaction_type: TRANSACTION_TYPE_REQUEST.to_string(),
        result: transaction_result(status),
        timestamp,
        duration_ms: started_at.elapsed().as_secs_f64() * 1000.0,
        service_name: state.config.service_name.clone(),
        framework: FrameworkInfo::from_config(&state.config),
        context,
    });

    response
}
