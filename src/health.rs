use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();
    let uptime_seconds = state.get_uptime_seconds();

    let service_status = get_service_status(&state);

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            },
            "turns_processed": metrics.turns_processed
        },
        "sessions": {
            "active_sessions": state.sessions.session_count(),
            "stored_messages": state.sessions.message_count()
        },
        "memory": get_memory_info(),
        "services": {
            "transcription": {
                "model": config.openai.transcription_model,
                "configured": config.openai.is_configured()
            },
            "chat": {
                "model": config.openai.chat_model,
                "configured": config.openai.is_configured()
            },
            "search": {
                "configured": config.search.is_configured()
            }
        },
        "system": service_status
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats = Vec::new();
    for (endpoint, metric) in metrics.endpoint_metrics.iter() {
        endpoint_stats.push(json!({
            "endpoint": endpoint,
            "request_count": metric.request_count,
            "error_count": metric.error_count,
            "error_rate": metric.error_rate(),
            "average_duration_ms": metric.average_duration_ms(),
            "total_duration_ms": metric.total_duration_ms
        }));
    }

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            },
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "conversation": {
            "turns_processed": metrics.turns_processed,
            "searches_used": metrics.searches_used,
            "chat_failures": metrics.chat_failures,
            "active_sessions": state.sessions.session_count(),
            "stored_messages": state.sessions.message_count()
        },
        "endpoints": endpoint_stats,
        "memory": get_memory_info()
    }))
}

#[cfg(target_os = "linux")]
fn get_memory_info() -> serde_json::Value {
    let pid = std::process::id();

    let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", pid)) else {
        return memory_unavailable("Could not read /proc status");
    };

    let mut vm_rss = 0;
    let mut vm_size = 0;

    for line in status.lines() {
        if line.starts_with("VmRSS:") {
            if let Some(kb_str) = line.split_whitespace().nth(1) {
                vm_rss = kb_str.parse::<u64>().unwrap_or(0) * 1024;
            }
        } else if line.starts_with("VmSize:") {
            if let Some(kb_str) = line.split_whitespace().nth(1) {
                vm_size = kb_str.parse::<u64>().unwrap_or(0) * 1024;
            }
        }
    }

    json!({
        "pid": pid,
        "resident_memory_bytes": vm_rss,
        "virtual_memory_bytes": vm_size,
        "available": true
    })
}

#[cfg(not(target_os = "linux"))]
fn get_memory_info() -> serde_json::Value {
    memory_unavailable("Memory info not available on this platform")
}

fn memory_unavailable(note: &str) -> serde_json::Value {
    json!({
        "resident_memory_bytes": 0,
        "virtual_memory_bytes": 0,
        "available": false,
        "note": note
    })
}

/// "ready" when a clip can be processed, "degraded" when only web search is missing,
/// "unconfigured" when transcription or chat credentials are missing.
fn get_service_status(state: &AppState) -> serde_json::Value {
    let voice_ready = state.orchestrator.is_configured();
    let search_ready = state.orchestrator.search_enabled();

    let status = match (voice_ready, search_ready) {
        (true, true) => "ready",
        (true, false) => "degraded",
        (false, _) => "unconfigured",
    };

    let mut warnings = Vec::new();
    if !voice_ready {
        warnings.push("OPENAI_API_KEY is not set - /process_audio will return 500");
    }
    if !search_ready {
        warnings.push("GOOGLE_API_KEY or GOOGLE_CSE_ID is not set - web search disabled");
    }

    json!({
        "status": status,
        "voice_ready": voice_ready,
        "search_ready": search_ready,
        "warnings": warnings
    })
}
