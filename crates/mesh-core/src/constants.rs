// 实时遥测主题：mesh.telemetry.<agentId>
pub const TELEMETRY_SUBJECT_WILDCARD: &str = "mesh.telemetry.*";

// 快照 KV bucket（key 即 agentId）
pub const JS_KV_MESH_TELEMETRY: &str = "MESH-TELEMETRY";

// VictoriaMetrics Prometheus 文本导入端点
pub const VM_IMPORT_PROMETHEUS_PATH: &str = "/api/v1/import/prometheus";

/// 缺省的版本/模型标签值
pub const UNKNOWN_LABEL_VALUE: &str = "unknown";

// 指标名称
pub const METRIC_SESSIONS_TOTAL: &str = "mesh_agent_sessions_total";
pub const METRIC_SESSIONS_ACTIVE: &str = "mesh_agent_sessions_active";
pub const METRIC_UPTIME_SECONDS: &str = "mesh_agent_uptime_seconds";
pub const METRIC_SUBAGENTS_RUNNING: &str = "mesh_agent_subagents_running";
pub const METRIC_SUBAGENTS_COMPLETED: &str = "mesh_agent_subagents_completed";
pub const METRIC_MESSAGES_SENT_TOTAL: &str = "mesh_agent_messages_sent_total";
pub const METRIC_MESSAGES_RECEIVED_TOTAL: &str = "mesh_agent_messages_received_total";
pub const METRIC_ERRORS_TOTAL: &str = "mesh_agent_errors_total";
pub const METRIC_TOKENS_INPUT_TOTAL: &str = "mesh_agent_tokens_input_total";
pub const METRIC_TOKENS_OUTPUT_TOTAL: &str = "mesh_agent_tokens_output_total";
pub const METRIC_TOKENS_24H_INPUT: &str = "mesh_agent_tokens_24h_input";
pub const METRIC_TOKENS_24H_OUTPUT: &str = "mesh_agent_tokens_24h_output";
pub const METRIC_CPU_PERCENT: &str = "mesh_agent_cpu_percent";
pub const METRIC_MEMORY_MB: &str = "mesh_agent_memory_mb";
pub const METRIC_MEMORY_PERCENT: &str = "mesh_agent_memory_percent";
pub const METRIC_UP: &str = "mesh_agent_up";

/// 取 subject（或 KV key）按 `.` 分隔的最后一段
pub fn trailing_segment(subject: &str) -> &str {
    subject.rsplit('.').next().unwrap_or(subject)
}
