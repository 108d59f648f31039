//! 快照 → Prometheus 文本格式
//!
//! 每个存在的度量一行：`name{agent="..",version="..",model=".."} value timestamp_ms`，
//! 末尾固定追加一行 `mesh_agent_up ... 1`。缺失的度量组不产生任何行；组内字段逐个判断。
//! 旧版扁平字段与嵌套字段映射到同一指标名，同时存在时两行都输出，不做去重。

use chrono::{DateTime, Utc};
use mesh_core::constants::*;
use mesh_core::types::AgentTelemetrySnapshot;
use std::fmt::Write;

/// 编码单个快照；快照缺少事件时间时使用 `now`
pub fn encode_snapshot(snapshot: &AgentTelemetrySnapshot, now: DateTime<Utc>) -> String {
    let timestamp_ms = snapshot
        .event_timestamp
        .map(|ts| ts.saturating_mul(1000))
        .unwrap_or_else(|| now.timestamp_millis());

    let mut out = ExpositionWriter::new(snapshot, timestamp_ms);

    if let Some(sessions) = &snapshot.sessions {
        out.sample(METRIC_SESSIONS_TOTAL, sessions.total);
        out.sample(METRIC_SESSIONS_ACTIVE, sessions.active);
    }
    out.sample(METRIC_SESSIONS_TOTAL, snapshot.session_count);
    out.sample(METRIC_SESSIONS_ACTIVE, snapshot.active_count);

    out.sample(METRIC_UPTIME_SECONDS, snapshot.uptime);

    if let Some(sub_agents) = &snapshot.sub_agents {
        out.sample(METRIC_SUBAGENTS_RUNNING, sub_agents.running);
        out.sample(METRIC_SUBAGENTS_COMPLETED, sub_agents.completed);
    }

    if let Some(messages) = &snapshot.messages {
        out.sample(METRIC_MESSAGES_SENT_TOTAL, messages.sent);
        out.sample(METRIC_MESSAGES_RECEIVED_TOTAL, messages.received);
        out.sample(METRIC_ERRORS_TOTAL, messages.errors);
    }

    if let Some(tokens) = &snapshot.tokens {
        out.sample(METRIC_TOKENS_INPUT_TOTAL, tokens.total_input);
        out.sample(METRIC_TOKENS_OUTPUT_TOTAL, tokens.total_output);
        out.sample(METRIC_TOKENS_24H_INPUT, tokens.last_24h_input);
        out.sample(METRIC_TOKENS_24H_OUTPUT, tokens.last_24h_output);
    }

    if let Some(system) = &snapshot.system {
        out.sample(METRIC_CPU_PERCENT, system.cpu_percent);
        out.sample(METRIC_MEMORY_MB, system.memory_mb);
        out.sample(METRIC_MEMORY_PERCENT, system.memory_percent);
    }

    out.sample(METRIC_UP, Some(1.0));
    out.finish()
}

/// 转义标签值：`\`、`"` 与换行
pub fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

struct ExpositionWriter {
    labels: String,
    timestamp_ms: i64,
    buf: String,
}

impl ExpositionWriter {
    fn new(snapshot: &AgentTelemetrySnapshot, timestamp_ms: i64) -> Self {
        let labels = format!(
            "agent=\"{}\",version=\"{}\",model=\"{}\"",
            escape_label_value(snapshot.agent_id.as_str()),
            escape_label_value(snapshot.version_label()),
            escape_label_value(snapshot.model_label()),
        );
        Self {
            labels,
            timestamp_ms,
            buf: String::new(),
        }
    }

    fn sample(&mut self, name: &str, value: Option<f64>) {
        if let Some(value) = value {
            // 写入 String 不会失败
            let _ = writeln!(
                self.buf,
                "{}{{{}}} {} {}",
                name, self.labels, value, self.timestamp_ms
            );
        }
    }

    fn finish(self) -> String {
        self.buf
    }
}
