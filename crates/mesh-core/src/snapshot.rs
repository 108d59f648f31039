//! Agent 遥测快照数据模型
//!
//! 实时订阅与 KV 快照共享同一 JSON 结构。解码是逐字段宽松的：
//! 类型不符的字段视为缺失，而不是让整条记录失败。只有“载荷不是
//! JSON 对象”或“无法确定 Agent 标识”才算解码失败。

use crate::constants::UNKNOWN_LABEL_VALUE;
use crate::core_types::AgentId;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

type Object = Map<String, Value>;

/// 单个 Agent 在某一时刻的完整遥测状态
///
/// 快照创建后不可变；状态表中对同一 Agent 的更新总是整体替换。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "Value")]
pub struct AgentTelemetrySnapshot {
    #[serde(rename = "agent")]
    pub agent_id: AgentId,
    /// 事件时间（秒），仅用作合并时的排序键
    #[serde(rename = "ts", skip_serializing_if = "Option::is_none")]
    pub event_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "model", skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<SessionCounts>,
    /// 旧版扁平字段，等价于 `sessions.total`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_count: Option<f64>,
    /// 旧版扁平字段，等价于 `sessions.active`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_count: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_agents: Option<SubAgentCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<MessageCounters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenCounters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<ResourceUsage>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SessionCounts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SubAgentCounts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MessageCounters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCounters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_input: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_output: Option<f64>,
    #[serde(rename = "last24hInput", skip_serializing_if = "Option::is_none")]
    pub last_24h_input: Option<f64>,
    #[serde(rename = "last24hOutput", skip_serializing_if = "Option::is_none")]
    pub last_24h_output: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,
    #[serde(rename = "memoryMB", skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_percent: Option<f64>,
}

impl AgentTelemetrySnapshot {
    pub fn new(agent_id: impl Into<AgentId>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, ts: i64) -> Self {
        self.event_timestamp = Some(ts);
        self
    }

    /// 解码文本载荷；记录自身没有 `agent` 字段时使用 `fallback_identity`
    /// （subject 末段或 KV key）。
    pub fn decode(payload: &[u8], fallback_identity: &str) -> Result<Self> {
        let text = std::str::from_utf8(payload)?;
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value, Some(fallback_identity))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CoreError::internal(e.to_string()))
    }

    /// 标签用版本号，缺失或为空时为 "unknown"
    pub fn version_label(&self) -> &str {
        label_or_unknown(self.version.as_deref())
    }

    /// 标签用模型名，缺失或为空时为 "unknown"
    pub fn model_label(&self) -> &str {
        label_or_unknown(self.model_name.as_deref())
    }

    fn from_value(value: Value, fallback_identity: Option<&str>) -> Result<Self> {
        let obj = match value {
            Value::Object(obj) => obj,
            other => {
                return Err(CoreError::decode(format!(
                    "telemetry payload must be a JSON object, got {}",
                    json_kind(&other)
                )));
            }
        };

        let agent_id = text(&obj, "agent")
            .filter(|s| !s.is_empty())
            .or_else(|| {
                fallback_identity
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
            .map(AgentId::new)
            .ok_or_else(|| CoreError::decode("telemetry record has no agent identity"))?;

        Ok(Self {
            agent_id,
            event_timestamp: timestamp(&obj, "ts"),
            version: text(&obj, "version"),
            model_name: text(&obj, "model"),
            sessions: object(&obj, "sessions").map(|o| SessionCounts {
                total: number(o, "total"),
                active: number(o, "active"),
            }),
            session_count: number(&obj, "sessionCount"),
            active_count: number(&obj, "activeCount"),
            uptime: number(&obj, "uptime"),
            sub_agents: object(&obj, "subAgents").map(|o| SubAgentCounts {
                running: number(o, "running"),
                completed: number(o, "completed"),
            }),
            messages: object(&obj, "messages").map(|o| MessageCounters {
                sent: number(o, "sent"),
                received: number(o, "received"),
                errors: number(o, "errors"),
            }),
            tokens: object(&obj, "tokens").map(|o| TokenCounters {
                total_input: number(o, "totalInput"),
                total_output: number(o, "totalOutput"),
                last_24h_input: number(o, "last24hInput"),
                last_24h_output: number(o, "last24hOutput"),
            }),
            system: object(&obj, "system").map(|o| ResourceUsage {
                cpu_percent: number(o, "cpuPercent"),
                memory_mb: number(o, "memoryMB"),
                memory_percent: number(o, "memoryPercent"),
            }),
        })
    }
}

impl TryFrom<Value> for AgentTelemetrySnapshot {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value, None)
    }
}

fn label_or_unknown(value: Option<&str>) -> &str {
    value.filter(|s| !s.is_empty()).unwrap_or(UNKNOWN_LABEL_VALUE)
}

fn number(obj: &Object, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64)
}

fn text(obj: &Object, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn object<'a>(obj: &'a Object, key: &str) -> Option<&'a Object> {
    obj.get(key).and_then(Value::as_object)
}

// 整数原样接收；浮点向零截断
fn timestamp(obj: &Object, key: &str) -> Option<i64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
