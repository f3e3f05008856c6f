//! Schema 校验器
//!
//! validate(candidate, kind)：剥离代码围栏 → 解析 JSON → 逐字段检查并收集所有违规项 → 反序列化为强类型。
//! 纯函数；失败只是数据，由选择器决定是否回炉。

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::core::Message;
use crate::schema::{Currency, ItineraryPlan, ResearchReport, SchemaKind, ValidationOutcome};

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("fence regex is valid")
    })
}

/// 取出待解析的 JSON 文本。
///
/// 有 ``` 围栏时取围栏内容，并在其中截取第一个 `{` 到最后一个 `}`；
/// 没有围栏时原样使用（仅去掉首尾空白）。未闭合的围栏按开头标记之后的全部内容处理。
pub fn extract_json_payload(candidate: &str) -> &str {
    let trimmed = candidate.trim();
    if !trimmed.contains("```") {
        return trimmed;
    }

    let body = match fence_regex().captures(trimmed).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => {
            let start = trimmed.find("```").map(|i| i + 3).unwrap_or(0);
            let rest = &trimmed[start..];
            // 跳过语言标签所在行
            rest.find('\n').map(|i| &rest[i + 1..]).unwrap_or(rest)
        }
    };

    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body.trim(),
    }
}

/// 按指定 schema 校验；kind 为 None 时返回 Skipped。
///
/// 这里拿不到发送方；按消息校验请用 validate_message，它在 Skipped 里写明发送方名字。
pub fn validate(candidate: &str, kind: Option<SchemaKind>) -> ValidationOutcome {
    match kind {
        Some(schema) => validate_against(candidate, schema),
        None => ValidationOutcome::Skipped {
            explanation: "No schema selected for this payload.".to_string(),
        },
    }
}

/// 按消息发送方选择 schema 并校验；无对应规则的发送方返回 Skipped 并带上发送方名字
pub fn validate_message(msg: &Message) -> ValidationOutcome {
    match SchemaKind::for_speaker(msg.source()) {
        Some(schema) => validate_against(msg.content(), schema),
        None => ValidationOutcome::Skipped {
            explanation: format!("No validation rule for sender '{}'.", msg.source()),
        },
    }
}

fn validate_against(candidate: &str, schema: SchemaKind) -> ValidationOutcome {
    let payload = extract_json_payload(candidate);
    let value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            return ValidationOutcome::Failure {
                schema,
                reason: format!("- (root): the message content is not valid JSON: {e}"),
            }
        }
    };

    let mut checker = Checker::default();
    match schema {
        SchemaKind::ResearchReport => checker.research_report(&value),
        SchemaKind::ItineraryPlan => checker.itinerary_plan(&value),
    }

    if !checker.violations.is_empty() {
        return ValidationOutcome::Failure {
            schema,
            reason: checker.report(),
        };
    }

    let typed = match schema {
        SchemaKind::ResearchReport => deserialize::<ResearchReport>(value),
        SchemaKind::ItineraryPlan => deserialize::<ItineraryPlan>(value),
    };
    match typed {
        Ok(()) => ValidationOutcome::Success { schema },
        Err(e) => ValidationOutcome::Failure {
            schema,
            reason: format!("- (root): {e}"),
        },
    }
}

fn deserialize<T: DeserializeOwned>(value: Value) -> Result<(), serde_json::Error> {
    serde_json::from_value::<T>(value).map(|_| ())
}

/// 解析并校验研究报告，成功时返回强类型值
pub fn parse_research_report(candidate: &str) -> Result<ResearchReport, ValidationOutcome> {
    parse_typed(candidate, SchemaKind::ResearchReport)
}

/// 解析并校验行程计划，成功时返回强类型值
pub fn parse_itinerary_plan(candidate: &str) -> Result<ItineraryPlan, ValidationOutcome> {
    parse_typed(candidate, SchemaKind::ItineraryPlan)
}

fn parse_typed<T: DeserializeOwned>(candidate: &str, schema: SchemaKind) -> Result<T, ValidationOutcome> {
    let outcome = validate_against(candidate, schema);
    if !outcome.is_success() {
        return Err(outcome);
    }
    serde_json::from_str(extract_json_payload(candidate)).map_err(|e| ValidationOutcome::Failure {
        schema,
        reason: format!("- (root): {e}"),
    })
}

/// 违规收集器：每个字段独立检查，不在第一处错误处停止
#[derive(Debug, Default)]
struct Checker {
    violations: Vec<String>,
}

impl Checker {
    fn push(&mut self, path: &str, msg: impl AsRef<str>) {
        self.violations.push(format!("- {path}: {}", msg.as_ref()));
    }

    fn report(&self) -> String {
        self.violations.join("\n")
    }

    fn research_report(&mut self, root: &Value) {
        let Some(obj) = self.object(root, "(root)") else {
            return;
        };
        self.currency(obj);

        if let Some(findings) = self.array_field(obj, "findings", "findings") {
            for (i, finding) in findings.iter().enumerate() {
                self.finding(finding, &format!("findings[{i}]"));
            }
        }
        self.string_list_field(obj, "risks", "risks");
        self.string_list_field(obj, "verification", "verification");
    }

    fn finding(&mut self, value: &Value, path: &str) {
        let Some(obj) = self.object(value, path) else {
            return;
        };
        self.string_field(obj, "topic", &format!("{path}.topic"));

        let bullets_path = format!("{path}.bullets");
        if let Some(bullets) = self.string_list_field(obj, "bullets", &bullets_path) {
            if bullets.is_empty() {
                self.push(&bullets_path, "must contain at least one entry");
            }
        }

        let sources_path = format!("{path}.sources");
        if let Some(sources) = self.array_field(obj, "sources", &sources_path) {
            for (i, source) in sources.iter().enumerate() {
                let source_path = format!("{sources_path}[{i}]");
                let Some(src) = self.object(source, &source_path) else {
                    continue;
                };
                self.string_field(src, "name", &format!("{source_path}.name"));
                let url_path = format!("{source_path}.url");
                if let Some(url) = self.string_field(src, "url", &url_path) {
                    if url.trim().is_empty() {
                        self.push(&url_path, "must not be empty");
                    }
                }
            }
        }

        let conf_path = format!("{path}.confidence");
        match obj.get("confidence") {
            None => self.push(&conf_path, "missing required field"),
            Some(v) => match v.as_f64() {
                Some(c) if (0.0..=1.0).contains(&c) => {}
                Some(c) => self.push(&conf_path, format!("must be between 0.0 and 1.0, found {c}")),
                None => self.push(&conf_path, format!("expected a number, found {}", type_name(v))),
            },
        }
    }

    fn itinerary_plan(&mut self, root: &Value) {
        let Some(obj) = self.object(root, "(root)") else {
            return;
        };
        self.currency(obj);
        self.string_field(obj, "overview", "overview");

        if let Some(days) = self.array_field(obj, "days", "days") {
            if days.is_empty() {
                self.push("days", "must contain at least one entry");
            }
            for (i, day) in days.iter().enumerate() {
                self.day(day, &format!("days[{i}]"));
            }
        }
        self.non_negative_int(obj, "total_est_cost_toman", "total_est_cost_toman");
    }

    fn day(&mut self, value: &Value, path: &str) {
        let Some(obj) = self.object(value, path) else {
            return;
        };
        // 日期只检查存在且为文本
        self.string_field(obj, "date", &format!("{path}.date"));
        self.string_field(obj, "summary", &format!("{path}.summary"));
        for slot in ["morning", "afternoon", "evening"] {
            self.string_list_field(obj, slot, &format!("{path}.{slot}"));
        }
        self.non_negative_int(obj, "est_cost_toman", &format!("{path}.est_cost_toman"));
    }

    fn currency(&mut self, obj: &Map<String, Value>) {
        match obj.get("currency") {
            None => {}
            Some(Value::String(s)) if s == Currency::LABEL => {}
            Some(other) => self.push(
                "currency",
                format!("expected \"{}\", found {other}", Currency::LABEL),
            ),
        }
    }

    fn object<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v Map<String, Value>> {
        match value.as_object() {
            Some(obj) => Some(obj),
            None => {
                self.push(path, format!("expected an object, found {}", type_name(value)));
                None
            }
        }
    }

    fn string_field<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Option<&'v str> {
        match obj.get(key) {
            None => {
                self.push(path, "missing required field");
                None
            }
            Some(Value::String(s)) => Some(s.as_str()),
            Some(other) => {
                self.push(path, format!("expected a string, found {}", type_name(other)));
                None
            }
        }
    }

    fn array_field<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Option<&'v Vec<Value>> {
        match obj.get(key) {
            None => {
                self.push(path, "missing required field");
                None
            }
            Some(Value::Array(items)) => Some(items),
            Some(other) => {
                self.push(path, format!("expected an array, found {}", type_name(other)));
                None
            }
        }
    }

    fn string_list_field<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Option<&'v Vec<Value>> {
        let items = self.array_field(obj, key, path)?;
        for (i, item) in items.iter().enumerate() {
            if !item.is_string() {
                self.push(
                    &format!("{path}[{i}]"),
                    format!("expected a string, found {}", type_name(item)),
                );
            }
        }
        Some(items)
    }

    fn non_negative_int(&mut self, obj: &Map<String, Value>, key: &str, path: &str) {
        match obj.get(key) {
            None => self.push(path, "missing required field"),
            Some(v) if v.as_u64().is_some() => {}
            Some(v) if v.as_i64().is_some() => {
                self.push(path, format!("must be a non-negative integer, found {v}"))
            }
            Some(v) => self.push(path, format!("expected an integer, found {}", type_name(v))),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
