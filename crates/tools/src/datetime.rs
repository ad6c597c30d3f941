//! Datetime tool: the current local time at a fixed UTC offset.

use crate::envelope::{ResponseFormat, ToolEnvelope, call_signature};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, SecondsFormat, Utc};
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolArguments, ToolResult};

pub struct DateTimeTool {
    offset: FixedOffset,
}

impl DateTimeTool {
    /// Out-of-range offsets fall back to UTC.
    pub fn new(utc_offset_hours: i32) -> Self {
        let offset = utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .unwrap_or(Utc.fix());
        Self { offset }
    }

    fn render(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.offset)
            .to_rfc3339_opts(SecondsFormat::Secs, false)
    }
}

#[async_trait]
impl Tool for DateTimeTool {
    fn name(&self) -> &str {
        "datetime"
    }

    fn description(&self) -> &str {
        "Get the current local date and time in RFC 3339 format."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, arguments: ToolArguments) -> Result<ToolResult, ToolError> {
        let call = call_signature(self.name(), &arguments);
        let now = self.render(Utc::now());
        Ok(ToolEnvelope::ok(call, ResponseFormat::Text, now).into_result(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn renders_with_offset() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 20, 30, 0).unwrap();
        assert_eq!(DateTimeTool::new(8).render(instant), "2024-03-02T04:30:00+08:00");
        assert_eq!(DateTimeTool::new(0).render(instant), "2024-03-01T20:30:00+00:00");
        assert_eq!(DateTimeTool::new(-5).render(instant), "2024-03-01T15:30:00-05:00");
    }

    #[test]
    fn invalid_offset_falls_back_to_utc() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 20, 30, 0).unwrap();
        assert!(DateTimeTool::new(48).render(instant).ends_with("+00:00"));
    }

    #[tokio::test]
    async fn wraps_result_in_envelope() {
        let result = DateTimeTool::new(8).execute(ToolArguments::new()).await.unwrap();
        let envelope: ToolEnvelope = serde_json::from_str(&result.content).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.format, ResponseFormat::Text);
        assert_eq!(envelope.call, "datetime()");
        let stamp = envelope.data.unwrap();
        assert!(DateTime::parse_from_rfc3339(stamp.as_str().unwrap()).is_ok());
    }
}
