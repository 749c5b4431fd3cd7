//! `EventProcessor`: parse → translate → passthrough-copy → emit, bound to a
//! single source type.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::event::{Event, RAW_EVENT_FIELD, SOURCE_TYPE_FIELD, TENANT_FIELD, UNMAPPED_FIELD};
use crate::parser::Parser;
use crate::path;
use crate::queue::BoundedQueue;
use crate::rules::TranslatorsManager;
use crate::worker::Transform;

/// Bound to a single `(parser, translators, source-queue, output-sink)`
/// quartet. The `raw_sink` handle lets a translate-miss forward the
/// pre-translate event to the same side-channel the demuxer writes
/// unrouteable events to — a translate miss is only detectable here, deep
/// inside the per-source pipeline, so this processor is constructed with
/// both the translated output (wired through `Worker`) and a raw-sink
/// handle for that one failure path.
pub struct EventProcessor {
    source_type: String,
    parser: Arc<dyn Parser>,
    translators: Arc<TranslatorsManager>,
    raw_sink: BoundedQueue<Event>,
}

impl EventProcessor {
    pub fn new(
        source_type: impl Into<String>,
        parser: Arc<dyn Parser>,
        translators: Arc<TranslatorsManager>,
        raw_sink: BoundedQueue<Event>,
    ) -> Self {
        EventProcessor { source_type: source_type.into(), parser, translators, raw_sink }
    }
}

#[async_trait]
impl Transform<()> for EventProcessor {
    async fn process(&self, event: Event) -> Result<Option<Event>> {
        let Some(text) = event.raw_event().map(str::to_string) else {
            return Ok(None);
        };

        let parsed = match self.parser.parse(&text) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(source_type = %self.source_type, error = %err, "parse failure, dropping event");
                return Ok(None);
            }
        };

        let Some((mut translated, consumed)) = self.translators.translate(&parsed) else {
            warn!(source_type = %self.source_type, "no translator matched, forwarding to raw sink");
            if self.raw_sink.put(event).await.is_err() {
                warn!(source_type = %self.source_type, "raw sink cancelled while forwarding translate miss");
            }
            return Ok(None);
        };

        if let Some(source_type) = event.source_type() {
            path::set(&mut translated, &unmapped_path(SOURCE_TYPE_FIELD), serde_json::Value::String(source_type.to_string()));
        }
        if let Some(tenant) = event.get_str(TENANT_FIELD) {
            path::set(&mut translated, &unmapped_path(TENANT_FIELD), serde_json::Value::String(tenant.to_string()));
        }
        path::set(&mut translated, &unmapped_path(RAW_EVENT_FIELD), serde_json::Value::String(text));
        if let Some(obj) = parsed.as_object() {
            for (key, value) in obj {
                if !consumed.contains(key) {
                    path::set(&mut translated, &unmapped_path(key), value.clone());
                }
            }
        }

        Ok(Some(Event::new(translated)))
    }
}

fn unmapped_path(field: &str) -> String {
    format!("{UNMAPPED_FIELD}.{field}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    struct DigitParser;
    impl Parser for DigitParser {
        fn parse(&self, text: &str) -> Result<Value> {
            let n: i64 = text.parse().map_err(|_| crate::error::PipelineError::parse("not a digit"))?;
            Ok(json!({ "id": n }))
        }
    }

    fn move_id_translator() -> TranslatorsManager {
        let mut manager = TranslatorsManager::new();
        manager.push(crate::rules::Translator::compile(&json!({"rules": [{"id": {"@move": "id"}}]})).unwrap());
        manager
    }

    #[tokio::test]
    async fn successful_translate_tags_unmapped_passthrough() {
        let raw_sink: BoundedQueue<Event> = BoundedQueue::new(0);
        let processor = EventProcessor::new(
            "test",
            Arc::new(DigitParser),
            Arc::new(move_id_translator()),
            raw_sink.clone(),
        );
        let event = crate::event::raw_event("3", "test", "acme");
        let out = processor.process(event).await.unwrap().expect("should emit");
        let tree = out.tree().unwrap();
        assert_eq!(tree["id"], json!(3));
        assert_eq!(tree["unmapped"]["sourceType"], json!("test"));
        assert_eq!(tree["unmapped"]["tenant"], json!("acme"));
        assert_eq!(tree["unmapped"]["rawEvent"], json!("3"));
        assert_eq!(raw_sink.available().await, 0);
    }

    #[tokio::test]
    async fn parse_failure_drops_event() {
        let raw_sink: BoundedQueue<Event> = BoundedQueue::new(0);
        let processor = EventProcessor::new("test", Arc::new(DigitParser), Arc::new(move_id_translator()), raw_sink.clone());
        let event = crate::event::raw_event("not-a-number", "test", "acme");
        assert!(processor.process(event).await.unwrap().is_none());
        assert_eq!(raw_sink.available().await, 0);
    }

    #[tokio::test]
    async fn translate_miss_forwards_to_raw_sink() {
        let raw_sink: BoundedQueue<Event> = BoundedQueue::new(0);
        let mut manager = TranslatorsManager::new();
        manager.push(
            crate::rules::Translator::compile(&json!({"when": "id = 'never'", "rules": [{"id": {"@move": "id"}}]}))
                .unwrap(),
        );
        let processor = EventProcessor::new("test", Arc::new(DigitParser), Arc::new(manager), raw_sink.clone());
        let event = crate::event::raw_event("3", "test", "acme");
        assert!(processor.process(event).await.unwrap().is_none());
        assert_eq!(raw_sink.available().await, 1);
        let forwarded = raw_sink.take().await.unwrap();
        assert_eq!(forwarded.raw_event(), Some("3"));
    }

    #[tokio::test]
    async fn missing_raw_event_drops_silently() {
        let raw_sink: BoundedQueue<Event> = BoundedQueue::new(0);
        let processor = EventProcessor::new("test", Arc::new(DigitParser), Arc::new(move_id_translator()), raw_sink.clone());
        let event = Event::new(json!({"sourceType": "test"}));
        assert!(processor.process(event).await.unwrap().is_none());
    }
}
