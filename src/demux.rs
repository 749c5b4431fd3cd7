//! `EventDemuxer`: routes raw events to a lazily created per-source-type
//! `EventProcessor`, or to the raw side-sink if no parser or translator is
//! registered for the source type.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::Result;
use crate::event::{Event, SOURCE_TYPE_FIELD};
use crate::fuzzy::FuzzyMap;
use crate::parser::Parser;
use crate::processor::EventProcessor;
use crate::queue::BoundedQueue;
use crate::rules::TranslatorsManager;
use crate::worker::{Transform, Worker};

/// Routes events by `sourceType`. Holds two fuzzy registries
/// (`parsers`, `translators`) and a lazy `sourceType -> BoundedQueue` cache;
/// the first event for a given literal source type spawns a dedicated
/// `EventProcessor` worker bound to a freshly created queue.
pub struct EventDemuxer {
    parsers: FuzzyMap<Arc<dyn Parser>>,
    translators: FuzzyMap<Arc<TranslatorsManager>>,
    translated_sink: BoundedQueue<Event>,
    raw_sink: BoundedQueue<Event>,
    queue_capacity: usize,
    queues: Mutex<HashMap<String, BoundedQueue<Event>>>,
    warned: Mutex<HashSet<String>>,
}

impl EventDemuxer {
    pub fn new(
        parsers: FuzzyMap<Arc<dyn Parser>>,
        translators: FuzzyMap<Arc<TranslatorsManager>>,
        translated_sink: BoundedQueue<Event>,
        raw_sink: BoundedQueue<Event>,
        queue_capacity: usize,
    ) -> Self {
        EventDemuxer {
            parsers,
            translators,
            translated_sink,
            raw_sink,
            queue_capacity,
            queues: Mutex::new(HashMap::new()),
            warned: Mutex::new(HashSet::new()),
        }
    }

    /// Returns the existing queue for `source_type`, or spawns a new
    /// `EventProcessor` worker and caches its queue. Returns `None` if no
    /// parser or translator is registered, in which case the caller must
    /// fall back to the raw sink.
    async fn queue_for(&self, source_type: &str) -> Option<BoundedQueue<Event>> {
        {
            let queues = self.queues.lock().await;
            if let Some(queue) = queues.get(source_type) {
                return Some(queue.clone());
            }
        }

        let Some((_, parser)) = self.parsers.get(source_type) else {
            self.warn_once(source_type, "no parser registered").await;
            return None;
        };
        let Some((_, translators)) = self.translators.get(source_type) else {
            self.warn_once(source_type, "no translator registered").await;
            return None;
        };

        let mut queues = self.queues.lock().await;
        if let Some(queue) = queues.get(source_type) {
            return Some(queue.clone());
        }

        let queue: BoundedQueue<Event> = BoundedQueue::new(self.queue_capacity);
        let processor = EventProcessor::new(
            source_type.to_string(),
            parser.clone(),
            translators.clone(),
            self.raw_sink.clone(),
        );
        let worker = Worker::new(
            format!("processor:{source_type}"),
            queue.clone(),
            Some(self.translated_sink.clone()),
            Arc::new(processor) as Arc<dyn Transform<()>>,
        );
        worker.spawn();

        queues.insert(source_type.to_string(), queue.clone());
        Some(queue)
    }

    async fn warn_once(&self, source_type: &str, reason: &str) {
        let mut warned = self.warned.lock().await;
        if warned.insert(source_type.to_string()) {
            warn!(source_type, reason, "routing event to raw sink");
        }
    }
}

#[async_trait]
impl Transform<()> for EventDemuxer {
    async fn process(&self, event: Event) -> Result<Option<Event>> {
        let Some(source_type) = event.source_type().map(str::to_string) else {
            return Ok(Some(event));
        };

        let Some(queue) = self.queue_for(&source_type).await else {
            return Ok(Some(event));
        };

        if queue.put(event).await.is_err() {
            warn!(source_type = %source_type, "per-source queue cancelled, dropping event");
        }
        Ok(None)
    }

    /// Puts EOS on every per-source queue exactly once, guaranteeing every
    /// spawned `EventProcessor` drains and terminates.
    async fn terminated(&self) {
        let queues = self.queues.lock().await;
        for (source_type, queue) in queues.iter() {
            if queue.put(Event::Eos).await.is_err() {
                warn!(source_type = %source_type, "per-source queue already cancelled, skipping EOS");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    struct IdentityParser;
    impl Parser for IdentityParser {
        fn parse(&self, text: &str) -> Result<Value> {
            Ok(json!({ "msg": text }))
        }
    }

    fn move_msg_translators() -> TranslatorsManager {
        let mut manager = TranslatorsManager::new();
        manager.push(crate::rules::Translator::compile(&json!({"rules": [{"msg": {"@move": "msg"}}]})).unwrap());
        manager
    }

    fn demuxer_with_source(source_type: &str, translated: BoundedQueue<Event>, raw: BoundedQueue<Event>) -> EventDemuxer {
        let mut parsers: FuzzyMap<Arc<dyn Parser>> = FuzzyMap::new(':');
        parsers.insert(source_type, Arc::new(IdentityParser) as Arc<dyn Parser>);
        let mut translators: FuzzyMap<Arc<TranslatorsManager>> = FuzzyMap::new(':');
        translators.insert(source_type, Arc::new(move_msg_translators()));
        EventDemuxer::new(parsers, translators, translated, raw, 0)
    }

    #[tokio::test]
    async fn missing_source_type_goes_to_raw_sink() {
        let translated: BoundedQueue<Event> = BoundedQueue::new(0);
        let raw: BoundedQueue<Event> = BoundedQueue::new(0);
        let demux = demuxer_with_source("syslog", translated, raw);
        let event = Event::new(json!({"rawEvent": "hi"}));
        let result = demux.process(event).await.unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn unregistered_source_type_goes_to_raw_sink() {
        let translated: BoundedQueue<Event> = BoundedQueue::new(0);
        let raw: BoundedQueue<Event> = BoundedQueue::new(0);
        let demux = demuxer_with_source("syslog", translated, raw);
        let event = crate::event::raw_event("hi", "unknown", "acme");
        let result = demux.process(event).await.unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn routes_and_fans_out_eos_per_source() {
        let translated: BoundedQueue<Event> = BoundedQueue::new(0);
        let raw: BoundedQueue<Event> = BoundedQueue::new(0);
        let demux = Arc::new(demuxer_with_source("syslog", translated.clone(), raw));

        let input: BoundedQueue<Event> = BoundedQueue::new(0);
        input.put(crate::event::raw_event("hello", "syslog:1", "acme")).await.unwrap();
        input.put(Event::Eos).await.unwrap();

        let worker = Worker::new("demux", input, None, demux.clone() as Arc<dyn Transform<()>>);
        worker.run().await;

        // Give the spawned per-source worker a chance to drain.
        for _ in 0..50 {
            if translated.available().await >= 2 {
                break;
            }
            tokio::task::yield_now().await;
        }

        let first = translated.take().await.unwrap();
        assert_eq!(first.tree().unwrap()["msg"], json!("hello"));
        assert_eq!(first.tree().unwrap()["unmapped"]["sourceType"], json!("syslog:1"));
        assert!(translated.take().await.unwrap().is_eos());
    }

    #[tokio::test]
    async fn fuzzy_source_type_match_shares_one_registration() {
        let translated: BoundedQueue<Event> = BoundedQueue::new(0);
        let raw: BoundedQueue<Event> = BoundedQueue::new(0);
        let demux = demuxer_with_source("syslog", translated, raw);
        let event = crate::event::raw_event("hi", "syslog:firewall:1", "acme");
        let result = demux.process(event).await.unwrap();
        assert!(result.is_none());
    }
}
