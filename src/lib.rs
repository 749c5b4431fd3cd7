//! Streaming event-normalization core: source-type demultiplexing, a
//! JSON rule-driven translation engine, and schema-driven enrichment for
//! security telemetry.
//!
//! Pipeline stages are cooperating workers (`worker::Worker`) connected by
//! `queue::BoundedQueue`s: a raw `Source` feeds an `demux::EventDemuxer`,
//! which fans out to one `processor::EventProcessor` per source type, each
//! driving its own `rules::Translator` chain. Schema enrichment
//! (`schema::enrich`) is a separate, stateless step callers apply to the
//! translated output.

pub mod coercion;
pub mod config;
pub mod demux;
pub mod error;
pub mod event;
pub mod fuzzy;
pub mod parser;
pub mod path;
pub mod processor;
pub mod queue;
pub mod rules;
pub mod schema;
pub mod when;
pub mod worker;

pub use config::Options;
pub use demux::EventDemuxer;
pub use error::{PipelineError, Result};
pub use event::Event;
pub use fuzzy::FuzzyMap;
pub use processor::EventProcessor;
pub use queue::BoundedQueue;
pub use rules::{Translator, TranslatorsManager};
pub use schema::SchemaCatalog;
pub use worker::{Transform, Worker};
