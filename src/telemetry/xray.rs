//! AWS X-Ray trace header propagation and ID generation
//!
//! # Header format
//!
//! ```text
//! X-Amzn-Trace-Id: Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8;Sampled=1
//! ```
//!
//! - `Root`: version `1`, 8 hex digits of Unix epoch seconds, 24 hex digits unique ID.
//!   Together the last two make up the 128-bit OpenTelemetry trace ID.
//! - `Parent`: 64-bit parent span ID as 16 hex digits
//! - `Sampled`: `1`, `0`, or `?` (decision deferred, treated as not sampled)
//!
//! Any other `key=value` pair (e.g. `Lineage`) is carried through as trace state.
//!
//! # ID generation
//!
//! X-Ray rejects trace IDs whose first 32 bits are not a recent timestamp, so
//! [`XrayIdGenerator`] replaces the high 4 bytes of a random trace ID with the
//! current epoch seconds.

use lazy_static::lazy_static;
use opentelemetry::propagation::text_map_propagator::FieldIter;
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::{
    SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
};
use opentelemetry::Context;
use opentelemetry_sdk::trace::{IdGenerator, RandomIdGenerator};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// X-Ray trace header name (lowercase, as normalized by HTTP header maps)
pub const XRAY_HEADER: &str = "x-amzn-trace-id";

const ROOT_KEY: &str = "Root";
const PARENT_KEY: &str = "Parent";
const SAMPLED_KEY: &str = "Sampled";
const TRACE_ID_VERSION: &str = "1";
const EPOCH_HEX_LEN: usize = 8;
const UNIQUE_HEX_LEN: usize = 24;

lazy_static! {
    static ref XRAY_FIELDS: [String; 1] = [XRAY_HEADER.to_string()];
}

/// Errors parsing an `X-Amzn-Trace-Id` header
#[derive(Error, Debug, Clone, PartialEq)]
pub enum XrayHeaderError {
    #[error("Missing Root in X-Ray trace header")]
    MissingRoot,

    #[error("Missing Parent in X-Ray trace header")]
    MissingParent,

    #[error("Invalid X-Ray trace ID: {0}")]
    InvalidTraceId(String),

    #[error("Invalid X-Ray parent ID: {0}")]
    InvalidParentId(String),

    #[error("Invalid X-Ray sampling decision: {0}")]
    InvalidSampled(String),

    #[error("Malformed X-Ray header entry: {0}")]
    Malformed(String),
}

/// Parsed `X-Amzn-Trace-Id` header
#[derive(Debug, Clone, PartialEq)]
pub struct XrayTraceHeader {
    pub trace_id: TraceId,
    pub parent_id: SpanId,
    /// `None` when the sampling decision is deferred (`Sampled=?` or absent)
    pub sampled: Option<bool>,
    /// Additional entries, keys lowercased
    pub extra: Vec<(String, String)>,
}

impl XrayTraceHeader {
    /// Build a header from a valid span context
    pub fn from_span_context(span_context: &SpanContext) -> Option<Self> {
        if !span_context.is_valid() {
            return None;
        }

        let extra = span_context
            .trace_state()
            .header()
            .split(',')
            .filter_map(|entry| entry.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Some(Self {
            trace_id: span_context.trace_id(),
            parent_id: span_context.span_id(),
            sampled: Some(span_context.is_sampled()),
            extra,
        })
    }

    /// Convert into a remote span context
    pub fn to_span_context(&self) -> SpanContext {
        let flags = if self.sampled == Some(true) {
            TraceFlags::SAMPLED
        } else {
            TraceFlags::default()
        };
        let trace_state =
            TraceState::from_key_value(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .unwrap_or_default();

        SpanContext::new(self.trace_id, self.parent_id, flags, true, trace_state)
    }
}

impl fmt::Display for XrayTraceHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let trace_id = format!("{:032x}", self.trace_id);
        let (epoch, unique) = trace_id.split_at(EPOCH_HEX_LEN);
        write!(
            f,
            "{}=1-{}-{};{}={:016x}",
            ROOT_KEY, epoch, unique, PARENT_KEY, self.parent_id
        )?;
        match self.sampled {
            Some(true) => write!(f, ";{}=1", SAMPLED_KEY)?,
            Some(false) => write!(f, ";{}=0", SAMPLED_KEY)?,
            None => write!(f, ";{}=?", SAMPLED_KEY)?,
        }
        for (key, value) in &self.extra {
            write!(f, ";{}={}", key, value)?;
        }
        Ok(())
    }
}

impl FromStr for XrayTraceHeader {
    type Err = XrayHeaderError;

    fn from_str(header: &str) -> Result<Self, Self::Err> {
        let mut trace_id = None;
        let mut parent_id = None;
        let mut sampled = None;
        let mut extra = Vec::new();

        for entry in header.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| XrayHeaderError::Malformed(entry.to_string()))?;
            match key {
                ROOT_KEY => trace_id = Some(parse_root(value)?),
                PARENT_KEY => parent_id = Some(parse_parent(value)?),
                SAMPLED_KEY => sampled = parse_sampled(value)?,
                _ => extra.push((key.to_ascii_lowercase(), value.to_string())),
            }
        }

        Ok(Self {
            trace_id: trace_id.ok_or(XrayHeaderError::MissingRoot)?,
            parent_id: parent_id.ok_or(XrayHeaderError::MissingParent)?,
            sampled,
            extra,
        })
    }
}

fn is_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn parse_root(value: &str) -> Result<TraceId, XrayHeaderError> {
    let invalid = || XrayHeaderError::InvalidTraceId(value.to_string());

    let (version, rest) = value.split_once('-').ok_or_else(invalid)?;
    let (epoch, unique) = rest.split_once('-').ok_or_else(invalid)?;
    if version != TRACE_ID_VERSION || !is_hex(epoch, EPOCH_HEX_LEN) || !is_hex(unique, UNIQUE_HEX_LEN)
    {
        return Err(invalid());
    }

    let trace_id = TraceId::from_hex(&format!("{}{}", epoch, unique)).map_err(|_| invalid())?;
    if trace_id == TraceId::INVALID {
        return Err(invalid());
    }
    Ok(trace_id)
}

fn parse_parent(value: &str) -> Result<SpanId, XrayHeaderError> {
    let invalid = || XrayHeaderError::InvalidParentId(value.to_string());

    if !is_hex(value, 16) {
        return Err(invalid());
    }
    let span_id = SpanId::from_hex(value).map_err(|_| invalid())?;
    if span_id == SpanId::INVALID {
        return Err(invalid());
    }
    Ok(span_id)
}

fn parse_sampled(value: &str) -> Result<Option<bool>, XrayHeaderError> {
    match value {
        "1" => Ok(Some(true)),
        "0" => Ok(Some(false)),
        "?" => Ok(None),
        other => Err(XrayHeaderError::InvalidSampled(other.to_string())),
    }
}

/// Propagator for the `X-Amzn-Trace-Id` header
#[derive(Debug, Clone, Default)]
pub struct XrayPropagator {
    _private: (),
}

impl XrayPropagator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TextMapPropagator for XrayPropagator {
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        let span = cx.span();
        if let Some(header) = XrayTraceHeader::from_span_context(span.span_context()) {
            injector.set(XRAY_HEADER, header.to_string());
        }
    }

    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context {
        extractor
            .get(XRAY_HEADER)
            .and_then(|value| value.parse::<XrayTraceHeader>().ok())
            .map(|header| cx.with_remote_span_context(header.to_span_context()))
            .unwrap_or_else(|| cx.clone())
    }

    fn fields(&self) -> FieldIter<'_> {
        FieldIter::new(&XRAY_FIELDS[..])
    }
}

/// Trace ID generator producing X-Ray compatible IDs
#[derive(Debug, Default)]
pub struct XrayIdGenerator {
    random: RandomIdGenerator,
}

impl IdGenerator for XrayIdGenerator {
    fn new_trace_id(&self) -> TraceId {
        let mut bytes = self.random.new_trace_id().to_bytes();
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();
        bytes[..4].copy_from_slice(&epoch.to_be_bytes());
        TraceId::from_bytes(bytes)
    }

    fn new_span_id(&self) -> SpanId {
        self.random.new_span_id()
    }
}
