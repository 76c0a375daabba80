//! Legend categories and the per-record style table.
//!
//! Every event maps to exactly one [`Category`] through its [`RecordStyle`].
//! Console, user timing and input latency events are scripting whatever
//! their name; names without a style are hidden "other" work.

use crate::store::Event;
use crate::timeline::record_type::{
    RecordType, CONSOLE_CATEGORY, LATENCY_INFO_CATEGORY, USER_TIMING_CATEGORY,
};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Loading,
    Scripting,
    Rendering,
    Painting,
    Gpu,
    Async,
    Other,
    Idle,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Loading,
        Category::Scripting,
        Category::Rendering,
        Category::Painting,
        Category::Gpu,
        Category::Async,
        Category::Other,
        Category::Idle,
    ];

    /// Key used in reports
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Category::Loading => "loading",
            Category::Scripting => "scripting",
            Category::Rendering => "rendering",
            Category::Painting => "painting",
            Category::Gpu => "gpu",
            Category::Async => "async",
            Category::Other => "other",
            Category::Idle => "idle",
        }
    }

    /// Legend label
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Category::Loading => "Loading",
            Category::Scripting => "Scripting",
            Category::Rendering => "Rendering",
            Category::Painting => "Painting",
            Category::Gpu => "GPU",
            Category::Async => "Async",
            Category::Other => "System",
            Category::Idle => "Idle",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordStyle {
    pub title: &'static str,
    pub category: Category,
    /// Kept out of the legend and the visible-events filter
    pub hidden: bool,
}

const fn style(title: &'static str, category: Category) -> RecordStyle {
    RecordStyle { title, category, hidden: false }
}

const fn hidden(title: &'static str, category: Category) -> RecordStyle {
    RecordStyle { title, category, hidden: true }
}

/// Style of a known record kind; `None` when the kind has no legend entry.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn record_style(kind: RecordType) -> Option<RecordStyle> {
    use Category::{Async, Gpu, Loading, Other, Painting, Rendering, Scripting};
    use RecordType as R;
    let style = match kind {
        R::Task => style("Task", Other),
        R::Program => style("Other", Other),
        R::Animation => style("Animation", Rendering),
        R::EventDispatch => style("Event", Scripting),
        R::RequestMainThreadFrame => hidden("Request Main Thread Frame", Rendering),
        R::BeginFrame => hidden("Frame Start", Rendering),
        R::BeginMainThreadFrame => hidden("Frame Start (main thread)", Rendering),
        R::DrawFrame => hidden("Draw Frame", Rendering),
        R::HitTest => style("Hit Test", Rendering),
        R::ScheduleStyleRecalculation => style("Schedule Style Recalculation", Rendering),
        R::RecalculateStyles | R::UpdateLayoutTree => style("Recalculate Style", Rendering),
        R::InvalidateLayout => hidden("Invalidate Layout", Rendering),
        R::Layout => style("Layout", Rendering),
        R::PaintSetup => style("Paint Setup", Painting),
        R::PaintImage => hidden("Paint Image", Painting),
        R::UpdateLayer => hidden("Update Layer", Painting),
        R::UpdateLayerTree => style("Update Layer Tree", Rendering),
        R::Paint => style("Paint", Painting),
        R::RasterTask => style("Rasterize Paint", Painting),
        R::ScrollLayer => style("Scroll", Rendering),
        R::CompositeLayers => style("Composite Layers", Painting),
        R::ParseHtml => style("Parse HTML", Loading),
        R::ParseAuthorStyleSheet => style("Parse Stylesheet", Loading),
        R::TimerInstall => style("Install Timer", Scripting),
        R::TimerRemove => style("Remove Timer", Scripting),
        R::TimerFire => style("Timer Fired", Scripting),
        R::XhrReadyStateChange => style("XHR Ready State Change", Scripting),
        R::XhrLoad => style("XHR Load", Scripting),
        R::CompileScript => style("Compile Script", Scripting),
        R::EvaluateScript => style("Evaluate Script", Scripting),
        R::CompileModule => style("Compile Module", Scripting),
        R::EvaluateModule => style("Evaluate Module", Scripting),
        R::ParseScriptOnBackground => style("Parse Script", Scripting),
        R::WasmStreamFromResponseCallback => style("Streaming Wasm Response", Scripting),
        R::WasmCompiledModule => style("Compiled Wasm Module", Scripting),
        R::WasmCachedModule => style("Cached Wasm Module", Scripting),
        R::WasmModuleCacheHit => style("Wasm Module Cache Hit", Scripting),
        R::WasmModuleCacheInvalid => style("Wasm Module Cache Invalid", Scripting),
        R::FrameStartedLoading => hidden("Frame Started Loading", Loading),
        R::MarkLoad => hidden("Onload Event", Scripting),
        R::MarkDomContent => hidden("DOMContentLoaded Event", Scripting),
        R::MarkFirstPaint => hidden("First Paint", Painting),
        R::MarkFcp => hidden("First Contentful Paint", Rendering),
        R::MarkFmp => hidden("First Meaningful Paint", Rendering),
        R::TimeStamp => style("Timestamp", Scripting),
        R::ConsoleTime => style("Console Time", Scripting),
        R::UserTiming => style("User Timing", Scripting),
        R::ResourceSendRequest => style("Send Request", Loading),
        R::ResourceReceiveResponse => style("Receive Response", Loading),
        R::ResourceFinish => style("Finish Loading", Loading),
        R::ResourceReceivedData => style("Receive Data", Loading),
        R::RunMicrotasks => style("Run Microtasks", Scripting),
        R::FunctionCall => style("Function Call", Scripting),
        R::GcEvent => style("GC Event", Scripting),
        R::MajorGc => style("Major GC", Scripting),
        R::MinorGc => style("Minor GC", Scripting),
        R::JsFrame => style("JS Frame", Scripting),
        R::RequestAnimationFrame => style("Request Animation Frame", Scripting),
        R::CancelAnimationFrame => style("Cancel Animation Frame", Scripting),
        R::FireAnimationFrame => style("Animation Frame Fired", Scripting),
        R::RequestIdleCallback => style("Request Idle Callback", Scripting),
        R::CancelIdleCallback => style("Cancel Idle Callback", Scripting),
        R::FireIdleCallback => style("Fire Idle Callback", Scripting),
        R::WebSocketCreate => style("Create WebSocket", Scripting),
        R::WebSocketSendHandshakeRequest => style("Send WebSocket Handshake", Scripting),
        R::WebSocketReceiveHandshakeResponse => style("Receive WebSocket Handshake", Scripting),
        R::WebSocketDestroy => style("Destroy WebSocket", Scripting),
        R::EmbedderCallback => style("Embedder Callback", Scripting),
        R::DecodeImage => style("Image Decode", Painting),
        R::ResizeImage => style("Image Resize", Painting),
        R::GpuTask => style("GPU", Gpu),
        R::LatencyInfo => style("Input Latency", Scripting),
        R::GcCollectGarbage => style("DOM GC", Scripting),
        R::CryptoDoEncrypt => style("Encrypt", Scripting),
        R::CryptoDoEncryptReply => style("Encrypt Reply", Scripting),
        R::CryptoDoDecrypt => style("Decrypt", Scripting),
        R::CryptoDoDecryptReply => style("Decrypt Reply", Scripting),
        R::CryptoDoDigest => style("Digest", Scripting),
        R::CryptoDoDigestReply => style("Digest Reply", Scripting),
        R::CryptoDoSign => style("Sign", Scripting),
        R::CryptoDoSignReply => style("Sign Reply", Scripting),
        R::CryptoDoVerify => style("Verify", Scripting),
        R::CryptoDoVerifyReply => style("Verify Reply", Scripting),
        R::AsyncTask => style("Async Task", Async),
        _ => return None,
    };
    Some(style)
}

const INPUT_LATENCY_PREFIX: &str = "InputLatency::";

/// Title and category of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStyle<'a> {
    pub title: Cow<'a, str>,
    pub category: Category,
    pub hidden: bool,
}

#[must_use]
pub fn event_style(event: &Event) -> EventStyle<'_> {
    if event.has_category(CONSOLE_CATEGORY) || event.has_category(USER_TIMING_CATEGORY) {
        return EventStyle {
            title: Cow::Borrowed(&event.name),
            category: Category::Scripting,
            hidden: false,
        };
    }
    if event.has_category(LATENCY_INFO_CATEGORY) {
        let input_type = event.name.strip_prefix(INPUT_LATENCY_PREFIX).unwrap_or(&event.name);
        return EventStyle {
            title: Cow::Borrowed(input_type),
            category: Category::Scripting,
            hidden: false,
        };
    }
    match record_style(RecordType::from_name(&event.name)) {
        Some(style) => EventStyle {
            title: Cow::Borrowed(style.title),
            category: style.category,
            hidden: style.hidden,
        },
        None => EventStyle {
            title: Cow::Borrowed(&event.name),
            category: Category::Other,
            hidden: true,
        },
    }
}

#[must_use]
pub fn event_category(event: &Event) -> Category {
    event_style(event).category
}

/// Record kind the visibility filter judges an event by
fn visibility_kind(event: &Event) -> RecordType {
    if event.has_category(CONSOLE_CATEGORY) {
        RecordType::ConsoleTime
    } else if event.has_category(USER_TIMING_CATEGORY) {
        RecordType::UserTiming
    } else if event.has_category(LATENCY_INFO_CATEGORY) {
        RecordType::LatencyInfo
    } else {
        RecordType::from_name(&event.name)
    }
}

/// Whether the event's record kind has a visible legend entry.
#[must_use]
pub fn is_visible(event: &Event) -> bool {
    record_style(visibility_kind(event)).is_some_and(|style| !style.hidden)
}

/// Events that count towards category statistics: visible ones plus the
/// top-level task boundaries.
#[must_use]
pub fn counts_for_stats(event: &Event) -> bool {
    is_visible(event) || event.is_top_level()
}
