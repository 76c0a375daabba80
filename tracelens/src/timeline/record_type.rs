//! Closed set of trace record kinds the classifier understands.
//!
//! Every event name maps to exactly one [`RecordType`]. Names the table does
//! not know land in [`RecordType::Unclassified`] instead of silently matching
//! nothing, so adding a kind is a compile-checked change in one place.

use serde::Serialize;
use std::fmt;

/// Category of console timing events
pub const CONSOLE_CATEGORY: &str = "blink.console";
/// Category of `performance.mark`/`measure` events
pub const USER_TIMING_CATEGORY: &str = "blink.user_timing";
/// Category of input latency async events
pub const LATENCY_INFO_CATEGORY: &str = "latencyInfo";

/// Thread name of a renderer's main thread
pub const RENDERER_MAIN_THREAD_NAME: &str = "CrRendererMain";
/// Thread names of dedicated workers (current and pre-M68 spelling)
pub const WORKER_THREAD_NAMES: [&str; 2] = ["DedicatedWorker thread", "DedicatedWorker Thread"];

// === DEVTOOLS METADATA EVENTS ===

pub const TRACING_STARTED_IN_BROWSER: &str = "TracingStartedInBrowser";
pub const TRACING_STARTED_IN_PAGE: &str = "TracingStartedInPage";
pub const TRACING_SESSION_ID_FOR_WORKER: &str = "TracingSessionIdForWorker";
pub const FRAME_COMMITTED_IN_BROWSER: &str = "FrameCommittedInBrowser";
pub const PROCESS_READY_IN_BROWSER: &str = "ProcessReadyInBrowser";
pub const FRAME_DELETED_IN_BROWSER: &str = "FrameDeletedInBrowser";

macro_rules! record_types {
    ($($variant:ident => $name:literal,)*) => {
        /// Kind of a trace record, keyed by event name
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum RecordType {
            $($variant,)*
            /// Any name outside the table
            Unclassified,
        }

        impl RecordType {
            #[must_use]
            pub fn from_name(name: &str) -> Self {
                match name {
                    $($name => RecordType::$variant,)*
                    _ => RecordType::Unclassified,
                }
            }

            /// Event name as emitted by the backend; `None` for [`RecordType::Unclassified`].
            #[must_use]
            pub fn event_name(self) -> Option<&'static str> {
                match self {
                    $(RecordType::$variant => Some($name),)*
                    RecordType::Unclassified => None,
                }
            }
        }
    };
}

record_types! {
    Task => "RunTask",
    Program => "Program",
    EventDispatch => "EventDispatch",
    GpuTask => "GPUTask",
    Animation => "Animation",
    RequestMainThreadFrame => "RequestMainThreadFrame",
    BeginFrame => "BeginFrame",
    NeedsBeginFrameChanged => "NeedsBeginFrameChanged",
    BeginMainThreadFrame => "BeginMainThreadFrame",
    ActivateLayerTree => "ActivateLayerTree",
    DrawFrame => "DrawFrame",
    HitTest => "HitTest",
    ScheduleStyleRecalculation => "ScheduleStyleRecalculation",
    RecalculateStyles => "RecalculateStyles",
    UpdateLayoutTree => "UpdateLayoutTree",
    InvalidateLayout => "InvalidateLayout",
    Layout => "Layout",
    UpdateLayer => "UpdateLayer",
    UpdateLayerTree => "UpdateLayerTree",
    PaintSetup => "PaintSetup",
    Paint => "Paint",
    PaintImage => "PaintImage",
    RasterTask => "RasterTask",
    ScrollLayer => "ScrollLayer",
    CompositeLayers => "CompositeLayers",
    ScheduleStyleInvalidationTracking => "ScheduleStyleInvalidationTracking",
    StyleRecalcInvalidationTracking => "StyleRecalcInvalidationTracking",
    StyleInvalidatorInvalidationTracking => "StyleInvalidatorInvalidationTracking",
    LayoutInvalidationTracking => "LayoutInvalidationTracking",
    ParseHtml => "ParseHTML",
    ParseAuthorStyleSheet => "ParseAuthorStyleSheet",
    TimerInstall => "TimerInstall",
    TimerRemove => "TimerRemove",
    TimerFire => "TimerFire",
    XhrReadyStateChange => "XHRReadyStateChange",
    XhrLoad => "XHRLoad",
    CompileScript => "v8.compile",
    EvaluateScript => "EvaluateScript",
    CompileModule => "v8.compileModule",
    EvaluateModule => "v8.evaluateModule",
    ParseScriptOnBackground => "v8.parseOnBackground",
    WasmStreamFromResponseCallback => "v8.wasm.streamFromResponseCallback",
    WasmCompiledModule => "v8.wasm.compiledModule",
    WasmCachedModule => "v8.wasm.cachedModule",
    WasmModuleCacheHit => "v8.wasm.moduleCacheHit",
    WasmModuleCacheInvalid => "v8.wasm.moduleCacheInvalid",
    FrameStartedLoading => "FrameStartedLoading",
    CommitLoad => "CommitLoad",
    MarkLoad => "MarkLoad",
    MarkDomContent => "MarkDOMContent",
    MarkFirstPaint => "firstPaint",
    MarkFcp => "firstContentfulPaint",
    MarkFmp => "firstMeaningfulPaint",
    TimeStamp => "TimeStamp",
    ConsoleTime => "ConsoleTime",
    UserTiming => "UserTiming",
    ResourceSendRequest => "ResourceSendRequest",
    ResourceReceiveResponse => "ResourceReceiveResponse",
    ResourceReceivedData => "ResourceReceivedData",
    ResourceFinish => "ResourceFinish",
    RunMicrotasks => "RunMicrotasks",
    FunctionCall => "FunctionCall",
    GcEvent => "GCEvent",
    MajorGc => "MajorGC",
    MinorGc => "MinorGC",
    JsFrame => "JSFrame",
    JsSample => "JSSample",
    RequestAnimationFrame => "RequestAnimationFrame",
    CancelAnimationFrame => "CancelAnimationFrame",
    FireAnimationFrame => "FireAnimationFrame",
    RequestIdleCallback => "RequestIdleCallback",
    CancelIdleCallback => "CancelIdleCallback",
    FireIdleCallback => "FireIdleCallback",
    WebSocketCreate => "WebSocketCreate",
    WebSocketSendHandshakeRequest => "WebSocketSendHandshakeRequest",
    WebSocketReceiveHandshakeResponse => "WebSocketReceiveHandshakeResponse",
    WebSocketDestroy => "WebSocketDestroy",
    EmbedderCallback => "EmbedderCallback",
    SetLayerTreeId => "SetLayerTreeId",
    DecodeImage => "Decode Image",
    ResizeImage => "Resize Image",
    DrawLazyPixelRef => "Draw LazyPixelRef",
    DecodeLazyPixelRef => "Decode LazyPixelRef",
    LayerTreeHostImplSnapshot => "cc::LayerTreeHostImpl",
    PictureSnapshot => "cc::Picture",
    DisplayItemListSnapshot => "cc::DisplayItemList",
    LatencyInfo => "LatencyInfo",
    LatencyInfoFlow => "LatencyInfo.Flow",
    InputLatencyMouseMove => "InputLatency::MouseMove",
    ImplSideFling => "InputHandlerProxy::HandleGestureFling::started",
    GcCollectGarbage => "BlinkGC.AtomicPhase",
    CryptoDoEncrypt => "DoEncrypt",
    CryptoDoEncryptReply => "DoEncryptReply",
    CryptoDoDecrypt => "DoDecrypt",
    CryptoDoDecryptReply => "DoDecryptReply",
    CryptoDoDigest => "DoDigest",
    CryptoDoDigestReply => "DoDigestReply",
    CryptoDoSign => "DoSign",
    CryptoDoSignReply => "DoSignReply",
    CryptoDoVerify => "DoVerify",
    CryptoDoVerifyReply => "DoVerifyReply",
    AsyncTask => "AsyncTask",
    UpdateCounters => "UpdateCounters",
    V8Execute => "V8.Execute",
    CpuProfile => "CpuProfile",
    Profile => "Profile",
    ProfileChunk => "ProfileChunk",
}

impl RecordType {
    /// Events whose instants may carry JS samples of running script
    #[must_use]
    pub fn is_js_invocation(self) -> bool {
        matches!(
            self,
            RecordType::RunMicrotasks
                | RecordType::FunctionCall
                | RecordType::EvaluateScript
                | RecordType::EvaluateModule
                | RecordType::EventDispatch
                | RecordType::V8Execute
        )
    }

    #[must_use]
    pub fn is_invalidation_tracking(self) -> bool {
        matches!(
            self,
            RecordType::ScheduleStyleInvalidationTracking
                | RecordType::StyleRecalcInvalidationTracking
                | RecordType::StyleInvalidatorInvalidationTracking
                | RecordType::LayoutInvalidationTracking
        )
    }
}

/// Performance warning attached to a single event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum WarningType {
    LongTask,
    ForcedStyle,
    ForcedLayout,
    IdleDeadlineExceeded,
    LongHandler,
    LongRecurringHandler,
}

impl fmt::Display for WarningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            WarningType::LongTask => "LongTask",
            WarningType::ForcedStyle => "ForcedStyle",
            WarningType::ForcedLayout => "ForcedLayout",
            WarningType::IdleDeadlineExceeded => "IdleDeadlineExceeded",
            WarningType::LongHandler => "LongHandler",
            WarningType::LongRecurringHandler => "LongRecurringHandler",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names_classify() {
        assert_eq!(RecordType::from_name("RunTask"), RecordType::Task);
        assert_eq!(RecordType::from_name("Decode Image"), RecordType::DecodeImage);
        assert_eq!(RecordType::from_name("v8.evaluateModule"), RecordType::EvaluateModule);
        assert_eq!(RecordType::Task.event_name(), Some("RunTask"));
    }

    #[test]
    fn test_unknown_name_is_unclassified() {
        let kind = RecordType::from_name("SomeFutureEvent");
        assert_eq!(kind, RecordType::Unclassified);
        assert_eq!(kind.event_name(), None);
        assert!(!kind.is_js_invocation());
    }

    #[test]
    fn test_js_invocations() {
        assert!(RecordType::FunctionCall.is_js_invocation());
        assert!(RecordType::V8Execute.is_js_invocation());
        assert!(!RecordType::Layout.is_js_invocation());
    }
}
