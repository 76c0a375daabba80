//! Event phase codes.

/// Role of a raw event, decoded from its one-character `ph` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Begin,
    End,
    Complete,
    Instant,
    AsyncBegin,
    AsyncStepInto,
    AsyncStepPast,
    AsyncEnd,
    NestableAsyncBegin,
    NestableAsyncEnd,
    NestableAsyncInstant,
    FlowBegin,
    FlowStep,
    FlowEnd,
    Metadata,
    Counter,
    Sample,
    Created,
    SnapshotObject,
    Deleted,
}

impl Phase {
    /// Decode a phase code; `None` for codes outside the supported set.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        let phase = match code {
            "B" => Phase::Begin,
            "E" => Phase::End,
            "X" => Phase::Complete,
            "I" | "i" => Phase::Instant,
            "S" => Phase::AsyncBegin,
            "T" => Phase::AsyncStepInto,
            "p" => Phase::AsyncStepPast,
            "F" => Phase::AsyncEnd,
            "b" => Phase::NestableAsyncBegin,
            "e" => Phase::NestableAsyncEnd,
            "n" => Phase::NestableAsyncInstant,
            "s" => Phase::FlowBegin,
            "t" => Phase::FlowStep,
            "f" => Phase::FlowEnd,
            "M" => Phase::Metadata,
            "C" => Phase::Counter,
            "P" => Phase::Sample,
            "N" => Phase::Created,
            "O" => Phase::SnapshotObject,
            "D" => Phase::Deleted,
            _ => return None,
        };
        Some(phase)
    }

    #[must_use]
    pub fn code(self) -> char {
        match self {
            Phase::Begin => 'B',
            Phase::End => 'E',
            Phase::Complete => 'X',
            Phase::Instant => 'I',
            Phase::AsyncBegin => 'S',
            Phase::AsyncStepInto => 'T',
            Phase::AsyncStepPast => 'p',
            Phase::AsyncEnd => 'F',
            Phase::NestableAsyncBegin => 'b',
            Phase::NestableAsyncEnd => 'e',
            Phase::NestableAsyncInstant => 'n',
            Phase::FlowBegin => 's',
            Phase::FlowStep => 't',
            Phase::FlowEnd => 'f',
            Phase::Metadata => 'M',
            Phase::Counter => 'C',
            Phase::Sample => 'P',
            Phase::Created => 'N',
            Phase::SnapshotObject => 'O',
            Phase::Deleted => 'D',
        }
    }

    /// Legacy and nestable async phases
    #[must_use]
    pub fn is_async(self) -> bool {
        matches!(
            self,
            Phase::AsyncBegin
                | Phase::AsyncStepInto
                | Phase::AsyncStepPast
                | Phase::AsyncEnd
                | Phase::NestableAsyncBegin
                | Phase::NestableAsyncEnd
                | Phase::NestableAsyncInstant
        )
    }

    #[must_use]
    pub fn is_nestable_async(self) -> bool {
        matches!(
            self,
            Phase::NestableAsyncBegin | Phase::NestableAsyncEnd | Phase::NestableAsyncInstant
        )
    }

    #[must_use]
    pub fn is_flow(self) -> bool {
        matches!(self, Phase::FlowBegin | Phase::FlowStep | Phase::FlowEnd)
    }

    /// Phases that count towards the trace's minimum record time
    #[must_use]
    pub fn marks_activity(self) -> bool {
        matches!(self, Phase::Begin | Phase::Complete | Phase::Instant)
    }
}
