// src/signal.rs
use crate::value::Value;

/// Non-local control transfer carried beside (never inside) the rejection channel.
#[derive(Debug, Clone)]
pub enum SignalKind {
    /// Abandon the rest of the current scope's chain.
    Break,
    /// Jump forward to the continuation labelled `label`, fulfilling it with `value`.
    Goto { label: String, value: Value },
}

#[derive(Debug, Clone)]
pub struct ControlSignal {
    kind: SignalKind,
    // One extra hop through a handled link before degrading to undefined.
    preliminary: bool,
}

impl ControlSignal {
    #[inline]
    pub fn new_break() -> Self {
        Self { kind: SignalKind::Break, preliminary: false }
    }

    #[inline]
    pub fn new_goto(label: impl Into<String>, value: Value) -> Self {
        Self {
            kind: SignalKind::Goto { label: label.into(), value },
            preliminary: false,
        }
    }

    #[inline]
    pub(crate) fn into_preliminary(mut self) -> Self {
        self.preliminary = true;
        self
    }

    #[inline]
    pub fn kind(&self) -> &SignalKind {
        &self.kind
    }

    #[inline]
    pub fn is_break(&self) -> bool {
        matches!(self.kind, SignalKind::Break)
    }

    #[inline]
    pub fn is_preliminary(&self) -> bool {
        self.preliminary
    }

    /// Goto target, `None` for a break.
    #[inline]
    pub fn label(&self) -> Option<&str> {
        match &self.kind {
            SignalKind::Goto { label, .. } => Some(label),
            SignalKind::Break => None,
        }
    }

    /// Crossing a handled link: a preliminary signal survives once (no longer
    /// preliminary), anything else is absorbed.
    #[inline]
    pub(crate) fn hop(&self) -> Option<ControlSignal> {
        if !self.preliminary {
            return None;
        }
        Some(Self { kind: self.kind.clone(), preliminary: false })
    }

    /// Whether a successor carrying `label` is the target of this signal.
    #[inline]
    pub(crate) fn targets(&self, label: Option<&str>) -> bool {
        match (&self.kind, label) {
            (SignalKind::Goto { label: want, .. }, Some(have)) => want == have,
            _ => false,
        }
    }

    /// Carried goto value, undefined for a break.
    #[inline]
    pub(crate) fn carried(&self) -> Value {
        match &self.kind {
            SignalKind::Goto { value, .. } => value.clone(),
            SignalKind::Break => Value::undefined(),
        }
    }
}
