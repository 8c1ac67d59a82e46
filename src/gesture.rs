use std::fmt;

/// The fixed set of gesture classes the classifier can report.
///
/// Declaration order is the canonical order: the binding editor rows, the
/// export payload, and the classifier output index all follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureLabel {
    Okay,
    Peace,
    ThumbsUp,
    ThumbsDown,
    CallMe,
    Stop,
    Rock,
    LiveLong,
    Fist,
    Smile,
}

impl GestureLabel {
    pub const ALL: [GestureLabel; 10] = [
        GestureLabel::Okay,
        GestureLabel::Peace,
        GestureLabel::ThumbsUp,
        GestureLabel::ThumbsDown,
        GestureLabel::CallMe,
        GestureLabel::Stop,
        GestureLabel::Rock,
        GestureLabel::LiveLong,
        GestureLabel::Fist,
        GestureLabel::Smile,
    ];

    /// Wire name used in the binding import/export payload.
    pub fn name(&self) -> &'static str {
        match self {
            GestureLabel::Okay => "okay",
            GestureLabel::Peace => "peace",
            GestureLabel::ThumbsUp => "thumbs up",
            GestureLabel::ThumbsDown => "thumbs down",
            GestureLabel::CallMe => "call me",
            GestureLabel::Stop => "stop",
            GestureLabel::Rock => "rock",
            GestureLabel::LiveLong => "live long",
            GestureLabel::Fist => "fist",
            GestureLabel::Smile => "smile",
        }
    }

    /// Display glyph shown next to the label in the binding editor.
    pub fn glyph(&self) -> &'static str {
        match self {
            GestureLabel::Okay => "👌",
            GestureLabel::Peace => "✌️",
            GestureLabel::ThumbsUp => "👍",
            GestureLabel::ThumbsDown => "👎",
            GestureLabel::CallMe => "🤙",
            GestureLabel::Stop => "✋",
            GestureLabel::Rock => "🤟",
            GestureLabel::LiveLong => "🖖",
            GestureLabel::Fist => "✊",
            GestureLabel::Smile => "👉",
        }
    }

    pub fn from_name(name: &str) -> Option<GestureLabel> {
        GestureLabel::ALL.iter().copied().find(|l| l.name() == name)
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
