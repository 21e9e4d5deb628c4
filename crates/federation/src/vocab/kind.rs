use std::fmt;

/// Dispatch key of an activity.
///
/// Types with built-in side effects get their own variant; any other type
/// tag is carried in [`ActivityKind::Other`] and reaches the application's
/// default callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Create,
    Update,
    Delete,
    Follow,
    Accept,
    Reject,
    Add,
    Remove,
    Like,
    Announce,
    Undo,
    Block,
    Other(String),
}

/// Activity types of the vocabulary without built-in side effects.
const PASSIVE_ACTIVITY_TYPES: &[&str] = &[
    "Arrive",
    "Dislike",
    "Flag",
    "Ignore",
    "Invite",
    "Join",
    "Leave",
    "Listen",
    "Move",
    "Offer",
    "Question",
    "Read",
    "TentativeAccept",
    "TentativeReject",
    "Travel",
    "View",
];

impl ActivityKind {
    /// Parse a `type` tag.
    #[must_use]
    pub fn from_type(kind: &str) -> Self {
        match kind {
            "Create" => Self::Create,
            "Update" => Self::Update,
            "Delete" => Self::Delete,
            "Follow" => Self::Follow,
            "Accept" => Self::Accept,
            "Reject" => Self::Reject,
            "Add" => Self::Add,
            "Remove" => Self::Remove,
            "Like" => Self::Like,
            "Announce" => Self::Announce,
            "Undo" => Self::Undo,
            "Block" => Self::Block,
            other => Self::Other(other.to_string()),
        }
    }

    /// The `type` tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Follow => "Follow",
            Self::Accept => "Accept",
            Self::Reject => "Reject",
            Self::Add => "Add",
            Self::Remove => "Remove",
            Self::Like => "Like",
            Self::Announce => "Announce",
            Self::Undo => "Undo",
            Self::Block => "Block",
            Self::Other(kind) => kind,
        }
    }

    /// Whether a `type` tag names an activity of the vocabulary.
    #[must_use]
    pub fn is_activity_type(kind: &str) -> bool {
        !matches!(Self::from_type(kind), Self::Other(_)) || PASSIVE_ACTIVITY_TYPES.contains(&kind)
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
