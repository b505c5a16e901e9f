use serde::{Deserialize, Serialize};

/// Trip lifecycle. Attendance can only be marked while a trip is
/// `confirmed` or `completed` — never on a cancelled trip.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Planning,
    Confirmed,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TripStatus::Planning => "planning",
            TripStatus::Confirmed => "confirmed",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planning" => Some(TripStatus::Planning),
            "confirmed" => Some(TripStatus::Confirmed),
            "completed" => Some(TripStatus::Completed),
            "cancelled" => Some(TripStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// A join request is resolved exactly once: `pending` is the only state
/// that admits a transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "accepted" => Some(RequestStatus::Accepted),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

/// Per-participant attendance state. `Pending` means "not yet marked" and is
/// never persisted — a stored record is always `showed_up` or `no_show`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Pending,
    ShowedUp,
    NoShow,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Pending => "pending",
            AttendanceStatus::ShowedUp => "showed_up",
            AttendanceStatus::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AttendanceStatus::Pending),
            "showed_up" => Some(AttendanceStatus::ShowedUp),
            "no_show" => Some(AttendanceStatus::NoShow),
            _ => None,
        }
    }

    /// The reputation event a stored attendance status corresponds to.
    /// `Pending` has no reputation consequence.
    pub fn reward(self) -> Option<RewardReason> {
        match self {
            AttendanceStatus::Pending => None,
            AttendanceStatus::ShowedUp => Some(RewardReason::ShowUp),
            AttendanceStatus::NoShow => Some(RewardReason::NoShow),
        }
    }
}

/// Closed set of reputation-bearing events. Keeping this a tagged variant
/// (rather than free-text reason strings) makes revert handling exhaustive:
/// a match on `RewardReason` cannot silently no-op on a typo.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RewardReason {
    HostTrip,
    ShowUp,
    NoShow,
    Post,
}

impl RewardReason {
    /// Fixed point delta applied to the participant's reputation score.
    pub fn delta(self) -> i64 {
        match self {
            RewardReason::HostTrip => 70,
            RewardReason::ShowUp => 40,
            RewardReason::NoShow => -30,
            RewardReason::Post => 20,
        }
    }

    /// Audit tag written to the reputation event ledger.
    pub fn tag(self) -> &'static str {
        match self {
            RewardReason::HostTrip => "host_trip",
            RewardReason::ShowUp => "show_up",
            RewardReason::NoShow => "no_show",
            RewardReason::Post => "post",
        }
    }
}
