//! Channel membership gate
//!
//! Checks a user against an ordered list of required channels. Each call is a
//! fresh point-in-time scan: nothing is cached and nothing is retried.

use crate::channels::Channel;
use crate::transport::ChatTransport;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a user is not counted as a member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotMemberReason {
    /// Never joined or left the channel
    Left,
    /// Banned from the channel
    Kicked,
    /// Restricted in the channel
    Restricted,
}

/// Outcome of a single membership query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberStatus {
    /// Confirmed member (including admins and the owner)
    Member,
    /// Confirmed not a member
    NotMember(NotMemberReason),
    /// Membership could not be determined
    Unverifiable(String),
}

impl MemberStatus {
    /// Whether this status lets the user through
    #[must_use]
    pub const fn is_member(&self) -> bool {
        matches!(self, Self::Member)
    }
}

/// Result of a full gate scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateResult {
    /// Member of every required channel (or none are required)
    Passed,
    /// Stopped at the first channel that failed
    Blocked {
        /// First failing channel in configured order
        channel: Channel,
        /// Why it failed
        status: MemberStatus,
    },
}

impl GateResult {
    /// Whether the gate let the user through
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Membership gate bound to a chat transport
#[derive(Clone)]
pub struct MembershipGate {
    transport: Arc<dyn ChatTransport>,
}

impl MembershipGate {
    /// Create a gate that queries through `transport`
    #[must_use]
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self { transport }
    }

    /// Scan `channels` in order and stop at the first one that fails.
    ///
    /// Transport errors and channels without a query handle are reported as
    /// [`MemberStatus::Unverifiable`].
    pub async fn check_detailed(&self, user_id: i64, channels: &[Channel]) -> GateResult {
        for channel in channels {
            let status = self.query(user_id, channel).await;
            if !status.is_member() {
                debug!(user_id, channel = %channel.label, ?status, "Membership gate blocked");
                return GateResult::Blocked {
                    channel: channel.clone(),
                    status,
                };
            }
        }
        GateResult::Passed
    }

    /// Shorthand for [`Self::check_detailed`] that only reports pass/fail
    pub async fn is_member(&self, user_id: i64, channels: &[Channel]) -> bool {
        self.check_detailed(user_id, channels).await.passed()
    }

    async fn query(&self, user_id: i64, channel: &Channel) -> MemberStatus {
        let Some(target) = channel.target.as_ref() else {
            return MemberStatus::Unverifiable(format!("{} cannot be checked", channel.label));
        };

        match self.transport.member_status(target, user_id).await {
            Ok(status) => status,
            Err(e) => {
                warn!(user_id, channel = %target, error = %e, "Membership query failed");
                MemberStatus::Unverifiable(e.to_string())
            }
        }
    }
}
