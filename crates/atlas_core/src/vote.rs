//! crates/atlas_core/src/vote.rs
//!
//! Optimistic vote toggling.
//!
//! Each listed tool gets a `VoteCard` that flips its displayed count and voted flag
//! the moment the user acts, sends a single toggle to the gateway, and either keeps
//! the optimistic state (then invalidates every cached read so the next access
//! revalidates) or restores the pre-click snapshot. The card ignores further actions
//! while a toggle is pending and for a short cool-down after it settles.

use crate::cache::ReadCaches;
use crate::domain::{Tool, VoteStatus};
use crate::ports::{GatewayResult, ToolGateway};
use crate::tunables::Tunables;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What the user sees of a card's interaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotePhase {
    Idle,
    Pending,
    CoolingDown,
}

/// The transient "+1"/"-1" next to the count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDelta {
    Up,
    Down,
}

impl VoteDelta {
    pub fn label(&self) -> &'static str {
        match self {
            VoteDelta::Up => "+1",
            VoteDelta::Down => "-1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The store accepted the toggle.
    Confirmed(VoteStatus),
    /// Dropped because a toggle was pending or cooling down.
    Suppressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteView {
    pub tool_id: Uuid,
    pub count: u32,
    pub has_voted: bool,
    pub phase: VotePhase,
    pub delta: Option<VoteDelta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Pending,
    CoolingDown { until: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Displayed {
    count: u32,
    has_voted: bool,
}

struct CardState {
    displayed: Displayed,
    /// Last server-provided values. `None` once a settled toggle showed they were
    /// stale, so the next server values always land.
    baseline: Option<Displayed>,
    /// Pre-click state, restored if the toggle fails.
    rollback: Option<Displayed>,
    phase: Phase,
    delta: Option<(VoteDelta, Instant)>,
}

impl CardState {
    fn phase(&self) -> VotePhase {
        match self.phase {
            Phase::Idle => VotePhase::Idle,
            Phase::Pending => VotePhase::Pending,
            Phase::CoolingDown { until } if Instant::now() < until => VotePhase::CoolingDown,
            Phase::CoolingDown { .. } => VotePhase::Idle,
        }
    }

    fn delta(&self, visible_for: std::time::Duration) -> Option<VoteDelta> {
        self.delta
            .filter(|(_, at)| at.elapsed() < visible_for)
            .map(|(delta, _)| delta)
    }
}

//=========================================================================================
// Per-Tool Card
//=========================================================================================

pub struct VoteCard {
    tool_id: Uuid,
    gateway: Arc<dyn ToolGateway>,
    caches: Arc<ReadCaches>,
    tunables: Tunables,
    state: Mutex<CardState>,
}

impl VoteCard {
    fn new(
        tool_id: Uuid,
        count: u32,
        has_voted: bool,
        gateway: Arc<dyn ToolGateway>,
        caches: Arc<ReadCaches>,
        tunables: Tunables,
    ) -> Self {
        let displayed = Displayed { count, has_voted };
        Self {
            tool_id,
            gateway,
            caches,
            tunables,
            state: Mutex::new(CardState {
                displayed,
                baseline: Some(displayed),
                rollback: None,
                phase: Phase::Idle,
                delta: None,
            }),
        }
    }

    pub async fn view(&self) -> VoteView {
        let state = self.state.lock().await;
        let delta = state.delta(self.tunables.vote_delta_visible);
        VoteView {
            tool_id: self.tool_id,
            count: state.displayed.count,
            has_voted: state.displayed.has_voted,
            phase: state.phase(),
            delta,
        }
    }

    /// Takes in server-provided values for this tool.
    ///
    /// The display is only overwritten when the server values actually changed, so a
    /// re-render with the same data keeps the optimistic state. A change arriving
    /// while a toggle is pending becomes the new truth: a later failure will no
    /// longer roll back past it.
    pub async fn observe(&self, count: u32, has_voted: bool) {
        let mut state = self.state.lock().await;
        let incoming = Displayed { count, has_voted };
        if state.baseline == Some(incoming) {
            return;
        }
        state.baseline = Some(incoming);
        state.displayed = incoming;
        if state.phase == Phase::Pending {
            state.rollback = None;
        }
    }

    /// Flips this session's vote on the tool.
    pub async fn toggle(&self) -> GatewayResult<VoteOutcome> {
        {
            let mut state = self.state.lock().await;
            if state.phase() != VotePhase::Idle {
                debug!(tool_id = %self.tool_id, "Vote suppressed.");
                return Ok(VoteOutcome::Suppressed);
            }
            let before = state.displayed;
            let (count, delta) = if before.has_voted {
                (before.count.saturating_sub(1), VoteDelta::Down)
            } else {
                (before.count.saturating_add(1), VoteDelta::Up)
            };
            state.rollback = Some(before);
            state.displayed = Displayed {
                count,
                has_voted: !before.has_voted,
            };
            state.delta = Some((delta, Instant::now()));
            state.phase = Phase::Pending;
        }

        let result = self.gateway.toggle_vote(self.tool_id).await;

        let mut state = self.state.lock().await;
        state.phase = Phase::CoolingDown {
            until: Instant::now() + self.tunables.vote_cooldown,
        };
        match result {
            Ok(status) => {
                let has_voted = status == VoteStatus::Added;
                if let Some(before) = state.rollback.take() {
                    if has_voted != state.displayed.has_voted {
                        // The store flipped the other way: our voted flag was stale.
                        warn!(tool_id = %self.tool_id, ?status, "Vote settled against the displayed state.");
                        state.displayed = Displayed {
                            count: before.count,
                            has_voted,
                        };
                        state.delta = None;
                        state.baseline = None;
                    }
                }
                state.displayed.has_voted = has_voted;
                drop(state);
                info!(tool_id = %self.tool_id, ?status, "Vote recorded.");
                self.caches.invalidate_all();
                Ok(VoteOutcome::Confirmed(status))
            }
            Err(e) => {
                if let Some(before) = state.rollback.take() {
                    state.displayed = before;
                    state.delta = None;
                }
                warn!(tool_id = %self.tool_id, "Vote failed: {}", e);
                Err(e)
            }
        }
    }

    /// Idle with no indicator showing: nothing a fresh card would display differently.
    async fn is_settled(&self) -> bool {
        let state = self.state.lock().await;
        state.phase() == VotePhase::Idle && state.delta(self.tunables.vote_delta_visible).is_none()
    }
}

//=========================================================================================
// Card Registry
//=========================================================================================

/// Keeps one card per tool so interaction state survives list refreshes.
pub struct VoteController {
    gateway: Arc<dyn ToolGateway>,
    caches: Arc<ReadCaches>,
    tunables: Tunables,
    cards: Mutex<HashMap<Uuid, Arc<VoteCard>>>,
}

impl VoteController {
    pub fn new(gateway: Arc<dyn ToolGateway>, caches: Arc<ReadCaches>, tunables: Tunables) -> Self {
        Self {
            gateway,
            caches,
            tunables,
            cards: Mutex::new(HashMap::new()),
        }
    }

    /// The card for `tool`, fed with the latest server values.
    ///
    /// Creating a card drops every other card nobody holds that has settled.
    pub async fn card(&self, tool: &Tool, has_voted: bool) -> Arc<VoteCard> {
        let mut cards = self.cards.lock().await;
        if let Some(card) = cards.get(&tool.id) {
            card.observe(tool.vote_count, has_voted).await;
            return Arc::clone(card);
        }
        let mut settled = Vec::new();
        for (id, card) in cards.iter() {
            if Arc::strong_count(card) == 1 && card.is_settled().await {
                settled.push(*id);
            }
        }
        for id in &settled {
            cards.remove(id);
        }
        if !settled.is_empty() {
            debug!(dropped = settled.len(), "Dropped settled vote cards.");
        }

        let card = Arc::new(VoteCard::new(
            tool.id,
            tool.vote_count,
            has_voted,
            Arc::clone(&self.gateway),
            Arc::clone(&self.caches),
            self.tunables,
        ));
        cards.insert(tool.id, Arc::clone(&card));
        card
    }
}
