//! Quest system: node-graph progression with objective tracking.
//!
//! A quest is a graph of nodes; each node carries a set of objectives
//! and a pointer to the next node. Counters advance as world events
//! arrive (kills, pickups, conversations, room changes); when every
//! objective of the current node is satisfied the quest moves to the
//! next node, and completing a terminal node completes the quest.
//! Completed quests stay in history forever.
//!
//! The manager is the single authoritative owner of quest state; the
//! condition layer (`quest.*` checks) and effect layer (`quest.start`
//! etc.) both go through it.

use ashvale_common::{ItemId, NodeId, NpcId, QuestId, RoomId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::warn;

use crate::events::{EventBus, StoryEvent};

/// Error types for quest operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuestError {
    /// Quest not found
    #[error("quest not found: {0}")]
    NotFound(QuestId),
    /// Quest already active
    #[error("quest already active: {0}")]
    AlreadyActive(QuestId),
    /// Quest already completed and not repeatable
    #[error("quest already completed: {0}")]
    AlreadyCompleted(QuestId),
    /// Quest not active
    #[error("quest not active: {0}")]
    NotActive(QuestId),
    /// Prerequisites not met
    #[error("prerequisites not met for quest: {0}")]
    PrerequisitesNotMet(QuestId),
}

/// Result type for quest operations.
pub type QuestResult<T> = Result<T, QuestError>;

/// Lifecycle status of a quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestStatus {
    /// Never started.
    NotStarted,
    /// Currently in progress.
    Active,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
}

/// An objective within a quest node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QuestObjective {
    /// Kill a number of NPCs of a kind.
    Kill {
        /// Target NPC kind.
        npc: NpcId,
        /// Required kill count.
        count: u32,
    },
    /// Collect items.
    Collect {
        /// Item type to collect.
        item: ItemId,
        /// Required item count.
        count: u32,
    },
    /// Talk to a specific NPC.
    TalkTo {
        /// Target NPC.
        npc: NpcId,
    },
    /// Pick a specific dialogue response.
    ChooseResponse {
        /// Response ID to pick.
        response: String,
    },
    /// Enter a room.
    EnterRoom {
        /// Target room.
        room: RoomId,
    },
    /// Custom objective completed through
    /// [`QuestManager::on_custom_objective`].
    Custom {
        /// Unique identifier for this objective.
        id: String,
        /// Localization key describing it.
        description_key: String,
    },
}

impl QuestObjective {
    /// Creates a kill objective.
    #[must_use]
    pub fn kill(npc: NpcId, count: u32) -> Self {
        Self::Kill { npc, count }
    }

    /// Creates a collect objective.
    #[must_use]
    pub fn collect(item: ItemId, count: u32) -> Self {
        Self::Collect { item, count }
    }

    /// Creates a talk objective.
    #[must_use]
    pub fn talk_to(npc: NpcId) -> Self {
        Self::TalkTo { npc }
    }

    /// Creates a response objective.
    #[must_use]
    pub fn choose_response(response: impl Into<String>) -> Self {
        Self::ChooseResponse {
            response: response.into(),
        }
    }

    /// Creates a room objective.
    #[must_use]
    pub fn enter_room(room: RoomId) -> Self {
        Self::EnterRoom { room }
    }

    /// Creates a custom objective.
    #[must_use]
    pub fn custom(id: impl Into<String>, description_key: impl Into<String>) -> Self {
        Self::Custom {
            id: id.into(),
            description_key: description_key.into(),
        }
    }

    /// Returns the count required to satisfy this objective.
    #[must_use]
    pub const fn required_count(&self) -> u32 {
        match self {
            Self::Kill { count, .. } | Self::Collect { count, .. } => *count,
            Self::TalkTo { .. }
            | Self::ChooseResponse { .. }
            | Self::EnterRoom { .. }
            | Self::Custom { .. } => 1,
        }
    }
}

/// A reward granted when a quest completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QuestReward {
    /// Experience points.
    Experience(u64),
    /// An item grant.
    Item {
        /// Item type.
        id: ItemId,
        /// Item count.
        count: u32,
    },
    /// Coins.
    Coins(u64),
}

/// A single node in a quest graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestNode {
    /// Node ID, unique within the quest.
    pub id: NodeId,
    /// Localization key describing this stage.
    pub description_key: String,
    /// Objectives to satisfy before advancing.
    pub objectives: Vec<QuestObjective>,
    /// Next node, or `None` for a terminal node.
    pub next: Option<NodeId>,
}

impl QuestNode {
    /// Creates a terminal node with no objectives.
    #[must_use]
    pub fn new(id: impl Into<NodeId>, description_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description_key: description_key.into(),
            objectives: Vec::new(),
            next: None,
        }
    }

    /// Adds an objective.
    #[must_use]
    pub fn with_objective(mut self, objective: QuestObjective) -> Self {
        self.objectives.push(objective);
        self
    }

    /// Sets the node to advance to once every objective is satisfied.
    #[must_use]
    pub fn with_next(mut self, next: impl Into<NodeId>) -> Self {
        self.next = Some(next.into());
        self
    }
}

/// Definition of a quest that can be started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestTemplate {
    /// Unique quest identifier.
    pub id: QuestId,
    /// Localization key of the quest name.
    pub name_key: String,
    /// Localization key of the quest description.
    pub description_key: String,
    /// Node progression starts here.
    pub start_node: NodeId,
    /// All nodes in the quest graph.
    pub nodes: HashMap<NodeId, QuestNode>,
    /// Quests that must be completed first.
    pub prerequisites: Vec<QuestId>,
    /// Whether the quest can be started again after completion.
    pub repeatable: bool,
    /// Rewards granted on completion.
    pub rewards: Vec<QuestReward>,
}

impl QuestTemplate {
    /// Creates a quest template starting at the given node.
    #[must_use]
    pub fn new(
        id: QuestId,
        name_key: impl Into<String>,
        start_node: impl Into<NodeId>,
    ) -> Self {
        Self {
            id,
            name_key: name_key.into(),
            description_key: String::new(),
            start_node: start_node.into(),
            nodes: HashMap::new(),
            prerequisites: Vec::new(),
            repeatable: false,
            rewards: Vec::new(),
        }
    }

    /// Sets the description key.
    #[must_use]
    pub fn with_description(mut self, key: impl Into<String>) -> Self {
        self.description_key = key.into();
        self
    }

    /// Adds a node to the graph.
    #[must_use]
    pub fn with_node(mut self, node: QuestNode) -> Self {
        self.nodes.insert(node.id.clone(), node);
        self
    }

    /// Adds a prerequisite quest.
    #[must_use]
    pub fn with_prerequisite(mut self, quest: QuestId) -> Self {
        self.prerequisites.push(quest);
        self
    }

    /// Adds a completion reward.
    #[must_use]
    pub fn with_reward(mut self, reward: QuestReward) -> Self {
        self.rewards.push(reward);
        self
    }

    /// Sets whether the quest is repeatable.
    #[must_use]
    pub const fn repeatable(mut self, repeatable: bool) -> Self {
        self.repeatable = repeatable;
        self
    }
}

/// Progress of one active quest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestProgress {
    /// Quest being tracked.
    pub quest: QuestId,
    /// Node the quest is currently on.
    pub current_node: NodeId,
    /// Game time when the quest started.
    pub started_at: f64,
    /// Counter per objective of the current node, capped at the
    /// objective's required count. Resets when the quest advances.
    pub objective_progress: Vec<u32>,
}

impl QuestProgress {
    fn new(quest: QuestId, template: &QuestTemplate, started_at: f64) -> Self {
        let objective_count = template
            .nodes
            .get(&template.start_node)
            .map_or(0, |node| node.objectives.len());
        Self {
            quest,
            current_node: template.start_node.clone(),
            started_at,
            objective_progress: vec![0; objective_count],
        }
    }

    /// Whether every objective of the given node is satisfied.
    #[must_use]
    pub fn node_complete(&self, node: &QuestNode) -> bool {
        node.objectives.iter().enumerate().all(|(index, objective)| {
            self.objective_progress.get(index).copied().unwrap_or(0)
                >= objective.required_count()
        })
    }

    /// Progress of one objective as `(current, required)`.
    #[must_use]
    pub fn objective_status(&self, index: usize, node: &QuestNode) -> Option<(u32, u32)> {
        let current = self.objective_progress.get(index)?;
        let objective = node.objectives.get(index)?;
        Some((*current, objective.required_count()))
    }
}

/// Quest data projected for UI display.
#[derive(Debug, Clone)]
pub struct QuestView {
    /// Quest ID.
    pub id: QuestId,
    /// Localization key of the quest name.
    pub name_key: String,
    /// Localization key of the quest description.
    pub description_key: String,
    /// Current lifecycle status.
    pub status: QuestStatus,
    /// Description key of the current node, when active.
    pub node_description_key: Option<String>,
    /// Objective status list for the current node.
    pub objectives: Vec<ObjectiveView>,
}

/// Objective data projected for UI display.
#[derive(Debug, Clone)]
pub struct ObjectiveView {
    /// The objective itself.
    pub objective: QuestObjective,
    /// Current progress.
    pub current: u32,
    /// Required for completion.
    pub required: u32,
    /// Whether the objective is satisfied.
    pub complete: bool,
}

/// Quest manager handling registration, progression and history.
#[derive(Debug, Default)]
pub struct QuestManager {
    /// Registered quest templates.
    templates: HashMap<QuestId, QuestTemplate>,
    /// Currently active quests.
    active: HashMap<QuestId, QuestProgress>,
    /// Completed quests; never removed.
    completed: HashSet<QuestId>,
    /// Failed quests.
    failed: HashSet<QuestId>,
    /// Rewards queued by completed quests, drained by the caller.
    pending_rewards: Vec<(QuestId, Vec<QuestReward>)>,
    /// Current game time, stamped onto new progress.
    game_time: f64,
}

impl QuestManager {
    /// Creates an empty quest manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current game time.
    pub fn set_game_time(&mut self, time: f64) {
        self.game_time = time;
    }

    /// Returns the current game time.
    #[must_use]
    pub const fn game_time(&self) -> f64 {
        self.game_time
    }

    /// Registers a quest template.
    pub fn register(&mut self, template: QuestTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    /// Gets a registered template.
    #[must_use]
    pub fn template(&self, quest: &QuestId) -> Option<&QuestTemplate> {
        self.templates.get(quest)
    }

    /// Gets active quest progress.
    #[must_use]
    pub fn progress(&self, quest: &QuestId) -> Option<&QuestProgress> {
        self.active.get(quest)
    }

    /// Lifecycle status of a quest. Unknown quests are `NotStarted`.
    #[must_use]
    pub fn status(&self, quest: &QuestId) -> QuestStatus {
        if self.active.contains_key(quest) {
            QuestStatus::Active
        } else if self.completed.contains(quest) {
            QuestStatus::Completed
        } else if self.failed.contains(quest) {
            QuestStatus::Failed
        } else {
            QuestStatus::NotStarted
        }
    }

    /// Whether a quest is active.
    #[must_use]
    pub fn is_active(&self, quest: &QuestId) -> bool {
        self.active.contains_key(quest)
    }

    /// Whether a quest has completed.
    #[must_use]
    pub fn is_completed(&self, quest: &QuestId) -> bool {
        self.completed.contains(quest)
    }

    /// Whether a quest has failed.
    #[must_use]
    pub fn is_failed(&self, quest: &QuestId) -> bool {
        self.failed.contains(quest)
    }

    /// Whether a quest is active and sitting on the given node.
    #[must_use]
    pub fn is_on_node(&self, quest: &QuestId, node: &NodeId) -> bool {
        self.active
            .get(quest)
            .is_some_and(|progress| progress.current_node == *node)
    }

    /// Whether a quest could be started right now: registered, not
    /// active, not already completed (unless repeatable), and every
    /// prerequisite completed. Failed quests may be retried.
    #[must_use]
    pub fn can_accept(&self, quest: &QuestId) -> bool {
        let Some(template) = self.templates.get(quest) else {
            return false;
        };
        if self.active.contains_key(quest) {
            return false;
        }
        if self.completed.contains(quest) && !template.repeatable {
            return false;
        }
        template
            .prerequisites
            .iter()
            .all(|prereq| self.completed.contains(prereq))
    }

    /// Starts a quest.
    ///
    /// Nodes without objectives advance immediately, so a quest whose
    /// start node carries none can progress (or even complete) within
    /// this call.
    pub fn start_quest(&mut self, quest: &QuestId, events: &EventBus) -> QuestResult<()> {
        let template = self
            .templates
            .get(quest)
            .ok_or_else(|| QuestError::NotFound(quest.clone()))?;
        if self.active.contains_key(quest) {
            return Err(QuestError::AlreadyActive(quest.clone()));
        }
        if self.completed.contains(quest) && !template.repeatable {
            return Err(QuestError::AlreadyCompleted(quest.clone()));
        }
        for prereq in &template.prerequisites {
            if !self.completed.contains(prereq) {
                return Err(QuestError::PrerequisitesNotMet(quest.clone()));
            }
        }

        let progress = QuestProgress::new(quest.clone(), template, self.game_time);
        self.failed.remove(quest);
        self.active.insert(quest.clone(), progress);
        events.publish(StoryEvent::QuestStarted {
            quest: quest.clone(),
        });
        self.try_advance(quest, events);
        Ok(())
    }

    /// Completes an active quest regardless of remaining objectives
    /// (content-authoritative turn-in via `quest.complete` effects).
    pub fn complete_quest(&mut self, quest: &QuestId, events: &EventBus) -> QuestResult<()> {
        if !self.active.contains_key(quest) {
            return Err(QuestError::NotActive(quest.clone()));
        }
        self.finish_quest(quest, events);
        Ok(())
    }

    /// Fails an active quest.
    pub fn fail_quest(&mut self, quest: &QuestId, events: &EventBus) -> QuestResult<()> {
        if self.active.remove(quest).is_none() {
            return Err(QuestError::NotActive(quest.clone()));
        }
        self.failed.insert(quest.clone());
        events.publish(StoryEvent::QuestFailed {
            quest: quest.clone(),
        });
        Ok(())
    }

    /// Drops an active quest without marking it failed.
    pub fn abandon_quest(&mut self, quest: &QuestId) {
        self.active.remove(quest);
    }

    /// Drains rewards queued by quests that completed since the last
    /// drain. The caller applies them to the player.
    pub fn take_pending_rewards(&mut self) -> Vec<(QuestId, Vec<QuestReward>)> {
        std::mem::take(&mut self.pending_rewards)
    }

    // === World-event intake ===

    /// Called when an NPC of the given kind is killed.
    pub fn on_npc_killed(&mut self, npc: &NpcId, events: &EventBus) {
        self.apply_progress(events, |objective| match objective {
            QuestObjective::Kill { npc: target, .. } if target == npc => 1,
            _ => 0,
        });
    }

    /// Called when the player collects items.
    pub fn on_item_collected(&mut self, item: &ItemId, count: u32, events: &EventBus) {
        self.apply_progress(events, |objective| match objective {
            QuestObjective::Collect { item: target, .. } if target == item => count,
            _ => 0,
        });
    }

    /// Called when the player talks to an NPC.
    pub fn on_npc_talked(&mut self, npc: &NpcId, events: &EventBus) {
        self.apply_progress(events, |objective| match objective {
            QuestObjective::TalkTo { npc: target } if target == npc => 1,
            _ => 0,
        });
    }

    /// Called when the player picks a dialogue response.
    pub fn on_response_chosen(&mut self, response: &str, events: &EventBus) {
        self.apply_progress(events, |objective| match objective {
            QuestObjective::ChooseResponse { response: target } if target == response => 1,
            _ => 0,
        });
    }

    /// Called when the player enters a room.
    pub fn on_room_entered(&mut self, room: &RoomId, events: &EventBus) {
        self.apply_progress(events, |objective| match objective {
            QuestObjective::EnterRoom { room: target } if target == room => 1,
            _ => 0,
        });
    }

    /// Called when a custom objective is satisfied by host logic.
    pub fn on_custom_objective(&mut self, objective_id: &str, events: &EventBus) {
        self.apply_progress(events, |objective| match objective {
            QuestObjective::Custom { id, .. } if id == objective_id => 1,
            _ => 0,
        });
    }

    // === Projections ===

    /// Projects a quest for UI display.
    #[must_use]
    pub fn view(&self, quest: &QuestId) -> Option<QuestView> {
        let template = self.templates.get(quest)?;
        let progress = self.active.get(quest);
        let node = progress.and_then(|p| template.nodes.get(&p.current_node));

        let objectives = match (progress, node) {
            (Some(progress), Some(node)) => node
                .objectives
                .iter()
                .enumerate()
                .map(|(index, objective)| {
                    let (current, required) = progress
                        .objective_status(index, node)
                        .unwrap_or((0, objective.required_count()));
                    ObjectiveView {
                        objective: objective.clone(),
                        current,
                        required,
                        complete: current >= required,
                    }
                })
                .collect(),
            _ => Vec::new(),
        };

        Some(QuestView {
            id: quest.clone(),
            name_key: template.name_key.clone(),
            description_key: template.description_key.clone(),
            status: self.status(quest),
            node_description_key: node.map(|n| n.description_key.clone()),
            objectives,
        })
    }

    /// Iterates over all registered templates.
    pub fn iter_templates(&self) -> impl Iterator<Item = (&QuestId, &QuestTemplate)> {
        self.templates.iter()
    }

    /// Iterates over all active progress.
    pub fn iter_active(&self) -> impl Iterator<Item = (&QuestId, &QuestProgress)> {
        self.active.iter()
    }

    /// Number of active quests.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Number of completed quests.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    // === Internals ===

    /// Bumps matching objectives of every active quest's current node,
    /// then advances any quest whose node is now complete.
    fn apply_progress<F>(&mut self, events: &EventBus, mut increment: F)
    where
        F: FnMut(&QuestObjective) -> u32,
    {
        let ids: Vec<QuestId> = self.active.keys().cloned().collect();
        for quest in ids {
            let Some(template) = self.templates.get(&quest) else {
                continue;
            };
            let Some(progress) = self.active.get_mut(&quest) else {
                continue;
            };
            let Some(node) = template.nodes.get(&progress.current_node) else {
                continue;
            };
            let mut changed = false;
            for (index, objective) in node.objectives.iter().enumerate() {
                let amount = increment(objective);
                if amount == 0 {
                    continue;
                }
                if let Some(slot) = progress.objective_progress.get_mut(index) {
                    let required = objective.required_count();
                    let before = *slot;
                    *slot = slot.saturating_add(amount).min(required);
                    changed |= *slot != before;
                }
            }
            if changed {
                self.try_advance(&quest, events);
            }
        }
    }

    /// Advances a quest while its current node is complete; completing
    /// a terminal node completes the quest.
    fn try_advance(&mut self, quest: &QuestId, events: &EventBus) {
        loop {
            let next = {
                let Some(template) = self.templates.get(quest) else {
                    return;
                };
                let Some(progress) = self.active.get(quest) else {
                    return;
                };
                let Some(node) = template.nodes.get(&progress.current_node) else {
                    warn!(quest = %quest, node = %progress.current_node,
                        "quest is on a node missing from its template");
                    return;
                };
                if !progress.node_complete(node) {
                    return;
                }
                node.next.clone()
            };

            match next {
                Some(next) => {
                    let objective_count = self
                        .templates
                        .get(quest)
                        .and_then(|template| template.nodes.get(&next))
                        .map(|node| node.objectives.len());
                    let Some(objective_count) = objective_count else {
                        warn!(quest = %quest, node = %next, "quest advance target does not exist");
                        return;
                    };
                    if let Some(progress) = self.active.get_mut(quest) {
                        progress.current_node = next.clone();
                        progress.objective_progress = vec![0; objective_count];
                    }
                    events.publish(StoryEvent::QuestAdvanced {
                        quest: quest.clone(),
                        node: next,
                    });
                }
                None => {
                    self.finish_quest(quest, events);
                    return;
                }
            }
        }
    }

    /// Moves an active quest into the completed set, queueing rewards.
    fn finish_quest(&mut self, quest: &QuestId, events: &EventBus) {
        let rewards = self
            .templates
            .get(quest)
            .map(|template| template.rewards.clone())
            .unwrap_or_default();
        self.active.remove(quest);
        self.completed.insert(quest.clone());
        if !rewards.is_empty() {
            self.pending_rewards.push((quest.clone(), rewards));
        }
        events.publish(StoryEvent::QuestCompleted {
            quest: quest.clone(),
        });
    }
}
