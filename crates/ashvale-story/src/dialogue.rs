//! Dialogue trees and the session driver.
//!
//! A [`DialogueTree`] is immutable definition data: a named graph of
//! nodes reachable from a start node. The runtime cursor lives in
//! [`DialogueSession`], of which at most one exists at a time, owned by
//! the [`DialogueManager`]. The manager selects trees per NPC, drives
//! traversal, and delegates condition checks and effect execution to
//! the script layer.
//!
//! Content-level failures (unknown NPCs, missing trees, bad indexes)
//! are typed errors or quiet no-ops, never panics: broken content must
//! not end the session.

use ashvale_common::{ItemId, NodeId, NpcId, TreeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

use crate::condition::ConditionEvaluator;
use crate::content::{self, ContentError};
use crate::context::ScriptContext;
use crate::cutscene::{CommandOutcome, CutsceneCommand, CutsceneHost, CutsceneRunner};
use crate::effect::EffectExecutor;
use crate::events::StoryEvent;
use crate::npc::NpcDefinition;

/// Error types for dialogue operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DialogueError {
    /// NPC not found
    #[error("unknown NPC: {0}")]
    UnknownNpc(NpcId),
    /// NPC refuses to talk without an item
    #[error("NPC {npc} requires item {item}")]
    ItemRequired {
        /// NPC that refused.
        npc: NpcId,
        /// Item the player is missing.
        item: ItemId,
        /// Localization key of the refusal line, for the caller to show.
        refuse_dialog: Option<String>,
    },
    /// No dialogue entry of the NPC passed its conditions
    #[error("no eligible dialogue tree for NPC: {0}")]
    NoEligibleTree(NpcId),
    /// A tree id resolved but is not registered
    #[error("unknown dialogue tree: {0}")]
    UnknownTree(TreeId),
    /// No dialogue session is active
    #[error("no active dialogue")]
    NoActiveDialogue,
    /// Response index out of bounds of the filtered response list
    #[error("invalid response index: {0}")]
    InvalidResponse(usize),
}

/// Result type for dialogue operations.
pub type DialogueResult<T> = Result<T, DialogueError>;

/// Where a response or command node sends the tree next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextNode {
    /// Terminates the tree.
    End,
    /// Moves to the named node.
    Node(NodeId),
}

impl NextNode {
    /// Converts the content encoding: absent or `"end"` terminates.
    #[must_use]
    pub fn from_content(raw: Option<&str>) -> Self {
        match raw {
            None | Some("end") | Some("") => Self::End,
            Some(id) => Self::Node(NodeId::new(id)),
        }
    }
}

/// A player-selectable edge out of a dialogue node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueResponse {
    /// Response identifier (quest hooks key off it).
    pub id: String,
    /// Localization key of the response text.
    pub text_key: String,
    /// Destination when chosen.
    pub next_node: NextNode,
    /// Conditions gating visibility.
    pub conditions: Vec<String>,
    /// Effects executed when chosen.
    pub effects: Vec<String>,
}

impl DialogueResponse {
    /// Creates a response leading to another node.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        text_key: impl Into<String>,
        next_node: impl Into<NodeId>,
    ) -> Self {
        Self {
            id: id.into(),
            text_key: text_key.into(),
            next_node: NextNode::Node(next_node.into()),
            conditions: Vec::new(),
            effects: Vec::new(),
        }
    }

    /// Creates a response that ends the dialogue.
    #[must_use]
    pub fn end(id: impl Into<String>, text_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text_key: text_key.into(),
            next_node: NextNode::End,
            conditions: Vec::new(),
            effects: Vec::new(),
        }
    }

    /// Adds a condition string.
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    /// Adds an effect string.
    #[must_use]
    pub fn with_effect(mut self, effect: impl Into<String>) -> Self {
        self.effects.push(effect.into());
        self
    }
}

/// Cutscene command attached to a command node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandNode {
    /// The scripted action.
    pub command: CutsceneCommand,
    /// Whether the sequencer blocks until the action reports complete.
    pub wait: bool,
    /// Where the tree resumes after completion.
    pub next_node: NextNode,
}

/// A single vertex of a dialogue tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueNode {
    /// Node identifier, unique within the tree.
    pub id: NodeId,
    /// Localization key of the spoken text.
    pub text_key: String,
    /// Portrait override for this node.
    pub portrait_key: Option<String>,
    /// Effects executed when the node is entered.
    pub effects: Vec<String>,
    /// Player-selectable responses.
    pub responses: Vec<DialogueResponse>,
    /// Present on command nodes: the cutscene action to run.
    pub command: Option<CommandNode>,
}

impl DialogueNode {
    /// Creates a node with no responses.
    #[must_use]
    pub fn new(id: impl Into<NodeId>, text_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text_key: text_key.into(),
            portrait_key: None,
            effects: Vec::new(),
            responses: Vec::new(),
            command: None,
        }
    }

    /// Sets the portrait override.
    #[must_use]
    pub fn with_portrait(mut self, key: impl Into<String>) -> Self {
        self.portrait_key = Some(key.into());
        self
    }

    /// Adds an entry effect.
    #[must_use]
    pub fn with_effect(mut self, effect: impl Into<String>) -> Self {
        self.effects.push(effect.into());
        self
    }

    /// Adds a response.
    #[must_use]
    pub fn with_response(mut self, response: DialogueResponse) -> Self {
        self.responses.push(response);
        self
    }

    /// Turns this into a command node.
    #[must_use]
    pub fn with_command(mut self, command: CutsceneCommand, wait: bool, next: NextNode) -> Self {
        self.command = Some(CommandNode {
            command,
            wait,
            next_node: next,
        });
        self
    }

    /// Whether this node terminates the tree: no responses and no
    /// command to resume from.
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.responses.is_empty() && self.command.is_none()
    }
}

/// A named directed graph of dialogue nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueTree {
    /// Tree identifier.
    pub id: TreeId,
    /// NPC this tree belongs to.
    pub npc_id: NpcId,
    /// Traversal starts here.
    start_node: NodeId,
    /// All nodes by id.
    nodes: HashMap<NodeId, DialogueNode>,
}

impl DialogueTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new(
        id: impl Into<TreeId>,
        npc_id: impl Into<NpcId>,
        start_node: impl Into<NodeId>,
    ) -> Self {
        Self {
            id: id.into(),
            npc_id: npc_id.into(),
            start_node: start_node.into(),
            nodes: HashMap::new(),
        }
    }

    /// Adds a node.
    pub fn add_node(&mut self, node: DialogueNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Adds a node (builder form).
    #[must_use]
    pub fn with_node(mut self, node: DialogueNode) -> Self {
        self.add_node(node);
        self
    }

    /// Gets a node by id.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&DialogueNode> {
        self.nodes.get(id)
    }

    /// Whether the tree contains a node.
    #[must_use]
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// The start node id.
    #[must_use]
    pub const fn start_node(&self) -> &NodeId {
        &self.start_node
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterates over all nodes.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &DialogueNode> {
        self.nodes.values()
    }
}

/// The runtime cursor of the single active dialogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueSession {
    tree: TreeId,
    npc: NpcId,
    current: Option<NodeId>,
}

impl DialogueSession {
    /// Starts a session at a tree's start node.
    #[must_use]
    pub fn new(tree: TreeId, npc: NpcId, start: NodeId) -> Self {
        Self {
            tree,
            npc,
            current: Some(start),
        }
    }

    /// Tree this session runs.
    #[must_use]
    pub const fn tree_id(&self) -> &TreeId {
        &self.tree
    }

    /// NPC this session is with.
    #[must_use]
    pub const fn npc(&self) -> &NpcId {
        &self.npc
    }

    /// Current node id, `None` once terminated.
    #[must_use]
    pub const fn current(&self) -> Option<&NodeId> {
        self.current.as_ref()
    }

    /// Whether traversal is over: the cursor is empty or sits on an end
    /// node.
    #[must_use]
    pub fn is_finished(&self, tree: &DialogueTree) -> bool {
        match &self.current {
            None => true,
            Some(id) => tree.node(id).map_or(true, DialogueNode::is_end),
        }
    }

    /// Moves the cursor. `End` terminates; a dangling node id is
    /// swallowed and the cursor stays put (the content validator
    /// reports those at load time). Returns whether a transition
    /// happened.
    pub fn go_to(&mut self, tree: &DialogueTree, next: &NextNode) -> bool {
        match next {
            NextNode::End => {
                self.current = None;
                true
            }
            NextNode::Node(id) => {
                if tree.contains_node(id) {
                    self.current = Some(id.clone());
                    true
                } else {
                    warn!(tree = %tree.id, node = %id, "dangling next-node id, staying put");
                    false
                }
            }
        }
    }
}

/// Loads dialogue content, selects trees per NPC, and drives the single
/// active session.
#[derive(Debug, Default)]
pub struct DialogueManager {
    trees: HashMap<TreeId, DialogueTree>,
    npcs: HashMap<NpcId, NpcDefinition>,
    session: Option<DialogueSession>,
    conditions: ConditionEvaluator,
    effects: EffectExecutor,
    cutscene: CutsceneRunner,
    /// Command node entered but not yet handed to the runner.
    pending_command: Option<CommandNode>,
}

impl DialogueManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // === Content ===

    /// Registers a dialogue tree.
    pub fn register_tree(&mut self, tree: DialogueTree) {
        self.trees.insert(tree.id.clone(), tree);
    }

    /// Registers an NPC definition.
    pub fn register_npc(&mut self, npc: NpcDefinition) {
        self.npcs.insert(npc.id.clone(), npc);
    }

    /// Loads a dialogue-tree JSON document, skipping invalid trees with
    /// a warning. Returns how many trees were registered.
    pub fn load_trees(&mut self, json: &str) -> Result<usize, ContentError> {
        let trees = content::parse_dialogue_trees(json)?;
        let count = trees.len();
        for tree in trees {
            self.register_tree(tree);
        }
        Ok(count)
    }

    /// Loads an NPC-definition JSON document, skipping invalid NPCs with
    /// a warning. Returns how many NPCs were registered.
    pub fn load_npcs(&mut self, json: &str) -> Result<usize, ContentError> {
        let npcs = content::parse_npcs(json)?;
        let count = npcs.len();
        for npc in npcs {
            self.register_npc(npc);
        }
        Ok(count)
    }

    /// Gets a registered tree.
    #[must_use]
    pub fn tree(&self, id: &TreeId) -> Option<&DialogueTree> {
        self.trees.get(id)
    }

    /// Gets a registered NPC definition.
    #[must_use]
    pub fn npc(&self, id: &NpcId) -> Option<&NpcDefinition> {
        self.npcs.get(id)
    }

    // === Session queries ===

    /// Whether a dialogue session is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// The active session, if any.
    #[must_use]
    pub fn session(&self) -> Option<&DialogueSession> {
        self.session.as_ref()
    }

    /// NPC of the active session.
    #[must_use]
    pub fn current_npc(&self) -> Option<&NpcId> {
        self.session.as_ref().map(DialogueSession::npc)
    }

    /// Node the active session is on.
    #[must_use]
    pub fn current_node(&self) -> Option<&DialogueNode> {
        let session = self.session.as_ref()?;
        let tree = self.trees.get(session.tree_id())?;
        tree.node(session.current()?)
    }

    /// Responses of the current node whose conditions pass, in
    /// declaration order. Indexes into this list are what
    /// [`Self::choose_response`] takes.
    pub fn available_responses(&mut self, ctx: &ScriptContext<'_>) -> Vec<&DialogueResponse> {
        let Some(session) = &self.session else {
            return Vec::new();
        };
        let Some(tree) = self.trees.get(session.tree_id()) else {
            return Vec::new();
        };
        let Some(node) = session.current().and_then(|id| tree.node(id)) else {
            return Vec::new();
        };
        node.responses
            .iter()
            .filter(|response| self.conditions.evaluate_all(&response.conditions, ctx))
            .collect()
    }

    // === Session driving ===

    /// Starts a dialogue with an NPC.
    ///
    /// Resolution: the NPC must be known; an item gate refuses with the
    /// refusal key attached; a tree override in world state beats the
    /// NPC's conditional entry list; the selected tree must be
    /// registered. The start node's effects run before this returns, so
    /// they are visible to the first UI read.
    pub fn start_dialogue(
        &mut self,
        npc_id: &NpcId,
        ctx: &mut ScriptContext<'_>,
    ) -> DialogueResult<()> {
        let npc = self
            .npcs
            .get(npc_id)
            .ok_or_else(|| DialogueError::UnknownNpc(npc_id.clone()))?;

        if let Some(item) = &npc.requires_item {
            if !ctx.state.has_item(item) {
                return Err(DialogueError::ItemRequired {
                    npc: npc_id.clone(),
                    item: item.clone(),
                    refuse_dialog: npc.refuse_dialog_key.clone(),
                });
            }
        }

        let tree_id = match ctx.state.npc_tree(npc_id) {
            Some(tree) => tree.clone(),
            None => npc
                .select_tree(&mut self.conditions, ctx)
                .ok_or_else(|| DialogueError::NoEligibleTree(npc_id.clone()))?
                .clone(),
        };

        let tree = self
            .trees
            .get(&tree_id)
            .ok_or_else(|| DialogueError::UnknownTree(tree_id.clone()))?;
        let start = tree.start_node().clone();

        self.session = Some(DialogueSession::new(tree_id.clone(), npc_id.clone(), start));
        ctx.events.publish(StoryEvent::DialogueStarted {
            npc: npc_id.clone(),
            tree: tree_id,
        });
        ctx.quests.on_npc_talked(npc_id, ctx.events);
        self.enter_current_node(ctx);
        Ok(())
    }

    /// Chooses a response by its index into the currently available
    /// (condition-filtered) list.
    ///
    /// Order within this call: the response-chosen notification goes out
    /// first (quest hooks key off it), then the response's effects, then
    /// the transition, then the destination node's effects. If the tree
    /// is finished afterwards the session ends.
    pub fn choose_response(
        &mut self,
        index: usize,
        ctx: &mut ScriptContext<'_>,
    ) -> DialogueResult<()> {
        let response = {
            let session = self.session.as_ref().ok_or(DialogueError::NoActiveDialogue)?;
            let tree = self
                .trees
                .get(session.tree_id())
                .ok_or_else(|| DialogueError::UnknownTree(session.tree_id().clone()))?;
            let node = session
                .current()
                .and_then(|id| tree.node(id))
                .ok_or(DialogueError::NoActiveDialogue)?;
            node.responses
                .iter()
                .filter(|response| self.conditions.evaluate_all(&response.conditions, ctx))
                .nth(index)
                .cloned()
                .ok_or(DialogueError::InvalidResponse(index))?
        };

        ctx.events.publish(StoryEvent::ResponseChosen {
            response: response.id.clone(),
        });
        ctx.quests.on_response_chosen(&response.id, ctx.events);
        self.effects.execute_all(&response.effects, ctx);
        self.advance_session(&response.next_node, ctx);
        Ok(())
    }

    /// Ends the active session, abandoning any in-flight cutscene
    /// command.
    pub fn end_dialogue(&mut self, ctx: &mut ScriptContext<'_>) {
        self.finish_session(ctx);
    }

    /// Per-frame tick: polls the in-flight cutscene command and starts
    /// any armed one, resuming tree traversal as commands complete.
    /// Instant command chains resolve within a single call.
    pub fn update(
        &mut self,
        dt: f32,
        host: &mut dyn CutsceneHost,
        ctx: &mut ScriptContext<'_>,
    ) {
        if let Some(outcome) = self.cutscene.update(dt, host, ctx.events) {
            self.resume_after_command(&outcome, ctx);
        }
        while let Some(command) = self.pending_command.take() {
            let next = match command.next_node {
                NextNode::End => None,
                NextNode::Node(id) => Some(id),
            };
            match self
                .cutscene
                .begin(command.command, command.wait, next, host, ctx)
            {
                Some(outcome) => self.resume_after_command(&outcome, ctx),
                None => break,
            }
        }
    }

    // === Internals ===

    /// Resumes traversal after a command completed.
    fn resume_after_command(&mut self, outcome: &CommandOutcome, ctx: &mut ScriptContext<'_>) {
        let next = match &outcome.next_node {
            Some(id) => NextNode::Node(id.clone()),
            None => NextNode::End,
        };
        self.advance_session(&next, ctx);
    }

    /// Moves the session cursor and runs whatever the destination node
    /// requires; ends the session when traversal is over.
    fn advance_session(&mut self, next: &NextNode, ctx: &mut ScriptContext<'_>) {
        let (entered, finished) = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            let Some(tree) = self.trees.get(&session.tree) else {
                return;
            };
            let moved = session.go_to(tree, next);
            (
                moved && session.current().is_some(),
                session.is_finished(tree),
            )
        };
        if entered {
            self.enter_current_node(ctx);
        }
        if finished {
            self.finish_session(ctx);
        }
    }

    /// Runs the current node's entry effects and arms its command, if
    /// it is a command node.
    fn enter_current_node(&mut self, ctx: &mut ScriptContext<'_>) {
        let (effects, command) = {
            let Some(session) = &self.session else {
                return;
            };
            let Some(tree) = self.trees.get(session.tree_id()) else {
                return;
            };
            let Some(node) = session.current().and_then(|id| tree.node(id)) else {
                return;
            };
            (node.effects.clone(), node.command.clone())
        };
        self.effects.execute_all(&effects, ctx);
        if command.is_some() {
            self.pending_command = command;
        }
    }

    /// Clears the session and cancels cutscene work.
    fn finish_session(&mut self, ctx: &mut ScriptContext<'_>) {
        if let Some(session) = self.session.take() {
            self.cutscene.cancel();
            self.pending_command = None;
            ctx.events.publish(StoryEvent::DialogueEnded {
                npc: session.npc().clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cutscene::MockCutsceneHost;
    use crate::events::EventBus;
    use crate::npc::NpcDialogEntry;
    use crate::player::Player;
    use crate::quest::{QuestManager, QuestNode, QuestObjective, QuestTemplate};
    use crate::world_state::WorldState;
    use ashvale_common::QuestId;

    struct Fixture {
        player: Player,
        state: WorldState,
        quests: QuestManager,
        events: EventBus,
        manager: DialogueManager,
    }

    macro_rules! ctx {
        ($fixture:expr) => {
            ScriptContext::new(
                &mut $fixture.player,
                &mut $fixture.state,
                &mut $fixture.quests,
                &$fixture.events,
            )
        };
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                player: Player::new(),
                state: WorldState::new(),
                quests: QuestManager::new(),
                events: EventBus::default(),
                manager: DialogueManager::new(),
            }
        }

        fn start(&mut self, npc: &str) -> DialogueResult<()> {
            let mut ctx = ctx!(self);
            self.manager.start_dialogue(&NpcId::new(npc), &mut ctx)
        }

        fn choose(&mut self, index: usize) -> DialogueResult<()> {
            let mut ctx = ctx!(self);
            self.manager.choose_response(index, &mut ctx)
        }

        fn available_ids(&mut self) -> Vec<String> {
            let ctx = ctx!(self);
            self.manager
                .available_responses(&ctx)
                .iter()
                .map(|response| response.id.clone())
                .collect()
        }
    }

    /// Greeting tree: hello -> (ask -> info -> end) | (bye -> end).
    fn greeting_tree() -> DialogueTree {
        DialogueTree::new("elder_greeting", "elder", "hello")
            .with_node(
                DialogueNode::new("hello", "dlg.elder.hello")
                    .with_response(DialogueResponse::new("ask", "dlg.elder.ask", "info"))
                    .with_response(DialogueResponse::end("bye", "dlg.elder.bye")),
            )
            .with_node(
                DialogueNode::new("info", "dlg.elder.info")
                    .with_response(DialogueResponse::end("thanks", "dlg.elder.thanks")),
            )
    }

    fn elder() -> NpcDefinition {
        NpcDefinition::new("elder", "npc.elder.name")
            .with_dialog(NpcDialogEntry::new("elder_greeting", 1))
    }

    #[test]
    fn test_session_finished_when_start_node_is_terminal() {
        let tree = DialogueTree::new("t", "npc", "only")
            .with_node(DialogueNode::new("only", "dlg.only"));
        let session = DialogueSession::new(
            TreeId::new("t"),
            NpcId::new("npc"),
            tree.start_node().clone(),
        );
        assert!(session.is_finished(&tree));
    }

    #[test]
    fn test_go_to_dangling_id_is_a_no_op() {
        let tree = greeting_tree();
        let mut session = DialogueSession::new(
            TreeId::new("elder_greeting"),
            NpcId::new("elder"),
            NodeId::new("hello"),
        );
        let moved = session.go_to(&tree, &NextNode::Node(NodeId::new("nonexistent_id")));
        assert!(!moved);
        assert_eq!(session.current(), Some(&NodeId::new("hello")));
    }

    #[test]
    fn test_go_to_end_terminates() {
        let tree = greeting_tree();
        let mut session = DialogueSession::new(
            TreeId::new("elder_greeting"),
            NpcId::new("elder"),
            NodeId::new("hello"),
        );
        assert!(session.go_to(&tree, &NextNode::End));
        assert_eq!(session.current(), None);
        assert!(session.is_finished(&tree));
    }

    #[test]
    fn test_next_node_from_content() {
        assert_eq!(NextNode::from_content(None), NextNode::End);
        assert_eq!(NextNode::from_content(Some("end")), NextNode::End);
        assert_eq!(
            NextNode::from_content(Some("hall")),
            NextNode::Node(NodeId::new("hall"))
        );
    }

    #[test]
    fn test_start_unknown_npc_fails() {
        let mut fixture = Fixture::new();
        assert_eq!(
            fixture.start("stranger"),
            Err(DialogueError::UnknownNpc(NpcId::new("stranger")))
        );
        assert!(!fixture.manager.is_active());
    }

    #[test]
    fn test_item_gate_refuses_with_key() {
        let mut fixture = Fixture::new();
        fixture.manager.register_tree(greeting_tree());
        fixture.manager.register_npc(
            elder()
                .requiring_item(ItemId::new("pass_token"))
                .with_refuse_dialog("npc.elder.refuse"),
        );

        let result = fixture.start("elder");
        assert_eq!(
            result,
            Err(DialogueError::ItemRequired {
                npc: NpcId::new("elder"),
                item: ItemId::new("pass_token"),
                refuse_dialog: Some("npc.elder.refuse".to_owned()),
            })
        );

        fixture.state.give_item(&ItemId::new("pass_token"), 1);
        fixture.start("elder").expect("gate passes with the item");
        assert!(fixture.manager.is_active());
    }

    #[test]
    fn test_priority_fallback_selection() {
        let mut fixture = Fixture::new();
        fixture.manager.register_tree(greeting_tree());
        fixture.manager.register_tree(
            DialogueTree::new("elder_praise", "elder", "praise")
                .with_node(DialogueNode::new("praise", "dlg.elder.praise")),
        );
        fixture.manager.register_npc(
            NpcDefinition::new("elder", "npc.elder.name")
                .with_dialog(
                    NpcDialogEntry::new("elder_praise", 1)
                        .with_condition("quest.main_quest.completed"),
                )
                .with_dialog(NpcDialogEntry::new("elder_greeting", 2)),
        );

        fixture.start("elder").expect("start");
        assert_eq!(
            fixture.manager.session().map(|s| s.tree_id().as_str()),
            Some("elder_greeting")
        );
    }

    #[test]
    fn test_runtime_override_beats_priority_list() {
        let mut fixture = Fixture::new();
        fixture.manager.register_tree(greeting_tree());
        fixture.manager.register_tree(
            DialogueTree::new("elder_angry", "elder", "grr")
                .with_node(DialogueNode::new("grr", "dlg.elder.grr")),
        );
        fixture.manager.register_npc(elder());
        fixture
            .state
            .set_npc_tree(NpcId::new("elder"), TreeId::new("elder_angry"));

        fixture.start("elder").expect("start");
        assert_eq!(
            fixture.manager.session().map(|s| s.tree_id().as_str()),
            Some("elder_angry")
        );
    }

    #[test]
    fn test_no_eligible_tree_fails() {
        let mut fixture = Fixture::new();
        fixture.manager.register_tree(greeting_tree());
        fixture.manager.register_npc(
            NpcDefinition::new("elder", "npc.elder.name").with_dialog(
                NpcDialogEntry::new("elder_greeting", 1).with_condition("flag.never_set"),
            ),
        );
        assert_eq!(
            fixture.start("elder"),
            Err(DialogueError::NoEligibleTree(NpcId::new("elder")))
        );
    }

    #[test]
    fn test_start_runs_start_node_effects_immediately() {
        let mut fixture = Fixture::new();
        fixture.manager.register_tree(
            DialogueTree::new("gift", "elder", "give").with_node(
                DialogueNode::new("give", "dlg.gift")
                    .with_effect("item.give.bread.2")
                    .with_response(DialogueResponse::end("bye", "dlg.bye")),
            ),
        );
        fixture
            .manager
            .register_npc(NpcDefinition::new("elder", "npc.elder.name").with_dialog(
                NpcDialogEntry::new("gift", 1),
            ));

        fixture.start("elder").expect("start");
        // Effects ran before any UI read.
        assert_eq!(fixture.state.item_count(&ItemId::new("bread")), 2);
    }

    #[test]
    fn test_response_filtering_preserves_order_and_indexing() {
        let mut fixture = Fixture::new();
        fixture.manager.register_tree(
            DialogueTree::new("t", "elder", "n")
                .with_node(
                    DialogueNode::new("n", "dlg.n")
                        .with_response(
                            DialogueResponse::new("r0", "dlg.r0", "a")
                                .with_condition("flag.never_set"),
                        )
                        .with_response(DialogueResponse::new("r1", "dlg.r1", "a"))
                        .with_response(DialogueResponse::new("r2", "dlg.r2", "b")),
                )
                .with_node(DialogueNode::new("a", "dlg.a").with_response(
                    DialogueResponse::end("bye_a", "dlg.bye"),
                ))
                .with_node(DialogueNode::new("b", "dlg.b").with_response(
                    DialogueResponse::end("bye_b", "dlg.bye"),
                )),
        );
        fixture
            .manager
            .register_npc(elder().with_dialog(NpcDialogEntry::new("t", 0)));

        fixture.start("elder").expect("start");
        assert_eq!(fixture.available_ids(), vec!["r1", "r2"]);

        // Index 1 of the filtered list is r2, not the raw list's r1.
        fixture.choose(1).expect("choose r2");
        let session = fixture.manager.session().expect("active");
        assert_eq!(session.current(), Some(&NodeId::new("b")));
    }

    #[test]
    fn test_choose_out_of_bounds_of_filtered_list() {
        let mut fixture = Fixture::new();
        fixture.manager.register_tree(greeting_tree());
        fixture.manager.register_npc(elder());
        fixture.start("elder").expect("start");

        assert_eq!(fixture.choose(2), Err(DialogueError::InvalidResponse(2)));
        // Session survives a bad index.
        assert!(fixture.manager.is_active());
    }

    #[test]
    fn test_end_of_tree_cleanup() {
        let mut fixture = Fixture::new();
        fixture.manager.register_tree(greeting_tree());
        fixture.manager.register_npc(elder());
        fixture.start("elder").expect("start");

        fixture.choose(1).expect("choose bye");
        assert!(!fixture.manager.is_active());
        assert!(fixture.manager.current_node().is_none());

        let events = fixture.events.drain();
        assert!(events.contains(&StoryEvent::DialogueEnded {
            npc: NpcId::new("elder")
        }));
    }

    #[test]
    fn test_walk_to_end_node_runs_its_effects_then_ends() {
        let mut fixture = Fixture::new();
        fixture.manager.register_tree(
            DialogueTree::new("t", "elder", "n")
                .with_node(DialogueNode::new("n", "dlg.n").with_response(
                    DialogueResponse::new("go", "dlg.go", "last"),
                ))
                .with_node(
                    DialogueNode::new("last", "dlg.last").with_effect("flag.set.saw_farewell"),
                ),
        );
        fixture
            .manager
            .register_npc(elder().with_dialog(NpcDialogEntry::new("t", 0)));

        fixture.start("elder").expect("start");
        fixture.choose(0).expect("choose");
        // The terminal node's effects ran, then the session closed.
        assert!(fixture.state.flag("saw_farewell"));
        assert!(!fixture.manager.is_active());
    }

    #[test]
    fn test_response_effects_run_before_destination_effects() {
        let mut fixture = Fixture::new();
        fixture.manager.register_tree(
            DialogueTree::new("t", "elder", "n")
                .with_node(DialogueNode::new("n", "dlg.n").with_response(
                    DialogueResponse::new("pay", "dlg.pay", "after")
                        .with_effect("item.give.coin_pouch"),
                ))
                .with_node(
                    DialogueNode::new("after", "dlg.after")
                        .with_effect("item.remove.coin_pouch")
                        .with_response(DialogueResponse::end("bye", "dlg.bye")),
                ),
        );
        fixture
            .manager
            .register_npc(elder().with_dialog(NpcDialogEntry::new("t", 0)));

        fixture.start("elder").expect("start");
        fixture.choose(0).expect("choose");
        // give then remove leaves nothing.
        assert_eq!(fixture.state.item_count(&ItemId::new("coin_pouch")), 0);
        assert!(fixture.manager.is_active());
    }

    #[test]
    fn test_response_chosen_feeds_quest_objective() {
        let mut fixture = Fixture::new();
        fixture.quests.register(
            QuestTemplate::new(QuestId::new("errand"), "quest.errand.name", "turn_in")
                .with_node(QuestNode::new("turn_in", "quest.errand.turn_in").with_objective(
                    QuestObjective::choose_response("accept_reward"),
                )),
        );
        {
            let events = EventBus::default();
            fixture
                .quests
                .start_quest(&QuestId::new("errand"), &events)
                .expect("start quest");
        }

        fixture.manager.register_tree(
            DialogueTree::new("t", "elder", "n").with_node(
                DialogueNode::new("n", "dlg.n").with_response(DialogueResponse::end(
                    "accept_reward",
                    "dlg.accept",
                )),
            ),
        );
        fixture
            .manager
            .register_npc(elder().with_dialog(NpcDialogEntry::new("t", 0)));

        fixture.start("elder").expect("start");
        fixture.choose(0).expect("choose");
        assert!(fixture.quests.is_completed(&QuestId::new("errand")));
    }

    #[test]
    fn test_starting_dialogue_counts_as_talking() {
        let mut fixture = Fixture::new();
        fixture.quests.register(
            QuestTemplate::new(QuestId::new("visit"), "quest.visit.name", "talk").with_node(
                QuestNode::new("talk", "quest.visit.talk")
                    .with_objective(QuestObjective::talk_to(NpcId::new("elder"))),
            ),
        );
        {
            let events = EventBus::default();
            fixture
                .quests
                .start_quest(&QuestId::new("visit"), &events)
                .expect("start quest");
        }
        fixture.manager.register_tree(greeting_tree());
        fixture.manager.register_npc(elder());

        fixture.start("elder").expect("start");
        assert!(fixture.quests.is_completed(&QuestId::new("visit")));
    }

    #[test]
    fn test_command_node_resumes_tree_after_completion() {
        let mut fixture = Fixture::new();
        fixture.manager.register_tree(
            DialogueTree::new("t", "elder", "cmd")
                .with_node(DialogueNode::new("cmd", "dlg.cmd").with_command(
                    CutsceneCommand::SetFlag {
                        flag: "gate_open".to_owned(),
                        value: true,
                    },
                    false,
                    NextNode::Node(NodeId::new("after")),
                ))
                .with_node(
                    DialogueNode::new("after", "dlg.after")
                        .with_response(DialogueResponse::end("bye", "dlg.bye")),
                ),
        );
        fixture
            .manager
            .register_npc(elder().with_dialog(NpcDialogEntry::new("t", 0)));

        fixture.start("elder").expect("start");
        // The command has not executed yet; the next tick drives it.
        assert!(!fixture.state.flag("gate_open"));

        let mut host = MockCutsceneHost::default();
        {
            let mut ctx = ctx!(fixture);
            fixture.manager.update(0.016, &mut host, &mut ctx);
        }
        assert!(fixture.state.flag("gate_open"));
        let session = fixture.manager.session().expect("active");
        assert_eq!(session.current(), Some(&NodeId::new("after")));
    }

    #[test]
    fn test_timed_command_node_polls_until_done() {
        let mut fixture = Fixture::new();
        fixture.manager.register_tree(
            DialogueTree::new("t", "elder", "cmd")
                .with_node(DialogueNode::new("cmd", "dlg.cmd").with_command(
                    CutsceneCommand::Wait { duration: 1.0 },
                    true,
                    NextNode::Node(NodeId::new("after")),
                ))
                .with_node(
                    DialogueNode::new("after", "dlg.after")
                        .with_response(DialogueResponse::end("bye", "dlg.bye")),
                ),
        );
        fixture
            .manager
            .register_npc(elder().with_dialog(NpcDialogEntry::new("t", 0)));

        fixture.start("elder").expect("start");
        let mut host = MockCutsceneHost::default();
        // First tick hands the command to the runner; the wait elapses
        // over the following ticks.
        for _ in 0..4 {
            let mut ctx = ctx!(fixture);
            fixture.manager.update(0.4, &mut host, &mut ctx);
        }
        let session = fixture.manager.session().expect("active");
        assert_eq!(session.current(), Some(&NodeId::new("after")));
    }

    #[test]
    fn test_command_node_with_end_resume_closes_session() {
        let mut fixture = Fixture::new();
        fixture.manager.register_tree(
            DialogueTree::new("t", "elder", "cmd").with_node(
                DialogueNode::new("cmd", "dlg.cmd").with_command(
                    CutsceneCommand::PlaySound {
                        sound: "bell".to_owned(),
                        volume: 1.0,
                    },
                    false,
                    NextNode::End,
                ),
            ),
        );
        fixture
            .manager
            .register_npc(elder().with_dialog(NpcDialogEntry::new("t", 0)));

        fixture.start("elder").expect("start");
        let mut host = MockCutsceneHost::default();
        {
            let mut ctx = ctx!(fixture);
            fixture.manager.update(0.016, &mut host, &mut ctx);
        }
        assert!(!fixture.manager.is_active());
        assert_eq!(host.sounds.len(), 1);
    }

    #[test]
    fn test_end_dialogue_cancels_pending_cutscene() {
        let mut fixture = Fixture::new();
        fixture.manager.register_tree(
            DialogueTree::new("t", "elder", "cmd")
                .with_node(DialogueNode::new("cmd", "dlg.cmd").with_command(
                    CutsceneCommand::Wait { duration: 60.0 },
                    true,
                    NextNode::Node(NodeId::new("after")),
                ))
                .with_node(DialogueNode::new("after", "dlg.after")),
        );
        fixture
            .manager
            .register_npc(elder().with_dialog(NpcDialogEntry::new("t", 0)));

        fixture.start("elder").expect("start");
        let mut host = MockCutsceneHost::default();
        {
            let mut ctx = ctx!(fixture);
            fixture.manager.update(0.016, &mut host, &mut ctx);
        }
        {
            let mut ctx = ctx!(fixture);
            fixture.manager.end_dialogue(&mut ctx);
        }
        assert!(!fixture.manager.is_active());

        // Later ticks do nothing: the command was abandoned.
        fixture.events.drain();
        {
            let mut ctx = ctx!(fixture);
            fixture.manager.update(120.0, &mut host, &mut ctx);
        }
        assert!(fixture.events.drain().is_empty());
    }
}
