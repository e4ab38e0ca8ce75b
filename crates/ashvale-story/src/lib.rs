//! # Ashvale Story
//!
//! Story systems for Ashvale: everything between "the player pressed
//! talk" and "the quest log changed".
//!
//! - Branching dialogue trees with conditional responses
//! - A dot-segmented condition/effect string language evaluated against
//!   world state
//! - Node-graph quests with objective tracking
//! - A cutscene command sequencer driven by dialogue command nodes
//! - World-state bookkeeping, localization, game clock and an event bus
//!
//! Rendering, input and audio live in the host engine; it talks to this
//! crate through [`DialogueManager`](dialogue::DialogueManager),
//! [`QuestManager`](quest::QuestManager), the
//! [`CutsceneHost`](cutscene::CutsceneHost) trait and the event bus.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod condition;
pub mod content;
pub mod context;
pub mod cutscene;
pub mod dialogue;
pub mod effect;
pub mod events;
pub mod localization;
pub mod npc;
pub mod player;
pub mod quest;
pub mod script;
pub mod time;
pub mod world_state;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::condition::*;
    pub use crate::content::*;
    pub use crate::context::*;
    pub use crate::cutscene::*;
    pub use crate::dialogue::*;
    pub use crate::effect::*;
    pub use crate::events::*;
    pub use crate::localization::*;
    pub use crate::npc::*;
    pub use crate::player::*;
    pub use crate::quest::*;
    pub use crate::script::*;
    pub use crate::time::*;
    pub use crate::world_state::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use ashvale_common::{ItemId, NpcId, QuestId, RoomId, TreeId};

    /// The full loop: load content, talk to an NPC, accept a quest
    /// through a response effect, satisfy it, and watch the elder's
    /// tree selection change.
    #[test]
    fn test_quest_through_dialogue_round_trip() {
        let trees = r#"{
            "dialogTrees": {
                "elder_offer": {
                    "npcId": "elder",
                    "startNode": "offer",
                    "nodes": {
                        "offer": {
                            "text": "dlg.elder.offer",
                            "responses": [
                                {
                                    "id": "accept_errand",
                                    "text": "dlg.elder.accept",
                                    "nextNode": "end",
                                    "effects": ["quest.start.errand"]
                                },
                                { "id": "decline", "text": "dlg.elder.decline", "nextNode": "end" }
                            ]
                        }
                    }
                },
                "elder_thanks": {
                    "npcId": "elder",
                    "startNode": "thanks",
                    "nodes": {
                        "thanks": {
                            "text": "dlg.elder.thanks",
                            "effects": ["item.give.reward_ring"],
                            "responses": [
                                { "id": "bye", "text": "dlg.elder.bye", "nextNode": "end" }
                            ]
                        }
                    }
                }
            }
        }"#;
        let npcs = r#"{
            "npcs": {
                "elder": {
                    "name": "npc.elder.name",
                    "dialogs": [
                        {
                            "treeId": "elder_thanks",
                            "priority": 1,
                            "conditions": ["quest.errand.completed"]
                        },
                        { "treeId": "elder_offer", "priority": 2 }
                    ]
                }
            }
        }"#;

        let mut player = Player::new();
        let mut state = WorldState::starting_in(RoomId::new("village"));
        let mut quests = QuestManager::new();
        let events = EventBus::default();
        let mut manager = DialogueManager::new();

        assert_eq!(manager.load_trees(trees).expect("trees"), 2);
        assert_eq!(manager.load_npcs(npcs).expect("npcs"), 1);

        quests.register(
            QuestTemplate::new(QuestId::new("errand"), "quest.errand.name", "gather")
                .with_node(
                    QuestNode::new("gather", "quest.errand.gather")
                        .with_objective(QuestObjective::collect(ItemId::new("herb"), 2)),
                ),
        );

        let elder = NpcId::new("elder");

        // First visit: the completion-gated tree fails its condition,
        // the offer tree wins.
        {
            let mut ctx = ScriptContext::new(&mut player, &mut state, &mut quests, &events);
            manager.start_dialogue(&elder, &mut ctx).expect("start");
        }
        assert_eq!(
            manager.session().map(|s| s.tree_id().as_str()),
            Some("elder_offer")
        );

        // Accepting starts the quest and ends the dialogue.
        {
            let mut ctx = ScriptContext::new(&mut player, &mut state, &mut quests, &events);
            let available = manager.available_responses(&ctx);
            assert_eq!(available.len(), 2);
        }
        {
            let mut ctx = ScriptContext::new(&mut player, &mut state, &mut quests, &events);
            manager.choose_response(0, &mut ctx).expect("accept");
        }
        assert!(!manager.is_active());
        assert!(quests.is_active(&QuestId::new("errand")));

        // Gathering the herbs completes the quest.
        state.give_item(&ItemId::new("herb"), 2);
        quests.on_item_collected(&ItemId::new("herb"), 2, &events);
        assert!(quests.is_completed(&QuestId::new("errand")));

        // Second visit: the priority-1 tree now passes and its start
        // node effects run before any UI read.
        {
            let mut ctx = ScriptContext::new(&mut player, &mut state, &mut quests, &events);
            manager.start_dialogue(&elder, &mut ctx).expect("start");
        }
        assert_eq!(
            manager.session().map(|s| s.tree_id().as_str()),
            Some("elder_thanks")
        );
        assert!(state.has_item(&ItemId::new("reward_ring")));

        let drained = events.drain();
        assert!(drained.contains(&StoryEvent::QuestStarted {
            quest: QuestId::new("errand")
        }));
        assert!(drained.contains(&StoryEvent::QuestCompleted {
            quest: QuestId::new("errand")
        }));
    }

    /// A runtime tree override set by an effect sticks for later talks.
    #[test]
    fn test_effect_retargets_npc_tree() {
        let mut player = Player::new();
        let mut state = WorldState::new();
        let mut quests = QuestManager::new();
        let events = EventBus::default();
        let mut manager = DialogueManager::new();

        manager.register_tree(
            DialogueTree::new("smith_intro", "smith", "hi").with_node(
                DialogueNode::new("hi", "dlg.smith.hi").with_response(
                    DialogueResponse::end("insult", "dlg.smith.insult")
                        .with_effect("dialog.set_tree.smith.smith_grudge"),
                ),
            ),
        );
        manager.register_tree(
            DialogueTree::new("smith_grudge", "smith", "hmph").with_node(
                DialogueNode::new("hmph", "dlg.smith.hmph")
                    .with_response(DialogueResponse::end("bye", "dlg.smith.bye")),
            ),
        );
        manager.register_npc(
            NpcDefinition::new("smith", "npc.smith.name")
                .with_dialog(NpcDialogEntry::new("smith_intro", 1)),
        );

        let smith = NpcId::new("smith");
        {
            let mut ctx = ScriptContext::new(&mut player, &mut state, &mut quests, &events);
            manager.start_dialogue(&smith, &mut ctx).expect("start");
            manager.choose_response(0, &mut ctx).expect("insult");
        }
        assert_eq!(
            state.npc_tree(&smith).map(TreeId::as_str),
            Some("smith_grudge")
        );

        {
            let mut ctx = ScriptContext::new(&mut player, &mut state, &mut quests, &events);
            manager.start_dialogue(&smith, &mut ctx).expect("start");
        }
        assert_eq!(
            manager.session().map(|s| s.tree_id().as_str()),
            Some("smith_grudge")
        );
    }

    /// The game clock drives `time.*` conditions through world state.
    #[test]
    fn test_clock_feeds_time_conditions() {
        let mut player = Player::new();
        let mut state = WorldState::new();
        let mut quests = QuestManager::new();
        let events = EventBus::default();
        let mut evaluator = ConditionEvaluator::new();

        let mut clock = GameTime::with_time(12, 0, 0);
        state.set_day(clock.is_day());
        {
            let ctx = ScriptContext::new(&mut player, &mut state, &mut quests, &events);
            assert!(evaluator.evaluate("time.is_day", &ctx));
        }

        // Run the clock into the night and sync.
        clock.advance(8.0 * 60.0);
        state.set_day(clock.is_day());
        {
            let ctx = ScriptContext::new(&mut player, &mut state, &mut quests, &events);
            assert!(evaluator.evaluate("time.is_night", &ctx));
        }
    }
}
