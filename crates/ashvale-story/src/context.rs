//! Borrowed world context handed to the script layer.

use crate::events::EventBus;
use crate::player::Player;
use crate::quest::QuestManager;
use crate::world_state::WorldState;

/// Everything a condition can read and an effect can mutate, borrowed
/// from the owning game session for the duration of one call.
///
/// Conditions take `&ScriptContext`, effects take `&mut ScriptContext`;
/// both run synchronously inside the frame that triggered them.
#[derive(Debug)]
pub struct ScriptContext<'a> {
    /// Player stat sheet.
    pub player: &'a mut Player,
    /// Mutable world bookkeeping (items, flags, room, overrides).
    pub state: &'a mut WorldState,
    /// Authoritative quest state.
    pub quests: &'a mut QuestManager,
    /// Bus for UI-observable notifications.
    pub events: &'a EventBus,
}

impl<'a> ScriptContext<'a> {
    /// Bundles the borrowed collaborators into a context.
    pub fn new(
        player: &'a mut Player,
        state: &'a mut WorldState,
        quests: &'a mut QuestManager,
        events: &'a EventBus,
    ) -> Self {
        Self {
            player,
            state,
            quests,
            events,
        }
    }
}
