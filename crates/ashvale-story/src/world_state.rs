//! Central mutable world-state bookkeeping.
//!
//! `WorldState` is the single source of truth for the world facts the
//! script languages observe and mutate: item counts, boolean flags, the
//! current room, per-NPC dialogue-tree overrides and the day/night flag.
//! All mutation goes through named setters; no other component writes
//! these maps directly. Quest state is owned by
//! [`QuestManager`](crate::quest::QuestManager), not here.

use ashvale_common::{ItemId, NpcId, RoomId, TreeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mutable world-state store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldState {
    /// Simplified item ledger used by the script layer, independent of
    /// the host's equipment inventory.
    items: HashMap<ItemId, u32>,
    /// Boolean world facts. Absence means `false`.
    flags: HashMap<String, bool>,
    /// Room the player is currently in.
    current_room: RoomId,
    /// Runtime overrides of which dialogue tree an NPC uses.
    npc_trees: HashMap<NpcId, TreeId>,
    /// Whether it is currently daytime.
    is_day: bool,
}

fn door_flag(door: &str) -> String {
    format!("door.{door}.unlocked")
}

fn npc_flag(npc: &NpcId) -> String {
    format!("npc.{npc}.spawned")
}

impl WorldState {
    /// Creates an empty world state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            is_day: true,
            ..Self::default()
        }
    }

    /// Creates a world state starting in the given room.
    #[must_use]
    pub fn starting_in(room: impl Into<RoomId>) -> Self {
        Self {
            current_room: room.into(),
            ..Self::new()
        }
    }

    // === Items ===

    /// Adds `count` of an item.
    pub fn give_item(&mut self, item: &ItemId, count: u32) {
        *self.items.entry(item.clone()).or_insert(0) += count;
    }

    /// Removes up to `count` of an item. Removing more than is held
    /// clears the entry.
    pub fn remove_item(&mut self, item: &ItemId, count: u32) {
        if let Some(held) = self.items.get_mut(item.as_str()) {
            *held = held.saturating_sub(count);
            if *held == 0 {
                self.items.remove(item.as_str());
            }
        }
    }

    /// How many of an item are held. Unknown items count zero.
    #[must_use]
    pub fn item_count(&self, item: &ItemId) -> u32 {
        self.items.get(item.as_str()).copied().unwrap_or(0)
    }

    /// Whether at least one of the item is held.
    #[must_use]
    pub fn has_item(&self, item: &ItemId) -> bool {
        self.item_count(item) > 0
    }

    // === Flags ===

    /// Sets a flag to a value.
    pub fn set_flag(&mut self, name: impl Into<String>, value: bool) {
        self.flags.insert(name.into(), value);
    }

    /// Removes a flag (equivalent to setting it false).
    pub fn clear_flag(&mut self, name: &str) {
        self.flags.remove(name);
    }

    /// Reads a flag. Unset flags are `false`.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    // === Doors (stored as flags) ===

    /// Marks a door as unlocked.
    pub fn unlock_door(&mut self, door: &str) {
        self.set_flag(door_flag(door), true);
    }

    /// Marks a door as locked.
    pub fn lock_door(&mut self, door: &str) {
        self.set_flag(door_flag(door), false);
    }

    /// Whether a door has been unlocked.
    #[must_use]
    pub fn is_door_unlocked(&self, door: &str) -> bool {
        self.flag(&door_flag(door))
    }

    // === NPC spawn state (stored as flags) ===

    /// Marks an NPC as spawned into the world.
    pub fn spawn_npc(&mut self, npc: &NpcId) {
        self.set_flag(npc_flag(npc), true);
    }

    /// Marks an NPC as removed from the world.
    pub fn despawn_npc(&mut self, npc: &NpcId) {
        self.set_flag(npc_flag(npc), false);
    }

    /// Whether an NPC is currently spawned.
    #[must_use]
    pub fn is_npc_spawned(&self, npc: &NpcId) -> bool {
        self.flag(&npc_flag(npc))
    }

    // === Room ===

    /// Moves the player to another room.
    pub fn set_current_room(&mut self, room: RoomId) {
        self.current_room = room;
    }

    /// Room the player is currently in.
    #[must_use]
    pub const fn current_room(&self) -> &RoomId {
        &self.current_room
    }

    // === Dialogue-tree overrides ===

    /// Overrides which dialogue tree an NPC uses from now on.
    pub fn set_npc_tree(&mut self, npc: NpcId, tree: TreeId) {
        self.npc_trees.insert(npc, tree);
    }

    /// Removes an NPC's tree override, restoring static selection.
    pub fn clear_npc_tree(&mut self, npc: &NpcId) {
        self.npc_trees.remove(npc.as_str());
    }

    /// The tree override for an NPC, if one is set.
    #[must_use]
    pub fn npc_tree(&self, npc: &NpcId) -> Option<&TreeId> {
        self.npc_trees.get(npc.as_str())
    }

    // === Day/night ===

    /// Sets the day/night flag (synced from the game clock by the host).
    pub fn set_day(&mut self, is_day: bool) {
        self.is_day = is_day;
    }

    /// Whether it is currently daytime.
    #[must_use]
    pub const fn is_day(&self) -> bool {
        self.is_day
    }
}
