//! NPC definitions and dialogue-tree selection.
//!
//! An NPC definition is content, not a live entity: its name key,
//! portrait, an optional item gate, and a priority-ordered list of
//! conditional dialogue-tree entries. Selection walks the entries in
//! ascending priority order and picks the first whose conditions all
//! pass; a runtime override in
//! [`WorldState`](crate::world_state::WorldState) beats the list
//! entirely (see [`DialogueManager`](crate::dialogue::DialogueManager)).

use ashvale_common::{ItemId, NpcId, TreeId};
use serde::{Deserialize, Serialize};

use crate::condition::ConditionEvaluator;
use crate::context::ScriptContext;

/// One conditional dialogue-tree entry of an NPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcDialogEntry {
    /// Tree used when this entry is selected.
    pub tree: TreeId,
    /// Selection order; lower numbers are tried first.
    pub priority: i32,
    /// Conditions that must all pass for this entry to be selected.
    pub conditions: Vec<String>,
}

impl NpcDialogEntry {
    /// Creates an unconditional entry.
    #[must_use]
    pub fn new(tree: impl Into<TreeId>, priority: i32) -> Self {
        Self {
            tree: tree.into(),
            priority,
            conditions: Vec::new(),
        }
    }

    /// Adds a condition string.
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }
}

/// Content definition of an NPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcDefinition {
    /// NPC identifier.
    pub id: NpcId,
    /// Localization key of the display name.
    pub name_key: String,
    /// Portrait shown when no node overrides it.
    pub default_portrait: Option<String>,
    /// Item the player must hold before this NPC will talk.
    pub requires_item: Option<ItemId>,
    /// Localization key of the refusal line shown when the item gate
    /// fails.
    pub refuse_dialog_key: Option<String>,
    /// Conditional dialogue-tree entries.
    pub dialogs: Vec<NpcDialogEntry>,
}

impl NpcDefinition {
    /// Creates a definition with no dialogue entries.
    #[must_use]
    pub fn new(id: impl Into<NpcId>, name_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name_key: name_key.into(),
            default_portrait: None,
            requires_item: None,
            refuse_dialog_key: None,
            dialogs: Vec::new(),
        }
    }

    /// Sets the default portrait.
    #[must_use]
    pub fn with_portrait(mut self, portrait: impl Into<String>) -> Self {
        self.default_portrait = Some(portrait.into());
        self
    }

    /// Gates conversation behind an item.
    #[must_use]
    pub fn requiring_item(mut self, item: ItemId) -> Self {
        self.requires_item = Some(item);
        self
    }

    /// Sets the refusal line key for the item gate.
    #[must_use]
    pub fn with_refuse_dialog(mut self, key: impl Into<String>) -> Self {
        self.refuse_dialog_key = Some(key.into());
        self
    }

    /// Adds a dialogue-tree entry.
    #[must_use]
    pub fn with_dialog(mut self, entry: NpcDialogEntry) -> Self {
        self.dialogs.push(entry);
        self
    }

    /// Selects the dialogue tree to use: entries are tried in ascending
    /// priority order (declaration order breaks ties) and the first one
    /// whose conditions all pass wins.
    pub fn select_tree(
        &self,
        conditions: &mut ConditionEvaluator,
        ctx: &ScriptContext<'_>,
    ) -> Option<&TreeId> {
        let mut entries: Vec<&NpcDialogEntry> = self.dialogs.iter().collect();
        entries.sort_by_key(|entry| entry.priority);
        entries
            .into_iter()
            .find(|entry| conditions.evaluate_all(&entry.conditions, ctx))
            .map(|entry| &entry.tree)
    }
}
