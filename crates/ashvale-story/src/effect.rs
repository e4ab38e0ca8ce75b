//! Imperative effect mini-language.
//!
//! Effects are the side-effecting counterpart of the condition
//! language: dot-segmented `category.verb.args` strings attached to
//! dialogue nodes and responses (`"quest.start.main_quest"`,
//! `"item.give.gem.3"`, `"flag.set.met_elder"`). Like conditions they
//! parse once into an [`Effect`] AST and the [`EffectExecutor`] caches
//! parses keyed by the raw string.
//!
//! Execution never panics on bad content: a string that fails to parse
//! logs a warning and does nothing, and a quest verb refused by the
//! quest manager (unknown id, unmet prerequisites) is logged and
//! dropped.

use ahash::AHashMap;
use ashvale_common::{ItemId, NpcId, QuestId, RoomId, TreeId};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::ScriptContext;
use crate::events::StoryEvent;
use crate::script::{parse_number, ScriptError, ScriptResult};

/// A parsed effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Start a quest.
    StartQuest {
        /// Quest to start.
        quest: QuestId,
    },
    /// Complete an active quest regardless of remaining objectives.
    CompleteQuest {
        /// Quest to complete.
        quest: QuestId,
    },
    /// Fail an active quest.
    FailQuest {
        /// Quest to fail.
        quest: QuestId,
    },
    /// Give items to the player.
    GiveItem {
        /// Item to give.
        item: ItemId,
        /// How many.
        count: u32,
    },
    /// Remove items from the player.
    RemoveItem {
        /// Item to remove.
        item: ItemId,
        /// How many.
        count: u32,
    },
    /// Heal the player.
    Heal {
        /// Amount of health restored.
        amount: u32,
    },
    /// Damage the player.
    Damage {
        /// Amount of health removed.
        amount: u32,
    },
    /// Grant experience.
    GrantXp {
        /// Amount of experience.
        amount: u64,
    },
    /// Set a flag.
    SetFlag {
        /// Flag name (may itself contain dots).
        name: String,
    },
    /// Unset a flag.
    UnsetFlag {
        /// Flag name.
        name: String,
    },
    /// Unlock a door.
    UnlockDoor {
        /// Door id.
        door: String,
    },
    /// Lock a door.
    LockDoor {
        /// Door id.
        door: String,
    },
    /// Move the player to another room.
    Travel {
        /// Destination room.
        room: RoomId,
    },
    /// Spawn an NPC into the world.
    SpawnNpc {
        /// NPC to spawn.
        npc: NpcId,
    },
    /// Remove an NPC from the world.
    DespawnNpc {
        /// NPC to despawn.
        npc: NpcId,
    },
    /// Override which dialogue tree an NPC uses.
    SetNpcTree {
        /// NPC whose tree changes.
        npc: NpcId,
        /// Tree to use from now on.
        tree: TreeId,
    },
}

impl Effect {
    /// Parses a raw effect string into its AST.
    pub fn parse(raw: &str) -> ScriptResult<Self> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(ScriptError::malformed(raw, "empty effect"));
        }
        let mut segments = s.splitn(3, '.');
        let category = segments.next().unwrap_or_default();
        let verb = segments
            .next()
            .ok_or_else(|| ScriptError::malformed(raw, "missing verb"))?;
        let args = segments.next();

        let arg = |reason| args.ok_or_else(|| ScriptError::malformed(raw, reason));

        match category {
            "quest" => {
                let quest = QuestId::new(arg("missing quest id")?);
                match verb {
                    "start" => Ok(Self::StartQuest { quest }),
                    "complete" => Ok(Self::CompleteQuest { quest }),
                    "fail" => Ok(Self::FailQuest { quest }),
                    _ => Err(ScriptError::malformed(raw, "unknown quest verb")),
                }
            }
            "item" => {
                let args = arg("missing item id")?;
                // Optional trailing count: `item.give.<id>.<count>`.
                let (item, count) = match args.rsplit_once('.') {
                    Some((item, count)) if count.chars().all(|c| c.is_ascii_digit()) => {
                        let count = u32::try_from(parse_number(raw, count)?)
                            .map_err(|_| ScriptError::BadNumber(raw.to_owned()))?;
                        (ItemId::new(item), count)
                    }
                    _ => (ItemId::new(args), 1),
                };
                match verb {
                    "give" => Ok(Self::GiveItem { item, count }),
                    "remove" => Ok(Self::RemoveItem { item, count }),
                    _ => Err(ScriptError::malformed(raw, "unknown item verb")),
                }
            }
            "player" => {
                let amount = parse_number(raw, arg("missing amount")?)?;
                let clamped = u32::try_from(amount)
                    .map_err(|_| ScriptError::BadNumber(raw.to_owned()))?;
                match verb {
                    "heal" => Ok(Self::Heal { amount: clamped }),
                    "damage" => Ok(Self::Damage { amount: clamped }),
                    "xp" => Ok(Self::GrantXp {
                        amount: u64::from(clamped),
                    }),
                    _ => Err(ScriptError::malformed(raw, "unknown player verb")),
                }
            }
            "flag" => {
                let name = arg("missing flag name")?.to_owned();
                match verb {
                    "set" => Ok(Self::SetFlag { name }),
                    "unset" => Ok(Self::UnsetFlag { name }),
                    _ => Err(ScriptError::malformed(raw, "unknown flag verb")),
                }
            }
            "door" => {
                let door = arg("missing door id")?.to_owned();
                match verb {
                    "unlock" => Ok(Self::UnlockDoor { door }),
                    "lock" => Ok(Self::LockDoor { door }),
                    _ => Err(ScriptError::malformed(raw, "unknown door verb")),
                }
            }
            "room" => match verb {
                "travel" => Ok(Self::Travel {
                    room: RoomId::new(arg("missing room id")?),
                }),
                _ => Err(ScriptError::malformed(raw, "unknown room verb")),
            },
            "npc" => {
                let npc = NpcId::new(arg("missing npc id")?);
                match verb {
                    "spawn" => Ok(Self::SpawnNpc { npc }),
                    "despawn" => Ok(Self::DespawnNpc { npc }),
                    _ => Err(ScriptError::malformed(raw, "unknown npc verb")),
                }
            }
            "dialog" => match verb {
                "set_tree" => {
                    let args = arg("missing npc and tree ids")?;
                    let (npc, tree) = args
                        .split_once('.')
                        .ok_or_else(|| ScriptError::malformed(raw, "expected <npc>.<tree>"))?;
                    Ok(Self::SetNpcTree {
                        npc: NpcId::new(npc),
                        tree: TreeId::new(tree),
                    })
                }
                _ => Err(ScriptError::malformed(raw, "unknown dialog verb")),
            },
            _ => Err(ScriptError::UnknownCategory(raw.to_owned())),
        }
    }

    /// Executes the effect against the world.
    pub fn execute(&self, ctx: &mut ScriptContext<'_>) {
        match self {
            Self::StartQuest { quest } => {
                if let Err(error) = ctx.quests.start_quest(quest, ctx.events) {
                    warn!(quest = %quest, %error, "quest start refused");
                }
            }
            Self::CompleteQuest { quest } => {
                if let Err(error) = ctx.quests.complete_quest(quest, ctx.events) {
                    warn!(quest = %quest, %error, "quest completion refused");
                }
            }
            Self::FailQuest { quest } => {
                if let Err(error) = ctx.quests.fail_quest(quest, ctx.events) {
                    warn!(quest = %quest, %error, "quest failure refused");
                }
            }
            Self::GiveItem { item, count } => {
                ctx.state.give_item(item, *count);
                ctx.quests.on_item_collected(item, *count, ctx.events);
                ctx.events.publish(StoryEvent::ItemGranted {
                    item: item.clone(),
                    count: *count,
                });
            }
            Self::RemoveItem { item, count } => ctx.state.remove_item(item, *count),
            Self::Heal { amount } => ctx.player.heal(*amount),
            Self::Damage { amount } => ctx.player.damage(*amount),
            Self::GrantXp { amount } => ctx.player.add_xp(*amount),
            Self::SetFlag { name } => {
                ctx.state.set_flag(name.clone(), true);
                ctx.events.publish(StoryEvent::FlagChanged {
                    flag: name.clone(),
                    value: true,
                });
            }
            Self::UnsetFlag { name } => {
                ctx.state.set_flag(name.clone(), false);
                ctx.events.publish(StoryEvent::FlagChanged {
                    flag: name.clone(),
                    value: false,
                });
            }
            Self::UnlockDoor { door } => ctx.state.unlock_door(door),
            Self::LockDoor { door } => ctx.state.lock_door(door),
            Self::Travel { room } => {
                ctx.state.set_current_room(room.clone());
                ctx.quests.on_room_entered(room, ctx.events);
                ctx.events
                    .publish(StoryEvent::RoomChanged { room: room.clone() });
            }
            Self::SpawnNpc { npc } => ctx.state.spawn_npc(npc),
            Self::DespawnNpc { npc } => ctx.state.despawn_npc(npc),
            Self::SetNpcTree { npc, tree } => {
                ctx.state.set_npc_tree(npc.clone(), tree.clone());
            }
        }
    }
}

/// Executes raw effect strings, caching parses.
#[derive(Debug, Default)]
pub struct EffectExecutor {
    /// Parse cache keyed by the raw string. `None` marks a string that
    /// failed to parse, so it is only warned about once.
    cache: AHashMap<String, Option<Effect>>,
}

impl EffectExecutor {
    /// Creates an executor with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Executes one raw effect string. Unparsable strings are no-ops.
    pub fn execute(&mut self, raw: &str, ctx: &mut ScriptContext<'_>) {
        if !self.cache.contains_key(raw) {
            let parsed = match Effect::parse(raw) {
                Ok(effect) => Some(effect),
                Err(error) => {
                    warn!(effect = raw, %error, "effect failed to parse, skipping");
                    None
                }
            };
            self.cache.insert(raw.to_owned(), parsed);
        }
        if let Some(Some(effect)) = self.cache.get(raw) {
            effect.execute(ctx);
        }
    }

    /// Executes a list of raw effect strings in order.
    pub fn execute_all(&mut self, effects: &[String], ctx: &mut ScriptContext<'_>) {
        for raw in effects {
            self.execute(raw, ctx);
        }
    }
}
