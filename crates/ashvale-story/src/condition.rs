//! Boolean condition mini-language.
//!
//! Conditions arrive as dot-segmented strings in content files
//! (`"quest.main_quest.completed"`, `"item.has.gem>=5"`,
//! `"!flag.met_elder"`) and gate dialogue responses and NPC tree
//! selection. Strings parse once into a [`Condition`] AST; the
//! [`ConditionEvaluator`] caches parses keyed by the raw string so
//! content evaluated every frame is never re-split.
//!
//! Grammar, outermost first:
//! - `!rest` negates the remainder.
//! - The first `&&` or `||` found in the string splits it in two; there
//!   is no precedence and no grouping, the right side is parsed the
//!   same way recursively.
//! - Anything else is a single `category.args` check.
//!
//! Unknown categories are parse errors, caught by content validation at
//! load time. A raw string that still fails at runtime evaluates to
//! `false` with a warning rather than ending the session.

use ahash::AHashMap;
use ashvale_common::{ItemId, NodeId, QuestId, RoomId};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::ScriptContext;
use crate::player::PlayerStat;
use crate::quest::QuestStatus;
use crate::script::{parse_number, CmpOp, ScriptError, ScriptResult};

/// Quest checks expressible as `quest.<id>.<test>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestTest {
    /// Quest is currently active.
    Active,
    /// Quest has been completed.
    Completed,
    /// Quest has never been started.
    NotStarted,
    /// Quest could be started right now.
    CanAccept,
    /// Quest is active and sitting on the given node.
    OnNode(NodeId),
}

/// A parsed condition expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// Negation of the inner condition.
    Not(Box<Condition>),
    /// Both sides must hold.
    And(Box<Condition>, Box<Condition>),
    /// Either side must hold.
    Or(Box<Condition>, Box<Condition>),
    /// Quest status check.
    Quest {
        /// Quest to check.
        quest: QuestId,
        /// Which status to test for.
        test: QuestTest,
    },
    /// Player owns at least one of the item.
    HasItem {
        /// Item to check.
        item: ItemId,
    },
    /// Item count comparison.
    ItemCount {
        /// Item to count.
        item: ItemId,
        /// Comparison operator.
        op: CmpOp,
        /// Count to compare against.
        count: i64,
    },
    /// Player stat comparison.
    Stat {
        /// Stat to read.
        stat: PlayerStat,
        /// Comparison operator.
        op: CmpOp,
        /// Value to compare against.
        value: i64,
    },
    /// World flag is set.
    Flag {
        /// Flag name (may itself contain dots).
        name: String,
    },
    /// Player is in the given room.
    InRoom {
        /// Room to compare against.
        room: RoomId,
    },
    /// Day/night check; `day == true` means daytime.
    TimeIs {
        /// Expected day/night state.
        day: bool,
    },
}

impl Condition {
    /// Parses a raw condition string into its AST.
    pub fn parse(raw: &str) -> ScriptResult<Self> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(ScriptError::malformed(raw, "empty condition"));
        }
        if let Some(rest) = s.strip_prefix('!') {
            return Ok(Self::Not(Box::new(Self::parse(rest)?)));
        }

        // Flat split on whichever binary operator appears first; the
        // right side re-parses recursively, so chains associate right.
        let and_at = s.find("&&");
        let or_at = s.find("||");
        match (and_at, or_at) {
            (Some(a), Some(o)) if a < o => return Self::parse_binary(s, a, true),
            (Some(_), Some(o)) => return Self::parse_binary(s, o, false),
            (Some(a), None) => return Self::parse_binary(s, a, true),
            (None, Some(o)) => return Self::parse_binary(s, o, false),
            (None, None) => {}
        }

        Self::parse_atom(raw, s)
    }

    fn parse_binary(s: &str, at: usize, is_and: bool) -> ScriptResult<Self> {
        let left = Box::new(Self::parse(&s[..at])?);
        let right = Box::new(Self::parse(&s[at + 2..])?);
        Ok(if is_and {
            Self::And(left, right)
        } else {
            Self::Or(left, right)
        })
    }

    fn parse_atom(raw: &str, s: &str) -> ScriptResult<Self> {
        let (category, rest) = match s.split_once('.') {
            Some((category, rest)) => (category, rest),
            None => return Err(ScriptError::UnknownCategory(raw.to_owned())),
        };

        match category {
            "quest" => {
                let (quest, test) = rest
                    .rsplit_once('.')
                    .ok_or_else(|| ScriptError::malformed(raw, "expected quest.<id>.<status>"))?;
                let test = match test {
                    "active" => QuestTest::Active,
                    "completed" => QuestTest::Completed,
                    "not_started" => QuestTest::NotStarted,
                    "can_accept" => QuestTest::CanAccept,
                    node if node.starts_with("node:") => {
                        QuestTest::OnNode(NodeId::new(&node["node:".len()..]))
                    }
                    _ => return Err(ScriptError::malformed(raw, "unknown quest status")),
                };
                Ok(Self::Quest {
                    quest: QuestId::new(quest),
                    test,
                })
            }
            "item" => {
                let token = rest
                    .strip_prefix("has.")
                    .ok_or_else(|| ScriptError::malformed(raw, "expected item.has.<id>"))?;
                match CmpOp::split(token) {
                    Some((item, op, count)) => Ok(Self::ItemCount {
                        item: ItemId::new(item),
                        op,
                        count: parse_number(raw, count)?,
                    }),
                    None if token.is_empty() => {
                        Err(ScriptError::malformed(raw, "missing item id"))
                    }
                    None => Ok(Self::HasItem {
                        item: ItemId::new(token),
                    }),
                }
            }
            "player" => {
                let (stat, op, value) = CmpOp::split(rest)
                    .ok_or_else(|| ScriptError::malformed(raw, "missing comparison operator"))?;
                let stat = PlayerStat::parse(stat)
                    .ok_or_else(|| ScriptError::malformed(raw, "unknown player stat"))?;
                Ok(Self::Stat {
                    stat,
                    op,
                    value: parse_number(raw, value)?,
                })
            }
            "flag" => Ok(Self::Flag {
                name: rest.to_owned(),
            }),
            "room" => {
                let room = rest
                    .strip_prefix("current.")
                    .ok_or_else(|| ScriptError::malformed(raw, "expected room.current.<id>"))?;
                Ok(Self::InRoom {
                    room: RoomId::new(room),
                })
            }
            "time" => match rest {
                "is_day" => Ok(Self::TimeIs { day: true }),
                "is_night" => Ok(Self::TimeIs { day: false }),
                _ => Err(ScriptError::malformed(raw, "expected time.is_day/is_night")),
            },
            _ => Err(ScriptError::UnknownCategory(raw.to_owned())),
        }
    }

    /// Evaluates the condition against the current world.
    #[must_use]
    pub fn evaluate(&self, ctx: &ScriptContext<'_>) -> bool {
        match self {
            Self::Not(inner) => !inner.evaluate(ctx),
            Self::And(left, right) => left.evaluate(ctx) && right.evaluate(ctx),
            Self::Or(left, right) => left.evaluate(ctx) || right.evaluate(ctx),
            Self::Quest { quest, test } => match test {
                QuestTest::Active => ctx.quests.is_active(quest),
                QuestTest::Completed => ctx.quests.is_completed(quest),
                QuestTest::NotStarted => ctx.quests.status(quest) == QuestStatus::NotStarted,
                QuestTest::CanAccept => ctx.quests.can_accept(quest),
                QuestTest::OnNode(node) => ctx.quests.is_on_node(quest, node),
            },
            Self::HasItem { item } => ctx.state.has_item(item),
            Self::ItemCount { item, op, count } => {
                op.compare(i64::from(ctx.state.item_count(item)), *count)
            }
            Self::Stat { stat, op, value } => op.compare(ctx.player.stat(*stat), *value),
            Self::Flag { name } => ctx.state.flag(name),
            Self::InRoom { room } => ctx.state.current_room() == room,
            Self::TimeIs { day } => ctx.state.is_day() == *day,
        }
    }
}

/// Evaluates raw condition strings, caching parses.
#[derive(Debug, Default)]
pub struct ConditionEvaluator {
    /// Parse cache keyed by the raw string. `None` marks a string that
    /// failed to parse, so it is only warned about once.
    cache: AHashMap<String, Option<Condition>>,
}

impl ConditionEvaluator {
    /// Creates an evaluator with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates one raw condition string.
    ///
    /// Unparsable strings evaluate to `false`.
    pub fn evaluate(&mut self, raw: &str, ctx: &ScriptContext<'_>) -> bool {
        if !self.cache.contains_key(raw) {
            let parsed = match Condition::parse(raw) {
                Ok(condition) => Some(condition),
                Err(error) => {
                    warn!(condition = raw, %error, "condition failed to parse, treating as false");
                    None
                }
            };
            self.cache.insert(raw.to_owned(), parsed);
        }
        match self.cache.get(raw) {
            Some(Some(condition)) => condition.evaluate(ctx),
            _ => false,
        }
    }

    /// Evaluates a whole condition list: true iff the list is empty or
    /// every entry evaluates true.
    pub fn evaluate_all(&mut self, conditions: &[String], ctx: &ScriptContext<'_>) -> bool {
        conditions.iter().all(|raw| self.evaluate(raw, ctx))
    }

    /// Number of distinct raw strings cached.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}
