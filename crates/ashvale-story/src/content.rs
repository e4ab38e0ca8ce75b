//! Content document loading and load-time validation.
//!
//! Two JSON documents feed the dialogue system: the dialogue-tree
//! document (`dialogTrees`) and the NPC-definition document (`npcs`).
//! Parsing is defensive: missing properties keep their defaults. What
//! parsing cannot excuse, validation catches: dangling node references,
//! unparsable condition/effect strings and unknown command actions are
//! authoring bugs, reported here with a warning, and the offending tree
//! or NPC is skipped so the rest of the document still loads. A
//! malformed document is an error and loads nothing.

use ashvale_common::{ItemId, NpcId, QuestId};
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

use crate::condition::Condition;
use crate::cutscene::{CutsceneCommand, FadeDirection};
use crate::dialogue::{CommandNode, DialogueNode, DialogueResponse, DialogueTree, NextNode};
use crate::effect::Effect;
use crate::npc::{NpcDefinition, NpcDialogEntry};

/// Errors for whole-document failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContentError {
    /// The document is not valid JSON of the expected shape.
    #[error("malformed JSON document: {0}")]
    Json(String),
    /// The document root is not a JSON object.
    #[error("document root must be a JSON object")]
    NotAnObject,
}

/// Result type for content loading.
pub type ContentResult<T> = Result<T, ContentError>;

// === Raw document shapes (field names match the content files) ===

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TreeDocument {
    dialog_trees: HashMap<String, RawTree>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawTree {
    id: String,
    npc_id: String,
    start_node: String,
    nodes: HashMap<String, RawNode>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawNode {
    text: String,
    portrait: Option<String>,
    effects: Vec<String>,
    responses: Vec<RawResponse>,
    command: Option<RawCommand>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawResponse {
    id: String,
    text: String,
    next_node: Option<String>,
    conditions: Vec<String>,
    effects: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawCommand {
    action: String,
    duration: f32,
    npc: Option<String>,
    target: Option<RawVec2>,
    speed: f32,
    sound: Option<String>,
    volume: f32,
    music: Option<String>,
    item: Option<String>,
    quantity: u32,
    quest: Option<String>,
    flag: Option<String>,
    value: bool,
    wait: bool,
    next: Option<String>,
}

impl Default for RawCommand {
    fn default() -> Self {
        Self {
            action: String::new(),
            duration: 0.0,
            npc: None,
            target: None,
            speed: 0.0,
            sound: None,
            volume: 1.0,
            music: None,
            item: None,
            quantity: 1,
            quest: None,
            flag: None,
            value: true,
            wait: false,
            next: None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(default)]
struct RawVec2 {
    x: f32,
    y: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct NpcDocument {
    npcs: HashMap<String, RawNpc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawNpc {
    name: String,
    default_portrait: Option<String>,
    requires_item: Option<String>,
    refuse_dialog: Option<String>,
    dialogs: Vec<RawDialogEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawDialogEntry {
    tree_id: String,
    priority: i32,
    conditions: Vec<String>,
}

// === Loading ===

/// Parses a dialogue-tree document. Trees that fail validation are
/// skipped with a warning; the remaining trees still load.
pub fn parse_dialogue_trees(json: &str) -> ContentResult<Vec<DialogueTree>> {
    let document: TreeDocument =
        serde_json::from_str(json).map_err(|error| ContentError::Json(error.to_string()))?;

    let mut trees = Vec::new();
    for (key, raw) in document.dialog_trees {
        let mut issues = Vec::new();
        let tree = convert_tree(&key, &raw, &mut issues);
        if issues.is_empty() {
            trees.push(tree);
        } else {
            for issue in &issues {
                warn!(tree = key.as_str(), issue = issue.as_str(), "dialogue tree rejected");
            }
        }
    }
    Ok(trees)
}

/// Parses an NPC-definition document. NPCs that fail validation are
/// skipped with a warning.
pub fn parse_npcs(json: &str) -> ContentResult<Vec<NpcDefinition>> {
    let document: NpcDocument =
        serde_json::from_str(json).map_err(|error| ContentError::Json(error.to_string()))?;

    let mut npcs = Vec::new();
    for (key, raw) in document.npcs {
        let mut issues = Vec::new();
        let npc = convert_npc(&key, &raw, &mut issues);
        if issues.is_empty() {
            npcs.push(npc);
        } else {
            for issue in &issues {
                warn!(npc = key.as_str(), issue = issue.as_str(), "NPC definition rejected");
            }
        }
    }
    Ok(npcs)
}

// === Conversion + validation ===

fn check_conditions(what: &str, conditions: &[String], issues: &mut Vec<String>) {
    for raw in conditions {
        if let Err(error) = Condition::parse(raw) {
            issues.push(format!("{what}: {error}"));
        }
    }
}

fn check_effects(what: &str, effects: &[String], issues: &mut Vec<String>) {
    for raw in effects {
        if let Err(error) = Effect::parse(raw) {
            issues.push(format!("{what}: {error}"));
        }
    }
}

fn check_target(
    what: &str,
    next: &NextNode,
    nodes: &HashMap<String, RawNode>,
    issues: &mut Vec<String>,
) {
    if let NextNode::Node(id) = next {
        if !nodes.contains_key(id.as_str()) {
            issues.push(format!("{what}: dangling node reference `{id}`"));
        }
    }
}

fn convert_tree(key: &str, raw: &RawTree, issues: &mut Vec<String>) -> DialogueTree {
    let id = if raw.id.is_empty() { key } else { raw.id.as_str() };
    let mut tree = DialogueTree::new(id, raw.npc_id.as_str(), raw.start_node.as_str());

    if !raw.nodes.contains_key(&raw.start_node) {
        issues.push(format!("start node `{}` does not exist", raw.start_node));
    }

    for (node_id, raw_node) in &raw.nodes {
        let mut node = DialogueNode::new(node_id.as_str(), raw_node.text.as_str());
        node.portrait_key = raw_node.portrait.clone();
        node.effects = raw_node.effects.clone();
        check_effects(&format!("node `{node_id}` effects"), &raw_node.effects, issues);

        for raw_response in &raw_node.responses {
            let what = format!("node `{node_id}` response `{}`", raw_response.id);
            let next = NextNode::from_content(raw_response.next_node.as_deref());
            check_target(&what, &next, &raw.nodes, issues);
            check_conditions(&what, &raw_response.conditions, issues);
            check_effects(&what, &raw_response.effects, issues);

            let mut response = DialogueResponse::end(
                raw_response.id.as_str(),
                raw_response.text.as_str(),
            );
            response.next_node = next;
            response.conditions = raw_response.conditions.clone();
            response.effects = raw_response.effects.clone();
            node.responses.push(response);
        }

        if let Some(raw_command) = &raw_node.command {
            let what = format!("node `{node_id}` command");
            if let Some(command) = convert_command(&what, raw_command, issues) {
                check_target(&what, &command.next_node, &raw.nodes, issues);
                node.command = Some(command);
            }
        }

        tree.add_node(node);
    }

    tree
}

/// A required string field, rejecting absence and the empty string.
fn non_empty(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn missing(what: &str, name: &str, action: &str) -> String {
    format!("{what}: missing `{name}` for action `{action}`")
}

fn convert_command(
    what: &str,
    raw: &RawCommand,
    issues: &mut Vec<String>,
) -> Option<CommandNode> {
    let command = match raw.action.as_str() {
        "wait" => CutsceneCommand::Wait {
            duration: raw.duration,
        },
        "fade_in" => CutsceneCommand::Fade {
            direction: FadeDirection::In,
            duration: raw.duration,
        },
        "fade_out" => CutsceneCommand::Fade {
            direction: FadeDirection::Out,
            duration: raw.duration,
        },
        "move_npc" => {
            let Some(npc) = non_empty(&raw.npc) else {
                issues.push(missing(what, "npc", &raw.action));
                return None;
            };
            let Some(target) = raw.target else {
                issues.push(missing(what, "target", &raw.action));
                return None;
            };
            if raw.speed <= 0.0 {
                issues.push(format!("{what}: `speed` must be positive for `move_npc`"));
                return None;
            }
            CutsceneCommand::MoveNpc {
                npc: NpcId::new(npc),
                target: (target.x, target.y),
                speed: raw.speed,
            }
        }
        "move_camera" => {
            let Some(target) = raw.target else {
                issues.push(missing(what, "target", &raw.action));
                return None;
            };
            CutsceneCommand::MoveCamera {
                target: (target.x, target.y),
                duration: raw.duration,
            }
        }
        "play_sound" => {
            let Some(sound) = non_empty(&raw.sound) else {
                issues.push(missing(what, "sound", &raw.action));
                return None;
            };
            CutsceneCommand::PlaySound {
                sound,
                volume: raw.volume.clamp(0.0, 1.0),
            }
        }
        "change_music" => {
            let Some(music) = non_empty(&raw.music) else {
                issues.push(missing(what, "music", &raw.action));
                return None;
            };
            CutsceneCommand::ChangeMusic { music }
        }
        "give_item" => {
            let Some(item) = non_empty(&raw.item) else {
                issues.push(missing(what, "item", &raw.action));
                return None;
            };
            CutsceneCommand::GiveItem {
                item: ItemId::new(item),
                quantity: raw.quantity,
            }
        }
        "start_quest" => {
            let Some(quest) = non_empty(&raw.quest) else {
                issues.push(missing(what, "quest", &raw.action));
                return None;
            };
            CutsceneCommand::StartQuest {
                quest: QuestId::new(quest),
            }
        }
        "set_flag" => {
            let Some(flag) = non_empty(&raw.flag) else {
                issues.push(missing(what, "flag", &raw.action));
                return None;
            };
            CutsceneCommand::SetFlag {
                flag,
                value: raw.value,
            }
        }
        other => {
            issues.push(format!("{what}: unknown action `{other}`"));
            return None;
        }
    };

    // Wait and fades always block the sequencer, whatever the file says.
    let wait = raw.wait || command.forces_wait();
    Some(CommandNode {
        command,
        wait,
        next_node: NextNode::from_content(raw.next.as_deref()),
    })
}

fn convert_npc(key: &str, raw: &RawNpc, issues: &mut Vec<String>) -> NpcDefinition {
    let mut npc = NpcDefinition::new(key, raw.name.as_str());
    npc.default_portrait = raw.default_portrait.clone();
    npc.requires_item = raw.requires_item.as_deref().map(ItemId::new);
    npc.refuse_dialog_key = raw.refuse_dialog.clone();

    for (index, entry) in raw.dialogs.iter().enumerate() {
        if entry.tree_id.is_empty() {
            issues.push(format!("dialog entry {index}: missing tree id"));
            continue;
        }
        check_conditions(
            &format!("dialog entry `{}`", entry.tree_id),
            &entry.conditions,
            issues,
        );
        let mut dialog = NpcDialogEntry::new(entry.tree_id.as_str(), entry.priority);
        dialog.conditions = entry.conditions.clone();
        npc.dialogs.push(dialog);
    }

    npc
}
