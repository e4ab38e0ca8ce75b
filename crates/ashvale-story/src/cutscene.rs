//! Cutscene command sequencer.
//!
//! Dialogue trees can contain command nodes: one scripted action (wait,
//! fade, movement, audio, world mutation) plus the node to resume the
//! tree at once the action finishes. The [`CutsceneRunner`] executes
//! one command at a time; instant commands complete inside
//! [`CutsceneRunner::begin`], timed ones are polled every frame through
//! [`CutsceneRunner::update`] until done.
//!
//! Host-engine side effects (entity positions, camera, audio) go
//! through the narrow [`CutsceneHost`] trait; world mutation goes
//! through the same [`ScriptContext`] the effect language uses.

use ashvale_common::{ItemId, NodeId, NpcId, QuestId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::context::ScriptContext;
use crate::events::{EventBus, StoryEvent};

/// NPC movement snaps to its target within this distance.
const SNAP_EPSILON: f32 = 2.0;

/// Direction of a screen fade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FadeDirection {
    /// Fade from black to the scene (alpha 1 → 0).
    In,
    /// Fade from the scene to black (alpha 0 → 1).
    Out,
}

/// One scripted cutscene action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CutsceneCommand {
    /// Hold for a duration.
    Wait {
        /// Seconds to hold.
        duration: f32,
    },
    /// Linear screen fade over a duration.
    Fade {
        /// Fade direction.
        direction: FadeDirection,
        /// Seconds the ramp takes.
        duration: f32,
    },
    /// Move an NPC to a position at constant speed.
    MoveNpc {
        /// NPC to move.
        npc: NpcId,
        /// Destination.
        target: (f32, f32),
        /// Units per second.
        speed: f32,
    },
    /// Ease the camera to a position over a duration.
    MoveCamera {
        /// Destination.
        target: (f32, f32),
        /// Seconds the ease takes.
        duration: f32,
    },
    /// Play a one-shot sound.
    PlaySound {
        /// Sound cue name.
        sound: String,
        /// Volume in [0, 1].
        volume: f32,
    },
    /// Switch the music track.
    ChangeMusic {
        /// Track name.
        music: String,
    },
    /// Give items to the player.
    GiveItem {
        /// Item to give.
        item: ItemId,
        /// How many.
        quantity: u32,
    },
    /// Start a quest.
    StartQuest {
        /// Quest to start.
        quest: QuestId,
    },
    /// Set a flag to a value.
    SetFlag {
        /// Flag name.
        flag: String,
        /// Value to set.
        value: bool,
    },
}

impl CutsceneCommand {
    /// Whether the sequencer must block on this command regardless of
    /// the authored `wait` field.
    #[must_use]
    pub const fn forces_wait(&self) -> bool {
        matches!(self, Self::Wait { .. } | Self::Fade { .. })
    }

    /// Whether the command finishes entirely inside its execute step.
    #[must_use]
    pub const fn is_instant(&self) -> bool {
        matches!(
            self,
            Self::PlaySound { .. }
                | Self::ChangeMusic { .. }
                | Self::GiveItem { .. }
                | Self::StartQuest { .. }
                | Self::SetFlag { .. }
        )
    }
}

/// Host-engine services cutscene commands act on.
///
/// The story core never touches sprites, audio buffers or the real
/// camera; it asks the host through this trait.
pub trait CutsceneHost {
    /// Current position of an NPC, if it exists in the scene.
    fn npc_position(&self, npc: &NpcId) -> Option<(f32, f32)>;
    /// Moves an NPC.
    fn set_npc_position(&mut self, npc: &NpcId, position: (f32, f32));
    /// Current camera position.
    fn camera_position(&self) -> (f32, f32);
    /// Moves the camera.
    fn set_camera_position(&mut self, position: (f32, f32));
    /// Sets the screen fade overlay alpha (0 = clear, 1 = black).
    fn set_fade_alpha(&mut self, alpha: f32);
    /// Plays a one-shot sound.
    fn play_sound(&mut self, sound: &str, volume: f32);
    /// Switches the music track.
    fn change_music(&mut self, music: &str);
}

/// Completion notice returned when a command finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    /// Dialogue node to resume at, if the command node named one.
    pub next_node: Option<NodeId>,
}

/// An in-flight command plus its per-frame progress.
#[derive(Debug, Clone)]
struct ActiveCommand {
    command: CutsceneCommand,
    next_node: Option<NodeId>,
    elapsed: f32,
    /// Camera position captured when a camera move began.
    camera_from: (f32, f32),
}

fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

/// Executes cutscene commands one at a time.
#[derive(Debug, Default)]
pub struct CutsceneRunner {
    active: Option<ActiveCommand>,
}

impl CutsceneRunner {
    /// Creates an idle runner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a command is currently in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Executes a command's setup step.
    ///
    /// Instant commands authored without `wait` finish here and return
    /// their outcome synchronously. Everything else stays in flight
    /// until [`Self::update`] reports it done. A second command started
    /// while one is in flight is dropped with a warning.
    pub fn begin(
        &mut self,
        command: CutsceneCommand,
        wait: bool,
        next_node: Option<NodeId>,
        host: &mut dyn CutsceneHost,
        ctx: &mut ScriptContext<'_>,
    ) -> Option<CommandOutcome> {
        if self.active.is_some() {
            warn!("cutscene command already running, dropping new command");
            return None;
        }
        let wait = wait || command.forces_wait();

        let mut camera_from = (0.0, 0.0);
        match &command {
            CutsceneCommand::Wait { .. } | CutsceneCommand::MoveNpc { .. } => {}
            CutsceneCommand::Fade { direction, .. } => {
                host.set_fade_alpha(match direction {
                    FadeDirection::Out => 0.0,
                    FadeDirection::In => 1.0,
                });
            }
            CutsceneCommand::MoveCamera { .. } => camera_from = host.camera_position(),
            CutsceneCommand::PlaySound { sound, volume } => host.play_sound(sound, *volume),
            CutsceneCommand::ChangeMusic { music } => host.change_music(music),
            CutsceneCommand::GiveItem { item, quantity } => {
                ctx.state.give_item(item, *quantity);
                ctx.quests.on_item_collected(item, *quantity, ctx.events);
                ctx.events.publish(StoryEvent::ItemGranted {
                    item: item.clone(),
                    count: *quantity,
                });
            }
            CutsceneCommand::StartQuest { quest } => {
                if let Err(error) = ctx.quests.start_quest(quest, ctx.events) {
                    warn!(quest = %quest, %error, "cutscene quest start refused");
                }
            }
            CutsceneCommand::SetFlag { flag, value } => {
                ctx.state.set_flag(flag.clone(), *value);
                ctx.events.publish(StoryEvent::FlagChanged {
                    flag: flag.clone(),
                    value: *value,
                });
            }
        }

        if !wait && command.is_instant() {
            ctx.events.publish(StoryEvent::CommandCompleted {
                next_node: next_node.clone(),
            });
            return Some(CommandOutcome { next_node });
        }

        self.active = Some(ActiveCommand {
            command,
            next_node,
            elapsed: 0.0,
            camera_from,
        });
        None
    }

    /// Advances the in-flight command by one frame.
    ///
    /// Returns the outcome when the command finishes.
    pub fn update(
        &mut self,
        dt: f32,
        host: &mut dyn CutsceneHost,
        events: &EventBus,
    ) -> Option<CommandOutcome> {
        let active = self.active.as_mut()?;
        active.elapsed += dt;

        let done = match &active.command {
            CutsceneCommand::Wait { duration } => active.elapsed >= *duration,
            CutsceneCommand::Fade {
                direction,
                duration,
            } => {
                let t = if *duration <= 0.0 {
                    1.0
                } else {
                    (active.elapsed / duration).min(1.0)
                };
                host.set_fade_alpha(match direction {
                    FadeDirection::Out => t,
                    FadeDirection::In => 1.0 - t,
                });
                t >= 1.0
            }
            CutsceneCommand::MoveNpc { npc, target, speed } => {
                match host.npc_position(npc) {
                    None => {
                        warn!(npc = %npc, "move target NPC missing, completing command");
                        true
                    }
                    Some((x, y)) => {
                        let (dx, dy) = (target.0 - x, target.1 - y);
                        let distance = (dx * dx + dy * dy).sqrt();
                        let step = speed * dt;
                        if distance <= SNAP_EPSILON || step >= distance {
                            host.set_npc_position(npc, *target);
                            true
                        } else {
                            let (nx, ny) = (dx / distance, dy / distance);
                            host.set_npc_position(npc, (x + nx * step, y + ny * step));
                            false
                        }
                    }
                }
            }
            CutsceneCommand::MoveCamera { target, duration } => {
                let t = if *duration <= 0.0 {
                    1.0
                } else {
                    (active.elapsed / duration).min(1.0)
                };
                let s = smoothstep(t);
                let from = active.camera_from;
                host.set_camera_position((
                    from.0 + (target.0 - from.0) * s,
                    from.1 + (target.1 - from.1) * s,
                ));
                t >= 1.0
            }
            // Instant commands only stay in flight when authored with
            // wait=true; the first poll completes them.
            _ => true,
        };

        if done {
            let finished = self.active.take()?;
            events.publish(StoryEvent::CommandCompleted {
                next_node: finished.next_node.clone(),
            });
            Some(CommandOutcome {
                next_node: finished.next_node,
            })
        } else {
            None
        }
    }

    /// Drops the in-flight command without completing it.
    pub fn cancel(&mut self) {
        self.active = None;
    }
}

/// In-memory host for tests and headless runs.
#[derive(Debug, Default)]
pub struct MockCutsceneHost {
    /// NPC positions by id.
    pub npc_positions: HashMap<NpcId, (f32, f32)>,
    /// Camera position.
    pub camera: (f32, f32),
    /// Last fade alpha pushed.
    pub fade_alpha: f32,
    /// Sounds played, with volume.
    pub sounds: Vec<(String, f32)>,
    /// Music tracks switched to.
    pub music: Vec<String>,
}

impl CutsceneHost for MockCutsceneHost {
    fn npc_position(&self, npc: &NpcId) -> Option<(f32, f32)> {
        self.npc_positions.get(npc.as_str()).copied()
    }

    fn set_npc_position(&mut self, npc: &NpcId, position: (f32, f32)) {
        self.npc_positions.insert(npc.clone(), position);
    }

    fn camera_position(&self) -> (f32, f32) {
        self.camera
    }

    fn set_camera_position(&mut self, position: (f32, f32)) {
        self.camera = position;
    }

    fn set_fade_alpha(&mut self, alpha: f32) {
        self.fade_alpha = alpha;
    }

    fn play_sound(&mut self, sound: &str, volume: f32) {
        self.sounds.push((sound.to_owned(), volume));
    }

    fn change_music(&mut self, music: &str) {
        self.music.push(music.to_owned());
    }
}
