//! Event bus for story-system notifications.
//!
//! Dialogue and quest activity is published here for UI layers (dialog
//! box, quest log tabs) to observe. Publishing never blocks: when the
//! channel is full the event is dropped.

use ashvale_common::{ItemId, NodeId, NpcId, QuestId, RoomId, TreeId};
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Events published by the story systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoryEvent {
    /// A dialogue session started with an NPC.
    DialogueStarted {
        /// NPC being talked to.
        npc: NpcId,
        /// Tree selected for the session.
        tree: TreeId,
    },
    /// A response was chosen in the active dialogue.
    ResponseChosen {
        /// ID of the chosen response.
        response: String,
    },
    /// The active dialogue session ended.
    DialogueEnded {
        /// NPC the session was with.
        npc: NpcId,
    },
    /// A quest was started.
    QuestStarted {
        /// Quest that started.
        quest: QuestId,
    },
    /// A quest advanced to a new node.
    QuestAdvanced {
        /// Quest that advanced.
        quest: QuestId,
        /// Node the quest is now on.
        node: NodeId,
    },
    /// A quest completed.
    QuestCompleted {
        /// Quest that completed.
        quest: QuestId,
    },
    /// A quest failed.
    QuestFailed {
        /// Quest that failed.
        quest: QuestId,
    },
    /// A cutscene command finished.
    CommandCompleted {
        /// Dialogue node to resume at, if any.
        next_node: Option<NodeId>,
    },
    /// A world flag changed value through the effect layer.
    FlagChanged {
        /// Flag name.
        flag: String,
        /// New value.
        value: bool,
    },
    /// The player travelled to another room.
    RoomChanged {
        /// Destination room.
        room: RoomId,
    },
    /// Items were granted through the effect layer.
    ItemGranted {
        /// Item granted.
        item: ItemId,
        /// How many.
        count: u32,
    },
}

/// Event bus for broadcasting story events to subscribers.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<StoryEvent>,
    /// Receiver for collecting events
    receiver: Receiver<StoryEvent>,
    /// Channel capacity
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: StoryEvent) {
        // Non-blocking send - if full, event is dropped
        let _ = self.sender.try_send(event);
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<StoryEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events.
    #[must_use]
    pub fn sender(&self) -> Sender<StoryEvent> {
        self.sender.clone()
    }
}
