//! Player stats observed and mutated by the script layer.
//!
//! This is the stat sheet the condition/effect languages talk about
//! (`player.level>=5`, `player.heal.20`). Movement, equipment and
//! animation belong to the host engine.

use serde::{Deserialize, Serialize};

/// Stats addressable from condition strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerStat {
    /// Player level.
    Level,
    /// Current health.
    Health,
    /// Maximum health.
    MaxHealth,
    /// Coin balance.
    Coins,
    /// Accumulated experience.
    Xp,
}

impl PlayerStat {
    /// Parses a stat name, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "level" => Some(Self::Level),
            "health" => Some(Self::Health),
            "maxhealth" => Some(Self::MaxHealth),
            "coins" => Some(Self::Coins),
            "xp" => Some(Self::Xp),
            _ => None,
        }
    }
}

/// Base health at level 1.
const BASE_MAX_HEALTH: u32 = 100;
/// Extra maximum health granted per level-up.
const HEALTH_PER_LEVEL: u32 = 10;
/// XP required to finish a level is `level * XP_PER_LEVEL`.
const XP_PER_LEVEL: u64 = 100;

/// The player's stat sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    level: u32,
    health: u32,
    max_health: u32,
    coins: u64,
    xp: u64,
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    /// Creates a fresh level-1 player at full health.
    #[must_use]
    pub fn new() -> Self {
        Self {
            level: 1,
            health: BASE_MAX_HEALTH,
            max_health: BASE_MAX_HEALTH,
            coins: 0,
            xp: 0,
        }
    }

    /// Sets the level (test/setup helper; does not touch health or xp).
    #[must_use]
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level.max(1);
        self
    }

    /// Sets the coin balance.
    #[must_use]
    pub fn with_coins(mut self, coins: u64) -> Self {
        self.coins = coins;
        self
    }

    /// Sets current health, clamped to the maximum.
    #[must_use]
    pub fn with_health(mut self, health: u32) -> Self {
        self.health = health.min(self.max_health);
        self
    }

    /// Current level.
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// Current health.
    #[must_use]
    pub const fn health(&self) -> u32 {
        self.health
    }

    /// Maximum health.
    #[must_use]
    pub const fn max_health(&self) -> u32 {
        self.max_health
    }

    /// Coin balance.
    #[must_use]
    pub const fn coins(&self) -> u64 {
        self.coins
    }

    /// Accumulated experience.
    #[must_use]
    pub const fn xp(&self) -> u64 {
        self.xp
    }

    /// Whether the player has health remaining.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Reads a stat as a comparable value.
    #[must_use]
    pub fn stat(&self, stat: PlayerStat) -> i64 {
        let value = match stat {
            PlayerStat::Level => u64::from(self.level),
            PlayerStat::Health => u64::from(self.health),
            PlayerStat::MaxHealth => u64::from(self.max_health),
            PlayerStat::Coins => self.coins,
            PlayerStat::Xp => self.xp,
        };
        i64::try_from(value).unwrap_or(i64::MAX)
    }

    /// Restores health, clamped to the maximum.
    pub fn heal(&mut self, amount: u32) {
        self.health = (self.health + amount).min(self.max_health);
    }

    /// Removes health, saturating at zero.
    pub fn damage(&mut self, amount: u32) {
        self.health = self.health.saturating_sub(amount);
    }

    /// Adds coins.
    pub fn add_coins(&mut self, amount: u64) {
        self.coins = self.coins.saturating_add(amount);
    }

    /// Spends coins if the balance covers it. Returns whether it did.
    pub fn spend_coins(&mut self, amount: u64) -> bool {
        if self.coins >= amount {
            self.coins -= amount;
            true
        } else {
            false
        }
    }

    /// Grants experience, applying any level-ups it pays for.
    ///
    /// Each level requires `level * 100` xp; a level-up raises maximum
    /// health and refills the health bar.
    pub fn add_xp(&mut self, amount: u64) {
        self.xp = self.xp.saturating_add(amount);
        while self.xp >= u64::from(self.level) * XP_PER_LEVEL {
            self.xp -= u64::from(self.level) * XP_PER_LEVEL;
            self.level += 1;
            self.max_health += HEALTH_PER_LEVEL;
            self.health = self.max_health;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_parse_case_insensitive() {
        assert_eq!(PlayerStat::parse("Level"), Some(PlayerStat::Level));
        assert_eq!(PlayerStat::parse("MAXHEALTH"), Some(PlayerStat::MaxHealth));
        assert_eq!(PlayerStat::parse("mana"), None);
    }

    #[test]
    fn test_heal_clamped() {
        let mut player = Player::new().with_health(50);
        player.heal(200);
        assert_eq!(player.health(), player.max_health());
    }

    #[test]
    fn test_damage_saturates() {
        let mut player = Player::new();
        player.damage(10_000);
        assert_eq!(player.health(), 0);
        assert!(!player.is_alive());
    }

    #[test]
    fn test_coins() {
        let mut player = Player::new().with_coins(100);
        assert!(player.spend_coins(60));
        assert!(!player.spend_coins(60));
        assert_eq!(player.coins(), 40);
        player.add_coins(10);
        assert_eq!(player.coins(), 50);
    }

    #[test]
    fn test_level_up() {
        let mut player = Player::new();
        player.damage(30);
        player.add_xp(100);
        assert_eq!(player.level(), 2);
        assert_eq!(player.xp(), 0);
        assert_eq!(player.max_health(), BASE_MAX_HEALTH + HEALTH_PER_LEVEL);
        // Level-up refills health.
        assert_eq!(player.health(), player.max_health());
    }

    #[test]
    fn test_multi_level_up() {
        let mut player = Player::new();
        // 100 (level 1) + 200 (level 2) + 50 spare.
        player.add_xp(350);
        assert_eq!(player.level(), 3);
        assert_eq!(player.xp(), 50);
    }

    #[test]
    fn test_stat_values() {
        let player = Player::new().with_level(7).with_coins(250);
        assert_eq!(player.stat(PlayerStat::Level), 7);
        assert_eq!(player.stat(PlayerStat::Coins), 250);
        assert_eq!(player.stat(PlayerStat::Health), 100);
    }
}
