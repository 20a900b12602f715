use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CHUNK_SIZE: f32 = 1000.0;
pub const DEFAULT_RENDER_DISTANCE: i32 = 2;
pub const DEFAULT_MAX_INVENTORY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTemplate {
    pub max_health: u32,
    pub max_mana: u32,
    pub damage: u32,
    pub speed: f32,
    pub starting_gold: u32,
}

impl Default for PlayerTemplate {
    fn default() -> Self {
        Self {
            max_health: 100,
            max_mana: 100,
            damage: 25,
            speed: 300.0,
            starting_gold: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyTemplate {
    pub max_health: u32,
    pub damage: u32,
    pub speed: f32,
}

impl Default for EnemyTemplate {
    fn default() -> Self {
        Self {
            max_health: 50,
            damage: 10,
            speed: 120.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOdds {
    pub merchant_chance: f64,
    pub max_enemies: u32,
    pub max_items: u32,
    pub min_merchant_stock: u32,
    pub max_merchant_stock: u32,
    pub loot_drop_chance: f64,
}

impl Default for GenerationOdds {
    fn default() -> Self {
        Self {
            merchant_chance: 0.3,
            max_enemies: 2,
            max_items: 1,
            min_merchant_stock: 3,
            max_merchant_stock: 8,
            loot_drop_chance: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub world_seed: u64,
    pub chunk_size: f32,
    pub render_distance: i32,
    pub attack_range: f32,
    pub aggro_range: f32,
    pub melee_range: f32,
    pub pickup_radius: f32,
    pub interaction_distance: f32,
    pub death_drop_radius: f32,
    pub player_attack_cooldown_ms: f32,
    pub enemy_attack_cooldown_ms: f32,
    pub max_inventory: usize,
    pub effect_life_ms: f32,
    pub attack_arc_life_ms: f32,
    pub player: PlayerTemplate,
    pub enemy: EnemyTemplate,
    pub generation: GenerationOdds,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            world_seed: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            render_distance: DEFAULT_RENDER_DISTANCE,
            attack_range: 50.0,
            aggro_range: 300.0,
            melee_range: 30.0,
            pickup_radius: 30.0,
            interaction_distance: 50.0,
            death_drop_radius: 20.0,
            player_attack_cooldown_ms: 500.0,
            enemy_attack_cooldown_ms: 1000.0,
            max_inventory: DEFAULT_MAX_INVENTORY,
            effect_life_ms: 1000.0,
            attack_arc_life_ms: 200.0,
            player: PlayerTemplate::default(),
            enemy: EnemyTemplate::default(),
            generation: GenerationOdds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be a positive finite number, got {value}")]
    NotPositive { field: &'static str, value: f32 },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: i64 },
    #[error("{field} must be within 0..=1, got {value}")]
    NotProbability { field: &'static str, value: f64 },
    #[error("merchant stock range is empty: min {min} > max {max}")]
    EmptyStockRange { min: u32, max: u32 },
    #[error("max_inventory must be at least 1")]
    ZeroInventory,
}

impl WorldConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("chunk_size", self.chunk_size),
            ("attack_range", self.attack_range),
            ("aggro_range", self.aggro_range),
            ("melee_range", self.melee_range),
            ("pickup_radius", self.pickup_radius),
            ("interaction_distance", self.interaction_distance),
            ("effect_life_ms", self.effect_life_ms),
            ("attack_arc_life_ms", self.attack_arc_life_ms),
            ("player.speed", self.player.speed),
            ("enemy.speed", self.enemy.speed),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }

        let non_negative = [
            ("death_drop_radius", self.death_drop_radius),
            ("player_attack_cooldown_ms", self.player_attack_cooldown_ms),
            ("enemy_attack_cooldown_ms", self.enemy_attack_cooldown_ms),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Negative {
                    field,
                    value: value as i64,
                });
            }
        }

        if self.render_distance < 0 {
            return Err(ConfigError::Negative {
                field: "render_distance",
                value: i64::from(self.render_distance),
            });
        }
        if self.max_inventory == 0 {
            return Err(ConfigError::ZeroInventory);
        }

        let odds = &self.generation;
        for (field, value) in [
            ("generation.merchant_chance", odds.merchant_chance),
            ("generation.loot_drop_chance", odds.loot_drop_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::NotProbability { field, value });
            }
        }
        if odds.min_merchant_stock > odds.max_merchant_stock {
            return Err(ConfigError::EmptyStockRange {
                min: odds.min_merchant_stock,
                max: odds.max_merchant_stock,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(WorldConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let config = WorldConfig {
            chunk_size: 0.0,
            ..WorldConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive {
                field: "chunk_size",
                value: 0.0
            })
        );
    }

    #[test]
    fn inverted_stock_range_is_rejected() {
        let mut config = WorldConfig::default();
        config.generation.min_merchant_stock = 9;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyStockRange { min: 9, max: 8 })
        ));
    }

    #[test]
    fn partial_json_fills_remaining_fields_with_defaults() {
        let config: WorldConfig =
            serde_json::from_str(r#"{"world_seed": 7, "enemy": {"damage": 3}}"#).expect("parse");
        assert_eq!(config.world_seed, 7);
        assert_eq!(config.enemy.damage, 3);
        assert_eq!(config.enemy.max_health, 50);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }
}
