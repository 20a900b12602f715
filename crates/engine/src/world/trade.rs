use rand::Rng;
use thiserror::Error;

use super::chunk::ChunkKey;
use super::entity::{EntityId, Npc, Player};
use super::item::{InventoryError, InventorySlot, ItemKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Player,
    Merchant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeOutcome {
    Bought { kind: ItemKind, price: u32 },
    Sold { kind: ItemKind, price: u32 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TradeError {
    #[error("no trade session is open")]
    NotOpen,
    #[error("merchant {npc:?} is not loaded")]
    UnknownNpc { npc: EntityId },
    #[error("merchant is {distance:.1} units away, must be closer than {limit:.1}")]
    TooFar { distance: f32, limit: f32 },
    #[error("cannot trade while dead")]
    PlayerDead,
    #[error("not enough gold: have {gold}, need {price}")]
    InsufficientGold { gold: u32, price: u32 },
    #[error("merchant offers nothing")]
    EmptyOffer,
    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeSession {
    npc: EntityId,
    npc_chunk: ChunkKey,
    stock: Vec<InventorySlot>,
    selection: Option<(TradeSide, usize)>,
}

impl TradeSession {
    /// Rolls a fresh merchant stock of `min_units..=max_units` units drawn
    /// from what the NPC offers, merged by kind.
    pub(crate) fn open<R: Rng>(
        npc: &Npc,
        npc_chunk: ChunkKey,
        min_units: u32,
        max_units: u32,
        rng: &mut R,
    ) -> Result<Self, TradeError> {
        if npc.offered.is_empty() {
            return Err(TradeError::EmptyOffer);
        }
        let units = rng.gen_range(min_units..=max_units.max(min_units));
        let mut stock: Vec<InventorySlot> = Vec::new();
        for _ in 0..units {
            let kind = npc.offered[rng.gen_range(0..npc.offered.len())];
            match stock.iter_mut().find(|slot| slot.kind == kind) {
                Some(slot) => slot.quantity = slot.quantity.saturating_add(1),
                None => stock.push(InventorySlot { kind, quantity: 1 }),
            }
        }
        Ok(Self {
            npc: npc.id,
            npc_chunk,
            stock,
            selection: None,
        })
    }

    pub fn npc(&self) -> EntityId {
        self.npc
    }

    pub fn npc_chunk(&self) -> ChunkKey {
        self.npc_chunk
    }

    pub fn stock(&self) -> &[InventorySlot] {
        &self.stock
    }

    pub fn selection(&self) -> Option<(TradeSide, usize)> {
        self.selection
    }

    pub fn stock_units(&self) -> u32 {
        self.stock.iter().map(|slot| slot.quantity).sum()
    }

    /// Selecting on one side replaces any selection on the other. Returns
    /// false and clears the selection when the index is out of range.
    pub fn select(&mut self, side: TradeSide, index: usize, player: &Player) -> bool {
        let exists = match side {
            TradeSide::Player => player.inventory.slot(index).is_some(),
            TradeSide::Merchant => index < self.stock.len(),
        };
        self.selection = exists.then_some((side, index));
        exists
    }

    /// `Ok(None)` when nothing is selected. Failed trades leave every
    /// balance untouched.
    pub fn confirm(&mut self, player: &mut Player) -> Result<Option<TradeOutcome>, TradeError> {
        let Some((side, index)) = self.selection else {
            return Ok(None);
        };
        let outcome = match side {
            TradeSide::Merchant => {
                let Some(slot) = self.stock.get(index).copied() else {
                    self.selection = None;
                    return Ok(None);
                };
                let price = slot.kind.price();
                if player.gold < price {
                    return Err(TradeError::InsufficientGold {
                        gold: player.gold,
                        price,
                    });
                }
                player.inventory.add(slot.kind, 1)?;
                player.gold -= price;
                self.take_stock_unit(index);
                TradeOutcome::Bought {
                    kind: slot.kind,
                    price,
                }
            }
            TradeSide::Player => {
                let kind = match player.inventory.take_one(index) {
                    Ok(kind) => kind,
                    Err(InventoryError::NoSuchSlot { .. }) => {
                        self.selection = None;
                        return Ok(None);
                    }
                    Err(error) => return Err(error.into()),
                };
                let price = kind.price();
                player.gold = player.gold.saturating_add(price);
                TradeOutcome::Sold { kind, price }
            }
        };
        self.selection = None;
        Ok(Some(outcome))
    }

    fn take_stock_unit(&mut self, index: usize) {
        let Some(slot) = self.stock.get_mut(index) else {
            return;
        };
        slot.quantity = slot.quantity.saturating_sub(1);
        if slot.quantity == 0 {
            self.stock.remove(index);
        }
    }
}
