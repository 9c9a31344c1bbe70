//! CHOAM: the star port's price ledger.

use crate::data::{ItemId, CHOAM_PRICE_INTERVAL};
use crate::error::Result;
use crate::random::GameRng;
use crate::stream::{InputStream, OutputStream};

/// Lowest price factor (percent of the base price).
const MIN_PRICE_PERCENT: i32 = 80;

/// Highest price factor (percent of the base price).
const MAX_PRICE_PERCENT: i32 = 120;

/// One purchasable unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoamEntry {
    /// Unit type.
    pub item: ItemId,
    /// Units left for sale.
    pub num: i32,
    /// Current price.
    pub price: i32,
}

/// Units a house may buy and their fluctuating prices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Choam {
    entries: Vec<ChoamEntry>,
}

impl Choam {
    /// An empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer `num` units of `item` at its base price.
    pub fn add_item(&mut self, item: ItemId, num: i32) {
        let num = num.max(0);
        if let Some(entry) = self.entry_mut(item) {
            entry.num = num;
            return;
        }
        self.entries.push(ChoamEntry {
            item,
            num,
            price: item.data().price,
        });
    }

    /// Entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[ChoamEntry] {
        &self.entries
    }

    fn entry(&self, item: ItemId) -> Option<&ChoamEntry> {
        self.entries.iter().find(|entry| entry.item == item)
    }

    fn entry_mut(&mut self, item: ItemId) -> Option<&mut ChoamEntry> {
        self.entries.iter_mut().find(|entry| entry.item == item)
    }

    /// Units of `item` left, `None` if it is not offered.
    #[must_use]
    pub fn num_available(&self, item: ItemId) -> Option<i32> {
        self.entry(item).map(|entry| entry.num)
    }

    /// Change the stock of an offered item. Returns `false` if it is not offered.
    pub fn set_num_available(&mut self, item: ItemId, num: i32) -> bool {
        match self.entry_mut(item) {
            Some(entry) => {
                entry.num = num.max(0);
                true
            }
            None => false,
        }
    }

    /// Current price of `item`.
    #[must_use]
    pub fn price(&self, item: ItemId) -> Option<i32> {
        self.entry(item).map(|entry| entry.price)
    }

    /// Whether at least one unit of `item` is in stock.
    #[must_use]
    pub fn is_available(&self, item: ItemId) -> bool {
        self.num_available(item).is_some_and(|num| num > 0)
    }

    /// Re-roll every price on the price interval.
    pub fn update(&mut self, cycle: u32, rng: &mut GameRng) {
        if cycle % CHOAM_PRICE_INTERVAL != 0 {
            return;
        }
        for entry in &mut self.entries {
            let percent = rng.rand(MIN_PRICE_PERCENT, MAX_PRICE_PERCENT);
            entry.price = entry.item.data().price * percent / 100;
        }
    }

    /// Write the ledger.
    pub fn save(&self, stream: &mut OutputStream) {
        stream.write_u32(self.entries.len() as u32);
        for entry in &self.entries {
            stream.write_u32(entry.item as u32);
            stream.write_i32(entry.num);
            stream.write_i32(entry.price);
        }
    }

    /// Read a ledger written by [`Choam::save`].
    pub fn load(stream: &mut InputStream<'_>) -> Result<Self> {
        let count = stream.read_count(12)?;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            entries.push(ChoamEntry {
                item: ItemId::from_u32(stream.read_u32()?)?,
                num: stream.read_i32()?,
                price: stream.read_i32()?,
            });
        }
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_queries() {
        let mut choam = Choam::new();
        choam.add_item(ItemId::Trike, 3);
        choam.add_item(ItemId::Harvester, -1);
        assert_eq!(choam.num_available(ItemId::Trike), Some(3));
        assert_eq!(choam.num_available(ItemId::Harvester), Some(0));
        assert!(!choam.is_available(ItemId::Harvester));
        assert_eq!(choam.num_available(ItemId::Tank), None);
        assert_eq!(choam.price(ItemId::Trike), Some(ItemId::Trike.data().price));

        assert!(choam.set_num_available(ItemId::Harvester, 2));
        assert!(choam.is_available(ItemId::Harvester));
        assert!(!choam.set_num_available(ItemId::Tank, 2));
    }

    #[test]
    fn test_prices_fluctuate_within_bounds() {
        let mut choam = Choam::new();
        choam.add_item(ItemId::Quad, 5);
        let base = ItemId::Quad.data().price;
        let mut rng = GameRng::from_seed(11);

        choam.update(1, &mut rng);
        assert_eq!(choam.price(ItemId::Quad), Some(base));

        for round in 0..20 {
            choam.update(round * CHOAM_PRICE_INTERVAL, &mut rng);
            let price = choam.price(ItemId::Quad).unwrap();
            assert!(price >= base * 80 / 100 && price <= base * 120 / 100);
        }
    }

    #[test]
    fn test_roundtrip() {
        let mut choam = Choam::new();
        choam.add_item(ItemId::Carryall, 2);
        choam.add_item(ItemId::MCV, 1);
        let mut out = OutputStream::new();
        choam.save(&mut out);
        let bytes = out.into_bytes();
        assert_eq!(Choam::load(&mut InputStream::new(&bytes)).unwrap(), choam);
    }
}
