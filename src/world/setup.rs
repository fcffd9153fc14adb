//! Opening position

use super::{Building, Cell, MerchantInfo, Ownership, Player, Reputation, WorldModel};
use crate::core::config::RulesConfig;
use crate::core::types::{CellId, PlayerId};

/// Square-neighbour offsets tried, in order, when placing the first caravan
const CARAVAN_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

impl WorldModel {
    /// Build the opening board
    ///
    /// Player 0 holds the lower-left castle with a field army beside it and
    /// one caravan; player 1 holds the upper-right castle and its army. A
    /// neutral mercenary band sits at the centre.
    pub fn initial(rules: &RulesConfig) -> Self {
        let rep = Reputation::new(rules.starting_fear, rules.starting_justice);
        let players = [
            Player::new(PlayerId(0), "Player", rules.starting_gold, rules.tax_rates[0])
                .with_reputation(rep),
            Player::new(PlayerId(1), "Rival", rules.starting_gold, rules.tax_rates[1])
                .with_reputation(rep),
        ];
        let mut world = WorldModel::new(rules.rows, rules.cols, players);
        world.trade_relations = Some([[0; 2]; 2]);

        let (rows, cols) = (rules.rows, rules.cols);
        let home = CellId::new(rows - 2, 1);
        let rival = CellId::new(1, cols - 2);
        let units = rules.starting_army_units;

        world.place(home, Ownership::army(PlayerId(0)), units, Some(Building::Castle));
        world.place(home.offset(0, 1), Ownership::army(PlayerId(0)), units, None);
        world.place(rival, Ownership::army(PlayerId(1)), units, Some(Building::Castle));
        world.place(rival.offset(0, -1), Ownership::army(PlayerId(1)), units, None);
        world.place(
            CellId::new(rows / 2, cols / 2),
            Ownership::Mercenary,
            rules.starting_mercenary_units,
            None,
        );

        let caravan_cell = CARAVAN_OFFSETS
            .iter()
            .map(|&(dr, dc)| home.offset(dr, dc))
            .find(|id| world.cell(*id).is_some_and(Cell::is_empty));
        if let Some(id) = caravan_cell {
            let info = MerchantInfo::new(PlayerId(0), rules.merchant_base_cargo);
            world.place(id, Ownership::Merchant(info), rules.merchant_units, None);
        }

        world
    }

    fn place(&mut self, id: CellId, ownership: Ownership, units: u32, building: Option<Building>) {
        self.set_occupant(id, ownership, units);
        if let Some(cell) = self.cell_mut(id) {
            if building.is_some() {
                cell.building = building;
            }
        }
    }
}
