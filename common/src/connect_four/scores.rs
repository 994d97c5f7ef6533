use crate::connect_four::player::Player;
use serde::{Deserialize, Serialize};

// Cumulative wins across games. A new game never resets these.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Scores {
    pub player1: u32,
    pub player2: u32,
}

impl Scores {
    pub fn new() -> Self {
        Scores::default()
    }

    pub fn record_win(&mut self, player: Player) {
        let wins = match player {
            Player::One => &mut self.player1,
            Player::Two => &mut self.player2,
        };
        *wins = wins.saturating_add(1);
    }

    pub fn wins(&self, player: Player) -> u32 {
        match player {
            Player::One => self.player1,
            Player::Two => self.player2,
        }
    }
}
