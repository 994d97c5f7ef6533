use crate::connect_four::{Board, GameState, Move, Player, Scores, StatusKind};
use serde::{Deserialize, Serialize};
use std::fmt;

// Read-only copy of everything a client needs to draw the game
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub board: Board,
    pub current_player: Player,
    pub status: StatusKind,
    // 0 until somebody wins
    pub winner: u8,
    pub last_move: Option<Move>,
    pub message: Option<String>,
    pub scores: Scores,
    pub has_resumable_save: bool,
}

impl View {
    pub fn new(game_state: &GameState, scores: Scores, has_resumable_save: bool) -> Self {
        let status = game_state.status();
        View {
            board: *game_state.board(),
            current_player: game_state.current_player(),
            status: status.kind(),
            winner: status.winner().map_or(0, Player::number),
            last_move: game_state.last_move(),
            message: game_state.message().map(str::to_string),
            scores,
            has_resumable_save,
        }
    }
}

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Placed,
    Won(Player),
    Draw,
    InvalidColumn,
    ColumnFull,
    GameOver,
    Saved,
    Resumed,
    NothingToResume,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Placed => write!(f, "Piece placed."),
            Outcome::Won(player) => write!(f, "Congratulations, {}!", player),
            Outcome::Draw => write!(f, "It's a draw!"),
            Outcome::InvalidColumn => write!(f, "Invalid column."),
            Outcome::ColumnFull => write!(f, "Column full. Choose another column."),
            Outcome::GameOver => write!(f, "The game is over. Start a new game."),
            Outcome::Saved => write!(f, "Game saved."),
            Outcome::Resumed => write!(f, "Game resumed from save."),
            Outcome::NothingToResume => write!(f, "No saved game to resume."),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Report {
    pub outcome: Outcome,
    pub view: View,
}
