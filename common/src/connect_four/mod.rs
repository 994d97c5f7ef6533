mod board;
mod game_state;
mod input;
mod player;
mod scores;

pub use board::{Board, Cell, CellError, MoveError, COLS, ROWS};
pub use game_state::{GameState, Move, PlayError, SnapshotError, Status, StatusKind, Turn};
pub use input::{parse_column, Column, InputError};
pub use player::{Player, PlayerError};
pub use scores::Scores;
