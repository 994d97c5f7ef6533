use crate::connect_four::board::{Board, Cell, MoveError};
use crate::connect_four::input::Column;
use crate::connect_four::player::{Player, PlayerError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum PlayError {
    #[error("The game is over")]
    GameOver,
    #[error(transparent)]
    Move(#[from] MoveError),
}

#[derive(Error, Debug, PartialEq)]
pub enum SnapshotError {
    #[error("Board has a piece resting above an empty cell")]
    FloatingPiece,
    #[error("Winner {winner} does not match status {status:?}")]
    WinnerMismatch { winner: u8, status: StatusKind },
    #[error("Invalid winner: {0}")]
    InvalidWinner(PlayerError),
    #[error("Last move ({row}, {col}) is not an occupied cell")]
    InvalidLastMove { row: usize, col: usize },
    #[error("Won game has no line of four through its last move")]
    NoWinningLine,
    #[error("Game has a line of four but is not marked as won")]
    UnrecordedWin,
    #[error("Drawn game still has empty cells")]
    BoardNotFull,
    #[error("Ongoing game has no empty cells")]
    BoardFull,
    #[error("Pieces on the board do not match the turn of {current_player}")]
    TurnMismatch { current_player: Player },
}

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Ongoing,
    Win,
    Draw,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Ongoing,
    Win(Player),
    Draw,
}

impl Status {
    pub fn kind(self) -> StatusKind {
        match self {
            Status::Ongoing => StatusKind::Ongoing,
            Status::Win(_) => StatusKind::Win,
            Status::Draw => StatusKind::Draw,
        }
    }

    pub fn winner(self) -> Option<Player> {
        match self {
            Status::Win(player) => Some(player),
            _ => None,
        }
    }

    pub fn is_over(self) -> bool {
        !matches!(self, Status::Ongoing)
    }
}

// Position of the most recently placed piece
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub struct Move {
    pub row: usize,
    pub col: usize,
}

// What a successful play did to the game
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Turn {
    Placed { next: Player },
    Won(Player),
    Draw,
}

// On-disk form of a game. Winner is 0 while nobody has won.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameSnapshot {
    board: Board,
    current_player: Player,
    status: StatusKind,
    winner: u8,
    last_move: Option<Move>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(into = "GameSnapshot", try_from = "GameSnapshot")]
pub struct GameState {
    board: Board,
    current_player: Player,
    status: Status,
    last_move: Option<Move>,
    // Shown to the user once, never persisted
    message: Option<String>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        GameState {
            board: Board::new(),
            current_player: Player::One,
            status: Status::Ongoing,
            last_move: None,
            message: None,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_player(&self) -> Player {
        self.current_player
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn last_move(&self) -> Option<Move> {
        self.last_move
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn clear_message(&mut self) {
        self.message = None;
    }

    // Drops the current player's piece into `col` and advances the game.
    // On error the state is left exactly as it was.
    pub fn play(&mut self, col: Column) -> Result<Turn, PlayError> {
        if self.status.is_over() {
            return Err(PlayError::GameOver);
        }
        let player = self.current_player;
        let col = col.index();
        let row = self.board.drop_piece(col, player)?;
        self.last_move = Some(Move { row, col });

        // A move that wins on the last empty cell is a win, not a draw
        if self.board.check_win(row, col, player) {
            self.status = Status::Win(player);
            Ok(Turn::Won(player))
        } else if self.board.is_full() {
            self.status = Status::Draw;
            Ok(Turn::Draw)
        } else {
            self.current_player = player.other();
            Ok(Turn::Placed {
                next: self.current_player,
            })
        }
    }
}

impl From<GameState> for GameSnapshot {
    fn from(state: GameState) -> Self {
        GameSnapshot {
            board: state.board,
            current_player: state.current_player,
            status: state.status.kind(),
            winner: state.status.winner().map_or(0, Player::number),
            last_move: state.last_move,
        }
    }
}

impl TryFrom<GameSnapshot> for GameState {
    type Error = SnapshotError;

    // Reject records that could never have been produced by play
    fn try_from(snapshot: GameSnapshot) -> Result<Self, Self::Error> {
        let GameSnapshot {
            board,
            current_player,
            status,
            winner,
            last_move,
        } = snapshot;

        if !board.is_settled() {
            return Err(SnapshotError::FloatingPiece);
        }
        let last_piece = match last_move {
            Some(Move { row, col }) => {
                let owner = board.get(row, col).and_then(Cell::owner);
                Some(owner.ok_or(SnapshotError::InvalidLastMove { row, col })?)
            }
            None => None,
        };
        let line_through_last = |player: Player| {
            last_move.map_or(false, |m| board.check_win(m.row, m.col, player))
        };

        let status = match status {
            StatusKind::Ongoing => {
                if winner != 0 {
                    return Err(SnapshotError::WinnerMismatch { winner, status });
                }
                if board.is_full() {
                    return Err(SnapshotError::BoardFull);
                }
                if last_piece.map_or(false, line_through_last) {
                    return Err(SnapshotError::UnrecordedWin);
                }
                Status::Ongoing
            }
            StatusKind::Win => {
                let winner = Player::try_from(winner).map_err(SnapshotError::InvalidWinner)?;
                if current_player != winner {
                    return Err(SnapshotError::TurnMismatch { current_player });
                }
                if last_piece != Some(winner) || !line_through_last(winner) {
                    return Err(SnapshotError::NoWinningLine);
                }
                Status::Win(winner)
            }
            StatusKind::Draw => {
                if winner != 0 {
                    return Err(SnapshotError::WinnerMismatch { winner, status });
                }
                if !board.is_full() {
                    return Err(SnapshotError::BoardNotFull);
                }
                if last_piece.map_or(false, line_through_last) {
                    return Err(SnapshotError::UnrecordedWin);
                }
                Status::Draw
            }
        };

        // Play alternates from player one, and the current player only stays
        // put on the move that ends the game
        let last_mover = if status.is_over() {
            current_player
        } else {
            current_player.other()
        };
        let lead = match last_mover {
            Player::One => 1,
            Player::Two => 0,
        };
        if board.count(Player::One) != board.count(Player::Two) + lead
            || last_piece.map_or(false, |p| p != last_mover)
        {
            return Err(SnapshotError::TurnMismatch { current_player });
        }

        Ok(GameState {
            board,
            current_player,
            status,
            last_move,
            message: None,
        })
    }
}
