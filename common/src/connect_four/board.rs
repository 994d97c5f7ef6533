use crate::connect_four::player::Player;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ROWS: usize = 6;
pub const COLS: usize = 7;

const WIN_LENGTH: usize = 4;

// (row step, column step): horizontal, vertical, falling and rising diagonals
const AXES: [(i32, i32); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

#[derive(Error, Debug, PartialEq)]
#[error("Cell value must be 0, 1 or 2, got {0}")]
pub struct CellError(pub u8);

#[derive(Error, Debug, PartialEq)]
pub enum MoveError {
    #[error("Column {0} is outside the board (0 to {max})", max = COLS - 1)]
    InvalidColumn(usize),
    #[error("Column {0} is full")]
    ColumnFull(usize),
}

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(into = "u8", try_from = "u8")]
pub enum Cell {
    Empty,
    PlayerOne,
    PlayerTwo,
}

impl Cell {
    pub fn owner(self) -> Option<Player> {
        match self {
            Cell::Empty => None,
            Cell::PlayerOne => Some(Player::One),
            Cell::PlayerTwo => Some(Player::Two),
        }
    }

    pub fn is_empty(self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl From<Player> for Cell {
    fn from(player: Player) -> Self {
        match player {
            Player::One => Cell::PlayerOne,
            Player::Two => Cell::PlayerTwo,
        }
    }
}

impl From<Cell> for u8 {
    fn from(cell: Cell) -> Self {
        cell.owner().map_or(0, Player::number)
    }
}

impl TryFrom<u8> for Cell {
    type Error = CellError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Cell::Empty),
            1 => Ok(Cell::PlayerOne),
            2 => Ok(Cell::PlayerTwo),
            n => Err(CellError(n)),
        }
    }
}

// Row 0 is the top of the board, so pieces fall towards ROWS - 1.
// Serialized row-major as nested arrays of 0/1/2.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub struct Board([[Cell; COLS]; ROWS]);

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Board([[Cell::Empty; COLS]; ROWS])
    }

    pub fn rows(&self) -> &[[Cell; COLS]; ROWS] {
        &self.0
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Cell> {
        self.0.get(row)?.get(col).copied()
    }

    // Signed so that scans can step off the edge of the board
    fn get_space(&self, row: i32, col: i32) -> Option<Cell> {
        let row = usize::try_from(row).ok()?;
        let col = usize::try_from(col).ok()?;
        self.get(row, col)
    }

    // Drops a piece into `col`, returning the row it comes to rest on.
    pub fn drop_piece(&mut self, col: usize, player: Player) -> Result<usize, MoveError> {
        if col >= COLS {
            return Err(MoveError::InvalidColumn(col));
        }
        let row = (0..ROWS)
            .rev()
            .find(|&row| self.0[row][col].is_empty())
            .ok_or(MoveError::ColumnFull(col))?;
        self.0[row][col] = Cell::from(player);
        Ok(row)
    }

    // Whether the piece at (`row`, `col`) is part of a line of four or more
    // belonging to `player`. Only lines through that cell are considered.
    pub fn check_win(&self, row: usize, col: usize, player: Player) -> bool {
        if self.get(row, col) != Some(Cell::from(player)) {
            return false;
        }
        AXES.iter().any(|&(dr, dc)| {
            let run = 1
                + self.count_direction(row, col, dr, dc, player)
                + self.count_direction(row, col, -dr, -dc, player);
            run >= WIN_LENGTH
        })
    }

    fn count_direction(&self, row: usize, col: usize, dr: i32, dc: i32, player: Player) -> usize {
        let target = Cell::from(player);
        let mut r = row as i32 + dr;
        let mut c = col as i32 + dc;
        let mut count = 0;
        while self.get_space(r, c) == Some(target) {
            count += 1;
            r += dr;
            c += dc;
        }
        count
    }

    pub fn is_full(&self) -> bool {
        self.0.iter().flatten().all(|cell| !cell.is_empty())
    }

    pub fn is_column_full(&self, col: usize) -> bool {
        self.get(0, col).map_or(true, |cell| !cell.is_empty())
    }

    // No piece floats above an empty cell
    pub fn is_settled(&self) -> bool {
        (0..COLS).all(|col| {
            (1..ROWS).all(|row| !(self.0[row][col].is_empty() && !self.0[row - 1][col].is_empty()))
        })
    }

    pub fn count(&self, player: Player) -> usize {
        let target = Cell::from(player);
        self.0.iter().flatten().filter(|&&cell| cell == target).count()
    }
}
