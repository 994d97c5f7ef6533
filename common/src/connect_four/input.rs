use crate::connect_four::board::COLS;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum InputError {
    #[error("Column must be a whole number, got {0:?}")]
    NotANumber(String),
    #[error("Column {0} is outside the board (0 to {max})", max = COLS - 1)]
    OutOfRange(i64),
}

// A column index that is known to be on the board
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Column(usize);

impl Column {
    // COLS itself is rejected, not clamped
    pub fn new(col: i64) -> Result<Self, InputError> {
        usize::try_from(col)
            .ok()
            .filter(|&c| c < COLS)
            .map(Column)
            .ok_or(InputError::OutOfRange(col))
    }

    pub fn index(self) -> usize {
        self.0
    }
}

// Parses raw user input (such as a form field) into a column on the board.
// Surrounding whitespace is ignored; anything else that is not an integer is rejected.
pub fn parse_column(text: &str) -> Result<Column, InputError> {
    let col: i64 = text
        .trim()
        .parse()
        .map_err(|_| InputError::NotANumber(text.to_string()))?;
    Column::new(col)
}
