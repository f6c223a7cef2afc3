//! Board data model.
//!
//! A 5x5 grid of optional pieces. Row 0 is the north edge, where Player 1
//! starts; Player 2 starts on row 4. Coordinates are zero-based.
//!
//! On the wire a board is 5 rows of 5 cell codes. A cell code is either the
//! empty string or a 3-character piece code: kind letter, lane digit, owner
//! digit (`P11`, `H21`, `P32`, ...). Codes are parsed only at this boundary;
//! everything above works with [`Piece`] values.
//!
//! # Invariants
//!
//! - At most one piece per cell (enforced by the representation).
//! - `Board::from_rows(board.to_rows())` yields the same board for every board.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Width and height of the board.
pub const BOARD_SIZE: usize = 5;

/// One side of a match.
///
/// Seats are handed out in arrival order: the first participant to join a
/// room plays [`Seat::Player1`] and moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Seat {
    /// First seat, north side
    Player1,
    /// Second seat, south side
    Player2,
}

impl Seat {
    /// Seat number as shown to players (1 or 2).
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Player1 => 1,
            Self::Player2 => 2,
        }
    }

    /// Seat for a player number. `None` unless 1 or 2.
    #[must_use]
    pub const fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Self::Player1),
            2 => Some(Self::Player2),
            _ => None,
        }
    }

    /// The other seat.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Player1 => Self::Player2,
            Self::Player2 => Self::Player1,
        }
    }
}

impl From<Seat> for u8 {
    fn from(seat: Seat) -> Self {
        seat.number()
    }
}

impl TryFrom<u8> for Seat {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        Self::from_number(value).ok_or(ProtocolError::InvalidSeat(value))
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player {}", self.number())
    }
}

/// Starting lane of a pawn. Only used to keep piece codes stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PawnLane {
    /// `P1x`
    First,
    /// `P2x`
    Second,
    /// `P3x`
    Third,
}

impl PawnLane {
    const fn digit(self) -> char {
        match self {
            Self::First => '1',
            Self::Second => '2',
            Self::Third => '3',
        }
    }
}

/// Kind of piece. Kind determines how a piece may move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    /// One step orthogonally
    Pawn(PawnLane),
    /// Two steps orthogonally (`H1x`)
    HornA,
    /// Two steps along both axes (`H2x`)
    HornB,
}

/// A piece on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    /// What the piece is
    pub kind: PieceKind,
    /// Who owns it
    pub owner: Seat,
}

impl Piece {
    /// Create a piece.
    #[must_use]
    pub const fn new(kind: PieceKind, owner: Seat) -> Self {
        Self { kind, owner }
    }

    /// 3-character wire code, e.g. `"H21"`.
    #[must_use]
    pub fn code(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (letter, digit) = match self.kind {
            PieceKind::Pawn(lane) => ('P', lane.digit()),
            PieceKind::HornA => ('H', '1'),
            PieceKind::HornB => ('H', '2'),
        };
        write!(f, "{letter}{digit}{}", self.owner.number())
    }
}

impl FromStr for Piece {
    type Err = ProtocolError;

    fn from_str(code: &str) -> Result<Self> {
        let invalid = || ProtocolError::InvalidPieceCode(code.to_string());

        let &[letter, digit, owner] = code.as_bytes() else {
            return Err(invalid());
        };

        let kind = match (letter, digit) {
            (b'P', b'1') => PieceKind::Pawn(PawnLane::First),
            (b'P', b'2') => PieceKind::Pawn(PawnLane::Second),
            (b'P', b'3') => PieceKind::Pawn(PawnLane::Third),
            (b'H', b'1') => PieceKind::HornA,
            (b'H', b'2') => PieceKind::HornB,
            _ => return Err(invalid()),
        };

        let owner = match owner {
            b'1' => Seat::Player1,
            b'2' => Seat::Player2,
            _ => return Err(invalid()),
        };

        Ok(Self { kind, owner })
    }
}

/// A square on the board.
///
/// Squares are always in bounds: the only constructors check `row` and `col`
/// against [`BOARD_SIZE`], including deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSquare")]
pub struct Square {
    row: u8,
    col: u8,
}

#[derive(Deserialize)]
struct RawSquare {
    row: u8,
    col: u8,
}

impl TryFrom<RawSquare> for Square {
    type Error = ProtocolError;

    fn try_from(raw: RawSquare) -> Result<Self> {
        Self::new(raw.row, raw.col)
    }
}

impl Square {
    /// Create a square, rejecting coordinates outside the board.
    pub fn new(row: u8, col: u8) -> Result<Self> {
        if usize::from(row) >= BOARD_SIZE || usize::from(col) >= BOARD_SIZE {
            return Err(ProtocolError::SquareOutOfBounds { row, col });
        }
        Ok(Self { row, col })
    }

    /// Row, 0 at the north edge.
    #[must_use]
    pub const fn row(self) -> u8 {
        self.row
    }

    /// Column, 0 at the west edge.
    #[must_use]
    pub const fn col(self) -> u8 {
        self.col
    }

    /// Signed distance from `self` to `other` as `(rows, cols)`.
    #[must_use]
    pub fn delta_to(self, other: Self) -> (i8, i8) {
        (other.row as i8 - self.row as i8, other.col as i8 - self.col as i8)
    }

    /// Every square, row-major.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..BOARD_SIZE as u8).flat_map(|row| (0..BOARD_SIZE as u8).map(move |col| Self { row, col }))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

type Cells = [[Option<Piece>; BOARD_SIZE]; BOARD_SIZE];

/// Wire representation: 5 rows of 5 cell codes.
type Rows = Vec<Vec<String>>;

/// The 5x5 game board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Rows", try_from = "Rows")]
pub struct Board {
    cells: Cells,
}

impl Board {
    /// Board with no pieces.
    #[must_use]
    pub const fn empty() -> Self {
        Self { cells: [[None; BOARD_SIZE]; BOARD_SIZE] }
    }

    /// Canonical starting layout: three pawns and two horns per side,
    /// mirrored across the middle row.
    #[must_use]
    pub fn starting() -> Self {
        let mut board = Self::empty();
        let back_rank = [
            PieceKind::Pawn(PawnLane::First),
            PieceKind::Pawn(PawnLane::Second),
            PieceKind::HornA,
            PieceKind::HornB,
            PieceKind::Pawn(PawnLane::Third),
        ];

        for (col, kind) in back_rank.into_iter().enumerate() {
            board.cells[0][col] = Some(Piece::new(kind, Seat::Player1));
            board.cells[BOARD_SIZE - 1][col] = Some(Piece::new(kind, Seat::Player2));
        }

        board
    }

    /// Piece on `square`, if any.
    #[must_use]
    pub fn get(&self, square: Square) -> Option<Piece> {
        self.cells[usize::from(square.row)][usize::from(square.col)]
    }

    /// Put `piece` on `square`, returning whatever was there.
    pub fn place(&mut self, square: Square, piece: Piece) -> Option<Piece> {
        self.cells[usize::from(square.row)][usize::from(square.col)].replace(piece)
    }

    /// Clear `square`, returning whatever was there.
    pub fn remove(&mut self, square: Square) -> Option<Piece> {
        self.cells[usize::from(square.row)][usize::from(square.col)].take()
    }

    /// Move the piece on `from` to `to`, returning the displaced piece.
    ///
    /// No-op returning `None` if `from` is empty. Legality is the caller's
    /// concern.
    pub fn relocate(&mut self, from: Square, to: Square) -> Option<Piece> {
        let piece = self.remove(from)?;
        self.place(to, piece)
    }

    /// Number of pieces `owner` has left.
    #[must_use]
    pub fn count(&self, owner: Seat) -> usize {
        self.pieces().filter(|(_, piece)| piece.owner == owner).count()
    }

    /// All occupied squares, row-major.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(|square| self.get(square).map(|piece| (square, piece)))
    }

    /// Wire rows: 5 rows of 5 codes, `""` for empty cells.
    #[must_use]
    pub fn to_rows(&self) -> Rows {
        self.cells
            .iter()
            .map(|row| row.iter().map(|cell| cell.map(Piece::code).unwrap_or_default()).collect())
            .collect()
    }

    /// Parse wire rows.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidBoardShape` unless exactly 5x5
    /// - `ProtocolError::InvalidPieceCode` for an unknown non-empty code
    pub fn from_rows(rows: &[Vec<String>]) -> Result<Self> {
        if rows.len() != BOARD_SIZE || rows.iter().any(|row| row.len() != BOARD_SIZE) {
            return Err(ProtocolError::InvalidBoardShape);
        }

        let mut board = Self::empty();
        for (r, row) in rows.iter().enumerate() {
            for (c, code) in row.iter().enumerate() {
                if !code.is_empty() {
                    board.cells[r][c] = Some(code.parse()?);
                }
            }
        }

        Ok(board)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::starting()
    }
}

impl From<Board> for Rows {
    fn from(board: Board) -> Self {
        board.to_rows()
    }
}

impl TryFrom<Rows> for Board {
    type Error = ProtocolError;

    fn try_from(rows: Rows) -> Result<Self> {
        Self::from_rows(&rows)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (r, row) in self.cells.iter().enumerate() {
            if r > 0 {
                writeln!(f)?;
            }
            for (c, cell) in row.iter().enumerate() {
                if c > 0 {
                    write!(f, " ")?;
                }
                match cell {
                    Some(piece) => write!(f, "{piece}")?,
                    None => write!(f, "...")?,
                }
            }
        }
        Ok(())
    }
}
