use enum_map::Enum;
use serde::{Deserialize, Serialize};
use strum::EnumIter;


/// Player 0 ("black") moves towards lower-numbered ranks from their own
/// side of the board; player 1 ("white") is the mirror image.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Enum, EnumIter, Serialize, Deserialize)]
pub enum Player {
    Black,
    White,
}

pub const NUM_PLAYERS: usize = 2;

impl Player {
    pub fn opponent(self) -> Player {
        match self {
            Player::Black => Player::White,
            Player::White => Player::Black,
        }
    }

    pub fn sfen_char(self) -> char {
        match self {
            Player::Black => 'b',
            Player::White => 'w',
        }
    }

    pub fn from_sfen_char(ch: char) -> Option<Player> {
        match ch {
            'b' => Some(Player::Black),
            'w' => Some(Player::White),
            _ => None,
        }
    }

    /// Human-readable name, used in error messages (`PositionError`) the way
    /// the original prototype names players in its own exceptions.
    pub fn name(self) -> &'static str {
        match self {
            Player::Black => "black",
            Player::White => "white",
        }
    }
}
