// Five typed error kinds, one per spec.md §6 "Error kinds exposed to
// callers". The teacher's own `TurnError` (board.rs) is a plain enum with no
// `Display`/`Error` impl, because it never leaves the one crate it lives in.
// These five are this crate's *public* error surface (spec.md §6 names them
// as the interface callers see), so each gets the full `std::error::Error`
// treatment by hand, matching the way the teacher's sibling crates consume
// `bughouse_chess`'s errors through `?`.

use std::fmt;

macro_rules! message_error {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $name {
            message: String,
        }

        impl $name {
            pub fn new(message: impl Into<String>) -> Self { $name { message: message.into() } }

            pub fn message(&self) -> &str { &self.message }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.message) }
        }

        impl std::error::Error for $name {}
    };
}

message_error!(NotationError);
message_error!(CatalogueError);
message_error!(PositionError);
message_error!(MoveError);
message_error!(GameDecidedError);
