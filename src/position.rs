// Board + hands + move/drop generation + check detection + transitions +
// SFEN parse/emit: spec.md §3-4.7, the ~60% of the engine's implementation
// budget. Grounded in the teacher's `board.rs` (sparse-ish mutation, capture
// bookkeeping, `TurnError`-style rejection) and `fen.rs` (two-field parse
// then per-square placement with validation), generalized from chess's
// fixed 8x8 board and fixed piece set to a runtime `BoardShape` and a
// data-driven `PieceCatalogue`.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use derive_new::new;
use enum_map::{EnumMap, enum_map};
use serde::{Deserialize, Serialize};

use crate::catalogue::PieceCatalogue;
use crate::coord::{BoardShape, MIN_SIZE, Square, oriented};
use crate::error::{MoveError, PositionError};
use crate::janitor::Janitor;
use crate::movement::{Direction, Range};
use crate::notation::sfen;
use crate::player::Player;

/// A piece sitting on the board: `abbrev` is always the catalogue's
/// canonical (uppercase) form, e.g. `"P"`, `"+R"`, `"SC"` — case is never
/// used to carry ownership internally, only at the SFEN text boundary.
/// Mirrors the teacher's own `PieceOnBoard { kind, ..., force }` split
/// between a case/owner-agnostic identity and an explicit owner field.
#[derive(Clone, Debug, PartialEq, Eq, new, Serialize, Deserialize)]
pub struct PieceOnBoard {
    pub abbrev: String,
    pub owner: Player,
}

fn owner_of_raw(raw: &str) -> Player {
    match raw.chars().find(|c| c.is_alphabetic()) {
        Some(c) if c.is_uppercase() => Player::Black,
        _ => Player::White,
    }
}

fn cased_for(abbrev: &str, owner: Player) -> String {
    match owner {
        Player::Black => abbrev.to_string(),
        Player::White => abbrev.to_lowercase(),
    }
}

/// `D` (the mover's own directions, possibly vector-restricted per
/// "remaining ranks ahead") is dominated by `D+` (the promoted directions)
/// iff every vector in `D` is present in `D+` with an equal-or-better
/// range: spec.md §4.6.
fn promoted_dominates(mover: &HashMap<Direction, Range>, promoted: &HashMap<Direction, Range>) -> bool {
    mover.iter().all(|(dir, &range)| match promoted.get(dir) {
        None => false,
        Some(&prange) => prange == 0 || (range != 0 && prange >= range),
    })
}

#[derive(Clone, Debug)]
pub struct Position {
    catalogue: Rc<PieceCatalogue>,
    shape: BoardShape,
    board: HashMap<Square, PieceOnBoard>,
    hands: EnumMap<Player, HashMap<String, u32>>,
    player_to_move: Player,
    royal_squares: EnumMap<Player, Option<Square>>,
    num_per_file: EnumMap<Player, HashMap<(String, u16), u32>>,
    all_coordinates: HashSet<Direction>,
    droppable_pieces: Vec<String>,
    checking_piece: Option<String>,
    pending_movement: Option<(Square, Square)>,
}

impl Position {
    pub fn parse(sfen_str: &str, catalogue: Rc<PieceCatalogue>) -> Result<Position, PositionError> {
        let (board_field, side_char, hands_field) = sfen::split_sfen(sfen_str)?;
        let player_to_move =
            Player::from_sfen_char(side_char).ok_or_else(|| PositionError::new("invalid side to move"))?;

        let rank_strs: Vec<&str> = board_field.split('/').collect();
        let num_ranks = rank_strs.len() as u16;
        if num_ranks < MIN_SIZE {
            return Err(PositionError::new(format!("too few ranks: {num_ranks} < {MIN_SIZE}")));
        }

        let mut rank_cells = Vec::with_capacity(rank_strs.len());
        let mut num_files: u16 = 0;
        for rank_str in &rank_strs {
            let cells = sfen::tokenize_rank(rank_str)
                .ok_or_else(|| PositionError::new(format!("malformed rank: {rank_str}")))?;
            let width: u16 = cells
                .iter()
                .map(|c| match c {
                    sfen::RankCell::Empty(n) => *n,
                    sfen::RankCell::Piece(_) => 1,
                })
                .sum();
            num_files = num_files.max(width);
            rank_cells.push(cells);
        }
        if num_files < MIN_SIZE {
            return Err(PositionError::new(format!("too few files: {num_files} < {MIN_SIZE}")));
        }
        let shape = BoardShape::new(num_files, num_ranks);

        let mut position = Position {
            droppable_pieces: catalogue.default_order(),
            catalogue,
            shape,
            board: HashMap::new(),
            hands: enum_map! { _ => HashMap::new() },
            player_to_move,
            royal_squares: enum_map! { _ => None },
            num_per_file: enum_map! { _ => HashMap::new() },
            all_coordinates: HashSet::new(),
            checking_piece: None,
            pending_movement: None,
        };

        for (rank_idx, cells) in rank_cells.into_iter().enumerate() {
            let rank = (rank_idx + 1) as u16;
            let mut file = num_files;
            for cell in cells {
                match cell {
                    sfen::RankCell::Empty(n) => file -= n,
                    sfen::RankCell::Piece(raw) => {
                        position.place_parsed_piece(&raw, Square::new(file, rank))?;
                        file -= 1;
                    }
                }
            }
        }

        for (count, raw) in sfen::tokenize_hand(hands_field)? {
            let owner = owner_of_raw(&raw);
            let canonical = raw.to_uppercase();
            if !position.catalogue.exist(&canonical) {
                return Err(PositionError::new(format!("unknown piece in hand: {raw}")));
            }
            if position.catalogue.is_royal(&canonical) {
                return Err(PositionError::new(format!("royal piece cannot be held in hand: {raw}")));
            }
            if position.catalogue.is_promoted(&canonical) {
                return Err(PositionError::new(format!("promoted piece cannot be held in hand: {raw}")));
            }
            *position.hands[owner].entry(canonical.clone()).or_insert(0) += count;
            position.note_abbrev_seen(&canonical);
        }

        position.recompute_checking_piece();
        let opponent = position.player_to_move.opponent();
        if position.piece_giving_check_to(opponent, position.royal_squares[opponent]).is_some() {
            return Err(PositionError::new("the side not to move is in check"));
        }

        Ok(position)
    }

    fn place_parsed_piece(&mut self, raw: &str, square: Square) -> Result<(), PositionError> {
        let owner = owner_of_raw(raw);
        let canonical = raw.to_uppercase();
        if !self.catalogue.exist(&canonical) {
            return Err(PositionError::new(format!("unknown piece in board: {raw}")));
        }
        if self.catalogue.is_royal(&canonical) {
            if self.royal_squares[owner].is_some() {
                return Err(PositionError::new(format!("too many royal pieces for {}", owner.name())));
            }
            self.royal_squares[owner] = Some(square);
        }
        let restricted = self.catalogue.num_restricted_furthest_ranks(&canonical);
        if restricted > self.shape.promotion_zone_height() {
            return Err(PositionError::new(format!(
                "piece {raw} is incompatible with a board this size"
            )));
        }
        let nth = self.shape.nth_furthest_rank(owner, square.rank);
        if restricted >= nth {
            return Err(PositionError::new(format!(
                "piece {raw} has no legal move from rank {}",
                square.rank
            )));
        }
        if let Some(cap) = self.catalogue.max_per_file(&canonical) {
            let count = self.num_per_file[owner].entry((canonical.clone(), square.file)).or_insert(0);
            if *count >= cap {
                return Err(PositionError::new(format!("per-file cap exceeded for {raw}")));
            }
            *count += 1;
        }
        self.board.insert(square, PieceOnBoard::new(canonical.clone(), owner));
        self.note_abbrev_seen(&canonical);
        Ok(())
    }

    fn note_abbrev_seen(&mut self, canonical: &str) {
        if let Some(movement) = self.catalogue.directions(canonical) {
            self.all_coordinates.extend(movement.directions().keys().copied());
        }
    }

    pub fn emit(&self) -> String {
        let mut ranks = Vec::with_capacity(self.shape.num_ranks as usize);
        for rank in 1..=self.shape.num_ranks {
            let mut s = String::new();
            let mut empty_run = 0u16;
            for file in (1..=self.shape.num_files).rev() {
                match self.board.get(&Square::new(file, rank)) {
                    Some(piece) => {
                        if empty_run > 0 {
                            s.push_str(&empty_run.to_string());
                            empty_run = 0;
                        }
                        s.push_str(&sfen::emit_piece_token(&cased_for(&piece.abbrev, piece.owner)));
                    }
                    None => empty_run += 1,
                }
            }
            if empty_run > 0 {
                s.push_str(&empty_run.to_string());
            }
            ranks.push(s);
        }
        format!("{} {} {}", ranks.join("/"), self.player_to_move.sfen_char(), self.emit_hands())
    }

    fn emit_hands(&self) -> String {
        let mut s = String::new();
        for player in [Player::Black, Player::White] {
            for abbrev in &self.droppable_pieces {
                let count = self.hands[player].get(abbrev).copied().unwrap_or(0);
                if count == 0 {
                    continue;
                }
                if count > 1 {
                    s.push_str(&count.to_string());
                }
                s.push_str(&sfen::emit_piece_token(&cased_for(abbrev, player)));
            }
        }
        if s.is_empty() { "-".to_string() } else { s }
    }

    pub fn shape(&self) -> BoardShape { self.shape }

    pub fn player_to_move(&self) -> Player { self.player_to_move }

    pub fn board(&self) -> &HashMap<Square, PieceOnBoard> { &self.board }

    pub fn piece_at(&self, square: Square) -> Option<&PieceOnBoard> { self.board.get(&square) }

    pub fn royal_square(&self, player: Player) -> Option<Square> { self.royal_squares[player] }

    pub fn hand_count(&self, player: Player, abbrev: &str) -> u32 {
        self.hands[player].get(abbrev).copied().unwrap_or(0)
    }

    pub fn droppable_pieces(&self) -> &[String] { &self.droppable_pieces }

    pub fn checking_piece(&self) -> Option<&str> { self.checking_piece.as_deref() }

    pub fn pending_movement(&self) -> Option<(Square, Square)> { self.pending_movement }

    fn recompute_checking_piece(&mut self) {
        let royal = self.royal_squares[self.player_to_move];
        self.checking_piece = self.piece_giving_check_to(self.player_to_move, royal);
    }

    /// Walks every known direction vector outward from `royal_square`
    /// (oriented for `player`, per spec.md §4.4's "rays are walked from the
    /// king away along the negated vector in the king's own frame" — which
    /// is exactly `oriented(player, ..)` once the two negations cancel: see
    /// DESIGN.md for the derivation). Returns the first attacking
    /// abbreviation found; order among directions is unspecified.
    pub fn piece_giving_check_to(&self, player: Player, royal_square: Option<Square>) -> Option<String> {
        let royal_square = royal_square?;
        for &(dx, dy) in &self.all_coordinates {
            let delta = oriented(player, dx, dy);
            let mut cur = royal_square;
            let mut distance: u32 = 0;
            loop {
                let Some(next) = cur.try_add(self.shape, delta) else { break };
                cur = next;
                distance += 1;
                match self.board.get(&cur) {
                    Some(p) if p.owner == player => break,
                    Some(p) => {
                        if let Some(movement) = self.catalogue.directions(&p.abbrev) {
                            if let Some(range) = movement.range_of((dx, dy)) {
                                if range == 0 || range >= distance {
                                    return Some(p.abbrev.clone());
                                }
                            }
                        }
                        break;
                    }
                    None => continue,
                }
            }
        }
        None
    }

    /// Pseudo-legal destinations for the piece at `from` (spec.md §4.5),
    /// lazily: callers may stop iterating at the first hit.
    fn pseudo_legal_destinations(&self, from: Square) -> Box<dyn Iterator<Item = Square> + '_> {
        let Some(piece) = self.board.get(&from) else { return Box::new(std::iter::empty()) };
        let owner = piece.owner;
        let Some(movement) = self.catalogue.directions(&piece.abbrev) else {
            return Box::new(std::iter::empty());
        };
        let shape = self.shape;
        let board = &self.board;
        let directions: Vec<(Direction, Range)> = movement.directions().iter().map(|(&d, &r)| (d, r)).collect();
        Box::new(directions.into_iter().flat_map(move |(dir, range)| {
            let delta = oriented(owner, dir.0, dir.1);
            RayIter { board, shape, owner, cur: from, delta, range, steps: 0, done: false }
        }))
    }

    /// Simulates moving the piece at `from` to `to` (saving any capture and
    /// any royal-square update), queries whether the mover is left in
    /// check, then undoes the simulation via `Janitor` — spec.md §4.4 and
    /// the "transactional block with explicit save/restore" design note.
    pub fn is_legal_move(&mut self, from: Square, to: Square) -> bool {
        let Some(moving) = self.board.get(&from).cloned() else { return false };
        let player = moving.owner;
        let captured = self.board.insert(to, moving.clone());
        self.board.remove(&from);
        let prev_royal = self.royal_squares[player];
        let moved_royal = self.catalogue.is_royal(&moving.abbrev);
        if moved_royal {
            self.royal_squares[player] = Some(to);
        }
        let guard = Janitor::new(self, move |pos: &mut Position| {
            pos.board.remove(&to);
            if let Some(cap) = captured.clone() {
                pos.board.insert(to, cap);
            }
            pos.board.insert(from, moving.clone());
            if moved_royal {
                pos.royal_squares[player] = prev_royal;
            }
        });
        let attacker = guard.piece_giving_check_to(player, guard.royal_squares[player]);
        attacker.is_none()
    }

    /// Every piece the side to move controls, paired with its legal
    /// destinations named explicitly — used internally by `has_any_legal_move`
    /// and by the public, explicit-square query below.
    pub fn legal_moves_from_square(&mut self, from: Square) -> Result<Vec<Square>, MoveError> {
        match self.board.get(&from) {
            None => Err(MoveError::new(format!("no piece at {from:?}"))),
            Some(p) if p.owner != self.player_to_move => {
                Err(MoveError::new(format!("the piece at {from:?} does not belong to the side to move")))
            }
            Some(_) => {
                let pseudo: Vec<Square> = self.pseudo_legal_destinations(from).collect();
                Ok(pseudo.into_iter().filter(|&to| self.is_legal_move(from, to)).collect())
            }
        }
    }

    pub fn has_any_legal_move(&mut self, player: Player) -> bool {
        let froms: Vec<Square> =
            self.board.iter().filter(|(_, p)| p.owner == player).map(|(&sq, _)| sq).collect();
        for from in froms {
            let dests: Vec<Square> = self.pseudo_legal_destinations(from).collect();
            for to in dests {
                if self.is_legal_move(from, to) {
                    return true;
                }
            }
        }
        false
    }

    fn pseudo_legal_drop_squares(&self, abbrev: &str) -> Vec<Square> {
        let player = self.player_to_move;
        let cap = self.catalogue.max_per_file(abbrev);
        let restricted = self.catalogue.num_restricted_furthest_ranks(abbrev);
        self.shape
            .all_squares()
            .filter(|&sq| {
                if self.board.contains_key(&sq) {
                    return false;
                }
                if let Some(cap) = cap {
                    let count = self.num_per_file[player].get(&(abbrev.to_string(), sq.file)).copied().unwrap_or(0);
                    if count >= cap {
                        return false;
                    }
                }
                restricted < self.shape.nth_furthest_rank(player, sq.rank)
            })
            .collect()
    }

    /// Simulates dropping `abbrev` on the empty square `to`, checks the
    /// mover is not left in check, then undoes. Droppable pieces are never
    /// royal (GLOSSARY), so `royal_squares` never needs restoring here.
    fn is_legal_drop(&mut self, abbrev: &str, to: Square) -> bool {
        let mover = self.player_to_move;
        self.board.insert(to, PieceOnBoard::new(abbrev.to_string(), mover));
        let attacker = self.piece_giving_check_to(mover, self.royal_squares[mover]);
        self.board.remove(&to);
        attacker.is_none()
    }

    /// "Uchi-fu-zume" test (spec.md §4.5): does dropping `abbrev` on `to`
    /// deliver checkmate — check, and no legal *move* (not drop) escapes it?
    fn drop_delivers_checkmate(&mut self, abbrev: &str, to: Square) -> bool {
        let mover = self.player_to_move;
        self.board.insert(to, PieceOnBoard::new(abbrev.to_string(), mover));
        let opponent = mover.opponent();
        let checked = self.piece_giving_check_to(opponent, self.royal_squares[opponent]).is_some();
        let result = checked && !self.has_any_legal_move(opponent);
        self.board.remove(&to);
        result
    }

    fn drop_is_legal(&mut self, abbrev: &str, to: Square) -> bool {
        if !self.is_legal_drop(abbrev, to) {
            return false;
        }
        !(self.catalogue.no_drop_mate(abbrev) && self.drop_delivers_checkmate(abbrev, to))
    }

    pub fn legal_drops_with_piece(&mut self, abbrev: &str) -> Vec<Square> {
        let candidates = self.pseudo_legal_drop_squares(abbrev);
        candidates.into_iter().filter(|&to| self.drop_is_legal(abbrev, to)).collect()
    }

    pub fn has_any_legal_drop(&mut self, player: Player) -> bool {
        let abbrevs: Vec<String> =
            self.hands[player].iter().filter(|&(_, &c)| c > 0).map(|(a, _)| a.clone()).collect();
        for abbrev in abbrevs {
            let candidates = self.pseudo_legal_drop_squares(&abbrev);
            if candidates.into_iter().any(|to| self.drop_is_legal(&abbrev, to)) {
                return true;
            }
        }
        false
    }

    /// Four-way promotion outcome for the legal move `(from, to)`: spec.md
    /// §4.6. The preferred choice is always first.
    pub fn promotions(&self, from: Square, to: Square) -> Vec<bool> {
        let piece = &self.board[&from];
        let player = piece.owner;
        let abbrev = piece.abbrev.clone();
        if self.catalogue.is_promoted(&abbrev) || !self.catalogue.can_promote(&abbrev) {
            return vec![false];
        }
        let restricted = self.catalogue.num_restricted_furthest_ranks(&abbrev);
        let nth_to = self.shape.nth_furthest_rank(player, to.rank);
        if restricted >= nth_to {
            return vec![true];
        }
        let zone_height = self.shape.promotion_zone_height();
        let nth_from = self.shape.nth_furthest_rank(player, from.rank);
        if nth_from > zone_height && nth_to > zone_height {
            return vec![false];
        }
        let movement = self.catalogue.directions(&abbrev).expect("validated above");
        let promoted_abbrev = self.catalogue.promoted(&abbrev).expect("validated above");
        let promoted_movement = self.catalogue.directions(&promoted_abbrev).expect("promoted piece in catalogue");
        let effective: HashMap<Direction, Range> = if movement.can_retreat() {
            movement.directions().clone()
        } else {
            movement
                .directions()
                .iter()
                .filter(|&(&(dx, dy), _)| to.try_add(self.shape, oriented(player, dx, dy)).is_some())
                .map(|(&d, &r)| (d, r))
                .collect()
        };
        if promoted_dominates(&effective, promoted_movement.directions()) {
            vec![true, false]
        } else {
            vec![false, true]
        }
    }

    pub fn move_piece(&mut self, from: Square, to: Square, promotes: Option<bool>) -> Result<(), MoveError> {
        if self.pending_movement.is_some() {
            return Err(MoveError::new("a promotion choice is pending"));
        }
        let legal = self.legal_moves_from_square(from)?;
        if !legal.contains(&to) {
            return Err(MoveError::new(format!("{to:?} is not a legal destination from {from:?}")));
        }
        let options = self.promotions(from, to);
        let chosen = match promotes {
            None if options.len() >= 2 => {
                self.pending_movement = Some((from, to));
                return Ok(());
            }
            None => options[0],
            Some(p) => {
                if !options.contains(&p) {
                    return Err(MoveError::new("illegal promotion choice"));
                }
                p
            }
        };
        self.apply_move(from, to, chosen);
        Ok(())
    }

    pub fn choose_promotion(&mut self, promotes: bool) -> Result<(), MoveError> {
        let (from, to) =
            self.pending_movement.ok_or_else(|| MoveError::new("no promotion choice is pending"))?;
        let options = self.promotions(from, to);
        if !options.contains(&promotes) {
            return Err(MoveError::new("illegal promotion choice"));
        }
        self.pending_movement = None;
        self.apply_move(from, to, promotes);
        Ok(())
    }

    fn apply_move(&mut self, from: Square, to: Square, promote: bool) {
        let mut piece = self.board.remove(&from).expect("move was validated against legal destinations");
        let mover = piece.owner;
        if let Some(captured) = self.board.remove(&to) {
            if let Some(cap) = self.catalogue.max_per_file(&captured.abbrev) {
                let _ = cap;
                let count = self.num_per_file[captured.owner].entry((captured.abbrev.clone(), to.file)).or_insert(0);
                *count = count.saturating_sub(1);
            }
            let base = self.catalogue.unpromoted(&captured.abbrev).to_string();
            *self.hands[mover].entry(base.clone()).or_insert(0) += 1;
            self.note_abbrev_seen(&base);
        }
        if promote {
            if let Some(cap) = self.catalogue.max_per_file(&piece.abbrev) {
                let _ = cap;
                let count = self.num_per_file[mover].entry((piece.abbrev.clone(), from.file)).or_insert(0);
                *count = count.saturating_sub(1);
            }
            piece.abbrev = self.catalogue.promoted(&piece.abbrev).expect("promotion already validated");
            self.note_abbrev_seen(&piece.abbrev.clone());
        }
        if self.catalogue.is_royal(&piece.abbrev) {
            self.royal_squares[mover] = Some(to);
        }
        self.board.insert(to, piece);
        self.player_to_move = mover.opponent();
        self.recompute_checking_piece();
    }

    pub fn drop_piece(&mut self, abbrev: &str, to: Square) -> Result<(), MoveError> {
        if self.pending_movement.is_some() {
            return Err(MoveError::new("a promotion choice is pending"));
        }
        if !self.catalogue.exist(abbrev) {
            return Err(MoveError::new(format!("unknown piece: {abbrev}")));
        }
        let player = self.player_to_move;
        if self.hand_count(player, abbrev) == 0 {
            return Err(MoveError::new(format!("{abbrev} is not in hand")));
        }
        let legal = self.legal_drops_with_piece(abbrev);
        if !legal.contains(&to) {
            return Err(MoveError::new(format!("{to:?} is not a legal drop square for {abbrev}")));
        }
        *self.hands[player].get_mut(abbrev).expect("checked above") -= 1;
        if let Some(cap) = self.catalogue.max_per_file(abbrev) {
            let _ = cap;
            *self.num_per_file[player].entry((abbrev.to_string(), to.file)).or_insert(0) += 1;
        }
        self.board.insert(to, PieceOnBoard::new(abbrev.to_string(), player));
        self.player_to_move = player.opponent();
        self.recompute_checking_piece();
        Ok(())
    }

    /// `""`, `"check"`, `"checkmate"` or `"stalemate"` for the side to move
    /// — spec.md §4.7.
    pub fn status(&mut self) -> &'static str {
        let player = self.player_to_move;
        let has_any = self.has_any_legal_move(player) || self.has_any_legal_drop(player);
        match (self.checking_piece.is_some(), has_any) {
            (true, true) => "check",
            (true, false) => "checkmate",
            (false, true) => "",
            (false, false) => "stalemate",
        }
    }
}

/// Steps `delta` repeatedly from `cur`, stopping off-board, on a blocker
/// (after yielding it if it's an enemy), or after `range` steps (`range ==
/// 0` means unlimited) — spec.md §4.5's pseudo-legal-move walk.
struct RayIter<'a> {
    board: &'a HashMap<Square, PieceOnBoard>,
    shape: BoardShape,
    owner: Player,
    cur: Square,
    delta: Direction,
    range: Range,
    steps: u32,
    done: bool,
}

impl<'a> Iterator for RayIter<'a> {
    type Item = Square;

    fn next(&mut self) -> Option<Square> {
        if self.done {
            return None;
        }
        if self.range != 0 && self.steps >= self.range {
            self.done = true;
            return None;
        }
        let Some(next) = self.cur.try_add(self.shape, self.delta) else {
            self.done = true;
            return None;
        };
        self.steps += 1;
        match self.board.get(&next) {
            Some(p) if p.owner == self.owner => {
                self.done = true;
                None
            }
            Some(_) => {
                self.done = true;
                self.cur = next;
                Some(next)
            }
            None => {
                self.cur = next;
                Some(next)
            }
        }
    }
}
