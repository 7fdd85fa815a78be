// End-to-end acceptance tests for the eight seed scenarios spec.md §8 names,
// following the teacher's own `tests/` convention of one integration file
// per cross-cutting scenario set (`chess_game.rs`, `bughouse_game.rs`)
// rather than folding these into the unit `#[cfg(test)]` modules colocated
// with each component.

use std::collections::HashMap;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use shogi_rules::{Flag, Game, GameOptions, GameStatus, Outcome, PieceCatalogue, PieceSpec, Player, Position, Square};

fn spec(betza: &str, glyph: &str, flags: Vec<Flag>) -> PieceSpec {
    PieceSpec { betza: betza.to_string(), glyph: glyph.to_string(), flags }
}

/// The standard shogi piece set: king, rook/dragon, bishop/horse, gold,
/// silver/silver+, knight/knight+, lance/lance+, pawn/tokin. Betza shapes
/// are the textbook ones (gold = `WfF`, silver = `FfW`, dragon = `RF`,
/// horse = `BW`, shogi knight = `ffN`, lance = `fR`, pawn = `fW`), used
/// unmodified by every seed scenario in spec.md §8.
fn standard_catalogue() -> Rc<PieceCatalogue> {
    let map = HashMap::from([
        ("K".to_string(), spec("K", "king", vec![Flag::Royal])),
        ("R".to_string(), spec("R", "rook", vec![])),
        ("+R".to_string(), spec("RF", "dragon", vec![])),
        ("B".to_string(), spec("B", "bishop", vec![])),
        ("+B".to_string(), spec("BW", "horse", vec![])),
        ("G".to_string(), spec("WfF", "gold", vec![])),
        ("S".to_string(), spec("FfW", "silver", vec![])),
        ("+S".to_string(), spec("WfF", "silver+", vec![])),
        ("N".to_string(), spec("ffN", "knight", vec![])),
        ("+N".to_string(), spec("WfF", "knight+", vec![])),
        ("L".to_string(), spec("fR", "lance", vec![])),
        ("+L".to_string(), spec("WfF", "lance+", vec![])),
        ("P".to_string(), spec("fW", "pawn", vec![Flag::MaxPerFile(1), Flag::NoDropMate])),
        ("+P".to_string(), spec("WfF", "tokin", vec![])),
    ]);
    Rc::new(PieceCatalogue::from_map(map).unwrap())
}

#[test]
fn seed_1_minishogi_start() {
    let mut pos = Position::parse("rbsgk/4p/5/P4/KGSBR b -", standard_catalogue()).unwrap();
    assert_eq!(pos.shape().num_files, 5);
    assert_eq!(pos.shape().num_ranks, 5);
    assert_eq!(pos.player_to_move(), Player::Black);
    assert_eq!(pos.status(), "");
}

#[test]
fn seed_2_standard_shogi_middlegame() {
    let sfen = "8l/1l+R2P3/p2pBG1pp/kps1p4/Nn1P2G2/P1P1P2PP/1PS6/1KSG3+r1/LN2+p3L w Sbgn3p";
    let mut pos = Position::parse(sfen, standard_catalogue()).unwrap();
    assert_eq!(pos.shape().num_files, 9);
    assert_eq!(pos.shape().num_ranks, 9);
    assert_eq!(pos.player_to_move(), Player::White);
    assert_eq!(pos.hand_count(Player::Black, "S"), 1);
    assert_eq!(pos.hand_count(Player::White, "B"), 1);
    assert_eq!(pos.hand_count(Player::White, "G"), 1);
    assert_eq!(pos.hand_count(Player::White, "N"), 1);
    assert_eq!(pos.hand_count(Player::White, "P"), 3);
    assert_eq!(pos.royal_square(Player::White), Some(Square::new(9, 4)));

    // The silver at (7,4) belongs to White and, not being pinned or cornered,
    // has at least one legal destination.
    let silver_square = Square::new(7, 4);
    assert_eq!(pos.piece_at(silver_square).map(|p| p.owner), Some(Player::White));
    assert!(!pos.legal_moves_from_square(silver_square).unwrap().is_empty());
}

#[test]
fn seed_3_uchi_fu_zume() {
    let mut pos = Position::parse("lkb+R/b3/K3 b P", standard_catalogue()).unwrap();
    assert_eq!(pos.status(), "check");
    assert!(pos.legal_drops_with_piece("P").is_empty());
}

#[test]
fn seed_4_shortest_game_checkmate() {
    let start = "lnsgkgsnl/1r5b1/ppppppppp/9/9/9/PPPPPPPPP/1B5R1/LNSGKGSNL b -";
    let mut pos = Position::parse(start, standard_catalogue()).unwrap();

    // P-7f
    pos.move_piece(Square::new(7, 7), Square::new(7, 6), None).unwrap();
    // G-7b (the gold on 6a steps to the forward-diagonal square 7b)
    pos.move_piece(Square::new(6, 1), Square::new(7, 2), None).unwrap();
    // Bx3c+ (the bishop on 8h slides the full diagonal to 3c, capturing the pawn there, and promotes)
    pos.move_piece(Square::new(8, 8), Square::new(3, 3), Some(true)).unwrap();
    // G-4b (the other gold, on 4a, steps straight forward to 4b)
    pos.move_piece(Square::new(4, 1), Square::new(4, 2), None).unwrap();
    // +Bx4b (the horse captures the gold that just landed on 4b)
    pos.move_piece(Square::new(3, 3), Square::new(4, 2), None).unwrap();
    // K-6a (the king steps sideways into the square the first gold vacated)
    pos.move_piece(Square::new(5, 1), Square::new(6, 1), None).unwrap();
    assert_eq!(pos.player_to_move(), Player::Black);
    assert_eq!(pos.hand_count(Player::Black, "G"), 1);
    // G*5b (the captured gold, now in Black's hand, is dropped to deliver mate)
    pos.drop_piece("G", Square::new(5, 2)).unwrap();

    assert_eq!(pos.player_to_move(), Player::White);
    assert_eq!(pos.status(), "checkmate");
    assert_eq!(pos.piece_at(Square::new(4, 2)).map(|p| p.abbrev.as_str()), Some("+B"));
    assert_eq!(pos.piece_at(Square::new(5, 2)).map(|p| (&p.abbrev[..], p.owner)), Some(("G", Player::Black)));
}

#[test]
fn seed_5_deferred_promotion() {
    let mut pos = Position::parse("2k/SPs/K2 b -", standard_catalogue()).unwrap();
    pos.move_piece(Square::new(3, 2), Square::new(3, 1), None).unwrap();
    assert!(pos.pending_movement().is_some());
    assert_eq!(pos.player_to_move(), Player::Black);
    pos.choose_promotion(true).unwrap();
    assert_eq!(pos.player_to_move(), Player::White);
    assert_eq!(pos.emit(), "+S1k/1Ps/K2 w -");
}

#[test]
fn seed_6_perpetual_check_loss() {
    let mut game = Game::new("2k/1R1/1K1 b -", standard_catalogue(), GameOptions::with_try_rule(false)).unwrap();
    for _ in 0..3 {
        game.move_piece(Square::new(2, 2), Square::new(1, 2), None).unwrap();
        game.move_piece(Square::new(1, 1), Square::new(2, 1), None).unwrap();
        game.move_piece(Square::new(1, 2), Square::new(2, 2), None).unwrap();
        game.move_piece(Square::new(2, 1), Square::new(1, 1), None).unwrap();
    }
    assert_eq!(game.status(), GameStatus::Decided(Outcome::Win(Player::White), "perpetual check"));
}

#[test]
fn seed_7_fourfold_draw_without_perpetual_check() {
    let mut game = Game::new("2k/3/K2 b -", standard_catalogue(), GameOptions::with_try_rule(false)).unwrap();
    game.move_piece(Square::new(3, 3), Square::new(3, 2), None).unwrap();
    game.move_piece(Square::new(1, 1), Square::new(1, 2), None).unwrap();
    for _ in 0..3 {
        game.move_piece(Square::new(3, 2), Square::new(3, 1), None).unwrap();
        game.move_piece(Square::new(1, 2), Square::new(1, 3), None).unwrap();
        game.move_piece(Square::new(3, 1), Square::new(3, 2), None).unwrap();
        game.move_piece(Square::new(1, 3), Square::new(1, 2), None).unwrap();
    }
    assert_eq!(game.status(), GameStatus::Decided(Outcome::Draw, "fourfold repetition"));
}

#[test]
fn seed_8_try_rule_win() {
    let moves = [
        (Square::new(2, 1), Square::new(1, 1)),
        (Square::new(2, 3), Square::new(3, 3)),
        (Square::new(1, 1), Square::new(1, 2)),
        (Square::new(3, 3), Square::new(3, 2)),
        (Square::new(1, 2), Square::new(1, 3)),
        (Square::new(3, 2), Square::new(3, 1)),
        (Square::new(1, 3), Square::new(2, 3)),
    ];

    let mut enabled = Game::new("1k1/3/1K1 w P", standard_catalogue(), GameOptions::with_try_rule(true)).unwrap();
    for (from, to) in moves {
        enabled.move_piece(from, to, None).unwrap();
    }
    assert_eq!(enabled.status(), GameStatus::Decided(Outcome::Win(Player::White), "try rule"));

    let mut disabled = Game::new("1k1/3/1K1 w P", standard_catalogue(), GameOptions::with_try_rule(false)).unwrap();
    for (from, to) in moves {
        disabled.move_piece(from, to, None).unwrap();
    }
    assert_eq!(disabled.status(), GameStatus::Ongoing);
}
