// Grammar-level SFEN tokenizing/stringification (spec.md §6), kept free of
// catalogue lookups so `Position::parse`/`Position::emit` can layer the
// semantic checks (piece exists, royal counts, per-file caps, ...) on top
// of pure syntax. The piece-token sub-grammar drops the Python prototype's
// lookahead (`(?=@)`) since the BNF here folds the "@" straight into the
// token instead of peeking past it, so a lookahead-free `regex-lite` engine
// is enough.

use lazy_static::lazy_static;
use regex_lite::Regex;

use crate::error::PositionError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RankCell {
    Empty(u16),
    Piece(String),
}

fn strip_at(raw: &str) -> String { raw.strip_suffix('@').unwrap_or(raw).to_string() }

/// Tokenizes one `/`-delimited rank of the board field. Returns `None` if
/// any character in `rank` fails to participate in a token (a malformed
/// rank), mirroring the Python prototype's reliance on `re.findall` fully
/// covering the string.
pub fn tokenize_rank(rank: &str) -> Option<Vec<RankCell>> {
    lazy_static! {
        static ref TOKEN_RE: Regex = Regex::new(r"\+?[A-Za-z](?:'|[A-Za-z]@)?|[1-9][0-9]*").unwrap();
    }
    let mut cells = Vec::new();
    let mut covered = 0usize;
    for m in TOKEN_RE.find_iter(rank) {
        if m.start() != covered {
            return None;
        }
        covered = m.end();
        let s = m.as_str();
        if s.as_bytes()[0].is_ascii_digit() {
            cells.push(RankCell::Empty(s.parse().ok()?));
        } else {
            cells.push(RankCell::Piece(strip_at(s)));
        }
    }
    if covered != rank.len() {
        return None;
    }
    Some(cells)
}

/// Tokenizes the hands field: `"-"` or a sequence of `<count>? <piece>`.
pub fn tokenize_hand(s: &str) -> Result<Vec<(u32, String)>, PositionError> {
    if s == "-" {
        return Ok(Vec::new());
    }
    lazy_static! {
        static ref TOKEN_RE: Regex =
            Regex::new(r"([1-9][0-9]*)?(\+?[A-Za-z](?:'|[A-Za-z]@)?)").unwrap();
    }
    let mut out = Vec::new();
    let mut covered = 0usize;
    for caps in TOKEN_RE.captures_iter(s) {
        let m = caps.get(0).unwrap();
        if m.start() != covered {
            return Err(PositionError::new(format!("malformed hands field: {s}")));
        }
        covered = m.end();
        let count: u32 = caps.get(1).map_or(1, |g| g.as_str().parse().unwrap());
        let abbrev = strip_at(caps.get(2).unwrap().as_str());
        out.push((count, abbrev));
    }
    if covered != s.len() {
        return Err(PositionError::new(format!("malformed hands field: {s}")));
    }
    Ok(out)
}

/// Splits `"<board> <b|w> <hands>..."`, tolerating (and discarding) any
/// trailing text after the hands field, per spec.md §6.
pub fn split_sfen(sfen: &str) -> Result<(&str, char, &str), PositionError> {
    let mut fields = sfen.split_whitespace();
    let board = fields.next().filter(|s| !s.is_empty());
    let side = fields.next().and_then(|s| s.chars().next());
    let hands = fields.next();
    match (board, side, hands) {
        (Some(board), Some(side @ ('b' | 'w')), Some(hands)) => Ok((board, side, hands)),
        _ => Err(PositionError::new(format!("malformed SFEN: {sfen}"))),
    }
}

/// `abbrev@` whenever `abbrev` (ignoring `+` and `'`) carries two letters.
pub fn emit_piece_token(abbrev: &str) -> String {
    let letters = abbrev.chars().filter(|c| c.is_ascii_alphabetic()).count();
    if letters == 2 { format!("{abbrev}@") } else { abbrev.to_string() }
}
