// Piece catalogue: maps an abbreviation to its movement, display glyph and
// flags, and enforces the consistency invariants from spec.md §3/§4.2 at
// load time. Grounded in `original_source/pieces.py` (the advance/retreat
// checks it already performs) generalized to the fuller invariant list
// spec.md adds (per-file caps, no_drop_mate, royal/promotable interplay,
// glyph sharing).
//
// The "piece-catalogue file (YAML) loader" spec.md calls out as an
// out-of-scope external collaborator is given a thin, concrete entry point
// here (`from_yaml_str`) since the workspace already depends on `serde_yaml`
// and the prototype loads its own catalogue the same way (`yaml.load`).

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CatalogueError;
use crate::movement::Movement;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    Royal,
    NoDropMate,
    MaxPerFile(u32),
}

/// The external, serializable form: `abbreviation -> {betza, glyph, flags}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PieceSpec {
    pub betza: String,
    pub glyph: String,
    #[serde(default)]
    pub flags: Vec<Flag>,
}

#[derive(Clone, Debug)]
struct PieceEntry {
    movement: Movement,
    glyph: String,
    royal: bool,
    no_drop_mate: bool,
    max_per_file: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct PieceCatalogue {
    pieces: HashMap<String, PieceEntry>,
}

fn abbrev_is_wellformed(abbrev: &str) -> bool {
    lazy_static! {
        static ref ABBREV_RE: Regex = Regex::new(r"^\+?[A-Z]('|[A-Z])?$").unwrap();
    }
    ABBREV_RE.is_match(abbrev)
}

fn is_promoted(abbrev: &str) -> bool { abbrev.starts_with('+') }

fn unpromoted_of(abbrev: &str) -> &str { abbrev.strip_prefix('+').unwrap_or(abbrev) }

impl PieceCatalogue {
    pub fn from_yaml_str(yaml: &str) -> Result<PieceCatalogue, CatalogueError> {
        let raw: HashMap<String, PieceSpec> = serde_yaml::from_str(yaml)
            .map_err(|e| CatalogueError::new(format!("invalid catalogue YAML: {e}")))?;
        Self::from_map(raw)
    }

    pub fn from_map(raw: HashMap<String, PieceSpec>) -> Result<PieceCatalogue, CatalogueError> {
        let mut pieces: HashMap<String, PieceEntry> = HashMap::new();
        for (abbrev, spec) in &raw {
            if !abbrev_is_wellformed(abbrev) {
                return Err(CatalogueError::new(format!("malformed abbreviation: {abbrev}")));
            }
            let movement = Movement::parse(&spec.betza)
                .map_err(|e| CatalogueError::new(format!("piece {abbrev}: {e}")))?;
            let royal = spec.flags.contains(&Flag::Royal);
            let no_drop_mate = spec.flags.contains(&Flag::NoDropMate);
            let max_per_file = spec.flags.iter().find_map(|f| match f {
                Flag::MaxPerFile(n) => Some(*n),
                _ => None,
            });
            pieces.insert(
                abbrev.clone(),
                PieceEntry { movement, glyph: spec.glyph.clone(), royal, no_drop_mate, max_per_file },
            );
        }

        for (abbrev, entry) in &pieces {
            if !entry.movement.can_advance() {
                return Err(CatalogueError::new(format!("piece {abbrev} cannot advance")));
            }
            if is_promoted(abbrev) {
                if !entry.movement.can_retreat() {
                    return Err(CatalogueError::new(format!("promoted piece {abbrev} cannot retreat")));
                }
                let base = unpromoted_of(abbrev);
                if !pieces.contains_key(base) {
                    return Err(CatalogueError::new(format!(
                        "promoted piece {abbrev} has no unpromoted counterpart {base}"
                    )));
                }
                let spec = &raw[abbrev];
                if !spec.flags.is_empty() {
                    return Err(CatalogueError::new(format!("promoted piece {abbrev} must carry no flags")));
                }
            } else {
                let promoted_form = format!("+{abbrev}");
                let can_promote = pieces.contains_key(&promoted_form);
                if can_promote && entry.royal {
                    return Err(CatalogueError::new(format!("promotable piece {abbrev} must not be royal")));
                }
                if !can_promote && !entry.movement.can_retreat() {
                    return Err(CatalogueError::new(format!(
                        "unpromotable piece {abbrev} must be able to retreat"
                    )));
                }
            }
            if entry.max_per_file.is_some() && entry.movement.can_change_file() {
                return Err(CatalogueError::new(format!(
                    "piece {abbrev} has a per-file cap but can change files"
                )));
            }
            if entry.no_drop_mate && entry.movement.is_rider() {
                return Err(CatalogueError::new(format!("no_drop_mate piece {abbrev} must not be a rider")));
            }
        }

        let mut by_glyph: HashMap<&str, Vec<&String>> = HashMap::new();
        for (abbrev, entry) in &pieces {
            by_glyph.entry(entry.glyph.as_str()).or_default().push(abbrev);
        }
        for (glyph, abbrevs) in &by_glyph {
            if abbrevs.len() > 2 {
                return Err(CatalogueError::new(format!(
                    "glyph {glyph} is shared by more than two abbreviations: {abbrevs:?}"
                )));
            }
            if abbrevs.len() == 2 {
                let (a, b) = (abbrevs[0], abbrevs[1]);
                let (promoted, plain) = if is_promoted(a) { (a, b) } else { (b, a) };
                if !is_promoted(promoted) || is_promoted(plain) || unpromoted_of(promoted) != plain.as_str() {
                    return Err(CatalogueError::new(format!(
                        "glyph {glyph} shared by non-promotion-pair abbreviations {a}/{b}"
                    )));
                }
                if pieces[promoted].movement.directions() != pieces[plain].movement.directions() {
                    return Err(CatalogueError::new(format!(
                        "glyph {glyph} shared by {a}/{b} but their direction sets differ"
                    )));
                }
            }
        }

        log::debug!("piece catalogue loaded with {} abbreviations", pieces.len());
        Ok(PieceCatalogue { pieces })
    }

    pub fn exist(&self, abbrev: &str) -> bool { self.pieces.contains_key(abbrev) }

    pub fn is_promoted(&self, abbrev: &str) -> bool { is_promoted(abbrev) }

    pub fn promoted(&self, abbrev: &str) -> Option<String> {
        let candidate = format!("+{abbrev}");
        self.exist(&candidate).then_some(candidate)
    }

    pub fn unpromoted(&self, abbrev: &str) -> &str { unpromoted_of(abbrev) }

    pub fn can_promote(&self, abbrev: &str) -> bool { self.promoted(abbrev).is_some() }

    pub fn is_royal(&self, abbrev: &str) -> bool { self.pieces.get(abbrev).is_some_and(|e| e.royal) }

    pub fn no_drop_mate(&self, abbrev: &str) -> bool {
        self.pieces.get(abbrev).is_some_and(|e| e.no_drop_mate)
    }

    pub fn max_per_file(&self, abbrev: &str) -> Option<u32> {
        self.pieces.get(abbrev).and_then(|e| e.max_per_file)
    }

    pub fn directions(&self, abbrev: &str) -> Option<&Movement> { self.pieces.get(abbrev).map(|e| &e.movement) }

    pub fn num_restricted_furthest_ranks(&self, abbrev: &str) -> u16 {
        self.pieces.get(abbrev).map_or(0, |e| e.movement.num_restricted_furthest_ranks())
    }

    pub fn can_retreat(&self, abbrev: &str) -> bool {
        self.pieces.get(abbrev).is_some_and(|e| e.movement.can_retreat())
    }

    pub fn glyph(&self, abbrev: &str) -> Option<&str> { self.pieces.get(abbrev).map(|e| e.glyph.as_str()) }

    /// Every droppable abbreviation known to this catalogue (never royal,
    /// never a promoted form — see GLOSSARY), stable-sorted: standard shogi
    /// order (`R,B,G,S,N,L,P`) first, then everything else alphabetically.
    /// This is the *default* droppable-piece order a `Position` falls back
    /// to before any piece is actually seen; see `Position::droppable_pieces`
    /// for the order that actually drives SFEN hand emission, which
    /// additionally depends on what's on the board.
    pub fn default_order(&self) -> Vec<String> {
        const STANDARD_ORDER: &[&str] = &["R", "B", "G", "S", "N", "L", "P"];
        let droppable = |a: &str| !self.is_promoted(a) && !self.is_royal(a);
        let mut rest: Vec<&String> = self
            .pieces
            .keys()
            .filter(|a| droppable(a))
            .filter(|a| !STANDARD_ORDER.contains(&a.as_str()))
            .collect();
        rest.sort();
        let mut out: Vec<String> = Vec::new();
        for std_abbrev in STANDARD_ORDER {
            if self.pieces.contains_key(*std_abbrev) && droppable(std_abbrev) {
                out.push(std_abbrev.to_string());
            }
        }
        out.extend(rest.into_iter().cloned());
        out
    }
}
