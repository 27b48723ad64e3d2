use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::errors::ObservationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub u32);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Match phase of an event. Declaration order is chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Qualifier,
    Semifinal,
    Final,
}

impl MatchType {
    pub fn prefix(self) -> &'static str {
        match self {
            MatchType::Qualifier => "qm",
            MatchType::Semifinal => "sf",
            MatchType::Final => "f",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "qm" | "qual" | "qualifier" | "qualification" | "qualifications" => {
                Some(MatchType::Qualifier)
            }
            "sf" | "semi" | "semifinal" | "semifinals" | "playoff" => Some(MatchType::Semifinal),
            "f" | "final" | "finals" => Some(MatchType::Final),
            _ => None,
        }
    }
}

/// Chronological match identifier. Ordering is match type first, then number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatchKey {
    pub match_type: MatchType,
    pub number: u32,
}

impl MatchKey {
    pub fn new(match_type: MatchType, number: u32) -> Self {
        Self { match_type, number }
    }

    pub fn qual(number: u32) -> Self {
        Self::new(MatchType::Qualifier, number)
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.match_type.prefix(), self.number)
    }
}

impl FromStr for MatchKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| format!("match key `{s}` has no number"))?;
        let (prefix, digits) = s.split_at(split);
        let match_type =
            MatchType::parse(prefix).ok_or_else(|| format!("unknown match type `{prefix}`"))?;
        let number = digits
            .parse::<u32>()
            .map_err(|_| format!("bad match number `{digits}`"))?;
        Ok(MatchKey::new(match_type, number))
    }
}

impl Serialize for MatchKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MatchKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alliance {
    Red,
    Blue,
}

impl Alliance {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "red" | "r" => Some(Alliance::Red),
            "blue" | "b" => Some(Alliance::Blue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoralCounts {
    pub l1: u32,
    pub l2: u32,
    pub l3: u32,
    pub l4: u32,
}

impl CoralCounts {
    pub fn levels(&self) -> [u32; 4] {
        [self.l1, self.l2, self.l3, self.l4]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutoActions {
    pub leave: bool,
    pub coral: CoralCounts,
    pub algae_processor: u32,
    pub algae_net: u32,
    pub coral_missed: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TeleopActions {
    pub coral: CoralCounts,
    pub algae_processor: u32,
    pub algae_net: u32,
    pub coral_missed: u32,
    pub algae_missed: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClimbState {
    #[default]
    None,
    Park,
    Shallow,
    Deep,
}

impl ClimbState {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "no" => Some(ClimbState::None),
            "park" | "parked" => Some(ClimbState::Park),
            "shallow" | "shallow_cage" => Some(ClimbState::Shallow),
            "deep" | "deep_cage" => Some(ClimbState::Deep),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Postmatch {
    pub climb: ClimbState,
}

/// One scouted robot-in-match record, validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub key: MatchKey,
    pub alliance: Alliance,
    pub team: TeamId,
    pub auto: AutoActions,
    pub teleop: TeleopActions,
    pub postmatch: Postmatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledMatch {
    pub key: MatchKey,
    pub red: Vec<TeamId>,
    pub blue: Vec<TeamId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Ingested {
    pub observations: Vec<Observation>,
    pub skipped: Vec<SkippedRow>,
    pub resubmitted: usize,
}

/// Validate raw rows into observations.
///
/// Malformed rows are collected in `skipped`; the parsed rows then go through
/// [`reconcile`]. Output is sorted by (match, alliance, team).
pub fn ingest_observations(rows: &[Value]) -> Ingested {
    let mut parsed = Vec::with_capacity(rows.len());
    let mut skipped = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        match parse_observation(row) {
            Ok(obs) => parsed.push((idx, obs)),
            Err(err) => {
                log::warn!("skipping observation row {idx}: {err}");
                skipped.push(SkippedRow {
                    index: idx,
                    reason: err.to_string(),
                });
            }
        }
    }

    let mut out = reconcile(parsed);
    out.skipped.extend(skipped);
    out.skipped.sort_by_key(|s| s.index);
    out
}

/// Resolve duplicate and conflicting rows among already parsed observations.
///
/// A later row for the same team and match replaces an earlier one. A team found on
/// both alliances of one match loses every row for that match.
pub fn reconcile(parsed: impl IntoIterator<Item = (usize, Observation)>) -> Ingested {
    let mut out = Ingested::default();
    let mut latest: BTreeMap<(MatchKey, TeamId), (usize, Observation)> = BTreeMap::new();
    let mut conflicted: BTreeSet<(MatchKey, TeamId)> = BTreeSet::new();
    let mut conflicted_rows: Vec<(usize, MatchKey, TeamId)> = Vec::new();

    for (idx, obs) in parsed {
        let slot = (obs.key, obs.team);
        if conflicted.contains(&slot) {
            conflicted_rows.push((idx, obs.key, obs.team));
            continue;
        }
        match latest.get(&slot) {
            Some((prev_idx, prev)) if prev.alliance != obs.alliance => {
                conflicted.insert(slot);
                conflicted_rows.push((*prev_idx, obs.key, obs.team));
                conflicted_rows.push((idx, obs.key, obs.team));
                latest.remove(&slot);
            }
            Some(_) => {
                out.resubmitted += 1;
                latest.insert(slot, (idx, obs));
            }
            None => {
                latest.insert(slot, (idx, obs));
            }
        }
    }

    for (idx, key, team) in conflicted_rows {
        let err = ObservationError::ConflictingAlliance {
            team: team.0,
            match_key: key.to_string(),
        };
        log::warn!("skipping observation row {idx}: {err}");
        out.skipped.push(SkippedRow {
            index: idx,
            reason: err.to_string(),
        });
    }
    out.skipped.sort_by_key(|s| s.index);

    out.observations = latest.into_values().map(|(_, obs)| obs).collect();
    out.observations
        .sort_by(|a, b| (a.key, a.alliance, a.team).cmp(&(b.key, b.alliance, b.team)));
    out
}

pub fn parse_observation(row: &Value) -> Result<Observation, ObservationError> {
    let obj = row.as_object().ok_or(ObservationError::NotAnObject)?;
    let key = parse_match_key(row)?;

    let alliance_raw = require_str(row, "alliance")?;
    let alliance = Alliance::parse(alliance_raw).ok_or_else(|| ObservationError::UnknownValue {
        field: "alliance".to_string(),
        value: alliance_raw.to_string(),
    })?;
    let team = parse_team(obj.get("team"), "team")?;

    let data = require(row, "data")?;
    let auto = require(data, "auto")?;
    let teleop = require(data, "teleop")?;
    let post = require(data, "postmatch")?;

    let auto = AutoActions {
        leave: parse_flag(auto, "auto.leave")?,
        coral: parse_coral(auto, "auto")?,
        algae_processor: count(auto, "auto.algae_processor")?,
        algae_net: count(auto, "auto.algae_net")?,
        coral_missed: optional_count(auto, "auto.coral_missed")?,
    };
    let teleop = TeleopActions {
        coral: parse_coral(teleop, "teleop")?,
        algae_processor: count(teleop, "teleop.algae_processor")?,
        algae_net: count(teleop, "teleop.algae_net")?,
        coral_missed: optional_count(teleop, "teleop.coral_missed")?,
        algae_missed: optional_count(teleop, "teleop.algae_missed")?,
    };
    let climb_raw = require_str(post, "postmatch.climb")?;
    let climb = ClimbState::parse(climb_raw).ok_or_else(|| ObservationError::UnknownValue {
        field: "postmatch.climb".to_string(),
        value: climb_raw.to_string(),
    })?;

    Ok(Observation {
        key,
        alliance,
        team,
        auto,
        teleop,
        postmatch: Postmatch { climb },
    })
}

/// Parse schedule rows, dropping rows that do not carry a match key and two team lists.
pub fn parse_schedule(rows: &[Value]) -> (Vec<ScheduledMatch>, Vec<SkippedRow>) {
    let mut out = Vec::new();
    let mut skipped = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        match parse_scheduled_match(row) {
            Ok(m) => out.push(m),
            Err(err) => {
                log::warn!("skipping schedule row {idx}: {err}");
                skipped.push(SkippedRow {
                    index: idx,
                    reason: err.to_string(),
                });
            }
        }
    }
    out.sort_by_key(|m| m.key);
    out.dedup_by_key(|m| m.key);
    (out, skipped)
}

fn parse_scheduled_match(row: &Value) -> Result<ScheduledMatch, ObservationError> {
    let key = parse_match_key(row)?;
    let side = |name: &str| -> Result<Vec<TeamId>, ObservationError> {
        let arr = require(row, name)?
            .as_array()
            .ok_or_else(|| ObservationError::UnknownValue {
                field: name.to_string(),
                value: "not a list".to_string(),
            })?;
        arr.iter().map(|v| parse_team(Some(v), name)).collect()
    };
    Ok(ScheduledMatch {
        key,
        red: side("red")?,
        blue: side("blue")?,
    })
}

fn parse_match_key(row: &Value) -> Result<MatchKey, ObservationError> {
    let type_raw = require_str(row, "match_type")?;
    let match_type = MatchType::parse(type_raw).ok_or_else(|| ObservationError::UnknownValue {
        field: "match_type".to_string(),
        value: type_raw.to_string(),
    })?;
    let number = count(row, "match_number")?;
    Ok(MatchKey::new(match_type, number))
}

fn parse_coral(phase: &Value, prefix: &str) -> Result<CoralCounts, ObservationError> {
    Ok(CoralCounts {
        l1: count(phase, &format!("{prefix}.coral_l1"))?,
        l2: count(phase, &format!("{prefix}.coral_l2"))?,
        l3: count(phase, &format!("{prefix}.coral_l3"))?,
        l4: count(phase, &format!("{prefix}.coral_l4"))?,
    })
}

fn parse_team(raw: Option<&Value>, field: &str) -> Result<TeamId, ObservationError> {
    let raw = raw.ok_or_else(|| ObservationError::MissingField(field.to_string()))?;
    match raw {
        Value::Number(_) => {
            let v = number_as_count(raw, field)?;
            if v == 0 {
                return Err(ObservationError::InvalidCount {
                    field: field.to_string(),
                    value: 0.0,
                });
            }
            Ok(TeamId(v))
        }
        Value::String(s) => {
            let digits = s.trim().trim_start_matches("frc");
            match digits.parse::<u32>() {
                Ok(n) if n > 0 => Ok(TeamId(n)),
                _ => Err(ObservationError::NotNumeric {
                    field: field.to_string(),
                    found: s.clone(),
                }),
            }
        }
        other => Err(ObservationError::NotNumeric {
            field: field.to_string(),
            found: other.to_string(),
        }),
    }
}

// Fields are addressed as "phase.name"; only the last segment is looked up in `obj`.
fn leaf(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

fn require<'a>(obj: &'a Value, path: &str) -> Result<&'a Value, ObservationError> {
    match obj.get(leaf(path)) {
        Some(Value::Null) | None => Err(ObservationError::MissingField(path.to_string())),
        Some(v) => Ok(v),
    }
}

fn require_str<'a>(obj: &'a Value, path: &str) -> Result<&'a str, ObservationError> {
    let v = require(obj, path)?;
    v.as_str().ok_or_else(|| ObservationError::UnknownValue {
        field: path.to_string(),
        value: v.to_string(),
    })
}

fn count(obj: &Value, path: &str) -> Result<u32, ObservationError> {
    let v = require(obj, path)?;
    number_as_count(v, path)
}

fn optional_count(obj: &Value, path: &str) -> Result<u32, ObservationError> {
    match obj.get(leaf(path)) {
        None | Some(Value::Null) => Ok(0),
        Some(v) => number_as_count(v, path),
    }
}

fn number_as_count(v: &Value, path: &str) -> Result<u32, ObservationError> {
    if let Some(n) = v.as_u64() {
        return u32::try_from(n).map_err(|_| ObservationError::InvalidCount {
            field: path.to_string(),
            value: n as f64,
        });
    }
    let Some(f) = v.as_f64() else {
        return Err(ObservationError::NotNumeric {
            field: path.to_string(),
            found: v.to_string(),
        });
    };
    if !f.is_finite() || f < 0.0 || f.fract() != 0.0 || f > u32::MAX as f64 {
        return Err(ObservationError::InvalidCount {
            field: path.to_string(),
            value: f,
        });
    }
    Ok(f as u32)
}

fn parse_flag(obj: &Value, path: &str) -> Result<bool, ObservationError> {
    match require(obj, path)? {
        Value::Bool(b) => Ok(*b),
        v @ Value::Number(_) => Ok(number_as_count(v, path)? > 0),
        other => Err(ObservationError::NotNumeric {
            field: path.to_string(),
            found: other.to_string(),
        }),
    }
}
