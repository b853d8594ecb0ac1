//! Stock mappers.
//!
//! Text: [`FilterPunctuation`], [`LowerCase`], [`Split`]. Shape: [`Identity`], [`Filter`],
//! [`Project`], [`Rename`]. Numbers: [`Product`], [`Log`], [`MathMapper`]. Geo and time:
//! [`Haversine`], [`ToDatetime`], [`TimestampDiff`].

use super::Mapper;
use super::expr::Expr;
use crate::error::{Error, Result};
use crate::row::Row;
use crate::value::Value;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, Offset, Timelike, Utc};
use chrono_tz::Tz;
use regex::Regex;
use std::fmt;

fn string_field<'r>(row: &'r Row, column: &str) -> Result<&'r str> {
    row.get(column)?.as_str()
}

/* ===================== Identity ===================== */

/// Passes every row through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl Mapper for Identity {
    fn map(&self, row: Row) -> Result<Vec<Row>> {
        Ok(vec![row])
    }
}

/* ===================== Text ===================== */

/// Strips ASCII punctuation from a string field.
#[derive(Clone, Debug)]
pub struct FilterPunctuation {
    pub column: String,
}

impl FilterPunctuation {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Mapper for FilterPunctuation {
    fn map(&self, mut row: Row) -> Result<Vec<Row>> {
        let cleaned: String = string_field(&row, &self.column)?
            .chars()
            .filter(|c| !c.is_ascii_punctuation())
            .collect();
        row.insert(self.column.clone(), cleaned);
        Ok(vec![row])
    }
}

/// Lowercases a string field.
#[derive(Clone, Debug)]
pub struct LowerCase {
    pub column: String,
}

impl LowerCase {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Mapper for LowerCase {
    fn map(&self, mut row: Row) -> Result<Vec<Row>> {
        let lowered = string_field(&row, &self.column)?.to_lowercase();
        row.insert(self.column.clone(), lowered);
        Ok(vec![row])
    }
}

/// One output row per piece of a string field split on a regex (default: runs of
/// whitespace).
///
/// Every piece is emitted, including empty ones at the edges, so `" a"` yields `""` and
/// `"a"`. Other fields are copied to each output row.
#[derive(Clone, Debug)]
pub struct Split {
    pub column: String,
    separator: Option<Regex>,
}

impl Split {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            separator: None,
        }
    }

    /// # Errors
    /// [`Error::Pattern`] if `separator` is not a valid regex.
    pub fn with_separator(column: impl Into<String>, separator: &str) -> Result<Self> {
        let separator = Regex::new(separator).map_err(|e| Error::Pattern {
            pattern: separator.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            column: column.into(),
            separator: Some(separator),
        })
    }

    fn pieces<'t>(&self, text: &'t str) -> Vec<&'t str> {
        match &self.separator {
            Some(re) => re.split(text).collect(),
            None => {
                // interior empties come from multi-char whitespace runs; edge empties are real pieces
                let raw: Vec<&str> = text.split(char::is_whitespace).collect();
                let last = raw.len() - 1;
                raw.into_iter()
                    .enumerate()
                    .filter(|(i, p)| !p.is_empty() || *i == 0 || *i == last)
                    .map(|(_, p)| p)
                    .collect()
            }
        }
    }
}

impl Mapper for Split {
    fn map(&self, row: Row) -> Result<Vec<Row>> {
        let text = string_field(&row, &self.column)?;
        Ok(self
            .pieces(text)
            .into_iter()
            .map(|piece| {
                let mut out = row.clone();
                out.insert(self.column.clone(), piece);
                out
            })
            .collect())
    }
}

/* ===================== Shape ===================== */

/// Keeps the rows for which the predicate holds. A predicate error ends the stream.
pub struct Filter {
    predicate: Box<dyn Fn(&Row) -> Result<bool> + Send + Sync>,
}

impl Filter {
    pub fn new(predicate: impl Fn(&Row) -> Result<bool> + Send + Sync + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").finish_non_exhaustive()
    }
}

impl Mapper for Filter {
    fn map(&self, row: Row) -> Result<Vec<Row>> {
        Ok(if (self.predicate)(&row)? { vec![row] } else { Vec::new() })
    }
}

/// Keeps only the listed fields, in the listed order.
#[derive(Clone, Debug)]
pub struct Project {
    pub columns: Vec<String>,
}

impl Project {
    pub fn new<K, S>(columns: K) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: super::to_keys(columns),
        }
    }
}

impl Mapper for Project {
    fn map(&self, row: Row) -> Result<Vec<Row>> {
        Ok(vec![row.project(&self.columns)?])
    }
}

#[derive(Clone, Debug)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

impl Rename {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl Mapper for Rename {
    fn map(&self, mut row: Row) -> Result<Vec<Row>> {
        let value = row.remove(&self.from)?;
        row.insert(self.to.clone(), value);
        Ok(vec![row])
    }
}

/* ===================== Numbers ===================== */

/// Product of numeric fields into `result` (default `"product"`).
#[derive(Clone, Debug)]
pub struct Product {
    pub columns: Vec<String>,
    pub result: String,
}

impl Product {
    pub fn new<K, S>(columns: K) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_result(columns, "product")
    }

    pub fn with_result<K, S>(columns: K, result: impl Into<String>) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: super::to_keys(columns),
            result: result.into(),
        }
    }
}

impl Mapper for Product {
    fn map(&self, mut row: Row) -> Result<Vec<Row>> {
        let mut product = Value::Int(1);
        for column in &self.columns {
            product = product.checked_mul(row.get(column)?)?;
        }
        row.insert(self.result.clone(), product);
        Ok(vec![row])
    }
}

/// Replaces a numeric field with its logarithm (natural unless a base is given).
#[derive(Clone, Debug)]
pub struct Log {
    pub column: String,
    pub base: Option<f64>,
}

impl Log {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            base: None,
        }
    }

    pub fn with_base(column: impl Into<String>, base: f64) -> Self {
        Self {
            column: column.into(),
            base: Some(base),
        }
    }
}

impl Mapper for Log {
    fn map(&self, mut row: Row) -> Result<Vec<Row>> {
        let x = row.get(&self.column)?.as_f64()?;
        if x <= 0.0 {
            return Err(Error::Type(format!(
                "logarithm of non-positive value {x} in `{}`",
                self.column
            )));
        }
        let y = match self.base {
            Some(b) => x.log(b),
            None => x.ln(),
        };
        row.insert(self.column.clone(), y);
        Ok(vec![row])
    }
}

/// Evaluates an arithmetic formula over the row's fields into `result`.
///
/// ```
/// use compgraph::operations::{Mapper, mappers::MathMapper};
/// use compgraph::row;
///
/// let m = MathMapper::try_new("z", "x * 2 + y ** 2")?;
/// let out = m.map(row! { "x" => 1, "y" => 3 })?;
/// assert_eq!(out[0].get("z")?.as_i64()?, 11);
/// # Ok::<(), compgraph::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct MathMapper {
    pub result: String,
    formula: String,
    parsed: std::result::Result<Expr, String>,
}

impl MathMapper {
    /// A formula that does not parse fails on the first row.
    pub fn new(result: impl Into<String>, formula: impl Into<String>) -> Self {
        let formula = formula.into();
        Self {
            result: result.into(),
            parsed: Expr::parse(&formula),
            formula,
        }
    }

    /// # Errors
    /// [`Error::Expression`] if `formula` does not parse.
    pub fn try_new(result: impl Into<String>, formula: impl Into<String>) -> Result<Self> {
        let m = Self::new(result, formula);
        if let Err(message) = &m.parsed {
            return Err(Error::expression(&m.formula, message.clone()));
        }
        Ok(m)
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }
}

impl Mapper for MathMapper {
    fn map(&self, mut row: Row) -> Result<Vec<Row>> {
        let expr = self
            .parsed
            .as_ref()
            .map_err(|m| Error::expression(&self.formula, m.clone()))?;
        let value = expr.eval(&row, &self.formula)?;
        row.insert(self.result.clone(), value);
        Ok(vec![row])
    }
}

/* ===================== Geo and time ===================== */

/// Great-circle distance in km between two `[lon, lat]` fields.
#[derive(Clone, Debug)]
pub struct Haversine {
    pub start: String,
    pub end: String,
    pub result: String,
}

impl Haversine {
    pub const EARTH_RADIUS_KM: f64 = 6373.0;

    pub fn new(start: impl Into<String>, end: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            result: result.into(),
        }
    }

    /// Distance in km between `(lon, lat)` points given in degrees.
    pub fn distance((lon1, lat1): (f64, f64), (lon2, lat2): (f64, f64)) -> f64 {
        let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
        let dlat = lat1 - lat2;
        let dlon = lon1.to_radians() - lon2.to_radians();
        let x = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * Self::EARTH_RADIUS_KM * x.sqrt().asin()
    }
}

fn coordinates(row: &Row, column: &str) -> Result<(f64, f64)> {
    match row.get(column)?.as_list()? {
        [lon, lat] => Ok((lon.as_f64()?, lat.as_f64()?)),
        other => Err(Error::Type(format!(
            "`{column}` must be a [lon, lat] pair, got {} values",
            other.len()
        ))),
    }
}

impl Mapper for Haversine {
    fn map(&self, mut row: Row) -> Result<Vec<Row>> {
        let d = Self::distance(coordinates(&row, &self.start)?, coordinates(&row, &self.end)?);
        row.insert(self.result.clone(), d);
        Ok(vec![row])
    }
}

/// Parse a UTC timestamp from a [`Value::Timestamp`] or a string in compact
/// (`20171020T112238.723`) or ISO (`2017-10-20T11:22:38`, space separator allowed) form.
///
/// # Errors
/// [`Error::Type`] if the value is neither.
pub fn parse_timestamp(value: &Value) -> Result<NaiveDateTime> {
    const FORMATS: [&str; 3] = [
        "%Y%m%dT%H%M%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
    ];
    match value {
        Value::Timestamp(t) => Ok(*t),
        Value::Str(s) => FORMATS
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
            .ok_or_else(|| Error::Type(format!("`{s}` is not a timestamp"))),
        other => Err(Error::Type(format!("expected a timestamp, got {}", other.kind()))),
    }
}

/// Target timezone for calendar decomposition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Zone {
    Fixed(FixedOffset),
    /// IANA zone; the offset follows its daylight-saving rules per instant.
    Named(Tz),
}

impl Zone {
    pub fn utc() -> Self {
        Zone::Fixed(Utc.fix())
    }

    /// Wall-clock time in this zone for a UTC instant.
    pub fn to_local(&self, utc: NaiveDateTime) -> DateTime<FixedOffset> {
        match self {
            Zone::Fixed(offset) => utc.and_utc().with_timezone(offset),
            Zone::Named(tz) => utc.and_utc().with_timezone(tz).fixed_offset(),
        }
    }
}

impl Default for Zone {
    fn default() -> Self {
        Zone::utc()
    }
}

impl From<FixedOffset> for Zone {
    fn from(offset: FixedOffset) -> Self {
        Zone::Fixed(offset)
    }
}

impl From<Tz> for Zone {
    fn from(tz: Tz) -> Self {
        Zone::Named(tz)
    }
}

/// Parse `UTC`, `Z`, a fixed offset such as `+03:00`, `-0530` or `+3`, or an
/// IANA name such as `Europe/Moscow`.
///
/// # Errors
/// [`Error::Type`] for anything else.
pub fn parse_timezone(tz: &str) -> Result<Zone> {
    let bad = || Error::Type(format!("unsupported timezone `{tz}`"));
    let tz = tz.trim();
    if tz.eq_ignore_ascii_case("utc") || tz == "Z" {
        return Ok(Zone::utc());
    }
    let (sign, rest) = match tz.as_bytes().first() {
        Some(b'+') => (1, &tz[1..]),
        Some(b'-') => (-1, &tz[1..]),
        _ => return tz.parse::<Tz>().map(Zone::Named).map_err(|_| bad()),
    };
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit() || b == b':') {
        return Err(bad());
    }
    let (h, m) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let h: i32 = h.parse().map_err(|_| bad())?;
    let m: i32 = m.parse().map_err(|_| bad())?;
    if h > 23 || m > 59 {
        return Err(bad());
    }
    FixedOffset::east_opt(sign * (h * 3600 + m * 60))
        .map(Zone::Fixed)
        .ok_or_else(bad)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Part {
    Year,
    Month,
    Weekday,
    Hour,
    Minute,
    Second,
}

/// Decomposes a UTC timestamp field into calendar parts in a target timezone.
///
/// Only the requested parts are written. `weekday` is the English three-letter
/// abbreviation (`"Mon"`); the others are integers.
#[derive(Clone, Debug)]
pub struct ToDatetime {
    pub column: String,
    pub timezone: Zone,
    parts: Vec<(String, Part)>,
}

impl ToDatetime {
    /// Timezone defaults to UTC.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            timezone: Zone::utc(),
            parts: Vec::new(),
        }
    }

    #[must_use]
    pub fn timezone(mut self, tz: impl Into<Zone>) -> Self {
        self.timezone = tz.into();
        self
    }

    fn part(mut self, column: impl Into<String>, part: Part) -> Self {
        self.parts.push((column.into(), part));
        self
    }

    #[must_use]
    pub fn year(self, column: impl Into<String>) -> Self {
        self.part(column, Part::Year)
    }

    #[must_use]
    pub fn month(self, column: impl Into<String>) -> Self {
        self.part(column, Part::Month)
    }

    #[must_use]
    pub fn weekday(self, column: impl Into<String>) -> Self {
        self.part(column, Part::Weekday)
    }

    #[must_use]
    pub fn hour(self, column: impl Into<String>) -> Self {
        self.part(column, Part::Hour)
    }

    #[must_use]
    pub fn minute(self, column: impl Into<String>) -> Self {
        self.part(column, Part::Minute)
    }

    #[must_use]
    pub fn second(self, column: impl Into<String>) -> Self {
        self.part(column, Part::Second)
    }
}

impl Mapper for ToDatetime {
    fn map(&self, mut row: Row) -> Result<Vec<Row>> {
        let utc = parse_timestamp(row.get(&self.column)?)?;
        let local = self.timezone.to_local(utc);
        for (column, part) in &self.parts {
            let value = match part {
                Part::Year => Value::Int(i64::from(local.year())),
                Part::Month => Value::Int(i64::from(local.month())),
                Part::Weekday => Value::Str(local.format("%a").to_string()),
                Part::Hour => Value::Int(i64::from(local.hour())),
                Part::Minute => Value::Int(i64::from(local.minute())),
                Part::Second => Value::Int(i64::from(local.second())),
            };
            row.insert(column.clone(), value);
        }
        Ok(vec![row])
    }
}

/// `result` = seconds from the `right` timestamp to the `left` one, as a float.
#[derive(Clone, Debug)]
pub struct TimestampDiff {
    pub left: String,
    pub right: String,
    pub result: String,
}

impl TimestampDiff {
    pub fn new(left: impl Into<String>, right: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            result: result.into(),
        }
    }
}

impl Mapper for TimestampDiff {
    fn map(&self, mut row: Row) -> Result<Vec<Row>> {
        let left = parse_timestamp(row.get(&self.left)?)?;
        let right = parse_timestamp(row.get(&self.right)?)?;
        let delta = left - right;
        let seconds = delta.num_microseconds().map_or_else(
            || delta.num_milliseconds() as f64 / 1e3,
            |us| us as f64 / 1e6,
        );
        row.insert(self.result.clone(), seconds);
        Ok(vec![row])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    fn one(m: &dyn Mapper, row: Row) -> Result<Row> {
        let mut out = m.map(row)?;
        assert_eq!(out.len(), 1);
        Ok(out.remove(0))
    }

    #[test]
    fn split_keeps_edge_pieces() -> Result<()> {
        let out = Split::new("t").map(row! { "t" => " a  b", "id" => 1 })?;
        let pieces: Vec<&str> = out.iter().map(|r| r.get("t").unwrap().as_str().unwrap()).collect();
        assert_eq!(pieces, vec!["", "a", "b"]);
        assert!(out.iter().all(|r| r.get("id").is_ok()));
        Ok(())
    }

    #[test]
    fn split_custom_separator() -> Result<()> {
        let out = Split::with_separator("t", ",")?.map(row! { "t" => "x,y" })?;
        assert_eq!(out.len(), 2);
        assert!(matches!(Split::with_separator("t", "("), Err(Error::Pattern { .. })));
        Ok(())
    }

    #[test]
    fn text_cleanup() -> Result<()> {
        let r = one(&FilterPunctuation::new("t"), row! { "t" => "Hello, World!" })?;
        assert_eq!(r.get("t")?.as_str()?, "Hello World");
        let r = one(&LowerCase::new("t"), r)?;
        assert_eq!(r.get("t")?.as_str()?, "hello world");
        Ok(())
    }

    #[test]
    fn rename_project_filter() -> Result<()> {
        let r = one(&Rename::new("a", "b"), row! { "a" => 1, "c" => 2 })?;
        assert_eq!(r, row! { "c" => 2, "b" => 1 });
        let r = one(&Project::new(["b"]), r)?;
        assert_eq!(r, row! { "b" => 1 });
        let keep_big = Filter::new(|r| Ok(r.get("b")?.as_i64()? > 5));
        assert!(keep_big.map(r)?.is_empty());
        assert!(keep_big.map(row! { "a" => 9 }).is_err());
        Ok(())
    }

    #[test]
    fn product_and_log() -> Result<()> {
        let r = one(&Product::new(["a", "b"]), row! { "a" => 2, "b" => 3.5 })?;
        assert_eq!(r.get("product")?.as_f64()?, 7.0);
        let r = one(&Log::with_base("a", 2.0), r)?;
        assert_eq!(r.get("a")?.as_f64()?, 1.0);
        assert!(Log::new("z").map(row! { "z" => 0 }).is_err());
        Ok(())
    }

    #[test]
    fn haversine_one_degree_of_latitude() -> Result<()> {
        let m = Haversine::new("s", "e", "d");
        let r = one(&m, row! { "s" => vec![37.0, 55.0], "e" => vec![37.0, 56.0] })?;
        let expected = Haversine::EARTH_RADIUS_KM * 1f64.to_radians();
        assert!((r.get("d")?.as_f64()? - expected).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn to_datetime_in_fixed_offset() -> Result<()> {
        let m = ToDatetime::new("ts")
            .timezone(parse_timezone("+03:00")?)
            .weekday("wd")
            .hour("h")
            .year("y")
            .month("mo")
            .minute("mi")
            .second("s");
        let r = one(&m, row! { "ts" => "20171022T224507.000" })?;
        // Sunday 22:45 UTC is Monday 01:45 at +03:00
        assert_eq!(r.get("wd")?.as_str()?, "Mon");
        assert_eq!(r.get("h")?.as_i64()?, 1);
        assert_eq!(r.get("y")?.as_i64()?, 2017);
        assert_eq!(r.get("mo")?.as_i64()?, 10);
        assert_eq!(r.get("mi")?.as_i64()?, 45);
        assert_eq!(r.get("s")?.as_i64()?, 7);
        Ok(())
    }

    #[test]
    fn timezones() -> Result<()> {
        let fixed = |secs| Zone::Fixed(FixedOffset::east_opt(secs).unwrap());
        assert_eq!(parse_timezone("UTC")?, fixed(0));
        assert_eq!(parse_timezone("-0530")?, fixed(-(5 * 3600 + 30 * 60)));
        assert_eq!(parse_timezone("+3")?, fixed(3 * 3600));
        assert_eq!(parse_timezone("+03:00")?, fixed(3 * 3600));
        assert_eq!(parse_timezone("Europe/Moscow")?, Zone::Named(Tz::Europe__Moscow));
        assert!(parse_timezone("Mars/Olympus").is_err());
        assert!(parse_timezone("+25").is_err());
        Ok(())
    }

    #[test]
    fn malformed_offsets_are_errors() {
        for tz in ["+1é2", "+é", "-", "+12:3x", "+ 3", "+1\u{300}00"] {
            assert!(parse_timezone(tz).is_err(), "{tz:?} should not parse");
        }
    }

    #[test]
    fn named_zone_follows_daylight_saving() -> Result<()> {
        let m = ToDatetime::new("ts").timezone(parse_timezone("Europe/Berlin")?).hour("h");
        // clocks went forward at 01:00 UTC on 2017-03-26 and back at 01:00 UTC on 2017-10-29
        for (ts, hour) in [
            ("20170326T003000.000", 1),
            ("20170326T013000.000", 3),
            ("20171029T003000.000", 2),
            ("20171029T013000.000", 2),
            ("20171029T023000.000", 3),
        ] {
            assert_eq!(one(&m, row! { "ts" => ts })?.get("h")?.as_i64()?, hour, "{ts}");
        }
        Ok(())
    }

    #[test]
    fn timestamp_diff_in_seconds() -> Result<()> {
        let m = TimestampDiff::new("leave", "enter", "dt");
        let r = one(
            &m,
            row! { "enter" => "20171020T112238.723000", "leave" => "2017-10-20T11:22:40.223" },
        )?;
        assert!((r.get("dt")?.as_f64()? - 1.5).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn math_mapper_reports_bad_formula_lazily() {
        let m = MathMapper::new("z", "x +");
        assert!(matches!(m.map(row! { "x" => 1 }), Err(Error::Expression { .. })));
        assert!(MathMapper::try_new("z", "x +").is_err());
        assert_eq!(MathMapper::new("z", "x + 1").formula(), "x + 1");
    }
}
