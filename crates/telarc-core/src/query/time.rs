use crate::{
    error::{ErrorOrigin, FetchError},
    query::filter::Filter,
    schema::{TableRef, TimeFormat},
    value::SqlValue,
};
use chrono::{DateTime, Utc};

///
/// TimeKind
///
/// Which archive time a range constrains. Each kind maps to one
/// (coarse, fine) column pair present on the queried table.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimeKind {
    /// Earth receive time.
    Ert,
    /// Spacecraft event time.
    Scet,
    /// Raw spacecraft clock.
    Sclk,
    /// Record creation time.
    Rct,
    /// Product creation time.
    Creation,
}

impl TimeKind {
    #[must_use]
    pub const fn coarse_column(self) -> &'static str {
        match self {
            Self::Ert => "ertCoarse",
            Self::Scet => "scetCoarse",
            Self::Sclk => "sclkCoarse",
            Self::Rct => "rctCoarse",
            Self::Creation => "creationTimeCoarse",
        }
    }

    #[must_use]
    pub const fn fine_column(self) -> &'static str {
        match self {
            Self::Ert => "ertFine",
            Self::Scet => "scetFine",
            Self::Sclk => "sclkFine",
            Self::Rct => "rctFine",
            Self::Creation => "creationTimeFine",
        }
    }

    // SCET-derived fine ticks are stored at the schema's fine scale; all
    // other kinds store nanosecond-or-native ticks directly.
    const fn scales_with_format(self) -> bool {
        matches!(self, Self::Scet | Self::Creation)
    }
}

///
/// TimeBound
///
/// One inclusive range endpoint as a (coarse, fine-nanosecond) pair.
/// Wall-clock kinds build it from a UTC instant; SCLK bounds are supplied
/// as raw ticks because only the external time codec knows the clock rate.
///

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct TimeBound {
    coarse: i64,
    fine_nanos: u64,
}

impl TimeBound {
    #[must_use]
    pub const fn from_raw(coarse: i64, fine_nanos: u64) -> Self {
        Self { coarse, fine_nanos }
    }

    #[must_use]
    pub fn from_datetime(instant: DateTime<Utc>) -> Self {
        Self {
            coarse: instant.timestamp(),
            fine_nanos: u64::from(instant.timestamp_subsec_nanos()),
        }
    }

    const fn stored_fine(self, kind: TimeKind, format: TimeFormat) -> u64 {
        if kind.scales_with_format() {
            self.fine_nanos / format.fine_scale()
        } else {
            self.fine_nanos
        }
    }
}

///
/// TimeRange
///
/// Optional inclusive time-range criteria over one [`TimeKind`]. Renders
/// to exact compound coarse/fine bounds so the planner can prune on the
/// coarse column while the fine column keeps the comparison exact.
///

#[derive(Clone, Copy, Debug)]
pub struct TimeRange {
    kind: TimeKind,
    start: Option<TimeBound>,
    stop: Option<TimeBound>,
}

impl TimeRange {
    #[must_use]
    pub const fn new(kind: TimeKind) -> Self {
        Self {
            kind,
            start: None,
            stop: None,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> TimeKind {
        self.kind
    }

    #[must_use]
    pub const fn starting_at(mut self, bound: TimeBound) -> Self {
        self.start = Some(bound);
        self
    }

    #[must_use]
    pub const fn ending_at(mut self, bound: TimeBound) -> Self {
        self.stop = Some(bound);
        self
    }

    #[must_use]
    pub fn starting_at_instant(self, instant: DateTime<Utc>) -> Self {
        self.starting_at(TimeBound::from_datetime(instant))
    }

    #[must_use]
    pub fn ending_at_instant(self, instant: DateTime<Utc>) -> Self {
        self.ending_at(TimeBound::from_datetime(instant))
    }

    /// Conflicting bounds are a configuration error, surfaced before any
    /// query is built and never retried.
    pub fn validate(&self) -> Result<(), FetchError> {
        if let (Some(start), Some(stop)) = (self.start, self.stop)
            && start > stop
        {
            return Err(FetchError::configuration(
                ErrorOrigin::Predicate,
                format!(
                    "time range start exceeds stop for {:?}: {start:?} > {stop:?}",
                    self.kind
                ),
            ));
        }

        Ok(())
    }

    /// Render the range as one filter fragment against `table`.
    pub fn to_filter(&self, table: &TableRef, format: TimeFormat) -> Result<Filter, FetchError> {
        self.validate()?;

        let coarse = table.col(self.kind.coarse_column());
        let fine = table.col(self.kind.fine_column());

        let mut clauses: Vec<String> = Vec::with_capacity(2);
        let mut binds: Vec<SqlValue> = Vec::with_capacity(6);

        if let Some(start) = self.start {
            clauses.push(format!(
                "(({coarse} > ?) OR (({coarse} = ?) AND ({fine} >= ?)))"
            ));
            binds.push(SqlValue::Long(start.coarse));
            binds.push(SqlValue::Long(start.coarse));
            binds.push(SqlValue::Ulong(start.stored_fine(self.kind, format)));
        }

        if let Some(stop) = self.stop {
            clauses.push(format!(
                "(({coarse} < ?) OR (({coarse} = ?) AND ({fine} <= ?)))"
            ));
            binds.push(SqlValue::Long(stop.coarse));
            binds.push(SqlValue::Long(stop.coarse));
            binds.push(SqlValue::Ulong(stop.stored_fine(self.kind, format)));
        }

        match clauses.len() {
            0 => Ok(Filter::none()),
            1 => Ok(Filter::raw(
                clauses.into_iter().next().unwrap_or_default(),
                binds,
            )),
            _ => Ok(Filter::raw(format!("({})", clauses.join(" AND ")), binds)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableRef {
        TableRef::new("Evr", "e")
    }

    #[test]
    fn unbounded_range_is_absent() {
        let filter = TimeRange::new(TimeKind::Ert)
            .to_filter(&table(), TimeFormat::Extended)
            .expect("unbounded range should render");

        assert!(filter.is_empty());
    }

    #[test]
    fn lower_bound_renders_compound_coarse_fine_clause() {
        let filter = TimeRange::new(TimeKind::Ert)
            .starting_at(TimeBound::from_raw(100, 250))
            .to_filter(&table(), TimeFormat::Extended)
            .expect("bounded range should render");

        assert_eq!(
            filter.clause(),
            "((e.ertCoarse > ?) OR ((e.ertCoarse = ?) AND (e.ertFine >= ?)))"
        );
        assert_eq!(
            filter.binds(),
            &[SqlValue::Long(100), SqlValue::Long(100), SqlValue::Ulong(250)]
        );
    }

    #[test]
    fn both_bounds_are_anded_and_parenthesized() {
        let filter = TimeRange::new(TimeKind::Scet)
            .starting_at(TimeBound::from_raw(10, 0))
            .ending_at(TimeBound::from_raw(20, 0))
            .to_filter(&table(), TimeFormat::Extended)
            .expect("bounded range should render");

        assert!(filter.clause().starts_with("(("));
        assert!(filter.clause().contains(" AND (("));
        assert_eq!(filter.binds().len(), 6);
    }

    #[test]
    fn legacy_format_scales_scet_fine_ticks_down() {
        let filter = TimeRange::new(TimeKind::Scet)
            .starting_at(TimeBound::from_raw(10, 4_000_000))
            .to_filter(&table(), TimeFormat::LegacyShortFine)
            .expect("bounded range should render");

        assert_eq!(filter.binds()[2], SqlValue::Ulong(4));
    }

    #[test]
    fn legacy_format_leaves_ert_fine_ticks_alone() {
        let filter = TimeRange::new(TimeKind::Ert)
            .starting_at(TimeBound::from_raw(10, 4_000_000))
            .to_filter(&table(), TimeFormat::LegacyShortFine)
            .expect("bounded range should render");

        assert_eq!(filter.binds()[2], SqlValue::Ulong(4_000_000));
    }

    #[test]
    fn inverted_bounds_are_a_configuration_error() {
        let err = TimeRange::new(TimeKind::Rct)
            .starting_at(TimeBound::from_raw(20, 0))
            .ending_at(TimeBound::from_raw(10, 0))
            .to_filter(&table(), TimeFormat::Extended)
            .expect_err("inverted bounds must fail");

        assert!(err.is_configuration());
    }

    #[test]
    fn equal_bounds_are_valid() {
        TimeRange::new(TimeKind::Rct)
            .starting_at(TimeBound::from_raw(10, 5))
            .ending_at(TimeBound::from_raw(10, 5))
            .validate()
            .expect("equal bounds are a point query, not a conflict");
    }
}
