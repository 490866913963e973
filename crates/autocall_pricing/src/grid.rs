//! Event grid builder.
//!
//! Merges valuation, observation, ex-dividend and maturity dates into a
//! sorted deterministic time grid with per-date event tags, year fractions
//! and index maps. When a date is both ex-dividend and observation, the
//! dividend is applied to the freshly simulated spot first and the
//! observation check reads the post-dividend value.

use std::collections::{BTreeMap, HashMap};

use autocall_core::{Date, DateError, DayCountConvention};
use autocall_models::TermSheet;

/// Types of events in the simulation grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Simulation start.
    Valuation,
    /// Autocall / coupon observation.
    Observation,
    /// Discrete dividend ex-date.
    ExDividend,
    /// Final observation.
    Maturity,
}

/// Complete simulation grid.
///
/// Invariants: dates are sorted and unique within `[valuation, maturity]`;
/// every observation date on or after valuation and the maturity date have
/// a grid index; `dt[0] == 0`.
#[derive(Clone, Debug)]
pub struct SimulationGrid {
    /// Sorted unique grid dates.
    pub dates: Vec<Date>,
    /// Year fraction from valuation per date.
    pub times: Vec<f64>,
    /// Time increment per step (`dt[i] = times[i] - times[i-1]`, `dt[0] = 0`).
    pub dt: Vec<f64>,
    /// Event tags per date.
    pub tags: Vec<Vec<EventType>>,
    /// Observation date to grid index.
    pub observation_indices: HashMap<Date, usize>,
    /// (underlying id, ex-date) to grid index.
    pub exdiv_indices: HashMap<(String, Date), usize>,
    /// Grid index of the maturity date.
    pub maturity_index: usize,
    /// Per grid index: (asset index, dividend amount) jumps applying there.
    dividends_by_step: Vec<Vec<(usize, f64)>>,
}

impl SimulationGrid {
    /// Number of simulation steps.
    #[inline]
    pub fn num_steps(&self) -> usize {
        self.dates.len() - 1
    }

    /// Dividend jumps applying at a grid index, in asset order.
    #[inline]
    pub fn dividends_at(&self, index: usize) -> &[(usize, f64)] {
        &self.dividends_by_step[index]
    }

    /// Whether the date at `index` carries an observation tag.
    #[inline]
    pub fn is_observation_step(&self, index: usize) -> bool {
        self.tags[index].contains(&EventType::Observation)
    }
}

/// Builds the simulation grid for a term sheet.
///
/// Collects the valuation date, every observation date on or after
/// valuation, the maturity date, and each discrete ex-dividend date
/// strictly between valuation and maturity. Dates outside
/// `[valuation, maturity]` are excluded.
///
/// # Errors
///
/// Returns [`DateError`] when a year fraction cannot be computed (only
/// possible for unvalidated inputs).
pub fn build_simulation_grid(
    term_sheet: &TermSheet,
    day_count: DayCountConvention,
) -> Result<SimulationGrid, DateError> {
    let valuation = term_sheet.meta.valuation_date;
    let maturity = term_sheet.meta.maturity_date;

    let mut date_events: BTreeMap<Date, Vec<EventType>> = BTreeMap::new();
    let mut push_tag = |map: &mut BTreeMap<Date, Vec<EventType>>, date: Date, tag: EventType| {
        let tags = map.entry(date).or_default();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    };

    push_tag(&mut date_events, valuation, EventType::Valuation);

    for &obs_date in &term_sheet.schedules.observation_dates {
        if obs_date >= valuation && obs_date <= maturity {
            push_tag(&mut date_events, obs_date, EventType::Observation);
        }
    }

    push_tag(&mut date_events, maturity, EventType::Maturity);

    // (ex-date, asset index, amount), strictly inside (valuation, maturity)
    let mut exdiv_info: Vec<(Date, usize, f64)> = Vec::new();
    for (asset_idx, underlying) in term_sheet.underlyings.iter().enumerate() {
        for dividend in underlying.dividend_model.dividends_between(valuation, maturity) {
            if dividend.ex_date < maturity {
                push_tag(&mut date_events, dividend.ex_date, EventType::ExDividend);
                exdiv_info.push((dividend.ex_date, asset_idx, dividend.amount));
            }
        }
    }

    let dates: Vec<Date> = date_events.keys().copied().collect();
    let tags: Vec<Vec<EventType>> = date_events.values().cloned().collect();

    let mut times = Vec::with_capacity(dates.len());
    for &date in &dates {
        times.push(day_count.year_fraction(valuation, date)?);
    }

    let mut dt = vec![0.0];
    for i in 1..times.len() {
        dt.push(times[i] - times[i - 1]);
    }

    let index_of: HashMap<Date, usize> = dates
        .iter()
        .enumerate()
        .map(|(idx, &date)| (date, idx))
        .collect();

    let mut observation_indices = HashMap::new();
    for &obs_date in &term_sheet.schedules.observation_dates {
        if let Some(&idx) = index_of.get(&obs_date) {
            observation_indices.insert(obs_date, idx);
        }
    }

    let mut exdiv_indices = HashMap::new();
    let mut dividends_by_step: Vec<Vec<(usize, f64)>> = vec![Vec::new(); dates.len()];
    for (ex_date, asset_idx, amount) in exdiv_info {
        let idx = index_of[&ex_date];
        exdiv_indices.insert((term_sheet.underlyings[asset_idx].id.clone(), ex_date), idx);
        dividends_by_step[idx].push((asset_idx, amount));
    }

    let maturity_index = index_of[&maturity];

    Ok(SimulationGrid {
        dates,
        times,
        dt,
        tags,
        observation_indices,
        exdiv_indices,
        maturity_index,
        dividends_by_step,
    })
}
