//! What-if planning of margin increases.
//!
//! The engine keeps a stack of scenarios. A scenario is the full sequence of
//! states produced by seeding a position and applying zero or more increases;
//! leveling up pushes a scenario one state longer than the current one and
//! leveling down pops it again, so undo restores the previous snapshot exactly.
//!
//! An engine belongs to one simulation session. It is `Send` but performs no
//! internal locking; callers must not share one instance between writers.

use crate::config::{Level, StrategyConfig};
use crate::error::{LadderError, Result};
use crate::level::StrategyLevelResolver;
use crate::price_range::{self, round_price, Fill, DEFAULT_MAINTENANCE_MARGIN_RATE};
use crate::trade::PositionSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// One snapshot of a simulated position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyState {
    /// 1-based tier number of the cumulative margin.
    pub level_number: usize,
    pub level: Level,
    pub next_level: Option<Level>,
    /// Price of the fill that produced this state.
    pub market_price: Decimal,
    pub entry_price: Decimal,
    pub target_price: Decimal,
    pub stop_loss_price: Decimal,
    /// Furthest price at which the next increase is still allowed.
    pub increase_price: Decimal,
    pub liquidation_price: Decimal,
    /// Cumulative margin committed so far.
    pub margin: Decimal,
}

impl StrategyState {
    /// Copy with all prices rounded to `dp` decimal places for display.
    #[must_use]
    pub fn rounded(&self, dp: u32) -> Self {
        Self {
            market_price: round_price(self.market_price, dp),
            entry_price: round_price(self.entry_price, dp),
            target_price: round_price(self.target_price, dp),
            stop_loss_price: round_price(self.stop_loss_price, dp),
            increase_price: round_price(self.increase_price, dp),
            liquidation_price: round_price(self.liquidation_price, dp),
            ..self.clone()
        }
    }

    /// Liquidation, entry and target are strictly ordered in the profitable
    /// direction of `side`, and the increase threshold lies strictly between
    /// liquidation and entry.
    #[must_use]
    pub fn is_consistent(&self, side: PositionSide) -> bool {
        let d = side.direction();
        let ahead = |lower: Decimal, upper: Decimal| (upper - lower) * d > Decimal::ZERO;

        ahead(self.liquidation_price, self.entry_price)
            && ahead(self.entry_price, self.target_price)
            && ahead(self.liquidation_price, self.increase_price)
            && ahead(self.increase_price, self.entry_price)
    }

    #[must_use]
    pub const fn is_top_level(&self) -> bool {
        self.next_level.is_none()
    }

    /// True if `price` is an acceptable fill for the next increase: beyond the
    /// increase threshold is too early, at or past liquidation too late.
    #[must_use]
    pub fn accepts_increase_at(&self, side: PositionSide, price: Decimal) -> bool {
        let d = side.direction();
        (price - self.liquidation_price) * d > Decimal::ZERO
            && (self.increase_price - price) * d >= Decimal::ZERO
    }
}

/// Stack of scenarios; each scenario is never modified once pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySimulationHistory {
    scenarios: Vec<Vec<StrategyState>>,
}

impl StrategySimulationHistory {
    fn push(&mut self, scenario: Vec<StrategyState>) {
        self.scenarios.push(scenario);
    }

    fn pop(&mut self) -> Option<Vec<StrategyState>> {
        self.scenarios.pop()
    }

    fn clear(&mut self) {
        self.scenarios.clear();
    }

    #[must_use]
    pub fn scenarios(&self) -> &[Vec<StrategyState>] {
        &self.scenarios
    }

    /// The scenario currently being planned on.
    #[must_use]
    pub fn current_scenario(&self) -> Option<&[StrategyState]> {
        self.scenarios.last().map(Vec::as_slice)
    }

    #[must_use]
    pub fn current_state(&self) -> Option<&StrategyState> {
        self.scenarios.last().and_then(|s| s.last())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

/// Interactive level-up / level-down planner for one position side.
#[derive(Debug, Clone)]
pub struct StrategySimulationEngine {
    config: StrategyConfig,
    side: PositionSide,
    maintenance_margin_rate: Decimal,
    history: StrategySimulationHistory,
}

impl StrategySimulationEngine {
    /// # Errors
    ///
    /// Returns `InvalidInput` if the ladder fails validation, the
    /// maintenance rate is outside `[0, 1/leverage)`, or the increase
    /// requirement would put the increase threshold at or past the entry
    /// price for `side`.
    pub fn new(
        config: StrategyConfig,
        side: PositionSide,
        maintenance_margin_rate: Decimal,
    ) -> Result<Self> {
        config.validate()?;
        if maintenance_margin_rate < Decimal::ZERO
            || maintenance_margin_rate >= Decimal::ONE / config.leverage
        {
            return Err(LadderError::invalid_input(
                "maintenance margin rate",
                format!("{maintenance_margin_rate} (leverage {})", config.leverage),
            ));
        }

        // liquidation = entry * (1 - d*buffer) and increase = liquidation * (1 + d*r),
        // so the increase stays short of entry only while r < buffer / headroom.
        let buffer = Decimal::ONE / config.leverage - maintenance_margin_rate;
        let headroom = Decimal::ONE - side.direction() * buffer;
        let requirement = config.level_increase_requirement / HUNDRED;
        if headroom <= Decimal::ZERO || requirement * headroom >= buffer {
            let ceiling = if headroom > Decimal::ZERO {
                round_price(buffer / headroom * HUNDRED, 4).to_string()
            } else {
                "0".to_string()
            };
            return Err(LadderError::invalid_input(
                "level increase requirement",
                format!(
                    "{}% must stay below {ceiling}% for {side} at leverage {} (maintenance {maintenance_margin_rate})",
                    config.level_increase_requirement, config.leverage
                ),
            ));
        }

        Ok(Self {
            config,
            side,
            maintenance_margin_rate,
            history: StrategySimulationHistory::default(),
        })
    }

    /// Engine using [`DEFAULT_MAINTENANCE_MARGIN_RATE`].
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_defaults(config: StrategyConfig, side: PositionSide) -> Result<Self> {
        Self::new(config, side, DEFAULT_MAINTENANCE_MARGIN_RATE)
    }

    /// Seeds a fresh history with a single fill, replacing any previous
    /// scenarios.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a non-positive price or margin.
    pub fn init(&mut self, seed_price: Decimal, seed_margin: Decimal) -> Result<StrategyState> {
        self.init_from_fills(&[Fill::new(seed_price, seed_margin)], seed_price)
    }

    /// Seeds with the first tier's margin at `seed_price`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a non-positive price.
    pub fn init_default(&mut self, seed_price: Decimal) -> Result<StrategyState> {
        self.init(seed_price, self.config.initial_margin())
    }

    /// Seeds from the fills of an existing position, e.g. the opening fills of
    /// a [`PartialPosition`](crate::PartialPosition).
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty fill list or non-positive values.
    pub fn init_from_fills(&mut self, fills: &[Fill], market_price: Decimal) -> Result<StrategyState> {
        let state = self.build_state(fills, market_price)?;
        self.history.clear();
        self.history.push(vec![state.clone()]);

        tracing::debug!(
            "Seeded {} simulation at level {}: entry {} liquidation {}",
            self.side,
            state.level_number,
            state.entry_price,
            state.liquidation_price
        );
        Ok(state)
    }

    /// Adds the next tier's margin at `increase_price` and pushes the
    /// resulting scenario.
    ///
    /// For a long the price must lie in `(liquidation, increase_price]` of the
    /// current state; for a short in `[increase_price, liquidation)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when uninitialized, already on the top tier,
    /// or when the price is out of bounds. The history is left untouched.
    pub fn level_up(&mut self, increase_price: Decimal) -> Result<StrategyState> {
        let current = self
            .history
            .current_state()
            .ok_or_else(|| reject("simulation is not initialized".to_string()))?;

        let resolution = StrategyLevelResolver::resolve(&self.config, current.margin)?;
        let Some(allotment) = resolution.allotment(current.margin) else {
            return Err(reject(format!(
                "already at top level {}",
                resolution.level_number
            )));
        };

        if !current.accepts_increase_at(self.side, increase_price) {
            return Err(reject(format!(
                "{} increase price {increase_price} outside bounds (liquidation {}, threshold {})",
                self.side, current.liquidation_price, current.increase_price
            )));
        }

        let fills = [
            Fill::new(current.entry_price, current.margin),
            Fill::new(increase_price, allotment),
        ];
        let state = self.build_state(&fills, increase_price)?;

        let mut scenario = self.history.current_scenario().unwrap_or_default().to_vec();
        scenario.push(state.clone());
        self.history.push(scenario);

        tracing::debug!(
            "Level up to {} at {}: entry {} margin {}",
            state.level_number,
            increase_price,
            state.entry_price,
            state.margin
        );
        Ok(state)
    }

    /// Drops the current scenario and returns the last state of the previous
    /// one, or `None` once the history is empty.
    pub fn level_down(&mut self) -> Option<StrategyState> {
        if self.history.pop().is_some() {
            tracing::debug!("Level down, {} scenario(s) left", self.history.len());
        }
        self.history.current_state().cloned()
    }

    #[must_use]
    pub fn current(&self) -> Option<&StrategyState> {
        self.history.current_state()
    }

    #[must_use]
    pub fn scenario(&self) -> Option<&[StrategyState]> {
        self.history.current_scenario()
    }

    #[must_use]
    pub const fn history(&self) -> &StrategySimulationHistory {
        &self.history
    }

    /// Number of scenarios on the stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        !self.history.is_empty()
    }

    #[must_use]
    pub fn can_level_up(&self) -> bool {
        self.current().is_some_and(|s| !s.is_top_level())
    }

    #[must_use]
    pub const fn side(&self) -> PositionSide {
        self.side
    }

    #[must_use]
    pub const fn config(&self) -> &StrategyConfig {
        &self.config
    }

    fn build_state(&self, fills: &[Fill], market_price: Decimal) -> Result<StrategyState> {
        let range = price_range::compute(
            self.side,
            self.config.leverage,
            fills,
            self.maintenance_margin_rate,
        )?;
        let resolution = StrategyLevelResolver::resolve(&self.config, range.total_margin)?;

        let d = self.side.direction();
        let entry = range.entry_price;
        let liquidation = range.liquidation_price;
        let state = StrategyState {
            level_number: resolution.level_number,
            level: resolution.current,
            next_level: resolution.next,
            market_price,
            entry_price: entry,
            target_price: entry * (Decimal::ONE + d * resolution.current.target / HUNDRED),
            stop_loss_price: entry
                * (Decimal::ONE - d * self.config.stop_loss / self.config.leverage / HUNDRED),
            increase_price: liquidation
                * (Decimal::ONE + d * self.config.level_increase_requirement / HUNDRED),
            liquidation_price: liquidation,
            margin: range.total_margin,
        };

        if !state.is_consistent(self.side) {
            return Err(LadderError::invalid_input(
                "strategy state",
                format!(
                    "{} level {}: liquidation {} increase {} entry {} target {}",
                    self.side,
                    state.level_number,
                    state.liquidation_price,
                    state.increase_price,
                    state.entry_price,
                    state.target_price
                ),
            ));
        }
        Ok(state)
    }
}

fn reject(reason: String) -> LadderError {
    tracing::warn!("Rejected level up: {}", reason);
    LadderError::InvalidTransition(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn engine(side: PositionSide) -> StrategySimulationEngine {
        let config = StrategyConfig {
            leverage: dec!(10),
            levels: vec![
                Level { size: dec!(100), target: dec!(2) },
                Level { size: dec!(300), target: dec!(3) },
                Level { size: dec!(600), target: dec!(4) },
                Level { size: dec!(1000), target: dec!(5) },
            ],
            stop_loss: dec!(50),
            level_increase_requirement: dec!(5),
        };
        StrategySimulationEngine::with_defaults(config, side).unwrap()
    }

    #[test]
    fn seed_state_prices() {
        let mut engine = engine(PositionSide::Long);
        let state = engine.init(dec!(100), dec!(100)).unwrap();

        assert_eq!(state.level_number, 1);
        assert_eq!(state.next_level.map(|l| l.size), Some(dec!(300)));
        assert_eq!(state.entry_price, dec!(100));
        assert_eq!(state.liquidation_price, dec!(90.5));
        assert_eq!(state.target_price, dec!(102));
        assert_eq!(state.stop_loss_price, dec!(95));
        assert_eq!(state.increase_price, dec!(95.025));
        assert_eq!(state.market_price, dec!(100));
        assert!(state.is_consistent(PositionSide::Long));
        assert_eq!(engine.depth(), 1);
    }

    #[test]
    fn short_seed_mirrors_long() {
        let mut engine = engine(PositionSide::Short);
        let state = engine.init(dec!(100), dec!(100)).unwrap();

        assert_eq!(state.liquidation_price, dec!(109.5));
        assert_eq!(state.target_price, dec!(98));
        assert_eq!(state.stop_loss_price, dec!(105));
        assert_eq!(state.increase_price, dec!(104.025));
        assert!(state.is_consistent(PositionSide::Short));
    }

    #[test]
    fn level_up_weights_entry_and_moves_tier() {
        let mut engine = engine(PositionSide::Long);
        engine.init(dec!(100), dec!(100)).unwrap();
        let state = engine.level_up(dec!(95)).unwrap();

        assert_eq!(state.level_number, 2);
        assert_eq!(state.margin, dec!(300));
        assert_eq!(state.entry_price.round_dp(2), dec!(96.67));
        assert_eq!(state.market_price, dec!(95));
        assert_eq!(engine.depth(), 2);
        assert_eq!(engine.scenario().unwrap().len(), 2);
    }

    #[test]
    fn short_level_up() {
        let mut engine = engine(PositionSide::Short);
        engine.init(dec!(100), dec!(100)).unwrap();
        let state = engine.level_up(dec!(105)).unwrap();

        // (100*100 + 105*200) / 300
        assert_eq!(state.entry_price.round_dp(4), dec!(103.3333));
        assert_eq!(state.level_number, 2);
        assert!(state.is_consistent(PositionSide::Short));
    }

    #[test]
    fn increase_price_bounds_are_enforced() {
        let mut engine = engine(PositionSide::Long);
        let seed = engine.init(dec!(100), dec!(100)).unwrap();

        // above the threshold: too early
        assert!(matches!(
            engine.level_up(dec!(96)),
            Err(LadderError::InvalidTransition(_))
        ));
        // at liquidation: too late
        assert!(engine.level_up(dec!(90.5)).is_err());
        assert!(engine.level_up(dec!(80)).is_err());
        assert_eq!(engine.depth(), 1);
        assert_eq!(engine.current(), Some(&seed));

        // the threshold itself is allowed
        assert!(engine.level_up(dec!(95.025)).is_ok());
    }

    #[test]
    fn short_bounds_are_inverted() {
        let mut engine = engine(PositionSide::Short);
        engine.init(dec!(100), dec!(100)).unwrap();

        assert!(engine.level_up(dec!(103)).is_err());
        assert!(engine.level_up(dec!(109.5)).is_err());
        assert!(engine.level_up(dec!(104.025)).is_ok());
    }

    #[test]
    fn top_level_is_terminal() {
        let mut engine = engine(PositionSide::Long);
        engine.init(dec!(100), dec!(100)).unwrap();
        engine.level_up(dec!(95)).unwrap();
        engine.level_up(dec!(90)).unwrap();
        let top = engine.level_up(dec!(85)).unwrap();

        assert_eq!(top.level_number, 4);
        assert_eq!(top.margin, dec!(1000));
        assert!(top.is_top_level());
        assert!(!engine.can_level_up());

        let err = engine.level_up(dec!(80)).unwrap_err();
        assert!(err.to_string().contains("top level 4"), "{err}");
        assert_eq!(engine.depth(), 4);
    }

    #[test]
    fn level_up_requires_init() {
        let mut engine = engine(PositionSide::Long);
        assert!(matches!(
            engine.level_up(dec!(95)),
            Err(LadderError::InvalidTransition(_))
        ));
        assert!(!engine.is_initialized());
    }

    #[test]
    fn level_down_restores_previous_state_exactly() {
        let mut engine = engine(PositionSide::Long);
        let seed = engine.init(dec!(100), dec!(100)).unwrap();
        let second = engine.level_up(dec!(95)).unwrap();
        engine.level_up(dec!(90)).unwrap();

        assert_eq!(engine.level_down(), Some(second));
        assert_eq!(engine.level_down(), Some(seed));
        assert_eq!(engine.level_down(), None);
        assert!(!engine.is_initialized());
        assert_eq!(engine.level_down(), None);
    }

    #[test]
    fn init_replaces_history() {
        let mut engine = engine(PositionSide::Long);
        engine.init(dec!(100), dec!(100)).unwrap();
        engine.level_up(dec!(95)).unwrap();

        let state = engine.init_default(dec!(50)).unwrap();
        assert_eq!(engine.depth(), 1);
        assert_eq!(state.margin, dec!(100));
        assert_eq!(state.entry_price, dec!(50));
    }

    #[test]
    fn seeding_from_existing_position_uses_its_margin() {
        let mut engine = engine(PositionSide::Long);
        let fills = [Fill::new(dec!(100), dec!(80)), Fill::new(dec!(98), dec!(70))];
        let state = engine.init_from_fills(&fills, dec!(97)).unwrap();

        assert_eq!(state.margin, dec!(150));
        assert_eq!(state.level_number, 2);
        assert_eq!(state.market_price, dec!(97));

        // next tier ceiling is 600, so the increase adds 450
        let liq = state.liquidation_price;
        let next = engine.level_up(state.increase_price).unwrap();
        assert_eq!(next.margin, dec!(600));
        assert!(next.liquidation_price < liq);
    }

    #[test]
    fn invalid_seed_rejected_without_touching_history() {
        let mut engine = engine(PositionSide::Long);
        engine.init(dec!(100), dec!(100)).unwrap();
        assert!(engine.init(dec!(100), dec!(0)).is_err());
        assert_eq!(engine.depth(), 1);
    }

    #[test]
    fn maintenance_rate_validated_against_leverage() {
        let config = StrategyConfig::default();
        assert!(StrategySimulationEngine::new(config.clone(), PositionSide::Long, dec!(0.1)).is_err());
        assert!(StrategySimulationEngine::new(config, PositionSide::Long, dec!(0.01)).is_ok());
    }

    #[test]
    fn increase_threshold_past_entry_rejected() {
        let config = StrategyConfig {
            level_increase_requirement: dec!(15),
            ..StrategyConfig::default()
        };
        let err = StrategySimulationEngine::with_defaults(config, PositionSide::Long).unwrap_err();
        assert!(
            matches!(err, LadderError::InvalidInput { what: "level increase requirement", .. }),
            "{err}"
        );
    }

    #[test]
    fn short_increase_ceiling_is_tighter() {
        // at 10x with mmr 0.005: long ceiling ~10.50%, short ~8.68%
        let config = StrategyConfig {
            level_increase_requirement: dec!(9),
            ..StrategyConfig::default()
        };
        assert!(StrategySimulationEngine::with_defaults(config.clone(), PositionSide::Long).is_ok());
        assert!(matches!(
            StrategySimulationEngine::with_defaults(config, PositionSide::Short),
            Err(LadderError::InvalidInput { what: "level increase requirement", .. })
        ));
    }

    #[test]
    fn inconsistent_state_is_an_error() {
        // bypasses the ceiling check in `new`
        let mut engine = StrategySimulationEngine {
            config: StrategyConfig {
                level_increase_requirement: dec!(15),
                ..StrategyConfig::default()
            },
            side: PositionSide::Long,
            maintenance_margin_rate: DEFAULT_MAINTENANCE_MARGIN_RATE,
            history: StrategySimulationHistory::default(),
        };

        assert!(matches!(
            engine.init(dec!(100), dec!(100)),
            Err(LadderError::InvalidInput { what: "strategy state", .. })
        ));
        assert!(!engine.is_initialized());
        assert!(engine.level_up(dec!(103)).is_err());
    }

    #[test]
    fn rounded_state_for_display() {
        let mut engine = engine(PositionSide::Long);
        engine.init(dec!(100), dec!(100)).unwrap();
        let state = engine.level_up(dec!(95)).unwrap().rounded(2);
        assert_eq!(state.entry_price, dec!(96.67));
        assert_eq!(state.margin, dec!(300));
    }
}
