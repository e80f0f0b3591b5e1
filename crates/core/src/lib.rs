pub mod config;
pub mod config_loader;
pub mod error;
pub mod level;
pub mod metrics_formatter;
pub mod position;
pub mod price_range;
pub mod reconstruction;
pub mod simulation;
pub mod trade;
pub mod traits;

pub use config::{AppConfig, EngineConfig, Level, StrategyConfig, LEVEL_COUNT};
pub use config_loader::ConfigLoader;
pub use error::{LadderError, Result};
pub use level::{Resolution, StrategyLevelResolver};
pub use metrics_formatter::MetricsFormatter;
pub use position::{DiscardedSegment, PartialPosition, Position, Reconstruction, Segment};
pub use price_range::{round_price, Fill, PriceRange, DEFAULT_MAINTENANCE_MARGIN_RATE};
pub use reconstruction::{reconstruct_positions, PositionReconstructor};
pub use simulation::{StrategySimulationEngine, StrategySimulationHistory, StrategyState};
pub use trade::{ActionSide, PositionSide, Trade};
pub use traits::TradeSource;
