//! Streaming market analytics for RangeDesk
//!
//! Sits between heterogeneous market-update feeds and presentation
//! consumers, maintaining rolling windows and derived analytics in memory.
//!
//! # Core Components
//!
//! - [`window`] - Bounded/unbounded rolling windows with FIFO eviction
//! - [`volatility`] - Annualized realized volatility and the decimation gate
//! - [`depth`] - Cumulative depth curves and the recent-trades book
//! - [`registry`] - Universe of observed instruments
//! - [`positions`] - Position/PnL merge, instrument table and PnL series
//! - [`options`] - ATM selection, IV smile, range replication costs
//! - [`bands`] - Estimated vs. market price bands, volatility history
//! - [`coordinator`] - Single-writer stores publishing immutable snapshots
//! - [`feed`] - Feed events, feed handles and the reconnecting feed driver
//!
//! # Key Invariants
//!
//! - Ingestion never fails: invalid or missing fields degrade locally
//! - NaN never reaches a snapshot; unknown values are `None`
//! - Snapshots are immutable and versioned per feed type

pub mod bands;
pub mod coordinator;
pub mod depth;
pub mod error;
pub mod feed;
pub mod options;
pub mod positions;
pub mod registry;
pub mod snapshot;
pub mod types;
pub mod volatility;
pub mod window;

pub use coordinator::AnalyticsCoordinator;
pub use error::AnalyticsError;
pub use feed::{ChannelFeed, FeedError, FeedEvent, FeedHandle, JsonLinesFeed, ReconnectPolicy};
pub use snapshot::{DashboardSnapshot, DepthSnapshot, OptionsSnapshot, PriceSnapshot};
pub use types::{
    DashboardUpdate, OptionContract, OrderBookLevel, PriceBand, PriceTick, Quote, SeriesKey,
    Trade, WindowKind,
};
pub use window::RollingWindow;

pub type Result<T> = std::result::Result<T, AnalyticsError>;
