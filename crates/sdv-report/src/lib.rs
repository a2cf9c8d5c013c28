pub mod ae;
pub mod stats;

pub use ae::{
    AeFilters, AeManager, AeSummaryStats, PREFERRED_EXPORT_COLUMNS, RelatednessCounts,
    export_row, order_export_columns,
};
pub use stats::{GapStatsAggregator, MetricCounts, SummaryLevel, TopLevel};
