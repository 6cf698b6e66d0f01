// 1. Traits
pub use crate::data::polars_ext::DataFrameExt;
pub use crate::data::table::Table;
pub use crate::report::io::ToCsv;

// 2. Tables & Query Surface
pub use crate::data::filter::FilteredSubset;
pub use crate::data::loader::{LoadReport, TableKind};
pub use crate::data::table::{AnomalyTable, PriceTable};
pub use crate::session::{Comparison, PriceOverview, PriceView, Selection, Session};

// 3. Domain Types
pub use crate::data::domain::{DateRange, KnownModel, ModelLabel, Ticker, YearRange};
pub use crate::data::schema::TableCol;

// 4. Anomaly Operations
pub use crate::anomaly::matcher::{EnrichedTable, enrich, enrich_files};
pub use crate::anomaly::overlap::{AnomalyKey, KeySet, Partition, overlap, partition};
pub use crate::report::points::{MarkerCategory, MarkerSeries, PricePoint, TickerSeries};

// 5. Configuration
pub use crate::config::{DashboardConfig, EnrichConfig};

// 6. Errors
pub use crate::error::{
    DataError, IoError, QueryError, StockscopeError, StockscopeResult, SystemError,
};
