//! Data access port trait.

use chrono::NaiveDateTime;

use crate::domain::bar::PriceBar;
use crate::domain::error::StratlabError;

/// Source of historical price series. The engine never loads data itself;
/// adapters deliver bars already filtered to the requested range and
/// sorted by timestamp.
pub trait DataPort {
    fn fetch_bars(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<PriceBar>, StratlabError>;
}
