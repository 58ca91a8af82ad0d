pub mod geocode;
pub mod period;
pub mod pipeline;
pub mod smhi;
pub mod stations;
pub mod summarize;
