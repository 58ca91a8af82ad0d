pub mod health;
pub mod page;
pub mod stations;
pub mod summary;
