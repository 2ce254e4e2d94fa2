pub mod food_cache;
pub mod schema;
pub mod store;

pub use food_cache::FoodCache;
pub use store::Store;
