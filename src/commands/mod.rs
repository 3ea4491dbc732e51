pub mod create;
pub mod extract;
pub mod inscribe;
pub mod inspect;
mod utils;
