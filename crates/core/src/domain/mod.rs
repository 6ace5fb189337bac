pub mod history;
pub mod recommendation;
pub mod rfq;
pub mod supplier;
