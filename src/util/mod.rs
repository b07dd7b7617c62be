pub mod clock;
pub mod count_ring;
pub mod human;
pub mod randutil;
