pub mod unit;

pub use unit::{LearningUnit, MemberLinks, OwnerLinks, OwnerSlot, UnitBody};
