pub mod quoter;

pub use quoter::UniversalQuoter;
