pub mod micropub;
pub mod posts;
