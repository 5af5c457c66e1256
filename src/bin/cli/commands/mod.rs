pub mod checksum;
pub mod export;
pub mod inspect;
pub mod tree;
