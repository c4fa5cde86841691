pub mod conversation;
pub mod dna;
pub mod state;
