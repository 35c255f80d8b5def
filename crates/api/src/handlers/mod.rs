pub mod relaxations;
