pub mod family;
pub mod genus;
pub mod plant;
pub mod species;
pub mod variant;
