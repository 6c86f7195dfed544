pub mod location;
pub mod slots;
pub mod strict;
