pub mod nextbike;
