pub mod ipset;
