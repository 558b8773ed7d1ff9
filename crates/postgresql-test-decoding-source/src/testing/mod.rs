//! Test support: a throwaway PostgreSQL server with logical decoding enabled

pub mod container;
