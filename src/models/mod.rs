pub mod id_set;
pub mod models;
